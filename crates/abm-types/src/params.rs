//! Model Parameters
//!
//! Typed parameter values shared by the batch runner, the CLI and the
//! visualization server, plus the UI control descriptions the server sends
//! to the browser.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Errors raised when reading a parameter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamError {
    #[error("missing parameter '{0}'")]
    Missing(String),
    #[error("parameter '{name}' should be {expected}, got {found}")]
    WrongType {
        name: String,
        expected: &'static str,
        found: String,
    },
    #[error("parameter '{name}' is invalid: {reason}")]
    Invalid { name: String, reason: String },
}

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Parses a command-line value: bool, then integer, then float, then text.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(b) = trimmed.parse::<bool>() {
            return ParamValue::Bool(b);
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return ParamValue::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return ParamValue::Float(f);
        }
        ParamValue::Text(trimmed.to_string())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::Text(_) => "text",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ParamValue::Bool(b) => serde_json::Value::from(*b),
            ParamValue::Int(i) => serde_json::Value::from(*i),
            ParamValue::Float(f) => serde_json::Value::from(*f),
            ParamValue::Text(s) => serde_json::Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(x) => write!(f, "{}", x),
            ParamValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(i64::from(v))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

/// Named parameter set, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Overlays `other` on top of this set; values in `other` win.
    pub fn merge(&mut self, other: &Params) {
        for (name, value) in &other.0 {
            self.0.insert(name.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn require(&self, name: &str) -> Result<&ParamValue, ParamError> {
        self.0
            .get(name)
            .ok_or_else(|| ParamError::Missing(name.to_string()))
    }

    fn wrong_type(name: &str, expected: &'static str, found: &ParamValue) -> ParamError {
        ParamError::WrongType {
            name: name.to_string(),
            expected,
            found: found.type_name().to_string(),
        }
    }

    /// Reads an integer. Floats without a fractional part are accepted,
    /// since UI sliders report every value as a number.
    pub fn get_i64(&self, name: &str) -> Result<i64, ParamError> {
        match self.require(name)? {
            ParamValue::Int(i) => Ok(*i),
            ParamValue::Float(f) if f.fract() == 0.0 && f.is_finite() => Ok(*f as i64),
            other => Err(Self::wrong_type(name, "int", other)),
        }
    }

    pub fn get_u64(&self, name: &str) -> Result<u64, ParamError> {
        let value = self.get_i64(name)?;
        u64::try_from(value).map_err(|_| ParamError::Invalid {
            name: name.to_string(),
            reason: format!("expected a non-negative integer, got {}", value),
        })
    }

    pub fn get_usize(&self, name: &str) -> Result<usize, ParamError> {
        let value = self.get_u64(name)?;
        usize::try_from(value).map_err(|_| ParamError::Invalid {
            name: name.to_string(),
            reason: format!("{} does not fit in usize", value),
        })
    }

    /// Reads a float; integers widen.
    pub fn get_f64(&self, name: &str) -> Result<f64, ParamError> {
        match self.require(name)? {
            ParamValue::Float(f) => Ok(*f),
            ParamValue::Int(i) => Ok(*i as f64),
            other => Err(Self::wrong_type(name, "float", other)),
        }
    }

    pub fn get_bool(&self, name: &str) -> Result<bool, ParamError> {
        match self.require(name)? {
            ParamValue::Bool(b) => Ok(*b),
            other => Err(Self::wrong_type(name, "bool", other)),
        }
    }

    pub fn get_str(&self, name: &str) -> Result<&str, ParamError> {
        match self.require(name)? {
            ParamValue::Text(s) => Ok(s.as_str()),
            other => Err(Self::wrong_type(name, "text", other)),
        }
    }

    /// Reads a probability in `[0, 1]`.
    pub fn get_probability(&self, name: &str) -> Result<f64, ParamError> {
        let value = self.get_f64(name)?;
        if (0.0..=1.0).contains(&value) {
            Ok(value)
        } else {
            Err(ParamError::Invalid {
                name: name.to_string(),
                reason: format!("expected a value in [0, 1], got {}", value),
            })
        }
    }
}

impl FromIterator<(String, ParamValue)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A user-settable parameter control rendered by the browser client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserParam {
    Slider {
        name: String,
        value: f64,
        min: f64,
        max: f64,
        step: f64,
    },
    Choice {
        name: String,
        value: String,
        choices: Vec<String>,
    },
    Checkbox {
        name: String,
        value: bool,
    },
    Number {
        name: String,
        value: f64,
    },
    StaticText {
        text: String,
    },
}

impl UserParam {
    pub fn slider(name: &str, value: f64, min: f64, max: f64, step: f64) -> Self {
        UserParam::Slider {
            name: name.to_string(),
            value,
            min,
            max,
            step,
        }
    }

    pub fn checkbox(name: &str, value: bool) -> Self {
        UserParam::Checkbox {
            name: name.to_string(),
            value,
        }
    }

    pub fn choice(name: &str, value: &str, choices: &[&str]) -> Self {
        UserParam::Choice {
            name: name.to_string(),
            value: value.to_string(),
            choices: choices.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn number(name: &str, value: f64) -> Self {
        UserParam::Number {
            name: name.to_string(),
            value,
        }
    }

    pub fn static_text(text: &str) -> Self {
        UserParam::StaticText {
            text: text.to_string(),
        }
    }

    /// Parameter name, or `None` for display-only controls.
    pub fn name(&self) -> Option<&str> {
        match self {
            UserParam::Slider { name, .. }
            | UserParam::Choice { name, .. }
            | UserParam::Checkbox { name, .. }
            | UserParam::Number { name, .. } => Some(name.as_str()),
            UserParam::StaticText { .. } => None,
        }
    }

    /// Initial value of the control. Integral sliders yield integers.
    pub fn default_value(&self) -> Option<ParamValue> {
        match self {
            UserParam::Slider { value, step, .. } => {
                if value.fract() == 0.0 && step.fract() == 0.0 {
                    Some(ParamValue::Int(*value as i64))
                } else {
                    Some(ParamValue::Float(*value))
                }
            }
            UserParam::Choice { value, .. } => Some(ParamValue::Text(value.clone())),
            UserParam::Checkbox { value, .. } => Some(ParamValue::Bool(*value)),
            UserParam::Number { value, .. } => Some(ParamValue::Float(*value)),
            UserParam::StaticText { .. } => None,
        }
    }

    /// Collects the defaults of a control list into a parameter set.
    pub fn defaults(controls: &[UserParam]) -> Params {
        controls
            .iter()
            .filter_map(|c| Some((c.name()?.to_string(), c.default_value()?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param_value() {
        assert_eq!(ParamValue::parse("true"), ParamValue::Bool(true));
        assert_eq!(ParamValue::parse("42"), ParamValue::Int(42));
        assert_eq!(ParamValue::parse("0.25"), ParamValue::Float(0.25));
        assert_eq!(ParamValue::parse("torus"), ParamValue::Text("torus".to_string()));
    }

    #[test]
    fn test_typed_accessors() {
        let params = Params::new()
            .with("n", 10)
            .with("density", 0.8)
            .with("torus", true)
            .with("label", "demo");

        assert_eq!(params.get_i64("n").unwrap(), 10);
        assert_eq!(params.get_usize("n").unwrap(), 10);
        assert_eq!(params.get_f64("n").unwrap(), 10.0);
        assert_eq!(params.get_f64("density").unwrap(), 0.8);
        assert!(params.get_bool("torus").unwrap());
        assert_eq!(params.get_str("label").unwrap(), "demo");
    }

    #[test]
    fn test_accessor_errors() {
        let params = Params::new().with("density", 0.5).with("n", -3);

        assert_eq!(
            params.get_f64("missing"),
            Err(ParamError::Missing("missing".to_string()))
        );
        assert!(matches!(
            params.get_i64("density"),
            Err(ParamError::WrongType { expected: "int", .. })
        ));
        assert!(matches!(params.get_u64("n"), Err(ParamError::Invalid { .. })));
    }

    #[test]
    fn test_integral_float_reads_as_int() {
        let params = Params::new().with("n", 50.0);
        assert_eq!(params.get_usize("n").unwrap(), 50);
    }

    #[test]
    fn test_probability_bounds() {
        let params = Params::new().with("p", 1.5).with("q", 0.3);
        assert!(params.get_probability("p").is_err());
        assert_eq!(params.get_probability("q").unwrap(), 0.3);
    }

    #[test]
    fn test_merge_overrides() {
        let mut base = Params::new().with("a", 1).with("b", 2);
        base.merge(&Params::new().with("b", 3));
        assert_eq!(base.get_i64("a").unwrap(), 1);
        assert_eq!(base.get_i64("b").unwrap(), 3);
    }

    #[test]
    fn test_params_deserialize_from_json() {
        let params: Params =
            serde_json::from_str(r#"{"n": 5, "p": 0.5, "torus": false, "name": "x"}"#).unwrap();
        assert_eq!(params.get("n"), Some(&ParamValue::Int(5)));
        assert_eq!(params.get("p"), Some(&ParamValue::Float(0.5)));
        assert_eq!(params.get("torus"), Some(&ParamValue::Bool(false)));
        assert_eq!(params.get("name"), Some(&ParamValue::Text("x".to_string())));
    }

    #[test]
    fn test_user_param_defaults() {
        let controls = vec![
            UserParam::slider("n", 50.0, 2.0, 200.0, 1.0),
            UserParam::slider("density", 0.8, 0.1, 1.0, 0.05),
            UserParam::checkbox("torus", true),
            UserParam::static_text("Adjust and press reset"),
        ];
        let defaults = UserParam::defaults(&controls);
        assert_eq!(defaults.len(), 3);
        assert_eq!(defaults.get("n"), Some(&ParamValue::Int(50)));
        assert_eq!(defaults.get("density"), Some(&ParamValue::Float(0.8)));
    }

    #[test]
    fn test_user_param_serialization() {
        let json = serde_json::to_string(&UserParam::checkbox("torus", true)).unwrap();
        assert_eq!(json, r#"{"type":"checkbox","name":"torus","value":true}"#);
    }
}
