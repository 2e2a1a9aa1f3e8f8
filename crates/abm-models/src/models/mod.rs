//! Demo models, one per framework feature set.

pub mod flockers;
pub mod life;
pub mod schelling;
pub mod virus;
pub mod wealth;

pub use flockers::{Boid, FlockModel, Steering};
pub use life::{Cell, LifeModel};
pub use schelling::{Kind, SchellingAgent, SchellingModel};
pub use virus::{Disease, State, VirusAgent, VirusModel};
pub use wealth::{gini, WealthAgent, WealthModel};
