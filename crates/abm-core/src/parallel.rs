//! Parallel Execution
//!
//! Helpers that run work either on the rayon thread pool or sequentially,
//! depending on the `parallel` feature. The `cfg` switch lives only here so
//! callers stay free of it.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Whether this build can run batches in parallel.
pub const fn parallel_enabled() -> bool {
    cfg!(feature = "parallel")
}

/// Maps `f` over a slice, in parallel when the feature is on and
/// `force_sequential` is false. Results keep input order.
#[inline]
pub fn map_slice<T, F, R>(slice: &[T], f: F, force_sequential: bool) -> Vec<R>
where
    T: Sync,
    F: Fn(&T) -> R + Sync + Send,
    R: Send,
{
    #[cfg(feature = "parallel")]
    {
        if force_sequential {
            slice.iter().map(f).collect()
        } else {
            slice.par_iter().map(f).collect()
        }
    }

    #[cfg(not(feature = "parallel"))]
    {
        let _ = force_sequential;
        slice.iter().map(f).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_slice_preserves_order() {
        let items: Vec<u64> = (0..100).collect();
        let parallel = map_slice(&items, |x| x * x, false);
        let sequential = map_slice(&items, |x| x * x, true);
        assert_eq!(parallel, sequential);
        assert_eq!(parallel[9], 81);
    }
}
