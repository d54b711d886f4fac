//! UUID v7 utilities for time-ordered identifiers.
//!
//! Every bugscope id is a UUIDv7, so ids sort in creation order. The job
//! queue relies on this to break `created_at` ties deterministically.

use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
///
/// # Example
///
/// ```
/// use bugscope_core::uuid_utils::new_v7;
///
/// let a = new_v7();
/// let b = new_v7();
/// assert!(a < b);
/// ```
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_v7_version() {
        assert_eq!(new_v7().get_version_num(), 7);
    }

    #[test]
    fn test_new_v7_is_monotonic_within_process() {
        let ids: Vec<Uuid> = (0..100).map(|_| new_v7()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }
}
