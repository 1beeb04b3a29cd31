//! Cache key derivation
//!
//! A key is `identity + ":" + task`. Parameters never take part: results for
//! non-empty parameter sets are not cached at all.

use crate::context::BuildContext;
use crate::params::Task;
use std::fmt;

/// Deterministic key for one (build identity, task) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key, or `None` when the context has no stable identity
    pub fn derive(context: &BuildContext, task: Task) -> Option<Self> {
        context
            .identity()
            .map(|identity| Self(format!("{}:{}", identity, task)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn same_identity_different_dirs_collide() {
        let a = BuildContext::new("/tmp/one").with_revision("deadbeef");
        let b = BuildContext::new("/tmp/two").with_revision("deadbeef");
        for task in [1, 2, 99] {
            assert_eq!(CacheKey::derive(&a, task), CacheKey::derive(&b, task));
        }
        assert_eq!(CacheKey::derive(&a, 7).unwrap().as_str(), "deadbeef:7");
    }

    #[test]
    fn different_identities_never_collide() {
        let a = BuildContext::new("/tmp/w").with_revision("1a2b");
        let b = BuildContext::new("/tmp/w").with_revision("1a2b:1");

        let mut seen = HashSet::new();
        for task in 0..=10_000 {
            assert!(seen.insert(CacheKey::derive(&a, task).unwrap()));
            assert!(seen.insert(CacheKey::derive(&b, task).unwrap()));
        }
    }

    #[test]
    fn no_identity_no_key() {
        assert!(CacheKey::derive(&BuildContext::new("/tmp/w"), 3).is_none());
    }
}
