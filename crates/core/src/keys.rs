//! Store key namespace.
//!
//! Key layout is shared with existing deployments and must stay bit-exact:
//!
//! - wake keys: `{prefix}:work:{name}`
//! - lock keys: `{prefix}:lock:{name}`

/// Prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "bossman:job";

const WORK_SEGMENT: &str = ":work:";
const LOCK_SEGMENT: &str = ":lock:";

/// Derives wake and lock keys for one scheduler namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
    work_prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let work_prefix = format!("{prefix}{WORK_SEGMENT}");
        Self {
            prefix,
            work_prefix,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key whose expiry wakes the job up.
    pub fn work_key(&self, name: &str) -> String {
        format!("{}{name}", self.work_prefix)
    }

    /// Key holding the job's execution lock.
    pub fn lock_key(&self, name: &str) -> String {
        format!("{}{LOCK_SEGMENT}{name}", self.prefix)
    }

    /// Extract the job name from an expired key.
    ///
    /// Returns `None` for keys outside this namespace (including this
    /// namespace's lock keys) and for wake keys with an empty name.
    pub fn job_from_expired_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.work_prefix.as_str())
            .filter(|name| !name.is_empty())
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_matches_existing_deployments() {
        let keys = KeySpace::default();
        assert_eq!(keys.work_key("cleanup"), "bossman:job:work:cleanup");
        assert_eq!(keys.lock_key("cleanup"), "bossman:job:lock:cleanup");
    }

    #[test]
    fn filters_foreign_and_lock_keys() {
        let keys = KeySpace::default();
        assert_eq!(keys.job_from_expired_key("bossman:job:work:cleanup"), Some("cleanup"));
        assert_eq!(keys.job_from_expired_key("bossman:job:lock:cleanup"), None);
        assert_eq!(keys.job_from_expired_key("session:abc"), None);
        assert_eq!(keys.job_from_expired_key("bossman:job:work:"), None);
    }

    #[test]
    fn custom_prefix_does_not_match_default_namespace() {
        let keys = KeySpace::new("acme:jobs");
        assert_eq!(keys.work_key("sync"), "acme:jobs:work:sync");
        assert_eq!(keys.job_from_expired_key("bossman:job:work:sync"), None);
    }

    #[test]
    fn names_containing_colons_survive_the_round_trip() {
        let keys = KeySpace::default();
        let key = keys.work_key("reports:daily");
        assert_eq!(keys.job_from_expired_key(&key), Some("reports:daily"));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: every wake key maps back to the job that produced it.
            #[test]
            fn work_keys_resolve_to_their_job(
                prefix in "[a-z]{1,8}(:[a-z]{1,8})?",
                name in "[A-Za-z0-9_.:-]{1,32}"
            ) {
                let keys = KeySpace::new(prefix);
                let key = keys.work_key(&name);
                prop_assert_eq!(keys.job_from_expired_key(&key), Some(name.as_str()));
                let lock_key = keys.lock_key(&name);
                prop_assert_eq!(keys.job_from_expired_key(&lock_key), None);
            }
        }
    }
}
