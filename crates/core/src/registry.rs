//! In-process job registry.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::job::JobDefinition;
use crate::job_name::JobName;

/// Mapping from job name to job definition, owned by one scheduler.
///
/// - In memory only; nothing is persisted
/// - Re-registering a name replaces the previous definition
/// - Lookups clone the definition (cheap: the work function is shared)
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobName, JobDefinition>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a definition, returning the one it replaced.
    pub fn insert(&self, name: JobName, definition: JobDefinition) -> Option<JobDefinition> {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, definition)
    }

    /// Remove a job, returning its definition if it was registered.
    pub fn remove(&self, name: &str) -> Option<JobDefinition> {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    pub fn get(&self, name: &str) -> Option<JobDefinition> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered job names, sorted.
    pub fn names(&self) -> Vec<JobName> {
        let mut names: Vec<_> = self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(every: &str) -> JobDefinition {
        JobDefinition::new(every, || async { Ok(()) })
    }

    fn name(s: &str) -> JobName {
        JobName::parse(s).unwrap()
    }

    #[test]
    fn last_registration_wins() {
        let registry = JobRegistry::new();
        assert!(registry.insert(name("cleanup"), noop("5 minutes")).is_none());

        let replaced = registry.insert(name("cleanup"), noop("10 minutes")).unwrap();
        assert_eq!(replaced.every(), "5 minutes");
        assert_eq!(registry.get("cleanup").unwrap().every(), "10 minutes");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_forgets_the_job() {
        let registry = JobRegistry::new();
        registry.insert(name("cleanup"), noop("5 minutes"));

        assert!(registry.remove("cleanup").is_some());
        assert!(!registry.contains("cleanup"));
        assert!(registry.remove("cleanup").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn names_are_sorted() {
        let registry = JobRegistry::new();
        registry.insert(name("reports"), noop("1 hour"));
        registry.insert(name("cleanup"), noop("5 minutes"));

        let names: Vec<_> = registry.names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["cleanup", "reports"]);
    }
}
