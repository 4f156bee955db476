//! Job list read from `BOSSMAN_JOBS`.
//!
//! Format: `name=interval` entries separated by `;`, e.g.
//! `cleanup=5 minutes;sync=30s`. Every listed job runs a heartbeat that
//! logs each execution.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tracing::info;

use bossman_core::{CoreError, IntervalError, JobDefinition, JobName, interval};

pub const JOBS_VAR: &str = "BOSSMAN_JOBS";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobListError {
    #[error("entry {0:?} is not of the form name=interval")]
    Malformed(String),

    #[error(transparent)]
    Name(#[from] CoreError),

    #[error("job {job}: {source}")]
    Interval {
        job: String,
        #[source]
        source: IntervalError,
    },

    #[error("job {0} listed twice")]
    Duplicate(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEntry {
    pub name: JobName,
    pub every: String,
}

/// Parse a job list. Blank entries are skipped.
pub fn parse_job_list(list: &str) -> Result<Vec<JobEntry>, JobListError> {
    let mut entries: Vec<JobEntry> = Vec::new();

    for raw in list.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, every) = raw
            .split_once('=')
            .ok_or_else(|| JobListError::Malformed(raw.to_string()))?;
        let name = JobName::parse(name.trim())?;
        let every = every.trim().to_string();

        interval::resolve(&every).map_err(|source| JobListError::Interval {
            job: name.to_string(),
            source,
        })?;
        if entries.iter().any(|e| e.name == name) {
            return Err(JobListError::Duplicate(name.to_string()));
        }

        entries.push(JobEntry { name, every });
    }

    Ok(entries)
}

/// Work that logs every run along with a per-job run counter.
pub fn heartbeat(entry: &JobEntry) -> JobDefinition {
    let name = entry.name.clone();
    let runs = Arc::new(AtomicU64::new(0));

    JobDefinition::new(entry.every.clone(), move || {
        let name = name.clone();
        let run = runs.fetch_add(1, Ordering::Relaxed) + 1;
        async move {
            info!(job = %name, run, "heartbeat");
            Ok(())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_entries_in_order() {
        let jobs = parse_job_list("cleanup=5 minutes; sync = 30s ;").unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].name.as_str(), "cleanup");
        assert_eq!(jobs[0].every, "5 minutes");
        assert_eq!(jobs[1].name.as_str(), "sync");
        assert_eq!(jobs[1].every, "30s");
    }

    #[test]
    fn empty_list_has_no_jobs() {
        assert!(parse_job_list("").unwrap().is_empty());
        assert!(parse_job_list(" ; ;").unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_entries() {
        assert!(matches!(parse_job_list("cleanup"), Err(JobListError::Malformed(_))));
        assert!(matches!(parse_job_list("=5 minutes"), Err(JobListError::Name(_))));
        assert!(matches!(
            parse_job_list("cleanup=5 fortnights"),
            Err(JobListError::Interval { .. })
        ));
        assert!(matches!(
            parse_job_list("a=1s;a=2s"),
            Err(JobListError::Duplicate(name)) if name == "a"
        ));
    }

    #[tokio::test]
    async fn heartbeat_succeeds() {
        let entry = parse_job_list("ping=1s").unwrap().remove(0);
        let definition = heartbeat(&entry);

        assert_eq!(definition.every(), "1s");
        definition.work().run().await.unwrap();
        definition.work().run().await.unwrap();
    }
}
