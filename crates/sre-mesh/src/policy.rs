use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

/// What the mesh does with a wire that ended up `Failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record the failure, stop the wire and keep running the others
    #[default]
    Log,
    /// Start the wire again with its original input, at most `max_attempts` times
    Restart { max_attempts: u32 },
    /// Record the failure and hand it to the caller of `tick`
    Propagate,
}

/// Outcome of applying a policy to one failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Drop,
    Restart,
    Propagate,
}

impl FailurePolicy {
    /// Decide for a wire that has already been restarted `restarts` times.
    pub fn decide(&self, restarts: u32) -> Decision {
        match *self {
            FailurePolicy::Log => Decision::Drop,
            FailurePolicy::Restart { max_attempts } if restarts < max_attempts => Decision::Restart,
            FailurePolicy::Restart { .. } => Decision::Drop,
            FailurePolicy::Propagate => Decision::Propagate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub wire: String,
    pub error: String,
    /// Restarts the wire had been through when it failed
    pub restarts: u32,
    pub decision: Decision,
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "wire {} failed after {} restart(s): {} ({:?})",
            self.wire, self.restarts, self.error, self.decision
        )
    }
}

/// Shared, append-only log of wire failures.
#[derive(Debug, Clone, Default)]
pub struct FailureLog {
    entries: Arc<Mutex<Vec<FailureRecord>>>,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: FailureRecord) {
        self.entries.lock().push(entry);
    }

    /// Snapshot of the log
    pub fn entries(&self) -> Vec<FailureRecord> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Write the log to `path`, one failure per line.
    pub fn persist(&self, path: &Path) -> std::io::Result<()> {
        let mut f = File::create(path)?;
        for entry in self.entries() {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_policy_gives_up_after_max_attempts() {
        let policy = FailurePolicy::Restart { max_attempts: 2 };
        assert_eq!(policy.decide(0), Decision::Restart);
        assert_eq!(policy.decide(1), Decision::Restart);
        assert_eq!(policy.decide(2), Decision::Drop);
        assert_eq!(FailurePolicy::Log.decide(0), Decision::Drop);
        assert_eq!(FailurePolicy::Propagate.decide(5), Decision::Propagate);
    }

    #[test]
    fn log_is_shared_and_persisted() {
        let log = FailureLog::new();
        let writer = log.clone();
        writer.record(FailureRecord {
            wire: "w".into(),
            error: "boom".into(),
            restarts: 0,
            decision: Decision::Drop,
        });
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].error, "boom");

        let path = std::env::temp_dir().join(format!("sre-failures-{}.log", std::process::id()));
        log.persist(&path).expect("persist failed");
        let text = std::fs::read_to_string(&path).expect("read failed");
        std::fs::remove_file(&path).ok();
        assert_eq!(text, "wire w failed after 0 restart(s): boom (Drop)\n");
    }
}
