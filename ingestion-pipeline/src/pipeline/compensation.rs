use tracing::{info, warn};

use super::services::PipelineServices;

/// Undo action registered by a stage before it commits a side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compensation {
    DiscardArchive { location: String },
    DeleteRecord { id: String },
}

impl Compensation {
    fn label(&self) -> &'static str {
        match self {
            Self::DiscardArchive { .. } => "discard_archive",
            Self::DeleteRecord { .. } => "delete_record",
        }
    }
}

/// Ordered log of compensations for one run. Rolled back newest first.
#[derive(Debug, Default)]
pub struct CompensationLog {
    entries: Vec<Compensation>,
}

impl CompensationLog {
    pub fn register(&mut self, compensation: Compensation) {
        self.entries.push(compensation);
    }

    pub fn entries(&self) -> &[Compensation] {
        &self.entries
    }

    /// Forgets every entry once the run has succeeded.
    pub fn commit(&mut self) {
        self.entries.clear();
    }

    /// Runs every registered compensation in reverse order and empties the log.
    ///
    /// Failures are logged and do not stop the remaining entries; the error
    /// that triggered the rollback is what the caller sees.
    pub async fn rollback(&mut self, services: &dyn PipelineServices, run_id: &str) -> usize {
        let mut applied = 0_usize;

        while let Some(entry) = self.entries.pop() {
            let result = match &entry {
                Compensation::DiscardArchive { location } => {
                    services.discard_archive(location).await
                }
                Compensation::DeleteRecord { id } => services.delete_record(id).await,
            };

            match result {
                Ok(()) => {
                    applied = applied.saturating_add(1);
                    info!(run_id, compensation = entry.label(), "compensation applied");
                }
                Err(err) => warn!(
                    run_id,
                    compensation = entry.label(),
                    error = %err,
                    "compensation failed"
                ),
            }
        }

        applied
    }
}
