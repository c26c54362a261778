use super::report::RunStatus;

/// Events emitted by the generator. One batch is the unit of progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Connected {
        store: String,
    },
    BatchStarted {
        batch: usize,
        objects: usize,
    },
    BatchCompleted {
        batch: usize,
        processed: usize,
        skipped: usize,
        failed: usize,
    },
    Building {
        namespaces: usize,
    },
    Writing {
        artifacts: usize,
    },
    Finished {
        status: RunStatus,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Reports progress through the log facade.
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Connected { store } => log::info!("Connected to {}", store),
            ProgressEvent::BatchStarted { batch, objects } => {
                log::info!("Batch {}: {} objects", batch, objects)
            }
            ProgressEvent::BatchCompleted {
                batch,
                processed,
                skipped,
                failed,
            } => log::info!(
                "Batch {} done: {} processed, {} skipped, {} failed",
                batch,
                processed,
                skipped,
                failed
            ),
            ProgressEvent::Building { namespaces } => {
                log::info!("Building GitOps structure for {} namespaces", namespaces)
            }
            ProgressEvent::Writing { artifacts } => log::info!("Writing {} files", artifacts),
            ProgressEvent::Finished { status } => log::info!("Finished: {:?}", status),
        }
    }
}
