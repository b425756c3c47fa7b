use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use futures_util::Stream;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::PipelineError;
use crate::events::{Notifier, SubscriberId};
use crate::pipeline::{FileOutcome, FilePipeline};
use crate::rate_gate::RateGate;
use crate::sink::{resolve_target, FileSink};
use crate::transform::ProgressTransform;

/// hands out upload sessions wired to one transport and one clock
#[derive(Clone)]
pub struct UploadOrchestrator {
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl UploadOrchestrator {
    pub fn new(notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self { notifier, clock }
    }

    /// start tracking one multipart request
    pub fn begin_session(
        &self,
        subscriber: SubscriberId,
        storage_root: impl Into<PathBuf>,
        delay: Duration,
    ) -> UploadSession {
        let session = UploadSession {
            id: Uuid::new_v4(),
            subscriber,
            storage_root: storage_root.into(),
            delay,
            notifier: Arc::clone(&self.notifier),
            clock: Arc::clone(&self.clock),
            cancel: CancellationToken::new(),
            tasks: JoinSet::new(),
            settled: Vec::new(),
        };
        tracing::debug!(
            "Began upload session {} for subscriber {} into {:?}",
            session.id,
            session.subscriber,
            session.storage_root
        );
        session
    }
}

/// every file pipeline belonging to one upload request
///
/// pipelines run as independent tasks; the session only learns about them
/// again when they settle in `on_request_end`. dropping a session that
/// still has work in flight cancels that work.
pub struct UploadSession {
    id: Uuid,
    subscriber: SubscriberId,
    storage_root: PathBuf,
    delay: Duration,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    tasks: JoinSet<FileOutcome>,
    settled: Vec<FileOutcome>,
}

impl UploadSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn subscriber(&self) -> &SubscriberId {
        &self.subscriber
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// pipelines started but not yet collected
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// stop every in-flight pipeline; they settle as cancelled
    ///
    /// partially written files stay on disk.
    pub fn abort(&self) {
        tracing::warn!("Aborting upload session {}", self.id);
        self.cancel.cancel();
    }

    /// start streaming one file part
    ///
    /// the filename is checked before anything is opened; a rejected name
    /// settles immediately as a failed outcome without spawning work.
    pub fn on_file_part<S, E>(&mut self, field_name: &str, source: S, filename: &str)
    where
        S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
        E: Display + Send + 'static,
    {
        let transform = ProgressTransform::new(
            self.subscriber.clone(),
            filename,
            RateGate::new(self.delay, Arc::clone(&self.clock)),
            Arc::clone(&self.notifier),
        );
        let pipeline = FilePipeline::new(field_name, transform);

        let target = match resolve_target(&self.storage_root, filename) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!("Rejected file part {:?} in session {}: {}", filename, self.id, e);
                self.settled.push(pipeline.fail(e));
                return;
            }
        };

        tracing::debug!("Receiving file {} (field {}) -> {:?}", filename, field_name, target);

        let cancel = self.cancel.clone();
        let span = tracing::info_span!("upload", session = %self.id, file = %filename);
        self.tasks.spawn(
            async move {
                let mut sink = match FileSink::create(target).await {
                    Ok(sink) => sink,
                    Err(e) => return pipeline.fail(e),
                };

                let outcome = pipeline.run(source, &mut sink, &cancel).await;
                match &outcome.error {
                    None => tracing::info!("✅ Stored {} ({} bytes)", outcome.filename, outcome.bytes),
                    Some(e) => tracing::warn!(
                        "❌ Failed {} after {} bytes: {}",
                        outcome.filename,
                        outcome.bytes,
                        e
                    ),
                }
                outcome
            }
            .instrument(span),
        );
    }

    /// wait for every pipeline to settle and report per-file results
    pub async fn on_request_end(&mut self) -> SessionResult {
        while let Some(joined) = self.tasks.join_next().await {
            let outcome = joined.unwrap_or_else(|e| {
                tracing::error!("Pipeline task in session {} died: {}", self.id, e);
                FileOutcome {
                    field_name: String::new(),
                    filename: String::from("<unknown>"),
                    bytes: 0,
                    error: Some(PipelineError::Io(format!("pipeline task failed: {e}"))),
                }
            });
            self.settled.push(outcome);
        }

        let result = SessionResult::new(self.id, std::mem::take(&mut self.settled));
        tracing::info!(
            "📦 Session {} settled: {}/{} files stored",
            self.id,
            result.succeeded.len(),
            result.total()
        );
        result
    }
}

impl Drop for UploadSession {
    fn drop(&mut self) {
        if !self.tasks.is_empty() {
            self.cancel.cancel();
        }
    }
}

/// aggregate outcome of one upload request
#[derive(Debug, Clone)]
pub struct SessionResult {
    pub session_id: Uuid,
    pub succeeded: Vec<FileOutcome>,
    pub failed: Vec<FileOutcome>,
}

impl SessionResult {
    fn new(session_id: Uuid, outcomes: Vec<FileOutcome>) -> Self {
        let (succeeded, failed) = outcomes.into_iter().partition(FileOutcome::is_success);
        Self {
            session_id,
            succeeded,
            failed,
        }
    }

    /// false as soon as any file failed
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn bytes_stored(&self) -> u64 {
        self.succeeded.iter().map(|o| o.bytes).sum()
    }
}
