use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::PipelineError;
use crate::events::{Notifier, ProgressEvent, SubscriberId, UPLOAD_PROGRESS_EVENT};
use crate::rate_gate::RateGate;

/// pass-through stage that counts bytes on their way to the sink and
/// tells the subscriber about it, at most once per gate window
///
/// the first chunk always notifies. there is no guaranteed notification
/// for the last chunk: when it lands inside the current window the final
/// total is only visible through the pipeline outcome.
pub struct ProgressTransform {
    subscriber: SubscriberId,
    filename: String,
    gate: RateGate,
    notifier: Arc<dyn Notifier>,
    processed: u64,
    last_sent: Option<Instant>,
}

impl ProgressTransform {
    pub fn new(
        subscriber: SubscriberId,
        filename: impl Into<String>,
        gate: RateGate,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            subscriber,
            filename: filename.into(),
            gate,
            notifier,
            processed: 0,
            last_sent: None,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// bytes already handed to the sink
    pub fn bytes_processed(&self) -> u64 {
        self.processed
    }

    pub fn last_sent(&self) -> Option<Instant> {
        self.last_sent
    }

    /// account for `len` forwarded bytes and decide whether to notify
    ///
    /// returns the event to emit, already recorded as sent.
    pub fn observe(&mut self, len: usize) -> Option<ProgressEvent> {
        self.processed += len as u64;
        // an empty chunk moves nothing and must not spend the gate's window
        if len == 0 {
            return None;
        }

        let now = self.gate.poll(self.last_sent)?;
        self.last_sent = Some(now);

        Some(ProgressEvent {
            filename: self.filename.clone(),
            processed_already: self.processed,
        })
    }

    /// write one chunk downstream, then count it and maybe notify
    ///
    /// the write is awaited before returning so a slow sink stalls the
    /// caller's next read. a rejected write is returned as-is and never
    /// produces a notification.
    pub async fn forward<W>(&mut self, chunk: &[u8], sink: &mut W) -> Result<(), PipelineError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        sink.write_all(chunk).await.map_err(|e| {
            tracing::error!("Sink rejected chunk for {}: {}", self.filename, e);
            PipelineError::from(e)
        })?;

        if let Some(event) = self.observe(chunk.len()) {
            tracing::trace!(
                "Progress {} -> {}: {} bytes",
                self.filename,
                self.subscriber,
                event.processed_already
            );
            self.notifier
                .send_to(&self.subscriber, UPLOAD_PROGRESS_EVENT, &event);
        }

        Ok(())
    }
}

impl std::fmt::Debug for ProgressTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTransform")
            .field("subscriber", &self.subscriber)
            .field("filename", &self.filename)
            .field("gate", &self.gate)
            .field("processed", &self.processed)
            .field("last_sent", &self.last_sent)
            .finish()
    }
}
