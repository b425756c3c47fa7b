use std::fmt::Display;

use axum::body::Bytes;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::sink::Destination;
use crate::transform::ProgressTransform;

/// lifecycle of one file transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Pending,
    Streaming,
    Completed { bytes: u64 },
    Failed(PipelineError),
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Completed { .. } | PipelineState::Failed(_))
    }

    fn allows(&self, next: &PipelineState) -> bool {
        matches!(
            (self, next),
            (PipelineState::Pending, PipelineState::Streaming)
                | (PipelineState::Pending, PipelineState::Failed(_))
                | (PipelineState::Streaming, PipelineState::Completed { .. })
                | (PipelineState::Streaming, PipelineState::Failed(_))
        )
    }
}

/// how a single file ended up, as reported to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub field_name: String,
    pub filename: String,
    /// bytes written to the sink before the pipeline settled
    pub bytes: u64,
    pub error: Option<PipelineError>,
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// one in-flight file: source stream -> progress transform -> sink
///
/// all state here is owned by the task driving the pipeline, chunks are
/// handled strictly one after another.
#[derive(Debug)]
pub struct FilePipeline {
    field_name: String,
    transform: ProgressTransform,
    state: PipelineState,
}

impl FilePipeline {
    pub fn new(field_name: impl Into<String>, transform: ProgressTransform) -> Self {
        Self {
            field_name: field_name.into(),
            transform,
            state: PipelineState::Pending,
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn bytes_processed(&self) -> u64 {
        self.transform.bytes_processed()
    }

    fn transition(&mut self, next: PipelineState) {
        if !self.state.allows(&next) {
            tracing::warn!(
                "Ignoring illegal pipeline transition for {}: {:?} -> {:?}",
                self.transform.filename(),
                self.state,
                next
            );
            return;
        }
        tracing::trace!("{}: {:?} -> {:?}", self.transform.filename(), self.state, next);
        self.state = next;
    }

    /// settle without ever streaming, e.g. when the sink could not be opened
    pub fn fail(mut self, error: PipelineError) -> FileOutcome {
        self.transition(PipelineState::Failed(error));
        self.into_outcome()
    }

    /// drive `source` into `sink` until end of stream, error or cancellation
    pub async fn run<S, E, W>(
        mut self,
        mut source: S,
        sink: &mut W,
        cancel: &CancellationToken,
    ) -> FileOutcome
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Display,
        W: Destination,
    {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            result = self.pump(&mut source, sink) => result,
        };

        match result {
            Ok(()) => {
                let bytes = self.transform.bytes_processed();
                self.transition(PipelineState::Completed { bytes });
            }
            Err(e) => self.transition(PipelineState::Failed(e)),
        }

        self.into_outcome()
    }

    async fn pump<S, E, W>(&mut self, source: &mut S, sink: &mut W) -> Result<(), PipelineError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Display,
        W: Destination,
    {
        while let Some(item) = source.next().await {
            let chunk = item.map_err(|e| PipelineError::Upstream(e.to_string()))?;
            if self.state == PipelineState::Pending {
                self.transition(PipelineState::Streaming);
            }
            self.transform.forward(&chunk, sink).await?;
        }

        // empty part: still counts as having streamed
        if self.state == PipelineState::Pending {
            self.transition(PipelineState::Streaming);
        }

        sink.finish().await?;
        Ok(())
    }

    fn into_outcome(self) -> FileOutcome {
        let error = match self.state {
            PipelineState::Failed(e) => Some(e),
            _ => None,
        };
        FileOutcome {
            field_name: self.field_name,
            filename: self.transform.filename().to_string(),
            bytes: self.transform.bytes_processed(),
            error,
        }
    }
}
