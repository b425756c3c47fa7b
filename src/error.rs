/// why a single file pipeline failed
///
/// every variant is fatal for its own pipeline only. siblings in the same
/// session keep running unless the whole session is cancelled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// the client filename would land outside the storage root
    #[error("invalid path: {0}")]
    Path(String),

    /// opening or writing the destination failed
    #[error("I/O error: {0}")]
    Io(String),

    /// the incoming part stream broke mid-transfer
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("upload cancelled")]
    Cancelled,
}

impl PipelineError {
    /// stable tag used in json responses
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Path(_) => "path",
            PipelineError::Io(_) => "io",
            PipelineError::Upstream(_) => "upstream",
            PipelineError::Cancelled => "cancelled",
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::Io(e.to_string())
    }
}
