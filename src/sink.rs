use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::PipelineError;
use crate::utils::validate_filename;

/// map a client filename to its destination inside `root`
///
/// nothing is touched on disk; this runs before any sink is opened.
pub fn resolve_target(root: &Path, filename: &str) -> Result<PathBuf, PipelineError> {
    validate_filename(filename)?;

    let target = root.join(filename);
    if target.parent() != Some(root) {
        return Err(PipelineError::Path(format!(
            "{} resolves outside {}",
            filename,
            root.display()
        )));
    }

    Ok(target)
}

/// byte destination a pipeline writes into
///
/// `finish` runs once after the last chunk and must make the written
/// bytes durable before the pipeline may report completion.
pub trait Destination: AsyncWrite + Unpin + Send {
    fn finish(&mut self) -> impl Future<Output = io::Result<()>> + Send;
}

/// append-only destination for one uploaded file
///
/// a dropped sink closes its handle and leaves whatever was written on disk.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: File,
}

impl FileSink {
    pub async fn open(root: &Path, filename: &str) -> Result<Self, PipelineError> {
        let path = resolve_target(root, filename)?;
        Self::create(path).await
    }

    /// open an already resolved target
    pub async fn create(path: PathBuf) -> Result<Self, PipelineError> {
        let file = File::create(&path).await.map_err(|e| {
            tracing::error!("Failed to create file {:?}: {}", path, e);
            PipelineError::Io(format!("failed to create {}: {}", path.display(), e))
        })?;
        tracing::trace!("Opened sink at {:?}", path);
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Destination for FileSink {
    async fn finish(&mut self) -> io::Result<()> {
        self.file.flush().await?;
        self.file.sync_all().await.inspect_err(|e| {
            tracing::error!("Failed to sync file {:?}: {}", self.path, e);
        })
    }
}

impl AsyncWrite for FileSink {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.file).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_shutdown(cx)
    }
}
