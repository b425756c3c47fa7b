use std::path::{Component, Path};

use crate::error::PipelineError;

/// reject client filenames that could escape the storage root
///
/// uploads land flat in the root, so anything that is not a single plain
/// path component is refused rather than rewritten.
pub fn validate_filename(filename: &str) -> Result<(), PipelineError> {
    if filename.is_empty() {
        return Err(PipelineError::Path("empty filename".into()));
    }

    if filename.contains('\0') {
        return Err(PipelineError::Path(format!("nul byte in filename: {filename:?}")));
    }

    // backslash is a separator on windows clients even when we run on unix
    if filename.contains('/') || filename.contains('\\') {
        return Err(PipelineError::Path(format!(
            "path separators not allowed: {filename}"
        )));
    }

    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        (Some(Component::ParentDir), _) | (Some(Component::CurDir), _) => Err(
            PipelineError::Path(format!("directory reference not allowed: {filename}")),
        ),
        _ => Err(PipelineError::Path(format!("not a plain filename: {filename}"))),
    }
}

/// resolves once ctrl-c or sigterm arrives
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
