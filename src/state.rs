use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::events::SubscriberHub;
use crate::session::UploadOrchestrator;

/// shared application state
#[derive(Clone)]
pub struct AppState {
    /// storage root every upload lands in
    pub files_dir: PathBuf,
    /// minimum spacing between progress notifications per file
    pub progress_delay: Duration,
    /// live progress subscribers, also the notifier used by uploads
    pub hub: Arc<SubscriberHub>,
    pub orchestrator: UploadOrchestrator,
}

impl AppState {
    /// create a new app state with the given files directory
    pub fn new(files_dir: PathBuf, progress_delay: Duration) -> Self {
        Self::with_clock(files_dir, progress_delay, Arc::new(SystemClock))
    }

    pub fn with_clock(files_dir: PathBuf, progress_delay: Duration, clock: Arc<dyn Clock>) -> Self {
        let hub = Arc::new(SubscriberHub::new());
        let orchestrator = UploadOrchestrator::new(hub.clone(), clock);
        Self {
            files_dir,
            progress_delay,
            hub,
            orchestrator,
        }
    }
}
