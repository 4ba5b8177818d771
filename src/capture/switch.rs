use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Capture-enabled flag shared between a session and the thread that hosts
/// the capture hook.
///
/// Every read and write is a sequentially consistent atomic operation, so
/// toggling from a render thread never races with the pacer reading it.
#[derive(Debug, Clone)]
pub struct CaptureSwitch {
    active: Arc<AtomicBool>,
}

impl CaptureSwitch {
    pub fn new(active: bool) -> Self {
        Self {
            active: Arc::new(AtomicBool::new(active)),
        }
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Default for CaptureSwitch {
    fn default() -> Self {
        Self::new(false)
    }
}
