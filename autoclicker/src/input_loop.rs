//! Foreground primary-click loop.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{info, instrument};

use crate::core::error::SurfaceError;
use crate::io::surface::Surface;

/// Why and after how many clicks the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputLoopOutcome {
    /// Successful primary clicks.
    pub clicks: u64,
    pub error: SurfaceError,
}

/// Clicks the primary control until a click fails.
///
/// The loop has no stop condition of its own. The first failed click, most
/// often the game window going away, ends it and is reported to the caller.
pub struct InputLoop<S> {
    surface: Arc<S>,
    primary: String,
    pause: Duration,
}

impl<S: Surface> InputLoop<S> {
    pub fn new(surface: Arc<S>, primary: impl Into<String>, pause: Duration) -> Self {
        Self {
            surface,
            primary: primary.into(),
            pause,
        }
    }

    #[instrument(skip_all, fields(primary = %self.primary))]
    pub fn run(&self) -> InputLoopOutcome {
        let mut clicks = 0u64;
        loop {
            if let Err(error) = self.surface.click(&self.primary) {
                info!(clicks, err = %error, "input loop stopped");
                return InputLoopOutcome { clicks, error };
            }
            clicks += 1;
            if !self.pause.is_zero() {
                thread::sleep(self.pause);
            }
        }
    }
}
