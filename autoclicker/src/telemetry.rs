//! Periodic income-rate reporting.

use tracing::{debug, info};

use crate::io::surface::Surface;
use crate::reader::StateReader;

/// One observation of the displayed income rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateSample {
    /// `None` when the rate could not be read; reported as an empty value.
    pub value: Option<String>,
}

impl RateSample {
    pub fn display_value(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }
}

pub struct TelemetryAgent<S> {
    reader: StateReader<S>,
}

impl<S: Surface> TelemetryAgent<S> {
    pub fn new(reader: StateReader<S>) -> Self {
        Self { reader }
    }

    /// Read and log the current rate. Never fails; a bad read logs a blank.
    pub fn sample(&self) -> RateSample {
        let value = match self.reader.read_rate() {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(err = %err, "rate unreadable");
                None
            }
        };
        let sample = RateSample { value };
        info!(cps = sample.display_value(), "current income rate");
        sample
    }
}
