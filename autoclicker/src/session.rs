//! Session wiring: startup ordering, periodic tasks and the foreground loop.
//!
//! The save import runs to completion before anything else touches the page,
//! so no purchase or click can happen against the pre-import game state.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::allocator::Allocator;
use crate::core::error::SurfaceError;
use crate::input_loop::InputLoop;
use crate::io::config::ClickerConfig;
use crate::io::save_store::SaveStore;
use crate::io::surface::Surface;
use crate::persistence::{ImportOutcome, PersistenceAgent};
use crate::reader::StateReader;
use crate::scheduler::{PeriodicTask, Scheduler, TaskStatus};
use crate::telemetry::TelemetryAgent;

pub const BUY_TASK: &str = "buy";
pub const EXPORT_TASK: &str = "export";
pub const TELEMETRY_TASK: &str = "telemetry";

/// Summary of a finished session.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// `None` when saving is disabled.
    pub import: Option<ImportOutcome>,
    /// Successful primary clicks.
    pub clicks: u64,
    /// The failure that ended the foreground loop.
    pub stop_reason: SurfaceError,
    /// Task states as of the moment the foreground loop ended.
    pub tasks: Vec<TaskStatus>,
}

impl SessionOutcome {
    /// How often the named task was started.
    pub fn runs(&self, name: &str) -> u64 {
        self.tasks
            .iter()
            .find(|task| task.name == name)
            .map_or(0, |task| task.runs)
    }
}

/// Run a full session until the primary action fails.
///
/// Only startup errors (such as failing to spawn threads) are returned as
/// `Err`; the end of the session itself is reported through
/// [`SessionOutcome::stop_reason`].
#[instrument(skip_all)]
pub fn run_session<S>(surface: Arc<S>, config: &ClickerConfig) -> Result<SessionOutcome>
where
    S: Surface + 'static,
{
    let persistence = config.save.enabled.then(|| {
        PersistenceAgent::new(
            Arc::clone(&surface),
            SaveStore::new(&config.save.path),
            config.elements.clone(),
            config.import_timeout(),
        )
    });
    let import = persistence.as_ref().map(PersistenceAgent::import);

    let reader = StateReader::new(
        Arc::clone(&surface),
        config.elements.clone(),
        config.store_ids.clone(),
    );
    let mut scheduler = Scheduler::new();

    let allocator = Allocator::new(reader.clone(), config.settle_delay());
    let buy_interval = config.buy_interval();
    scheduler.add(PeriodicTask::new(BUY_TASK, buy_interval, move || {
        let report = allocator.run_pass();
        info!(
            purchases = report.purchases.len(),
            in_secs = buy_interval.as_secs(),
            "next buy scheduled"
        );
    }));

    if let Some(persistence) = persistence {
        scheduler.add(PeriodicTask::new(
            EXPORT_TASK,
            config.save_interval(),
            move || {
                if let Err(err) = persistence.export() {
                    warn!(err = %format!("{err:#}"), "save export failed");
                }
            },
        ));
    }

    let telemetry = TelemetryAgent::new(reader);
    scheduler.add(PeriodicTask::new(
        TELEMETRY_TASK,
        config.telemetry_interval(),
        move || {
            telemetry.sample();
        },
    ));

    let handle = scheduler.start()?;
    let outcome = InputLoop::new(
        surface,
        config.elements.primary.clone(),
        config.click_interval(),
    )
    .run();
    let tasks = handle.tasks();
    handle.shutdown();

    info!(clicks = outcome.clicks, reason = %outcome.error, "session ended");
    Ok(SessionOutcome {
        import,
        clicks: outcome.clicks,
        stop_reason: outcome.error,
        tasks,
    })
}
