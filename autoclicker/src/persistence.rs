//! Save import at startup and periodic save export.
//!
//! The blob is passed through untouched in both directions: the bytes read
//! from the save file are the bytes typed into the import prompt, and the
//! string the page produces is the string written to disk.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::types::SaveBlob;
use crate::io::config::ElementIds;
use crate::io::save_store::SaveStore;
use crate::io::surface::Surface;

/// Result of the startup import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported(SaveBlob),
    /// Import did not happen; the game keeps its own default state.
    Skipped(String),
}

pub struct PersistenceAgent<S> {
    surface: Arc<S>,
    store: SaveStore,
    elements: ElementIds,
    import_timeout: Duration,
}

impl<S: Surface> PersistenceAgent<S> {
    pub fn new(
        surface: Arc<S>,
        store: SaveStore,
        elements: ElementIds,
        import_timeout: Duration,
    ) -> Self {
        Self {
            surface,
            store,
            elements,
            import_timeout,
        }
    }

    /// Feed the saved blob to the game. Any failure is logged and skipped.
    #[instrument(skip_all, fields(path = %self.store.path().display()))]
    pub fn import(&self) -> ImportOutcome {
        match self.try_import() {
            Ok(blob) => {
                info!(bytes = blob.as_str().len(), "save imported");
                ImportOutcome::Imported(blob)
            }
            Err(err) => {
                warn!(err = %format!("{err:#}"), "unable to import save file");
                ImportOutcome::Skipped(format!("{err:#}"))
            }
        }
    }

    fn try_import(&self) -> Result<SaveBlob> {
        let blob = self.store.load()?;
        self.surface
            .click(&self.elements.import_control)
            .context("open import dialog")?;
        self.surface
            .wait_for_prompt(self.import_timeout)
            .context("wait for import prompt")?;
        self.surface
            .answer_prompt(blob.as_str())
            .context("submit save blob")?;
        Ok(blob)
    }

    /// Ask the game for its save string and overwrite the save file with it.
    pub fn export(&self) -> Result<SaveBlob> {
        let raw = self
            .surface
            .run_script(&self.elements.save_script)
            .context("produce save string")?;
        let blob = SaveBlob::new(raw);
        self.store.store(&blob)?;
        info!(save = %blob, "save exported");
        Ok(blob)
    }
}
