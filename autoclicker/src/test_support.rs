//! Test-only helpers: a scripted in-memory surface and catalog fixtures.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::core::error::SurfaceError;
use crate::core::types::{CatalogItem, ControlState, ItemHandle};
use crate::io::config::ClickerConfig;
use crate::io::sim::format_grouped;
use crate::io::surface::Surface;

/// Create a catalog entry with the handle pointing at `id`.
pub fn catalog_item(id: &str, description: &str, price: u64, availability: bool) -> CatalogItem {
    CatalogItem {
        id: id.to_string(),
        description: description.to_string(),
        price,
        availability,
        handle: ItemHandle::new(id),
    }
}

/// Config with zero delays, a single short cadence and the save file under `dir`.
pub fn fast_config(dir: &Path, store_ids: &[&str]) -> ClickerConfig {
    let mut cfg = ClickerConfig {
        startup_delay_secs: 0,
        click_interval_ms: 0,
        buy_interval_secs: 1,
        settle_delay_ms: 0,
        telemetry_interval_secs: 1,
        store_ids: store_ids.iter().map(|id| id.to_string()).collect(),
        ..ClickerConfig::default()
    };
    cfg.save.interval_secs = 1;
    cfg.save.import_timeout_ms = 10;
    cfg.save.path = dir.join("save_data.txt");
    cfg
}

/// Store entry served by [`ScriptedSurface`].
#[derive(Debug, Clone)]
pub struct ScriptedItem {
    pub id: String,
    pub description: String,
    pub price: u64,
    pub state: ControlState,
    /// Clicks fail with [`SurfaceError::StaleReference`].
    pub stale: bool,
    /// The entry disappears after one purchase.
    pub one_off: bool,
}

impl ScriptedItem {
    pub fn new(id: &str, description: &str, price: u64) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            price,
            state: ControlState::READY,
            stale: false,
            one_off: false,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.state.enabled = false;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.state = ControlState::HIDDEN;
        self
    }

    pub fn stale(mut self) -> Self {
        self.stale = true;
        self
    }

    pub fn one_off(mut self) -> Self {
        self.one_off = true;
        self
    }
}

#[derive(Debug)]
struct Script {
    budget: Option<u64>,
    items: Vec<ScriptedItem>,
    rate_text: Option<String>,
    save: String,
    primary_limit: Option<u64>,
    primary_clicks: u64,
    prompt_available: bool,
    prompt_open: bool,
    reject_import: bool,
    purchases: Vec<String>,
    calls: Vec<String>,
}

/// In-memory surface with scripted values and failures.
///
/// Element ids follow [`crate::io::config::ElementIds::default`]. Purchases
/// deduct the listed price when the entry is available and affordable.
#[derive(Debug)]
pub struct ScriptedSurface {
    script: Mutex<Script>,
}

impl ScriptedSurface {
    pub fn new(budget: u64) -> Self {
        Self {
            script: Mutex::new(Script {
                budget: Some(budget),
                items: Vec::new(),
                rate_text: Some("per second : 0".to_string()),
                save: String::new(),
                primary_limit: None,
                primary_clicks: 0,
                prompt_available: true,
                prompt_open: false,
                reject_import: false,
                purchases: Vec::new(),
                calls: Vec::new(),
            }),
        }
    }

    pub fn with_item(self, item: ScriptedItem) -> Self {
        self.lock().items.push(item);
        self
    }

    pub fn with_unreadable_budget(self) -> Self {
        self.lock().budget = None;
        self
    }

    pub fn with_rate_text(self, text: Option<&str>) -> Self {
        self.lock().rate_text = text.map(str::to_string);
        self
    }

    /// Primary clicks after the first `limit` fail as if the window closed.
    pub fn with_primary_limit(self, limit: u64) -> Self {
        self.lock().primary_limit = Some(limit);
        self
    }

    pub fn with_save(self, blob: &str) -> Self {
        self.lock().save = blob.to_string();
        self
    }

    /// The import control never opens a confirmation prompt.
    pub fn without_prompt(self) -> Self {
        self.lock().prompt_available = false;
        self
    }

    /// The prompt opens but the game refuses whatever is entered.
    pub fn rejecting_imports(self) -> Self {
        self.lock().reject_import = true;
        self
    }

    pub fn budget(&self) -> Option<u64> {
        self.lock().budget
    }

    pub fn set_budget(&self, budget: u64) {
        self.lock().budget = Some(budget);
    }

    /// Ids of purchased entries, in purchase order.
    pub fn purchases(&self) -> Vec<String> {
        self.lock().purchases.clone()
    }

    /// Every surface call, in order, as `"<op>:<target>"`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn primary_clicks(&self) -> u64 {
        self.lock().primary_clicks
    }

    pub fn save(&self) -> String {
        self.lock().save.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        match self.script.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Surface for ScriptedSurface {
    fn text(&self, id: &str) -> Result<String, SurfaceError> {
        let mut script = self.lock();
        script.calls.push(format!("text:{id}"));
        match id {
            "money" => script
                .budget
                .map(format_grouped)
                .ok_or_else(|| SurfaceError::read(id, "scripted unreadable budget")),
            "cps" => script
                .rate_text
                .clone()
                .ok_or_else(|| SurfaceError::read(id, "scripted unreadable rate")),
            _ => script
                .items
                .iter()
                .find(|item| item.id == id)
                .map(|item| format!("{} - {}\n0", item.description, format_grouped(item.price)))
                .ok_or_else(|| SurfaceError::read(id, "no such element")),
        }
    }

    fn control_state(&self, id: &str) -> Result<ControlState, SurfaceError> {
        let mut script = self.lock();
        script.calls.push(format!("state:{id}"));
        Ok(script
            .items
            .iter()
            .find(|item| item.id == id)
            .map(|item| item.state)
            .unwrap_or(ControlState::HIDDEN))
    }

    fn click(&self, id: &str) -> Result<(), SurfaceError> {
        let mut script = self.lock();
        script.calls.push(format!("click:{id}"));
        match id {
            "cookie" => {
                if script
                    .primary_limit
                    .is_some_and(|limit| script.primary_clicks >= limit)
                {
                    return Err(SurfaceError::Disconnected("scripted window close".to_string()));
                }
                script.primary_clicks += 1;
                Ok(())
            }
            "importSave" => {
                script.prompt_open = script.prompt_available;
                Ok(())
            }
            _ => {
                let idx = script
                    .items
                    .iter()
                    .position(|item| item.id == id)
                    .ok_or_else(|| SurfaceError::StaleReference(id.to_string()))?;
                let item = script.items[idx].clone();
                if item.stale {
                    return Err(SurfaceError::StaleReference(id.to_string()));
                }
                let budget = script.budget.unwrap_or_default();
                if item.state.available() && budget >= item.price {
                    script.budget = Some(budget - item.price);
                    script.purchases.push(item.id.clone());
                    if item.one_off {
                        script.items[idx].state = ControlState::HIDDEN;
                    }
                }
                Ok(())
            }
        }
    }

    fn run_script(&self, script_text: &str) -> Result<String, SurfaceError> {
        let mut script = self.lock();
        script.calls.push("script:save".to_string());
        if !script_text.contains("MakeSaveString") {
            return Err(SurfaceError::read(script_text, "unsupported script"));
        }
        Ok(script.save.clone())
    }

    fn wait_for_prompt(&self, timeout: Duration) -> Result<(), SurfaceError> {
        let mut script = self.lock();
        script.calls.push("prompt:wait".to_string());
        if script.prompt_open {
            Ok(())
        } else {
            Err(SurfaceError::ImportRejected(format!(
                "no confirmation prompt within {timeout:?}"
            )))
        }
    }

    fn answer_prompt(&self, text: &str) -> Result<(), SurfaceError> {
        let mut script = self.lock();
        script.calls.push("prompt:answer".to_string());
        script.prompt_open = false;
        if script.reject_import {
            return Err(SurfaceError::ImportRejected("scripted rejection".to_string()));
        }
        script.save = text.to_string();
        Ok(())
    }
}
