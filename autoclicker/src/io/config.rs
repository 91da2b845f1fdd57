//! Clicker configuration stored in `autoclicker.toml`.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default config file name, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "autoclicker.toml";

/// Clicker configuration (TOML).
///
/// This file is intended to be edited by humans. Missing fields default to the
/// cadences of the stock cookie experiment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClickerConfig {
    /// Page the WebDriver session opens.
    pub game_url: String,

    /// Countdown before the session starts, so the page can finish loading.
    pub startup_delay_secs: u64,

    /// Pause between primary clicks in milliseconds (0 = no pause).
    pub click_interval_ms: u64,

    /// Delay between allocation passes, measured from the end of the previous pass.
    pub buy_interval_secs: u64,

    /// Wait after each purchase click before the budget is re-read.
    pub settle_delay_ms: u64,

    /// Delay between income-rate samples.
    pub telemetry_interval_secs: u64,

    /// Store entries considered for purchase. Order is irrelevant; the
    /// allocator re-sorts by price on every pass.
    pub store_ids: Vec<String>,

    pub save: SaveConfig,

    pub elements: ElementIds,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SaveConfig {
    /// Import at startup and export periodically.
    pub enabled: bool,

    /// Delay between exports.
    pub interval_secs: u64,

    /// One-line file holding the latest save blob.
    pub path: PathBuf,

    /// Bounded wait for the import confirmation prompt.
    pub import_timeout_ms: u64,
}

/// Element ids and scripts the agent addresses on the page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ElementIds {
    pub budget: String,
    pub primary: String,
    pub rate: String,
    pub import_control: String,
    pub save_script: String,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
            path: PathBuf::from("save_data.txt"),
            import_timeout_ms: 2_000,
        }
    }
}

impl Default for ElementIds {
    fn default() -> Self {
        Self {
            budget: "money".to_string(),
            primary: "cookie".to_string(),
            rate: "cps".to_string(),
            import_control: "importSave".to_string(),
            save_script: "return MakeSaveString()".to_string(),
        }
    }
}

impl Default for ClickerConfig {
    fn default() -> Self {
        Self {
            game_url: "https://orteil.dashnet.org/experiments/cookie/".to_string(),
            startup_delay_secs: 5,
            click_interval_ms: 0,
            buy_interval_secs: 30,
            settle_delay_ms: 500,
            telemetry_interval_secs: 15,
            store_ids: default_store_ids(),
            save: SaveConfig::default(),
            elements: ElementIds::default(),
        }
    }
}

/// Store ids of the stock cookie experiment.
pub fn default_store_ids() -> Vec<String> {
    [
        "buyElder Pledge",
        "buyTime machine",
        "buyPortal",
        "buyAlchemy lab",
        "buyShipment",
        "buyMine",
        "buyFactory",
        "buyGrandma",
        "buyCursor",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

impl ClickerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.buy_interval_secs == 0 {
            return Err(anyhow!("buy_interval_secs must be > 0"));
        }
        if self.telemetry_interval_secs == 0 {
            return Err(anyhow!("telemetry_interval_secs must be > 0"));
        }
        if self.save.interval_secs == 0 {
            return Err(anyhow!("save.interval_secs must be > 0"));
        }
        if self.save.import_timeout_ms == 0 {
            return Err(anyhow!("save.import_timeout_ms must be > 0"));
        }
        if self.save.path.as_os_str().is_empty() {
            return Err(anyhow!("save.path must not be empty"));
        }
        if self.store_ids.is_empty() {
            return Err(anyhow!("store_ids must be a non-empty array"));
        }
        let mut seen = HashSet::new();
        for id in &self.store_ids {
            if id.trim().is_empty() {
                return Err(anyhow!("store_ids must not contain blank ids"));
            }
            if !seen.insert(id.as_str()) {
                return Err(anyhow!("duplicate store id {id:?}"));
            }
        }
        let elements = [
            ("elements.budget", &self.elements.budget),
            ("elements.primary", &self.elements.primary),
            ("elements.rate", &self.elements.rate),
            ("elements.import_control", &self.elements.import_control),
            ("elements.save_script", &self.elements.save_script),
        ];
        for (name, value) in elements {
            if value.trim().is_empty() {
                return Err(anyhow!("{name} must not be empty"));
            }
        }
        Ok(())
    }

    pub fn click_interval(&self) -> Duration {
        Duration::from_millis(self.click_interval_ms)
    }

    pub fn buy_interval(&self) -> Duration {
        Duration::from_secs(self.buy_interval_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_secs(self.telemetry_interval_secs)
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save.interval_secs)
    }

    pub fn import_timeout(&self) -> Duration {
        Duration::from_millis(self.save.import_timeout_ms)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ClickerConfig::default()`.
pub fn load_config(path: &Path) -> Result<ClickerConfig> {
    if !path.exists() {
        let cfg = ClickerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ClickerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ClickerConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, ClickerConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("autoclicker.toml");
        let cfg = ClickerConfig {
            click_interval_ms: 10,
            store_ids: vec!["buyCursor".to_string()],
            ..ClickerConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("autoclicker.toml");
        fs::write(&path, "buy_interval_secs = 5\n[save]\nenabled = false\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.buy_interval(), Duration::from_secs(5));
        assert!(!cfg.save.enabled);
        assert_eq!(cfg.save.interval_secs, 60);
        assert_eq!(cfg.store_ids, default_store_ids());
        assert_eq!(cfg.elements.primary, "cookie");
    }

    #[test]
    fn rejects_duplicate_store_ids() {
        let cfg = ClickerConfig {
            store_ids: vec!["buyCursor".to_string(), "buyCursor".to_string()],
            ..ClickerConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate store id"));
    }

    #[test]
    fn rejects_zero_intervals() {
        let cfg = ClickerConfig {
            buy_interval_secs: 0,
            ..ClickerConfig::default()
        };
        assert!(cfg.validate().is_err());

        let mut cfg = ClickerConfig::default();
        cfg.save.interval_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_blank_element_ids() {
        let mut cfg = ClickerConfig::default();
        cfg.elements.primary = " ".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("elements.primary"));
    }
}
