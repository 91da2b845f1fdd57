//! In-process cookie game implementing [`Surface`].
//!
//! Renders the same element ids and text shapes as the browser experiment so
//! the agents can run end-to-end without a driver. Income accrues with wall
//! time; building prices grow by 10% per unit owned, rounded to whole cookies.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::SurfaceError;
use crate::core::types::ControlState;
use crate::io::surface::Surface;

const BUDGET_ID: &str = "money";
const PRIMARY_ID: &str = "cookie";
const RATE_ID: &str = "cps";
const IMPORT_ID: &str = "importSave";
const SAVE_FUNCTION: &str = "MakeSaveString";
const PRICE_GROWTH: f64 = 1.1;

#[derive(Debug, Clone)]
struct Building {
    id: &'static str,
    name: &'static str,
    base_cost: f64,
    rate: f64,
    /// One-off purchases disappear once bought.
    max_owned: Option<u32>,
    owned: u32,
}

impl Building {
    const fn new(id: &'static str, name: &'static str, base_cost: f64, rate: f64) -> Self {
        Self {
            id,
            name,
            base_cost,
            rate,
            max_owned: None,
            owned: 0,
        }
    }

    fn price(&self) -> u64 {
        (self.base_cost * PRICE_GROWTH.powi(self.owned as i32)).round() as u64
    }

    fn sold_out(&self) -> bool {
        self.max_owned.is_some_and(|max| self.owned >= max)
    }
}

fn stock_buildings() -> Vec<Building> {
    vec![
        Building::new("buyCursor", "Cursor", 15.0, 0.1),
        Building::new("buyGrandma", "Grandma", 100.0, 0.5),
        Building::new("buyFactory", "Factory", 500.0, 4.0),
        Building::new("buyMine", "Mine", 2_000.0, 10.0),
        Building::new("buyShipment", "Shipment", 7_000.0, 20.0),
        Building::new("buyAlchemy lab", "Alchemy lab", 50_000.0, 100.0),
        Building::new("buyPortal", "Portal", 1_000_000.0, 1_666.0),
        Building::new("buyTime machine", "Time machine", 123_456_789.0, 98_765.0),
        Building {
            max_owned: Some(1),
            ..Building::new("buyElder Pledge", "Elder Pledge", 666_666.0, 0.0)
        },
    ]
}

#[derive(Debug, Serialize, Deserialize)]
struct SimSave {
    cookies: u64,
    earned: u64,
    owned: Vec<u32>,
}

#[derive(Debug)]
struct SimState {
    cookies: f64,
    earned: f64,
    buildings: Vec<Building>,
    last_tick: Instant,
    clicks: u64,
    prompt_open: bool,
    closed: bool,
}

impl SimState {
    fn cps(&self) -> f64 {
        self.buildings
            .iter()
            .map(|b| b.rate * f64::from(b.owned))
            .sum()
    }

    fn tick(&mut self) {
        let now = Instant::now();
        let earned = self.cps() * now.duration_since(self.last_tick).as_secs_f64();
        self.cookies += earned;
        self.earned += earned;
        self.last_tick = now;
    }

    fn building(&self, id: &str) -> Option<usize> {
        self.buildings.iter().position(|b| b.id == id)
    }

    fn save_string(&self) -> String {
        let save = SimSave {
            cookies: self.cookies.floor() as u64,
            earned: self.earned.floor() as u64,
            owned: self.buildings.iter().map(|b| b.owned).collect(),
        };
        serde_json::to_string(&save).unwrap_or_default()
    }

    fn load_save(&mut self, text: &str) -> Result<(), SurfaceError> {
        let save: SimSave = serde_json::from_str(text)
            .map_err(|e| SurfaceError::ImportRejected(format!("malformed save: {e}")))?;
        if save.owned.len() != self.buildings.len() {
            return Err(SurfaceError::ImportRejected(format!(
                "save lists {} buildings, game has {}",
                save.owned.len(),
                self.buildings.len()
            )));
        }
        self.cookies = save.cookies as f64;
        self.earned = save.earned as f64;
        for (building, owned) in self.buildings.iter_mut().zip(save.owned) {
            building.owned = owned;
        }
        self.last_tick = Instant::now();
        Ok(())
    }
}

/// Simulated game window.
pub struct SimulatedGame {
    state: Mutex<SimState>,
    click_limit: Option<u64>,
}

impl Default for SimulatedGame {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedGame {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                cookies: 0.0,
                earned: 0.0,
                buildings: stock_buildings(),
                last_tick: Instant::now(),
                clicks: 0,
                prompt_open: false,
                closed: false,
            }),
            click_limit: None,
        }
    }

    /// Close the window once `limit` primary clicks have landed.
    pub fn with_click_limit(mut self, limit: u64) -> Self {
        self.click_limit = Some(limit);
        self
    }

    /// Start with a given bank, e.g. to exercise buying right away.
    pub fn with_cookies(self, cookies: u64) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.cookies = cookies as f64;
            state.earned = cookies as f64;
        }
        self
    }

    /// Primary clicks that landed so far.
    pub fn clicks(&self) -> u64 {
        self.state.lock().map(|s| s.clicks).unwrap_or_default()
    }

    /// Units owned of the building behind `id`.
    pub fn owned(&self, id: &str) -> Option<u32> {
        let state = self.state.lock().ok()?;
        state.building(id).map(|idx| state.buildings[idx].owned)
    }

    fn open(&self) -> Result<MutexGuard<'_, SimState>, SurfaceError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| SurfaceError::Disconnected("simulation state poisoned".to_string()))?;
        if state.closed {
            return Err(SurfaceError::Disconnected("game window closed".to_string()));
        }
        state.tick();
        Ok(state)
    }
}

impl Surface for SimulatedGame {
    fn text(&self, id: &str) -> Result<String, SurfaceError> {
        let state = self.open()?;
        match id {
            BUDGET_ID => Ok(format_grouped(state.cookies.floor() as u64)),
            RATE_ID => Ok(format!("per second : {:.1}", state.cps())),
            _ => {
                let idx = state
                    .building(id)
                    .ok_or_else(|| SurfaceError::read(id, "no such element"))?;
                let building = &state.buildings[idx];
                Ok(format!(
                    "{} - {}\n{}",
                    building.name,
                    format_grouped(building.price()),
                    building.owned
                ))
            }
        }
    }

    fn control_state(&self, id: &str) -> Result<ControlState, SurfaceError> {
        let state = self.open()?;
        match id {
            PRIMARY_ID | IMPORT_ID | BUDGET_ID | RATE_ID => Ok(ControlState::READY),
            _ => {
                let Some(idx) = state.building(id) else {
                    return Ok(ControlState::HIDDEN);
                };
                let building = &state.buildings[idx];
                let displayed = !building.sold_out()
                    && (building.owned > 0 || state.earned >= building.base_cost);
                Ok(ControlState {
                    displayed,
                    enabled: displayed && state.cookies >= building.price() as f64,
                })
            }
        }
    }

    fn click(&self, id: &str) -> Result<(), SurfaceError> {
        let mut state = self.open()?;
        match id {
            PRIMARY_ID => {
                if self.click_limit.is_some_and(|limit| state.clicks >= limit) {
                    state.closed = true;
                    return Err(SurfaceError::Disconnected("game window closed".to_string()));
                }
                state.clicks += 1;
                state.cookies += 1.0;
                state.earned += 1.0;
                Ok(())
            }
            IMPORT_ID => {
                state.prompt_open = true;
                Ok(())
            }
            _ => {
                let idx = state
                    .building(id)
                    .ok_or_else(|| SurfaceError::StaleReference(id.to_string()))?;
                if state.buildings[idx].sold_out() {
                    return Err(SurfaceError::StaleReference(id.to_string()));
                }
                let price = state.buildings[idx].price() as f64;
                if state.cookies >= price {
                    state.cookies -= price;
                    state.buildings[idx].owned += 1;
                    debug!(id, owned = state.buildings[idx].owned, "simulated purchase");
                }
                Ok(())
            }
        }
    }

    fn run_script(&self, script: &str) -> Result<String, SurfaceError> {
        let state = self.open()?;
        if script.contains(SAVE_FUNCTION) {
            Ok(state.save_string())
        } else {
            Err(SurfaceError::read(script, "unsupported script"))
        }
    }

    fn wait_for_prompt(&self, _timeout: Duration) -> Result<(), SurfaceError> {
        let state = self.open()?;
        if state.prompt_open {
            Ok(())
        } else {
            Err(SurfaceError::ImportRejected(
                "no confirmation prompt".to_string(),
            ))
        }
    }

    fn answer_prompt(&self, text: &str) -> Result<(), SurfaceError> {
        let mut state = self.open()?;
        if !state.prompt_open {
            return Err(SurfaceError::ImportRejected(
                "no confirmation prompt".to_string(),
            ));
        }
        state.prompt_open = false;
        state.load_save(text)
    }
}

/// Render `1234567` as `"1,234,567"`.
pub fn format_grouped(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parse::{parse_budget, parse_store_entry};

    #[test]
    fn format_grouped_inserts_separators() {
        assert_eq!(format_grouped(0), "0");
        assert_eq!(format_grouped(999), "999");
        assert_eq!(format_grouped(1_000), "1,000");
        assert_eq!(format_grouped(123_456_789), "123,456,789");
    }

    #[test]
    fn renders_texts_the_parsers_accept() {
        let game = SimulatedGame::new().with_cookies(1_500);
        let budget = parse_budget("money", &game.text("money").expect("money")).expect("parse");
        assert_eq!(budget, 1_500);
        let (description, price) =
            parse_store_entry("buyGrandma", &game.text("buyGrandma").expect("grandma"))
                .expect("parse");
        assert_eq!(description, "Grandma");
        assert_eq!(price, 100);
    }

    #[test]
    fn purchase_deducts_price_and_raises_next_price() {
        let game = SimulatedGame::new().with_cookies(200);
        assert!(game.control_state("buyGrandma").expect("state").available());
        game.click("buyGrandma").expect("buy");
        assert_eq!(game.owned("buyGrandma"), Some(1));
        let (_, price) =
            parse_store_entry("buyGrandma", &game.text("buyGrandma").expect("text")).expect("parse");
        assert_eq!(price, 110);
        let budget = parse_budget("money", &game.text("money").expect("money")).expect("parse");
        assert!(budget >= 100);
    }

    #[test]
    fn locked_buildings_are_hidden() {
        let game = SimulatedGame::new();
        assert_eq!(
            game.control_state("buyPortal").expect("state"),
            ControlState::HIDDEN
        );
        assert_eq!(
            game.control_state("buyUnknown").expect("state"),
            ControlState::HIDDEN
        );
    }

    #[test]
    fn one_off_building_disappears_after_purchase() {
        let game = SimulatedGame::new().with_cookies(700_000);
        assert!(game.control_state("buyElder Pledge").expect("state").available());
        game.click("buyElder Pledge").expect("buy");
        assert!(!game.control_state("buyElder Pledge").expect("state").displayed);
        assert_eq!(
            game.click("buyElder Pledge"),
            Err(SurfaceError::StaleReference("buyElder Pledge".to_string()))
        );
    }

    #[test]
    fn window_closes_after_click_limit() {
        let game = SimulatedGame::new().with_click_limit(3);
        for _ in 0..3 {
            game.click("cookie").expect("click");
        }
        assert!(matches!(
            game.click("cookie"),
            Err(SurfaceError::Disconnected(_))
        ));
        assert!(matches!(game.text("money"), Err(SurfaceError::Disconnected(_))));
        assert_eq!(game.clicks(), 3);
    }

    #[test]
    fn save_import_restores_state() {
        let source = SimulatedGame::new().with_cookies(200);
        source.click("buyGrandma").expect("buy");
        let blob = source.run_script("return MakeSaveString()").expect("save");

        let target = SimulatedGame::new();
        target.click("importSave").expect("open prompt");
        target
            .wait_for_prompt(Duration::from_millis(10))
            .expect("prompt");
        target.answer_prompt(&blob).expect("import");
        assert_eq!(target.owned("buyGrandma"), Some(1));
    }

    #[test]
    fn malformed_save_is_rejected() {
        let game = SimulatedGame::new();
        assert!(game.wait_for_prompt(Duration::from_millis(10)).is_err());
        game.click("importSave").expect("open prompt");
        assert!(matches!(
            game.answer_prompt("abc"),
            Err(SurfaceError::ImportRejected(_))
        ));
    }
}
