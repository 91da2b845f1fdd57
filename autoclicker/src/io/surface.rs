//! Surface abstraction for the live game UI.
//!
//! The [`Surface`] trait decouples the agents from the actual UI backend
//! (currently a WebDriver-controlled browser or the in-process simulation).
//! Tests use scripted surfaces that return predetermined values without a
//! browser.
//!
//! Every primitive addresses a control by element id and performs a fresh
//! lookup, so nothing returned here survives a change on the page.

use std::time::Duration;

use crate::core::error::SurfaceError;
use crate::core::types::ControlState;

/// Element-level access to the game page.
///
/// Implementations are shared across the foreground loop and every periodic
/// task, so every method takes `&self`.
pub trait Surface: Send + Sync {
    /// Rendered text of an element.
    fn text(&self, id: &str) -> Result<String, SurfaceError>;

    /// Whether an element is rendered and accepts input.
    fn control_state(&self, id: &str) -> Result<ControlState, SurfaceError>;

    /// Click an element.
    fn click(&self, id: &str) -> Result<(), SurfaceError>;

    /// Evaluate a page script and return its value as text.
    fn run_script(&self, script: &str) -> Result<String, SurfaceError>;

    /// Block until a confirmation prompt is open, or fail after `timeout`.
    fn wait_for_prompt(&self, timeout: Duration) -> Result<(), SurfaceError>;

    /// Type `text` into the open prompt and accept it.
    fn answer_prompt(&self, text: &str) -> Result<(), SurfaceError>;
}
