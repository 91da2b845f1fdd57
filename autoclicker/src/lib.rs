//! Unattended agent for an incremental clicker game.
//!
//! A single session drives the game UI from several concurrent activities:
//! a foreground loop that clicks the primary control, a periodic greedy
//! allocator that spends the budget on store items, periodic save export and
//! periodic income-rate reporting. The crate is split the same way:
//!
//! - **[`core`]**: Pure, deterministic logic (data model, text parsing, the
//!   price-ordered allocation plan). No I/O.
//! - **[`io`]**: Side effects (config and save files, the [`io::surface::Surface`]
//!   boundary and its WebDriver and simulated implementations).
//!
//! Orchestration modules ([`allocator`], [`persistence`], [`telemetry`],
//! [`input_loop`], [`scheduler`]) combine the two, and [`session`] wires them
//! together in startup order.

pub mod allocator;
pub mod core;
pub mod exit_codes;
pub mod input_loop;
pub mod io;
pub mod logging;
pub mod persistence;
pub mod reader;
pub mod scheduler;
pub mod session;
pub mod telemetry;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
