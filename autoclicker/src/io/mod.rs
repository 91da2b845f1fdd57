//! Side-effecting operations: config and save files, the game surface.
//!
//! Everything that touches the filesystem, the network or a browser lives
//! here so the agents can be tested against scripted surfaces.

pub mod config;
pub mod save_store;
pub mod sim;
pub mod surface;
pub mod webdriver;
