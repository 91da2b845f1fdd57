//! Stable exit codes for the autoclicker CLI.

/// Command succeeded, or the session ran until the game stopped responding.
pub const OK: i32 = 0;
/// Invalid configuration or a startup error (config file, driver session).
pub const INVALID: i32 = 1;
