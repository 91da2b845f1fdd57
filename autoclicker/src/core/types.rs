//! Shared deterministic types for the clicker core.
//!
//! Every value here is a snapshot of what the game surface showed at one
//! instant. None of them outlive a single allocation pass, so none of them
//! carry staleness bookkeeping.

use std::fmt;

/// Spendable amount read from the surface.
pub type Budget = u64;

/// Opaque reference to a purchasable control on the surface.
///
/// A handle is only a lookup key. Whether the control behind it is still
/// usable is re-queried immediately before every click.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemHandle(String);

impl ItemHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Interactability of a control as reported by the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlState {
    /// The control is rendered.
    pub displayed: bool,
    /// The control accepts input (not greyed out).
    pub enabled: bool,
}

impl ControlState {
    pub const HIDDEN: Self = Self {
        displayed: false,
        enabled: false,
    };
    pub const READY: Self = Self {
        displayed: true,
        enabled: true,
    };

    /// Available means interactable, not merely present.
    pub fn available(self) -> bool {
        self.displayed && self.enabled
    }
}

/// One store entry as seen during a single pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    /// Configured store id the entry was read from.
    pub id: String,
    pub description: String,
    pub price: Budget,
    pub availability: bool,
    pub handle: ItemHandle,
}

/// A purchase the allocator completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    pub description: String,
    pub price: Budget,
    /// Budget re-read after the settle delay; `None` when that read failed.
    pub budget_after: Option<Budget>,
}

/// Opaque serialized game state.
///
/// The agent never parses it: whatever was exported is what gets imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveBlob(String);

impl SaveBlob {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// A blob with a line break cannot live in a one-line save file.
    pub fn is_single_line(&self) -> bool {
        !self.0.contains(['\n', '\r'])
    }
}

impl fmt::Display for SaveBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
