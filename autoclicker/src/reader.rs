//! Fresh reads of budget, catalog and income rate from the surface.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::core::error::SurfaceError;
use crate::core::parse::{parse_budget, parse_rate, parse_store_entry};
use crate::core::types::{Budget, CatalogItem, ItemHandle};
use crate::io::config::ElementIds;
use crate::io::surface::Surface;

/// Reads typed snapshots off the surface. Nothing is cached between calls.
pub struct StateReader<S> {
    surface: Arc<S>,
    elements: ElementIds,
    store_ids: Vec<String>,
}

impl<S> Clone for StateReader<S> {
    fn clone(&self) -> Self {
        Self {
            surface: Arc::clone(&self.surface),
            elements: self.elements.clone(),
            store_ids: self.store_ids.clone(),
        }
    }
}

impl<S: Surface> StateReader<S> {
    pub fn new(surface: Arc<S>, elements: ElementIds, store_ids: Vec<String>) -> Self {
        Self {
            surface,
            elements,
            store_ids,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn read_budget(&self) -> Result<Budget, SurfaceError> {
        let id = &self.elements.budget;
        let text = self.surface.text(id)?;
        parse_budget(id, &text)
    }

    /// Build a catalog snapshot from every displayed store entry.
    ///
    /// Entries that are not rendered are left out; rendered but disabled
    /// entries are kept with `availability = false`.
    #[instrument(skip_all, fields(store_ids = self.store_ids.len()))]
    pub fn read_catalog(&self) -> Result<Vec<CatalogItem>, SurfaceError> {
        let mut items = Vec::with_capacity(self.store_ids.len());
        for id in &self.store_ids {
            let state = self.surface.control_state(id)?;
            if !state.displayed {
                continue;
            }
            let text = self.surface.text(id)?;
            let (description, price) = parse_store_entry(id, &text)?;
            items.push(CatalogItem {
                id: id.clone(),
                description,
                price,
                availability: state.available(),
                handle: ItemHandle::new(id.as_str()),
            });
        }
        debug!(displayed = items.len(), "catalog snapshot built");
        Ok(items)
    }

    /// Re-query a handle right before acting on it.
    pub fn is_available(&self, handle: &ItemHandle) -> Result<bool, SurfaceError> {
        Ok(self.surface.control_state(handle.as_str())?.available())
    }

    /// Current income rate as displayed.
    pub fn read_rate(&self) -> Result<String, SurfaceError> {
        let id = &self.elements.rate;
        let text = self.surface.text(id)?;
        parse_rate(&text).ok_or_else(|| SurfaceError::read(id, format!("no value in {text:?}")))
    }
}
