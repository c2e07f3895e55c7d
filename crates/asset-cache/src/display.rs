//! Consumer-side bookkeeping for whatever is currently on screen
//!
//! A viewer polls its upstream state and calls `DisplaySlot::refresh` with
//! the latest `(id, locator)`. The slot skips the cache entirely when
//! nothing changed, and reports each new handle exactly once so the viewer
//! can run one transition (e.g. a cross-fade) while the previous handle is
//! still displayable.

use crate::cache::AssetCache;
use crate::error::Result;
use crate::handle::Handle;
use crate::types::{AssetId, SourceLocator};
use tracing::debug;

/// A hand-off from the displayed handle to a new one
#[derive(Debug)]
pub struct Transition<T> {
    pub previous: Option<Handle<T>>,
    pub next: Handle<T>,
}

struct Displayed<T> {
    id: AssetId,
    locator: SourceLocator,
    handle: Handle<T>,
}

pub struct DisplaySlot<T> {
    current: Option<Displayed<T>>,
}

impl<T: Send + Sync + 'static> DisplaySlot<T> {
    pub fn new() -> Self {
        Self { current: None }
    }

    pub fn current(&self) -> Option<&Handle<T>> {
        self.current.as_ref().map(|d| &d.handle)
    }

    pub fn current_id(&self) -> Option<&AssetId> {
        self.current.as_ref().map(|d| &d.id)
    }

    /// Bring the slot up to date with `(id, locator)`.
    ///
    /// Returns `Some(transition)` only when the resolved handle differs from
    /// the displayed one. On error the displayed handle is kept.
    pub async fn refresh(
        &mut self,
        cache: &AssetCache<T>,
        id: &AssetId,
        locator: &SourceLocator,
    ) -> Result<Option<Transition<T>>> {
        if let Some(shown) = &self.current {
            if shown.id == *id && shown.locator == *locator {
                return Ok(None);
            }
        }

        let handle = cache.resolve(id, locator).await?;

        if let Some(shown) = &mut self.current {
            if shown.handle == handle {
                shown.id = id.clone();
                shown.locator = locator.clone();
                return Ok(None);
            }
        }

        debug!(id = %id, locator = %locator, "New asset ready for display");

        let previous = self
            .current
            .replace(Displayed {
                id: id.clone(),
                locator: locator.clone(),
                handle: handle.clone(),
            })
            .map(|d| d.handle);

        Ok(Some(Transition {
            previous,
            next: handle,
        }))
    }

    /// Stop displaying anything, returning what was shown
    pub fn clear(&mut self) -> Option<Handle<T>> {
        self.current.take().map(|d| d.handle)
    }
}

impl<T: Send + Sync + 'static> Default for DisplaySlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
