//! Last-seen locator per asset id

use crate::types::{AssetId, SourceLocator};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

/// Outcome of comparing a requested locator with the last one seen for an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorChange {
    Unseen,
    Unchanged,
    Changed { previous: SourceLocator },
}

/// Detects "same id, different content" by exact locator comparison
#[derive(Default)]
pub struct InvalidationTracker {
    locators: RwLock<HashMap<AssetId, SourceLocator>>,
}

impl InvalidationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, id: &AssetId, locator: &SourceLocator) -> LocatorChange {
        match self.read().get(id) {
            None => LocatorChange::Unseen,
            Some(seen) if seen == locator => LocatorChange::Unchanged,
            Some(seen) => LocatorChange::Changed {
                previous: seen.clone(),
            },
        }
    }

    /// Run `f` only if `id` was last seen at `locator`, holding the tracker
    /// read lock while it runs so no writer can interleave.
    pub fn with_matching<R>(
        &self,
        id: &AssetId,
        locator: &SourceLocator,
        f: impl FnOnce() -> Option<R>,
    ) -> Option<R> {
        let locators = self.read();
        match locators.get(id) {
            Some(seen) if seen == locator => f(),
            _ => None,
        }
    }

    pub fn record(&self, id: &AssetId, locator: &SourceLocator) {
        let mut locators = self.locators.write().unwrap_or_else(PoisonError::into_inner);
        locators.insert(id.clone(), locator.clone());
    }

    pub fn forget(&self, id: &AssetId) -> Option<SourceLocator> {
        let mut locators = self.locators.write().unwrap_or_else(PoisonError::into_inner);
        locators.remove(id)
    }

    pub fn clear(&self) {
        let mut locators = self.locators.write().unwrap_or_else(PoisonError::into_inner);
        locators.clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<AssetId, SourceLocator>> {
        self.locators.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_lifecycle() {
        let tracker = InvalidationTracker::new();
        let id = AssetId::from("iter_1");
        let v1 = SourceLocator::from("https://x/model.glb");
        let v2 = SourceLocator::from("https://x/model_v2.glb");

        assert_eq!(tracker.observe(&id, &v1), LocatorChange::Unseen);

        tracker.record(&id, &v1);
        assert_eq!(tracker.observe(&id, &v1), LocatorChange::Unchanged);
        assert_eq!(
            tracker.observe(&id, &v2),
            LocatorChange::Changed {
                previous: v1.clone()
            }
        );

        tracker.record(&id, &v2);
        assert_eq!(tracker.observe(&id, &v2), LocatorChange::Unchanged);

        assert_eq!(tracker.forget(&id), Some(v2.clone()));
        assert_eq!(tracker.observe(&id, &v2), LocatorChange::Unseen);
        assert!(tracker.forget(&id).is_none());
    }

    #[test]
    fn test_with_matching() {
        let tracker = InvalidationTracker::new();
        let id = AssetId::from("iter_1");
        let v1 = SourceLocator::from("https://x/a.png");
        let v2 = SourceLocator::from("https://x/b.png");

        assert_eq!(tracker.with_matching(&id, &v1, || Some(1)), None);

        tracker.record(&id, &v1);
        assert_eq!(tracker.with_matching(&id, &v1, || Some(1)), Some(1));
        assert_eq!(tracker.with_matching(&id, &v2, || Some(1)), None);
    }

    #[test]
    fn test_clear() {
        let tracker = InvalidationTracker::new();
        tracker.record(&"a".into(), &"https://x/a".into());
        tracker.record(&"b".into(), &"https://x/b".into());
        assert_eq!(tracker.len(), 2);

        tracker.clear();
        assert!(tracker.is_empty());
    }
}
