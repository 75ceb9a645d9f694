//! Active-page tracking, scoped to the single CDP connection a session
//! opens. There is no subscription to `Target.targetCreated`/
//! `Target.targetDestroyed` here, so a tab the Agent opens beyond that one
//! connection is not reflected — see DESIGN.md for the scope decision.

use engine_core_types::PageId;
use parking_lot::RwLock;

/// Tracks the one page a session's CDP connection is driving.
#[derive(Default)]
pub struct PageRegistry {
    active: RwLock<Option<PageId>>,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self {
            active: RwLock::new(None),
        }
    }

    pub fn page_opened(&self, id: PageId) {
        *self.active.write() = Some(id);
    }

    /// No-op if `id` isn't the currently active page.
    pub fn page_closed(&self, id: &PageId) {
        let mut active = self.active.write();
        if active.as_ref() == Some(id) {
            *active = None;
        }
    }

    pub fn active_page(&self) -> Option<PageId> {
        self.active.read().clone()
    }

    pub fn live_page_count(&self) -> usize {
        usize::from(self.active.read().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_a_page_makes_it_active() {
        let registry = PageRegistry::new();
        assert!(registry.active_page().is_none());

        let p1 = PageId::new();
        registry.page_opened(p1.clone());
        assert_eq!(registry.active_page(), Some(p1));
    }

    #[test]
    fn opening_a_second_page_replaces_the_first() {
        let registry = PageRegistry::new();
        let p1 = PageId::new();
        let p2 = PageId::new();
        registry.page_opened(p1);
        registry.page_opened(p2.clone());
        assert_eq!(registry.active_page(), Some(p2));
    }

    #[test]
    fn closing_the_active_page_clears_it() {
        let registry = PageRegistry::new();
        let p1 = PageId::new();
        registry.page_opened(p1.clone());
        registry.page_closed(&p1);
        assert!(registry.active_page().is_none());
    }

    #[test]
    fn closing_an_id_that_is_not_active_is_a_noop() {
        let registry = PageRegistry::new();
        let p1 = PageId::new();
        let p2 = PageId::new();
        registry.page_opened(p1.clone());
        registry.page_closed(&p2);
        assert_eq!(registry.active_page(), Some(p1));
    }

    #[test]
    fn no_page_opened_yet_has_zero_live_pages() {
        let registry = PageRegistry::new();
        assert_eq!(registry.live_page_count(), 0);
        registry.page_opened(PageId::new());
        assert_eq!(registry.live_page_count(), 1);
    }
}
