//! In-flight request tracking.
//!
//! One entry per URL with a fetch outstanding, listing every target waiting
//! for it. Targets are held weakly: a target dropped by its owner simply
//! disappears from the delivery list.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use crate::domain::entities::Binding;
use crate::domain::ports::ImageTarget;

/// A target waiting on a URL, with the generation it asked at.
pub struct Waiter {
    target: Weak<dyn ImageTarget>,
    binding: Binding,
}

impl Waiter {
    /// Returns the target if it is still alive and still wants this request.
    #[must_use]
    pub fn live_target(&self) -> Option<Arc<dyn ImageTarget>> {
        let target = self.target.upgrade()?;
        target.tag().is_current(&self.binding).then_some(target)
    }

    fn is(&self, target: &Weak<dyn ImageTarget>) -> bool {
        Weak::ptr_eq(&self.target, target)
    }
}

impl std::fmt::Debug for Waiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waiter")
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

/// Table of pending requests keyed by resolved URL.
#[derive(Debug, Default)]
pub struct RequestTracker {
    requests: Mutex<HashMap<String, Vec<Waiter>>>,
}

impl RequestTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `target` as waiting for `binding.url`.
    ///
    /// If the target was waiting on `previous`, that registration is dropped
    /// first. Returns true when no fetch was outstanding for the URL, meaning
    /// the caller must start one.
    pub fn register(
        &self,
        target: &Arc<dyn ImageTarget>,
        binding: Binding,
        previous: Option<&str>,
    ) -> bool {
        let weak = Arc::downgrade(target);
        let mut requests = self.requests.lock();

        if let Some(previous) = previous
            && let Some(waiters) = requests.get_mut(previous)
        {
            waiters.retain(|w| !w.is(&weak));
        }

        let url = binding.url.clone();
        let is_new = !requests.contains_key(&url);
        let waiters = requests.entry(url).or_default();
        waiters.retain(|w| !w.is(&weak) && w.target.strong_count() > 0);
        waiters.push(Waiter {
            target: weak,
            binding,
        });
        trace!(waiting = waiters.len(), is_new, "Registered pending target");
        is_new
    }

    /// Drops `target` from the request for `url`, if registered.
    ///
    /// The request itself stays outstanding even with no waiters left, so
    /// its fetch is not duplicated.
    pub fn unregister(&self, url: &str, target: &Arc<dyn ImageTarget>) -> bool {
        let weak = Arc::downgrade(target);
        let mut requests = self.requests.lock();
        let Some(waiters) = requests.get_mut(url) else {
            return false;
        };
        let before = waiters.len();
        waiters.retain(|w| !w.is(&weak));
        waiters.len() != before
    }

    /// Removes the request for `url`, returning all of its waiters.
    pub fn complete(&self, url: &str) -> Vec<Waiter> {
        self.requests.lock().remove(url).unwrap_or_default()
    }

    /// Returns true if a fetch for `url` is outstanding.
    #[must_use]
    pub fn is_pending(&self, url: &str) -> bool {
        self.requests.lock().contains_key(url)
    }

    /// Number of waiters registered for `url`.
    #[must_use]
    pub fn waiters(&self, url: &str) -> usize {
        self.requests.lock().get(url).map_or(0, Vec::len)
    }

    /// Number of outstanding requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns true if nothing is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::mocks::RecordingTarget;

    fn bind(target: &Arc<RecordingTarget>, url: &str) -> (Arc<dyn ImageTarget>, Binding, Option<String>) {
        let (binding, previous) = target.tag().bind(url);
        let dyn_target: Arc<dyn ImageTarget> = target.clone();
        (dyn_target, binding, previous)
    }

    #[test]
    fn test_first_registration_starts_fetch() {
        let tracker = RequestTracker::new();
        let t1 = RecordingTarget::new();
        let t2 = RecordingTarget::new();

        let (d1, b1, p1) = bind(&t1, "a");
        let (d2, b2, p2) = bind(&t2, "a");

        assert!(tracker.register(&d1, b1, p1.as_deref()));
        assert!(!tracker.register(&d2, b2, p2.as_deref()));
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.waiters("a"), 2);
    }

    #[test]
    fn test_reregistering_moves_target() {
        let tracker = RequestTracker::new();
        let t = RecordingTarget::new();

        let (d, b, p) = bind(&t, "a");
        tracker.register(&d, b, p.as_deref());
        let (d, b, p) = bind(&t, "b");
        tracker.register(&d, b, p.as_deref());

        // "a" stays outstanding, but nobody waits on it anymore.
        assert!(tracker.is_pending("a"));
        assert_eq!(tracker.waiters("a"), 0);
        assert_eq!(tracker.waiters("b"), 1);
    }

    #[test]
    fn test_same_target_same_url_is_not_duplicated() {
        let tracker = RequestTracker::new();
        let t = RecordingTarget::new();

        let (d, b, p) = bind(&t, "a");
        tracker.register(&d, b, p.as_deref());
        let (d, b, p) = bind(&t, "a");
        assert!(!tracker.register(&d, b, p.as_deref()));

        let waiters = tracker.complete("a");
        assert_eq!(waiters.len(), 1);
        assert!(waiters[0].live_target().is_some());
    }

    #[test]
    fn test_complete_returns_waiters_and_clears() {
        let tracker = RequestTracker::new();
        let t = RecordingTarget::new();
        let (d, b, p) = bind(&t, "a");
        tracker.register(&d, b, p.as_deref());

        assert_eq!(tracker.complete("a").len(), 1);
        assert!(tracker.is_empty());
        assert!(tracker.complete("a").is_empty());
    }

    #[test]
    fn test_dropped_target_is_not_live() {
        let tracker = RequestTracker::new();
        let t = RecordingTarget::new();
        let (d, b, p) = bind(&t, "a");
        tracker.register(&d, b, p.as_deref());
        drop(d);
        drop(t);

        let waiters = tracker.complete("a");
        assert_eq!(waiters.len(), 1);
        assert!(waiters[0].live_target().is_none());
    }

    #[test]
    fn test_unregister() {
        let tracker = RequestTracker::new();
        let t = RecordingTarget::new();
        let (d, b, p) = bind(&t, "a");
        tracker.register(&d, b, p.as_deref());

        assert!(tracker.unregister("a", &d));
        assert!(!tracker.unregister("a", &d));
        assert!(!tracker.unregister("zzz", &d));
        assert!(tracker.is_pending("a"));
    }
}
