//! Per-target request tag with a generation counter.

use parking_lot::Mutex;

/// Snapshot of what a target last asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Resolved URL of the request.
    pub url: String,
    /// Generation at which the request was made.
    pub generation: u64,
}

#[derive(Debug, Default)]
struct TagState {
    url: Option<String>,
    generation: u64,
}

/// Mutable tag embedded in every display target.
///
/// The downloader is the only writer. Every `download` or `cancel` bumps the
/// generation, so a completion recorded under an older generation can never
/// be applied to a target that has since moved on, even when the target is
/// later pointed back at the same URL.
#[derive(Debug, Default)]
pub struct TargetTag {
    state: Mutex<TagState>,
}

impl TargetTag {
    /// Creates an unbound tag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the URL the target currently wants, if any.
    #[must_use]
    pub fn url(&self) -> Option<String> {
        self.state.lock().url.clone()
    }

    /// Points the tag at `url`, returning the new binding and the URL it replaced.
    pub(crate) fn bind(&self, url: &str) -> (Binding, Option<String>) {
        let mut state = self.state.lock();
        state.generation += 1;
        let previous = state.url.replace(url.to_string());
        (
            Binding {
                url: url.to_string(),
                generation: state.generation,
            },
            previous,
        )
    }

    /// Clears the tag, returning the URL it held.
    pub(crate) fn clear(&self) -> Option<String> {
        let mut state = self.state.lock();
        state.generation += 1;
        state.url.take()
    }

    /// Returns true if `binding` is still what the target wants.
    #[must_use]
    pub fn is_current(&self, binding: &Binding) -> bool {
        let state = self.state.lock();
        state.generation == binding.generation && state.url.as_deref() == Some(&binding.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_bumps_generation() {
        let tag = TargetTag::new();
        assert_eq!(tag.state.lock().generation, 0);
        assert_eq!(tag.url(), None);

        let (first, previous) = tag.bind("a");
        assert_eq!(previous, None);
        assert_eq!(first.generation, 1);
        assert_eq!(tag.url().as_deref(), Some("a"));

        let (second, previous) = tag.bind("b");
        assert_eq!(previous.as_deref(), Some("a"));
        assert_eq!(second.generation, 2);
    }

    #[test]
    fn test_rebinding_same_url_invalidates_old_binding() {
        let tag = TargetTag::new();
        let (old, _) = tag.bind("a");
        let (new, _) = tag.bind("a");

        assert!(!tag.is_current(&old));
        assert!(tag.is_current(&new));
    }

    #[test]
    fn test_clear_invalidates_binding() {
        let tag = TargetTag::new();
        let (binding, _) = tag.bind("a");

        assert_eq!(tag.clear().as_deref(), Some("a"));
        assert!(!tag.is_current(&binding));
        assert_eq!(tag.clear(), None);
    }
}
