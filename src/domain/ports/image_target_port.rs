//! Port definition for display targets.

use std::sync::Arc;

use image::DynamicImage;

use crate::domain::entities::TargetTag;

/// A recyclable slot that shows one image at a time.
///
/// Targets are owned by the caller. The downloader only keeps weak
/// references to them and only ever writes their [`TargetTag`].
pub trait ImageTarget: Send + Sync {
    /// Returns the tag the downloader uses to track this target's request.
    fn tag(&self) -> &TargetTag;

    /// Shows `image`, or an explicit empty state when `None`.
    fn apply(&self, image: Option<Arc<DynamicImage>>);
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use parking_lot::Mutex;

    /// Target that records every image applied to it.
    #[derive(Default)]
    pub struct RecordingTarget {
        tag: TargetTag,
        applied: Mutex<Vec<Option<Arc<DynamicImage>>>>,
    }

    impl RecordingTarget {
        /// Creates a fresh target wrapped for sharing with the downloader.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// All applications in order.
        pub fn applied(&self) -> Vec<Option<Arc<DynamicImage>>> {
            self.applied.lock().clone()
        }

        /// Number of times `apply` was called.
        pub fn apply_count(&self) -> usize {
            self.applied.lock().len()
        }

        /// Width of the last applied image, `Some(None)` for an empty apply.
        pub fn last_width(&self) -> Option<Option<u32>> {
            self.applied
                .lock()
                .last()
                .map(|image| image.as_ref().map(|i| i.width()))
        }
    }

    impl ImageTarget for RecordingTarget {
        fn tag(&self) -> &TargetTag {
            &self.tag
        }

        fn apply(&self, image: Option<Arc<DynamicImage>>) {
            self.applied.lock().push(image);
        }
    }
}
