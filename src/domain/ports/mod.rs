mod image_fetcher_port;
mod image_target_port;

pub use image_fetcher_port::ImageFetcher;
pub use image_target_port::ImageTarget;

#[cfg(test)]
pub use image_fetcher_port::MockImageFetcher;

/// Test doubles for the ports.
#[cfg(test)]
pub mod mocks {
    pub use super::image_fetcher_port::mock::FakeFetcher;
    pub use super::image_target_port::mock::RecordingTarget;
}
