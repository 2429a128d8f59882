//! Background fetch workers and the completion queue.
//!
//! Fetch requests go through an unbounded command channel to a worker loop
//! that runs at most `workers` jobs at once. Each job tries the disk cache,
//! then the network, and posts a [`DownloadCompleted`] to the completion
//! channel. The owner of the targets drains that channel through
//! [`CompletionQueue`], which is the only place results touch targets.

use std::collections::VecDeque;
use std::sync::Arc;

use image::DynamicImage;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, error, warn};

use super::codec;
use super::disk_cache::DiskImageCache;
use super::memory_cache::MemoryImageCache;
use super::pending::RequestTracker;
use crate::domain::entities::ImageSource;
use crate::domain::errors::CacheResult;
use crate::domain::ports::ImageFetcher;

/// Default number of concurrent fetch jobs.
pub const DEFAULT_WORKERS: usize = 5;

/// Result of one shared fetch.
#[derive(Debug, Clone)]
pub struct DownloadCompleted {
    /// Resolved URL that was fetched.
    pub url: String,
    /// The decoded image, or `None` if every source failed.
    pub image: Option<Arc<DynamicImage>>,
    /// Where the image came from, when there is one.
    pub source: Option<ImageSource>,
}

/// Outcome of delivering one completion to its waiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// URL the completion was for.
    pub url: String,
    /// Targets that received the result.
    pub applied: usize,
    /// Targets skipped because they were dropped or had moved on.
    pub skipped: usize,
}

#[derive(Debug)]
enum DispatchCommand {
    Fetch { url: String },
}

/// Sending half used by the downloader to enqueue fetches.
#[derive(Debug, Clone)]
pub(crate) struct Dispatcher {
    request_tx: mpsc::UnboundedSender<DispatchCommand>,
}

/// State for the background worker loop.
struct WorkerState {
    job: FetchJob,
    semaphore: Arc<Semaphore>,
    request_rx: mpsc::UnboundedReceiver<DispatchCommand>,
}

/// Everything a single fetch needs, cheap to clone into a task.
#[derive(Clone)]
struct FetchJob {
    memory_cache: Arc<MemoryImageCache>,
    disk_cache: Arc<DiskImageCache>,
    fetcher: Arc<dyn ImageFetcher>,
    event_tx: mpsc::UnboundedSender<DownloadCompleted>,
}

impl Dispatcher {
    /// Spawns the worker loop and returns the dispatcher with the receiving
    /// end of the completion channel.
    ///
    /// # Panics
    /// Panics if called outside of a Tokio runtime.
    pub(crate) fn spawn(
        workers: usize,
        memory_cache: Arc<MemoryImageCache>,
        disk_cache: Arc<DiskImageCache>,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> (Self, mpsc::UnboundedReceiver<DownloadCompleted>) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let state = WorkerState {
            job: FetchJob {
                memory_cache,
                disk_cache,
                fetcher,
                event_tx,
            },
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
            request_rx,
        };
        tokio::spawn(Self::run_worker_loop(state));

        (Self { request_tx }, event_rx)
    }

    /// Queues a fetch for `url`. Never blocks.
    pub(crate) fn enqueue(&self, url: String) {
        debug!(url = %url, "Enqueuing download");
        if let Err(e) = self.request_tx.send(DispatchCommand::Fetch { url }) {
            error!("Failed to send fetch request: {}", e);
        }
    }

    /// Worker loop to hand queued fetches to free worker slots.
    async fn run_worker_loop(mut state: WorkerState) {
        // Newest requests first: what was asked for last is what is on screen.
        let mut queue: VecDeque<String> = VecDeque::new();

        loop {
            tokio::select! {
                cmd = state.request_rx.recv() => {
                    match cmd {
                        Some(DispatchCommand::Fetch { url }) => queue.push_front(url),
                        None => break,
                    }
                }
                Ok(permit) = state.semaphore.clone().acquire_owned(), if !queue.is_empty() => {
                    if let Some(url) = queue.pop_front() {
                        let job = state.job.clone();
                        tokio::spawn(async move {
                            let completed = job.run(url).await;
                            drop(permit);
                            if job.event_tx.send(completed).is_err() {
                                debug!("Completion queue closed, dropping result");
                            }
                        });
                    }
                }
            }
        }

        debug!(dropped = queue.len(), "Dispatcher worker loop stopped");
    }
}

impl FetchJob {
    async fn run(&self, url: String) -> DownloadCompleted {
        if let Some(image) = self.disk_cache.get(&url).await {
            debug!(url = %url, "Found image in disk cache");
            self.memory_cache.put(&url, image.clone());
            return DownloadCompleted {
                url,
                image: Some(image),
                source: Some(ImageSource::DiskCache),
            };
        }

        match self.download(&url).await {
            Ok(image) => {
                if let Err(e) = self.disk_cache.put(&url, image.clone()).await {
                    warn!(url = %url, error = %e, "Error adding cache file");
                }
                self.memory_cache.put(&url, image.clone());
                debug!(url = %url, source = %ImageSource::Network, "Image loaded successfully");
                DownloadCompleted {
                    url,
                    image: Some(image),
                    source: Some(ImageSource::Network),
                }
            }
            Err(e) if e.is_transient() => {
                warn!(url = %url, error = %e, "Image download failed");
                DownloadCompleted {
                    url,
                    image: None,
                    source: None,
                }
            }
            Err(e) => {
                debug!(url = %url, error = %e, "Image unusable");
                DownloadCompleted {
                    url,
                    image: None,
                    source: None,
                }
            }
        }
    }

    async fn download(&self, url: &str) -> CacheResult<Arc<DynamicImage>> {
        let bytes = self.fetcher.fetch(url).await?;
        codec::decode_blocking(bytes).await
    }
}

/// Receiving end of the completion channel.
///
/// Drain it from the thread that owns the targets; that is where `apply`
/// is called.
pub struct CompletionQueue {
    events: mpsc::UnboundedReceiver<DownloadCompleted>,
    tracker: Arc<RequestTracker>,
}

impl CompletionQueue {
    pub(crate) fn new(
        events: mpsc::UnboundedReceiver<DownloadCompleted>,
        tracker: Arc<RequestTracker>,
    ) -> Self {
        Self { events, tracker }
    }

    /// Delivers every completion that is already available, without waiting.
    /// Suited to being called once per frame of a UI loop.
    pub fn deliver_ready(&mut self) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        while let Ok(completed) = self.events.try_recv() {
            deliveries.push(self.deliver(completed));
        }
        deliveries
    }

    /// Waits for the next completion and delivers it.
    ///
    /// Returns `None` once the downloader and all in-flight jobs are gone.
    pub async fn deliver_next(&mut self) -> Option<Delivery> {
        let completed = self.events.recv().await?;
        Some(self.deliver(completed))
    }

    /// Delivers completions until the channel closes.
    pub async fn run(mut self) {
        while self.deliver_next().await.is_some() {}
        debug!("Completion queue closed");
    }

    /// Applies one result to every target still waiting for it.
    fn deliver(&self, completed: DownloadCompleted) -> Delivery {
        let waiters = self.tracker.complete(&completed.url);
        let mut applied = 0;
        let mut skipped = 0;

        for waiter in &waiters {
            match waiter.live_target() {
                Some(target) => {
                    target.apply(completed.image.clone());
                    applied += 1;
                }
                None => skipped += 1,
            }
        }

        debug!(
            url = %completed.url,
            found = completed.image.is_some(),
            applied,
            skipped,
            "Delivered download"
        );

        Delivery {
            url: completed.url,
            applied,
            skipped,
        }
    }
}

impl std::fmt::Debug for CompletionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionQueue")
            .field("pending", &self.tracker.len())
            .finish_non_exhaustive()
    }
}
