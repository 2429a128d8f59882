use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use image::DynamicImage;
use parking_lot::Mutex;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use imgbind::infrastructure::{
    AppConfig, CliArgs, Command, DiskImageCache, ImageDownloader, LoadedConfig, StorageManager,
};
use imgbind::{ImageTarget, TargetTag};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = config.effective_log_path() {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn load_config(args: &CliArgs) -> Result<LoadedConfig> {
    let storage = StorageManager::new().unwrap_or_else(|_| {
        StorageManager::with_dir(std::env::temp_dir().join(imgbind::NAME))
    });
    let mut loaded = storage
        .load_config(args.config.as_deref())
        .wrap_err("Failed to load configuration")?;
    loaded.config.merge_with_args(args);
    Ok(loaded)
}

/// Target that remembers the size of whatever was applied to it.
struct ConsoleTarget {
    url: String,
    tag: TargetTag,
    outcome: Mutex<Option<Option<(u32, u32)>>>,
}

impl ConsoleTarget {
    fn new(url: &str) -> Arc<Self> {
        Arc::new(Self {
            url: url.to_string(),
            tag: TargetTag::new(),
            outcome: Mutex::new(None),
        })
    }

    fn report(&self) -> String {
        match *self.outcome.lock() {
            Some(Some((w, h))) => format!("{} -> {w}x{h}", self.url),
            Some(None) => format!("{} -> no image", self.url),
            None => format!("{} -> not delivered", self.url),
        }
    }
}

impl ImageTarget for ConsoleTarget {
    fn tag(&self) -> &TargetTag {
        &self.tag
    }

    fn apply(&self, image: Option<Arc<DynamicImage>>) {
        *self.outcome.lock() = Some(image.map(|i| (i.width(), i.height())));
    }
}

async fn fetch(config: &AppConfig, urls: &[String]) -> Result<()> {
    let (downloader, mut queue) = ImageDownloader::from_config(config.downloader.clone())
        .await
        .wrap_err("Failed to start image downloader")?;

    let targets: Vec<_> = urls.iter().map(|url| ConsoleTarget::new(url)).collect();
    for target in &targets {
        downloader.download(&target.url, target);
    }

    while downloader.pending_count() > 0 {
        if queue.deliver_next().await.is_none() {
            break;
        }
    }

    for target in &targets {
        println!("{}", target.report());
    }
    info!(stats = %downloader.memory_cache_stats(), "Fetch finished");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let LoadedConfig { config, fallback } = load_config(&args)?;
    init_logging(&config)?;
    if let Some(e) = fallback {
        warn!(error = %e, "Failed to parse config file, using defaults");
    }

    info!(version = imgbind::VERSION, "Starting imgbind");

    match &args.command {
        Command::Fetch { urls } => fetch(&config, urls).await?,
        Command::ClearDisk => {
            let disk = DiskImageCache::new(config.downloader.effective_cache_dir()).await?;
            let removed = disk.len();
            disk.clear().await?;
            println!("Removed {removed} cached images from {}", disk.dir().display());
        }
        Command::Stats => {
            let disk = DiskImageCache::new(config.downloader.effective_cache_dir()).await?;
            println!(
                "{}: {} images, {} bytes",
                disk.dir().display(),
                disk.len(),
                disk.current_size()
            );
        }
    }

    Ok(())
}
