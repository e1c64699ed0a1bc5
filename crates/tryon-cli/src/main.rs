//! Tryon - Headless try-on session runner
//!
//! Runs one try-on session against file-backed devices: selects a product,
//! waits for the model, applies placement overrides, captures a still and
//! writes it to the capture directory.

mod config;
mod devices;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use tryon_capture::{ShareMethod, ShareOutcome, Sharer};
use tryon_core::{AssetIndex, Axis, InMemoryCatalog, ModelResolver, ProductRepository};
use tryon_session::{
    AuthenticityLedger, Collaborators, NoticeKind, SessionCommand, SessionDriver, SessionEvent, SessionMode,
    TryOnSession, TryOnState,
};

use devices::{FsAssetLoader, ImageOverlay, ReplayDetector, StaticCapability, StillCamera};

const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "tryon")]
#[command(about = "Virtual try-on session runner")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "tryon.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Product to try on
    #[arg(short, long, default_value = "glasses-1")]
    product: String,

    /// Image used as the camera feed
    #[arg(long)]
    video: Option<PathBuf>,

    /// Pre-rendered overlay image (transparent when omitted)
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// JSON file with 68 face landmarks in video pixel coordinates
    #[arg(long)]
    landmarks: Option<PathBuf>,

    /// Force a presentation mode (webxr, webgl)
    #[arg(long)]
    mode: Option<SessionMode>,

    /// Model scale override
    #[arg(long)]
    scale: Option<f64>,

    /// Model rotation around Y in radians
    #[arg(long)]
    rotate_y: Option<f64>,

    /// List catalog products and exit
    #[arg(long)]
    list: bool,

    /// Print the authenticity record of the product and exit
    #[arg(long)]
    verify: bool,

    /// Write a default configuration file and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Tryon v{}", env!("CARGO_PKG_VERSION"));

    if args.init_config {
        config::save_default_config(&args.config)?;
        info!(path = %args.config.display(), "Wrote default configuration");
        return Ok(());
    }

    let config = config::load_config(&args.config)?;

    let catalog: Arc<dyn ProductRepository> = match &config.catalog.path {
        Some(path) => Arc::new(InMemoryCatalog::from_file(path.as_ref())?),
        None => Arc::new(InMemoryCatalog::builtin()),
    };

    if args.list {
        for product in catalog.list(None) {
            println!(
                "{:<12} {:<20} {:>8.2}  {}",
                product.id.as_str(),
                product.name,
                product.price,
                product.try_on_category()
            );
        }
        return Ok(());
    }

    if args.verify {
        let ledger = AuthenticityLedger::demo();
        match ledger.verify(&args.product).await {
            Ok(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            Err(e) => println!("{}", e),
        }
        return Ok(());
    }

    let resolver = match &config.assets.index {
        Some(path) => ModelResolver::new(AssetIndex::from_file(path.as_ref())?),
        None => ModelResolver::builtin(),
    };

    let video = args.video.as_deref().map(devices::load_frame).transpose()?;
    let overlay = match args.overlay.as_deref() {
        Some(path) => ImageOverlay::new(devices::load_frame(path)?),
        None => ImageOverlay::transparent(config.capture.width, config.capture.height),
    };
    let detector = match args.landmarks.as_deref() {
        Some(path) => ReplayDetector::from_file(path)?,
        None => ReplayDetector::none(),
    };

    let collaborators = Collaborators {
        capability: Arc::new(StaticCapability::new(config.session.xr_supported)),
        media: Arc::new(StillCamera::new(video)),
        assets: Arc::new(FsAssetLoader::new(config.assets.models_dir.as_ref().map(PathBuf::from))),
        overlay: Arc::new(overlay),
        detector: Arc::new(detector),
        share: Arc::new(Sharer::download_only(&config.capture.output_dir)),
    };

    let machine = TryOnSession::new(config.to_session_config(), catalog, resolver);
    let session = SessionDriver::spawn(machine, collaborators, config.to_driver_config());
    let mut events = session.subscribe();

    session.send(SessionCommand::SelectProduct(args.product.clone())).await?;
    let loaded = wait_for(&mut events, |e| {
        matches!(
            e,
            SessionEvent::StateChanged {
                to: TryOnState::Ready | TryOnState::Idle,
                ..
            }
        )
    })
    .await?;
    if matches!(loaded, SessionEvent::StateChanged { to: TryOnState::Idle, .. }) {
        session.shutdown().await?;
        bail!("Model for {} could not be loaded", args.product);
    }

    if let Some(mode) = args.mode {
        session.send(SessionCommand::SwitchMode(mode)).await?;
    }
    if let Some(scale) = args.scale {
        session.send(SessionCommand::SetScale(scale)).await?;
    }
    if let Some(angle) = args.rotate_y {
        session.send(SessionCommand::SetRotation(Axis::Y, angle)).await?;
    }

    if args.video.is_some() {
        // Give the camera and, with landmarks, the tracker a moment to settle
        let settled = wait_for(&mut events, |e| {
            matches!(e, SessionEvent::CameraAvailable(_) | SessionEvent::FacePresence(true))
        });
        if tokio::time::timeout(Duration::from_secs(2), settled).await.is_err() {
            warn!("Camera did not report in time");
        }
    }

    session.send(SessionCommand::Capture).await?;
    let captured = wait_for(&mut events, |e| {
        matches!(e, SessionEvent::ShareSurface(true))
            || matches!(e, SessionEvent::Notice(n) if n.kind == NoticeKind::CaptureFailed)
    })
    .await?;
    if let SessionEvent::Notice(notice) = captured {
        session.shutdown().await?;
        bail!("{}: {}", notice.title, notice.message);
    }

    session.send(SessionCommand::Share(ShareMethod::Download)).await?;
    let shared = wait_for(&mut events, |e| {
        matches!(e, SessionEvent::Shared(_))
            || matches!(e, SessionEvent::Notice(n) if n.kind == NoticeKind::ShareFailed)
    })
    .await?;

    session.shutdown().await?;

    match shared {
        SessionEvent::Shared(ShareOutcome::Downloaded(path)) => println!("{}", path.display()),
        SessionEvent::Shared(ShareOutcome::Shared) => println!("shared"),
        SessionEvent::Notice(notice) => bail!("{}: {}", notice.title, notice.message),
        _ => {}
    }

    Ok(())
}

/// Wait for an event, logging notices along the way
async fn wait_for<F>(events: &mut broadcast::Receiver<SessionEvent>, mut pred: F) -> Result<SessionEvent>
where
    F: FnMut(&SessionEvent) -> bool,
{
    let next = async {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let SessionEvent::Notice(notice) = &event {
                        match notice.kind {
                            NoticeKind::Info => info!(title = %notice.title, "{}", notice.message),
                            _ => warn!(kind = ?notice.kind, title = %notice.title, "{}", notice.message),
                        }
                    }
                    if pred(&event) {
                        return Ok(event);
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Session event channel lagged");
                }
                Err(RecvError::Closed) => bail!("Session ended unexpectedly"),
            }
        }
    };

    tokio::time::timeout(EVENT_TIMEOUT, next)
        .await
        .context("Timed out waiting for the session")?
}
