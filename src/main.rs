use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use photo_uploader::{
    config::{self, CliOverrides},
    create_app, startup_checks,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the JSON configuration file (created with defaults if missing)
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Directory that receives the processed uploads
    #[arg(long)]
    upload_folder: Option<PathBuf>,

    #[arg(short, long)]
    port: Option<u16>,

    #[arg(long)]
    host: Option<String>,

    /// Enable debug mode (also forces debug logging)
    #[arg(long)]
    debug: bool,

    /// Maximum size of a single upload in megabytes
    #[arg(long)]
    max_file_size: Option<f64>,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Directory holding the page templates
    #[arg(long, default_value = "templates")]
    templates: PathBuf,

    /// Automatically quit after specified number of seconds (useful for testing)
    #[arg(long)]
    quit_after: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Set up logging first
    let level = if cli.debug {
        "debug".to_string()
    } else {
        cli.log_level.to_lowercase()
    };
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_filter_reloading();
    let filter_handle = builder.reload_handle();
    tracing::subscriber::set_global_default(builder.finish())?;

    let overrides = CliOverrides {
        upload_folder: cli.upload_folder.clone(),
        port: cli.port,
        host: cli.host.clone(),
        debug: cli.debug,
        max_file_size_mb: cli.max_file_size,
    };

    let loaded = config::load_config(Some(&cli.config), &overrides);
    if !loaded.issues.is_empty() {
        warn!(
            "Configuration loaded with {} issue(s); affected values use defaults",
            loaded.issues.len()
        );
    }
    let config = loaded.config;

    if config.server.debug && !cli.debug {
        filter_handle.reload(EnvFilter::new("debug"))?;
        info!("Debug mode enabled by configuration");
    }

    info!("Starting photo uploader");
    info!("Configuration file: {:?}", cli.config);
    info!("Upload folder: {:?}", config.upload.folder);
    info!("Template directory: {:?}", cli.templates);
    info!(
        "Images are resized to fit {}x{} at quality {}",
        config.image_processing.max_width,
        config.image_processing.max_height,
        config.image_processing.quality
    );

    match startup_checks::perform_startup_checks(&config, &cli.templates).await {
        Ok(()) => {}
        Err(errors) => {
            for e in &errors {
                error!("Startup check failed: {}", e);
            }
            if errors.iter().any(|e| e.is_critical()) {
                error!("Critical startup check failed, exiting");
                return Err("Critical startup check failed".into());
            }
            warn!("Non-critical startup checks failed, continuing");
        }
    }

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    let app = create_app(config, cli.config.clone(), cli.templates.clone()).await;

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let app = app.into_make_service_with_connect_info::<SocketAddr>();

    let server = axum::serve(listener, app);
    let graceful = server.with_graceful_shutdown(shutdown_signal(cli.quit_after));

    if let Err(e) = graceful.await {
        error!("Server error: {}", e);
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(quit_after: Option<u64>) {
    use tokio::signal;
    use tokio::time::{Duration, sleep};

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let quit_timer = async {
        if let Some(seconds) = quit_after {
            info!(
                "Server will automatically shut down after {} seconds",
                seconds
            );
            sleep(Duration::from_secs(seconds)).await;
            info!("Quit timer expired, shutting down");
        } else {
            std::future::pending::<()>().await
        }
    };

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        },
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        },
        _ = quit_timer => {},
    }
}
