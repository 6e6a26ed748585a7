use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod decode;
mod engine;
mod engines;
mod error;
mod paragraph;
mod pdf;
mod pipeline;
mod server;

#[derive(Parser, Debug)]
#[command(name = "ocr-text-server")]
#[command(about = "HTTP OCR server that extracts text from images and PDF documents")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "OCR_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "OCR_PORT", default_value = "8001")]
    pub port: u16,

    /// Recognition languages, comma separated (e.g., "vi,en")
    #[arg(long, env = "OCR_LANGUAGES", value_delimiter = ',', default_value = "vi,en")]
    pub languages: Vec<String>,

    /// Prefer an accelerated compute device when the engine supports one
    #[arg(
        long,
        env = "OCR_USE_ACCELERATOR",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub use_accelerator: bool,

    /// Defer engine construction until the first OCR request
    #[arg(long, env = "OCR_LAZY_ENGINE")]
    pub lazy_engine: bool,

    /// Maximum file size in bytes (default: 50MB)
    #[arg(long, env = "OCR_MAX_FILE_SIZE", default_value = "52428800")]
    pub max_file_size: usize,

    /// Maximum request body size in bytes, across all files (default: 200MB)
    #[arg(long, env = "OCR_MAX_REQUEST_SIZE", default_value = "209715200")]
    pub max_request_size: usize,

    /// Directory holding (or receiving) the recognition models
    #[arg(long, env = "OCR_MODEL_DIR")]
    pub model_dir: Option<String>,

    /// Directory containing the pdfium shared library (falls back to the system library)
    #[arg(long, env = "PDFIUM_LIB_DIR")]
    pub pdfium_lib_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from(args);

    tracing::info!("Starting ocr-text-server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Binding to {}:{}", config.host, config.port);

    server::run(config).await
}
