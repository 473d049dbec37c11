//! # Vitrine CLI
//!
//! Command-line interface for the marketing image renderer.
//!
//! ## Usage
//!
//! ```bash
//! # Run the HTTP service
//! vitrine serve --listen 0.0.0.0:8080
//!
//! # Render one template file to disk
//! vitrine render --template card.yaml --value source=https://cdn.example.com/p/1.jpg \
//!     --value price=250000 --value promotion_price=199000 --width 800 --out card.jpg
//!
//! # Print the effective configuration
//! vitrine show-config
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vitrine::{
    VitrineError,
    assets::AssetSource,
    config::ServiceConfig,
    error::ConfigError,
    fetch::Fetcher,
    plugin::BindValues,
    raster::encode::OutputFormat,
    server,
    template::{Template, render_template},
};

/// Vitrine - on-demand marketing image renderer
#[derive(Parser, Debug)]
#[command(name = "vitrine")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Service configuration file
    #[arg(long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    /// Log filter when RUST_LOG is unset (overrides the config file)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve templates over HTTP
    Serve {
        /// Address to listen on
        #[arg(long)]
        listen: Option<String>,

        /// Maximum simultaneous upstream downloads
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Render a template file once
    Render {
        /// Template YAML file
        #[arg(long, value_name = "FILE")]
        template: PathBuf,

        /// Request value as key=value (repeatable)
        #[arg(long = "value", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        values: Vec<(String, String)>,

        /// Requested width (falls back to the template default)
        #[arg(long, default_value = "0")]
        width: u32,

        /// Output encoding
        #[arg(long, value_enum, default_value = "jpeg")]
        format: OutputFormat,

        /// Output file
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },

    /// Print the effective configuration as YAML
    ShowConfig,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", s))
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), VitrineError> {
    let cli = Cli::parse();

    let file = ServiceConfig::read(&cli.config)?;
    let missing = file.is_none();
    let mut config = file.unwrap_or_default();
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    match cli.command {
        Commands::ShowConfig => {
            print!("{}", config.to_yaml()?);
            Ok(())
        }
        Commands::Serve {
            listen,
            concurrency,
        } => {
            if let Some(listen) = listen {
                config.listen = listen;
            }
            if let Some(n) = concurrency {
                config.fetcher.concurrency = n;
            }
            let config = config.normalized();

            init_tracing(&config.log_level);
            warn_if_missing(missing, &cli.config);
            runtime()?.block_on(server::serve(config))
        }
        Commands::Render {
            template,
            values,
            width,
            format,
            out,
        } => {
            init_tracing(&config.log_level);
            warn_if_missing(missing, &cli.config);
            let values: BindValues = values.into_iter().collect();
            runtime()?.block_on(render_file(&config, &template, &values, width, format, &out))
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn warn_if_missing(missing: bool, path: &Path) {
    if missing {
        warn!(path = %path.display(), "config file not found, using defaults");
    }
}

fn runtime() -> Result<tokio::runtime::Runtime, VitrineError> {
    Ok(tokio::runtime::Runtime::new()?)
}

async fn render_file(
    config: &ServiceConfig,
    path: &Path,
    values: &BindValues,
    width: u32,
    format: OutputFormat,
    out: &Path,
) -> Result<(), VitrineError> {
    let fetcher = Fetcher::new(&config.fetcher_config())
        .map_err(|e| VitrineError::Transport(e.to_string()))?;
    let assets = AssetSource::new(Arc::new(fetcher), config.static_root.clone());

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or(ConfigError::MissingField("template"))?;
    let bytes = tokio::fs::read(path).await?;
    let template = Template::parse(&name, &bytes, &assets).await?;

    let encoded = render_template(&template, values, width, format, &assets).await?;
    tokio::fs::write(out, &encoded).await?;

    info!(
        template = %name,
        out = %out.display(),
        bytes = encoded.len(),
        "rendered"
    );
    Ok(())
}
