use clap::{Parser, Subcommand};
use image_handler::config::{self, HandlerConfig};
use image_handler::imaging::RustBackend;
use image_handler::pipeline::Pipeline;
use image_handler::request::InboundRequest;
use image_handler::response::HttpResponse;
use image_handler::{output, storage};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser)]
#[command(name = "image-handler")]
#[command(about = "On-demand image transformation endpoint")]
#[command(long_about = "\
On-demand image transformation endpoint

Requests name a source image and a comma-separated directive:

  GET /<root>/<source key...>/<directive>

  /img/products/shoe.jpg/width=400,format=webp
  /img/products/shoe.jpg/original

Directive keys:
  width, height   Positive integers. One derives the other; both crop to fill.
  format          jpeg (jpg), png, gif, webp, avif. Anything else is jpeg.
  quality         1-100, honored for jpeg, webp and avif.

Configuration comes from config.toml (--config, or ./config.toml when present)
overridden by IMAGE_HANDLER_* environment variables.

Run 'image-handler gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (overrides RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one request through the pipeline and print the response envelope
    Invoke {
        /// Request path, e.g. /img/cat.png/width=100
        path: String,

        /// Request method
        #[arg(long, default_value = "GET")]
        method: String,

        /// Also write the decoded response body to this file
        #[arg(long)]
        body_out: Option<PathBuf>,
    },
    /// Load and validate configuration, then print a summary
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Invoke {
            path,
            method,
            body_out,
        } => {
            let config = load(cli.config.as_deref())?;
            let response = invoke(&config, InboundRequest::new(method, path)).await?;
            for line in output::format_response_summary(&response) {
                eprintln!("{}", line);
            }
            if let Some(body_out) = body_out {
                std::fs::write(&body_out, response.body_bytes()?)?;
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Check => {
            let config = load(cli.config.as_deref())?;
            output::print_config_summary(&config);
            println!("==> Configuration is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// `--config` when given, else `./config.toml` if it exists, else env only.
fn load(explicit: Option<&Path>) -> Result<HandlerConfig, config::ConfigError> {
    let default = Path::new("config.toml");
    let path = explicit.or_else(|| default.exists().then_some(default));
    debug!(config = ?path, "loading configuration");
    config::load_config(path, std::env::vars())
}

async fn invoke(
    config: &HandlerConfig,
    request: InboundRequest,
) -> Result<HttpResponse, storage::StorageError> {
    let backend = RustBackend::new();
    let source = storage::build_source(&config.source)?;
    let cache = config.cache.as_ref().map(storage::build_cache);

    let mut pipeline = Pipeline::new(config, &backend, source.as_ref());
    if let Some(cache) = &cache {
        pipeline = pipeline.with_cache(cache.as_ref());
    }
    Ok(pipeline.handle(&request).await.into())
}
