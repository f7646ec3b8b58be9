use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tilemark::config::{self, TilemarkConfig};
use tilemark::imaging::RustBackend;
use tilemark::pipeline::{self, ComposeRequest, ImageInput};
use tilemark::server::{AppState, Server};
use tilemark::{client, output};
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("TILEMARK_ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("TILEMARK_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "tilemark")]
#[command(about = "Letterbox an image and stamp it with a tiled watermark")]
#[command(long_about = "\
Letterbox an image and stamp it with a tiled watermark

The base image is scaled to fit a fixed canvas (1024x768 by default) without
distortion; the leftover margin is filled with a solid colour. The watermark
is then repeated in a grid centred on the canvas and blended over it. The
result is always a PNG.

  tilemark compose --base photo.jpg --watermark logo.png
  tilemark serve
  tilemark post --base photo.jpg --watermark logo.png

Input format follows the file name: *.png is decoded as PNG, anything else
as JPEG.

Run 'tilemark gen-config' to generate a documented tilemark.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (default: ./tilemark.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log pipeline stages at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Base and watermark inputs shared by `compose` and `post`.
#[derive(clap::Args)]
struct InputArgs {
    /// Base image (PNG or JPEG)
    #[arg(long)]
    base: PathBuf,

    /// Watermark image (PNG or JPEG)
    #[arg(long)]
    watermark: PathBuf,

    /// Where to write the resulting PNG
    #[arg(long, default_value = "result.png")]
    outfile: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Compose locally and write the PNG
    Compose {
        #[command(flatten)]
        inputs: InputArgs,

        /// Canvas width (overrides [output] width)
        #[arg(long, requires = "height")]
        width: Option<u32>,

        /// Canvas height (overrides [output] height)
        #[arg(long, requires = "width")]
        height: Option<u32>,
    },
    /// Run the HTTP upload service
    Serve {
        /// Listen address (overrides [server] bind)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Upload both images to a running service and save the response
    Post {
        #[command(flatten)]
        inputs: InputArgs,

        /// Endpoint URL (overrides [client] url)
        #[arg(long)]
        url: Option<String>,
    },
    /// Print a stock tilemark.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Compose {
            inputs,
            width,
            height,
        } => {
            let config = load_config(cli.config.as_deref())?;
            init_thread_pool(&config.processing);
            let params = match (width, height) {
                (Some(w), Some(h)) => config.fit_params_for(w, h)?,
                _ => config.fit_params()?,
            };

            let base_name = display_name(&inputs.base);
            let watermark_name = display_name(&inputs.watermark);
            let base_bytes = std::fs::read(&inputs.base)?;
            let watermark_bytes = std::fs::read(&inputs.watermark)?;
            let request = ComposeRequest {
                base: ImageInput::new(&base_name, &base_bytes),
                watermark: ImageInput::new(&watermark_name, &watermark_bytes),
            };

            let backend = RustBackend::with_limits(config.decode_limits());
            let composition = pipeline::compose(&backend, &request, &params)?;
            std::fs::write(&inputs.outfile, &composition.png)?;
            output::print_compose_output(
                &composition.report,
                &base_name,
                &watermark_name,
                &inputs.outfile,
            );
        }
        Command::Serve { bind } => {
            let config = load_config(cli.config.as_deref())?;
            init_thread_pool(&config.processing);
            let state = AppState::from_config(&config)?;
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());

            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(async {
                let server = Server::bind(&bind, state).await?;
                server.run_until(shutdown_signal()).await
            })?;
        }
        Command::Post { inputs, url } => {
            let config = load_config(cli.config.as_deref())?;
            let url = url.unwrap_or(config.client.url);
            let outcome =
                client::post_files(&url, &inputs.base, &inputs.watermark, &inputs.outfile)?;
            output::print_post_output(&outcome, &inputs.outfile);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "tilemark=debug" } else { "tilemark=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// An explicit `--config` must exist; otherwise `./tilemark.toml` is optional.
fn load_config(path: Option<&Path>) -> Result<TilemarkConfig, config::ConfigError> {
    match path {
        Some(path) => config::load_config_file(path),
        None => config::load_config(Path::new(".")),
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// The path as given on the command line; its extension picks the decoder.
fn display_name(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
