use anyhow::Result;
use astrosniff_core::{urls, ScanOptions};
use astrosniff_local::HttpFetcher;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "astrosniff")]
#[command(about = "Detect whether a website was built with Astro", long_about = None)]
struct Cli {
    /// Log scanner internals (chunk reads, marker hits) to stderr.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan one URL and print the verdict as JSON.
    Check(CheckCmd),
    /// Serve the JSON API route (GET /api/check?url=...).
    Serve(ServeCmd),
    /// Print version info.
    Version,
}

#[derive(clap::Args, Debug)]
struct CheckCmd {
    /// Target URL (https:// is assumed when the scheme is missing).
    url: String,
    /// Per-attempt deadline in milliseconds.
    #[arg(long, default_value_t = 2_000)]
    timeout_ms: u64,
    /// Maximum meta-refresh redirect hops to follow.
    #[arg(long, default_value_t = 3)]
    max_redirects: u32,
}

#[derive(clap::Args, Debug)]
struct ServeCmd {
    /// Listen address.
    #[arg(long, env = "ASTROSNIFF_ADDR", default_value = "127.0.0.1:8787")]
    addr: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match cli.command {
        Commands::Check(cmd) => check(cmd).await,
        Commands::Serve(cmd) => astrosniff_cli::api::serve(&cmd.addr).await,
        Commands::Version => {
            println!(
                "{}",
                serde_json::json!({
                    "name": "astrosniff",
                    "version": env!("CARGO_PKG_VERSION"),
                })
            );
            Ok(())
        }
    }
}

fn init_tracing(debug: bool) {
    let default = if debug {
        "warn,astrosniff_core=debug,astrosniff_local=debug,astrosniff_cli=debug"
    } else {
        "warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn check(cmd: CheckCmd) -> Result<()> {
    let target = urls::normalize_target(&cmd.url);
    let fetcher = HttpFetcher::new()?;
    let opts = ScanOptions {
        timeout_ms: cmd.timeout_ms,
        max_redirects: cmd.max_redirects,
    };

    match fetcher.check(&target, &opts).await {
        Ok(verdict) => {
            println!("{}", serde_json::to_string_pretty(&verdict)?);
            Ok(())
        }
        Err(err) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&astrosniff_cli::api::error_body(&err))?
            );
            std::process::exit(1);
        }
    }
}
