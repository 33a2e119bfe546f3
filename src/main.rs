//! response-tinker replay harness.
//!
//! Runs handlers offline against captured traffic. Nothing here opens a
//! socket: the request and response come from files and the rewritten
//! response goes to a file or stdout.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde_json::json;

use response_tinker::config::{load_config, TinkerConfig};
use response_tinker::http::HttpService;
use response_tinker::observability::logging::init_logging;
use response_tinker::{CorrelationKey, EngineContext, InterceptedMessage, InterceptionEngine};

#[derive(Parser)]
#[command(name = "response-tinker")]
#[command(about = "Validate and replay response-rewriting handlers", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a route and compile its handler
    Check {
        #[arg(long)]
        route: String,
        #[arg(long)]
        handler: PathBuf,
    },
    /// Run one captured exchange through a handler
    Replay {
        #[arg(long)]
        route: String,
        #[arg(long)]
        handler: PathBuf,
        /// Service the request was sent to, e.g. https://example.com
        #[arg(long)]
        service: HttpService,
        /// Raw request bytes
        #[arg(long)]
        request: PathBuf,
        /// Raw response bytes
        #[arg(long)]
        response: PathBuf,
        /// Where to write the outgoing response (stdout if absent)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => TinkerConfig::default(),
    };
    init_logging(&config.logging);

    tracing::debug!(
        enabled = config.interception.enabled,
        pending_ttl_secs = config.interception.pending_ttl_secs,
        "Configuration loaded"
    );

    let engine = InterceptionEngine::new(&EngineContext::new(config));

    match cli.command {
        Commands::Check { route, handler } => {
            let source = fs::read_to_string(&handler)?;
            let registered = engine.routes().register_route(&route, &source)?;
            let summary = json!({
                "route": registered.identity().to_string(),
                "methods": registered.methods(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Replay {
            route,
            handler,
            service,
            request,
            response,
            out,
        } => {
            let source = fs::read_to_string(&handler)?;
            engine.routes().register_route(&route, &source)?;

            let key = CorrelationKey(0);
            engine.on_request(&InterceptedMessage::new(
                key,
                service.clone(),
                fs::read(&request)?,
            ));

            let mut message = InterceptedMessage::new(key, service, fs::read(&response)?);
            let outcome = engine.on_response(&mut message);
            tracing::info!(outcome = outcome.label(), "Replay finished");

            write_output(out.as_deref(), &message.bytes)?;
        }
    }

    Ok(())
}

fn write_output(out: Option<&Path>, bytes: &[u8]) -> std::io::Result<()> {
    match out {
        Some(path) => fs::write(path, bytes),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()
        }
    }
}
