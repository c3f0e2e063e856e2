// # ibmcloud-tf
//
// Thin command line driver around the provider engine. It reads a JSON
// configuration document, builds the provider session from the environment
// and the document's `provider.ibm` block, registers the service crates that
// were compiled in, and runs one engine operation against a state file.
//
// ## Credentials
//
// - `IC_API_KEY` / `IBMCLOUD_API_KEY`
// - `IC_IAM_TOKEN` / `IBMCLOUD_IAM_TOKEN` (with optional `IC_IAM_REFRESH_TOKEN`)
// - `IC_REGION`, `IC_RESOURCE_GROUP`, `IC_ENV_TYPE` (`public` or `private`)
//
// Values in the `provider.ibm` block override the environment.
//
// ## Example
//
// ```bash
// export IC_API_KEY=...
// ibmcloud-tf --config main.tf.json plan
// ibmcloud-tf --config main.tf.json apply
// ```

mod schema_dump;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ibmcloud_conns::Session;
use ibmcloud_core::state::open_state_store;
use ibmcloud_core::{
    ApplyReport, Configuration, Engine, EngineConfig, EngineEvent, ProviderConfig,
    ResourceRegistry, StateStoreConfig,
};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TfExitCode {
    Success = 0,
    /// Invalid configuration, credentials or arguments
    ConfigError = 1,
    /// An API call or an apply step failed
    RuntimeError = 2,
}

impl From<TfExitCode> for ExitCode {
    fn from(code: TfExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Parser, Debug)]
#[command(name = "ibmcloud-tf", version, about, long_about = None)]
struct Cli {
    /// Configuration document (JSON)
    #[arg(short, long, default_value = "main.tf.json")]
    config: String,

    /// State file
    #[arg(short, long, default_value = "terraform.tfstate.json")]
    state: String,

    /// Concurrent operations per dependency wave
    #[arg(long, default_value_t = 10)]
    parallelism: usize,

    /// trace, debug, info, warn or error [default: $TF_LOG, $IBMCLOUD_LOG_LEVEL or info]
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Check the configuration without calling any API
    Validate,
    /// Show what apply would change
    Plan,
    /// Create, update and delete remote objects to match the configuration
    Apply,
    /// Re-read every object in state
    Refresh,
    /// Delete every object in state
    Destroy,
    /// Print resource and data source schemas as JSON
    Schema,
}

/// Log level from the command line, then the environment
fn log_level<F>(flag: Option<&str>, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    flag.map(str::to_string)
        .or_else(|| lookup("TF_LOG"))
        .or_else(|| lookup("IBMCLOUD_LOG_LEVEL"))
        .filter(|level| !level.is_empty())
        .unwrap_or_else(|| "info".to_string())
}

fn parse_level(level: &str) -> Option<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Exit code for an error that stopped the run
fn classify(err: &anyhow::Error) -> TfExitCode {
    use ibmcloud_core::Error;

    match err.downcast_ref::<Error>().map(Error::root) {
        Some(
            Error::Config(_) | Error::Validation(_) | Error::InvalidId(_) | Error::Authentication(_),
        ) => TfExitCode::ConfigError,
        _ => TfExitCode::RuntimeError,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let requested = log_level(cli.log_level.as_deref(), |name| std::env::var(name).ok());
    let Some(level) = parse_level(&requested) else {
        eprintln!(
            "Invalid log level '{}'. Valid levels: trace, debug, info, warn, error",
            requested
        );
        return TfExitCode::ConfigError.into();
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return TfExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return TfExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match run(cli).await {
            Ok(code) => code,
            Err(e) => {
                error!("{:#}", e);
                classify(&e)
            }
        }
    });

    code.into()
}

/// Register the services compiled into this binary
fn build_registry(session: Arc<Session>) -> Arc<ResourceRegistry> {
    let registry = ResourceRegistry::new();

    #[cfg(feature = "dns")]
    ibmcloud_dns::register(&registry, session.clone());

    #[cfg(feature = "appid")]
    ibmcloud_appid::register(&registry, session.clone());

    #[cfg(feature = "satellite")]
    ibmcloud_satellite::register(&registry, session.clone());

    drop(session);
    Arc::new(registry)
}

async fn run(cli: Cli) -> Result<TfExitCode> {
    if cli.command == Command::Schema {
        // Schemas never reach the API, so any well-formed credential will do
        let session = Session::new(ProviderConfig {
            iam_token: Some("schema-only".to_string()),
            ..ProviderConfig::default()
        })?;
        let registry = build_registry(session);
        println!("{}", serde_json::to_string_pretty(&schema_dump::dump(&registry)?)?);
        return Ok(TfExitCode::Success);
    }

    let document = Configuration::from_file(&cli.config).await?;

    let mut provider = ProviderConfig::from_env()?;
    provider
        .merge(&document.provider)
        .context("Error reading provider block")?;
    let session = Session::new(provider)?;
    info!(
        "Provider region {} ({} endpoints)",
        session.region(),
        session.config().visibility
    );
    let registry = build_registry(session);

    let state = open_state_store(&StateStoreConfig::File {
        path: cli.state.clone(),
    })
    .await?;

    let engine_config = EngineConfig {
        parallelism: cli.parallelism,
        ..EngineConfig::default()
    };
    let (engine, events) = Engine::new(registry, state, engine_config)?;

    let diagnostics = engine.validate(&document);
    for diagnostic in diagnostics.iter() {
        eprintln!("{}", diagnostic);
    }
    if diagnostics.has_errors() {
        return Ok(TfExitCode::ConfigError);
    }
    if cli.command == Command::Validate {
        println!("Success! The configuration is valid.");
        return Ok(TfExitCode::Success);
    }

    let logger = tokio::spawn(log_events(events));

    let code = match cli.command {
        Command::Plan => {
            let plan = engine.plan(&document).await?;
            if plan.has_changes() {
                println!("{}", plan);
            } else {
                println!("No changes. Infrastructure is up-to-date.");
            }
            TfExitCode::Success
        }
        command => {
            let watcher = tokio::spawn(cancel_on_signal(engine.clone()));
            let result = match command {
                Command::Apply => engine.apply(&document).await,
                Command::Refresh => engine.refresh(&document).await,
                _ => engine.destroy(&document).await,
            };
            watcher.abort();
            let _ = watcher.await;
            report(&result?)
        }
    };

    drop(engine);
    if let Err(e) = logger.await {
        warn!("Event logger stopped: {}", e);
    }
    Ok(code)
}

fn report(report: &ApplyReport) -> TfExitCode {
    for (address, message) in &report.failed {
        eprintln!("Error: {}: {}", address, message);
    }
    for address in &report.skipped {
        eprintln!("Skipped: {}", address);
    }
    println!("{}", report.summary());

    if report.is_success() {
        TfExitCode::Success
    } else {
        TfExitCode::RuntimeError
    }
}

async fn log_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::OperationStarted { address, action } => info!("{}: {}...", address, action),
            EngineEvent::ResourceCreated { address, id } => info!("{}: created [id={}]", address, id),
            EngineEvent::ResourceUpdated { address, id, changed } => {
                info!("{}: updated [id={}] ({})", address, id, changed.join(", "))
            }
            EngineEvent::ResourceReplaced { address, id } => {
                info!("{}: replaced [id={}]", address, id)
            }
            EngineEvent::ResourceDeleted { address, id } => info!("{}: destroyed [id={}]", address, id),
            EngineEvent::ResourceUnchanged { address } => tracing::debug!("{}: unchanged", address),
            EngineEvent::ResourceVanished { address } => {
                warn!("{}: no longer exists remotely", address)
            }
            EngineEvent::DataSourceRead { address, id } => info!("{}: read [id={}]", address, id),
            EngineEvent::OperationFailed { address, error } => error!("{}: {}", address, error),
            EngineEvent::OperationSkipped { address, reason } => {
                warn!("{}: skipped ({})", address, reason)
            }
            EngineEvent::Completed { succeeded } => info!("Operation completed (success: {})", succeeded),
        }
    }
}

/// Cancel the engine on SIGINT or SIGTERM
#[cfg(unix)]
async fn cancel_on_signal(engine: Engine) {
    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(term), Ok(int)) => (term, int),
        (Err(e), _) | (_, Err(e)) => {
            warn!("Failed to install signal handlers: {}", e);
            return;
        }
    };

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    warn!("Received {}, cancelling in-flight operations", name);
    engine.cancel();
}

#[cfg(not(unix))]
async fn cancel_on_signal(engine: Engine) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!("Received CTRL-C, cancelling in-flight operations");
            engine.cancel();
        }
        Err(e) => warn!("Failed to wait for CTRL-C: {}", e),
    }
}
