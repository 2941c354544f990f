//! Hot Mock - CLI Entry Point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hot_mock::{
    HotMock, HotMockConfig, HttpMethod, MockRecord, OutgoingRequest, RecordOutcome, VcrMode,
};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "hot-mock",
    about = "Manage hot-swappable HTTP mocks - toggle, edit, record, and switch scenarios",
    version
)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "hot-mock.yaml")]
    config: PathBuf,

    /// Environment name (overrides config and HOT_MOCK_ENV)
    #[arg(short, long)]
    env: Option<String>,

    /// Project root (overrides config and HOT_MOCK_ROOT)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "warn")]
    log_level: Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Turn mocking on
    Enable,
    /// Turn mocking off
    Disable,
    /// Flip mocking on/off
    Toggle,
    /// Show enable flag, scenario, and VCR mode
    Status,
    /// List mocks visible in the current scope
    List,
    /// Add or replace a mock in the current scope
    Mock {
        /// HTTP method
        #[arg(short, long)]
        method: HttpMethod,
        /// URL pattern (regular expression)
        #[arg(short, long)]
        url: String,
        /// Response status
        #[arg(short, long, default_value_t = 200)]
        status: u16,
        /// Response header as `Name: value` (repeatable)
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
        /// Response body (JSON, or plain text if not JSON)
        #[arg(short, long)]
        body: Option<String>,
        /// Interpolation as `body_field=request_field` (repeatable)
        #[arg(short, long = "interpolate", value_parser = parse_interpolation)]
        interpolate: Vec<(String, String)>,
    },
    /// Remove a mock from the current scope
    Delete {
        #[arg(short, long)]
        method: HttpMethod,
        #[arg(short, long)]
        url: String,
    },
    /// Record a live response as a mock
    Record {
        #[arg(short, long)]
        method: HttpMethod,
        #[arg(short, long)]
        url: String,
        /// Request header as `Name: value` (repeatable)
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
        /// Activate and record into this scenario
        #[arg(short, long, conflicts_with = "force")]
        scenario: Option<String>,
        /// Replace an existing mock instead of skipping
        #[arg(short, long)]
        force: bool,
    },
    /// Show, set, clear, or list scenarios
    Scenario {
        #[command(subcommand)]
        action: Option<ScenarioAction>,
    },
    /// Show or set VCR mode
    Vcr {
        #[command(subcommand)]
        action: Option<VcrAction>,
    },
    /// Print effective configuration and exit
    PrintConfig,
    /// Validate configuration and exit
    Validate,
}

#[derive(Subcommand, Debug)]
enum ScenarioAction {
    /// Activate a scenario
    Set { name: String },
    /// Deactivate the current scenario
    Clear,
    /// List known scenarios
    List,
}

#[derive(Subcommand, Debug)]
enum VcrAction {
    /// Stop recording unmatched calls
    Off,
    /// Record unmatched calls into the current scope
    On,
    /// Record unmatched calls into a scenario
    Scenario { name: String },
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got `{}`", raw))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

fn parse_interpolation(raw: &str) -> Result<(String, String), String> {
    let (target, source) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected `body_field=request_field`, got `{}`", raw))?;
    Ok((target.trim().to_string(), source.trim().to_string()))
}

fn parse_body(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

fn load_config(args: &Args) -> Result<HotMockConfig> {
    let mut config = if args.config.exists() {
        info!(path = ?args.config, "Loading configuration");
        HotMockConfig::from_file(&args.config)?
    } else {
        HotMockConfig::default()
    }
    .with_env_overrides();

    if let Some(env) = &args.env {
        config.environment = env.clone();
    }
    if let Some(root) = &args.root {
        config.root = root.clone();
    }
    config.validate()?;
    Ok(config)
}

fn vcr_label(mode: &VcrMode) -> String {
    match mode {
        VcrMode::Off => "off".to_string(),
        VcrMode::Default => "on".to_string(),
        VcrMode::Scenario(name) => format!("on (scenario: {})", name),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(&args)?;

    match args.command {
        Command::PrintConfig => {
            print!("{}", serde_yaml::to_string(&config)?);
            return Ok(());
        }
        Command::Validate => {
            println!(
                "Configuration is valid (environment: {}, mocks: {})",
                config.environment,
                config.mocks_root().display()
            );
            return Ok(());
        }
        _ => {}
    }

    let engine = HotMock::with_reqwest(config);

    match args.command {
        Command::Enable => {
            engine.enable()?;
            println!("Mocking enabled");
        }
        Command::Disable => {
            engine.disable()?;
            println!("Mocking disabled");
        }
        Command::Toggle => {
            let enabled = engine.toggle()?;
            println!("Mocking {}", if enabled { "enabled" } else { "disabled" });
        }
        Command::Status => {
            let config = engine.config();
            println!("environment: {}", config.environment);
            println!("production:  {}", config.is_production());
            println!("enabled:     {}", engine.is_enabled());
            println!(
                "scenario:    {}",
                engine.scenario().as_deref().unwrap_or("(none)")
            );
            println!("vcr:         {}", vcr_label(&engine.vcr()));
            println!("mocks:       {}", engine.mocks().len());
        }
        Command::List => {
            for record in engine.mocks() {
                let method = record
                    .method
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "*".to_string());
                println!("{:<7} {:<4} {}", method, record.status, record.url_pattern);
            }
        }
        Command::Mock {
            method,
            url,
            status,
            headers,
            body,
            interpolate,
        } => {
            let mut record = MockRecord::new(method, url).with_status(status);
            for (name, value) in headers {
                record = record.with_header(name, value);
            }
            if let Some(body) = body {
                record = record.with_body(parse_body(&body));
            }
            for (target, source) in interpolate {
                record = record.with_interpolation(target, source);
            }
            engine.mock(record)?;
            println!("Mock saved");
        }
        Command::Delete { method, url } => {
            if engine.delete(method, &url)? {
                println!("Mock deleted");
            } else {
                println!("No such mock");
            }
        }
        Command::Record {
            method,
            url,
            headers,
            scenario,
            force,
        } => {
            let mut request = OutgoingRequest::new(method, url);
            for (name, value) in headers {
                request = request.with_header(name, value);
            }

            let outcome = if force {
                engine.record_forced(&request).await?
            } else {
                engine.record(&request, scenario.as_deref()).await?
            };

            match outcome {
                RecordOutcome::Recorded(record) => {
                    println!("Recorded {} {} ({})", method, record.url_pattern, record.status)
                }
                RecordOutcome::Skipped(reason) => println!("Skipped: {:?}", reason),
                RecordOutcome::TransportFailed(e) => {
                    return Err(e).context("recording failed");
                }
            }
        }
        Command::Scenario { action } => match action {
            None => println!("{}", engine.scenario().as_deref().unwrap_or("(none)")),
            Some(ScenarioAction::Set { name }) => {
                engine.set_scenario(Some(&name))?;
                println!("Scenario set to {}", name);
            }
            Some(ScenarioAction::Clear) => {
                engine.set_scenario(None)?;
                println!("Scenario cleared");
            }
            Some(ScenarioAction::List) => {
                for name in engine.scenarios() {
                    println!("{}", name);
                }
            }
        },
        Command::Vcr { action } => {
            let mode = match action {
                None => {
                    println!("{}", vcr_label(&engine.vcr()));
                    return Ok(());
                }
                Some(VcrAction::Off) => VcrMode::Off,
                Some(VcrAction::On) => VcrMode::Default,
                Some(VcrAction::Scenario { name }) => VcrMode::Scenario(name),
            };
            engine.set_vcr(mode)?;
            println!("VCR {}", vcr_label(&engine.vcr()));
        }
        Command::PrintConfig | Command::Validate => unreachable!("handled before engine setup"),
    }

    Ok(())
}
