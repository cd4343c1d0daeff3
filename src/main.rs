use clap::Parser;
use genai_binder::{config::AppConfig, observability, startup};
use serde::Serialize;

/// CLI arguments for genai-binder
#[derive(Parser, Debug)]
#[command(version, about = "GenAI service binding resolver", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Discover model endpoints and print them
    Discover,
    /// Discover models and resolve the embedding dimensionality
    Resolve,
    /// Run every startup stage and print the resulting context (default)
    Provision,
    /// Export the JSON schema for the configuration file
    Schema {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    match args.command {
        Some(Command::Schema { output }) => run_schema_export(output),
        command => run(command, args.config.as_deref()).await,
    }
}

async fn run(command: Option<Command>, config_path: Option<&str>) {
    let config = load_config(config_path);

    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    if let Err(e) = observability::metrics::init_metrics(&config.observability.metrics) {
        tracing::warn!(error = %e, "Failed to initialize metrics");
    }

    let result = match command {
        Some(Command::Discover) => startup::discover(&config)
            .await
            .map(|discovery| to_json(&discovery.summary())),
        Some(Command::Resolve) => startup::resolve(&config)
            .await
            .map(|(_, embedding)| to_json(&embedding)),
        Some(Command::Provision) | Some(Command::Schema { .. }) | None => {
            startup::bootstrap(&config)
                .await
                .map(|context| to_json(&context.summary()))
        }
    };

    match result {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn load_config(path: Option<&str>) -> AppConfig {
    let Some(path) = path else {
        return AppConfig::default();
    };
    match AppConfig::from_file(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config from {path}: {e}");
            std::process::exit(1);
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}

#[cfg(feature = "json-schema")]
fn run_schema_export(output: Option<String>) {
    let content = AppConfig::json_schema_string();

    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, &content) {
                eprintln!("Failed to write to {path}: {e}");
                std::process::exit(1);
            }
            eprintln!("Config JSON schema written to {path}");
        }
        None => println!("{content}"),
    }
}

#[cfg(not(feature = "json-schema"))]
fn run_schema_export(output: Option<String>) {
    let _ = output;
    eprintln!("Error: JSON schema export requires the 'json-schema' feature");
    std::process::exit(1);
}
