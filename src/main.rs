use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;

use ecoverse_client::config::{load_config, print_schema, ConfigV1};
use ecoverse_client::models::Operation;
use ecoverse_client::startup::build_client;
use ecoverse_client::tasks::env_config::{CONFIG_FILE_NAME, DEFAULT_PREFIX};
use ecoverse_client::tasks::{build_configuration, write_possible_types};
use ecoverse_client::utils::logger::init_logging;

/// Ecoverse GraphQL client
#[derive(Parser, Debug)]
#[command(name = "ecoverse-client")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "ECOVERSE_CONFIG", default_value = "./config.yaml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one GraphQL operation and print its data as JSON
    Query {
        /// Query document
        query: String,
        /// Variables as a JSON object
        #[arg(long, default_value = "{}")]
        variables: String,
        #[arg(long)]
        operation_name: Option<String>,
        /// Print the queued user-visible errors to stderr on exit
        #[arg(long)]
        show_errors: bool,
    },
    /// Extract the abstract type map from the schema
    PossibleTypes {
        /// Endpoint to introspect; defaults to the configured one
        #[arg(long)]
        endpoint: Option<String>,
        #[arg(long, default_value = "./src/generated/possibleTypes.json")]
        output: PathBuf,
    },
    /// Write the front-end runtime configuration script
    EnvConfig {
        #[arg(long, default_value = DEFAULT_PREFIX)]
        prefix: String,
        /// Target environment; defaults to graphql.environment
        #[arg(long, env = "NODE_ENV")]
        environment: Option<String>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the configuration JSON schema
    Schema,
}

#[tokio::main]
async fn main() {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    if let Command::Schema = args.command {
        if let Err(e) = print_schema() {
            eprintln!("{}", e);
            std::process::exit(1);
        }
        return;
    }

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(args.command, Arc::new(config)).await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn run(command: Command, config: Arc<ConfigV1>) -> Result<(), String> {
    match command {
        Command::Query {
            query,
            variables,
            operation_name,
            show_errors,
        } => {
            let variables: Value = serde_json::from_str(&variables)
                .map_err(|e| format!("Invalid --variables JSON: {}", e))?;
            let mut operation = Operation::new(query).with_variables(variables);
            if let Some(name) = operation_name {
                operation = operation.with_operation_name(name);
            }

            let client = build_client(config).await?;
            let result = client.execute(operation).await;

            if show_errors {
                for record in client.context().errors.drain() {
                    eprintln!("{}", record.message);
                }
            }
            let data = result.map_err(|e| e.to_string())?;
            let rendered = serde_json::to_string_pretty(&data)
                .map_err(|e| format!("Failed to render response: {}", e))?;
            println!("{}", rendered);
            Ok(())
        }
        Command::PossibleTypes { endpoint, output } => {
            let endpoint = endpoint.unwrap_or_else(|| config.graphql.resolve_endpoint());
            let types = write_possible_types(&endpoint, &output).await?;
            info!("Extracted {} abstract types", types.len());
            Ok(())
        }
        Command::EnvConfig {
            prefix,
            environment,
            output,
        } => {
            let environment = environment.unwrap_or_else(|| config.graphql.environment.clone());
            let output = output.unwrap_or_else(|| PathBuf::from("./public").join(CONFIG_FILE_NAME));
            build_configuration(&prefix, &environment, &output).await?;
            Ok(())
        }
        Command::Schema => print_schema(),
    }
}
