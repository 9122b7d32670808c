use anyhow::Result;
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use federation_gateway::{
    BootstrapOutcome, BootstrapSupervisor, Environment, GatewayConfig, load_subgraphs,
    start_gateway,
};

#[derive(Parser)]
#[command(name = "federation-gateway")]
#[command(about = "Federation gateway front door for subgraph services")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway
    Serve {
        #[arg(short, long, env = "GATEWAY_PORT", default_value_t = 4100)]
        port: u16,
        /// Auth service endpoint used to validate bearer tokens
        #[arg(long, env = "AUTH_SERVICE_URL")]
        auth_url: String,
        /// Re-compose the schema from live subgraphs every N seconds (0 disables)
        #[arg(long, env = "SCHEMA_POLL_SECONDS", default_value_t = 0)]
        schema_poll_seconds: u64,
        /// Keep retrying startup forever instead of aborting after the bound
        #[arg(long, env = "GATEWAY_RETRY_FOREVER", default_value_t = false)]
        retry_forever: bool,
        /// Deployment environment; development exposes the landing page
        #[arg(long, env = "GATEWAY_ENV", value_enum, default_value_t = Environment::Development)]
        environment: Environment,
    },
    /// Validate the subgraph registry file and print the resolved set
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("federation_gateway=info".parse()?),
        )
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            auth_url,
            schema_poll_seconds,
            retry_forever,
            environment,
        } => {
            let subgraphs = load_subgraphs()?;
            for subgraph in &subgraphs {
                info!("Registering subgraph '{}' ({})", subgraph.name, subgraph.url);
            }

            let config = GatewayConfig {
                port,
                auth_service_url: auth_url,
                subgraphs,
                schema_poll: (schema_poll_seconds > 0)
                    .then(|| Duration::from_secs(schema_poll_seconds)),
                retry_forever,
                environment,
            };

            let supervisor = BootstrapSupervisor::new().retry_forever(retry_forever);
            let outcome = supervisor
                .run(|attempt| {
                    let config = config.clone();
                    async move {
                        if attempt > 0 {
                            info!(attempt, "retrying gateway startup");
                        }
                        start_gateway(&config).await
                    }
                })
                .await;

            let exit_code = outcome.exit_code();
            match outcome {
                BootstrapOutcome::Healthy(running) => {
                    running.wait().await?;
                }
                BootstrapOutcome::Aborted { attempts, error } => {
                    error!(attempts, error = %error, "gateway startup retries exhausted");
                    std::process::exit(exit_code);
                }
            }
        }
        Commands::CheckConfig => {
            let subgraphs = load_subgraphs()?;

            println!("{:<24} {:<40} {:<12} {:<12}", "NAME", "URL", "JWT HEADER", "AUTH");
            println!("{}", "-".repeat(90));
            for subgraph in &subgraphs {
                println!(
                    "{:<24} {:<40} {:<12} {:<12}",
                    subgraph.name,
                    subgraph.url,
                    if subgraph.include_auth_jwt { "yes" } else { "no" },
                    if subgraph.requires_auth { "required" } else { "optional" },
                );
            }
            println!();
            println!("{} subgraph(s) configured.", subgraphs.len());
        }
    }

    Ok(())
}
