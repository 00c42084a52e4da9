use clap::{Parser, Subcommand};
use collab_fix::{config_man, http_receptor, oracle::OpenAiOracle, server::Server};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the correction server
    Run {
        /// Port of the HTTP surface, overrides the config file.
        #[arg(long, short = 'p')]
        port: Option<u16>,
        /// Directory containing config.json.
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        profile: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run {
            port,
            config,
            profile,
        }) => {
            let config_man = config_man::ConfigManager::new(config, profile)?;
            let config = config_man.config();
            let port = port.unwrap_or(config.port);
            let oracle = OpenAiOracle::from_env(&config.oracle)?;

            let runtime = tokio::runtime::Runtime::new()?;
            let mut server = Server::new(config, Arc::new(oracle));
            let (msg_tx, msg_rx) = tokio::sync::mpsc::channel(32);

            let _ = runtime.spawn(async move {
                if let Err(err) = server.run(msg_rx).await {
                    tracing::error!("Server exited with error: {:#}", err);
                }
            });

            http_receptor::run(&format!("localhost:{}", port), msg_tx)
        }
        None => {
            anyhow::bail!("No command given, try `collab-fix run`");
        }
    }
}
