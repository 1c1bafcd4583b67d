mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use rowboat::{config, journal, server};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "rowboat=trace,rowboat_db=debug,rowboat_common=debug,tower_http=debug".to_string()
        } else {
            "rowboat=info,rowboat_db=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .init();

    match cli.command {
        Commands::Serve { host, port } => {
            let mut config = config::load_config_or_default(cli.config.as_deref())?;
            config.server.host = host;
            config.server.port = port;

            let source = journal::build_source(&config);
            tracing::info!("Database: {}", journal::describe_storage(&source));
            let registry = journal::build_registry(source)?;

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(server::start_server(config, registry))?;
            Ok(())
        }
        Commands::InitDb => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            if config.database.path.is_none() {
                anyhow::bail!("init-db needs a database path in the config file");
            }
            let source = journal::build_source(&config);
            journal::build_registry(source)?;
            println!("Schema ready at {:?}", config.database.path.unwrap());
            Ok(())
        }
        Commands::Version => {
            println!("rowboat {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
