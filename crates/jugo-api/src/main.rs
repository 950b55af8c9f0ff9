//! Jugo server and admin CLI entry point.
//!
//! Binary name: `jugo`
//!
//! Parses CLI arguments, loads `config.toml` from the data directory, then
//! either runs the HTTP/WebSocket server or an account command.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;

use jugo_infra::config::{load_config, resolve_data_dir};
use jugo_infra::sqlite::credential::SqliteCredentialStore;
use jugo_observe::tracing_setup::{init_tracing, shutdown_tracing};

use cli::{Cli, Commands, KeyCommand, UserCommand};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need logging or state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "jugo", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(cli.log_format, cli.otel).map_err(|e| anyhow::anyhow!(e))?;

    let data_dir = resolve_data_dir();
    let result = run(cli.command, data_dir).await;

    shutdown_tracing();
    result
}

async fn run(command: Commands, data_dir: std::path::PathBuf) -> anyhow::Result<()> {
    match command {
        Commands::Serve { host, port } => {
            let mut config = load_config(&data_dir).await;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            let addr = format!("{}:{}", config.server.host, config.server.port);

            let state = AppState::init(data_dir, config).await?;
            let hub = state.hub.clone();

            let listener = tokio::net::TcpListener::bind(&addr).await?;
            println!(
                "  {} Jugo listening on {}",
                console::style("⚡").bold(),
                console::style(format!("http://{addr}")).cyan()
            );
            println!("  {}", console::style("Press Ctrl+C to stop").dim());
            tracing::info!(%addr, "server started");

            let router = http::router::build_router(state);
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            hub.shutdown();
            tracing::info!("server stopped");
            println!("\n  Server stopped.");
        }

        Commands::User { action } => {
            let store = SqliteCredentialStore::new(state::open_database(&data_dir).await?);
            match action {
                UserCommand::Create { username } => {
                    cli::account::create_user(&store, &username).await?;
                }
            }
        }

        Commands::Key { action } => {
            let store = SqliteCredentialStore::new(state::open_database(&data_dir).await?);
            match action {
                KeyCommand::Create { user_id, name } => {
                    cli::account::create_key(&store, user_id, &name).await?;
                }
            }
        }

        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
