use clap::Parser;
use sandcore::{
    cli::SandcoreArgs,
    config::SandcoreConfig,
    lifecycle::Orchestrator,
    server::{self, ServerState},
    SandcoreResult,
};
use tokio::{
    net::TcpListener,
    signal::unix::{signal, SignalKind},
};
use tracing_subscriber::{fmt, EnvFilter};

//--------------------------------------------------------------------------------------------------
// Functions: main
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() -> SandcoreResult<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let args = SandcoreArgs::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = SandcoreConfig::load(args.config.as_deref()).await?;
    args.apply_to(&mut config)?;
    config.validate()?;

    let orchestrator = Orchestrator::from_config(&config).await?;
    let listener = TcpListener::bind(("0.0.0.0", *config.get_port())).await?;

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let shutdown = async move {
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
        }
    };

    server::serve(listener, ServerState::new(orchestrator.clone()), shutdown).await?;

    orchestrator.drain().await;
    tracing::info!("sandcore exited cleanly");

    Ok(())
}
