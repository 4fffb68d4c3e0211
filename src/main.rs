//! Party board controller entrypoint wiring the station bus, the HTTP routes and the game loop.

use std::time::Duration;

use anyhow::Context;
use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::time::sleep;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use party_board_back::{
    config::{AppConfig, Cli},
    error::BusError,
    routes,
    state::{AppState, SharedState},
};

/// Delay between attempts to bind the station listener.
const BIND_RETRY: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = AppConfig::from_cli(cli);
    info!(
        players = config.players,
        win_points = config.win_points,
        debug = config.debug,
        client_id = %config.client_id,
        "starting party board controller"
    );

    let app_state = AppState::new(config);
    let listener = bind_with_retry(&app_state).await;

    tokio::spawn(run_game(app_state.clone()));
    let app = build_router(app_state);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Keep trying to bind the station listener until it succeeds.
async fn bind_with_retry(state: &SharedState) -> TcpListener {
    let addr = state.config().listen;
    loop {
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                info!(%addr, "station bus listening");
                return listener;
            }
            Err(err) => {
                let err = BusError::Bind(err);
                warn!(%addr, error = %err, "retrying in {}s", BIND_RETRY.as_secs());
                sleep(BIND_RETRY).await;
            }
        }
    }
}

/// Drive the single game session to its end.
async fn run_game(state: SharedState) {
    match state.controller().run().await {
        Ok(outcome) => info!(?outcome, "game session finished"),
        Err(err) => error!(error = %err, "game session aborted"),
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state).layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers; `RUST_LOG` overrides the default filter.
fn init_tracing(debug: bool) {
    let default = if debug {
        "debug"
    } else {
        "info,tower_http=debug"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default.into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
