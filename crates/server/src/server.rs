//! Process lifecycle for the `authgate` binary.

use std::sync::Arc;

use authgate_authn::{Authorizer, ConfigError, ServiceRegistry};
use thiserror::Error;

use crate::{
    api::{self, AppState},
    cli::ServeArgs,
};

/// Startup and serving errors. All of them end the process.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServerError {
    /// The services file or tunables are invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `--auth-endpoint` is empty after trimming slashes.
    #[error("auth endpoint {0:?} is not a valid path segment")]
    InvalidEndpoint(String),

    /// Binding or serving failed.
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Loads configuration and builds the shared state and route.
///
/// # Errors
///
/// Returns [`ServerError::Config`] or [`ServerError::InvalidEndpoint`].
pub fn prepare(args: &ServeArgs) -> Result<(Arc<AppState>, String), ServerError> {
    let auth_route = api::endpoint_route(&args.auth_endpoint)
        .ok_or_else(|| ServerError::InvalidEndpoint(args.auth_endpoint.clone()))?;
    let config = args.auth_config()?;
    let registry = Arc::new(ServiceRegistry::from_file(&args.conf)?);
    let authorizer = Authorizer::new(registry, &config);
    Ok((Arc::new(AppState { authorizer }), auth_route))
}

/// Runs the server until a shutdown signal arrives.
///
/// With `--dry-run` the configuration is validated and the function returns
/// without binding.
///
/// # Errors
///
/// Any [`ServerError`].
pub async fn run(args: ServeArgs) -> Result<(), ServerError> {
    let (state, auth_route) = prepare(&args)?;
    let services = state.authorizer.verifier().registry().len();

    if args.dry_run {
        tracing::info!(conf = %args.conf.display(), services, "configuration OK");
        return Ok(());
    }

    let app = api::create_router(state, &auth_route);
    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    tracing::info!(
        addr = %args.listen,
        endpoint = %auth_route,
        services,
        freshness = %humantime::format_duration(args.jwt_freshness),
        cache_size = args.cache_size,
        "authgate listening"
    );

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    tracing::info!("authgate stopped");
    Ok(())
}

/// Completes on SIGTERM or SIGINT.
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "failed to register signal handlers, using Ctrl+C");
                ctrl_c().await;
                return;
            },
        };

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("received SIGTERM"),
        _ = sigint.recv() => tracing::info!("received SIGINT"),
    }
}

/// Completes on Ctrl+C.
#[cfg(not(unix))]
pub async fn shutdown_signal() {
    ctrl_c().await;
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C"),
        Err(e) => {
            tracing::warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        },
    }
}
