//! `cloudgate serve`

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use cloudgate_config::Config;
use cloudgate_core::DeviceGateway;

use crate::cli::ServeArgs;
use crate::commands::build_client;
use crate::error::AppError;

pub async fn handle(args: ServeArgs, config: &Config) -> Result<(), AppError> {
    let mut config = config.clone();
    if let Some(listen) = args.listen {
        config.listen = listen;
    }

    // Validate everything before touching the network.
    let settings = cloudgate_config::serve_settings(&config)?;
    let client = Arc::new(build_client(&config)?);

    let listener = TcpListener::bind(settings.listen)
        .await
        .map_err(|source| AppError::Bind {
            addr: settings.listen.to_string(),
            source,
        })?;

    info!(
        endpoint = %client.base_url(),
        aggregation = ?settings.gateway.aggregation,
        max_concurrency = settings.gateway.max_concurrency,
        "starting gateway"
    );
    if settings.api_token.is_none() && !settings.listen.ip().is_loopback() {
        warn!(
            listen = %settings.listen,
            "no api_token configured; anyone reaching this address controls every device"
        );
    }
    let gateway = Arc::new(DeviceGateway::bootstrap(client, settings.gateway).await);

    cloudgate::serve(listener, gateway, settings.api_token, shutdown_signal()).await?;
    info!("gateway stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown requested");
}
