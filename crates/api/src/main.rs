use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use todorelay_api::app::{self, AppServices};
use todorelay_api::runtime::{QueueTrigger, RedriveSchedule, TriggerSettings};
use todorelay_infra::RelayConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    todorelay_observability::init();

    let config = RelayConfig::from_env().context("invalid configuration")?;
    let services = Arc::new(
        AppServices::build(&config)
            .await
            .context("failed to initialise queues and store")?,
    );

    let trigger = QueueTrigger::new(
        services.primary.clone(),
        services.store.clone(),
        TriggerSettings::from_config(&config),
    )
    .spawn();

    let schedule = match config.redrive_interval {
        Some(every) => Some(
            RedriveSchedule::new(services.dead_letter.clone(), services.primary.clone(), every).spawn(),
        ),
        None => {
            warn!("REDRIVE_INTERVAL_SECS=0; scheduled redrive disabled");
            None
        }
    };

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app::build_app(services))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    trigger.shutdown().await;
    if let Some(schedule) = schedule {
        schedule.shutdown().await;
    }
    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
