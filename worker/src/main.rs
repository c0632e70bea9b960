use anyhow::Result;
use std::sync::Arc;
use subscription_core::{
    domain::repositories::{notifications::SubscriptionNotifier, subscriptions::SubscriptionRepository},
    infra::{
        db::{postgres::postgres_connection, repositories::subscriptions::SubscriptionPostgres},
        notifications::queued_notifier,
    },
};
use tokio::sync::watch;
use tracing::{error, info};
use worker::{
    axum_http, config,
    services::{shutdown, sweep_loop},
    usecases::expire_subscriptions::ExpirySweepUseCase,
};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(error) = run().await {
        error!("Worker exited with error: {}", error);
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    subscription_core::observability::init_observability("worker")?;

    let dotenvy_env = Arc::new(config::config_loader::load()?);
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(&dotenvy_env.database.url)?;
    info!("Postgres connection has been established");

    let db_pool_arc = Arc::new(postgres_pool);

    let subscription_repository: Arc<dyn SubscriptionRepository + Send + Sync> =
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool_arc)));

    let notifier: Arc<dyn SubscriptionNotifier + Send + Sync> = Arc::new(queued_notifier(
        dotenvy_env.notifications.service_url.clone(),
        dotenvy_env.notifications.service_token.clone(),
    )?);

    let sweep_usecase = Arc::new(ExpirySweepUseCase::new(subscription_repository, notifier));

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(shutdown::watch_signals(stop_tx));

    let mut sweep_task = tokio::spawn(sweep_loop::run(
        Arc::clone(&sweep_usecase),
        dotenvy_env.sweep.clone(),
        stop_rx.clone(),
    ));

    let server_config = Arc::clone(&dotenvy_env);
    let mut server_task = tokio::spawn(axum_http::http_serve::start(
        server_config,
        sweep_usecase,
        stop_rx,
    ));

    // Both tasks end on shutdown; an error from either stops the worker.
    tokio::select! {
        result = &mut sweep_task => {
            result??;
            server_task.await??;
        }
        result = &mut server_task => {
            result??;
            sweep_task.await??;
        }
    };
    info!("Worker stopped");
    Ok(())
}
