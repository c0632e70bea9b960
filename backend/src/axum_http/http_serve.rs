use crate::{
    auth::UserJwtSecret,
    axum_http::{default_routers, routers},
    config::config_model::DotEnvyConfig,
    usecases::{billing_webhook::BillingWebhookUseCase, subscriptions::SubscriptionUseCase},
};
use anyhow::Result;
use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use subscription_core::{
    infra::{
        db::{
            postgres::postgres_connection::PgPoolSquad,
            repositories::{
                app_users::UserPostgres, subscriptions::SubscriptionPostgres,
                transactions::TransactionPostgres,
            },
        },
        notifications::queued_notifier,
    },
    payments::{
        errors::AlreadyInactiveMatcher,
        paystack_client::{PaystackClient, PaystackConfig},
    },
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let subscription_repository = Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool)));
    let transaction_repository = Arc::new(TransactionPostgres::new(Arc::clone(&db_pool)));
    let user_repository = Arc::new(UserPostgres::new(Arc::clone(&db_pool)));

    let billing = Arc::new(PaystackClient::new(PaystackConfig {
        base_url: config.billing.base_url.clone(),
        secret_key: config.billing.secret_key.clone(),
        timeout: config.billing.timeout,
        already_inactive: AlreadyInactiveMatcher::from_csv(
            &config.billing.already_inactive_markers,
        ),
    })?);
    info!(base_url = %config.billing.base_url, "Billing provider client is ready");

    let notifier = Arc::new(queued_notifier(
        config.notifications.service_url.clone(),
        config.notifications.service_token.clone(),
    )?);

    let subscriptions_usecase = Arc::new(SubscriptionUseCase::new(
        Arc::clone(&subscription_repository),
        Arc::clone(&transaction_repository),
        Arc::clone(&user_repository),
        Arc::clone(&billing),
        Arc::clone(&notifier),
        config.billing.callback_base_url.clone(),
    ));
    let webhook_usecase = Arc::new(BillingWebhookUseCase::new(
        subscription_repository,
        transaction_repository,
        user_repository,
        billing,
        notifier,
    ));

    let jwt_secret = UserJwtSecret(Arc::from(config.user_auth.jwt_secret.as_str()));

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest(
            "/api/v1/subscriptions",
            routers::subscriptions::routes(Arc::clone(&subscriptions_usecase), jwt_secret),
        )
        .nest(
            "/api/v1/billing",
            routers::billing_webhook::routes(webhook_usecase),
        )
        .nest(
            "/api/v1/admin",
            routers::admin::routes(subscriptions_usecase, config.admin.token.clone()),
        )
        .route("/api/v1/health-check", get(default_routers::health_check))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.backend_server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
