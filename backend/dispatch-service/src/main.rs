use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dispatch_service::{
    config::{Config, DatabaseConfig},
    error::{ConfigError, DispatchError},
    transport::ProviderTransportFactory,
    DispatcherRegistry, LocalTaskQueue, MemoryStore, PgPushStore, PushService, PushStore,
};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

async fn connect_store(database: Option<&DatabaseConfig>) -> anyhow::Result<Arc<dyn PushStore>> {
    let Some(database) = database else {
        warn!("DATABASE_URL not set, using in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(database.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&database.url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    info!("Database pool created and migrated");
    Ok(Arc::new(PgPushStore::new(pool)))
}

/// Resolves once the shutdown flag flips
async fn stopped(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting dispatch worker");

    let config = Config::from_env().context("Invalid configuration")?;
    let store = connect_store(config.database.as_ref()).await?;

    let factory = ProviderTransportFactory::new(
        config.fcm.clone(),
        config.apns.clone(),
        config.dispatch.send_timeout,
    );
    let registry = Arc::new(DispatcherRegistry::new(Arc::new(factory)));
    let queue = LocalTaskQueue::new(config.worker.concurrency);
    let service = Arc::new(PushService::new(
        store,
        registry,
        queue.clone(),
        &config.dispatch,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (worker_tx, worker_rx) = watch::channel(false);

    let worker = tokio::spawn(queue.clone().run(service.clone(), stopped(worker_rx)));

    let sweep = {
        let service = service.clone();
        let every = config.worker.sweep_interval;
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            let done = stopped(shutdown);
            tokio::pin!(done);
            loop {
                tokio::select! {
                    _ = &mut done => break,
                    _ = ticker.tick() => {
                        if let Err(e) = service.lifecycle().check_pending().await {
                            error!(error = %e, "Pending sweep failed");
                        }
                    }
                }
            }
        })
    };

    let retention = {
        let service = service.clone();
        let every = config.worker.retention_interval;
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            let done = stopped(shutdown);
            tokio::pin!(done);
            loop {
                tokio::select! {
                    _ = &mut done => break,
                    _ = ticker.tick() => {
                        match service.lifecycle().clean_sent_notifications().await {
                            Ok(_) => {}
                            Err(DispatchError::Config(ConfigError::MissingMaxAge)) => {
                                error!("Notification max age value is not defined, skipping retention");
                            }
                            Err(e) => error!(error = %e, "Retention sweep failed"),
                        }
                    }
                }
            }
        })
    };

    shutdown_signal().await;
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);
    for handle in [sweep, retention] {
        if let Err(e) = handle.await {
            error!(error = %e, "Periodic job ended abnormally");
        }
    }

    // Drain queued batches before stopping the worker loop
    if tokio::time::timeout(Duration::from_secs(30), queue.wait_idle())
        .await
        .is_err()
    {
        warn!(in_flight = queue.in_flight(), "Tasks still queued at exit");
    }

    let _ = worker_tx.send(true);
    if let Err(e) = worker.await {
        error!(error = %e, "Task queue worker ended abnormally");
    }

    info!("Dispatch worker stopped");
    Ok(())
}
