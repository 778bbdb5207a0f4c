use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use drainer_core::impls::{InMemoryLock, PagedSource};
use drainer_core::ports::DistributedLock;
use drainer_core::{BoundedWorkerPool, DrainCoordinator, DrainSettings, wait_until_finished_every};

const DEMO_ITEMS: u32 = 23;
const DEMO_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Greeting {
    id: u32,
    name: String,
}

/// デモ用 source: JSON の行を page 単位で返し、最初の数件はわざと失敗させる
fn greeting_source(
    count: u32,
    failures: u32,
) -> anyhow::Result<PagedSource<String, impl Fn(&String) -> anyhow::Result<()> + Send + Sync + 'static>>
{
    let rows = (1..=count)
        .map(|id| {
            serde_json::to_string(&Greeting {
                id,
                name: format!("guest-{id:03}"),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let remaining_failures = AtomicU32::new(failures);
    let handler = move |row: &String| -> anyhow::Result<()> {
        let greeting: Greeting = serde_json::from_str(row).context("json decode")?;

        let left = remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            remaining_failures.fetch_sub(1, Ordering::Relaxed);
            anyhow::bail!("intentional failure (left={left})");
        }
        tracing::info!(id = greeting.id, "Hello, {}!", greeting.name);
        Ok(())
    };

    Ok(PagedSource::new("demo.greetings", rows, handler)
        .with_page_size(DEMO_PAGE_SIZE)
        .with_description("demo greetings"))
}

#[cfg(feature = "redis")]
async fn lock_backend(settings: &DrainSettings) -> anyhow::Result<Arc<dyn DistributedLock>> {
    match settings.redis_url.as_deref() {
        Some(url) => Ok(Arc::new(drainer_core::impls::RedisLock::connect(url).await?)),
        None => Ok(Arc::new(InMemoryLock::new())),
    }
}

#[cfg(not(feature = "redis"))]
async fn lock_backend(settings: &DrainSettings) -> anyhow::Result<Arc<dyn DistributedLock>> {
    if settings.redis_url.is_some() {
        tracing::warn!("REDIS_URL is set but the `redis` feature is off; using in-memory lock");
    }
    Ok(Arc::new(InMemoryLock::new()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // (A) env file → 環境変数 → settings
    let env_file = std::env::var("DRAIN_ENV_FILE").unwrap_or_else(|_| ".env".to_string());
    let loaded = dotenvy::from_filename(&env_file).is_ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drainer=info,drainer_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if loaded {
        tracing::info!(file = %env_file, "loaded env file");
    }

    let settings = DrainSettings::from_env().context("invalid drain settings")?;
    let settings_json = serde_json::to_string(&settings)?;
    tracing::info!(settings = %settings_json, "starting drainer");

    // (B) pool と lock を用意（pool は session ごとに 1 つ）
    let pool = Arc::new(BoundedWorkerPool::new(settings.pool_config()?)?);
    let coordinator = DrainCoordinator::from_settings(lock_backend(&settings).await?, &settings);
    let source = Arc::new(greeting_source(DEMO_ITEMS, 2)?);

    // (C) Ctrl-C で fan-out と待機を止める
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; stopping fan-out");
                cancel.cancel();
            }
        }
    });

    // (D) drain を開始して、poll loop の終了と pool の完了を待つ
    let handle = coordinator.drain(&pool, source, &cancel).await?;
    let session = handle.session();
    if let Some(termination) = handle.termination().await {
        let termination = serde_json::to_string(&termination)?;
        tracing::info!(%session, %termination, "poll loop finished");
    }

    let finished = wait_until_finished_every(&pool, settings.finish_poll_interval(), &cancel).await;
    let status = serde_json::to_string(&pool.status())?;
    match finished {
        Ok(()) => tracing::info!(%status, "all work finished"),
        Err(err) => tracing::warn!(error = %err, %status, "stopped waiting; in-flight work abandoned"),
    }
    Ok(())
}
