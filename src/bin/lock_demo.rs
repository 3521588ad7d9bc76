/// Hammers one lock key from several tasks and reports how many sections
/// overlapped. Sections are short enough that the retry usually wins;
/// tasks that lose both attempts run degraded and may overlap. With Redis
/// down every task degrades.
///
/// $ cargo run --bin lock_demo -- --settings=settings/release.toml
use futures_util::future::join_all;
use sessionkeep::application_impl::*;
use sessionkeep::application_port::*;
use sessionkeep::domain_model::LockKey;
use sessionkeep::domain_port::KeyValueStore;
use sessionkeep::infra_memory::MemoryKeyValueStore;
use sessionkeep::infra_redis::RedisKeyValueStore;
use sessionkeep::logger::*;
use sessionkeep::settings::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const TASKS: usize = 8;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _logger = Logger::new_bootstrap();
    let project_settings = parse_settings(cli.settings.as_deref())?;

    let store: Arc<dyn KeyValueStore> = match &project_settings.storage.redis {
        Some(redis) => Arc::new(RedisKeyValueStore::connect(&redis.dsn, redis.prefix.clone()).await?),
        None => Arc::new(MemoryKeyValueStore::new()),
    };
    let lock: Arc<dyn LockService> = Arc::new(DistributedLockService::new(
        store,
        LockConfig {
            retry_backoff: Duration::from_millis(project_settings.lock.retry_backoff_ms),
            retries: project_settings.lock.retries,
            ..LockConfig::default()
        },
    ));

    let key = LockKey::from(format!("demo-{}", nanoid::nanoid!(6)).as_str());
    let inside = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));

    let tasks = (0..TASKS).map(|i| {
        let lock = lock.clone();
        let key = key.clone();
        let inside = inside.clone();
        let overlaps = overlaps.clone();
        tokio::spawn(async move {
            lock.with_lock(&key, || async move {
                if inside.fetch_add(1, Ordering::SeqCst) > 0 {
                    overlaps.fetch_add(1, Ordering::SeqCst);
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
                debug!(task = i, "section done");
            })
            .await
        })
    });
    for result in join_all(tasks).await {
        result?;
    }

    println!(
        "key={} tasks={} overlaps={}",
        key,
        TASKS,
        overlaps.load(Ordering::SeqCst)
    );
    Ok(())
}
