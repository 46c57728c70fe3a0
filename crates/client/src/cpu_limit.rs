//! Limiting the number of concurrent CPU-bound conversions on the client
//! side (re-encoding raw RGB back to PNG, decoding PNGs for assembly).
//!
//! The bounded queues between pipeline stages already cap how many pages are
//! in flight, but each in-flight re-encode spawns an external `convert`
//! process that wants a full CPU core.

use std::sync::LazyLock;

use tokio::sync::Semaphore;

static CPU_SEMAPHORE: LazyLock<Semaphore> = LazyLock::new(|| Semaphore::new(num_cpus::get()));

/// Run `f` while holding a permit from the process-wide CPU semaphore.
pub async fn with_cpu_semaphore<Func, Fut, R>(f: Func) -> R
where
    Func: FnOnce() -> Fut,
    Fut: std::future::Future<Output = R>,
{
    let _permit = CPU_SEMAPHORE
        .acquire()
        .await
        .expect("CPU semaphore is never closed");
    f().await
}
