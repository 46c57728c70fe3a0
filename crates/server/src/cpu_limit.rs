//! Limiting the number of concurrent CPU-bound external processes.
//!
//! Ported from the client's equivalent semaphore: the bounded producer/
//! consumer queue in [`crate::pipeline`] already bounds how many pages are
//! "in flight," but each in-flight page spawns its own `pdftocairo`/
//! `identify`/`convert` subprocess, each of which happily burns a full CPU
//! core. Without this semaphore a 10000-page document with a large queue
//! depth could fork far more CPU-bound children than the box has cores for.

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
