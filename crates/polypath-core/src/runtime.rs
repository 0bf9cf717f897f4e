//! Tokio runtime management for blocking operations

use std::future::Future;
use std::sync::{Arc, OnceLock};
use tokio::runtime::{Handle, Runtime};

/// Get or create a shared Tokio runtime for blocking operations
pub(crate) fn get_runtime() -> Arc<Runtime> {
    static RUNTIME: OnceLock<Arc<Runtime>> = OnceLock::new();

    RUNTIME
        .get_or_init(|| {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .thread_name("polypath-worker")
                .build()
                .expect("Failed to create Tokio runtime");

            Arc::new(runtime)
        })
        .clone()
}

/// Drive `future` to completion from synchronous code
///
/// Inside a Tokio context `Runtime::block_on` would panic, so the future is
/// handed to a scoped helper thread that blocks there instead.
pub fn block_on<F>(future: F) -> F::Output
where
    F: Future + Send,
    F::Output: Send,
{
    let runtime = get_runtime();
    if Handle::try_current().is_err() {
        return runtime.block_on(future);
    }

    std::thread::scope(|scope| {
        match scope.spawn(|| runtime.block_on(future)).join() {
            Ok(output) => output,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_on_outside_runtime() {
        assert_eq!(block_on(async { 40 + 2 }), 42);
    }

    #[tokio::test]
    async fn test_block_on_inside_runtime() {
        let value = block_on(async {
            tokio::task::yield_now().await;
            "done"
        });
        assert_eq!(value, "done");
    }
}
