//! Running async dispatch sessions from synchronous callers.

use std::future::Future;

use anyhow::{anyhow, bail};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::debug;

/// Drives `future` to completion from synchronous code.
///
/// Inside a multi-threaded Tokio runtime the current worker is handed over with
/// `block_in_place`; outside any runtime a single-threaded one is built for the call.
/// A current-thread runtime cannot be blocked on and is reported as an error.
pub fn block_on_future<F, T>(future: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => match handle.runtime_flavor() {
            RuntimeFlavor::CurrentThread => {
                bail!("cannot block inside a current-thread runtime; await the future instead")
            }
            _ => tokio::task::block_in_place(|| handle.block_on(future)),
        },
        Err(_) => {
            debug!("no ambient runtime; building a current-thread runtime");
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|error| anyhow!("failed to build runtime: {error}"))?
                .block_on(future)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_outside_a_runtime() {
        let value = block_on_future(async {
            tokio::task::yield_now().await;
            Ok(7)
        })
        .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reuses_a_multi_threaded_runtime() {
        let value = block_on_future(async { Ok("inside") }).unwrap();
        assert_eq!(value, "inside");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn refuses_a_current_thread_runtime() {
        let error = block_on_future(async { Ok(()) }).unwrap_err();
        assert!(error.to_string().contains("current-thread"));
    }
}
