use std::future::Future;
use std::time::Duration;

/// Runs a non-Send future on the current event loop; used for the delayed
/// error-clear tasks.
pub(crate) fn spawn_local(fut: impl Future<Output = ()> + 'static) {
    #[cfg(target_arch = "wasm32")]
    wasm_bindgen_futures::spawn_local(fut);
    #[cfg(not(target_arch = "wasm32"))]
    {
        tokio::task::spawn_local(fut);
    }
}

pub(crate) async fn sleep(duration: Duration) {
    #[cfg(target_arch = "wasm32")]
    {
        let _ = wasm_timer::Delay::new(duration).await;
    }
    #[cfg(not(target_arch = "wasm32"))]
    tokio::time::sleep(duration).await;
}
