pub mod ensure_mount;
pub mod info;
pub mod publish;
pub mod render;
pub mod stats;
pub mod unpublish;

use tokio_util::sync::CancellationToken;

/// Token that fires on Ctrl-C.
///
/// A filesystem client that was already started keeps running.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            child.cancel();
        }
    });
    token
}
