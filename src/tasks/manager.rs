//! Lifecycle helpers for long-running background tasks.

use std::future::Future;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{error, info};

/// Spawn a long-running task on `tracker` that stops with the application.
///
/// The builder receives the application token. If the task fails, the
/// whole application is cancelled so the process shuts down instead of
/// running without one of its loops.
pub fn spawn_cancellable_task<F, Fut>(
    tracker: &TaskTracker,
    app_token: CancellationToken,
    task_name: &'static str,
    task_builder: F,
) where
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    info!(task = task_name, "Starting background task");

    let task_token = app_token.clone();

    tracker.spawn(async move {
        tokio::select! {
            result = task_builder(app_token) => {
                match result {
                    Ok(()) => {
                        info!(task = task_name, "Background task completed successfully");
                    }
                    Err(e) => {
                        error!(task = task_name, error = ?e, "Background task failed unexpectedly");
                        task_token.cancel();
                    }
                }
            }
            () = task_token.cancelled() => {
                info!(task = task_name, "Background task shutting down gracefully");
            }
        }
    });
}
