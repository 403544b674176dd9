//! Scratch directories for a single fetch-and-build
//!
//! Each pipeline gets its own directory under `$TMPDIR` (or `$HOME/tmp`).
//! It is removed when the pipeline finishes, whether it succeeded, failed
//! or panicked.

use command_executor::{shell_escape, RunOptions};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::{debug, warn};

use crate::context::ExecutionContext;
use crate::error::Result;

/// Create a fresh work directory on the target and return its path
pub async fn make_work_dir(ctx: &ExecutionContext) -> Result<String> {
    let router = ctx.router();
    let tmp = router.run_with("echo $TMPDIR", RunOptions::probe()).await?;
    let base = if tmp.succeeded() && !tmp.trimmed().is_empty() {
        tmp.trimmed().to_string()
    } else {
        let home = router.run("echo $HOME").await?;
        format!("{}/tmp", home.trimmed())
    };

    let work_dir = format!(
        "{}/provision-{}",
        base.trim_end_matches('/'),
        uuid::Uuid::new_v4().simple()
    );
    router
        .run(&format!("mkdir -p {}", shell_escape(&work_dir)))
        .await?;
    debug!("Created work directory {}", work_dir);
    Ok(work_dir)
}

/// Remove a work directory, logging instead of failing
pub async fn remove_work_dir(ctx: &ExecutionContext, work_dir: &str) {
    let cleanup = format!("rm -rf {}", shell_escape(work_dir));
    match ctx.router().run_with(&cleanup, RunOptions::warn_only()).await {
        Ok(result) if result.succeeded() => debug!("Removed work directory {}", work_dir),
        Ok(result) => warn!(
            "Could not remove work directory {}: {}",
            work_dir,
            result.stderr.trim()
        ),
        Err(e) => warn!("Could not remove work directory {}: {}", work_dir, e),
    }
}

/// Run `body` with a fresh work directory that is always removed afterwards
///
/// A panic inside `body` is resumed after cleanup.
pub async fn with_work_dir<F, Fut, T>(ctx: &ExecutionContext, body: F) -> Result<T>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let work_dir = make_work_dir(ctx).await?;
    let outcome = AssertUnwindSafe(body(work_dir.clone()))
        .catch_unwind()
        .await;
    remove_work_dir(ctx, &work_dir).await;
    match outcome {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
