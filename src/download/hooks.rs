//! User callbacks around each post.
//!
//! Hooks run on the blocking pool under a timeout. A hook that fails,
//! panics or times out is logged and otherwise ignored.

use std::sync::Arc;
use std::time::Duration;

use crate::download::state::{ItemFailure, PostReport};
use crate::model::Post;

pub type StartHook = Arc<dyn Fn(&Post) -> anyhow::Result<()> + Send + Sync>;
pub type FinishHook = Arc<dyn Fn(&Post, &PostReport) -> anyhow::Result<()> + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(&ItemFailure) -> anyhow::Result<()> + Send + Sync>;

#[derive(Clone, Default)]
pub struct Hooks {
    on_start: Option<StartHook>,
    on_finish: Option<FinishHook>,
    on_error: Option<ErrorHook>,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("on_start", &self.on_start.is_some())
            .field("on_finish", &self.on_finish.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_start<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Post) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_start = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_finish<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Post, &PostReport) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_finish = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ItemFailure) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    pub(crate) async fn started(&self, post: &Post, timeout: Duration) {
        if let Some(hook) = self.on_start.clone() {
            let post = post.clone();
            run("on_start", timeout, move || hook(&post)).await;
        }
    }

    pub(crate) async fn finished(&self, post: &Post, report: &PostReport, timeout: Duration) {
        if let Some(hook) = self.on_finish.clone() {
            let post = post.clone();
            let report = report.clone();
            run("on_finish", timeout, move || hook(&post, &report)).await;
        }
    }

    pub(crate) async fn failed(&self, failure: &ItemFailure, timeout: Duration) {
        if let Some(hook) = self.on_error.clone() {
            let failure = failure.clone();
            run("on_error", timeout, move || hook(&failure)).await;
        }
    }
}

async fn run<F>(name: &'static str, timeout: Duration, hook: F)
where
    F: FnOnce() -> anyhow::Result<()> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(hook);
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => tracing::warn!("{} hook failed: {:#}", name, e),
        Ok(Err(e)) if e.is_panic() => tracing::warn!("{} hook panicked", name),
        Ok(Err(e)) => tracing::warn!("{} hook did not complete: {}", name, e),
        Err(_) => tracing::warn!("{} hook timed out after {:?}", name, timeout),
    }
}
