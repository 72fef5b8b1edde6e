//! Lazily consumed sequence of listing items.

use std::sync::{Arc, OnceLock};

use futures::stream::{self, BoxStream, StreamExt};

use crate::api::client::FetchClient;
use crate::error::{Error, Result};
use crate::model::Record;
use crate::pipeline::preload::{PreloadEngine, PreloadOptions};
use crate::pipeline::{item_error, materialize, Paginator};
use crate::session::SessionHandle;

type Filter<R> = Box<dyn Fn(&R) -> bool + Send + Sync>;

enum Source<R: Record> {
    Unstarted(Paginator<R>),
    Inline(Paginator<R>),
    Preload(PreloadEngine<R>),
    Exhausted,
}

/// Single-pass sequence of full items.
///
/// Configure with the builder methods, then consume with [`next`] or
/// [`into_stream`]. Configuration fails with [`Error::Usage`] once the
/// first item was requested.
///
/// Without preloading the filter sees summaries and only matching items
/// are fetched in full. With preloading every item is fetched and the
/// filter sees full items.
///
/// [`next`]: ItemSequence::next
/// [`into_stream`]: ItemSequence::into_stream
pub struct ItemSequence<R: Record> {
    client: Arc<FetchClient>,
    handle: SessionHandle,
    source: Source<R>,
    limit: Option<usize>,
    filter: Option<Filter<R>>,
    preload: bool,
    options: PreloadOptions,
    yielded: usize,
    total: Arc<OnceLock<u64>>,
}

impl<R: Record> ItemSequence<R> {
    pub fn new(client: Arc<FetchClient>, handle: SessionHandle, paginator: Paginator<R>) -> Self {
        Self {
            total: paginator.total_cell(),
            client,
            handle,
            source: Source::Unstarted(paginator),
            limit: None,
            filter: None,
            preload: false,
            options: PreloadOptions::default(),
            yielded: 0,
        }
    }

    fn ensure_unstarted(&self) -> Result<()> {
        match self.source {
            Source::Unstarted(_) => Ok(()),
            _ => Err(Error::Usage(
                "cannot configure a sequence after consumption started".into(),
            )),
        }
    }

    /// Yield at most `limit` elements, errors included.
    pub fn limit(&mut self, limit: Option<usize>) -> Result<&mut Self> {
        self.ensure_unstarted()?;
        self.limit = limit;
        Ok(self)
    }

    pub fn filter<F>(&mut self, predicate: F) -> Result<&mut Self>
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
    {
        self.ensure_unstarted()?;
        self.filter = Some(Box::new(predicate));
        Ok(self)
    }

    pub fn preload(&mut self, enabled: bool) -> Result<&mut Self> {
        self.ensure_unstarted()?;
        self.preload = enabled;
        Ok(self)
    }

    pub fn workers(&mut self, workers: usize) -> Result<&mut Self> {
        self.ensure_unstarted()?;
        if workers == 0 {
            return Err(Error::Usage("at least one worker is required".into()));
        }
        self.options.workers = workers;
        Ok(self)
    }

    pub fn options(&mut self, options: PreloadOptions) -> Result<&mut Self> {
        self.workers(options.workers)?;
        self.options.queue_multiplier = options.queue_multiplier.max(1);
        Ok(self)
    }

    /// Advertised size of the listing, once its first page was fetched.
    pub fn total(&self) -> Option<u64> {
        self.total.get().copied()
    }

    pub fn yielded(&self) -> usize {
        self.yielded
    }

    fn start(&mut self) {
        let Source::Unstarted(mut paginator) = std::mem::replace(&mut self.source, Source::Exhausted)
        else {
            return;
        };

        // a filter discards items, so the paginator cannot know how many to fetch
        if self.filter.is_none() {
            paginator.set_limit(self.limit);
        }

        self.source = if self.preload {
            Source::Preload(PreloadEngine::spawn(
                paginator,
                Arc::clone(&self.client),
                self.handle.clone(),
                self.options,
            ))
        } else {
            Source::Inline(paginator)
        };
    }

    fn finish(&mut self) {
        self.source = Source::Exhausted;
    }

    fn accepts(&self, item: &R) -> bool {
        self.filter.as_ref().map_or(true, |f| f(item))
    }

    /// Next element. `None` means exhausted; an `Err` element is either a
    /// contained per-item failure ([`Error::Item`]) or a fatal error, after
    /// which the sequence ends.
    pub async fn next(&mut self) -> Option<Result<R>> {
        if matches!(self.source, Source::Unstarted(_)) {
            self.start();
        }
        if self.limit.is_some_and(|limit| self.yielded >= limit) {
            self.finish();
            return None;
        }

        loop {
            let (pulled, inline) = match &mut self.source {
                Source::Inline(paginator) => (paginator.next().await, true),
                Source::Preload(engine) => (engine.next().await, false),
                Source::Unstarted(_) | Source::Exhausted => (None, false),
            };

            let result = match pulled {
                None => {
                    self.finish();
                    return None;
                }
                Some(Err(e)) => Err(e),
                Some(Ok(item)) => {
                    if !self.accepts(&item) {
                        continue;
                    }
                    if inline {
                        let position = item.position().unwrap_or(self.yielded);
                        let summary = item.clone();
                        materialize(&self.client, &self.handle, item)
                            .await
                            .map_err(|e| item_error(&summary, position, e))
                    } else {
                        Ok(item)
                    }
                }
            };

            self.yielded += 1;
            if let Err(e) = &result {
                if e.is_item_error() {
                    tracing::warn!("{}", e);
                } else {
                    self.finish();
                }
            }
            return Some(result);
        }
    }

    /// Consume the sequence as a stream.
    pub fn into_stream(self) -> BoxStream<'static, Result<R>> {
        stream::unfold(self, |mut sequence| async move {
            sequence.next().await.map(|item| (item, sequence))
        })
        .boxed()
    }
}
