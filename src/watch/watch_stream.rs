use std::sync::Arc;

use bytes::Bytes;
use futures::stream;
use futures::Stream;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;

use crate::Error;
use crate::Result;
use crate::TransactionSource;
use crate::WatchSubscription;

struct StreamShared {
    cancel: CancellationToken,
    /// The watch registered by the last step; at most one per stream.
    pending: Mutex<Option<Arc<WatchSubscription>>>,
}

impl StreamShared {
    fn dispose(&self) {
        self.cancel.cancel();
        if let Some(watch) = self.pending.lock().take() {
            watch.cancel();
        }
    }
}

/// Disposes a [`WatchStream`] from another task.
#[derive(Clone)]
pub struct WatchStreamHandle {
    shared: Arc<StreamShared>,
}

impl WatchStreamHandle {
    /// Cancels the pending watch; an in-flight [`WatchStream::next`] returns `None`.
    pub fn dispose(&self) {
        self.shared.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }
}

/// Successive values of one key
///
/// Every step opens a fresh transaction, reads the key, registers a watch on
/// it and commits, all inside that one transaction, then yields the value it
/// read. The next step first waits for that watch, so a change made between
/// the read and the watch registration still fires it.
///
/// An error ends the stream after it is yielded once.
pub struct WatchStream<S: TransactionSource> {
    source: S,
    key: Bytes,
    shared: Arc<StreamShared>,
    terminated: bool,
}

impl<S: TransactionSource> WatchStream<S> {
    pub fn new(
        source: S,
        key: impl Into<Bytes>,
    ) -> Self {
        Self {
            source,
            key: key.into(),
            shared: Arc::new(StreamShared {
                cancel: CancellationToken::new(),
                pending: Mutex::new(None),
            }),
            terminated: false,
        }
    }

    pub fn key(&self) -> &Bytes {
        &self.key
    }

    pub fn handle(&self) -> WatchStreamHandle {
        WatchStreamHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn dispose(&self) {
        self.shared.dispose();
    }

    /// Next value of the key (`None` inside means absent), or `None` once the
    /// stream is disposed or has yielded an error.
    pub async fn next(&mut self) -> Option<Result<Option<Bytes>>> {
        if self.terminated || self.shared.cancel.is_cancelled() {
            return None;
        }
        let cancel = self.shared.cancel.clone();

        let previous = self.shared.pending.lock().clone();
        if let Some(watch) = previous {
            let changed = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Error::Cancelled),
                r = watch.changed() => r,
            };
            self.release(&watch);
            match changed {
                Ok(()) => trace!(key = ?self.key, "watch fired"),
                Err(Error::Cancelled) => {
                    self.terminated = true;
                    return None;
                }
                Err(e) => {
                    self.terminated = true;
                    return Some(Err(e));
                }
            }
        }

        let stepped = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            r = self.step() => Some(r),
        };
        match stepped {
            None => {
                self.terminated = true;
                None
            }
            Some(Ok(value)) => Some(Ok(value)),
            Some(Err(e)) => {
                debug!(key = ?self.key, "watch stream failed: {:?}", e);
                self.terminated = true;
                Some(Err(e))
            }
        }
    }

    /// Adapts the stream to [`futures::Stream`].
    pub fn into_stream(self) -> impl Stream<Item = Result<Option<Bytes>>> {
        stream::unfold(self, |mut watch| async move { watch.next().await.map(|item| (item, watch)) })
    }

    /// Read, watch and commit in one transaction.
    async fn step(&self) -> Result<Option<Bytes>> {
        let tr = self.source.create_transaction()?;
        let value = tr.get(&self.key, false).await?;
        let watch = tr.watch(&self.key)?;
        tr.commit().await?;

        let watch = Arc::new(watch);
        let mut pending = self.shared.pending.lock();
        if self.shared.cancel.is_cancelled() {
            watch.cancel();
        } else {
            *pending = Some(watch);
        }
        Ok(value)
    }

    fn release(
        &self,
        watch: &Arc<WatchSubscription>,
    ) {
        let mut pending = self.shared.pending.lock();
        if pending.as_ref().is_some_and(|p| Arc::ptr_eq(p, watch)) {
            pending.take();
        }
    }
}

impl<S: TransactionSource> Drop for WatchStream<S> {
    fn drop(&mut self) {
        self.shared.dispose();
    }
}
