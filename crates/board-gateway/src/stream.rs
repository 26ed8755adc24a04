use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;

/// Creates a connected publisher / live stream pair.
pub fn channel<T>() -> (Publisher<T>, LiveStream<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Publisher { tx }, LiveStream { rx })
}

/// Receiving end of a live subscription.
///
/// Every item is a complete value (a full snapshot, a count source, a
/// connection state), never a delta. Dropping the stream or calling
/// [`LiveStream::unsubscribe`] ends the subscription; the store prunes it on
/// its next publish.
#[must_use = "a live stream does nothing unless polled"]
#[derive(Debug)]
pub struct LiveStream<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> LiveStream<T> {
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Next already-delivered item, without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Drain everything already delivered and keep only the newest item.
    pub fn latest(&mut self) -> Option<T> {
        let mut last = None;
        while let Ok(item) = self.rx.try_recv() {
            last = Some(item);
        }
        last
    }

    pub fn unsubscribe(mut self) {
        self.rx.close();
    }
}

impl<T> Stream for LiveStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

/// Sending end held by the store.
#[derive(Debug)]
pub struct Publisher<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> Publisher<T> {
    /// Returns false once the subscriber is gone.
    pub fn publish(&self, item: T) -> bool {
        self.tx.send(item).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
