//! Unbounded stage queue drained by a pool of workers.
//!
//! tokio's mpsc receiver has a single consumer, so the pool shares it behind
//! an async mutex: whichever idle worker holds the lock takes the next item.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

pub(crate) struct StageQueue<T> {
    name: &'static str,
    tx: mpsc::UnboundedSender<T>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<T>>>,
}

impl<T> Clone for StageQueue<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
            rx: Arc::clone(&self.rx),
        }
    }
}

impl<T: Send + 'static> StageQueue<T> {
    pub(crate) fn new(name: &'static str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            name,
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Append an item at the back of the queue.
    pub(crate) fn push(&self, item: T) {
        // The receiver is owned by the queue itself, so the channel cannot be closed.
        if self.tx.send(item).is_err() {
            tracing::error!(queue = self.name, "stage queue closed, item dropped");
        }
    }

    /// Append an item once `delay` has elapsed. Zero delay pushes immediately.
    pub(crate) fn push_after(&self, item: T, delay: Duration) {
        if delay.is_zero() {
            self.push(item);
            return;
        }
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.push(item);
        });
    }

    /// Wait for the next item.
    pub(crate) async fn pop(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }

    /// Take everything queued right now without waiting for more.
    pub(crate) async fn drain(&self) -> Vec<T> {
        let mut rx = self.rx.lock().await;
        let mut out = Vec::new();
        while let Ok(item) = rx.try_recv() {
            out.push(item);
        }
        out
    }
}
