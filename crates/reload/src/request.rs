use std::fmt;

use tokio::sync::{mpsc, oneshot};

use crate::errors::ReloadError;

/// Invoked once after the reload that satisfied the request has run.
pub type ReloadCallback = Box<dyn FnOnce() + Send + 'static>;

/// One pending demand for a cache refresh.
#[derive(Default)]
pub struct ReloadRequest {
    on_reloaded: Option<ReloadCallback>,
}

impl ReloadRequest {
    pub fn new() -> Self {
        Self { on_reloaded: None }
    }

    pub fn with_callback<F>(callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            on_reloaded: Some(Box::new(callback)),
        }
    }

    pub fn from_callback(callback: Option<ReloadCallback>) -> Self {
        Self {
            on_reloaded: callback,
        }
    }

    pub fn has_callback(&self) -> bool {
        self.on_reloaded.is_some()
    }

    pub(crate) fn complete(self) {
        if let Some(callback) = self.on_reloaded {
            callback();
        }
    }
}

impl fmt::Debug for ReloadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReloadRequest")
            .field("has_callback", &self.has_callback())
            .finish()
    }
}

/// Producer handle onto the coordinator's intake loop. The channel holds a
/// single slot, so producers wait for the intake loop to pick requests up.
#[derive(Clone, Debug)]
pub struct ReloadQueue {
    tx: mpsc::Sender<ReloadRequest>,
}

impl ReloadQueue {
    pub(crate) fn channel() -> (Self, mpsc::Receiver<ReloadRequest>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }

    pub async fn submit(&self, request: ReloadRequest) -> Result<(), ReloadError> {
        self.tx
            .send(request)
            .await
            .map_err(|_| ReloadError::Stopped)
    }

    pub async fn request_reload(&self) -> Result<(), ReloadError> {
        self.submit(ReloadRequest::new()).await
    }

    /// Queues a request and waits until the reload covering it has run.
    pub async fn reload_and_wait(&self) -> Result<(), ReloadError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.submit(ReloadRequest::with_callback(move || {
            let _ = done_tx.send(());
        }))
        .await?;
        done_rx.await.map_err(|_| ReloadError::Stopped)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
