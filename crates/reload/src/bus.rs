use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::errors::{NotificationError, TransportError};
use crate::metrics;
use crate::notification::{Notification, NotificationCommand};
use crate::request::{ReloadCallback, ReloadQueue, ReloadRequest};
use crate::transport::{PubSubTransport, Subscription};

pub const DEFAULT_CHANNEL: &str = "warden.cluster.notifications";

#[derive(Clone, Debug)]
pub struct BusOptions {
    pub channel: String,
    pub verify_signatures: bool,
}

impl Default for BusOptions {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_string(),
            verify_signatures: true,
        }
    }
}

/// Bridges the cluster invalidation channel to local reload requests.
pub struct NotificationBus {
    transport: Arc<dyn PubSubTransport>,
    queue: ReloadQueue,
    options: BusOptions,
}

impl NotificationBus {
    pub fn new(transport: Arc<dyn PubSubTransport>, queue: ReloadQueue, options: BusOptions) -> Self {
        Self {
            transport,
            queue,
            options,
        }
    }

    pub fn channel(&self) -> &str {
        &self.options.channel
    }

    /// Signs and publishes a notification. Best effort: failures are logged
    /// and reported as `false`, never retried.
    pub async fn notify(&self, mut notification: Notification) -> bool {
        notification.sign();
        let encoded = match notification.encode() {
            Ok(encoded) => encoded,
            Err(err) => {
                error!(%err, command = %notification.command, "failed to encode notification");
                metrics::record_published(false);
                return false;
            }
        };

        match self.transport.publish(&self.options.channel, encoded).await {
            Ok(()) => {
                debug!(command = %notification.command, channel = %self.options.channel, "notification published");
                metrics::record_published(true);
                true
            }
            Err(err) => {
                if err.is_unavailable() {
                    warn!(%err, command = %notification.command, "pub/sub store unavailable, notification not sent");
                } else {
                    error!(%err, command = %notification.command, "failed to publish notification");
                }
                metrics::record_published(false);
                false
            }
        }
    }

    /// Decodes one raw message and, for reload commands, queues a reload
    /// request carrying `on_reloaded`. Returns the command that was queued.
    pub async fn handle_message(
        &self,
        raw: &str,
        on_reloaded: Option<ReloadCallback>,
    ) -> Option<NotificationCommand> {
        let notification = match Notification::decode(raw) {
            Ok(notification) => notification,
            Err(err) => {
                error!(%err, "dropping malformed notification");
                metrics::record_dropped("malformed");
                return None;
            }
        };

        if self.options.verify_signatures {
            if let Err(err) = notification.verify() {
                warn!(%err, command = %notification.command, "dropping notification with invalid signature");
                metrics::record_dropped(signature_reason(&err));
                return None;
            }
        }

        if !notification.command.triggers_reload() {
            warn!(command = %notification.command, "ignoring unknown notification command");
            metrics::record_dropped("unknown_command");
            return None;
        }

        metrics::record_received(notification.command.as_str());
        let request = ReloadRequest::from_callback(on_reloaded);
        if let Err(err) = self.queue.submit(request).await {
            debug!(%err, command = %notification.command, "reload queue closed, notification dropped");
            metrics::record_dropped("stopped");
            return None;
        }
        debug!(command = %notification.command, payload = %notification.payload, "reload requested");
        Some(notification.command)
    }

    pub async fn subscribe(&self) -> Result<Subscription, TransportError> {
        self.transport.subscribe(&self.options.channel).await
    }

    /// Feeds a subscription into the reload queue until it fails or `token`
    /// is cancelled. Cancellation returns `Ok`; a finished stream is reported
    /// as `TransportError::Closed`.
    pub async fn consume(
        &self,
        mut subscription: Subscription,
        token: &CancellationToken,
    ) -> Result<(), TransportError> {
        loop {
            let item = tokio::select! {
                _ = token.cancelled() => return Ok(()),
                item = subscription.next() => item,
            };
            match item {
                Some(Ok(raw)) => {
                    self.handle_message(&raw, None).await;
                }
                Some(Err(TransportError::Lagged(skipped))) => {
                    // Missed messages may have been invalidations.
                    warn!(skipped, "notification subscriber lagged, requesting reload");
                    metrics::record_dropped("lagged");
                    if self.queue.request_reload().await.is_err() {
                        return Ok(());
                    }
                }
                Some(Err(TransportError::Protocol(reason))) => {
                    error!(%reason, "dropping undecodable pub/sub message");
                    metrics::record_dropped("malformed");
                }
                Some(Err(err)) => return Err(err),
                None => return Err(TransportError::Closed),
            }
        }
    }
}

fn signature_reason(err: &NotificationError) -> &'static str {
    match err {
        NotificationError::MissingSignature => "missing_signature",
        NotificationError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
        NotificationError::SignatureMismatch => "signature_mismatch",
        NotificationError::Malformed(_) => "malformed",
    }
}
