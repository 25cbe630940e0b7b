//! Best-effort notification delivery.
//!
//! Callers submit to a bounded queue and never wait on delivery. A single
//! worker task drains the queue into a [`NotificationGateway`]. On shutdown
//! the worker stops accepting new items and drains what is already queued,
//! bounding each send by a timeout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("notification endpoint returned status {0}")]
    Status(u16),
    #[error("notification queue is full")]
    QueueFull,
    #[error("notification queue is closed")]
    QueueClosed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub target_id: String,
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn new(
        target_id: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            target_id: target_id.into(),
            title: title.into(),
            body: body.into(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(&self, target_id: &str, title: &str, body: &str)
        -> Result<(), NotificationError>;
}

/// Writes notifications to the tracing output only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationGateway;

#[async_trait]
impl NotificationGateway for LogNotificationGateway {
    async fn send(
        &self,
        target_id: &str,
        title: &str,
        body: &str,
    ) -> Result<(), NotificationError> {
        tracing::info!(target_id, title, body, "Notification");
        Ok(())
    }
}

/// Posts each notification as JSON to a configured endpoint.
#[derive(Debug, Clone)]
pub struct WebhookNotificationGateway {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotificationGateway {
    pub fn new(url: impl Into<String>) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_SEND_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationGateway for WebhookNotificationGateway {
    async fn send(
        &self,
        target_id: &str,
        title: &str,
        body: &str,
    ) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({
                "target_id": target_id,
                "title": title,
                "body": body,
            }))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotificationError::Status(status.as_u16()))
        }
    }
}

/// Webhook delivery when an endpoint is configured, log-only otherwise.
pub fn gateway_for(webhook_url: Option<&str>) -> Result<Arc<dyn NotificationGateway>, NotificationError> {
    match webhook_url {
        Some(url) => Ok(Arc::new(WebhookNotificationGateway::new(url)?)),
        None => Ok(Arc::new(LogNotificationGateway)),
    }
}

/// Producer handle of the notification queue.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    sender: mpsc::Sender<Notification>,
}

impl NotificationQueue {
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    pub fn try_enqueue(&self, notification: Notification) -> Result<(), NotificationError> {
        self.sender.try_send(notification).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => NotificationError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => NotificationError::QueueClosed,
        })
    }

    /// Waits up to `wait` for queue capacity. For background producers that
    /// may outrun the worker; request paths use [`Self::submit`].
    pub async fn enqueue(
        &self,
        notification: Notification,
        wait: Duration,
    ) -> Result<(), NotificationError> {
        match tokio::time::timeout(wait, self.sender.send(notification)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(NotificationError::QueueClosed),
            Err(_) => Err(NotificationError::QueueFull),
        }
    }

    /// Enqueues without waiting; a full or closed queue drops the item.
    pub fn submit(&self, notification: Notification) {
        let target_id = notification.target_id.clone();
        if let Err(err) = self.try_enqueue(notification) {
            tracing::warn!(target_id = %target_id, error = %err, "Dropped notification");
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryStats {
    pub delivered: u64,
    pub failed: u64,
}

pub struct NotificationWorker {
    receiver: mpsc::Receiver<Notification>,
    gateway: Arc<dyn NotificationGateway>,
    send_timeout: Duration,
    stats: DeliveryStats,
}

impl NotificationWorker {
    pub fn new(
        receiver: mpsc::Receiver<Notification>,
        gateway: Arc<dyn NotificationGateway>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            receiver,
            gateway,
            send_timeout,
            stats: DeliveryStats::default(),
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) -> DeliveryStats {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                next = self.receiver.recv() => match next {
                    Some(notification) => self.deliver(notification).await,
                    None => return self.stats,
                },
            }
        }

        self.receiver.close();
        let mut drained = 0usize;
        while let Some(notification) = self.receiver.recv().await {
            self.deliver(notification).await;
            drained += 1;
        }
        tracing::info!(drained, "Notification worker drained queue on shutdown");
        self.stats
    }

    async fn deliver(&mut self, notification: Notification) {
        let send = self.gateway.send(
            &notification.target_id,
            &notification.title,
            &notification.body,
        );
        match tokio::time::timeout(self.send_timeout, send).await {
            Ok(Ok(())) => self.stats.delivered += 1,
            Ok(Err(err)) => {
                self.stats.failed += 1;
                tracing::warn!(
                    target_id = %notification.target_id,
                    error = %err,
                    "Notification delivery failed"
                );
            }
            Err(_) => {
                self.stats.failed += 1;
                tracing::warn!(
                    target_id = %notification.target_id,
                    timeout_ms = self.send_timeout.as_millis() as u64,
                    "Notification delivery timed out"
                );
            }
        }
    }
}

/// Starts the worker and returns the producer handle.
pub fn spawn_notification_worker(
    gateway: Arc<dyn NotificationGateway>,
    capacity: usize,
    shutdown: CancellationToken,
) -> (NotificationQueue, JoinHandle<DeliveryStats>) {
    let (queue, receiver) = NotificationQueue::bounded(capacity);
    let worker = NotificationWorker::new(receiver, gateway, DEFAULT_SEND_TIMEOUT);
    let handle = tokio::spawn(worker.run(shutdown));
    (queue, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingGateway {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationGateway for RecordingGateway {
        async fn send(
            &self,
            target_id: &str,
            _title: &str,
            _body: &str,
        ) -> Result<(), NotificationError> {
            self.sent.lock().unwrap().push(target_id.to_string());
            Ok(())
        }
    }

    #[test]
    fn full_queue_rejects_without_blocking() {
        let (queue, _receiver) = NotificationQueue::bounded(1);
        queue
            .try_enqueue(Notification::new("a", "t", "b"))
            .unwrap();
        let err = queue
            .try_enqueue(Notification::new("b", "t", "b"))
            .unwrap_err();
        assert!(matches!(err, NotificationError::QueueFull));
    }

    #[tokio::test]
    async fn enqueue_waits_for_the_worker_to_make_room() {
        let (queue, mut receiver) = NotificationQueue::bounded(1);
        queue.submit(Notification::new("first", "t", "b"));

        let consumer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(notification) = receiver.recv().await {
                seen.push(notification.target_id);
            }
            seen
        });
        queue
            .enqueue(Notification::new("second", "t", "b"), Duration::from_secs(5))
            .await
            .unwrap();
        drop(queue);

        assert_eq!(consumer.await.unwrap(), vec!["first", "second"]);
    }

    #[tokio::test(start_paused = true)]
    async fn enqueue_gives_up_when_nobody_drains() {
        let (queue, _receiver) = NotificationQueue::bounded(1);
        queue.submit(Notification::new("first", "t", "b"));
        let err = queue
            .enqueue(Notification::new("second", "t", "b"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::QueueFull));
    }

    #[test]
    fn closed_queue_reports_closed() {
        let (queue, receiver) = NotificationQueue::bounded(4);
        drop(receiver);
        let err = queue
            .try_enqueue(Notification::new("a", "t", "b"))
            .unwrap_err();
        assert!(matches!(err, NotificationError::QueueClosed));
    }

    #[tokio::test]
    async fn worker_drains_queued_items_on_shutdown() {
        let gateway = Arc::new(RecordingGateway::default());
        let (queue, receiver) = NotificationQueue::bounded(8);
        for target in ["s1", "s2", "s3"] {
            queue.submit(Notification::new(target, "Session open", "Period 2"));
        }

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let worker = NotificationWorker::new(receiver, gateway.clone(), DEFAULT_SEND_TIMEOUT);
        let stats = worker.run(shutdown).await;

        assert_eq!(stats.delivered, 3);
        assert_eq!(*gateway.sent.lock().unwrap(), vec!["s1", "s2", "s3"]);
    }

    #[tokio::test]
    async fn failed_send_does_not_stop_worker() {
        let mut gateway = MockNotificationGateway::new();
        gateway
            .expect_send()
            .withf(|target, _, _| target == "bad")
            .returning(|_, _, _| Err(NotificationError::Status(502)));
        gateway
            .expect_send()
            .withf(|target, _, _| target == "good")
            .returning(|_, _, _| Ok(()));

        let (queue, receiver) = NotificationQueue::bounded(8);
        queue.submit(Notification::new("bad", "t", "b"));
        queue.submit(Notification::new("good", "t", "b"));
        drop(queue);

        let worker = NotificationWorker::new(receiver, Arc::new(gateway), DEFAULT_SEND_TIMEOUT);
        let stats = worker.run(CancellationToken::new()).await;
        assert_eq!(
            stats,
            DeliveryStats {
                delivered: 1,
                failed: 1
            }
        );
    }
}
