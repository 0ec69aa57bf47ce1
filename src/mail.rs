//! Outbound mail. Handlers enqueue [`MailData`] without waiting; a single
//! background worker renders and delivers each message over SMTP.

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use lettre::{message::header::ContentType, Message, SmtpTransport, Transport};
use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::config::MailConfig;
use crate::error::{AppError, AppResult};

const SMTP_TIMEOUT: Duration = Duration::from_secs(10);
const BODY_PLACEHOLDER: &str = "[%body%]";

#[derive(Debug, Clone, PartialEq)]
pub struct MailData {
    pub to: String,
    pub from: String,
    pub subject: String,
    /// HTML content
    pub content: String,
    /// File under the mail template directory that wraps `content`
    pub template: Option<String>,
}

/// Delivers one rendered message.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, msg: &MailData, html_body: String) -> AppResult<()>;
}

pub struct SmtpMailTransport {
    transport: SmtpTransport,
}

impl SmtpMailTransport {
    /// Plain SMTP without TLS or authentication, as offered by a local relay.
    pub fn new(host: &str, port: u16) -> Self {
        let transport = SmtpTransport::builder_dangerous(host)
            .port(port)
            .timeout(Some(SMTP_TIMEOUT))
            .build();
        Self { transport }
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, msg: &MailData, html_body: String) -> AppResult<()> {
        let email = Message::builder()
            .from(
                msg.from
                    .parse()
                    .map_err(|e| AppError::Mail(format!("invalid from address: {e}")))?,
            )
            .to(msg
                .to
                .parse()
                .map_err(|e| AppError::Mail(format!("invalid to address: {e}")))?)
            .subject(msg.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(html_body)
            .map_err(|e| AppError::Mail(format!("failed to build email: {e}")))?;

        let mailer = self.transport.clone();
        tokio::task::spawn_blocking(move || {
            mailer
                .send(&email)
                .map_err(|e| AppError::Mail(format!("failed to send email: {e}")))
        })
        .await
        .map_err(|e| AppError::Mail(format!("email task failed: {e}")))?
        .map(|_| ())
    }
}

/// Delivery outcome counters.
#[derive(Debug, Default)]
pub struct MailStats {
    sent: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailStatsSnapshot {
    pub sent: u64,
    pub failed: u64,
    pub dropped: u64,
}

impl MailStats {
    pub fn snapshot(&self) -> MailStatsSnapshot {
        MailStatsSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Producer side of the mail queue. Cheap to clone.
#[derive(Clone)]
pub struct Mailer {
    tx: mpsc::Sender<MailData>,
    stats: Arc<MailStats>,
}

impl Mailer {
    fn channel(capacity: usize) -> (Self, mpsc::Receiver<MailData>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let mailer = Self {
            tx,
            stats: Arc::new(MailStats::default()),
        };
        (mailer, rx)
    }

    /// Creates the queue and spawns its worker. The worker exits once every
    /// `Mailer` clone has been dropped and the queue is drained.
    pub fn start(transport: Arc<dyn MailTransport>, config: &MailConfig) -> (Self, JoinHandle<()>) {
        let (mailer, rx) = Self::channel(config.queue_capacity);
        let worker = tokio::spawn(run_worker(
            rx,
            transport,
            config.template_dir.clone(),
            mailer.stats.clone(),
        ));
        tracing::info!(capacity = config.queue_capacity, "mail worker started");
        (mailer, worker)
    }

    /// Queues `msg` without waiting. Returns false when it had to be dropped.
    pub fn enqueue(&self, msg: MailData) -> bool {
        match self.tx.try_send(msg) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(msg)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(to = %msg.to, subject = %msg.subject, "mail queue full, message dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(msg)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(to = %msg.to, subject = %msg.subject, "mail worker stopped, message dropped");
                false
            }
        }
    }

    pub fn stats(&self) -> MailStatsSnapshot {
        self.stats.snapshot()
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<MailData>,
    transport: Arc<dyn MailTransport>,
    template_dir: PathBuf,
    stats: Arc<MailStats>,
) {
    while let Some(msg) = rx.recv().await {
        let result = match compose_body(&template_dir, &msg).await {
            Ok(body) => transport.send(&msg, body).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                stats.sent.fetch_add(1, Ordering::Relaxed);
                tracing::info!(to = %msg.to, subject = %msg.subject, "email sent");
            }
            Err(e) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(to = %msg.to, subject = %msg.subject, error = %e, "email delivery failed");
            }
        }
    }
    tracing::info!("mail worker stopped");
}

/// Content, wrapped into the message's template when it names one.
async fn compose_body(template_dir: &Path, msg: &MailData) -> AppResult<String> {
    let Some(template) = &msg.template else {
        return Ok(msg.content.clone());
    };

    let path = template_dir.join(template);
    let wrapper = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| AppError::Mail(format!("cannot read mail template {}: {e}", path.display())))?;

    Ok(wrapper.replacen(BODY_PLACEHOLDER, &msg.content, 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingTransport;

    fn config(template_dir: PathBuf) -> MailConfig {
        MailConfig {
            host: "localhost".into(),
            port: 1025,
            from: "me@here.com".into(),
            owner: "me@here.com".into(),
            template_dir,
            queue_capacity: 8,
        }
    }

    fn message(template: Option<&str>) -> MailData {
        MailData {
            to: "john@smith.com".into(),
            from: "me@here.com".into(),
            subject: "Reservation Confirmation".into(),
            content: "<strong>Hello</strong>".into(),
            template: template.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_worker_wraps_content_in_template_and_counts_sent() {
        let dir = std::env::temp_dir().join(format!("hotel-mail-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("basic.html"), "<html>[%body%]</html>")
            .await
            .unwrap();

        let transport = Arc::new(RecordingTransport::default());
        let (mailer, worker) = Mailer::start(transport.clone(), &config(dir));
        assert!(mailer.enqueue(message(Some("basic.html"))));
        assert!(mailer.enqueue(message(None)));

        let stats = mailer.stats.clone();
        drop(mailer);
        worker.await.unwrap();

        let sent = transport.sent().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].1, "<html><strong>Hello</strong></html>");
        assert_eq!(sent[1].1, "<strong>Hello</strong>");
        assert_eq!(stats.snapshot().sent, 2);
    }

    #[tokio::test]
    async fn test_failures_are_counted_not_propagated() {
        let transport = Arc::new(RecordingTransport::failing());
        let (mailer, worker) = Mailer::start(transport, &config(PathBuf::from("/nonexistent")));
        assert!(mailer.enqueue(message(None)));
        // missing template file
        assert!(mailer.enqueue(message(Some("basic.html"))));

        let stats = mailer.stats.clone();
        drop(mailer);
        worker.await.unwrap();

        assert_eq!(
            stats.snapshot(),
            MailStatsSnapshot {
                sent: 0,
                failed: 2,
                dropped: 0
            }
        );
    }

    #[tokio::test]
    async fn test_full_queue_drops_instead_of_blocking() {
        let (mailer, _rx) = Mailer::channel(1);
        assert!(mailer.enqueue(message(None)));
        assert!(!mailer.enqueue(message(None)));
        assert_eq!(mailer.stats().dropped, 1);
    }
}
