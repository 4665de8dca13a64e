use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use lookout_core::config::notify::EmailConfig;

use super::NotifyJob;

pub struct EmailChannel {
    config: EmailConfig,
}

impl EmailChannel {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub async fn run(self, mut rx: mpsc::Receiver<NotifyJob>, cancel: CancellationToken) {
        let transport = match self.build_transport() {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(error = %e, "failed to build SMTP transport, email channel disabled");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                job = rx.recv() => {
                    match job {
                        Some(job) => self.deliver(&transport, job).await,
                        None => break,
                    }
                }
            }
        }
    }

    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, String> {
        let builder = if self.config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)
        }
        .map_err(|e| e.to_string())?
        .port(self.config.port);

        let builder = match (&self.config.username, &self.config.password) {
            (Some(user), Some(pass)) => {
                builder.credentials(Credentials::new(user.clone(), pass.clone()))
            }
            _ => builder,
        };

        Ok(builder.build())
    }

    async fn deliver(&self, transport: &AsyncSmtpTransport<Tokio1Executor>, job: NotifyJob) {
        let from: Mailbox = match self.config.from.parse() {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(error = %e, "invalid from address, dropping email notification");
                return;
            }
        };

        for recipient in &self.config.to {
            let to: Mailbox = match recipient.parse() {
                Ok(m) => m,
                Err(e) => {
                    tracing::error!(error = %e, recipient = %recipient, "invalid recipient address, skipping");
                    continue;
                }
            };

            let message = Message::builder()
                .from(from.clone())
                .to(to)
                .subject(job.subject.clone())
                .body(job.body.clone());

            let message = match message {
                Ok(m) => m,
                Err(e) => {
                    tracing::error!(error = %e, "failed to build email message");
                    continue;
                }
            };

            if let Err(e) = transport.send(message).await {
                tracing::warn!(error = %e, recipient = %recipient, "email delivery failed, not retried further");
            }
        }
    }
}
