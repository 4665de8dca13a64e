mod email;
mod webhook;

pub use email::EmailChannel;
pub use webhook::WebhookChannel;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use lookout_core::config::NotifyConfig;
use lookout_core::rule::Severity;
use lookout_core::AlertEventStatus;

/// Per-channel send queue capacity. Overflow drops the notification (logged), per the
/// best-effort delivery contract — there is no at-least-once guarantee here.
const CHANNEL_QUEUE_CAPACITY: usize = 64;

/// One notification to deliver to every enabled channel.
#[derive(Debug, Clone)]
pub struct NotifyJob {
    pub subject: String,
    pub body: String,
    pub severity: Severity,
    pub status: AlertEventStatus,
}

struct Channel {
    name: String,
    tx: mpsc::Sender<NotifyJob>,
}

/// Fans a `NotifyJob` out to every configured channel. `send` never blocks and never awaits —
/// it is a plain, synchronous enqueue so the Alerter can call it immediately after releasing
/// its lock without reintroducing backpressure into the evaluator.
pub struct Notifier {
    channels: Vec<Channel>,
    cancel: CancellationToken,
}

impl Notifier {
    /// Builds the notifier and spawns one background delivery task per configured channel.
    pub fn start(config: &NotifyConfig, http: reqwest::Client) -> Self {
        let cancel = CancellationToken::new();
        let mut channels = Vec::new();

        if let Some(email_config) = &config.email {
            let (tx, rx) = mpsc::channel(CHANNEL_QUEUE_CAPACITY);
            let channel = EmailChannel::new(email_config.clone());
            tokio::spawn(channel.run(rx, cancel.clone()));
            channels.push(Channel {
                name: "email".to_string(),
                tx,
            });
        }

        for (idx, webhook_config) in config.webhooks.iter().enumerate() {
            let (tx, rx) = mpsc::channel(CHANNEL_QUEUE_CAPACITY);
            let channel = WebhookChannel::new(webhook_config.clone(), http.clone());
            tokio::spawn(channel.run(rx, cancel.clone()));
            channels.push(Channel {
                name: format!("webhook[{idx}]"),
                tx,
            });
        }

        Self { channels, cancel }
    }

    /// Enqueue `job` on every channel. Returns promptly: a full channel queue just drops the
    /// job for that channel (logged), matching the best-effort notification contract.
    pub fn send(&self, job: NotifyJob) {
        for channel in &self.channels {
            if channel.tx.try_send(job.clone()).is_err() {
                tracing::warn!(channel = %channel.name, "notifier queue full, dropping notification");
            }
        }
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_with_no_channels_configured_is_a_silent_no_op() {
        let http = reqwest::Client::new();
        let notifier = Notifier::start(&NotifyConfig::default(), http);
        notifier.send(NotifyJob {
            subject: "s".into(),
            body: "b".into(),
            severity: Severity::Warning,
            status: AlertEventStatus::Firing,
        });
    }
}
