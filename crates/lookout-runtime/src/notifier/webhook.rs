use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use lookout_core::config::WebhookConfig;

use super::NotifyJob;

const MAX_ATTEMPTS: u32 = 3;

pub struct WebhookChannel {
    config: WebhookConfig,
    http: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(config: WebhookConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    pub async fn run(self, mut rx: mpsc::Receiver<NotifyJob>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                job = rx.recv() => {
                    match job {
                        Some(job) => self.deliver(job, &cancel).await,
                        None => break,
                    }
                }
            }
        }
    }

    async fn deliver(&self, job: NotifyJob, cancel: &CancellationToken) {
        let body = self.render_body(&job);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let mut request = self.http.post(&self.config.url).body(body.clone());
            request = request.header("Content-Type", "application/json");
            for (key, value) in sanitized_headers(&self.config.headers) {
                request = request.header(key, value);
            }

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return,
                result = request.send() => result,
            };

            match outcome {
                Ok(response) if response.status().is_success() => return,
                Ok(response) if response.status().is_client_error() => {
                    tracing::error!(
                        url = %self.config.url,
                        status = %response.status(),
                        "webhook delivery failed terminally"
                    );
                    return;
                }
                Ok(response) => {
                    tracing::warn!(
                        url = %self.config.url,
                        status = %response.status(),
                        attempt,
                        "webhook delivery failed, retrying"
                    );
                }
                Err(e) => {
                    tracing::warn!(url = %self.config.url, error = %e, attempt, "webhook transport error, retrying");
                }
            }

            if attempt >= MAX_ATTEMPTS {
                tracing::error!(url = %self.config.url, "webhook delivery exhausted retries");
                return;
            }

            let backoff = Duration::from_millis(200 * 2u64.pow(attempt - 1));
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }

    fn render_body(&self, job: &NotifyJob) -> String {
        match &self.config.template {
            Some(template) => render_template(template, job),
            None => {
                let escaped_body = job.body.replace('"', "\\\"").replace('\n', "\\n");
                let escaped_subject = job.subject.replace('"', "\\\"");
                format!(r#"{{"text": "*{escaped_subject}*\n{escaped_body}"}}"#)
            }
        }
    }
}

/// Renders `{Subject}`, `{Body}`, `{Severity}`, `{Status}` placeholders; any other field was
/// already rejected at config-validation time.
fn render_template(template: &str, job: &NotifyJob) -> String {
    template
        .replace("{Subject}", &job.subject)
        .replace("{Body}", &job.body)
        .replace("{Severity}", &job.severity.to_string())
        .replace("{Status}", job.status.as_str())
}

/// Strips CR/LF from header values as belt-and-suspenders; config-time validation already
/// rejects them outright, this guards against anything that slips through (e.g. future config
/// reload paths that skip validation).
fn sanitized_headers(
    headers: &std::collections::BTreeMap<String, String>,
) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(k, v)| (strip_crlf(k), strip_crlf(v)))
        .collect()
}

fn strip_crlf(s: &str) -> String {
    s.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lookout_core::rule::Severity;

    fn job() -> NotifyJob {
        NotifyJob {
            subject: "high_cpu firing".into(),
            body: "host.cpu_percent > 90".into(),
            severity: Severity::Critical,
            status: lookout_core::AlertEventStatus::Firing,
        }
    }

    #[test]
    fn default_payload_is_slack_style_json() {
        let channel = WebhookChannel::new(
            WebhookConfig {
                url: "https://example.com".into(),
                headers: Default::default(),
                template: None,
            },
            reqwest::Client::new(),
        );
        let body = channel.render_body(&job());
        assert!(body.contains("*high_cpu firing*"));
        assert!(body.contains("host.cpu_percent > 90"));
    }

    #[test]
    fn custom_template_substitutes_all_fields() {
        let channel = WebhookChannel::new(
            WebhookConfig {
                url: "https://example.com".into(),
                headers: Default::default(),
                template: Some("[{Severity}/{Status}] {Subject}: {Body}".into()),
            },
            reqwest::Client::new(),
        );
        let rendered = channel.render_body(&job());
        assert_eq!(
            rendered,
            "[critical/firing] high_cpu firing: host.cpu_percent > 90"
        );
    }

    #[test]
    fn strips_crlf_from_header_values() {
        let mut headers = std::collections::BTreeMap::new();
        headers.insert("X-Test".to_string(), "a\r\nInjected: true".to_string());
        let sanitized = sanitized_headers(&headers);
        assert_eq!(sanitized[0].1, "aInjected: true");
    }
}
