use serde::{Deserialize, Serialize};

use crate::error::{LookoutError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotifyConfig {
    #[serde(default)]
    pub email: Option<EmailConfig>,
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
}

impl NotifyConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(email) = &self.email {
            email.validate()?;
        }
        for webhook in &self.webhooks {
            webhook.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub starttls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub to: Vec<String>,
}

fn default_smtp_port() -> u16 {
    465
}

impl EmailConfig {
    fn validate(&self) -> Result<()> {
        if self.to.is_empty() {
            return Err(LookoutError::Config(
                "notify.email.to must list at least one recipient".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub headers: std::collections::BTreeMap<String, String>,
    /// An optional text template rendered with `{Subject, Body, Severity, Status}`; when
    /// absent the default Slack-style payload is sent.
    pub template: Option<String>,
}

impl WebhookConfig {
    fn validate(&self) -> Result<()> {
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(LookoutError::Config(format!(
                "webhook url {:?} must be http or https",
                self.url
            )));
        }
        for (key, value) in &self.headers {
            if contains_crlf(key) || contains_crlf(value) {
                return Err(LookoutError::Config(format!(
                    "webhook header {key:?} must not contain CR or LF"
                )));
            }
        }
        if let Some(template) = &self.template {
            validate_template(template)?;
        }
        Ok(())
    }
}

fn contains_crlf(s: &str) -> bool {
    s.contains('\r') || s.contains('\n')
}

/// A minimal check that every `{Field}` placeholder names one of the four fields the
/// notifier's template renderer supports.
fn validate_template(template: &str) -> Result<()> {
    const ALLOWED: [&str; 4] = ["Subject", "Body", "Severity", "Status"];
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| LookoutError::Config("unterminated '{' in webhook template".into()))?;
        let field = &after[..close];
        if !ALLOWED.contains(&field) {
            return Err(LookoutError::Config(format!(
                "unknown template field {field:?}, expected one of {ALLOWED:?}"
            )));
        }
        rest = &after[close + 1..];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_webhook_url() {
        let cfg = WebhookConfig {
            url: "ftp://example.com".into(),
            headers: Default::default(),
            template: None,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_crlf_in_header_value() {
        let mut headers = std::collections::BTreeMap::new();
        headers.insert("X-Test".to_string(), "value\r\nInjected: true".to_string());
        let cfg = WebhookConfig {
            url: "https://example.com".into(),
            headers,
            template: None,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_unknown_template_field() {
        assert!(validate_template("{Bogus}").is_err());
        assert!(validate_template("*{Subject}*\n{Body}").is_ok());
    }
}
