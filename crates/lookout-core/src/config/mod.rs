pub mod notify;

pub use notify::{EmailConfig, NotifyConfig, WebhookConfig};

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::error::{LookoutError, Result};
use crate::rule::{Action, Rule, Severity};

/// Root configuration, loaded once at startup (and again on reload, which produces a fresh
/// immutable `Config` and a fresh set of compiled `Rule`s).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub collect: CollectConfig,

    #[serde(default)]
    pub host: HostConfig,

    #[serde(default)]
    pub docker: DockerConfig,

    #[serde(default)]
    pub alerts: BTreeMap<String, AlertRuleConfig>,

    #[serde(default)]
    pub notify: NotifyConfig,
}

impl Config {
    /// Load and parse a TOML config file, substituting `${VAR}` environment references first.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| LookoutError::Config(format!("failed to read config file: {e}")))?;
        Self::parse_toml(&content)
    }

    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content);
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.collect.interval < Duration::from_secs(1) {
            return Err(LookoutError::Config(
                "collect.interval must be at least 1s".into(),
            ));
        }
        if self.storage.retention_days < 1 {
            return Err(LookoutError::Config(
                "storage.retention_days must be >= 1".into(),
            ));
        }
        self.notify.validate()?;
        for (name, rule) in &self.alerts {
            rule.compile(name)?;
        }
        validate_rule_name_prefixes(self.alerts.keys())?;
        Ok(())
    }

    /// Compile every configured rule, sorted by name, into the immutable list the Alerter
    /// evaluates in that fixed order.
    pub fn compile_rules(&self) -> Result<Vec<Rule>> {
        let mut rules = Vec::with_capacity(self.alerts.len());
        for (name, rule) in &self.alerts {
            rules.push(rule.compile(name)?);
        }
        rules.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rules)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            collect: CollectConfig::default(),
            host: HostConfig::default(),
            docker: DockerConfig::default(),
            alerts: BTreeMap::new(),
            notify: NotifyConfig::default(),
        }
    }
}

/// Rejects rule names where one name is a `:`-delimited prefix of another, which would make
/// adoption's instance-key-to-rule matching ambiguous.
fn validate_rule_name_prefixes<'a>(names: impl Iterator<Item = &'a String>) -> Result<()> {
    let names: Vec<&String> = names.collect();
    for a in &names {
        for b in &names {
            if a == b {
                continue;
            }
            if b.starts_with(a.as_str()) && b[a.len()..].starts_with(':') {
                return Err(LookoutError::Config(format!(
                    "rule name {a:?} is a prefix of {b:?}; this makes adoption ambiguous"
                )));
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_storage_path() -> String {
    "/var/lib/lookout/alerts.db".to_string()
}

fn default_retention_days() -> i64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectConfig {
    #[serde(with = "humantime_duration", default = "default_collect_interval")]
    pub interval: Duration,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            interval: default_collect_interval(),
        }
    }
}

fn default_collect_interval() -> Duration {
    Duration::from_secs(15)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default = "default_proc")]
    pub proc: String,
    #[serde(default = "default_sys")]
    pub sys: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            proc: default_proc(),
            sys: default_sys(),
        }
    }
}

fn default_proc() -> String {
    "/proc".to_string()
}

fn default_sys() -> String {
    "/sys".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerConfig {
    #[serde(default = "default_docker_socket")]
    pub socket: String,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket: default_docker_socket(),
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

fn default_docker_socket() -> String {
    "/var/run/docker.sock".to_string()
}

/// The on-disk shape of one `[alerts.<name>]` table. `compile` turns this into an immutable,
/// parsed `Rule`, failing config load if the condition is malformed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRuleConfig {
    pub condition: String,
    #[serde(rename = "for", with = "humantime_duration", default)]
    pub for_duration: Duration,
    #[serde(with = "humantime_duration", default)]
    pub cooldown: Duration,
    pub severity: String,
    pub actions: Vec<String>,
}

impl AlertRuleConfig {
    fn compile(&self, name: &str) -> Result<Rule> {
        let condition = Condition::parse(&self.condition)?;
        let severity: Severity = self.severity.parse()?;
        let actions = self
            .actions
            .iter()
            .map(|a| a.parse::<Action>())
            .collect::<Result<Vec<_>>>()?;
        Rule::new(
            name,
            condition,
            self.for_duration,
            severity,
            actions,
            self.cooldown,
        )
    }
}

/// Substitute `${VAR_NAME}` references against the process environment before TOML parsing.
fn substitute_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();

    for cap in re.captures_iter(content) {
        if let Ok(value) = std::env::var(&cap[1]) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}

/// Serde (de)serialization of `Duration` from humantime-style strings (`"10s"`, `"5m"`), since
/// TOML has no native duration type.
mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
        format!("{}s", d.as_secs()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        parse_duration(&raw).map_err(serde::de::Error::custom)
    }

    fn parse_duration(raw: &str) -> std::result::Result<Duration, String> {
        let raw = raw.trim();
        let split_at = raw
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(raw.len());
        let (num, unit) = raw.split_at(split_at);
        let num: f64 = num
            .parse()
            .map_err(|_| format!("invalid duration {raw:?}"))?;
        let secs = match unit {
            "" | "s" => num,
            "ms" => num / 1000.0,
            "m" => num * 60.0,
            "h" => num * 3600.0,
            other => return Err(format!("unknown duration unit {other:?}")),
        };
        Ok(Duration::from_secs_f64(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let toml = r#"
            [alerts.high_cpu]
            condition = "host.cpu_percent > 90"
            severity = "critical"
            actions = ["notify"]
        "#;
        let config = Config::parse_toml(toml).unwrap();
        assert_eq!(config.collect.interval, Duration::from_secs(15));
        let rules = config.compile_rules().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "high_cpu");
    }

    #[test]
    fn parses_durations_and_env_substitution() {
        std::env::set_var("LOOKOUT_TEST_PATH", "/tmp/lookout-test.db");
        let toml = r#"
            [storage]
            path = "${LOOKOUT_TEST_PATH}"

            [collect]
            interval = "30s"

            [alerts.high_cpu]
            condition = "host.cpu_percent > 90"
            for = "10s"
            cooldown = "5m"
            severity = "warning"
            actions = ["notify"]
        "#;
        let config = Config::parse_toml(toml).unwrap();
        assert_eq!(config.storage.path, "/tmp/lookout-test.db");
        assert_eq!(config.collect.interval, Duration::from_secs(30));
        let rules = config.compile_rules().unwrap();
        assert_eq!(rules[0].for_duration, Duration::from_secs(10));
        assert_eq!(rules[0].cooldown, Duration::from_secs(300));
        std::env::remove_var("LOOKOUT_TEST_PATH");
    }

    #[test]
    fn rejects_ambiguous_rule_name_prefixes() {
        let toml = r#"
            [alerts.high_cpu]
            condition = "host.cpu_percent > 90"
            severity = "warning"
            actions = ["notify"]

            [alerts."high_cpu:extra"]
            condition = "host.mem_percent > 90"
            severity = "warning"
            actions = ["notify"]
        "#;
        assert!(Config::parse_toml(toml).is_err());
    }

    #[test]
    fn rejects_malformed_condition() {
        let toml = r#"
            [alerts.bad]
            condition = "host.nonsense > 90"
            severity = "warning"
            actions = ["notify"]
        "#;
        assert!(Config::parse_toml(toml).is_err());
    }
}
