use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use lookout::core::config::Config;
use lookout::Lookout;

/// Run the agent in the foreground, blocking until SIGINT/SIGTERM.
#[derive(Parser)]
pub struct RunCommand {
    /// Configuration file path.
    #[arg(short, long, default_value = "/etc/lookout/lookout.toml")]
    pub config: String,
}

impl RunCommand {
    pub async fn execute(self) -> Result<()> {
        let _ = dotenvy::dotenv();

        tracing_subscriber::fmt()
            .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
            .init();

        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown-host".to_string());
        info!(%hostname, config = %self.config, "starting lookout agent");

        let config = Config::from_file(&self.config)
            .with_context(|| format!("failed to load configuration from {}", self.config))?;

        let agent = Lookout::build(config)
            .await
            .context("failed to initialize lookout agent")?;

        let cancel = agent.cancel_handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received shutdown signal");
                cancel.cancel();
            }
        });

        agent.run().await.context("agent run loop exited with an error")?;

        info!("lookout agent stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_path_is_the_well_known_path() {
        let cmd = RunCommand {
            config: "/etc/lookout/lookout.toml".to_string(),
        };
        assert_eq!(cmd.config, "/etc/lookout/lookout.toml");
    }
}
