mod run;

pub use run::RunCommand;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// lookout - host-resident observability agent.
#[derive(Parser)]
#[command(name = "lookoutd")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the agent in the foreground.
    Run(RunCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run(cmd) => cmd.execute().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_default_config_path() {
        let cli = Cli::try_parse_from(["lookoutd", "run"]).unwrap();
        match cli.command {
            Commands::Run(cmd) => assert_eq!(cmd.config, "/etc/lookout/lookout.toml"),
        }
    }

    #[test]
    fn parses_run_with_custom_config_path() {
        let cli = Cli::try_parse_from(["lookoutd", "run", "--config", "./lookout.toml"]).unwrap();
        match cli.command {
            Commands::Run(cmd) => assert_eq!(cmd.config, "./lookout.toml"),
        }
    }
}
