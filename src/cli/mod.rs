mod commands;

pub use commands::run;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "agentdash", version, about = "Manage agents on an agent backend")]
pub struct Cli {
    /// Config file (default: ./agentdash.{json,json5,yaml,yml,toml} or ~/.agentdash/config.json)
    #[arg(short, long, global = true, env = "AGENTDASH_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List agents and whether they are running
    Agents,
    /// Show an agent's status history
    Status { name: String },
    /// Pause a running agent
    Pause { name: String },
    /// Start a paused agent
    Start { name: String },
    /// Delete an agent
    Delete { name: String },
    /// Export an agent's configuration
    Export(ExportOpts),
    /// Import an agent from an exported file
    Import { file: PathBuf },
    /// Create an agent from a configuration file
    Create { file: PathBuf },
    /// Change settings of an agent (`key=value`, dotted keys merge into objects)
    Set {
        name: String,
        #[arg(required = true, value_name = "KEY=VALUE")]
        assignments: Vec<String>,
    },
    /// Edit an agent's connectors
    Connector(ConnectorOpts),
    /// Print the agent configuration metadata
    Meta,
    /// Send a message and wait for the agent's reply
    Chat { name: String, message: String },
    /// Follow an agent's status and observables until interrupted
    Watch { name: String },
    Config(ConfigOpts),
    Version,
}

#[derive(clap::Args)]
pub struct ExportOpts {
    pub name: String,
    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct ConnectorOpts {
    #[command(subcommand)]
    pub action: ConnectorAction,
}

#[derive(Subcommand)]
pub enum ConnectorAction {
    Add {
        name: String,
        #[arg(value_name = "TYPE")]
        connector_type: String,
        #[arg(value_name = "KEY=VALUE")]
        assignments: Vec<String>,
    },
    /// Remove the connector at a 1-based position
    Remove { name: String, index: usize },
}

#[derive(clap::Args)]
pub struct ConfigOpts {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    Show,
    Validate,
    Init,
}

/// Split `key=value`; the value may itself contain `=`.
pub fn parse_assignment(input: &str) -> Result<(String, String)> {
    let Some((key, value)) = input.split_once('=') else {
        bail!("Expected KEY=VALUE, got '{}'", input);
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("Missing key in '{}'", input);
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_assignments() {
        assert_eq!(
            parse_assignment("model=gpt-4o").unwrap(),
            ("model".to_string(), "gpt-4o".to_string())
        );
        assert_eq!(
            parse_assignment("api_url=http://x/?a=b").unwrap(),
            ("api_url".to_string(), "http://x/?a=b".to_string())
        );
        assert_eq!(parse_assignment("hud=").unwrap().1, "");
        assert!(parse_assignment("hud").is_err());
        assert!(parse_assignment("=1").is_err());
    }

    #[test]
    fn parses_connector_add() {
        let cli = Cli::try_parse_from([
            "agentdash",
            "connector",
            "add",
            "bot",
            "telegram",
            "token=abc",
        ])
        .unwrap();
        match cli.command {
            Commands::Connector(ConnectorOpts {
                action:
                    ConnectorAction::Add {
                        name,
                        connector_type,
                        assignments,
                    },
            }) => {
                assert_eq!(name, "bot");
                assert_eq!(connector_type, "telegram");
                assert_eq!(assignments, vec!["token=abc"]);
            }
            _ => panic!("expected connector add"),
        }
    }

    #[test]
    fn set_requires_an_assignment() {
        assert!(Cli::try_parse_from(["agentdash", "set", "bot"]).is_err());
        let cli = Cli::try_parse_from(["agentdash", "--config", "x.yaml", "set", "bot", "hud=true"])
            .unwrap();
        assert_eq!(cli.config.as_deref(), Some("x.yaml"));
    }
}
