//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - config: print the resolved configuration
//! - tools: list the tools an agent profile may call
//! - prompt: render an agent's system prompt
//! - memory: inspect or reset experience memory

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// cartpilot - operator tools for the shopping agent engine
#[derive(Parser, Debug)]
#[command(name = "cartpilot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the resolved configuration as YAML
    Config {
        /// Only print which file the configuration came from
        #[arg(long)]
        path: bool,
    },

    /// List tool definitions
    Tools {
        /// Agent profile whose allowed tools are listed (all tools when omitted)
        #[arg(short, long)]
        agent: Option<String>,

        /// Include each tool's input schema
        #[arg(short, long)]
        schema: bool,
    },

    /// Render an agent's system prompt, honouring agents.prompts_dir
    Prompt {
        /// Agent profile name
        agent: String,

        /// Store whose login settings fill the template
        #[arg(short, long, default_value = "coop_se")]
        store: String,
    },

    /// Experience memory commands
    Memory {
        #[command(subcommand)]
        command: MemoryCommands,
    },
}

/// Experience memory subcommands
#[derive(Subcommand, Debug)]
pub enum MemoryCommands {
    /// Show recorded entries for a bucket
    List {
        #[arg(short, long, default_value = "modal")]
        kind: String,

        /// Hostname, e.g. www.coop.se
        #[arg(short, long)]
        site: String,
    },

    /// Show the recipe retrieval would suggest for a dialog
    Suggest {
        #[arg(short, long, default_value = "modal")]
        kind: String,

        #[arg(short, long)]
        site: String,

        /// Dialog title
        #[arg(short, long)]
        title: Option<String>,

        /// Dialog text
        #[arg(short = 'x', long)]
        text: Option<String>,
    },

    /// Delete every entry of a kind
    Forget {
        #[arg(short, long)]
        kind: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["cartpilot"]).is_err());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::try_parse_from(["cartpilot", "-v", "config"]).unwrap();
        assert!(cli.is_verbose());
    }

    #[test]
    fn test_cli_config_option() {
        let cli = Cli::try_parse_from(["cartpilot", "tools", "-c", "/path/to/cartpilot.yml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/cartpilot.yml")));
    }

    #[test]
    fn test_config_path_flag() {
        let cli = Cli::try_parse_from(["cartpilot", "config", "--path"]).unwrap();
        assert!(matches!(cli.command, Commands::Config { path: true }));
    }

    #[test]
    fn test_prompt_command() {
        let cli = Cli::try_parse_from(["cartpilot", "prompt", "shopping"]).unwrap();
        match cli.command {
            Commands::Prompt { agent, store } => {
                assert_eq!(agent, "shopping");
                assert_eq!(store, "coop_se");
            }
            _ => panic!("Expected Prompt command"),
        }
        assert!(Cli::try_parse_from(["cartpilot", "prompt"]).is_err());
    }

    #[test]
    fn test_tools_for_agent() {
        let cli = Cli::try_parse_from(["cartpilot", "tools", "--agent", "authentication"]).unwrap();
        match cli.command {
            Commands::Tools { agent, schema } => {
                assert_eq!(agent.as_deref(), Some("authentication"));
                assert!(!schema);
            }
            _ => panic!("Expected Tools command"),
        }
    }

    #[test]
    fn test_memory_list_default_kind() {
        let cli = Cli::try_parse_from(["cartpilot", "memory", "list", "--site", "www.coop.se"]).unwrap();
        match cli.command {
            Commands::Memory {
                command: MemoryCommands::List { kind, site },
            } => {
                assert_eq!(kind, "modal");
                assert_eq!(site, "www.coop.se");
            }
            _ => panic!("Expected Memory List command"),
        }
    }

    #[test]
    fn test_memory_suggest() {
        let cli = Cli::try_parse_from([
            "cartpilot",
            "memory",
            "suggest",
            "--site",
            "www.coop.se",
            "--title",
            "Välj butik",
            "-x",
            "Ange ditt postnummer",
        ])
        .unwrap();
        match cli.command {
            Commands::Memory {
                command: MemoryCommands::Suggest { title, text, .. },
            } => {
                assert_eq!(title.as_deref(), Some("Välj butik"));
                assert_eq!(text.as_deref(), Some("Ange ditt postnummer"));
            }
            _ => panic!("Expected Memory Suggest command"),
        }
    }

    #[test]
    fn test_memory_forget_requires_kind() {
        assert!(Cli::try_parse_from(["cartpilot", "memory", "forget"]).is_err());
        let cli = Cli::try_parse_from(["cartpilot", "memory", "forget", "--kind", "modal"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Memory {
                command: MemoryCommands::Forget { .. }
            }
        ));
    }
}
