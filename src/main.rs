use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;

mod cli;

use cartpilot::agents::AgentProfile;
use cartpilot::config::{GlobalConfig, load_config};
use cartpilot::memory::{ExperienceStore, ObstacleSignature};
use cartpilot::prompt::PromptLibrary;
use cartpilot::tools::ToolRegistry;
use cli::Cli;
use cli::commands::{Commands, MemoryCommands};

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cartpilot")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("cartpilot.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn run_application(cli: &Cli, config: &GlobalConfig) -> Result<()> {
    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Config { path } => handle_config_command(*path, cli, config),
        Commands::Tools { agent, schema } => handle_tools_command(agent.as_deref(), *schema),
        Commands::Prompt { agent, store } => handle_prompt_command(agent, store, config),
        Commands::Memory { command } => handle_memory_command(command, config),
    }
}

/// The file `GlobalConfig::load` would read, if any
fn config_source(explicit: Option<&PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.clone());
    }
    let project = PathBuf::from(".cartpilot.yml");
    if project.exists() {
        return Some(project);
    }
    dirs::config_dir()
        .map(|dir| dir.join("cartpilot").join("cartpilot.yml"))
        .filter(|path| path.exists())
}

fn handle_config_command(path_only: bool, cli: &Cli, config: &GlobalConfig) -> Result<()> {
    let source = config_source(cli.config.as_ref());
    if path_only {
        match source {
            Some(path) => println!("{}", path.display()),
            None => println!("{}", "(defaults)".dimmed()),
        }
        return Ok(());
    }

    let label = source
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());
    println!("{} {}", "# Resolved from:".dimmed(), label.dimmed());
    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    print!("{}", yaml);
    Ok(())
}

fn handle_tools_command(agent: Option<&str>, schema: bool) -> Result<()> {
    let registry = ToolRegistry::standard();
    let names = match agent {
        Some(name) => AgentProfile::require(name)?.allowed_tools(&registry),
        None => registry.names(),
    };
    info!("Listing {} tools (agent: {:?})", names.len(), agent);

    for def in registry.definitions_for(&names) {
        println!("{}", def.name.green().bold());
        println!("  {}", def.description);
        if schema {
            let pretty = serde_json::to_string_pretty(&def.input_schema).context("Failed to render schema")?;
            for line in pretty.lines() {
                println!("    {}", line.dimmed());
            }
        }
    }
    Ok(())
}

fn handle_prompt_command(agent: &str, store: &str, config: &GlobalConfig) -> Result<()> {
    let profile = AgentProfile::require(agent)?;
    if config.store(store).is_none() {
        eyre::bail!("Unknown store '{}'", store);
    }
    let library = PromptLibrary::from_config(&config.agents);
    let prompt = profile.system_prompt(&library, config, store)?;
    println!("{}", prompt);
    Ok(())
}

fn open_memory(config: &GlobalConfig) -> Result<ExperienceStore> {
    let Some(dir) = &config.memory.dir else {
        eyre::bail!("memory.dir is not configured; experience memory is in-memory only");
    };
    let store = ExperienceStore::open(dir, config.memory.max_keep, config.memory.search_n)
        .with_context(|| format!("Failed to open experience store at {}", dir.display()))?;
    Ok(store)
}

fn handle_memory_command(command: &MemoryCommands, config: &GlobalConfig) -> Result<()> {
    let store = open_memory(config)?;
    match command {
        MemoryCommands::List { kind, site } => {
            let entries = store.entries(kind, site);
            if entries.is_empty() {
                println!("{}", "No entries".yellow());
            }
            for entry in entries {
                println!(
                    "{} title={:?} text={:?}",
                    entry.ts.to_string().cyan(),
                    entry.signature.title_keywords.join(" "),
                    entry.signature.text_keywords.join(" ")
                );
                for step in &entry.recipe {
                    println!("  {} {}", step.tool.green(), step.args);
                }
            }
        }
        MemoryCommands::Suggest { kind, site, title, text } => {
            let url = format!("https://{}/", site);
            let signature = ObstacleSignature::from_dialog(&url, title.as_deref(), text.as_deref());
            match store.retrieve(kind, &signature) {
                Some(recipe) => {
                    println!("{}", "Suggested recipe:".green());
                    for step in recipe {
                        println!("  {} {}", step.tool.green(), step.args);
                    }
                }
                None => println!("{}", "No matching experience".yellow()),
            }
        }
        MemoryCommands::Forget { kind } => {
            let removed = store.forget(kind)?;
            println!("{} {} entries of kind {}", "Forgot".red(), removed, kind);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    run_application(&cli, &config).context("Application failed")?;

    Ok(())
}
