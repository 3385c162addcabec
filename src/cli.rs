// src/cli.rs

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_yaml::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

use crate::errors::SettingsError;
use crate::host::{Host, HostArgs};
use crate::providers::{InstanceSettings, Instances, ProviderBlock};
use crate::settings::Settings;
use anyhow::{Context, Result};

/// Hostbroker: settings and provider inspection for the host broker
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional path to the settings file
    #[clap(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the settings file and report the first violation
    Validate,

    /// Inspect configured providers
    #[clap(subcommand)]
    Providers(ProviderCommands),

    /// Inspect saved nicknames
    #[clap(subcommand)]
    Nicks(NickCommands),

    /// Resolve hosts against the host-level SSH defaults
    #[clap(subcommand)]
    Host(HostCommands),
}

#[derive(Subcommand, Debug)]
pub enum ProviderCommands {
    /// List every configured provider block
    List,
    /// Show one provider's default (or named) instance
    Info {
        name: String,
        /// Instance name; the default-marked instance when omitted
        #[clap(long, value_name = "NAME")]
        instance: Option<String>,
        /// Emit JSON instead of YAML
        #[clap(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum NickCommands {
    /// List saved nicknames
    List,
    /// Dump one nickname's argument overrides
    Show {
        name: String,
        /// Emit JSON instead of YAML
        #[clap(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum HostCommands {
    /// Show the fully resolved SSH settings for a hostname
    Resolve {
        hostname: String,
        #[clap(long)]
        username: Option<String>,
        #[clap(long)]
        port: Option<u16>,
        #[clap(long, value_name = "FILE")]
        key_filename: Option<String>,
        /// Emit JSON instead of YAML
        #[clap(long)]
        json: bool,
    },
}

pub fn handle_command(command: Commands, settings: Arc<Settings>) -> Result<()> {
    match command {
        Commands::Validate => handle_validate(&settings),
        Commands::Providers(provider_cmd) => handle_provider_command(provider_cmd, &settings),
        Commands::Nicks(nick_cmd) => handle_nick_command(nick_cmd, &settings),
        Commands::Host(host_cmd) => handle_host_command(host_cmd, &settings),
    }
}

fn handle_validate(settings: &Settings) -> Result<()> {
    settings
        .validate()
        .context("Settings validation failed")?;
    println!(
        "Settings OK: {} provider block(s), {} nick(s)",
        settings.provider_names().len(),
        settings.nicks.len()
    );
    Ok(())
}

fn handle_provider_command(command: ProviderCommands, settings: &Settings) -> Result<()> {
    match command {
        ProviderCommands::List => {
            for name in settings.provider_names() {
                println!("{name}");
            }
            Ok(())
        }
        ProviderCommands::Info {
            name,
            instance,
            json,
        } => {
            let rendered = render_provider_info(settings, &name, instance.as_deref(), json)
                .with_context(|| format!("Could not resolve provider '{name}'"))?;
            println!("{rendered}");
            Ok(())
        }
    }
}

fn handle_nick_command(command: NickCommands, settings: &Settings) -> Result<()> {
    match command {
        NickCommands::List => {
            let mut names: Vec<&str> = settings.nicks.keys().map(String::as_str).collect();
            names.sort_unstable();
            for name in names {
                println!("{name}");
            }
            Ok(())
        }
        NickCommands::Show { name, json } => {
            let nick = settings.nick(&name)?;
            println!("{}", render_named(&name, nick, json)?);
            Ok(())
        }
    }
}

fn handle_host_command(command: HostCommands, settings: &Settings) -> Result<()> {
    match command {
        HostCommands::Resolve {
            hostname,
            username,
            port,
            key_filename,
            json,
        } => {
            let args = HostArgs {
                hostname: Some(hostname),
                username,
                port,
                key_filename,
                ..HostArgs::default()
            };
            let host = Host::from_args(args, settings)?;
            println!("{}", render_host(&host, json)?);
            Ok(())
        }
    }
}

fn render_host(host: &Host, json: bool) -> Result<String, SettingsError> {
    if json {
        Ok(serde_json::to_string_pretty(host)?)
    } else {
        Ok(serde_yaml::to_string(host)?)
    }
}

/// Resolve and render one provider's instance (default or named).
fn render_provider_info(
    settings: &Settings,
    provider: &str,
    instance: Option<&str>,
    json: bool,
) -> Result<String, SettingsError> {
    match settings.provider(provider)? {
        ProviderBlock::AnsibleTower(block) => {
            render_instance(&block.instances, provider, instance, json)
        }
        ProviderBlock::Container(block) => {
            render_instance(&block.instances, provider, instance, json)
        }
        ProviderBlock::Foreman(block) => render_instance(&block.instances, provider, instance, json),
        ProviderBlock::Beaker(block) => render_instance(&block.instances, provider, instance, json),
        ProviderBlock::Test(block) => render_instance(&block.instances, provider, instance, json),
        ProviderBlock::Unknown(value) => {
            if instance.is_some() {
                warn!("--instance is ignored for unknown provider '{}'", provider);
            }
            render_named(provider, value, json)
        }
    }
}

fn render_instance<T: InstanceSettings + Serialize>(
    instances: &Instances<T>,
    provider: &str,
    wanted: Option<&str>,
    json: bool,
) -> Result<String, SettingsError> {
    let (name, inst) = match wanted {
        Some(name) => instances.named(provider, name)?,
        None => instances.default_instance(provider)?,
    };
    render_named(name, inst, json)
}

/// Render `{name: value}` as YAML, or pretty JSON with `--json`.
fn render_named<T: Serialize>(name: &str, value: &T, json: bool) -> Result<String, SettingsError> {
    let mut map = serde_yaml::Mapping::new();
    map.insert(
        Value::String(name.to_string()),
        serde_yaml::to_value(value)?,
    );
    let doc = Value::Mapping(map);
    if json {
        Ok(serde_json::to_string_pretty(&doc)?)
    } else {
        Ok(serde_yaml::to_string(&doc)?)
    }
}
