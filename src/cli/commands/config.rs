//! Config command: inspect and update `~/.reqlist/config.json`.

use serde::Serialize;

use crate::cli::{Cli, ConfigCommands, ConfigSetArgs};
use crate::config::{
    Overrides, Resolved, Settings, config_path, load_config_from, resolve, save_config_to,
};
use crate::error::Result;
use crate::remote::GistEndpoint;

#[derive(Serialize)]
struct ShowOutput<'a> {
    path: String,
    settings: &'a Settings,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved: Option<ResolvedOutput<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    token_present: bool,
}

#[derive(Serialize)]
struct ResolvedOutput<'a> {
    gist: Option<&'a GistEndpoint>,
    queue_path: String,
    max_retries: u32,
    timeout_secs: u64,
}

impl<'a> From<&'a Resolved> for ResolvedOutput<'a> {
    fn from(resolved: &'a Resolved) -> Self {
        Self {
            gist: resolved.endpoint.as_ref(),
            queue_path: resolved.queue_path.display().to_string(),
            max_retries: resolved.max_retries,
            timeout_secs: resolved.timeout.as_secs(),
        }
    }
}

/// Execute a config subcommand.
///
/// # Errors
///
/// Returns `Error::Config` if the config file cannot be read or written.
pub fn execute(command: &ConfigCommands, cli: &Cli, json: bool) -> Result<()> {
    match command {
        ConfigCommands::Show => show(cli, json),
        ConfigCommands::Path => {
            let path = config_path()?;
            if json {
                println!("{}", serde_json::json!({ "path": path.display().to_string() }));
            } else {
                println!("{}", path.display());
            }
            Ok(())
        }
        ConfigCommands::Set(args) => set(args, cli, json),
    }
}

fn show(cli: &Cli, json: bool) -> Result<()> {
    let path = config_path()?;
    let settings = load_config_from(&path)?;
    let overrides = Overrides {
        gist_id: cli.gist_id.clone(),
        queue_path: cli.queue.clone(),
    };
    let resolved = resolve(&settings, &overrides);
    let token_present = cli.token.is_some() || std::env::var_os("GITHUB_TOKEN").is_some();

    if json {
        let (resolved, error) = match &resolved {
            Ok(r) => (Some(ResolvedOutput::from(r)), None),
            Err(e) => (None, Some(e.to_string())),
        };
        let output = ShowOutput {
            path: path.display().to_string(),
            settings: &settings,
            resolved,
            error,
            token_present,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Config file: {}", path.display());
    match &resolved {
        Ok(r) => {
            match &r.endpoint {
                Some(endpoint) => {
                    println!("  Gist:        {}", endpoint.gist_id);
                    println!("  File:        {}", endpoint.file_name);
                    println!("  Read URL:    {}", endpoint.raw_url);
                    println!("  Write URL:   {}", endpoint.api_url());
                }
                None => println!("  Gist:        (not configured, local queue only)"),
            }
            println!("  Queue:       {}", r.queue_path.display());
            println!("  Max retries: {}", r.max_retries);
            println!("  Timeout:     {}s", r.timeout.as_secs());
        }
        Err(e) => println!("  Invalid:     {e}"),
    }
    println!(
        "  Token:       {}",
        if token_present { "provided" } else { "not provided" }
    );
    Ok(())
}

fn set(args: &ConfigSetArgs, cli: &Cli, json: bool) -> Result<()> {
    let path = config_path()?;
    let update = Settings {
        owner: args.owner.clone(),
        gist_id: cli.gist_id.clone(),
        file_name: args.file_name.clone(),
        raw_url: args.raw_url.clone(),
        api_base: args.api_base.clone(),
        max_retries: args.max_retries,
        timeout_secs: args.timeout_secs,
        queue_path: args.queue_path.clone(),
    };
    let settings = load_config_from(&path)?.merged_with(update);
    save_config_to(&path, &settings)?;

    if json {
        println!("{}", serde_json::to_string(&settings)?);
    } else {
        println!("Saved {}", path.display());
    }
    Ok(())
}
