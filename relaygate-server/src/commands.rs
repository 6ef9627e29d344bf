use anyhow::Result;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use std::path::Path;

use relaygate_core::ProviderRegistry;
use relaygate_types::AgentConfig;

use crate::config::load_config;

fn capability_flags(agent: &AgentConfig) -> String {
    let caps = agent.capabilities;
    let flags: Vec<&str> = [
        (caps.supports_stream, "stream"),
        (caps.supports_detail, "detail"),
        (caps.supports_files, "files"),
        (caps.supports_images, "images"),
    ]
    .into_iter()
    .filter_map(|(on, name)| on.then_some(name))
    .collect();
    if flags.is_empty() {
        "-".to_string()
    } else {
        flags.join(", ")
    }
}

/// Load the config file and report every agent with its adapter verdict.
pub fn check_config(path: &Path, json: bool) -> Result<()> {
    let config = load_config(path)?;
    let registry = ProviderRegistry::with_defaults();

    let verdicts: Vec<(&AgentConfig, Result<(), String>)> = config
        .agents
        .iter()
        .map(|agent| {
            let verdict = match registry.get(agent.provider) {
                Some(adapter) => adapter.check_config(agent).map_err(|e| e.to_string()),
                None => Err(format!("no adapter for {}", agent.provider)),
            };
            (agent, verdict)
        })
        .collect();

    if json {
        let report: Vec<serde_json::Value> = verdicts
            .iter()
            .map(|(agent, verdict)| {
                serde_json::json!({
                    "id": agent.id,
                    "provider": agent.provider,
                    "endpoint": agent.endpoint,
                    "error": verdict.as_ref().err(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if verdicts.is_empty() {
        println!("{}", "No agents configured.".yellow());
    } else {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Agent", "Provider", "Endpoint", "Capabilities", "Status"]);
        for (agent, verdict) in &verdicts {
            let status = match verdict {
                Ok(()) => Cell::new("OK").fg(Color::Green),
                Err(reason) => Cell::new(reason).fg(Color::Red),
            };
            table.add_row(vec![
                Cell::new(&agent.id),
                Cell::new(agent.provider.as_str()),
                Cell::new(&agent.endpoint),
                Cell::new(capability_flags(agent)),
                status,
            ]);
        }
        println!("{table}");
    }

    let invalid = verdicts.iter().filter(|(_, v)| v.is_err()).count();
    if invalid > 0 {
        anyhow::bail!("{} of {} agents are misconfigured", invalid, verdicts.len());
    }
    if !json {
        println!("\n{} {} agents ready", "✓".green(), verdicts.len());
    }
    Ok(())
}
