//! Validate command - loads configuration and reports the resolved settings.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde::Serialize;

use super::Context;

/// Arguments for the validate command.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Also print the merged configuration as TOML
    #[arg(long)]
    pub show: bool,
}

/// Resolved settings for JSON output.
#[derive(Debug, Serialize)]
struct ValidateOutput {
    valid: bool,
    primary: String,
    secondary: Option<String>,
    store_timeout_ms: u64,
    max_age_minutes: u64,
    policy: String,
    sources: Vec<String>,
}

/// Run the validate command.
pub async fn run(args: ValidateArgs, ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    config.validate()?;

    let selector = config.store_selector()?;
    let timeout = config.store_timeout()?;
    let max_age_minutes = config.max_age_minutes()?;
    let policy = if config.policy_enabled() {
        "request-type-aware"
    } else {
        "fixed"
    };

    if ctx.json_output {
        let output = ValidateOutput {
            valid: true,
            primary: selector.primary().to_string(),
            secondary: selector.secondary().map(|k| k.to_string()),
            store_timeout_ms: timeout.as_millis() as u64,
            max_age_minutes,
            policy: policy.to_string(),
            sources: ctx.sources.iter().map(|p| p.display().to_string()).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    let green = Style::new().green();

    println!();
    println!("{}", style("Tether Configuration").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!();
    println!("  {} {}", dim.apply_to("Status:"), green.apply_to("● valid"));
    println!("  {} {}", dim.apply_to("Primary:"), selector.primary());
    match selector.secondary() {
        Some(secondary) => println!("  {} {}", dim.apply_to("Secondary:"), secondary),
        None => println!("  {} disabled", dim.apply_to("Secondary:")),
    }
    println!(
        "  {} {} ms",
        dim.apply_to("Store timeout:"),
        timeout.as_millis()
    );
    println!(
        "  {} {} minutes ({})",
        dim.apply_to("Max age:"),
        max_age_minutes,
        policy
    );

    if ctx.verbose || args.show {
        println!();
        if ctx.sources.is_empty() {
            println!("  {} (none)", dim.apply_to("Sources:"));
        }
        for source in &ctx.sources {
            println!("  {} {}", dim.apply_to("Source:"), source.display());
        }
    }

    if args.show {
        println!();
        println!("{}", dim.apply_to("─".repeat(40)));
        print!("{}", config.to_toml()?);
    }

    println!();
    Ok(())
}
