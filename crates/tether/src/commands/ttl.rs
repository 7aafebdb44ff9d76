//! TTL command - evaluates the idle-timeout policy for a simulated request.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tether_session::is_synthetic_traffic;

use super::{Context, parse_key_val, request_context};

/// Arguments for the ttl command.
#[derive(Args, Debug)]
pub struct TtlArgs {
    /// Request parameter (repeatable), e.g. --param requestType=healthCheck
    #[arg(short, long = "param", value_parser = parse_key_val)]
    pub params: Vec<(String, String)>,

    /// Referer header of the simulated request
    #[arg(long)]
    pub referer: Option<String>,

    /// Cart preservation time requested by the caller, in minutes
    #[arg(long)]
    pub cart_minutes: Option<String>,
}

/// Policy evaluation for JSON output.
#[derive(Debug, Serialize)]
struct TtlOutput {
    synthetic: bool,
    max_inactive_interval_secs: u64,
    cart_preservation_secs: Option<u64>,
}

/// Run the ttl command.
pub async fn run(args: TtlArgs, ctx: &Context) -> Result<()> {
    let policy = ctx.config.max_age_policy()?;
    let request = request_context(&args.params, args.referer.as_deref());

    let output = TtlOutput {
        synthetic: is_synthetic_traffic(&request),
        max_inactive_interval_secs: policy.applicable_max_inactive_interval(&request).as_secs(),
        cart_preservation_secs: policy
            .cart_preservation_time(&request, args.cart_minutes.as_deref())?
            .map(|d| d.as_secs()),
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "traffic: {}",
        if output.synthetic { "synthetic" } else { "user" }
    );
    println!("max inactive interval: {}s", output.max_inactive_interval_secs);
    match output.cart_preservation_secs {
        Some(secs) => println!("cart preservation: {secs}s"),
        None => println!("cart preservation: none"),
    }
    Ok(())
}
