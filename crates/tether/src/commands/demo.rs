//! Demo command - exercises the configured stores end to end.

use std::collections::BTreeMap;

use anyhow::{Result, bail};
use clap::Args;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use super::{Context, parse_key_val, request_context};
use crate::stores::build_repository;

/// Arguments for the demo command.
#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Request parameter (repeatable), e.g. --param requestType=healthCheck
    #[arg(short, long = "param", value_parser = parse_key_val)]
    pub params: Vec<(String, String)>,

    /// Session attribute to set (repeatable). Values are parsed as JSON when possible.
    #[arg(short, long = "attr", value_parser = parse_key_val)]
    pub attrs: Vec<(String, String)>,

    /// Delete the session from every store afterwards
    #[arg(long)]
    pub delete: bool,
}

/// A session as printed by the demo command.
#[derive(Debug, Serialize)]
struct SessionView {
    store: String,
    max_inactive_interval_secs: u64,
    attributes: BTreeMap<String, Value>,
}

/// Demo result for output.
#[derive(Debug, Serialize)]
struct DemoOutput {
    id: String,
    primary: SessionView,
    replica: Option<SessionView>,
    deleted: bool,
}

fn view(session: &tether_session::Session) -> SessionView {
    SessionView {
        store: session.kind().to_string(),
        max_inactive_interval_secs: session.max_inactive_interval().as_secs(),
        attributes: session
            .attribute_names()
            .into_iter()
            .filter_map(|name| {
                session
                    .attribute(name)
                    .map(|value| (name.to_string(), value.clone()))
            })
            .collect(),
    }
}

fn attribute_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Run the demo command.
///
/// Output is always JSON.
pub async fn run(args: DemoArgs, ctx: &Context) -> Result<()> {
    let repository = build_repository(&ctx.config)?;
    let request = request_context(&args.params, None);

    let mut session = repository.create_session(&request).await?;
    for (name, raw) in &args.attrs {
        session.set_attribute(name.as_str(), attribute_value(raw));
    }
    repository.save(&mut session).await?;
    let id = session.id().to_string();
    info!(session_id = %id, "Demo session saved");

    let Some(stored) = repository.find_by_id(&id).await? else {
        bail!("session {id} was saved but could not be read back");
    };

    let engine = repository.engine();
    let replica = match engine.selector().replica() {
        Some(kind) => {
            let adapter = engine.registry().get(kind).await?;
            adapter.find_by_id(&id).await?.as_ref().map(view)
        }
        None => None,
    };

    if args.delete {
        repository.delete_by_id(&id).await?;
    }

    let output = DemoOutput {
        id,
        primary: view(&stored),
        replica,
        deleted: args.delete,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
