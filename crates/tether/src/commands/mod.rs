//! CLI command handlers.

pub mod demo;
pub mod ttl;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use tether_config::TetherConfig;
use tether_session::RequestContext;
use tracing::{debug, warn};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// The merged configuration.
    pub config: TetherConfig,
    /// Files the configuration was loaded from.
    pub sources: Vec<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Load configuration from an explicit file, or by discovery.
    pub fn load(config_path: Option<&Path>, json_output: bool, verbose: bool) -> Result<Self> {
        let (config, sources) = match config_path {
            Some(path) => {
                let config = tether_config::load_config_file(path)
                    .with_context(|| format!("loading {}", path.display()))?;
                (config, vec![path.to_path_buf()])
            }
            None => {
                let loaded = tether_config::load_config(None)?;
                for warning in &loaded.warnings {
                    warn!("{warning}");
                }
                let sources = loaded
                    .loaded_from()
                    .into_iter()
                    .map(Path::to_path_buf)
                    .collect();
                (loaded.config, sources)
            }
        };
        debug!(sources = ?sources, "Configuration loaded");

        Ok(Self {
            config,
            sources,
            json_output,
            verbose,
        })
    }
}

/// Parse a `key=value` argument.
pub fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Build a simulated request from CLI parameters and an optional referer.
pub fn request_context(params: &[(String, String)], referer: Option<&str>) -> RequestContext {
    let ctx = params
        .iter()
        .fold(RequestContext::new(), |ctx, (name, value)| {
            ctx.with_param(name, value)
        });
    match referer {
        Some(referer) => ctx.with_header("Referer", referer),
        None => ctx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("requestType=healthCheck").unwrap(),
            ("requestType".to_string(), "healthCheck".to_string())
        );
        assert_eq!(
            parse_key_val("q=a=b").unwrap(),
            ("q".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_request_context() {
        let params = vec![("trafficType".to_string(), "testScript".to_string())];
        let ctx = request_context(&params, Some("https://x/y"));
        assert_eq!(ctx.param("trafficType"), Some("testScript"));
        assert_eq!(ctx.header("referer"), Some("https://x/y"));
    }
}
