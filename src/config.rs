//! Gateway configuration: environment-driven settings plus the subgraph
//! registry loaded from `subgraphs.json`.

use serde::Deserialize;
use std::{collections::BTreeMap, env, fmt, fs, path::PathBuf, time::Duration};

/// Deployment environment. Development mode exposes the interactive landing
/// page; production does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Environment {
    Development,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// One registered backend service whose schema is merged into the gateway's
/// unified interface. Created at startup from configuration, immutable for
/// the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubgraphDescriptor {
    pub name: String,
    pub url: String,
    /// Forward the validated identity payload as a dedicated header.
    pub include_auth_jwt: bool,
    /// Reject calls for requests without a valid token.
    pub requires_auth: bool,
}

/// Fully-resolved gateway settings, assembled from CLI/env arguments and the
/// subgraph registry file.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub auth_service_url: String,
    pub subgraphs: Vec<SubgraphDescriptor>,
    /// Re-compose the schema at this interval; `None` disables polling.
    pub schema_poll: Option<Duration>,
    pub retry_forever: bool,
    pub environment: Environment,
}

#[derive(Debug, Deserialize)]
struct SubgraphsFile {
    subgraphs: BTreeMap<String, SubgraphEntry>,
}

#[derive(Debug, Deserialize, Clone)]
struct SubgraphEntry {
    url: String,
    #[serde(default, rename = "includeAuthJwt")]
    include_auth_jwt: bool,
    #[serde(default, rename = "requiresAuth")]
    requires_auth: bool,
    #[serde(default)]
    disabled: bool,
}

/// Locate the subgraph registry file.
pub fn resolve_subgraphs_path() -> anyhow::Result<PathBuf> {
    if let Ok(p) = env::var("GATEWAY_SUBGRAPHS") {
        return Ok(PathBuf::from(p));
    }

    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let candidate = PathBuf::from(xdg)
            .join("federation-gateway")
            .join("subgraphs.json");
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    let candidate = PathBuf::from("subgraphs.json");
    if candidate.exists() {
        return Ok(candidate);
    }

    Err(anyhow::anyhow!(
        "Could not find subgraphs.json (set GATEWAY_SUBGRAPHS or create ./subgraphs.json)"
    ))
}

fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next(); // consume '{'
            let mut name = String::new();
            while let Some(c) = chars.next() {
                if c == '}' {
                    break;
                }
                name.push(c);
            }
            if let Ok(val) = env::var(&name) {
                out.push_str(&val);
            } else {
                out.push_str("${");
                out.push_str(&name);
                out.push('}');
            }
        } else {
            out.push(ch);
        }
    }

    out
}

/// Parse a subgraph registry document, expanding `${VAR}` references in URLs
/// and skipping disabled entries.
pub fn parse_subgraphs(raw: &str) -> anyhow::Result<Vec<SubgraphDescriptor>> {
    let file: SubgraphsFile = serde_json::from_str(raw)?;

    let mut subgraphs = Vec::new();
    for (name, entry) in file.subgraphs {
        if entry.disabled {
            continue;
        }

        let url = expand_env_vars(&entry.url);
        if url.is_empty() {
            return Err(anyhow::anyhow!("Subgraph `{}` has an empty url", name));
        }

        subgraphs.push(SubgraphDescriptor {
            name,
            url,
            include_auth_jwt: entry.include_auth_jwt,
            requires_auth: entry.requires_auth,
        });
    }

    if subgraphs.is_empty() {
        return Err(anyhow::anyhow!(
            "No enabled subgraphs configured; the gateway has nothing to compose"
        ));
    }

    Ok(subgraphs)
}

/// Load the subgraph registry from the resolved `subgraphs.json`.
pub fn load_subgraphs() -> anyhow::Result<Vec<SubgraphDescriptor>> {
    let path = resolve_subgraphs_path()?;
    let raw = fs::read_to_string(&path)?;
    parse_subgraphs(&raw)
}
