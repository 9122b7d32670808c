//! Interface boundary to the federation engine.
//!
//! Query planning and schema merging proper live outside this repository;
//! this engine implements exactly the surface the gateway needs from it:
//! composing schema material from live subgraphs, a post-start health probe,
//! and fan-out execution that applies the credential policy to every
//! outbound leg.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use http::HeaderMap;
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::auth::RequestContext;
use crate::config::SubgraphDescriptor;
use crate::federation::policy::{self, PolicyError};

const SDL_QUERY: &str = "query { _service { sdl } }";
const PROBE_QUERY: &str = "query { __typename }";

/// Timeout for outbound subgraph calls.
const SUBGRAPH_TIMEOUT_SECONDS: u64 = 30;

/// Schema material composed from the registered subgraphs.
#[derive(Debug, Clone)]
pub struct ComposedSchema {
    pub subgraph_sdls: BTreeMap<String, String>,
    pub composed_at: DateTime<Utc>,
}

/// One failed subgraph leg, surfaced as a GraphQL error entry in the merged
/// response.
struct LegFailure {
    code: &'static str,
    message: String,
}

/// Owns the subgraph set and the outbound HTTP client.
pub struct FederationEngine {
    subgraphs: Vec<SubgraphDescriptor>,
    schema: RwLock<Option<ComposedSchema>>,
    client: reqwest::Client,
}

impl FederationEngine {
    pub fn new(subgraphs: Vec<SubgraphDescriptor>) -> Self {
        Self {
            subgraphs,
            schema: RwLock::new(None),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(SUBGRAPH_TIMEOUT_SECONDS))
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    pub fn subgraphs(&self) -> &[SubgraphDescriptor] {
        &self.subgraphs
    }

    pub fn subgraph_names(&self) -> Vec<String> {
        self.subgraphs.iter().map(|s| s.name.clone()).collect()
    }

    /// The most recently composed schema, if composition has succeeded yet.
    pub async fn composed_schema(&self) -> Option<ComposedSchema> {
        self.schema.read().await.clone()
    }

    /// Compose the schema by fetching SDL from every registered subgraph.
    ///
    /// Any fetch failure fails the whole composition; at startup the
    /// bootstrap supervisor owns the retry envelope around this.
    pub async fn compose(&self) -> anyhow::Result<ComposedSchema> {
        let mut subgraph_sdls = BTreeMap::new();

        for subgraph in &self.subgraphs {
            let sdl = self.fetch_sdl(subgraph).await.with_context(|| {
                format!("failed to fetch schema from subgraph `{}`", subgraph.name)
            })?;
            debug!(subgraph = %subgraph.name, bytes = sdl.len(), "fetched subgraph schema");
            subgraph_sdls.insert(subgraph.name.clone(), sdl);
        }

        let composed = ComposedSchema {
            subgraph_sdls,
            composed_at: Utc::now(),
        };
        *self.schema.write().await = Some(composed.clone());

        Ok(composed)
    }

    async fn fetch_sdl(&self, subgraph: &SubgraphDescriptor) -> anyhow::Result<String> {
        let response = self
            .client
            .post(&subgraph.url)
            .json(&json!({ "query": SDL_QUERY }))
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP {}", response.status().as_u16());
        }

        let body: Value = response.json().await?;
        body.pointer("/data/_service/sdl")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("response carries no _service.sdl"))
    }

    /// Probe every registered subgraph. Any failed probe is a startup
    /// failure, handed to the bootstrap supervisor.
    pub async fn health_check(&self) -> anyhow::Result<()> {
        for subgraph in &self.subgraphs {
            let response = self
                .client
                .post(&subgraph.url)
                .json(&json!({ "query": PROBE_QUERY }))
                .send()
                .await
                .with_context(|| format!("subgraph `{}` unreachable", subgraph.name))?;

            if !response.status().is_success() {
                anyhow::bail!(
                    "subgraph `{}` health probe returned HTTP {}",
                    subgraph.name,
                    response.status().as_u16()
                );
            }

            debug!(subgraph = %subgraph.name, "health probe ok");
        }

        Ok(())
    }

    /// Fan the request out to all subgraphs concurrently against the frozen
    /// context, and merge the legs into one response.
    ///
    /// A leg the credential policy rejects contributes an error entry and is
    /// never dispatched; other legs still return data (partial results).
    pub async fn execute(&self, context: &RequestContext, request: Value) -> Value {
        let mut join_set = JoinSet::new();

        for subgraph in self.subgraphs.clone() {
            let client = self.client.clone();
            let context = context.clone();
            let request = request.clone();
            join_set.spawn(async move {
                let outcome = dispatch_leg(&client, &context, &subgraph, &request).await;
                (subgraph.name, outcome)
            });
        }

        let mut results: BTreeMap<String, Result<Value, LegFailure>> = BTreeMap::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, outcome)) => {
                    if let Err(failure) = &outcome {
                        warn!(subgraph = %name, code = failure.code, error = %failure.message, "subgraph leg failed");
                    }
                    results.insert(name, outcome);
                }
                Err(e) => warn!(error = %e, "subgraph leg task failed to complete"),
            }
        }

        merge_responses(&self.subgraphs, results)
    }

    /// Re-compose the schema at a fixed interval, keeping the last good
    /// schema on failure.
    pub fn start_polling(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; composition already ran
            // during startup.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match self.compose().await {
                    Ok(schema) => {
                        debug!(subgraphs = schema.subgraph_sdls.len(), "schema re-composed");
                    }
                    Err(e) => {
                        warn!(error = %e, "schema polling failed; keeping last composed schema");
                    }
                }
            }
        })
    }
}

async fn dispatch_leg(
    client: &reqwest::Client,
    context: &RequestContext,
    subgraph: &SubgraphDescriptor,
    request: &Value,
) -> Result<Value, LegFailure> {
    let mut headers = HeaderMap::new();
    policy::decorate_headers(&mut headers, context, subgraph).map_err(|e| {
        let code = match e {
            PolicyError::Unauthorized { .. } => "UNAUTHORIZED",
            PolicyError::Encoding { .. } => "BAD_HEADER",
        };
        LegFailure {
            code,
            message: e.to_string(),
        }
    })?;

    let response = client
        .post(&subgraph.url)
        .headers(headers)
        .json(request)
        .send()
        .await
        .map_err(|e| LegFailure {
            code: "SUBGRAPH_UNREACHABLE",
            message: e.to_string(),
        })?;

    if !response.status().is_success() {
        return Err(LegFailure {
            code: "SUBGRAPH_ERROR",
            message: format!("HTTP {}", response.status().as_u16()),
        });
    }

    response.json().await.map_err(|e| LegFailure {
        code: "SUBGRAPH_ERROR",
        message: e.to_string(),
    })
}

/// Merge leg responses in subgraph registration order: data keys are
/// combined, error entries concatenated and tagged with their subgraph.
fn merge_responses(
    order: &[SubgraphDescriptor],
    mut results: BTreeMap<String, Result<Value, LegFailure>>,
) -> Value {
    let mut data = Map::new();
    let mut errors = Vec::new();

    for subgraph in order {
        let Some(result) = results.remove(&subgraph.name) else {
            continue;
        };

        match result {
            Ok(mut body) => {
                if let Some(Value::Object(fields)) = body.get_mut("data").map(Value::take) {
                    for (key, value) in fields {
                        data.insert(key, value);
                    }
                }
                if let Some(Value::Array(leg_errors)) = body.get_mut("errors").map(Value::take) {
                    for mut error in leg_errors {
                        if let Value::Object(obj) = &mut error {
                            let extensions = obj
                                .entry("extensions")
                                .or_insert_with(|| json!({}));
                            if let Value::Object(ext) = extensions {
                                ext.insert("subgraph".to_string(), json!(subgraph.name));
                            }
                        }
                        errors.push(error);
                    }
                }
            }
            Err(failure) => errors.push(json!({
                "message": failure.message,
                "extensions": { "code": failure.code, "subgraph": subgraph.name }
            })),
        }
    }

    let mut response = Map::new();
    response.insert("data".to_string(), Value::Object(data));
    if !errors.is_empty() {
        response.insert("errors".to_string(), Value::Array(errors));
    }
    Value::Object(response)
}
