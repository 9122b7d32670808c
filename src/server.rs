//! HTTP front door: the axum router and the supervised startup sequence.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{Html, Json},
    routing::{get, post},
};
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::auth::{AuthClient, RequestContext};
use crate::config::{Environment, GatewayConfig};
use crate::federation::FederationEngine;

/// Shared state for request handlers.
pub struct GatewayState {
    pub auth: AuthClient,
    pub engine: Arc<FederationEngine>,
}

pub type AppState = Arc<GatewayState>;

pub fn create_router(state: AppState, environment: Environment) -> Router {
    let mut router = Router::new()
        .route("/graphql", post(graphql))
        .route("/health", get(health_check));

    // Interactive landing page is development-only.
    if environment == Environment::Development {
        router = router.route("/", get(landing_page));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "subgraphs": state.engine.subgraph_names(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

/// Unified GraphQL endpoint. The request context is built exactly once here,
/// before any subgraph dispatch, and frozen for the rest of the request.
async fn graphql(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());

    let context = match RequestContext::build(&state.auth, authorization).await {
        Ok(context) => context,
        Err(e) => {
            // Fail closed: an unreachable auth service denies access for
            // requests that presented a token.
            error!(error = %e, "token check against auth service failed");
            return Err(StatusCode::SERVICE_UNAVAILABLE);
        }
    };

    let response = state.engine.execute(&context, request).await;
    Ok(Json(response))
}

async fn landing_page() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

const LANDING_PAGE: &str = r#"<!doctype html>
<html>
  <head><title>Federation Gateway</title></head>
  <body>
    <h1>Federation Gateway</h1>
    <p>POST GraphQL operations to <code>/graphql</code>. Health at <code>/health</code>.</p>
    <pre>curl -X POST /graphql -H 'content-type: application/json' \
  -H 'authorization: Bearer &lt;token&gt;' -d '{"query": "{ __typename }"}'</pre>
  </body>
</html>
"#;

/// A gateway that completed its startup sequence and is serving.
pub struct RunningGateway {
    local_addr: SocketAddr,
    handle: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl RunningGateway {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the serve task, which normally runs for the process
    /// lifetime.
    pub async fn wait(self) -> Result<()> {
        self.handle
            .await
            .context("gateway serve task panicked")?
            .context("gateway serve loop failed")?;
        Ok(())
    }
}

/// One full startup attempt: compose the schema from live subgraphs, bind
/// the listener, then run a post-start health check against the composed
/// set. Any failure here is recoverable by the bootstrap supervisor.
pub async fn start_gateway(config: &GatewayConfig) -> Result<RunningGateway> {
    let engine = Arc::new(FederationEngine::new(config.subgraphs.clone()));

    let composed = engine
        .compose()
        .await
        .context("schema composition failed")?;
    info!(
        subgraphs = composed.subgraph_sdls.len(),
        "composed schema from subgraphs"
    );

    let state: AppState = Arc::new(GatewayState {
        auth: AuthClient::new(config.auth_service_url.clone()),
        engine: engine.clone(),
    });
    let router = create_router(state, config.environment);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .context("failed to bind gateway port")?;
    let local_addr = listener.local_addr()?;

    engine
        .health_check()
        .await
        .context("post-start health check failed")?;

    if let Some(interval) = config.schema_poll {
        engine.clone().start_polling(interval);
        info!(seconds = interval.as_secs(), "schema polling enabled");
    }

    let handle = tokio::spawn(async move { axum::serve(listener, router).await });

    info!("Federation gateway ready at http://{}/graphql", local_addr);

    Ok(RunningGateway { local_addr, handle })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::config::SubgraphDescriptor;

    async fn auth_server(is_valid: bool, payload: Value) -> ServerGuard {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "data": { "checkToken": { "isValid": is_valid, "payload": payload } }
                })
                .to_string(),
            )
            .create_async()
            .await;
        server
    }

    fn router_for(auth_url: String, subgraphs: Vec<SubgraphDescriptor>) -> Router {
        let state: AppState = Arc::new(GatewayState {
            auth: AuthClient::new(auth_url),
            engine: Arc::new(FederationEngine::new(subgraphs)),
        });
        create_router(state, Environment::Development)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn end_to_end_decorated_dispatch() {
        let auth = auth_server(
            true,
            json!({
                "user": { "id": "u1", "email": "a@b.com" },
                "roles": [],
                "currentRole": { "shortCode": "user" }
            }),
        )
        .await;

        let mut subgraph_server = Server::new_async().await;
        let subgraph_mock = subgraph_server
            .mock("POST", "/")
            .match_header("authorization", Matcher::Exact("Bearer good-token".into()))
            .match_header(
                crate::federation::AUTH_JWT_PAYLOAD_HEADER,
                Matcher::Regex(".+".into()),
            )
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "data": { "me": { "id": "u1" } } }).to_string())
            .create_async()
            .await;

        let router = router_for(
            auth.url(),
            vec![SubgraphDescriptor {
                name: "user-office".to_string(),
                url: subgraph_server.url(),
                include_auth_jwt: true,
                requires_auth: false,
            }],
        );

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/graphql")
                    .header("content-type", "application/json")
                    .header("authorization", "Bearer good-token")
                    .body(Body::from(json!({ "query": "{ me { id } }" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["me"]["id"], "u1");
        subgraph_mock.assert_async().await;
    }

    #[tokio::test]
    async fn auth_outage_fails_the_request_closed() {
        let router = router_for(
            "http://127.0.0.1:1/graphql".to_string(),
            vec![SubgraphDescriptor {
                name: "svc".to_string(),
                url: "http://127.0.0.1:1/graphql".to_string(),
                include_auth_jwt: false,
                requires_auth: false,
            }],
        );

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/graphql")
                    .header("content-type", "application/json")
                    .header("authorization", "Bearer token")
                    .body(Body::from(json!({ "query": "{ x }" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn anonymous_request_skips_the_auth_service() {
        // Auth endpoint is dead, but no header is presented, so the request
        // must still reach the subgraph.
        let mut subgraph_server = Server::new_async().await;
        subgraph_server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "data": { "open": 1 } }).to_string())
            .create_async()
            .await;

        let router = router_for(
            "http://127.0.0.1:1/graphql".to_string(),
            vec![SubgraphDescriptor {
                name: "open".to_string(),
                url: subgraph_server.url(),
                include_auth_jwt: false,
                requires_auth: false,
            }],
        );

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/graphql")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({ "query": "{ open }" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["open"], 1);
    }

    #[tokio::test]
    async fn health_reports_subgraph_names() {
        let router = router_for(
            "http://127.0.0.1:1/graphql".to_string(),
            vec![SubgraphDescriptor {
                name: "user-office".to_string(),
                url: "http://127.0.0.1:1/graphql".to_string(),
                include_auth_jwt: false,
                requires_auth: false,
            }],
        );

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["subgraphs"], json!(["user-office"]));
    }

    #[tokio::test]
    async fn landing_page_is_development_only() {
        let state: AppState = Arc::new(GatewayState {
            auth: AuthClient::new("http://127.0.0.1:1/graphql"),
            engine: Arc::new(FederationEngine::new(vec![SubgraphDescriptor {
                name: "svc".to_string(),
                url: "http://127.0.0.1:1/graphql".to_string(),
                include_auth_jwt: false,
                requires_auth: false,
            }])),
        });

        let dev = create_router(state.clone(), Environment::Development);
        let response = dev
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let prod = create_router(state, Environment::Production);
        let response = prod
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
