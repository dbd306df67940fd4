use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Query, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use tally_core::router::routing_graph_dot;
use tally_core::{AgentOrchestrator, AgentReply, IdentifierKind, MemberContext, TallyError};

pub mod auth;

use auth::{bearer_token, AgentIdentity, AuthError, TokenVerifier, READ_CONTEXT_SCOPE};

#[derive(thiserror::Error, Debug)]
pub enum BridgeError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("core error: {0}")]
    Core(#[from] TallyError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Header carrying the conversational session id
pub const SESSION_HEADER: &str = "session-id";

#[derive(Clone)]
pub struct BridgeState {
    pub orchestrator: Arc<AgentOrchestrator>,
    pub verifier: Arc<dyn TokenVerifier>,
}

impl BridgeState {
    pub fn new(orchestrator: Arc<AgentOrchestrator>, verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            orchestrator,
            verifier,
        }
    }
}

/// Problem body returned for every failed request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiError {
    pub status: u16,
    pub title: String,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, title: &str, detail: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            title: title.into(),
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Bad Request", detail)
    }
}

impl From<TallyError> for ApiError {
    fn from(err: TallyError) -> Self {
        let detail = err.to_string();
        match err {
            TallyError::InvalidArgument(_)
            | TallyError::UserNotIdentified
            | TallyError::Classification(_) => Self::bad_request(detail),
            TallyError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "Not Found", detail),
            TallyError::Upstream { .. } => {
                warn!(target: "bridge", error = %detail, "Upstream failure");
                Self::new(StatusCode::BAD_GATEWAY, "Bad Gateway", detail)
            }
            TallyError::Config(_) | TallyError::Serialization(_) | TallyError::Internal(_) => {
                warn!(target: "bridge", error = %detail, "Internal failure");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                    detail,
                )
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Forbidden => Self::new(StatusCode::FORBIDDEN, "Forbidden", err.to_string()),
            _ => Self::new(StatusCode::UNAUTHORIZED, "Unauthorized", err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Caller holding a valid token with the `read_context` scope
pub struct Authenticated(pub AgentIdentity);

#[async_trait]
impl FromRequestParts<BridgeState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &BridgeState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or(AuthError::MissingToken)?;
        let identity = state.verifier.verify(token)?;
        if !identity.has_scope(READ_CONTEXT_SCOPE) {
            warn!(target: "bridge", agent_id = %identity.agent_id, "Missing read_context scope");
            return Err(AuthError::Forbidden.into());
        }
        Ok(Authenticated(identity))
    }
}

fn session_id(headers: &HeaderMap) -> ApiResult<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request("Missing session-id header"))
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PromptQuery {
    pub prompt: String,
}

async fn get_user_context(
    State(state): State<BridgeState>,
    Authenticated(agent): Authenticated,
    Query(q): Query<UserQuery>,
) -> ApiResult<Json<MemberContext>> {
    // blank parameters count as absent
    let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    let (identifier, kind) = if let Some(id) = present(q.user_id) {
        (id, IdentifierKind::UserId)
    } else if let Some(email) = present(q.email) {
        (email, IdentifierKind::Email)
    } else if let Some(phone) = present(q.phone) {
        (phone, IdentifierKind::Phone)
    } else {
        return Err(ApiError::bad_request("Provide user_id, email, or phone"));
    };

    info!(target: "bridge", agent_id = %agent.agent_id, %kind, "Context lookup");
    let ctx = state.orchestrator.lookup(&identifier, kind).await?;
    Ok(Json(ctx))
}

async fn chat_lookup(
    State(state): State<BridgeState>,
    Authenticated(_agent): Authenticated,
    Query(q): Query<PromptQuery>,
) -> ApiResult<Json<Value>> {
    let reply = state.orchestrator.lookup_from_prompt(&q.prompt).await?;
    Ok(Json(json!({
        "summary": reply.summary,
        "context": reply.context,
    })))
}

/// `{summary, ..payload}` as one object
fn response_body(reply: &AgentReply) -> Value {
    let mut body = Map::new();
    body.insert("summary".into(), Value::String(reply.summary.clone()));
    if let Some(Value::Object(extra)) = &reply.payload {
        for (k, v) in extra {
            body.insert(k.clone(), v.clone());
        }
    }
    Value::Object(body)
}

async fn agent_chat(
    State(state): State<BridgeState>,
    Authenticated(_agent): Authenticated,
    headers: HeaderMap,
    Query(q): Query<PromptQuery>,
) -> ApiResult<Json<Value>> {
    let session = session_id(&headers)?;
    let reply = state.orchestrator.converse(&session, &q.prompt).await?;
    Ok(Json(json!({
        "intent": reply.intent,
        "response": response_body(&reply),
    })))
}

async fn reasoning_chat(
    State(state): State<BridgeState>,
    Authenticated(_agent): Authenticated,
    headers: HeaderMap,
    Query(q): Query<PromptQuery>,
) -> ApiResult<Json<Value>> {
    let session = session_id(&headers)?;
    let reply = state.orchestrator.reason(&session, &q.prompt).await?;
    Ok(Json(json!({
        "response": {
            "summary": reply.summary,
            "steps": reply.steps,
        },
        "context": reply.context,
    })))
}

async fn freeform_chat(
    State(state): State<BridgeState>,
    Authenticated(_agent): Authenticated,
    headers: HeaderMap,
    Query(q): Query<PromptQuery>,
) -> ApiResult<Json<Value>> {
    let session = session_id(&headers)?;
    let reply = state.orchestrator.freeform(&session, &q.prompt).await?;
    Ok(Json(json!({
        "response": {
            "summary": reply.summary,
            "context": reply.context,
            "mode": "freeform",
        }
    })))
}

async fn graph_state() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        routing_graph_dot(),
    )
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router(state: BridgeState) -> Router {
    Router::new()
        .route("/context/user", get(get_user_context))
        .route("/context/chat", post(chat_lookup))
        .route("/context/agent", post(agent_chat))
        .route("/context/reason", post(reasoning_chat))
        .route("/context/freeform", post(freeform_chat))
        .route("/graph/state", get(graph_state))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Bind and serve until the process is stopped
pub async fn start_server(addr: SocketAddr, state: BridgeState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(target: "bridge", %addr, "Tally bridge listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
