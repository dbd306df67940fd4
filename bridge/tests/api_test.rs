use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use tally_bridge::auth::{AuthConfig, JwtVerifier};
use tally_bridge::{router, BridgeState};
use tally_core::context::{Campaign, Offer, PointAuditLog, TimelineEvent};
use tally_core::intent::{Intent, IntentClassifier};
use tally_core::llm::{ChatMessage, ChatModel};
use tally_core::upstream::{MemberRecord, Resource, UpstreamApi};
use tally_core::{
    AgentOrchestrator, ContextResolver, IdentifierKind, InMemorySessionStore, Result, TallyError,
};

const SECRET: &str = "bridge-test-secret";

struct StubUpstream {
    member: bool,
    offers_down: bool,
}

#[async_trait]
impl UpstreamApi for StubUpstream {
    async fn find_member(&self, identifier: &str, _kind: IdentifierKind) -> Result<MemberRecord> {
        if !self.member {
            return Err(TallyError::NotFound("User not found".into()));
        }
        let record = serde_json::from_value(json!({
            "id": "m-1",
            "first_name": "Claire",
            "email": identifier,
            "tier_details": {
                "point_account_balances": { "summary": { "total_points": 1200 } },
                "tier_levels": [{ "tier_overview": { "name": "Gold" } }]
            }
        }))?;
        Ok(record)
    }

    async fn fetch_offers(&self, _user_id: &str) -> Result<Vec<Offer>> {
        if self.offers_down {
            return Err(TallyError::Upstream {
                resource: Resource::Offers,
                status: Some(503),
                body: "down".into(),
            });
        }
        Ok(vec![Offer {
            id: "o-1".into(),
            name: "Free Coffee".into(),
            ..Default::default()
        }])
    }

    async fn fetch_campaigns(&self, _user_id: &str) -> Result<Vec<Campaign>> {
        Ok(vec![])
    }

    async fn fetch_point_audit_logs(&self, _user_id: &str) -> Result<Vec<PointAuditLog>> {
        Ok(vec![])
    }

    async fn fetch_timeline_events(&self, _user_id: &str) -> Result<Vec<TimelineEvent>> {
        Ok(vec![])
    }
}

struct StubClassifier(Option<Intent>);

#[async_trait]
impl IntentClassifier for StubClassifier {
    async fn classify(&self, _message: &str) -> Result<Option<Intent>> {
        Ok(self.0.clone())
    }
}

struct StubChat;

#[async_trait]
impl ChatModel for StubChat {
    async fn complete(&self, _messages: Vec<ChatMessage>) -> Result<String> {
        Ok("  You have 1,200 points.  ".into())
    }
}

fn app_with(upstream: StubUpstream, intent: Option<Intent>) -> Router {
    let resolver = Arc::new(ContextResolver::new(Arc::new(upstream)));
    let orchestrator = Arc::new(AgentOrchestrator::new(
        resolver,
        Arc::new(InMemorySessionStore::new()),
        Arc::new(StubClassifier(intent)),
        Arc::new(StubChat),
    ));
    let verifier = JwtVerifier::new(&AuthConfig::new(SECRET)).unwrap();
    router(BridgeState::new(orchestrator, Arc::new(verifier)))
}

fn app() -> Router {
    app_with(
        StubUpstream {
            member: true,
            offers_down: false,
        },
        Some(Intent::GetPointBalance),
    )
}

fn token(scopes: Value) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        &json!({ "sub": "agent-7", "scopes": scopes }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn request(method: &str, uri: &str, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token(json!(["read_context"]))));
    if let Some(s) = session {
        builder = builder.header("session-id", s);
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_needs_no_token() {
    let req = Request::get("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app(), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn graph_is_plain_dot() {
    let req = Request::get("/graph/state").body(Body::empty()).unwrap();
    let res = app().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let ctype = res.headers()["content-type"].to_str().unwrap().to_string();
    assert!(ctype.starts_with("text/plain"));
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let dot = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(dot.starts_with("digraph reasoning {"));
}

#[tokio::test]
async fn missing_bearer_is_unauthorized() {
    let req = Request::get("/context/user?email=claire@example.com")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);
}

#[tokio::test]
async fn bad_signature_is_unauthorized() {
    let forged = encode(
        &Header::new(Algorithm::HS256),
        &json!({ "sub": "agent-7", "scopes": ["read_context"] }),
        &EncodingKey::from_secret(b"someone-else"),
    )
    .unwrap();
    let req = Request::get("/context/user?email=claire@example.com")
        .header("authorization", format!("Bearer {forged}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(app(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_scope_is_forbidden() {
    let req = Request::get("/context/user?email=claire@example.com")
        .header("authorization", format!("Bearer {}", token(json!(["write"]))))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(), req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["title"], "Forbidden");
}

#[tokio::test]
async fn user_context_by_email() {
    let (status, body) = send(
        app(),
        request("GET", "/context/user?email=claire@example.com", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["member_id"], "m-1");
    assert_eq!(body["offers"][0]["name"], "Free Coffee");
}

#[tokio::test]
async fn user_context_requires_an_identifier() {
    let (status, _) = send(app(), request("GET", "/context/user", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn blank_user_id_falls_through_to_email() {
    let (status, body) = send(
        app(),
        request("GET", "/context/user?user_id=&email=claire@example.com", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "claire@example.com");

    let (status, _) = send(
        app(),
        request("GET", "/context/user?user_id=&email=&phone=", None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_member_is_not_found() {
    let app = app_with(
        StubUpstream {
            member: false,
            offers_down: false,
        },
        None,
    );
    let (status, body) = send(app, request("GET", "/context/user?user_id=nope", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Not found: User not found");
}

#[tokio::test]
async fn failing_secondary_still_returns_context() {
    let app = app_with(
        StubUpstream {
            member: true,
            offers_down: true,
        },
        None,
    );
    let (status, body) = send(app, request("GET", "/context/user?user_id=m-1", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["offers"], json!([]));
}

#[tokio::test]
async fn reason_identifies_then_routes() {
    let app = app();

    let (status, body) = send(
        app.clone(),
        request("POST", "/context/reason?prompt=claire@example.com", Some("s-1")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["response"]["summary"],
        "Hi Claire, you're a Gold with 1,200 points and 1 active offer."
    );
    assert_eq!(body["context"]["member_id"], "m-1");

    let (status, body) = send(
        app,
        request("POST", "/context/reason?prompt=how%20many%20points", Some("s-1")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["response"]["summary"],
        "You're currently a Gold member with 1,200 points."
    );
    assert_eq!(body["response"]["steps"], json!(["get_point_summary"]));
}

#[tokio::test]
async fn reason_without_session_header_is_bad_request() {
    let (status, body) = send(app(), request("POST", "/context/reason?prompt=hi", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Missing session-id header");
}

#[tokio::test]
async fn reason_before_identification_is_bad_request() {
    let (status, _) = send(
        app(),
        request("POST", "/context/reason?prompt=what%20tier", Some("fresh")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn agent_merges_payload_into_response() {
    let app = app_with(
        StubUpstream {
            member: true,
            offers_down: false,
        },
        Some(Intent::IdentifyUser {
            value: Some("claire@example.com".into()),
        }),
    );
    let (status, body) = send(
        app,
        request("POST", "/context/agent?prompt=I%27m%20claire", Some("s-2")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["intent"], "identify_user");
    assert!(body["response"]["summary"]
        .as_str()
        .unwrap()
        .starts_with("Hi Claire"));
    assert_eq!(body["response"]["context"]["member_id"], "m-1");
}

#[tokio::test]
async fn agent_without_identified_user_is_bad_request() {
    let (status, _) = send(
        app(),
        request("POST", "/context/agent?prompt=points", Some("s-3")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn freeform_answers_from_model() {
    let app = app();
    send(
        app.clone(),
        request("POST", "/context/reason?prompt=claire@example.com", Some("s-4")),
    )
    .await;

    let (status, body) = send(
        app,
        request("POST", "/context/freeform?prompt=how%20am%20I%20doing", Some("s-4")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"]["summary"], "You have 1,200 points.");
    assert_eq!(body["response"]["mode"], "freeform");
    assert_eq!(body["response"]["context"]["member_id"], "m-1");
}

#[tokio::test]
async fn chat_lookup_requires_extracted_identifier() {
    let (status, _) = send(app(), request("POST", "/context/chat?prompt=hello", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
