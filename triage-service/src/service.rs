use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn,
    response::Json,
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use triage_flow::{
    ConversationRunner, FlowError, GeoLocation, InMemorySessionStorage, Language, LocaleRegistry,
    ModelClient, OpenRouterModel, Orchestrator, UserTurn, emergency_contacts,
};
use uuid::Uuid;

use crate::{
    config::ServiceConfig,
    models::{
        ChatRequest, ChatResponse, EmergencyNumbersQuery, EmergencyNumbersResponse,
        SessionResponse, StartSessionRequest, StartSessionResponse,
    },
    telemetry::correlation_id_middleware,
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn conflict_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::CONFLICT,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub runner: ConversationRunner,
    pub default_language: Language,
}

impl AppState {
    /// Wire the conversation runner around `model` with the built-in locales
    /// and in-memory session storage.
    pub fn new(model: Arc<dyn ModelClient>, default_language: Language) -> triage_flow::Result<Self> {
        let locales = Arc::new(LocaleRegistry::builtin()?);
        let orchestrator = Arc::new(Orchestrator::new(model, locales));
        let runner = ConversationRunner::new(orchestrator, Arc::new(InMemorySessionStorage::new()));
        Ok(Self {
            runner,
            default_language,
        })
    }

    fn locales(&self) -> &LocaleRegistry {
        self.runner.orchestrator().locales()
    }
}

pub fn create_app(config: &ServiceConfig) -> anyhow::Result<Router> {
    let model = Arc::new(OpenRouterModel::new(config.openrouter.clone()));
    let app_state = AppState::new(model, config.default_language)?;
    Ok(build_router(app_state))
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/sessions", post(start_session))
        .route("/sessions/{session_id}", get(get_session))
        .route("/sessions/{session_id}/reset", post(reset_session))
        .route("/chat", post(chat))
        .route("/emergency-numbers", get(emergency_numbers))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(correlation_id_middleware))
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Symptom Triage Service",
        "version": "0.1.0",
        "description": "Conversational symptom triage backed by a hosted language model",
        "endpoints": {
            "POST /sessions": "Start a new conversation",
            "POST /chat": "Send one user message (creates a session when session_id is omitted)",
            "GET /sessions/{session_id}": "Get conversation state",
            "POST /sessions/{session_id}/reset": "Abandon the current episode",
            "GET /emergency-numbers?language=xx": "Localized emergency contacts",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> ApiResult<StartSessionResponse> {
    let language = parse_language(request.language.as_deref())?.unwrap_or(state.default_language);
    let location = parse_location(request.latitude, request.longitude)?;

    let session = state
        .runner
        .start_session(language, location)
        .await
        .map_err(|e| flow_error(e, &state, language))?;

    Ok(Json(StartSessionResponse {
        session_id: session.id,
        language,
        message: state.locales().get(language).initial_bot_message.clone(),
    }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    info!(session_id = %session_id, "Getting session");

    validate_session_id(&session_id)?;
    let session = state
        .runner
        .session(&session_id)
        .await
        .map_err(|e| flow_error(e, &state, state.default_language))?;

    Ok(Json(SessionResponse::from(&session)))
}

async fn reset_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    validate_session_id(&session_id)?;
    let session = state
        .runner
        .reset(&session_id)
        .await
        .map_err(|e| flow_error(e, &state, state.default_language))?;

    Ok(Json(SessionResponse::from(&session)))
}

async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> ApiResult<ChatResponse> {
    info!(
        session_id = ?request.session_id,
        content_length = %request.content.len(),
        has_photo = request.photo_data_uri.is_some(),
        "Processing chat request"
    );

    let language = parse_language(request.language.as_deref())?;
    if let Some(photo) = &request.photo_data_uri {
        validate_photo_data_uri(photo)?;
    }

    let session_id = match request.session_id {
        Some(session_id) => {
            validate_session_id(&session_id)?;
            session_id
        }
        None => {
            let language = language.unwrap_or(state.default_language);
            // No session for a first message that could never start an episode
            if request.content.trim().is_empty() && request.photo_data_uri.is_none() {
                return Err(flow_error(FlowError::MissingSymptoms, &state, language));
            }
            let location = parse_location(request.latitude, request.longitude)?;
            state
                .runner
                .start_session(language, location)
                .await
                .map_err(|e| flow_error(e, &state, language))?
                .id
        }
    };

    let turn = UserTurn {
        text: request.content,
        photo_data_uri: request.photo_data_uri,
    };

    match state.runner.run(&session_id, turn, language).await {
        Ok(result) => {
            info!(session_id = %session_id, state = ?result.state, "Chat request completed");
            Ok(Json(ChatResponse {
                session_id,
                replies: result.replies,
                state: result.state,
            }))
        }
        Err(e) => {
            let language = match language {
                Some(language) => language,
                None => state
                    .runner
                    .session(&session_id)
                    .await
                    .map(|session| session.language)
                    .unwrap_or(state.default_language),
            };
            Err(flow_error(e, &state, language))
        }
    }
}

async fn emergency_numbers(
    State(state): State<AppState>,
    Query(query): Query<EmergencyNumbersQuery>,
) -> Json<EmergencyNumbersResponse> {
    let (language, tokens) = match query.language.as_deref() {
        Some(code) => state.locales().resolve(code),
        None => (state.default_language, state.locales().get(state.default_language)),
    };

    Json(EmergencyNumbersResponse {
        language,
        title: tokens.emergency_numbers.clone(),
        contacts: emergency_contacts(&tokens),
    })
}

/// Map a conversation error to a response, localizing user-facing messages
fn flow_error(err: FlowError, state: &AppState, language: Language) -> ApiError {
    match &err {
        FlowError::MissingSymptoms => {
            bad_request_error(&state.locales().get(language).missing_symptoms)
        }
        FlowError::EmptyMessage => bad_request_error(&err.to_string()),
        FlowError::SessionNotFound(id) => not_found_error("Session not found", id),
        FlowError::SessionBusy(id) => {
            warn!(session_id = %id, "Rejected message for busy session");
            conflict_error("A previous message for this session is still being processed", id)
        }
        _ => {
            error!(error = %err, "Conversation turn failed");
            internal_error("Failed to handle message", &err.to_string())
        }
    }
}

fn parse_language(code: Option<&str>) -> Result<Option<Language>, ApiError> {
    code.map(|code| code.parse::<Language>())
        .transpose()
        .map_err(|e| bad_request_error(&e))
}

fn parse_location(latitude: Option<f64>, longitude: Option<f64>) -> Result<Option<GeoLocation>, ApiError> {
    match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => {
            if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
                return Err(bad_request_error("Location is out of range"));
            }
            Ok(Some(GeoLocation {
                latitude,
                longitude,
            }))
        }
        (None, None) => Ok(None),
        _ => Err(bad_request_error("Both latitude and longitude are required")),
    }
}

fn validate_session_id(session_id: &str) -> Result<(), ApiError> {
    if Uuid::parse_str(session_id).is_err() {
        error!(session_id = %session_id, "Invalid session ID format");
        return Err(bad_request_error("Invalid session ID format"));
    }
    Ok(())
}

fn validate_photo_data_uri(photo: &str) -> Result<(), ApiError> {
    if !photo.starts_with("data:image/") || !photo.contains(";base64,") {
        return Err(bad_request_error(
            "Photo must be a data URI of the form data:image/<type>;base64,<payload>",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;
    use triage_flow::ModelRequest;

    /// Answers by adapter name suffix; unknown adapters fail
    struct CannedModel {
        replies: Vec<(&'static str, &'static str)>,
    }

    #[async_trait]
    impl ModelClient for CannedModel {
        async fn complete(&self, request: ModelRequest) -> triage_flow::Result<String> {
            self.replies
                .iter()
                .find(|(task, _)| request.task.ends_with(task))
                .map(|(_, reply)| reply.to_string())
                .ok_or_else(|| FlowError::model_call(&request.task, "no canned reply"))
        }
    }

    const NOT_GREETING: &str = r#"{"isGreeting": false, "response": ""}"#;

    fn app(replies: Vec<(&'static str, &'static str)>) -> Router {
        let state = AppState::new(Arc::new(CannedModel { replies }), Language::En).unwrap();
        build_router(state)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let (status, body) = send(&app(vec![]), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn start_session_returns_localized_greeting() {
        let (status, body) = send(&app(vec![]), post_json("/sessions", json!({ "language": "hi" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["language"], "hi");

        let expected = LocaleRegistry::builtin().unwrap().get(Language::Hi).initial_bot_message.clone();
        assert_eq!(body["message"], expected);
    }

    #[tokio::test]
    async fn unsupported_language_is_rejected() {
        let (status, _) = send(&app(vec![]), post_json("/sessions", json!({ "language": "fr" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn half_a_location_is_rejected() {
        let (status, _) = send(&app(vec![]), post_json("/sessions", json!({ "latitude": 20.3 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_without_session_starts_one_and_asks_first_question() {
        let app = app(vec![
            ("GreetingClassifier", NOT_GREETING),
            ("SymptomAnalyzer", r#"{"followUpQuestions": ["Since when?", "Any fever?"]}"#),
        ]);

        let (status, body) = send(&app, post_json("/chat", json!({ "content": "sore throat" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "awaiting_follow_up");
        assert_eq!(body["replies"][0]["kind"], "question");
        assert_eq!(body["replies"][0]["index"], 0);
        assert_eq!(body["replies"][0]["total"], 2);
        assert_eq!(body["replies"][0]["text"], "Since when?");

        let session_id = body["session_id"].as_str().unwrap().to_string();
        let (status, session) = send(&app, get(&format!("/sessions/{session_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(session["pending_questions"], 2);
        assert_eq!(session["answered_questions"], 0);
    }

    #[tokio::test]
    async fn full_conversation_ends_with_conditions() {
        let app = app(vec![
            ("GreetingClassifier", NOT_GREETING),
            ("SymptomAnalyzer", r#"{"followUpQuestions": ["Since when?"]}"#),
            (
                "ConditionRefiner",
                r#"[{"conditionName": "Common cold", "description": "Viral infection", "isEmergency": false}]"#,
            ),
            ("PrecautionAdvisor", r#"{"precautions": "Rest and fluids.", "reasoning": "Mild viral illness."}"#),
        ]);

        let (_, body) = send(&app, post_json("/chat", json!({ "content": "runny nose" }))).await;
        let session_id = body["session_id"].as_str().unwrap().to_string();

        let (_, body) = send(
            &app,
            post_json("/chat", json!({ "session_id": session_id, "content": "two days" })),
        )
        .await;
        assert_eq!(body["state"], "awaiting_anything_else");
        assert_eq!(body["replies"][0]["kind"], "text");

        let (status, body) = send(
            &app,
            post_json("/chat", json!({ "session_id": session_id, "content": "No" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "idle");
        let conditions = &body["replies"][0]["conditions"];
        assert_eq!(conditions[0]["name"], "Common cold");
        assert_eq!(conditions[0]["precautions"]["precautions"], "Rest and fluids.");
        assert!(conditions[0].get("nearby_hospitals").is_none());
    }

    #[tokio::test]
    async fn empty_first_message_is_a_localized_bad_request() {
        let (status, body) = send(
            &app(vec![]),
            post_json("/chat", json!({ "content": "  ", "language": "or" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let expected = LocaleRegistry::builtin().unwrap().get(Language::Or).missing_symptoms.clone();
        assert_eq!(body["error"], expected);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let session_id = Uuid::new_v4().to_string();
        let (status, body) = send(
            &app(vec![]),
            post_json("/chat", json!({ "session_id": session_id, "content": "hello" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["session_id"], session_id);
    }

    #[tokio::test]
    async fn malformed_session_id_is_rejected() {
        let (status, _) = send(
            &app(vec![]),
            post_json("/chat", json!({ "session_id": "not-a-uuid", "content": "hello" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn photo_must_be_a_data_uri() {
        let (status, _) = send(
            &app(vec![]),
            post_json("/chat", json!({ "content": "rash", "photo_data_uri": "https://example.com/a.png" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reset_returns_session_to_idle() {
        let app = app(vec![
            ("GreetingClassifier", NOT_GREETING),
            ("SymptomAnalyzer", r#"{"followUpQuestions": ["Since when?"]}"#),
        ]);
        let (_, body) = send(&app, post_json("/chat", json!({ "content": "back pain" }))).await;
        let session_id = body["session_id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, post_json(&format!("/sessions/{session_id}/reset"), json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "idle");
        assert_eq!(body["pending_questions"], 0);
    }

    #[tokio::test]
    async fn emergency_numbers_fall_back_to_english() {
        let (status, body) = send(&app(vec![]), get("/emergency-numbers?language=xx")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["language"], "en");

        let numbers: Vec<&str> = body["contacts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|contact| contact["number"].as_str().unwrap())
            .collect();
        assert_eq!(numbers, vec!["102", "112", "100", "101"]);
    }

    #[tokio::test]
    async fn correlation_id_is_echoed() {
        let request = Request::builder()
            .uri("/health")
            .header("x-correlation-id", "abc-123")
            .body(Body::empty())
            .unwrap();
        let response = app(vec![]).oneshot(request).await.unwrap();
        assert_eq!(response.headers()["x-correlation-id"], "abc-123");
    }
}
