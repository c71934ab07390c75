use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{HeaderMap, Method},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use classdesk_core::{identity, LifecycleEngine, ListScope, NewComplaint, SessionHub};
use classdesk_shared::authz::{can_perform, Op, Target};
use classdesk_shared::constants::MAX_ATTACHMENTS;
use classdesk_shared::{
    AttachedFile, Category, Complaint, ComplaintId, ComplaintKind, ComplaintStatus,
    LifecycleError, Role, UserId, UserProfile,
};
use classdesk_store::{StoreError, UserAccount};

use crate::attachments::AttachmentStore;
use crate::auth::{self, SessionManager};
use crate::config::ServerConfig;
use crate::error::ServerError;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Mutex<LifecycleEngine>>,
    pub sessions: SessionManager,
    pub attachments: Arc<AttachmentStore>,
    pub session_hub: SessionHub,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/auth/signup", post(auth_signup))
        .route("/auth/login", post(auth_login))
        .route("/auth/logout", post(auth_logout))
        .route("/auth/me", get(auth_me))
        .route("/auth/reset-request", post(auth_reset_request))
        .route("/auth/reset-confirm", post(auth_reset_confirm))
        .route("/complaints", post(complaint_create).get(complaint_list))
        .route("/complaints/:id", get(complaint_get))
        .route("/complaints/:id/status", post(complaint_transition))
        .route("/complaints/:id/assign", post(complaint_assign))
        .route("/complaints/:id/response", post(complaint_respond))
        .route("/attachments/:id", get(attachment_download))
        .route("/users", get(user_list))
        .route("/users/:id/role", post(user_change_role))
        .route("/users/:id/blocked", post(user_set_blocked))
        // Five attachments of 5 MiB plus multipart overhead.
        .layer(DefaultBodyLimit::max(32 * 1024 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Request / response bodies ───

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    registration_open: bool,
}

#[derive(Deserialize)]
struct SignupRequest {
    email: String,
    password: String,
    role: String,
}

#[derive(Serialize)]
struct SignupResponse {
    id: UserId,
    email_verified: bool,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    user: UserProfile,
}

#[derive(Deserialize)]
struct ResetRequest {
    email: String,
}

#[derive(Deserialize)]
struct ResetConfirmRequest {
    token: String,
    new_password: String,
}

#[derive(Serialize)]
struct CreateComplaintResponse {
    id: ComplaintId,
}

#[derive(Deserialize)]
struct ListQuery {
    scope: Option<String>,
}

#[derive(Deserialize)]
struct TransitionRequest {
    status: String,
    comment: Option<String>,
}

#[derive(Deserialize)]
struct AssignRequest {
    teacher_id: UserId,
}

#[derive(Deserialize)]
struct RespondRequest {
    text: String,
}

#[derive(Deserialize)]
struct ChangeRoleRequest {
    role: String,
}

#[derive(Deserialize)]
struct SetBlockedRequest {
    blocked: bool,
}

// ─── Auth helpers ───

/// Resolve the bearer token to a full profile.
///
/// A valid session whose profile record has vanished is treated as
/// unauthorized: without a role nothing can be permitted.
async fn bearer_user(headers: &HeaderMap, state: &AppState) -> Result<UserProfile, ServerError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let token = auth.strip_prefix("Bearer ").unwrap_or(auth);
    if token.is_empty() {
        return Err(ServerError::Unauthorized("Missing bearer token".into()));
    }

    let principal = state
        .sessions
        .resolve(token)
        .await
        .ok_or_else(|| ServerError::Unauthorized("Invalid or expired session".into()))?;

    let engine = state.engine.lock().await;
    match identity::resolve(engine.db(), principal) {
        Ok(profile) => Ok(profile),
        Err(LifecycleError::NotFound(_)) => Err(ServerError::Unauthorized(
            "No profile for this principal".into(),
        )),
        Err(e) => Err(e.into()),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth = headers.get("authorization")?.to_str().ok()?;
    let token = auth.strip_prefix("Bearer ").unwrap_or(auth);
    (!token.is_empty()).then(|| token.to_string())
}

// ─── Misc handlers ───

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        registration_open: state.config.registration_open,
    })
}

// ─── Auth handlers ───

async fn auth_signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<SignupResponse>, ServerError> {
    if !state.config.registration_open {
        return Err(ServerError::Forbidden("Registration is closed".into()));
    }

    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ServerError::Validation("Invalid email address".into()));
    }
    if req.password.len() < 6 {
        return Err(ServerError::Validation(
            "Password must be at least 6 characters".into(),
        ));
    }
    let role = Role::from_str(&req.role)
        .ok_or_else(|| ServerError::Validation(format!("Unknown role: {}", req.role)))?;
    if role == Role::Admin {
        // Admin accounts are promoted by an existing admin, never self-selected.
        return Err(ServerError::Validation(
            "Cannot sign up as an administrator".into(),
        ));
    }

    let account = UserAccount {
        id: UserId::new(),
        email: email.clone(),
        role,
        created_at: chrono::Utc::now(),
        blocked: false,
        password_hash: auth::hash_password(&req.password)?,
        email_verified: false,
    };

    {
        let engine = state.engine.lock().await;
        engine.db().insert_user(&account).map_err(|e| match e {
            StoreError::Conflict(_) => {
                ServerError::Validation("Email is already registered".into())
            }
            other => ServerError::Internal(other.to_string()),
        })?;
    }

    // TODO: deliver the verification email once an outbound mail channel
    // exists; until then the account simply stays unverified.
    info!(user = %account.id, email = %email, role = %role, "account created, verification pending");

    Ok(Json(SignupResponse {
        id: account.id,
        email_verified: false,
    }))
}

async fn auth_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ServerError> {
    let email = req.email.trim().to_lowercase();

    let account = {
        let engine = state.engine.lock().await;
        match engine.db().get_user_by_email(&email) {
            Ok(account) => account,
            Err(StoreError::NotFound) => {
                return Err(ServerError::Unauthorized("Invalid credentials".into()))
            }
            Err(e) => return Err(ServerError::Internal(e.to_string())),
        }
    };

    if !auth::verify_password(&account.password_hash, &req.password) {
        return Err(ServerError::Unauthorized("Invalid credentials".into()));
    }
    if account.blocked {
        return Err(ServerError::Forbidden("Account is blocked".into()));
    }

    let token = state.sessions.issue(account.id).await;
    state.session_hub.signed_in(account.id);

    info!(user = %account.id, "signed in");
    Ok(Json(LoginResponse {
        token,
        user: account.profile(),
    }))
}

async fn auth_logout(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let Some(token) = bearer_token(&headers) else {
        return Err(ServerError::Unauthorized("Missing bearer token".into()));
    };
    if let Some(user) = state.sessions.revoke(&token).await {
        state.session_hub.signed_out(user);
        info!(user = %user, "signed out");
    }
    Ok(Json(serde_json::json!({ "signed_out": true })))
}

async fn auth_me(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, ServerError> {
    let profile = bearer_user(&headers, &state).await?;
    Ok(Json(profile))
}

async fn auth_reset_request(
    State(state): State<AppState>,
    Json(req): Json<ResetRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let email = req.email.trim().to_lowercase();

    let lookup = {
        let engine = state.engine.lock().await;
        engine.db().get_user_by_email(&email)
    };
    if let Ok(account) = lookup {
        let token = state.sessions.issue_reset(account.id).await;
        // Stands in for the reset email until delivery exists; operators can
        // read the token from the log.
        info!(user = %account.id, token = %token, "password reset token issued");
    }

    // Same answer whether or not the email exists.
    Ok(Json(serde_json::json!({ "requested": true })))
}

async fn auth_reset_confirm(
    State(state): State<AppState>,
    Json(req): Json<ResetConfirmRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    if req.new_password.len() < 6 {
        return Err(ServerError::Validation(
            "Password must be at least 6 characters".into(),
        ));
    }

    let user = state
        .sessions
        .consume_reset(&req.token)
        .await
        .ok_or_else(|| ServerError::Unauthorized("Invalid or expired reset token".into()))?;

    let hash = auth::hash_password(&req.new_password)?;
    {
        let engine = state.engine.lock().await;
        engine
            .db()
            .set_user_password(user, &hash)
            .map_err(|e| ServerError::Internal(e.to_string()))?;
    }

    info!(user = %user, "password reset");
    Ok(Json(serde_json::json!({ "reset": true })))
}

// ─── Complaint handlers ───

async fn complaint_create(
    headers: HeaderMap,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<CreateComplaintResponse>, ServerError> {
    let author = bearer_user(&headers, &state).await?;

    let mut title = String::new();
    let mut body = String::new();
    let mut category: Option<Category> = None;
    let mut kind: Option<ComplaintKind> = None;
    let mut files: Vec<(String, Vec<u8>)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "title" => {
                title = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {e}")))?;
            }
            "body" => {
                body = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {e}")))?;
            }
            "category" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {e}")))?;
                if !text.is_empty() {
                    category = Some(Category::from_str(&text).ok_or_else(|| {
                        ServerError::Validation(format!("Unknown category: {text}"))
                    })?);
                }
            }
            "kind" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {e}")))?;
                kind = Some(ComplaintKind::from_str(&text).ok_or_else(|| {
                    ServerError::Validation(format!("Unknown kind: {text}"))
                })?);
            }
            "file" => {
                // Buffer and validate everything before any blob is written,
                // so an over-count or oversized upload aborts cleanly.
                if files.len() >= MAX_ATTACHMENTS {
                    return Err(ServerError::Validation(format!(
                        "At most {MAX_ATTACHMENTS} attachments allowed"
                    )));
                }
                let file_name = field.file_name().unwrap_or("attachment").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read file: {e}")))?;
                if data.len() > state.config.max_attachment_size {
                    return Err(ServerError::AttachmentTooLarge {
                        size: data.len(),
                        max: state.config.max_attachment_size,
                    });
                }
                files.push((file_name, data.to_vec()));
            }
            _ => {}
        }
    }

    // Kind defaults by role the same way the submission form did: teachers
    // get suggestions, everyone else complaints.
    let kind = kind.unwrap_or(match author.role {
        Role::Teacher => ComplaintKind::Suggestion,
        _ => ComplaintKind::Complaint,
    });

    // Run the same checks the engine will, before any blob is written, so a
    // submission the engine would reject leaves no orphan blobs behind.
    if !can_perform(&author, Op::CreateComplaint(kind), Target::None) {
        if author.blocked {
            return Err(ServerError::Forbidden("Account is blocked".into()));
        }
        return Err(ServerError::Validation(
            "Teachers may only submit suggestions".into(),
        ));
    }
    if title.trim().is_empty() {
        return Err(ServerError::Validation("Title must not be empty".into()));
    }
    if body.trim().is_empty() {
        return Err(ServerError::Validation("Body must not be empty".into()));
    }

    // Upload every attachment; the first failure aborts creation.  Blobs
    // stored before the failure are not rolled back.
    let mut attachments = Vec::with_capacity(files.len());
    for (file_name, data) in &files {
        let (_, url) = state.attachments.store(data).await?;
        attachments.push(AttachedFile {
            name: file_name.clone(),
            url,
        });
    }

    let id = {
        let mut engine = state.engine.lock().await;
        engine.create(
            &author,
            NewComplaint {
                title,
                body,
                category,
                kind,
                attachments,
            },
        )?
    };

    Ok(Json(CreateComplaintResponse { id }))
}

async fn complaint_list(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Complaint>>, ServerError> {
    let actor = bearer_user(&headers, &state).await?;

    let scope = match query.scope.as_deref() {
        None | Some("own") => ListScope::Own,
        Some("all") => ListScope::All,
        Some("assigned") => ListScope::Assigned,
        Some(other) => {
            return Err(ServerError::BadRequest(format!("Unknown scope: {other}")))
        }
    };

    let engine = state.engine.lock().await;
    let complaints = engine.list_for(&actor, scope)?;
    Ok(Json(complaints))
}

async fn complaint_get(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Complaint>, ServerError> {
    let actor = bearer_user(&headers, &state).await?;
    let engine = state.engine.lock().await;
    let complaint = engine.get_complaint(&actor, ComplaintId(id))?;
    Ok(Json(complaint))
}

async fn complaint_transition(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let actor = bearer_user(&headers, &state).await?;
    let status = ComplaintStatus::from_str(&req.status)
        .ok_or_else(|| ServerError::Validation(format!("Unknown status: {}", req.status)))?;

    let mut engine = state.engine.lock().await;
    engine.transition(&actor, ComplaintId(id), status, req.comment)?;
    Ok(Json(serde_json::json!({ "updated": true })))
}

async fn complaint_assign(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let actor = bearer_user(&headers, &state).await?;
    let mut engine = state.engine.lock().await;
    engine.assign(&actor, ComplaintId(id), req.teacher_id)?;
    Ok(Json(serde_json::json!({ "assigned": true })))
}

async fn complaint_respond(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RespondRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let actor = bearer_user(&headers, &state).await?;
    let mut engine = state.engine.lock().await;
    engine.respond(&actor, ComplaintId(id), &req.text)?;
    Ok(Json(serde_json::json!({ "responded": true })))
}

async fn attachment_download(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Vec<u8>, ServerError> {
    // Any signed-in profile may fetch a blob it has the URL of; the URLs only
    // surface through complaints the caller was allowed to view.
    let _actor = bearer_user(&headers, &state).await?;
    let data = state.attachments.get(id).await?;
    Ok(data)
}

// ─── User management handlers ───

async fn user_list(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserProfile>>, ServerError> {
    let actor = bearer_user(&headers, &state).await?;
    let engine = state.engine.lock().await;
    let users = engine.list_users(&actor)?;
    Ok(Json(users))
}

async fn user_change_role(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeRoleRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let actor = bearer_user(&headers, &state).await?;
    let role = Role::from_str(&req.role)
        .ok_or_else(|| ServerError::Validation(format!("Unknown role: {}", req.role)))?;

    let mut engine = state.engine.lock().await;
    engine.change_role(&actor, UserId(id), role)?;
    Ok(Json(serde_json::json!({ "updated": true })))
}

async fn user_set_blocked(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetBlockedRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let actor = bearer_user(&headers, &state).await?;
    let mut engine = state.engine.lock().await;
    engine.set_blocked(&actor, UserId(id), req.blocked)?;
    Ok(Json(serde_json::json!({ "updated": true })))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
