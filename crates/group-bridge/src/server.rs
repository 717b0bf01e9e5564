//! HTTP API for the chat bot
//!
//! Provides /health and the /api/wa/* endpoints. Every response is JSON with a
//! `success` flag; failures carry a `message`.

use crate::error::{BridgeError, Result};
use crate::groups::{GroupDirectory, LoginOutcome, PictureSource};
use crate::picture::MAX_PICTURE_BYTES;
use crate::types::{
    parse_switch, CacheHealth, GroupSetting, HealthResponse, SettingTarget,
};
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, FromRequest, Multipart, Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use session_cache::CacheManager;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Shared state for the HTTP server
pub struct ServerState {
    pub directory: Arc<GroupDirectory>,
    pub cache: Arc<CacheManager>,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(directory: Arc<GroupDirectory>, cache: Arc<CacheManager>) -> Self {
        Self {
            directory,
            cache,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// A JSON field clients send either as a number or as a string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Loose {
    Number(u64),
    Text(String),
}

impl Loose {
    fn as_text(&self) -> String {
        match self {
            Loose::Number(n) => n.to_string(),
            Loose::Text(s) => s.trim().to_string(),
        }
    }

    fn group_number(&self) -> Option<u32> {
        let number = match self {
            Loose::Number(n) => u32::try_from(*n).ok(),
            Loose::Text(s) => s.trim().parse().ok(),
        };
        number.filter(|n| *n > 0)
    }
}

fn required_group(field: &Option<Loose>, message: &str) -> Result<u32> {
    field
        .as_ref()
        .and_then(Loose::group_number)
        .ok_or_else(|| BridgeError::BadRequest(message.to_string()))
}

fn required_text(field: Option<String>, message: &str) -> Result<String> {
    field
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| BridgeError::BadRequest(message.to_string()))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    number: Option<Loose>,
}

#[derive(Debug, Deserialize)]
struct SettingsRequest {
    setting: Option<String>,
    action: Option<String>,
    target: Option<Loose>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenameRequest {
    group_number: Option<Loose>,
    new_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescriptionRequest {
    group_number: Option<Loose>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PictureRequest {
    group_number: Option<Loose>,
    file_url: Option<String>,
    action: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InviteRequest {
    group_number: Option<Loose>,
    number: Option<Loose>,
}

/// Room for the other form fields next to an uploaded image
const PICTURE_BODY_LIMIT: usize = MAX_PICTURE_BYTES + 64 * 1024;

/// Picture change requested either as JSON or as a multipart form
struct PictureForm {
    group_number: Option<Loose>,
    action: Option<String>,
    source: Option<PictureSource>,
}

impl From<PictureRequest> for PictureForm {
    fn from(req: PictureRequest) -> Self {
        Self {
            group_number: req.group_number,
            action: req.action,
            source: req
                .file_url
                .filter(|url| !url.trim().is_empty())
                .map(PictureSource::Url),
        }
    }
}

impl PictureForm {
    /// Fields: `groupNumber`, `action`, `fileUrl` and an `image` file, which
    /// wins over `fileUrl` when both are sent
    async fn from_multipart(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self {
            group_number: None,
            action: None,
            source: None,
        };
        let mut file_url = None;
        let mut image = None;

        while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("groupNumber") => {
                    form.group_number = Some(Loose::Text(field.text().await.map_err(bad_form)?));
                }
                Some("action") => form.action = Some(field.text().await.map_err(bad_form)?),
                Some("fileUrl") => file_url = Some(field.text().await.map_err(bad_form)?),
                Some("image") => image = Some(field.bytes().await.map_err(bad_form)?.to_vec()),
                _ => {}
            }
        }

        form.source = match image {
            Some(bytes) => Some(PictureSource::Bytes(bytes)),
            None => file_url
                .filter(|url| !url.trim().is_empty())
                .map(PictureSource::Url),
        };
        Ok(form)
    }
}

fn bad_form(err: MultipartError) -> BridgeError {
    BridgeError::BadRequest(err.body_text())
}

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/wa/login", post(login))
        .route("/api/wa/status", get(status))
        .route("/api/wa/groups", get(list_groups))
        .route("/api/wa/group/settings", post(update_settings))
        .route("/api/wa/group/rename", post(rename_group))
        .route("/api/wa/group/description", post(update_description))
        .route(
            "/api/wa/group/picture",
            post(update_picture).layer(DefaultBodyLimit::max(PICTURE_BODY_LIMIT)),
        )
        .route("/api/wa/group/invite", post(invite_member))
        .route("/api/wa/group/{group_number}", get(group_info))
        .route("/api/wa/logout", post(logout))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server and serve until Ctrl-C or SIGTERM
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        uptime_secs,
        cache: CacheHealth {
            backend: state.cache.backend_kind(),
            stats: state.cache.stats(),
        },
    })
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "message": "Endpoint not found" })),
    )
        .into_response()
}

async fn login(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Value>> {
    if req.number.as_ref().map(Loose::as_text).unwrap_or_default().is_empty() {
        return Err(BridgeError::BadRequest(
            "Phone number is required".to_string(),
        ));
    }

    let body = match state.directory.login().await? {
        LoginOutcome::AlreadyConnected => json!({
            "success": true,
            "message": "Already connected",
            "connected": true,
        }),
        LoginOutcome::Qr(qr_code) => json!({
            "success": true,
            "qrCode": qr_code,
            "message": "Scan QR code to login",
        }),
        LoginOutcome::Connecting => json!({
            "success": true,
            "message": "Connecting...",
        }),
    };
    Ok(Json(body))
}

async fn status(State(state): State<SharedState>) -> Json<Value> {
    let status = state.directory.status().await;
    Json(json!({
        "success": true,
        "connected": status.connected,
        "hasQR": status.has_qr,
    }))
}

async fn list_groups(State(state): State<SharedState>) -> Result<Json<Value>> {
    let groups = state.directory.groups().await?;
    Ok(Json(json!({
        "success": true,
        "count": groups.len(),
        "groups": groups,
    })))
}

async fn update_settings(
    State(state): State<SharedState>,
    Json(req): Json<SettingsRequest>,
) -> Result<Json<Value>> {
    let (Some(setting), Some(action), Some(target)) = (req.setting, req.action, req.target) else {
        return Err(BridgeError::BadRequest(
            "Setting, action, and target are required".to_string(),
        ));
    };

    let setting = GroupSetting::from_name(&setting)
        .ok_or_else(|| BridgeError::BadRequest(format!("Invalid setting: {}", setting)))?;
    let enabled = parse_switch(&action)
        .ok_or_else(|| BridgeError::BadRequest(format!("Invalid action: {}", action)))?;
    let target = SettingTarget::parse(&target.as_text()).ok_or_else(|| {
        BridgeError::BadRequest("Target must be a group number or \"all\"".to_string())
    })?;

    let results = state
        .directory
        .apply_setting(setting, enabled, target)
        .await?;
    Ok(Json(json!({
        "success": true,
        "processed": results.len(),
        "results": results,
    })))
}

async fn rename_group(
    State(state): State<SharedState>,
    Json(req): Json<RenameRequest>,
) -> Result<Json<Value>> {
    const MISSING: &str = "Group number and new name are required";
    let number = required_group(&req.group_number, MISSING)?;
    let new_name = required_text(req.new_name, MISSING)?;

    let group = state.directory.rename(number, &new_name).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Group renamed to \"{}\"", new_name),
        "groupNumber": number,
        "oldName": group.name,
        "newName": new_name,
    })))
}

async fn update_description(
    State(state): State<SharedState>,
    Json(req): Json<DescriptionRequest>,
) -> Result<Json<Value>> {
    const MISSING: &str = "Group number and description are required";
    let number = required_group(&req.group_number, MISSING)?;
    // An empty description clears it
    let description = req
        .description
        .ok_or_else(|| BridgeError::BadRequest(MISSING.to_string()))?;

    let group = state.directory.set_description(number, &description).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Group description updated",
        "groupNumber": number,
        "groupName": group.name,
    })))
}

async fn update_picture(
    State(state): State<SharedState>,
    request: Request,
) -> Result<Json<Value>> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    let form = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| BridgeError::BadRequest(e.body_text()))?;
        PictureForm::from_multipart(multipart).await?
    } else {
        let Json(req) = Json::<PictureRequest>::from_request(request, &state)
            .await
            .map_err(|e| BridgeError::BadRequest(e.body_text()))?;
        PictureForm::from(req)
    };

    let number = required_group(&form.group_number, "Group number is required")?;

    if form.action.as_deref() == Some("delete") {
        let group = state.directory.remove_picture(number).await?;
        return Ok(Json(json!({
            "success": true,
            "message": "Group picture removed",
            "groupNumber": number,
            "groupName": group.name,
        })));
    }

    // Resolve the group before validating the image so lookups fail first
    state.directory.admin_group(number).await?;
    let source = form
        .source
        .ok_or_else(|| BridgeError::BadRequest("Image file or URL is required".to_string()))?;

    let group = state.directory.set_picture(number, source).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Group picture updated",
        "groupNumber": number,
        "groupName": group.name,
    })))
}

async fn invite_member(
    State(state): State<SharedState>,
    Json(req): Json<InviteRequest>,
) -> Result<Json<Value>> {
    const MISSING: &str = "Group number and phone number are required";
    let number = required_group(&req.group_number, MISSING)?;
    let phone = req
        .number
        .as_ref()
        .map(Loose::as_text)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| BridgeError::BadRequest(MISSING.to_string()))?;

    let group = state.directory.invite(number, &phone).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Successfully invited {} to group", phone),
        "groupNumber": number,
        "groupName": group.name,
        "invitedNumber": phone,
    })))
}

async fn group_info(
    State(state): State<SharedState>,
    Path(group_number): Path<String>,
) -> Result<Json<Value>> {
    let number = group_number
        .parse::<u32>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| BridgeError::BadRequest("Valid group number is required".to_string()))?;

    let group = state.directory.group_info(number).await?;
    Ok(Json(json!({ "success": true, "group": group })))
}

async fn logout(State(state): State<SharedState>) -> Result<Json<Value>> {
    state.directory.logout().await?;
    Ok(Json(json!({
        "success": true,
        "message": "Successfully logged out",
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pacing::Pacing;
    use crate::session::ConnectionUpdate;
    use crate::testing::{admin_group, member_group, FakeSession};
    use axum::body::Body;
    use session_cache::ManualClock;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        session: Arc<FakeSession>,
        directory: Arc<GroupDirectory>,
        _dir: TempDir,
    }

    async fn test_app() -> TestApp {
        let dir = tempdir().unwrap();
        let cache = Arc::new(
            CacheManager::file(dir.path().to_path_buf(), Arc::new(ManualClock::new(0))).await,
        );
        let session = Arc::new(FakeSession::with_groups(vec![
            admin_group("1@g.us", "Admins"),
            member_group("2@g.us", "Members"),
        ]));
        let directory = Arc::new(GroupDirectory::new(
            session.clone(),
            cache.clone(),
            Pacing::none(),
        ));
        let state = Arc::new(ServerState::new(directory.clone(), cache));

        TestApp {
            router: create_router(state),
            session,
            directory,
            _dir: dir,
        }
    }

    async fn connected_app() -> TestApp {
        let app = test_app().await;
        app.directory.handle_update(ConnectionUpdate::Open).await;
        app
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = test_app().await;

        let (status, json) = send(&app.router, get_request("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert!(json["uptime_secs"].as_u64().is_some());
        assert_eq!(json["cache"]["backend"], "file");
        assert!(json["cache"]["hits"].as_u64().is_some());
    }

    #[tokio::test]
    async fn test_unknown_endpoint() {
        let app = test_app().await;

        let (status, json) = send(&app.router, get_request("/api/nope")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Endpoint not found");
    }

    #[tokio::test]
    async fn test_status_reports_connection() {
        let app = test_app().await;

        let (_, json) = send(&app.router, get_request("/api/wa/status")).await;
        assert_eq!(json["connected"], false);
        assert_eq!(json["hasQR"], false);

        app.directory.handle_update(ConnectionUpdate::Open).await;
        let (_, json) = send(&app.router, get_request("/api/wa/status")).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["connected"], true);
    }

    #[tokio::test]
    async fn test_login_requires_number() {
        let app = test_app().await;

        let (status, json) = send(&app.router, post_json("/api/wa/login", json!({}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Phone number is required");
    }

    #[tokio::test]
    async fn test_login_returns_qr() {
        let app = test_app().await;
        app.directory
            .handle_update(ConnectionUpdate::Qr("data:image/png;base64,AAAA".to_string()))
            .await;

        let (status, json) = send(
            &app.router,
            post_json("/api/wa/login", json!({ "number": "62812345" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["qrCode"], "data:image/png;base64,AAAA");
        assert_eq!(app.session.connect_calls(), 1);
    }

    #[tokio::test]
    async fn test_login_when_connected() {
        let app = connected_app().await;

        let (_, json) = send(
            &app.router,
            post_json("/api/wa/login", json!({ "number": 62812345 })),
        )
        .await;

        assert_eq!(json["connected"], true);
        assert_eq!(json["message"], "Already connected");
        assert_eq!(app.session.connect_calls(), 0);
    }

    #[tokio::test]
    async fn test_groups_when_disconnected() {
        let app = test_app().await;

        let (status, json) = send(&app.router, get_request("/api/wa/groups")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], "WhatsApp not connected");
    }

    #[tokio::test]
    async fn test_list_groups() {
        let app = connected_app().await;

        let (status, json) = send(&app.router, get_request("/api/wa/groups")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["count"], 2);
        assert_eq!(json["groups"][0]["number"], 1);
        assert_eq!(json["groups"][0]["isAdmin"], true);
        assert_eq!(json["groups"][1]["isAdmin"], false);
    }

    #[tokio::test]
    async fn test_settings_validation() {
        let app = connected_app().await;

        let (status, json) = send(
            &app.router,
            post_json("/api/wa/group/settings", json!({ "setting": "msg" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Setting, action, and target are required");

        let (status, _) = send(
            &app.router,
            post_json(
                "/api/wa/group/settings",
                json!({ "setting": "subject", "action": "on", "target": "all" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = send(
            &app.router,
            post_json(
                "/api/wa/group/settings",
                json!({ "setting": "msg", "action": "on", "target": 2 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "No valid admin groups found");
        assert!(app.session.calls().is_empty());
    }

    #[tokio::test]
    async fn test_settings_applied() {
        let app = connected_app().await;

        let (status, json) = send(
            &app.router,
            post_json(
                "/api/wa/group/settings",
                json!({ "setting": "approve", "action": "off", "target": "all" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["processed"], 1);
        assert_eq!(json["results"][0]["groupNumber"], 1);
        assert_eq!(json["results"][0]["success"], true);
        assert_eq!(
            app.session.calls(),
            vec!["setting:1@g.us:approve:false".to_string()]
        );
    }

    #[tokio::test]
    async fn test_rename_status_codes() {
        let app = connected_app().await;

        let (status, _) = send(
            &app.router,
            post_json("/api/wa/group/rename", json!({ "groupNumber": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = send(
            &app.router,
            post_json("/api/wa/group/rename", json!({ "groupNumber": 9, "newName": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["message"], "Group not found");

        let (status, json) = send(
            &app.router,
            post_json("/api/wa/group/rename", json!({ "groupNumber": 2, "newName": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["message"], "Not admin in this group");

        let (status, json) = send(
            &app.router,
            post_json(
                "/api/wa/group/rename",
                json!({ "groupNumber": "1", "newName": "Renamed" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["oldName"], "Admins");
        assert_eq!(json["newName"], "Renamed");
    }

    #[tokio::test]
    async fn test_description_may_be_empty() {
        let app = connected_app().await;

        let (status, json) = send(
            &app.router,
            post_json(
                "/api/wa/group/description",
                json!({ "groupNumber": 1, "description": "" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["groupName"], "Admins");
        assert!(app
            .session
            .calls()
            .contains(&"description:1@g.us:".to_string()));
    }

    #[tokio::test]
    async fn test_picture_delete_and_missing_url() {
        let app = connected_app().await;

        let (status, json) = send(
            &app.router,
            post_json("/api/wa/group/picture", json!({ "groupNumber": "1" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Image file or URL is required");

        let (status, json) = send(
            &app.router,
            post_json(
                "/api/wa/group/picture",
                json!({ "groupNumber": "1", "action": "delete" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Group picture removed");
        assert!(app
            .session
            .calls()
            .contains(&"remove-picture:1@g.us".to_string()));
    }

    fn post_form(uri: &str, fields: &[(&str, &[u8])]) -> Request<Body> {
        const BOUNDARY: &str = "group-bridge-boundary";
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            if *name == "image" {
                body.extend_from_slice(
                    b"Content-Disposition: form-data; name=\"image\"; filename=\"photo.jpg\"\r\n\
                      Content-Type: image/jpeg\r\n\r\n",
                );
            } else {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
            }
            body.extend_from_slice(value);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_picture_upload_from_form() {
        let app = connected_app().await;

        let (status, json) = send(
            &app.router,
            post_form(
                "/api/wa/group/picture",
                &[("groupNumber", "1".as_bytes()), ("image", &[0xFFu8, 0xD8, 0xFF][..])],
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Group picture updated");
        assert_eq!(json["groupName"], "Admins");
        assert!(app.session.calls().contains(&"picture:1@g.us:3".to_string()));
    }

    #[tokio::test]
    async fn test_picture_form_without_image() {
        let app = connected_app().await;

        let (status, json) = send(
            &app.router,
            post_form("/api/wa/group/picture", &[("groupNumber", "1".as_bytes())]),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Image file or URL is required");

        let (status, json) = send(
            &app.router,
            post_form(
                "/api/wa/group/picture",
                &[("groupNumber", "1".as_bytes()), ("action", "delete".as_bytes())],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Group picture removed");
    }

    #[tokio::test]
    async fn test_picture_upload_over_body_limit() {
        let app = connected_app().await;
        let image = vec![0u8; PICTURE_BODY_LIMIT + 1];

        let response = app
            .router
            .clone()
            .oneshot(post_form(
                "/api/wa/group/picture",
                &[("groupNumber", "1".as_bytes()), ("image", image.as_slice())],
            ))
            .await
            .unwrap();

        assert!(response.status().is_client_error());
        assert!(app.session.calls().is_empty());
    }

    #[tokio::test]
    async fn test_picture_rejects_non_http_url() {
        let app = connected_app().await;

        let (status, _) = send(
            &app.router,
            post_json(
                "/api/wa/group/picture",
                json!({ "groupNumber": 1, "fileUrl": "file:///etc/passwd" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(app.session.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invite_member() {
        let app = connected_app().await;

        let (status, json) = send(
            &app.router,
            post_json(
                "/api/wa/group/invite",
                json!({ "groupNumber": 1, "number": 62812345 }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["invitedNumber"], "62812345");
        assert!(app
            .session
            .calls()
            .contains(&"add:1@g.us:62812345@s.whatsapp.net".to_string()));
    }

    #[tokio::test]
    async fn test_group_info_endpoint() {
        let app = connected_app().await;

        let (status, json) = send(&app.router, get_request("/api/wa/group/2")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["group"]["number"], 2);
        assert_eq!(json["group"]["name"], "Members");
        assert_eq!(json["group"]["description"], "About Members");

        let (status, json) = send(&app.router, get_request("/api/wa/group/abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Valid group number is required");

        let (status, _) = send(&app.router, get_request("/api/wa/group/7")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_logout() {
        let app = connected_app().await;

        let (status, json) = send(&app.router, post_json("/api/wa/logout", json!({}))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Successfully logged out");
        assert_eq!(app.session.logout_calls(), 1);

        let (_, json) = send(&app.router, get_request("/api/wa/status")).await;
        assert_eq!(json["connected"], false);
    }

    #[test]
    fn test_loose_group_number() {
        assert_eq!(Loose::Number(3).group_number(), Some(3));
        assert_eq!(Loose::Text(" 4 ".to_string()).group_number(), Some(4));
        assert_eq!(Loose::Number(0).group_number(), None);
        assert_eq!(Loose::Text("x".to_string()).group_number(), None);
    }
}
