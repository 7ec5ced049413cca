#![allow(dead_code)]

//! Shared test harness: a mock university backend bound on port 0, plus
//! helpers for minting tokens and opening sessions against it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use campuslink::{AuthScheme, ClientConfig, FallbackTokens, Session, SessionConfig};

/// Mint a JWT-shaped token with the given email and expiry offset.
pub fn mint_token(email: &str, exp_offset_secs: i64) -> String {
    use jsonwebtoken::{EncodingKey, Header};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    let claims = json!({
        "userId": 2,
        "email": email,
        "roleType": "student",
        "exp": now + exp_offset_secs,
        "iat": now,
        "nbf": now,
        "jti": uuid::Uuid::new_v4().to_string(),
    });
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"mock-backend-secret"),
    )
    .unwrap()
}

/// Mock backend state shared with the test body.
pub struct BackendState {
    /// Tokens the backend accepts on guarded routes.
    pub accepted: Mutex<Vec<String>>,
    /// Token handed out by the login route.
    pub issued_token: Mutex<String>,
    /// 401 body message for rejected requests.
    pub reject_message: Mutex<String>,
    /// Authorization header values observed on guarded routes, in order.
    pub seen_auth: Mutex<Vec<Option<String>>>,
    /// When set, login responses omit the token.
    pub login_without_token: AtomicBool,
    /// Photo URL (relative) reported by the profile route; None omits it.
    pub profile_photo: Mutex<Option<String>>,
    /// Exams known to the backend.
    pub exams: Mutex<Vec<Value>>,
    /// Multipart fields received by the last create-exam request.
    pub last_exam_form: Mutex<Vec<(String, String)>>,
}

impl BackendState {
    pub fn new(issued_token: &str) -> Self {
        Self {
            accepted: Mutex::new(vec![issued_token.to_string()]),
            issued_token: Mutex::new(issued_token.to_string()),
            reject_message: Mutex::new("invalid token".to_string()),
            seen_auth: Mutex::new(Vec::new()),
            login_without_token: AtomicBool::new(false),
            profile_photo: Mutex::new(Some("/uploads/profile-2.png".to_string())),
            exams: Mutex::new(Vec::new()),
            last_exam_form: Mutex::new(Vec::new()),
        }
    }

    pub fn accept(&self, token: &str) {
        self.accepted.lock().unwrap().push(token.to_string());
    }

    pub fn accept_only(&self, tokens: &[&str]) {
        *self.accepted.lock().unwrap() = tokens.iter().map(|t| t.to_string()).collect();
    }

    pub fn set_reject_message(&self, message: &str) {
        *self.reject_message.lock().unwrap() = message.to_string();
    }

    pub fn seen_tokens(&self) -> Vec<Option<String>> {
        self.seen_auth.lock().unwrap().clone()
    }

    pub fn seed_exam(&self, id: i64, year: i32, term: &str, course_code: &str, title: &str) {
        self.exams.lock().unwrap().push(json!({
            "id": id,
            "year": year,
            "term": term,
            "departmentId": 7,
            "courseCode": course_code,
            "title": title,
            "instructorId": 11,
            "files": [],
        }));
    }
}

/// A running mock backend.
pub struct TestBackend {
    pub state: Arc<BackendState>,
    /// Base URL including the API prefix.
    pub url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestBackend {
    /// The backend origin without the API prefix.
    pub fn origin(&self) -> String {
        self.url.trim_end_matches("/api/v1").to_string()
    }
}

impl Drop for TestBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Bind the mock backend on a random port and serve it in the background.
pub async fn spawn_backend(state: BackendState) -> TestBackend {
    let state = Arc::new(state);
    let app = router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    TestBackend {
        state,
        url: format!("http://{}/api/v1", addr),
        handle,
    }
}

/// Open a session with an in-memory credential database against the backend.
pub async fn open_session(base_url: &str, fallbacks: FallbackTokens) -> Session {
    open_session_with_scheme(base_url, fallbacks, AuthScheme::Raw).await
}

pub async fn open_session_with_scheme(
    base_url: &str,
    fallbacks: FallbackTokens,
    auth_scheme: AuthScheme,
) -> Session {
    Session::open(SessionConfig {
        database: ":memory:".to_string(),
        client: ClientConfig {
            base_url: base_url.to_string(),
            timeout: Duration::from_secs(5),
            auth_scheme,
        },
        fallbacks,
    })
    .await
    .expect("open session")
}

fn router(state: Arc<BackendState>) -> Router {
    Router::new()
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/register", post(register))
        .route(
            "/api/v1/users/profile",
            get(get_profile).put(update_profile),
        )
        .route(
            "/api/v1/users/profile/photo",
            post(upload_photo).delete(delete_photo),
        )
        .route("/api/v1/past-exams", get(list_exams).post(create_exam))
        .route("/api/v1/past-exams/{id}", get(get_exam))
        .route("/api/v1/past-exams/{id}/files", post(add_exam_file))
        .route(
            "/api/v1/past-exams/{id}/files/{file_id}",
            delete(delete_exam_file),
        )
        .with_state(state)
}

type Rejection = (StatusCode, Json<Value>);

/// Record the Authorization header and reject tokens the backend does not
/// accept. A `Bearer ` prefix is tolerated so both schemes can be tested.
fn check_auth(state: &BackendState, headers: &HeaderMap) -> Result<(), Rejection> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());
    state.seen_auth.lock().unwrap().push(raw.clone());

    let token = raw.map(|value| match value.strip_prefix("Bearer ") {
        Some(stripped) => stripped.to_string(),
        None => value,
    });

    match token {
        Some(token) if state.accepted.lock().unwrap().contains(&token) => Ok(()),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": *state.reject_message.lock().unwrap() })),
        )),
    }
}

async fn login(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, Rejection> {
    let email = body.get("email").and_then(Value::as_str).unwrap_or("");
    let password = body.get("password").and_then(Value::as_str).unwrap_or("");

    if password == "wrong" {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "invalid credentials" })),
        ));
    }

    if state.login_without_token.load(Ordering::SeqCst) {
        return Ok(Json(json!({ "data": { "user": { "email": email } } })));
    }

    let token = state.issued_token.lock().unwrap().clone();
    Ok(Json(json!({
        "data": {
            "token": token,
            "refreshToken": "refresh-opaque",
            "user": {
                "id": 2,
                "email": email,
                "firstName": "Ada",
                "lastName": "Lovelace",
                "role": "student",
            },
        }
    })))
}

async fn register(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({
        "data": {
            "id": 3,
            "email": body.get("email").cloned().unwrap_or(Value::Null),
            "firstName": body.get("firstName").cloned().unwrap_or(Value::Null),
            "lastName": body.get("lastName").cloned().unwrap_or(Value::Null),
            "role": "student",
        }
    }))
}

async fn get_profile(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, Rejection> {
    check_auth(&state, &headers)?;

    let mut profile = json!({
        "id": 2,
        "email": "ada@example.edu",
        "firstName": "Ada",
        "lastName": "Lovelace",
        "role": "student",
        "departmentId": 7,
    });
    if let Some(photo) = state.profile_photo.lock().unwrap().clone() {
        profile["photoUrl"] = Value::String(photo);
    }
    Ok(Json(json!({ "data": profile })))
}

async fn update_profile(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(_body): Json<Value>,
) -> Result<Json<Value>, Rejection> {
    check_auth(&state, &headers)?;
    Ok(Json(json!({ "data": {} })))
}

async fn upload_photo(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Value>, Rejection> {
    check_auth(&state, &headers)?;

    let mut file_name = "photo".to_string();
    while let Some(field) = multipart.next_field().await.unwrap() {
        if field.name() == Some("photo") {
            if let Some(name) = field.file_name() {
                file_name = name.to_string();
            }
            field.bytes().await.unwrap();
        }
    }
    Ok(Json(
        json!({ "data": { "photoUrl": format!("/uploads/{}", file_name) } }),
    ))
}

async fn delete_photo(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, Rejection> {
    check_auth(&state, &headers)?;
    Ok(Json(json!({ "data": {} })))
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct Paging {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    page_size: Option<u32>,
}

async fn list_exams(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Query(paging): Query<Paging>,
) -> Result<Json<Value>, Rejection> {
    check_auth(&state, &headers)?;

    let exams = state.exams.lock().unwrap().clone();
    let page_size = paging.page_size.unwrap_or(10) as usize;
    let page = paging.page.unwrap_or(1).max(1) as usize;
    let start = (page - 1) * page_size;
    let slice: Vec<Value> = exams.into_iter().skip(start).take(page_size).collect();

    Ok(Json(json!({ "data": { "pastExams": slice } })))
}

async fn create_exam(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Value>, Rejection> {
    check_auth(&state, &headers)?;

    let mut fields = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let value = field.text().await.unwrap();
        fields.push((name, value));
    }
    *state.last_exam_form.lock().unwrap() = fields.clone();

    let field = |name: &str| {
        fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    };

    let id = state.exams.lock().unwrap().len() as i64 + 1;
    let exam = json!({
        "id": id,
        "year": field("year").parse::<i32>().unwrap_or(0),
        "term": field("term"),
        "departmentId": field("departmentId").parse::<i64>().unwrap_or(0),
        "courseCode": field("courseCode"),
        "title": field("title"),
        "files": [],
    });
    state.exams.lock().unwrap().push(exam.clone());

    Ok(Json(json!({ "data": exam })))
}

async fn get_exam(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Value>, Rejection> {
    check_auth(&state, &headers)?;

    let exams = state.exams.lock().unwrap();
    match exams.iter().find(|exam| exam["id"] == json!(id)) {
        Some(exam) => Ok(Json(json!({ "data": exam }))),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": { "message": "exam not found" } })),
        )),
    }
}

async fn add_exam_file(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<Value>, Rejection> {
    check_auth(&state, &headers)?;

    let mut file_name = "file".to_string();
    while let Some(field) = multipart.next_field().await.unwrap() {
        if field.name() == Some("file") {
            if let Some(name) = field.file_name() {
                file_name = name.to_string();
            }
            field.bytes().await.unwrap();
        }
    }

    let mut exams = state.exams.lock().unwrap();
    let Some(exam) = exams.iter_mut().find(|exam| exam["id"] == json!(id)) else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": { "message": "exam not found" } })),
        ));
    };

    let files = exam["files"].as_array_mut().unwrap();
    let file_id = files.len() as i64 + 1;
    let file = json!({ "id": file_id, "name": file_name });
    files.push(file.clone());

    Ok(Json(json!({ "data": file })))
}

async fn delete_exam_file(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Path((id, file_id)): Path<(i64, i64)>,
) -> Result<Json<Value>, Rejection> {
    check_auth(&state, &headers)?;

    let mut exams = state.exams.lock().unwrap();
    let Some(exam) = exams.iter_mut().find(|exam| exam["id"] == json!(id)) else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": { "message": "exam not found" } })),
        ));
    };

    let files = exam["files"].as_array_mut().unwrap();
    let before = files.len();
    files.retain(|file| file["id"] != json!(file_id));
    if files.len() == before {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": { "message": "file not found" } })),
        ));
    }

    Ok(Json(json!({ "data": {} })))
}
