use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
}

#[derive(Deserialize)]
pub struct CreateUser {
    pub name: String,
}

#[derive(Deserialize)]
pub struct UpdateUser {
    pub name: Option<String>,
}

/// Error body returned for declared failures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiFailure {
    pub error: String,
    pub error_code: String,
}

impl ApiFailure {
    fn new(error: &str, error_code: &str) -> Self {
        Self {
            error: error.to_string(),
            error_code: error_code.to_string(),
        }
    }
}

/// What `/echo` saw of the incoming request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
}

#[derive(Clone)]
pub struct AppState {
    users: Arc<RwLock<HashMap<u64, User>>>,
    next_id: Arc<AtomicU64>,
    session: Arc<RwLock<Option<String>>>,
}

pub fn app() -> Router {
    app_with_users(Vec::new())
}

/// Router whose user store starts with `users`. New ids continue after the
/// largest seeded id.
pub fn app_with_users(users: Vec<User>) -> Router {
    let next_id = users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
    let state = AppState {
        users: Arc::new(RwLock::new(users.into_iter().map(|u| (u.id, u)).collect())),
        next_id: Arc::new(AtomicU64::new(next_id)),
        session: Arc::new(RwLock::new(None)),
    };
    Router::new()
        .route("/users", post(create_user))
        .route("/users/{id}", get(get_user).patch(update_user).delete(delete_user))
        .route("/echo", get(echo).post(echo))
        .route("/session", post(open_session))
        .route("/session/me", get(session_me))
        .route("/blob", get(blob))
        .with_state(state)
}

pub async fn run_with_users(listener: TcpListener, users: Vec<User>) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_users(users)).await
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<User>, (StatusCode, Json<serde_json::Value>)> {
    let users = state.users.read().await;
    users
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, Json(serde_json::json!({}))))
}

async fn create_user(
    State(state): State<AppState>,
    Json(input): Json<CreateUser>,
) -> Result<(StatusCode, Json<User>), (StatusCode, Json<ApiFailure>)> {
    if input.name.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiFailure::new("name must not be empty", "E_EMPTY_NAME")),
        ));
    }
    let user = User {
        id: state.next_id.fetch_add(1, Ordering::SeqCst),
        name: input.name,
    };
    state.users.write().await.insert(user.id, user.clone());
    Ok((StatusCode::CREATED, Json(user)))
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(input): Json<UpdateUser>,
) -> Result<Json<User>, StatusCode> {
    let mut users = state.users.write().await;
    let user = users.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    if let Some(name) = input.name {
        user.name = name;
    }
    Ok(Json(user.clone()))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, StatusCode> {
    let mut users = state.users.write().await;
    users.remove(&id).map(|_| StatusCode::NO_CONTENT).ok_or(StatusCode::NOT_FOUND)
}

async fn echo(
    method: Method,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Echo> {
    let headers = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    Json(Echo {
        method: method.to_string(),
        query,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

#[derive(Deserialize)]
pub struct BlobParams {
    pub bytes: usize,
}

/// A JSON string of `bytes` ASCII characters, for exercising large bodies.
async fn blob(Query(params): Query<BlobParams>) -> impl IntoResponse {
    let body = format!("\"{}\"", "x".repeat(params.bytes));
    ([(header::CONTENT_TYPE, "application/json")], body)
}

fn new_token() -> String {
    format!("Bearer {}", Uuid::new_v4())
}

async fn open_session(State(state): State<AppState>) -> impl IntoResponse {
    let token = new_token();
    *state.session.write().await = Some(token.clone());
    (
        [(header::AUTHORIZATION, token.clone())],
        Json(Session { token }),
    )
}

/// Accepts the current token once and answers with its replacement.
async fn session_me(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let mut session = state.session.write().await;
    if presented.is_none() || session.as_deref() != presented {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ApiFailure::new("invalid token", "E_AUTH")),
        )
            .into_response();
    }
    let token = new_token();
    *session = Some(token.clone());
    (
        StatusCode::OK,
        [(header::AUTHORIZATION, token.clone())],
        Json(Session { token }),
    )
        .into_response()
}
