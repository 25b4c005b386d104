//! In-process mock of the GoodData platform
//!
//! Serves the login/token protocol and the resource endpoints on a random local port,
//! recording every request so tests can assert what reached the server.
#![allow(dead_code)]

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{AppendHeaders, IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use gooddata_client::{ClientConfig, GoodDataClient, Scheme};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

pub const USERNAME: &str = "analyst@example.com";
pub const PASSWORD: &str = "correct-horse";
pub const PROJECT: &str = "p1";
pub const DOMAIN: &str = "acme";
pub const ATTRIBUTE_URI: &str = "/gdc/md/p1/obj/41";

/// Knobs for making individual endpoints misbehave
#[derive(Debug, Clone, Default)]
pub struct Behaviour {
    pub login_vendor_error: bool,
    pub login_without_user_login: bool,
    pub login_omits_sst: bool,
    pub token_fails: bool,
    pub filter_response: Option<Value>,
    pub create_filter_response: Option<Value>,
    pub create_user_response: Option<Value>,
    pub project_users_response: Option<Value>,
    pub attribute: Option<Value>,
    pub elements_status: Option<u16>,
    pub elements_body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthenticatedCall {
    pub request: String,
    /// Login the temporary token was issued to
    pub login: String,
    pub body: Value,
}

#[derive(Default)]
struct Recorded {
    requests: Vec<String>,
    calls: Vec<AuthenticatedCall>,
    super_secure_tokens: HashMap<String, String>,
    temporary_tokens: HashMap<String, String>,
    issued: u32,
}

struct Inner {
    behaviour: Behaviour,
    recorded: Mutex<Recorded>,
}

type Shared = Arc<Inner>;

pub struct MockPlatform {
    pub addr: SocketAddr,
    state: Shared,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl MockPlatform {
    pub async fn start(behaviour: Behaviour) -> Self {
        init_tracing();

        let state = Arc::new(Inner {
            behaviour,
            recorded: Mutex::new(Recorded::default()),
        });

        let app = Router::new()
            .route("/gdc/account/login", post(login))
            .route("/gdc/account/token", get(token).post(token))
            .route("/gdc/md/:project/userfilters", post(user_filters))
            .route("/gdc/md/:project/obj", post(create_object))
            .route("/gdc/md/:project/obj/:id", get(get_object))
            .route("/gdc/md/:project/obj/:id/elements", get(elements))
            .route(
                "/gdc/account/domains/:domain/users",
                get(find_user).post(create_user),
            )
            .route("/gdc/projects/:project/users", post(add_project_user))
            .route("/gdc/account/profile/:id", delete(delete_profile))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind TCP listener");
        let addr = listener.local_addr().expect("Failed to get local address");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock platform stopped");
        });

        Self { addr, state }
    }

    pub fn config_for(&self, username: &str, password: &str) -> ClientConfig {
        ClientConfig::new(username, password)
            .with_host(self.addr.ip().to_string(), self.addr.port())
            .with_scheme(Scheme::Http)
            .with_project(PROJECT)
            .with_domain(DOMAIN)
    }

    pub fn config(&self) -> ClientConfig {
        self.config_for(USERNAME, PASSWORD)
    }

    pub fn client(&self) -> GoodDataClient {
        GoodDataClient::new(self.config()).expect("client")
    }

    pub fn requests(&self) -> Vec<String> {
        self.state.recorded.lock().unwrap().requests.clone()
    }

    /// Requests other than login and token exchange
    pub fn resource_requests(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| !r.ends_with("/gdc/account/login") && !r.ends_with("/gdc/account/token"))
            .collect()
    }

    pub fn calls(&self) -> Vec<AuthenticatedCall> {
        self.state.recorded.lock().unwrap().calls.clone()
    }

    pub fn last_body(&self) -> Option<Value> {
        self.calls().last().map(|c| c.body.clone())
    }

    pub fn login_count(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.ends_with("/gdc/account/login"))
            .count()
    }
}

fn record(state: &Shared, method: &Method, uri: &Uri) {
    state
        .recorded
        .lock()
        .unwrap()
        .requests
        .push(format!("{} {}", method, uri));
}

fn cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"message": "Authorization required"})),
    )
        .into_response()
}

/// Resolve the temporary token to its login and log the call, or reject it
fn authenticate(
    state: &Shared,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Value,
) -> Result<String, Response> {
    record(state, method, uri);
    let mut recorded = state.recorded.lock().unwrap();
    let login = cookie(headers, "GDCAuthTT")
        .and_then(|tt| recorded.temporary_tokens.get(tt).cloned())
        .ok_or_else(unauthorized)?;
    recorded.calls.push(AuthenticatedCall {
        request: format!("{} {}", method, uri),
        login: login.clone(),
        body,
    });
    Ok(login)
}

async fn login(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    Json(body): Json<Value>,
) -> Response {
    record(&state, &method, &uri);
    let behaviour = &state.behaviour;

    if behaviour.login_vendor_error {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": {
                "errorClass": "GDC::Exception::User",
                "message": "Login %s is locked",
                "parameters": [USERNAME]
            }})),
        )
            .into_response();
    }

    let login = body["postUserLogin"]["login"].as_str().unwrap_or_default().to_string();
    let password = body["postUserLogin"]["password"].as_str().unwrap_or_default();
    if password != PASSWORD || body["postUserLogin"]["remember"] != json!(1) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "parameters": [],
                "component": "Account::Login::AuthShare",
                "message": "Bad Login or Password!"
            })),
        )
            .into_response();
    }

    let sst = {
        let mut recorded = state.recorded.lock().unwrap();
        recorded.issued += 1;
        let sst = format!("sst-{}", recorded.issued);
        recorded.super_secure_tokens.insert(sst.clone(), login.clone());
        sst
    };

    let body = if behaviour.login_without_user_login {
        json!({})
    } else {
        json!({"userLogin": {"profile": format!("/gdc/account/profile/{}", login), "state": "/gdc/account/login/1"}})
    };

    if behaviour.login_omits_sst {
        return Json(body).into_response();
    }

    (
        AppendHeaders([
            (
                header::SET_COOKIE,
                format!("GDCAuthSST={}; Path=/gdc/account; Secure; HttpOnly", sst),
            ),
            (
                header::SET_COOKIE,
                "GDCAuthTT=; Path=/gdc; Max-Age=0".to_string(),
            ),
        ]),
        Json(body),
    )
        .into_response()
}

async fn token(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    record(&state, &method, &uri);
    if state.behaviour.token_fails {
        return unauthorized();
    }

    let tt = {
        let mut recorded = state.recorded.lock().unwrap();
        let Some(login) = cookie(&headers, "GDCAuthSST")
            .and_then(|sst| recorded.super_secure_tokens.get(sst).cloned())
        else {
            return unauthorized();
        };
        recorded.issued += 1;
        let tt = format!("tt-{}", recorded.issued);
        recorded.temporary_tokens.insert(tt.clone(), login);
        tt
    };

    (
        AppendHeaders([(
            header::SET_COOKIE,
            format!("GDCAuthTT={}; Path=/gdc; HttpOnly; Secure", tt),
        )]),
        Json(json!({"userToken": {"token": tt}})),
    )
        .into_response()
}

async fn user_filters(
    State(state): State<Shared>,
    Path(_project): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = authenticate(&state, &method, &uri, &headers, body.clone()) {
        return rejection;
    }
    let response = state.behaviour.filter_response.clone().unwrap_or_else(|| {
        let user = body["userFilters"]["items"][0]["user"].clone();
        json!({"userFiltersUpdateResult": {"successful": [user], "failed": []}})
    });
    Json(response).into_response()
}

async fn create_object(
    State(state): State<Shared>,
    Path(project): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = authenticate(&state, &method, &uri, &headers, body) {
        return rejection;
    }
    let response = state
        .behaviour
        .create_filter_response
        .clone()
        .unwrap_or_else(|| json!({"uri": format!("/gdc/md/{}/obj/900", project)}));
    Json(response).into_response()
}

fn default_attribute(project: &str, id: &str) -> Value {
    json!({
        "content": {
            "displayForms": [{
                "content": {"formOf": format!("/gdc/md/{}/obj/{}", project, id)},
                "links": {"elements": format!("/gdc/md/{}/obj/{}/elements", project, id)},
                "meta": {"title": "Quarter (Label)", "category": "attributeDisplayForm"}
            }],
            "type": "GDC.time.quarter"
        },
        "meta": {"title": "Quarter", "uri": format!("/gdc/md/{}/obj/{}", project, id), "category": "attribute"}
    })
}

async fn get_object(
    State(state): State<Shared>,
    Path((project, id)): Path<(String, String)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = authenticate(&state, &method, &uri, &headers, Value::Null) {
        return rejection;
    }
    if id == "404" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": {
                "errorClass": "GDC::Exception::NotFound",
                "message": "Object %s not found",
                "parameters": [id]
            }})),
        )
            .into_response();
    }
    let attribute = state
        .behaviour
        .attribute
        .clone()
        .unwrap_or_else(|| default_attribute(&project, &id));
    Json(json!({ "attribute": attribute })).into_response()
}

pub fn elements_document(project: &str, id: &str, titles: &[&str]) -> String {
    let elements: Vec<Value> = titles
        .iter()
        .enumerate()
        .map(|(i, title)| {
            json!({
                "title": title,
                "uri": format!("/gdc/md/{}/obj/{}/elements?id={}", project, id, i + 1)
            })
        })
        .collect();
    json!({
        "attributeElements": {
            "elementsMeta": {"count": elements.len(), "offset": 0, "elements": ["Q2"]},
            "elements": elements,
            "paging": {"total": elements.len(), "count": elements.len(), "offset": 0}
        }
    })
    .to_string()
}

async fn elements(
    State(state): State<Shared>,
    Path((project, id)): Path<(String, String)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = authenticate(&state, &method, &uri, &headers, Value::Null) {
        return rejection;
    }
    if let Some(status) = state.behaviour.elements_status {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, "<html>upstream failure</html>").into_response();
    }

    let document = state
        .behaviour
        .elements_body
        .clone()
        .unwrap_or_else(|| elements_document(&project, &id, &["Q1", "Q3"]));

    // Small chunks so the client sees the array split across many reads
    let chunks: Vec<Result<Vec<u8>, std::io::Error>> = document
        .into_bytes()
        .chunks(7)
        .map(|c| Ok(c.to_vec()))
        .collect();
    Response::builder()
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from_stream(futures::stream::iter(chunks)))
        .unwrap()
}

async fn find_user(
    State(state): State<Shared>,
    Path(domain): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = authenticate(&state, &method, &uri, &headers, Value::Null) {
        return rejection;
    }
    let login = query.get("login").cloned().unwrap_or_default();
    Json(json!({
        "accountSettings": {
            "items": [{
                "accountSetting": {
                    "login": login,
                    "email": login,
                    "firstName": "Jane",
                    "lastName": "Doe",
                    "position": "Analyst",
                    "links": {"self": "/gdc/account/profile/abc123", "projects": "/gdc/account/profile/abc123/projects"}
                }
            }],
            "paging": {"offset": 0, "count": 1, "domain": domain}
        }
    }))
    .into_response()
}

async fn create_user(
    State(state): State<Shared>,
    Path(_domain): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = authenticate(&state, &method, &uri, &headers, body) {
        return rejection;
    }
    let response = state
        .behaviour
        .create_user_response
        .clone()
        .unwrap_or_else(|| json!({"uri": "/gdc/account/profile/new-user-1"}));
    (StatusCode::CREATED, Json(response)).into_response()
}

async fn add_project_user(
    State(state): State<Shared>,
    Path(_project): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = authenticate(&state, &method, &uri, &headers, body.clone()) {
        return rejection;
    }
    let response = state.behaviour.project_users_response.clone().unwrap_or_else(|| {
        json!({"projectUsersUpdateResult": {
            "successful": [body["user"]["links"]["self"].clone()],
            "failed": []
        }})
    });
    Json(response).into_response()
}

async fn delete_profile(
    State(state): State<Shared>,
    Path(_id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = authenticate(&state, &method, &uri, &headers, Value::Null) {
        return rejection;
    }
    StatusCode::NO_CONTENT.into_response()
}
