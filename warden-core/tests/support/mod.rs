//! Shared fixtures for warden-core integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde_json::{Value, json};
use warden_config::Config;
use warden_core::{
    ApiRequest, ApiResponse, HttpTransport, MemoryTokenStore, RequestBody, Session,
    SessionEventBus, SessionEventKind, Subscription, Token, TokenPair, TokenStore,
    TransportError,
};

pub const BASE_URL: &str = "http://api.test";
pub const REFRESH_PATH: &str = "/auth/refresh/";
pub const LOGIN_PATH: &str = "/auth/login/";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Signed JWT expiring `expires_in` from now, issued an hour before that.
pub fn mint(subject: &str, expires_in: TimeDelta) -> Token {
    let exp = Utc::now() + expires_in;
    let claims = json!({
        "sub": subject,
        "iat": (exp - TimeDelta::hours(1)).timestamp(),
        "exp": exp.timestamp(),
    });
    let raw = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"test-secret"),
    )
    .expect("encode test token");
    Token::new(raw)
}

pub fn pair(access_expires_in: TimeDelta) -> TokenPair {
    TokenPair {
        access: mint("user-1", access_expires_in),
        refresh: Token::new("refresh-1"),
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.api.base_url = BASE_URL.to_string();
    config.api.request_timeout = Duration::from_secs(5);
    config.refresh.timeout = Duration::from_secs(5);
    config.storage.path = None;
    config
}

pub fn json_response(status: u16, body: Value) -> ApiResponse {
    let status = StatusCode::from_u16(status).expect("valid status");
    ApiResponse::new(status, serde_json::to_vec(&body).expect("json body"))
}

pub fn status_response(status: u16) -> ApiResponse {
    ApiResponse::new(StatusCode::from_u16(status).expect("valid status"), Vec::new())
}

/// What the transport saw for one call
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: reqwest::Method,
    pub path: String,
    pub bearer: Option<String>,
    pub content_type: Option<String>,
    pub body: RequestBody,
}

type Responder =
    dyn Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync;

/// Call-counting transport answering from a closure
pub struct ScriptedTransport {
    responder: Box<Responder>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<Recorded>>,
}

impl fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedTransport")
            .field("calls", &self.calls.lock().len())
            .finish()
    }
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delays: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Hold every response for `path` back by `delay`.
    pub fn with_delay(mut self, path: &str, delay: Duration) -> Self {
        self.delays.insert(path.to_string(), delay);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.path == path).count()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.path == path)
            .cloned()
            .collect()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }
}

pub fn path_of(request: &ApiRequest) -> String {
    url::Url::parse(&request.url)
        .map(|url| url.path().to_string())
        .unwrap_or_else(|_| request.url.clone())
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let path = path_of(&request);
        self.calls.lock().push(Recorded {
            method: request.method.clone(),
            path: path.clone(),
            bearer: request.bearer().map(str::to_string),
            content_type: request
                .headers
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body: request.body.clone(),
        });

        if let Some(delay) = self.delays.get(&path) {
            tokio::time::sleep(*delay).await;
        }

        (self.responder)(&request)
    }
}

/// Responder for a refresh endpoint that always hands out `access`.
pub fn refresh_with(
    access: Token,
) -> impl Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync + 'static
{
    move |request: &ApiRequest| match path_of(request).as_str() {
        REFRESH_PATH => Ok(json_response(200, json!({ "access": access.as_str() }))),
        _ => Ok(status_response(404)),
    }
}

/// A session over a scripted transport and an inspectable memory store.
pub struct Harness {
    pub store: Arc<MemoryTokenStore>,
    pub transport: Arc<ScriptedTransport>,
    pub session: Session,
}

impl Harness {
    pub fn new(config: Config, transport: ScriptedTransport) -> Self {
        init_logging();
        let store = Arc::new(MemoryTokenStore::new());
        let transport = transport.shared();
        let session = Session::new(
            config,
            Arc::clone(&store) as Arc<dyn TokenStore>,
            Arc::clone(&transport) as Arc<dyn HttpTransport>,
        );
        Self {
            store,
            transport,
            session,
        }
    }

    /// Seed the store directly, without starting the monitor.
    pub fn seed(&self, pair: &TokenPair) {
        self.session
            .coordinator()
            .establish(pair)
            .expect("seed token store");
    }
}

/// Count events of `kind`; keep the returned subscription alive.
pub fn count_events(
    bus: &SessionEventBus,
    kind: SessionEventKind,
) -> (Subscription, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&hits);
    let subscription = bus.subscribe(kind, move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    (subscription, hits)
}

/// Wait until `check` holds, giving background tasks a chance to run.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Poll `future` exactly once without yielding to the runtime, so tasks it
/// spawns have not started yet when this returns. Needs a current-thread
/// runtime to hold.
pub fn poll_once<F: Future + ?Sized>(future: Pin<&mut F>) -> Poll<F::Output> {
    future.poll(&mut Context::from_waker(Waker::noop()))
}
