#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use api_lib::adapters::MemoryAdapter;
use api_lib::config::Config;
use api_lib::web::{router, AppState};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use futures::stream;
use http_body_util::BodyExt;
use reading_club_core::domain::Conversation;
use reading_club_core::ports::{
    GenerationRequest, PortError, PortResult, TextGenerationService, TokenStream,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const SESSION_ID: &str = "test-session";

/// A generation backend with canned output that records every request.
///
/// Blocking calls return `"<reply> #<n>"` so repeated generations are
/// distinguishable; streams yield the configured deltas in order.
pub struct ScriptedGenerator {
    reply: String,
    deltas: Vec<String>,
    fail: bool,
    calls: AtomicUsize,
    stream_calls: AtomicUsize,
    requests: std::sync::Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(reply: &str, deltas: &[&str]) -> Self {
        Self {
            reply: reply.to_string(),
            deltas: deltas.iter().map(|d| d.to_string()).collect(),
            fail: false,
            calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("", &[])
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    fn record(&self, request: GenerationRequest) -> PortResult<()> {
        self.requests.lock().unwrap().push(request);
        if self.fail {
            return Err(PortError::GenerationUnavailable(
                "upstream returned 529 overloaded".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TextGenerationService for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> PortResult<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.record(request)?;
        Ok(format!("{} #{}", self.reply, n))
    }

    async fn generate_stream(&self, request: GenerationRequest) -> PortResult<TokenStream> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.record(request)?;
        let items: Vec<PortResult<String>> = self.deltas.iter().cloned().map(Ok).collect();
        Ok(Box::pin(stream::iter(items)))
    }
}

/// The full application over in-memory storage, with one signed-in user.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryAdapter>,
    pub generator: Arc<ScriptedGenerator>,
    pub user_id: Uuid,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(
            Config::default(),
            ScriptedGenerator::new("A close reading", &["What ", "stayed ", "with you?"]),
        )
    }

    pub fn with(config: Config, generator: ScriptedGenerator) -> Self {
        let store = Arc::new(MemoryAdapter::new());
        let user_id = Uuid::new_v4();
        store.insert_auth_session(SESSION_ID, user_id);
        let generator = Arc::new(generator);

        let state = AppState::new(
            Arc::new(config),
            store.clone(),
            store.clone(),
            store.clone(),
            generator.clone(),
        );

        Self {
            router: router(Arc::new(state)),
            store,
            generator,
            user_id,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_json(&self, path: &str, body: Value, signed_in: bool) -> Response<Body> {
        self.send(json_request(path, body, signed_in, None)).await
    }

    /// Waits for a conversation of the signed-in user to hold `messages`
    /// messages. Completed replies are saved in the background.
    pub async fn saved_conversation(&self, id: Uuid, messages: usize) -> Conversation {
        for _ in 0..200 {
            if let Some(conversation) = self.store.conversation(id, self.user_id) {
                if conversation.messages.len() == messages {
                    return conversation;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("conversation {id} never reached {messages} messages");
    }

    pub async fn get(&self, path: &str, signed_in: bool) -> Response<Body> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if signed_in {
            builder = builder.header(header::COOKIE, format!("session={SESSION_ID}"));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }
}

pub fn json_request(
    path: &str,
    body: Value,
    signed_in: bool,
    forwarded_for: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if signed_in {
        builder = builder.header(header::COOKIE, format!("session={SESSION_ID}"));
    }
    if let Some(ip) = forwarded_for {
        builder = builder.header("x-forwarded-for", ip);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

/// The `text` of every `data:` frame in an event-stream body.
pub fn sse_texts(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| {
            let frame: Value = serde_json::from_str(data.trim_start()).unwrap();
            frame["text"].as_str().unwrap().to_string()
        })
        .collect()
}
