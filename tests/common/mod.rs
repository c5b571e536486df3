// Shared test helpers: scripted serial sources, temp topic, local HTTP sink
#![allow(dead_code)]

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::CONTENT_TYPE};
use axum::{Router, routing::post};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use waterlevel::error::PipelineError;
use waterlevel::serial::LineSource;
use waterlevel::topic::Topic;

pub const TOPIC: &str = "sensor-data";
pub const GROUP: &str = "aws-forwarder";

/// Line source that returns one scripted batch per drain, then empty batches.
pub struct ScriptedSource {
    batches: VecDeque<Result<Vec<String>, PipelineError>>,
    pub discards: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl ScriptedSource {
    pub fn new(batches: Vec<Vec<&str>>) -> Self {
        Self {
            batches: batches
                .into_iter()
                .map(|b| Ok(b.into_iter().map(String::from).collect()))
                .collect(),
            discards: Arc::new(AtomicUsize::new(0)),
            delay: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        let mut s = Self::new(vec![]);
        s.batches
            .push_back(Err(PipelineError::ReadFailure(message.to_string())));
        s
    }

    /// Every drain blocks for `delay` before returning.
    pub fn slow(delay: Duration) -> Self {
        let mut s = Self::new(vec![vec!["Sensor Value: 1"]]);
        s.delay = Some(delay);
        s
    }
}

impl LineSource for ScriptedSource {
    fn drain_lines(&mut self) -> Result<Vec<String>, PipelineError> {
        if let Some(d) = self.delay {
            std::thread::sleep(d);
        }
        self.batches.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    fn discard_input(&mut self) -> Result<(), PipelineError> {
        self.discards.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub async fn temp_topic(retention_days: u32) -> (TempDir, Arc<Topic>) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("topic.db");
    let topic = Topic::connect(path.to_str().unwrap(), retention_days)
        .await
        .unwrap();
    topic.init().await.unwrap();
    (dir, Arc::new(topic))
}

/// One request as seen by the sink: body and Content-Type header.
#[derive(Debug, Clone)]
pub struct Received {
    pub body: String,
    pub content_type: Option<String>,
}

pub struct TestSink {
    pub url: String,
    pub received: Arc<Mutex<Vec<Received>>>,
    pub status: Arc<AtomicU16>,
}

impl TestSink {
    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub fn bodies(&self) -> Vec<String> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.body.clone())
            .collect()
    }
}

type SinkState = (Arc<Mutex<Vec<Received>>>, Arc<AtomicU16>);

async fn ingest(
    State((received, status)): State<SinkState>,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    received.lock().unwrap().push(Received {
        body,
        content_type: headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
    });
    StatusCode::from_u16(status.load(Ordering::SeqCst)).unwrap()
}

/// Serves POST /ingest on an ephemeral local port, answering with `status`.
pub async fn spawn_sink(status: u16) -> TestSink {
    let received = Arc::new(Mutex::new(Vec::new()));
    let status = Arc::new(AtomicU16::new(status));
    let app = Router::new()
        .route("/ingest", post(ingest))
        .with_state((received.clone(), status.clone()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestSink {
        url: format!("http://{}/ingest", addr),
        received,
        status,
    }
}
