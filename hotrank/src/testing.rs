//! In-memory transport for unit tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::client::JsonTransport;
use crate::error::AttemptError;

#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    Status(u16),
    Network,
}

impl Reply {
    fn into_result(self) -> Result<Value, AttemptError> {
        match self {
            Reply::Json(value) => Ok(value),
            Reply::Status(code) => Err(AttemptError::Status(code)),
            Reply::Network => Err(AttemptError::Network("connection reset".to_string())),
        }
    }
}

/// Replies are keyed by URL plus sorted query parameters. Each route plays
/// its replies in order and keeps repeating the last one; unknown routes
/// answer 404.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, url: &str, params: &[(&str, &str)], replies: Vec<Reply>) {
        let params: Vec<(&str, String)> = params.iter().map(|(k, v)| (*k, v.to_string())).collect();
        self.routes
            .lock()
            .unwrap()
            .insert(route_key(url, &params), replies.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of requests whose key starts with `prefix`.
    pub fn calls_to(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|key| key.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl JsonTransport for FakeTransport {
    async fn get_json(&self, url: &str, params: &[(&str, String)]) -> Result<Value, AttemptError> {
        let key = route_key(url, params);
        self.calls.lock().unwrap().push(key.clone());

        let reply = {
            let mut routes = self.routes.lock().unwrap();
            match routes.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        reply.unwrap_or(Reply::Status(404)).into_result()
    }
}

fn route_key(url: &str, params: &[(&str, String)]) -> String {
    let mut pairs: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
    pairs.sort();
    if pairs.is_empty() {
        url.to_string()
    } else {
        format!("{url}?{}", pairs.join("&"))
    }
}
