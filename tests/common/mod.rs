//! Scripted catalog client shared by the scenario tests

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use gce_provisioner::gcp::CatalogClient;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Responses are matched on the path without its query string and served in
/// order; the last one repeats.
#[derive(Default)]
pub struct ScriptedClient {
    project: String,
    responses: Mutex<HashMap<(String, String), VecDeque<Result<Value, String>>>>,
    calls: Mutex<Vec<(String, String)>>,
    bodies: Mutex<Vec<(String, Value)>>,
}

impl ScriptedClient {
    pub fn new(project: &str) -> Self {
        Self {
            project: project.to_string(),
            ..Default::default()
        }
    }

    pub fn respond(&self, verb: &str, path: &str, response: Value) {
        self.push(verb, path, Ok(response));
    }

    pub fn fail(&self, verb: &str, path: &str, message: &str) {
        self.push(verb, path, Err(message.to_string()));
    }

    fn push(&self, verb: &str, path: &str, response: Result<Value, String>) {
        self.responses
            .lock()
            .unwrap()
            .entry((verb.to_string(), path.to_string()))
            .or_default()
            .push_back(response);
    }

    /// Number of calls whose path (without query) equals `path`
    pub fn calls_to(&self, verb: &str, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(v, p)| v == verb && p.split('?').next() == Some(path))
            .count()
    }

    /// Body of the last POST to `path`
    pub fn last_body(&self, path: &str) -> Option<Value> {
        self.bodies
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(p, _)| p.split('?').next() == Some(path))
            .map(|(_, body)| body.clone())
    }

    fn next(&self, verb: &str, path: &str) -> Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((verb.to_string(), path.to_string()));

        let key = (
            verb.to_string(),
            path.split('?').next().unwrap_or(path).to_string(),
        );
        let mut responses = self.responses.lock().unwrap();
        let queue = responses
            .get_mut(&key)
            .ok_or_else(|| anyhow!("API request failed: 404 Not Found - unscripted {} {}", verb, path))?;
        let response = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        response
            .ok_or_else(|| anyhow!("API request failed: 404 Not Found"))?
            .map_err(|message| anyhow!(message))
    }
}

#[async_trait]
impl CatalogClient for ScriptedClient {
    async fn get(&self, path: &str) -> Result<Value> {
        self.next("GET", path)
    }

    async fn get_url(&self, url: &str) -> Result<Value> {
        let path = url
            .strip_prefix(gce_provisioner::gcp::client::COMPUTE_BASE_URL)
            .unwrap_or(url);
        self.next("GET", path)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.bodies
            .lock()
            .unwrap()
            .push((path.to_string(), body.clone()));
        self.next("POST", path)
    }

    fn project_id(&self) -> &str {
        &self.project
    }
}
