//! Scripted in-memory catalog client for unit tests

use crate::gcp::client::{CatalogClient, COMPUTE_BASE_URL};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

type Script = HashMap<String, VecDeque<std::result::Result<Value, String>>>;

/// Responses are queued per path; the last queued response repeats.
pub struct FakeClient {
    project: String,
    gets: Mutex<Script>,
    posts: Mutex<Script>,
    get_log: Mutex<Vec<String>>,
    post_log: Mutex<Vec<(String, Value)>>,
}

impl FakeClient {
    pub fn new(project: &str) -> Self {
        Self {
            project: project.to_string(),
            gets: Mutex::new(HashMap::new()),
            posts: Mutex::new(HashMap::new()),
            get_log: Mutex::new(Vec::new()),
            post_log: Mutex::new(Vec::new()),
        }
    }

    pub fn on_get(&self, path: &str, response: Value) {
        push(&self.gets, path, Ok(response));
    }

    pub fn on_get_error(&self, path: &str, message: &str) {
        push(&self.gets, path, Err(message.to_string()));
    }

    pub fn on_post(&self, path: &str, response: Value) {
        push(&self.posts, path, Ok(response));
    }

    pub fn on_post_error(&self, path: &str, message: &str) {
        push(&self.posts, path, Err(message.to_string()));
    }

    pub fn get_count(&self) -> usize {
        self.get_log.lock().unwrap().len()
    }

    pub fn gets(&self) -> Vec<String> {
        self.get_log.lock().unwrap().clone()
    }

    pub fn posts(&self) -> Vec<(String, Value)> {
        self.post_log.lock().unwrap().clone()
    }
}

fn push(script: &Mutex<Script>, path: &str, response: std::result::Result<Value, String>) {
    script
        .lock()
        .unwrap()
        .entry(path.to_string())
        .or_default()
        .push_back(response);
}

fn respond(script: &Mutex<Script>, path: &str) -> Result<Value> {
    let mut script = script.lock().unwrap();
    let without_query = path.split('?').next().unwrap_or(path);
    let queue = match script.contains_key(path) {
        true => script.get_mut(path),
        false => script.get_mut(without_query),
    };
    let Some(queue) = queue else {
        return Err(anyhow::anyhow!(
            "API request failed: 404 Not Found - no scripted response for {}",
            path
        ));
    };
    let response = if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    };
    match response {
        Some(Ok(value)) => Ok(value),
        Some(Err(message)) => Err(anyhow::anyhow!(message)),
        None => Err(anyhow::anyhow!("API request failed: 404 Not Found")),
    }
}

#[async_trait]
impl CatalogClient for FakeClient {
    async fn get(&self, path: &str) -> Result<Value> {
        self.get_log.lock().unwrap().push(path.to_string());
        respond(&self.gets, path)
    }

    async fn get_url(&self, url: &str) -> Result<Value> {
        let path = url.strip_prefix(COMPUTE_BASE_URL).unwrap_or(url);
        self.get(path).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.post_log
            .lock()
            .unwrap()
            .push((path.to_string(), body.clone()));
        respond(&self.posts, path)
    }

    fn project_id(&self) -> &str {
        &self.project
    }
}

/// `my-vm-01` in us-central1-a on e2-medium, booting the debian-12 family
pub fn minimal_config() -> crate::provision::model::ProvisioningConfig {
    serde_json::from_value(serde_json::json!({
        "instanceName": "my-vm-01",
        "zone": "us-central1-a",
        "machineType": "e2-medium",
        "bootDisk": {
            "source": {
                "sourceType": "publicImage",
                "imageProject": "debian-cloud",
                "image": {"family": "debian-12"}
            }
        }
    }))
    .unwrap()
}
