//! Minimal client for the Gradio HTTP API used by hosted Spaces.
//!
//! Flow:
//! 1. Resolve a Space id to its host (`/api/spaces/{id}/host` on the Hub)
//! 2. GET `/config` to confirm the app is up and learn its `api_prefix`
//! 3. POST `{prefix}/upload` for file inputs
//! 4. POST `{prefix}/call/{api}` → `event_id`
//! 5. GET `{prefix}/call/{api}/{event_id}` → server-sent events; the
//!    `complete` event carries the output array

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};
use uuid::Uuid;

use crate::speech::SpeechError;

#[derive(Debug, Clone)]
pub struct GradioOptions {
    pub hub_endpoint: String,
    pub hf_token: Option<String>,
    pub timeout: Duration,
}

impl Default for GradioOptions {
    fn default() -> Self {
        Self {
            hub_endpoint: "https://huggingface.co".to_string(),
            hf_token: None,
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GradioClient {
    http: reqwest::Client,
    base_url: String,
    api_prefix: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpaceHost {
    host: String,
}

#[derive(Debug, Deserialize)]
struct EventId {
    event_id: String,
}

impl GradioClient {
    /// Connect to a Space (`owner/name`) or to a Gradio app at a base URL.
    pub async fn connect(space: &str, options: &GradioOptions) -> Result<Self, SpeechError> {
        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|source| SpeechError::Transport {
                url: space.to_string(),
                source,
            })?;

        let mut client = Self {
            http,
            base_url: String::new(),
            api_prefix: String::new(),
            token: options.hf_token.clone(),
        };

        client.base_url = if is_url(space) {
            space.trim_end_matches('/').to_string()
        } else {
            client.resolve_space(space, &options.hub_endpoint).await?
        };

        let config: Value = client
            .send(client.request(Method::GET, format!("{}/config", client.base_url)))
            .await?
            .json()
            .await
            .map_err(|e| SpeechError::Decode(format!("app config: {e}")))?;
        client.api_prefix = config
            .get("api_prefix")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_string();

        info!(space, base_url = %client.base_url, api_prefix = %client.api_prefix, "connected to Gradio app");
        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn resolve_space(&self, space: &str, hub: &str) -> Result<String, SpeechError> {
        if space.split('/').count() != 2 {
            return Err(SpeechError::Resolve {
                space: space.to_string(),
                reason: "expected `owner/name` or a URL".to_string(),
            });
        }
        let url = format!("{}/api/spaces/{}/host", hub.trim_end_matches('/'), space);
        let host: SpaceHost = self
            .send(self.request(Method::GET, url))
            .await?
            .json()
            .await
            .map_err(|e| SpeechError::Resolve {
                space: space.to_string(),
                reason: e.to_string(),
            })?;
        debug!(space, host = %host.host, "resolved space host");
        Ok(host.host.trim_end_matches('/').to_string())
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, SpeechError> {
        let (client, request) = builder.build_split();
        let request = request.map_err(|source| SpeechError::Transport {
            url: String::new(),
            source,
        })?;
        let url = request.url().to_string();
        let response = client
            .execute(request)
            .await
            .map_err(|source| SpeechError::Transport {
                url: url.clone(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(SpeechError::Status {
                url,
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, self.api_prefix, path)
    }

    /// URL under which the app serves a file from its own storage.
    pub fn file_url(&self, server_path: &str) -> String {
        self.api_url(&format!("/file={server_path}"))
    }

    /// Upload a local file and return the `FileData` value referencing it.
    pub async fn upload(&self, path: &Path) -> Result<Value, SpeechError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.clone());
        let form = reqwest::multipart::Form::new().part("files", part);

        let paths: Vec<String> = self
            .send(self.request(Method::POST, self.api_url("/upload")).multipart(form))
            .await?
            .json()
            .await
            .map_err(|e| SpeechError::Decode(format!("upload response: {e}")))?;
        let server_path = paths
            .into_iter()
            .next()
            .ok_or_else(|| SpeechError::Decode("upload returned no paths".to_string()))?;

        debug!(%server_path, "uploaded file to Gradio app");
        Ok(json!({
            "path": server_path,
            "orig_name": file_name,
            "meta": {"_type": "gradio.FileData"},
        }))
    }

    /// Run one prediction and return its output values.
    pub async fn predict(&self, api_name: &str, data: Vec<Value>) -> Result<Vec<Value>, SpeechError> {
        let api = format!("/{}", api_name.trim_start_matches('/'));
        let call_url = self.api_url(&format!("/call{api}"));

        let EventId { event_id } = self
            .send(self.request(Method::POST, call_url.clone()).json(&json!({ "data": data })))
            .await?
            .json()
            .await
            .map_err(|e| SpeechError::Decode(format!("call response: {e}")))?;
        debug!(api_name = %api, %event_id, "prediction queued");

        let stream = self
            .send(self.request(Method::GET, format!("{call_url}/{event_id}")))
            .await?
            .text()
            .await
            .map_err(|source| SpeechError::Transport {
                url: call_url.clone(),
                source,
            })?;

        parse_event_stream(&stream).map_err(|message| SpeechError::Prediction {
            api_name: api,
            message,
        })
    }

    /// Download a file served by the app into `dir`.
    pub async fn download(&self, url: &str, dir: &Path) -> Result<PathBuf, SpeechError> {
        let bytes = self
            .send(self.request(Method::GET, url.to_string()))
            .await?
            .bytes()
            .await
            .map_err(|source| SpeechError::Transport {
                url: url.to_string(),
                source,
            })?;

        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(download_name(url));
        tokio::fs::write(&path, &bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "downloaded synthesis output");
        Ok(path)
    }
}

fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Collision-free local file name that keeps the remote extension.
fn download_name(url: &str) -> String {
    let last = url
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .rsplit(['/', '='])
        .next()
        .unwrap_or_default();
    let ext = Path::new(last)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("wav");
    format!("{}.{}", Uuid::new_v4(), ext)
}

/// Parse a server-sent event stream and return the `complete` event's data.
///
/// An `error` event, or a stream that ends without `complete`, is a failure.
pub(crate) fn parse_event_stream(body: &str) -> Result<Vec<Value>, String> {
    let normalized = body.replace("\r\n", "\n");

    for block in normalized.split("\n\n") {
        let mut event = "message";
        let mut data = Vec::new();
        for line in block.lines() {
            if let Some(name) = line.strip_prefix("event:") {
                event = name.trim();
            } else if let Some(payload) = line.strip_prefix("data:") {
                data.push(payload.strip_prefix(' ').unwrap_or(payload));
            }
        }
        let data = data.join("\n");

        match event {
            "complete" => {
                return match serde_json::from_str::<Value>(&data) {
                    Ok(Value::Array(values)) => Ok(values),
                    Ok(other) => Err(format!("complete event is not an array: {other}")),
                    Err(e) => Err(format!("complete event is not JSON: {e}")),
                };
            }
            "error" => {
                let detail = if data.is_empty() || data == "null" {
                    "app reported an error".to_string()
                } else {
                    data
                };
                return Err(detail);
            }
            _ => {}
        }
    }

    Err("event stream ended without a result".to_string())
}
