//! Typed REST client for the agent backend.

mod types;

pub use types::*;

use crate::agent::AgentConfigMeta;
use crate::config::ApiConfig;
use reqwest::{header, multipart, Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Status { status: StatusCode, message: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status(),
            _ => None,
        }
    }
}

/// Decoded response body: JSON when the server says so, text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiBody {
    Json(Value),
    Text(String),
}

impl ApiBody {
    pub fn into_json(self) -> Value {
        match self {
            ApiBody::Json(v) => v,
            ApiBody::Text(t) => Value::String(t),
        }
    }

    pub fn decode<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        match self {
            ApiBody::Json(v) => serde_json::from_value(v).map_err(|e| ApiError::Decode(e.to_string())),
            ApiBody::Text(t) => serde_json::from_str(&t).map_err(|e| ApiError::Decode(e.to_string())),
        }
    }
}

#[derive(Clone)]
pub struct ApiClient {
    base: Url,
    token: Option<String>,
    client: Client,
    // No total timeout: event streams stay open indefinitely.
    stream_client: Client,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let mut base = Url::parse(&config.base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder().timeout(timeout).build()?;
        let stream_client = Client::builder().connect_timeout(timeout).build()?;
        Ok(Self {
            base,
            token: config.token.clone().filter(|t| !t.is_empty()),
            client,
            stream_client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// URL of `segments` under the base; each segment is percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Request with auth applied.
    pub fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.endpoint(segments);
        debug!("{} {}", method, url);
        self.authorize(self.client.request(method, url))
    }

    /// `GET /sse/{agent}` as a long-lived event stream request.
    pub fn event_stream_request(&self, agent: &str) -> RequestBuilder {
        let url = self.endpoint(&["sse", agent]);
        debug!("SSE {}", url);
        self.authorize(
            self.stream_client
                .get(url)
                .header(header::ACCEPT, "text/event-stream"),
        )
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<ApiBody, ApiError> {
        handle_response(builder.send().await?).await
    }

    async fn get(&self, segments: &[&str]) -> Result<ApiBody, ApiError> {
        self.send(self.request(Method::GET, segments)).await
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> Result<ApiBody, ApiError> {
        self.send(self.request(method, segments).json(body)).await
    }

    // ========================================================================
    // Agents
    // ========================================================================

    pub async fn list_agents(&self) -> Result<AgentList, ApiError> {
        self.get(&["api", "agents"]).await?.decode()
    }

    pub async fn agent_details(&self, name: &str) -> Result<Value, ApiError> {
        Ok(self.get(&["api", "agent", name]).await?.into_json())
    }

    pub async fn agent_config(&self, name: &str) -> Result<Value, ApiError> {
        Ok(self.get(&["api", "agent", name, "config"]).await?.into_json())
    }

    pub async fn update_agent_config(&self, name: &str, config: &Value) -> Result<ApiBody, ApiError> {
        self.send_json(Method::PUT, &["api", "agent", name, "config"], config)
            .await
    }

    pub async fn create_agent(&self, config: &Value) -> Result<ApiBody, ApiError> {
        self.send_json(Method::POST, &["create"], config).await
    }

    pub async fn delete_agent(&self, name: &str) -> Result<ApiBody, ApiError> {
        self.send(self.request(Method::DELETE, &["api", "agent", name]))
            .await
    }

    pub async fn pause_agent(&self, name: &str) -> Result<ApiBody, ApiError> {
        self.send_json(Method::PUT, &["api", "agent", name, "pause"], &json!({}))
            .await
    }

    pub async fn start_agent(&self, name: &str) -> Result<ApiBody, ApiError> {
        self.send_json(Method::PUT, &["api", "agent", name, "start"], &json!({}))
            .await
    }

    pub async fn status_history(&self, name: &str) -> Result<StatusHistory, ApiError> {
        self.get(&["api", "agent", name, "status"]).await?.decode()
    }

    pub async fn agent_meta(&self) -> Result<AgentConfigMeta, ApiError> {
        self.get(&["api", "meta", "agent", "config"]).await?.decode()
    }

    /// Legacy server-rendered connector form (HTML fragment).
    pub async fn connector_form(&self, connector_type: &str) -> Result<String, ApiError> {
        match self
            .get(&["settings", "connector", "form", connector_type])
            .await?
        {
            ApiBody::Text(html) => Ok(html),
            ApiBody::Json(v) => Ok(v.to_string()),
        }
    }

    pub async fn export_agent(&self, name: &str) -> Result<Value, ApiError> {
        Ok(self.get(&["settings", "export", name]).await?.into_json())
    }

    /// Upload an exported agent file.
    pub async fn import_agent(&self, file_name: &str, contents: Vec<u8>) -> Result<ApiBody, ApiError> {
        let part = multipart::Part::bytes(contents)
            .file_name(file_name.to_string())
            .mime_str("application/json")?;
        let form = multipart::Form::new().part("file", part);
        self.send(
            self.request(Method::POST, &["settings", "import"])
                .multipart(form),
        )
        .await
    }

    // ========================================================================
    // Groups
    // ========================================================================

    pub async fn generate_profiles(&self, description: &str) -> Result<Vec<GroupProfile>, ApiError> {
        self.send_json(
            Method::POST,
            &["api", "agent", "group", "generateProfiles"],
            &json!({ "description": description }),
        )
        .await?
        .decode()
    }

    pub async fn create_group(
        &self,
        profiles: &[GroupProfile],
        agent_config: &Value,
    ) -> Result<ApiBody, ApiError> {
        self.send_json(
            Method::POST,
            &["api", "agent", "group", "create"],
            &json!({ "agents": profiles, "agent_config": agent_config }),
        )
        .await
    }

    // ========================================================================
    // Chat
    // ========================================================================

    pub async fn send_message(&self, name: &str, message: &str) -> Result<ApiBody, ApiError> {
        self.send_json(Method::POST, &["chat", name], &json!({ "message": message }))
            .await
    }

    pub async fn send_notification(&self, name: &str, message: &str) -> Result<ApiBody, ApiError> {
        self.send(
            self.request(Method::POST, &["notify", name])
                .form(&[("message", message)]),
        )
        .await
    }

    pub async fn chat_history(&self, name: &str) -> Result<Value, ApiError> {
        Ok(self.get(&["api", "agent", name, "chat"]).await?.into_json())
    }

    pub async fn clear_chat(&self, name: &str) -> Result<ApiBody, ApiError> {
        self.send(self.request(Method::DELETE, &["api", "agent", name, "chat"]))
            .await
    }

    pub async fn usage(&self) -> Result<Value, ApiError> {
        Ok(self.get(&["api", "usage"]).await?.into_json())
    }

    // ========================================================================
    // Actions
    // ========================================================================

    pub async fn list_actions(&self) -> Result<Value, ApiError> {
        Ok(self.get(&["actions"]).await?.into_json())
    }

    pub async fn run_action(&self, action: &str, run: &ActionRun) -> Result<Value, ApiError> {
        Ok(self
            .send_json(Method::POST, &["action", action, "run"], run)
            .await?
            .into_json())
    }

    // ========================================================================
    // Knowledge base
    // ========================================================================

    pub async fn list_collections(&self) -> Result<Vec<String>, ApiError> {
        let body = self.get(&["api", "collections"]).await?.into_json();
        // Either a bare list or {"collections": [...]}.
        let list = body.get("collections").cloned().unwrap_or(body);
        serde_json::from_value(list).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn create_collection(&self, name: &str) -> Result<ApiBody, ApiError> {
        self.send_json(Method::POST, &["api", "collections"], &json!({ "name": name }))
            .await
    }

    pub async fn search_collection(
        &self,
        collection: &str,
        search: &CollectionSearch,
    ) -> Result<Value, ApiError> {
        Ok(self
            .send_json(Method::POST, &["api", "collections", collection, "search"], search)
            .await?
            .into_json())
    }

    pub async fn collection_sources(&self, collection: &str) -> Result<Vec<CollectionSource>, ApiError> {
        let body = self
            .get(&["api", "collections", collection, "sources"])
            .await?
            .into_json();
        let list = body.get("sources").cloned().unwrap_or(body);
        serde_json::from_value(list).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn add_collection_source(
        &self,
        collection: &str,
        source: &CollectionSource,
    ) -> Result<ApiBody, ApiError> {
        self.send_json(Method::POST, &["api", "collections", collection, "sources"], source)
            .await
    }

    pub async fn remove_collection_source(&self, collection: &str, url: &str) -> Result<ApiBody, ApiError> {
        self.send_json(
            Method::DELETE,
            &["api", "collections", collection, "sources"],
            &json!({ "url": url }),
        )
        .await
    }

    pub async fn collection_entries(&self, collection: &str) -> Result<Value, ApiError> {
        Ok(self
            .get(&["api", "collections", collection, "entries"])
            .await?
            .into_json())
    }

    pub async fn delete_collection_entry(&self, collection: &str, entry: &str) -> Result<ApiBody, ApiError> {
        self.send_json(
            Method::DELETE,
            &["api", "collections", collection, "entry", "delete"],
            &json!({ "entry": entry }),
        )
        .await
    }

    pub async fn reset_collection(&self, collection: &str) -> Result<ApiBody, ApiError> {
        self.send(self.request(Method::POST, &["api", "collections", collection, "reset"]))
            .await
    }

    pub async fn upload_to_collection(
        &self,
        collection: &str,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<ApiBody, ApiError> {
        let form = multipart::Form::new().part(
            "file",
            multipart::Part::bytes(contents).file_name(file_name.to_string()),
        );
        self.send(
            self.request(Method::POST, &["api", "collections", collection, "upload"])
                .multipart(form),
        )
        .await
    }

    // ========================================================================
    // Skills
    // ========================================================================

    pub async fn list_skills(&self) -> Result<Vec<Skill>, ApiError> {
        self.get(&["api", "skills"]).await?.decode()
    }

    pub async fn get_skill(&self, name: &str) -> Result<Skill, ApiError> {
        self.get(&["api", "skills", name]).await?.decode()
    }

    pub async fn create_skill(&self, skill: &Skill) -> Result<ApiBody, ApiError> {
        self.send_json(Method::POST, &["api", "skills"], skill).await
    }

    pub async fn update_skill(&self, name: &str, skill: &Skill) -> Result<ApiBody, ApiError> {
        self.send_json(Method::PUT, &["api", "skills", name], skill)
            .await
    }

    pub async fn delete_skill(&self, name: &str) -> Result<ApiBody, ApiError> {
        self.send(self.request(Method::DELETE, &["api", "skills", name]))
            .await
    }

    pub async fn list_git_repos(&self) -> Result<Vec<GitRepo>, ApiError> {
        self.get(&["api", "skills", "git-repos"]).await?.decode()
    }

    pub async fn add_git_repo(&self, url: &str) -> Result<ApiBody, ApiError> {
        self.send_json(Method::POST, &["api", "skills", "git-repos"], &json!({ "url": url }))
            .await
    }

    pub async fn sync_git_repo(&self, id: &str) -> Result<ApiBody, ApiError> {
        self.send(self.request(Method::POST, &["api", "skills", "git-repos", id, "sync"]))
            .await
    }

    /// `.tar.gz` archive of every skill.
    pub async fn export_skills(&self) -> Result<bytes::Bytes, ApiError> {
        let response = self
            .request(Method::GET, &["api", "skills", "export"])
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.bytes().await?)
    }

    pub async fn import_skills(&self, file_name: &str, archive: Vec<u8>) -> Result<ApiBody, ApiError> {
        let part = multipart::Part::bytes(archive)
            .file_name(file_name.to_string())
            .mime_str("application/gzip")?;
        self.send(
            self.request(Method::POST, &["api", "skills", "import"])
                .multipart(multipart::Form::new().part("file", part)),
        )
        .await
    }
}

// ============================================================================
// Response handling
// ============================================================================

/// Turn non-2xx into [`ApiError::Status`], using the body's `error` field
/// when there is one.
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("API error: {}", status.as_u16()));
    warn!("Backend returned {}: {}", status, message);
    Err(ApiError::Status { status, message })
}

pub async fn handle_response(response: Response) -> Result<ApiBody, ApiError> {
    let response = check_status(response).await?;
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("application/json"))
        .unwrap_or(false);

    if is_json {
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(ApiBody::Json(Value::Null));
        }
        serde_json::from_str(&text)
            .map(ApiBody::Json)
            .map_err(|e| ApiError::Decode(e.to_string()))
    } else {
        Ok(ApiBody::Text(response.text().await?))
    }
}
