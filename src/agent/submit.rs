use crate::api::{ApiClient, GroupProfile};
use async_trait::async_trait;
use serde_json::Value;

/// Destination of a submitted agent form.
///
/// The form validates and builds the payload; the handler only delivers it.
#[async_trait]
pub trait SubmitHandler: Send + Sync {
    async fn submit(&self, payload: Value) -> anyhow::Result<()>;
}

/// Delivers the form through the REST API.
pub enum ApiSubmit<'a> {
    /// `POST /create`
    Create(&'a ApiClient),
    /// `PUT /api/agent/{name}/config`
    Update(&'a ApiClient, String),
    /// `POST /api/agent/group/create` with the selected profiles.
    Group(&'a ApiClient, Vec<GroupProfile>),
}

#[async_trait]
impl SubmitHandler for ApiSubmit<'_> {
    async fn submit(&self, payload: Value) -> anyhow::Result<()> {
        match self {
            ApiSubmit::Create(client) => {
                client.create_agent(&payload).await?;
            }
            ApiSubmit::Update(client, name) => {
                client.update_agent_config(name, &payload).await?;
            }
            ApiSubmit::Group(client, profiles) => {
                client.create_group(profiles, &payload).await?;
            }
        }
        Ok(())
    }
}
