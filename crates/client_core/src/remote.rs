use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{CreatedUser, UserDraft, UserId, UserRecord},
    error::ApiError,
};
use tracing::{debug, warn};
use url::Url;

use crate::{config::Settings, error::FetchError};

/// Remote source of truth for the user collection. No retries at this layer.
#[async_trait]
pub trait RemoteCollection: Send + Sync {
    async fn list(&self) -> Result<Vec<UserRecord>, FetchError>;
    async fn create(&self, draft: &UserDraft) -> Result<CreatedUser, FetchError>;
    async fn update(&self, id: UserId, draft: &UserDraft) -> Result<UserRecord, FetchError>;
    async fn delete(&self, id: UserId) -> Result<(), FetchError>;
}

pub struct HttpCollectionClient {
    http: Client,
    collection_url: Url,
}

impl HttpCollectionClient {
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self::with_client(http, settings.collection_url.clone()))
    }

    pub fn with_client(http: Client, collection_url: Url) -> Self {
        Self {
            http,
            collection_url,
        }
    }

    pub fn collection_url(&self) -> &Url {
        &self.collection_url
    }

    fn item_url(&self, id: UserId) -> Result<Url, FetchError> {
        let base = self.collection_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{id}"))?)
    }
}

async fn ensure_success(response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    let message = ApiError::from_body(&body).message;
    warn!(
        status = status.as_u16(),
        %url,
        server_message = message.as_deref().unwrap_or(""),
        "collection: non-success response"
    );
    Err(FetchError::status(status.as_u16(), message))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, FetchError> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl RemoteCollection for HttpCollectionClient {
    async fn list(&self) -> Result<Vec<UserRecord>, FetchError> {
        debug!(url = %self.collection_url, "collection: GET");
        let response = self.http.get(self.collection_url.clone()).send().await?;
        let response = ensure_success(response).await?;
        decode(response).await
    }

    async fn create(&self, draft: &UserDraft) -> Result<CreatedUser, FetchError> {
        debug!(url = %self.collection_url, name = %draft.name, "collection: POST");
        let response = self
            .http
            .post(self.collection_url.clone())
            .json(draft)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        decode(response).await
    }

    async fn update(&self, id: UserId, draft: &UserDraft) -> Result<UserRecord, FetchError> {
        let url = self.item_url(id)?;
        debug!(%url, name = %draft.name, "collection: PUT");
        let response = self.http.put(url).json(draft).send().await?;
        let response = ensure_success(response).await?;
        decode(response).await
    }

    async fn delete(&self, id: UserId) -> Result<(), FetchError> {
        let url = self.item_url(id)?;
        debug!(%url, "collection: DELETE");
        let response = self
            .http
            .delete(url)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;
