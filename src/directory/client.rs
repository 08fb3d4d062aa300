//! HTTP client for the Admin SDK Directory API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{
    DirectoryClient, DirectoryError, DirectoryGroup, DirectoryMember, GroupsPage, MembersPage,
    PageRequest,
};
use crate::auth::TokenSource;

/// Default base URL of the Directory API.
pub const DEFAULT_DIRECTORY_URL: &str = "https://admin.googleapis.com/admin/directory/v1";

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorPayload,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    message: String,
}

impl DirectoryError {
    /// Classify a non-success upstream response, keeping its message.
    fn from_response(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .map(|b| b.error.message)
            .ok()
            .filter(|m| !m.is_empty())
            .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            });

        match status {
            StatusCode::NOT_FOUND => DirectoryError::NotFound(message),
            StatusCode::UNAUTHORIZED => DirectoryError::Unauthenticated(message),
            StatusCode::FORBIDDEN => DirectoryError::PermissionDenied(message),
            _ => DirectoryError::Status {
                status: status.as_u16(),
                message,
            },
        }
    }
}

/// Directory client issuing authenticated REST calls.
pub struct HttpDirectoryClient {
    http: reqwest::Client,
    base_url: Url,
    tokens: Arc<dyn TokenSource>,
}

impl HttpDirectoryClient {
    /// Create a client over `http`, which carries the upstream timeout and
    /// connection pool shared with the token exchange.
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self, DirectoryError> {
        let base_url =
            Url::parse(base_url).map_err(|_| DirectoryError::InvalidUrl(base_url.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(DirectoryError::InvalidUrl(base_url.to_string()));
        }

        Ok(Self {
            http,
            base_url,
            tokens,
        })
    }

    /// Build an endpoint URL. Each segment is percent-encoded as a single path segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<&(impl serde::Serialize + Sync)>,
    ) -> Result<reqwest::Response, DirectoryError> {
        let token = self.tokens.token().await?;

        tracing::debug!("Directory request: {} {}", method, url);
        let mut request = self.http.request(method, url).bearer_auth(token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(DirectoryError::from_response(status, &body))
    }

    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, DirectoryError> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| DirectoryError::Decode(e.to_string()))
    }
}

fn page_query(page: &PageRequest) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(token) = &page.page_token {
        query.push(("pageToken", token.clone()));
    }
    if let Some(max) = page.max_results {
        query.push(("maxResults", max.to_string()));
    }
    query
}

const NO_BODY: Option<&()> = None;

#[async_trait]
impl DirectoryClient for HttpDirectoryClient {
    async fn list_groups(
        &self,
        domain: &str,
        page: &PageRequest,
    ) -> Result<GroupsPage, DirectoryError> {
        let mut query = vec![("domain", domain.to_string())];
        query.extend(page_query(page));

        let response = self
            .send(Method::GET, self.endpoint(&["groups"]), &query, NO_BODY)
            .await?;
        Self::read_json(response).await
    }

    async fn get_group(&self, group_id: &str) -> Result<DirectoryGroup, DirectoryError> {
        let response = self
            .send(
                Method::GET,
                self.endpoint(&["groups", group_id]),
                &[],
                NO_BODY,
            )
            .await?;
        Self::read_json(response).await
    }

    async fn insert_group(&self, group: &DirectoryGroup) -> Result<DirectoryGroup, DirectoryError> {
        let response = self
            .send(Method::POST, self.endpoint(&["groups"]), &[], Some(group))
            .await?;
        Self::read_json(response).await
    }

    async fn delete_group(&self, group_id: &str) -> Result<(), DirectoryError> {
        self.send(
            Method::DELETE,
            self.endpoint(&["groups", group_id]),
            &[],
            NO_BODY,
        )
        .await?;
        Ok(())
    }

    async fn list_members(
        &self,
        group_id: &str,
        page: &PageRequest,
    ) -> Result<MembersPage, DirectoryError> {
        let response = self
            .send(
                Method::GET,
                self.endpoint(&["groups", group_id, "members"]),
                &page_query(page),
                NO_BODY,
            )
            .await?;
        Self::read_json(response).await
    }

    async fn get_member(
        &self,
        group_id: &str,
        member_id: &str,
    ) -> Result<DirectoryMember, DirectoryError> {
        let response = self
            .send(
                Method::GET,
                self.endpoint(&["groups", group_id, "members", member_id]),
                &[],
                NO_BODY,
            )
            .await?;
        Self::read_json(response).await
    }

    async fn insert_member(
        &self,
        group_id: &str,
        member: &DirectoryMember,
    ) -> Result<DirectoryMember, DirectoryError> {
        let response = self
            .send(
                Method::POST,
                self.endpoint(&["groups", group_id, "members"]),
                &[],
                Some(member),
            )
            .await?;
        Self::read_json(response).await
    }

    async fn delete_member(&self, group_id: &str, member_id: &str) -> Result<(), DirectoryError> {
        self.send(
            Method::DELETE,
            self.endpoint(&["groups", group_id, "members", member_id]),
            &[],
            NO_BODY,
        )
        .await?;
        Ok(())
    }
}
