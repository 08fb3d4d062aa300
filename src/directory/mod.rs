//! Upstream directory service.
//!
//! The directory is the system of record for groups and members; this module
//! defines the narrow client interface the service layer calls through and the
//! upstream data shapes.

mod client;

pub use client::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::CredentialsError;

/// Errors reported by the directory client.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("directory returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("directory request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("credentials unavailable: {0}")]
    Credentials(String),
    #[error("invalid directory response: {0}")]
    Decode(String),
    #[error("invalid directory URL {0:?}")]
    InvalidUrl(String),
}

impl From<CredentialsError> for DirectoryError {
    fn from(err: CredentialsError) -> Self {
        DirectoryError::Credentials(err.to_string())
    }
}

/// A group as the directory represents it. Every field is optional upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A group member as the directory represents it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryMember {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Pagination parameters for list calls. The token is opaque.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub page_token: Option<String>,
    pub max_results: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupsPage {
    #[serde(default)]
    pub groups: Vec<DirectoryGroup>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembersPage {
    #[serde(default)]
    pub members: Vec<DirectoryMember>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Client for the upstream directory. Implementations must be safe to share
/// across concurrent calls.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    async fn list_groups(
        &self,
        domain: &str,
        page: &PageRequest,
    ) -> Result<GroupsPage, DirectoryError>;

    async fn get_group(&self, group_id: &str) -> Result<DirectoryGroup, DirectoryError>;

    async fn insert_group(&self, group: &DirectoryGroup) -> Result<DirectoryGroup, DirectoryError>;

    async fn delete_group(&self, group_id: &str) -> Result<(), DirectoryError>;

    async fn list_members(
        &self,
        group_id: &str,
        page: &PageRequest,
    ) -> Result<MembersPage, DirectoryError>;

    async fn get_member(
        &self,
        group_id: &str,
        member_id: &str,
    ) -> Result<DirectoryMember, DirectoryError>;

    async fn insert_member(
        &self,
        group_id: &str,
        member: &DirectoryMember,
    ) -> Result<DirectoryMember, DirectoryError>;

    async fn delete_member(&self, group_id: &str, member_id: &str) -> Result<(), DirectoryError>;
}
