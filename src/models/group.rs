//! Group messages.

use serde::{Deserialize, Serialize};

use crate::directory::DirectoryGroup;

/// A directory group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Group {
    pub id: String,
    /// Display name of the group.
    pub name: String,
    pub email: String,
    pub description: String,
}

impl From<DirectoryGroup> for Group {
    fn from(group: DirectoryGroup) -> Self {
        Self {
            id: group.id.unwrap_or_default(),
            name: group.name.unwrap_or_default(),
            email: group.email.unwrap_or_default(),
            description: group.description.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListGroupsRequest {
    pub page_token: String,
    pub page_size: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListGroupsResponse {
    pub groups: Vec<Group>,
    pub next_page_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetGroupRequest {
    /// Resource name, `groups/{groupId}`.
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateGroupRequest {
    pub group: Option<Group>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeleteGroupRequest {
    /// Resource name, `groups/{groupId}`.
    pub name: String,
}
