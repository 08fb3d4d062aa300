//! Member messages.

use serde::{Deserialize, Serialize};

use crate::directory::DirectoryMember;

/// A member of a directory group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Member {
    pub id: String,
    pub email: String,
    pub status: String,
}

impl From<DirectoryMember> for Member {
    fn from(member: DirectoryMember) -> Self {
        Self {
            id: member.id.unwrap_or_default(),
            email: member.email.unwrap_or_default(),
            status: member.status.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListMembersRequest {
    /// Resource name of the owning group, `groups/{groupId}`.
    pub parent: String,
    pub page_token: String,
    pub page_size: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListMembersResponse {
    pub members: Vec<Member>,
    pub next_page_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetMemberRequest {
    /// Resource name, `groups/{groupId}/members/{memberId}`.
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateMemberRequest {
    pub parent: String,
    pub member: Option<Member>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeleteMemberRequest {
    pub name: String,
}
