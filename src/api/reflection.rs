//! Service reflection metadata.

use axum::Json;
use serde::{Deserialize, Serialize};

use super::SERVICE_NAME;

/// RPC methods as `(method, request type, response type)`.
pub const METHODS: [(&str, &str, &str); 8] = [
    ("ListGroups", "ListGroupsRequest", "ListGroupsResponse"),
    ("GetGroup", "GetGroupRequest", "Group"),
    ("CreateGroup", "CreateGroupRequest", "Group"),
    ("DeleteGroup", "DeleteGroupRequest", "Empty"),
    ("ListMembers", "ListMembersRequest", "ListMembersResponse"),
    ("GetMember", "GetMemberRequest", "Member"),
    ("CreateMember", "CreateMemberRequest", "Member"),
    ("DeleteMember", "DeleteMemberRequest", "Empty"),
];

/// Route path of an RPC method.
pub fn method_path(method: &str) -> String {
    format!("/{}/{}", SERVICE_NAME, method)
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodDescriptor {
    pub name: String,
    pub path: String,
    pub request_type: String,
    pub response_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub service: String,
    pub methods: Vec<MethodDescriptor>,
}

/// GET /reflection - Describe the RPC surface.
pub async fn describe_service() -> Json<ServiceDescriptor> {
    let methods = METHODS
        .iter()
        .map(|(name, request_type, response_type)| MethodDescriptor {
            name: name.to_string(),
            path: method_path(name),
            request_type: format!("{}.{}", package(), request_type),
            response_type: format!("{}.{}", package(), response_type),
        })
        .collect();

    Json(ServiceDescriptor {
        service: SERVICE_NAME.to_string(),
        methods,
    })
}

fn package() -> &'static str {
    SERVICE_NAME
        .rsplit_once('.')
        .map(|(package, _)| package)
        .unwrap_or(SERVICE_NAME)
}
