//! Group RPC endpoints.

use axum::{extract::State, Json};

use super::{RpcRequest, RpcResult};
use crate::models::{
    CreateGroupRequest, DeleteGroupRequest, Empty, GetGroupRequest, Group, ListGroupsRequest,
    ListGroupsResponse,
};
use crate::AppState;

/// ListGroups - List the groups of the configured domain.
pub async fn list_groups(
    State(state): State<AppState>,
    RpcRequest(request): RpcRequest<ListGroupsRequest>,
) -> RpcResult<ListGroupsResponse> {
    state.service.list_groups(request).await.map(Json)
}

/// GetGroup - Get a single group by `groups/{groupId}`.
pub async fn get_group(
    State(state): State<AppState>,
    RpcRequest(request): RpcRequest<GetGroupRequest>,
) -> RpcResult<Group> {
    state.service.get_group(request).await.map(Json)
}

/// CreateGroup - Create a new group.
pub async fn create_group(
    State(state): State<AppState>,
    RpcRequest(request): RpcRequest<CreateGroupRequest>,
) -> RpcResult<Group> {
    state.service.create_group(request).await.map(Json)
}

/// DeleteGroup - Delete a group by `groups/{groupId}`.
pub async fn delete_group(
    State(state): State<AppState>,
    RpcRequest(request): RpcRequest<DeleteGroupRequest>,
) -> RpcResult<Empty> {
    state.service.delete_group(request).await.map(Json)
}
