//! Member RPC endpoints.

use axum::{extract::State, Json};

use super::{RpcRequest, RpcResult};
use crate::models::{
    CreateMemberRequest, DeleteMemberRequest, Empty, GetMemberRequest, ListMembersRequest,
    ListMembersResponse, Member,
};
use crate::AppState;

/// ListMembers - List the members of `parent`.
pub async fn list_members(
    State(state): State<AppState>,
    RpcRequest(request): RpcRequest<ListMembersRequest>,
) -> RpcResult<ListMembersResponse> {
    state.service.list_members(request).await.map(Json)
}

/// GetMember - Get a member by `groups/{groupId}/members/{memberId}`.
pub async fn get_member(
    State(state): State<AppState>,
    RpcRequest(request): RpcRequest<GetMemberRequest>,
) -> RpcResult<Member> {
    state.service.get_member(request).await.map(Json)
}

/// CreateMember - Add a member to `parent`.
pub async fn create_member(
    State(state): State<AppState>,
    RpcRequest(request): RpcRequest<CreateMemberRequest>,
) -> RpcResult<Member> {
    state.service.create_member(request).await.map(Json)
}

/// DeleteMember - Remove a member from its group.
pub async fn delete_member(
    State(state): State<AppState>,
    RpcRequest(request): RpcRequest<DeleteMemberRequest>,
) -> RpcResult<Empty> {
    state.service.delete_member(request).await.map(Json)
}
