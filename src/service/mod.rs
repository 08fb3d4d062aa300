//! Translation layer between the wire messages and the directory client.
//!
//! Each operation parses resource names, validates the request, issues exactly
//! one directory call and maps the result back. Invalid input is rejected
//! before anything is sent upstream.

use std::sync::Arc;

use tracing::instrument;

use crate::directory::{DirectoryClient, DirectoryGroup, DirectoryMember, PageRequest};
use crate::errors::AppError;
use crate::models::{
    CreateGroupRequest, CreateMemberRequest, DeleteGroupRequest, DeleteMemberRequest, Empty,
    GetGroupRequest, GetMemberRequest, Group, ListGroupsRequest, ListGroupsResponse,
    ListMembersRequest, ListMembersResponse, Member,
};
use crate::names::{GroupName, MemberName};

/// Group and membership operations for one directory domain.
#[derive(Clone)]
pub struct GroupService {
    directory: Arc<dyn DirectoryClient>,
    domain: String,
}

impl GroupService {
    pub fn new(directory: Arc<dyn DirectoryClient>, domain: impl Into<String>) -> Self {
        Self {
            directory,
            domain: domain.into(),
        }
    }

    #[instrument(skip_all, fields(domain = %self.domain))]
    pub async fn list_groups(
        &self,
        request: ListGroupsRequest,
    ) -> Result<ListGroupsResponse, AppError> {
        let page = page_request(request.page_token, request.page_size)?;
        let res = self.directory.list_groups(&self.domain, &page).await?;

        Ok(ListGroupsResponse {
            groups: res.groups.into_iter().map(Group::from).collect(),
            next_page_token: res.next_page_token.unwrap_or_default(),
        })
    }

    #[instrument(skip_all, fields(name = %request.name))]
    pub async fn get_group(&self, request: GetGroupRequest) -> Result<Group, AppError> {
        let name = GroupName::parse(&request.name)?;
        let group = self.directory.get_group(&name.group_id).await?;
        Ok(group.into())
    }

    #[instrument(skip_all)]
    pub async fn create_group(&self, request: CreateGroupRequest) -> Result<Group, AppError> {
        let group = request
            .group
            .ok_or_else(|| AppError::InvalidArgument("group is required".to_string()))?;
        if group.email.is_empty() {
            return Err(AppError::InvalidArgument(
                "group.email is required".to_string(),
            ));
        }

        let created = self
            .directory
            .insert_group(&DirectoryGroup {
                id: None,
                name: non_empty(group.name),
                email: Some(group.email),
                description: non_empty(group.description),
            })
            .await?;

        tracing::info!("Created group {}", created.id.as_deref().unwrap_or_default());
        Ok(created.into())
    }

    #[instrument(skip_all, fields(name = %request.name))]
    pub async fn delete_group(&self, request: DeleteGroupRequest) -> Result<Empty, AppError> {
        let name = GroupName::parse(&request.name)?;
        self.directory.delete_group(&name.group_id).await?;

        tracing::info!("Deleted group {}", name.group_id);
        Ok(Empty {})
    }

    #[instrument(skip_all, fields(parent = %request.parent))]
    pub async fn list_members(
        &self,
        request: ListMembersRequest,
    ) -> Result<ListMembersResponse, AppError> {
        let parent = GroupName::parse(&request.parent)?;
        let page = page_request(request.page_token, request.page_size)?;
        let res = self
            .directory
            .list_members(&parent.group_id, &page)
            .await?;

        Ok(ListMembersResponse {
            members: res.members.into_iter().map(Member::from).collect(),
            next_page_token: res.next_page_token.unwrap_or_default(),
        })
    }

    #[instrument(skip_all, fields(name = %request.name))]
    pub async fn get_member(&self, request: GetMemberRequest) -> Result<Member, AppError> {
        let name = MemberName::parse(&request.name)?;
        let member = self
            .directory
            .get_member(&name.group_id, &name.member_id)
            .await?;
        Ok(member.into())
    }

    #[instrument(skip_all, fields(parent = %request.parent))]
    pub async fn create_member(&self, request: CreateMemberRequest) -> Result<Member, AppError> {
        let parent = GroupName::parse(&request.parent)?;
        let member = request
            .member
            .ok_or_else(|| AppError::InvalidArgument("member is required".to_string()))?;
        if member.email.is_empty() {
            return Err(AppError::InvalidArgument(
                "member.email is required".to_string(),
            ));
        }

        let created = self
            .directory
            .insert_member(
                &parent.group_id,
                &DirectoryMember {
                    id: None,
                    email: Some(member.email),
                    status: None,
                },
            )
            .await?;

        tracing::info!(
            "Added member {} to group {}",
            created.id.as_deref().unwrap_or_default(),
            parent.group_id
        );
        Ok(created.into())
    }

    #[instrument(skip_all, fields(name = %request.name))]
    pub async fn delete_member(&self, request: DeleteMemberRequest) -> Result<Empty, AppError> {
        let name = MemberName::parse(&request.name)?;
        self.directory
            .delete_member(&name.group_id, &name.member_id)
            .await?;

        tracing::info!("Removed member {} from group {}", name.member_id, name.group_id);
        Ok(Empty {})
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Pagination parameters from the wire. A zero page size means the upstream default.
fn page_request(page_token: String, page_size: i32) -> Result<PageRequest, AppError> {
    let max_results = match page_size {
        0 => None,
        n if n < 0 => {
            return Err(AppError::InvalidArgument(format!(
                "page_size must not be negative, got {}",
                n
            )))
        }
        n => Some(n as u32),
    };

    Ok(PageRequest {
        page_token: non_empty(page_token),
        max_results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_zero_size_is_default() {
        let page = page_request(String::new(), 0).unwrap();
        assert_eq!(page, PageRequest::default());
    }

    #[test]
    fn test_page_request_passes_token_through() {
        let page = page_request("opaque==".to_string(), 25).unwrap();
        assert_eq!(page.page_token.as_deref(), Some("opaque=="));
        assert_eq!(page.max_results, Some(25));
    }

    #[test]
    fn test_page_request_negative_size() {
        let err = page_request(String::new(), -1).unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }
}
