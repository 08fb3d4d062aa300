//! Integration tests for the group service.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::api::{method_path, METHODS};
use crate::auth::StaticTokenSource;
use crate::directory::{
    DirectoryClient, DirectoryError, DirectoryGroup, DirectoryMember, GroupsPage,
    HttpDirectoryClient, MembersPage, PageRequest,
};
use crate::service::GroupService;
use crate::{create_router, AppState};

const DOMAIN: &str = "x.org";

/// In-memory directory that records every call it receives.
#[derive(Default)]
struct FakeDirectory {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    groups: BTreeMap<String, DirectoryGroup>,
    members: BTreeMap<(String, String), DirectoryMember>,
    next_id: u32,
    calls: Vec<String>,
    fail_next: Option<DirectoryError>,
    next_page_token: Option<String>,
}

impl FakeDirectory {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn add_group(&self, group: DirectoryGroup) {
        let id = group.id.clone().unwrap();
        self.state.lock().unwrap().groups.insert(id, group);
    }

    fn add_member(&self, group_id: &str, member: DirectoryMember) {
        let key = (group_id.to_string(), member.id.clone().unwrap());
        self.state.lock().unwrap().members.insert(key, member);
    }

    fn set_next_id(&self, next_id: u32) {
        self.state.lock().unwrap().next_id = next_id;
    }

    fn set_next_page_token(&self, token: &str) {
        self.state.lock().unwrap().next_page_token = Some(token.to_string());
    }

    fn fail_next(&self, err: DirectoryError) {
        self.state.lock().unwrap().fail_next = Some(err);
    }

    fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Record a call and return the injected failure, if any.
    fn record(&self, call: String) -> Result<std::sync::MutexGuard<'_, FakeState>, DirectoryError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        match state.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }
}

fn not_found(what: &str) -> DirectoryError {
    DirectoryError::NotFound(format!("Resource Not Found: {}", what))
}

#[async_trait]
impl DirectoryClient for FakeDirectory {
    async fn list_groups(
        &self,
        domain: &str,
        page: &PageRequest,
    ) -> Result<GroupsPage, DirectoryError> {
        let state = self.record(format!(
            "list_groups {} {:?} {:?}",
            domain, page.page_token, page.max_results
        ))?;
        Ok(GroupsPage {
            groups: state.groups.values().cloned().collect(),
            next_page_token: state.next_page_token.clone(),
        })
    }

    async fn get_group(&self, group_id: &str) -> Result<DirectoryGroup, DirectoryError> {
        let state = self.record(format!("get_group {}", group_id))?;
        state
            .groups
            .get(group_id)
            .cloned()
            .ok_or_else(|| not_found("groupKey"))
    }

    async fn insert_group(&self, group: &DirectoryGroup) -> Result<DirectoryGroup, DirectoryError> {
        let mut state = self.record(format!(
            "insert_group {}",
            group.email.as_deref().unwrap_or_default()
        ))?;
        state.next_id += 1;
        let mut created = group.clone();
        created.id = Some(format!("g{}", state.next_id));
        state
            .groups
            .insert(created.id.clone().unwrap(), created.clone());
        Ok(created)
    }

    async fn delete_group(&self, group_id: &str) -> Result<(), DirectoryError> {
        let mut state = self.record(format!("delete_group {}", group_id))?;
        state
            .groups
            .remove(group_id)
            .map(|_| ())
            .ok_or_else(|| not_found("groupKey"))
    }

    async fn list_members(
        &self,
        group_id: &str,
        page: &PageRequest,
    ) -> Result<MembersPage, DirectoryError> {
        let state = self.record(format!("list_members {} {:?}", group_id, page.page_token))?;
        Ok(MembersPage {
            members: state
                .members
                .iter()
                .filter(|((gid, _), _)| gid == group_id)
                .map(|(_, member)| member.clone())
                .collect(),
            next_page_token: state.next_page_token.clone(),
        })
    }

    async fn get_member(
        &self,
        group_id: &str,
        member_id: &str,
    ) -> Result<DirectoryMember, DirectoryError> {
        let state = self.record(format!("get_member {} {}", group_id, member_id))?;
        state
            .members
            .get(&(group_id.to_string(), member_id.to_string()))
            .cloned()
            .ok_or_else(|| not_found("memberKey"))
    }

    async fn insert_member(
        &self,
        group_id: &str,
        member: &DirectoryMember,
    ) -> Result<DirectoryMember, DirectoryError> {
        let mut state = self.record(format!(
            "insert_member {} {}",
            group_id,
            member.email.as_deref().unwrap_or_default()
        ))?;
        state.next_id += 1;
        let mut created = member.clone();
        created.id = Some(format!("m{}", state.next_id));
        state.members.insert(
            (group_id.to_string(), created.id.clone().unwrap()),
            created.clone(),
        );
        Ok(created)
    }

    async fn delete_member(&self, group_id: &str, member_id: &str) -> Result<(), DirectoryError> {
        let mut state = self.record(format!("delete_member {} {}", group_id, member_id))?;
        state
            .members
            .remove(&(group_id.to_string(), member_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| not_found("memberKey"))
    }
}

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    directory: Arc<FakeDirectory>,
}

impl TestFixture {
    async fn new() -> Self {
        let directory = FakeDirectory::new();
        let base_url = serve(directory.clone()).await;

        TestFixture {
            client: Client::new(),
            base_url,
            directory,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn call(&self, method: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(&method_path(method)))
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}

/// Serve the router over `directory` on an ephemeral port and return its base URL.
async fn serve(directory: Arc<dyn DirectoryClient>) -> String {
    let state = AppState {
        service: GroupService::new(directory, DOMAIN),
    };
    let app = create_router(state);

    // Bind to random port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get addr");

    // Spawn server
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

fn group(id: &str, name: &str, email: &str, description: &str) -> DirectoryGroup {
    DirectoryGroup {
        id: Some(id.to_string()),
        name: Some(name.to_string()),
        email: Some(email.to_string()),
        description: Some(description.to_string()),
    }
}

fn member(id: &str, email: &str, status: &str) -> DirectoryMember {
    DirectoryMember {
        id: Some(id.to_string()),
        email: Some(email.to_string()),
        status: Some(status.to_string()),
    }
}

async fn assert_error(resp: reqwest::Response, status: u16, code: &str) -> Value {
    assert_eq!(resp.status(), status);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], code);
    body
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_reflection_paths_are_routed() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/reflection"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["service"], "groupservice.v1.GroupService");
    let methods = body["methods"].as_array().unwrap();
    assert_eq!(methods.len(), METHODS.len());

    for method in methods {
        let path = method["path"].as_str().unwrap();
        let resp = fixture
            .client
            .post(fixture.url(path))
            .json(&json!({}))
            .send()
            .await
            .unwrap();
        assert_ne!(resp.status(), 404, "{} is not routed", path);
    }
}

#[tokio::test]
async fn test_request_id_is_assigned_and_propagated() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert!(resp.headers().get("x-request-id").is_some());

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .header("x-request-id", "req-123")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-request-id"], "req-123");
}

#[tokio::test]
async fn test_get_member() {
    let fixture = TestFixture::new().await;
    fixture
        .directory
        .add_member("g1", member("m2", "a@x.org", "ACTIVE"));

    let resp = fixture
        .call("GetMember", json!({"name": "groups/g1/members/m2"}))
        .await;

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body,
        json!({"id": "m2", "email": "a@x.org", "status": "ACTIVE"})
    );
    assert_eq!(fixture.directory.calls(), vec!["get_member g1 m2"]);
}

#[tokio::test]
async fn test_create_member_passes_empty_status_through() {
    let fixture = TestFixture::new().await;
    fixture.directory.set_next_id(8);

    let resp = fixture
        .call(
            "CreateMember",
            json!({"parent": "groups/g1", "member": {"email": "b@x.org"}}),
        )
        .await;

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"id": "m9", "email": "b@x.org", "status": ""}));
    assert_eq!(fixture.directory.calls(), vec!["insert_member g1 b@x.org"]);
}

#[tokio::test]
async fn test_get_group_bad_name_makes_no_upstream_call() {
    let fixture = TestFixture::new().await;

    let resp = fixture.call("GetGroup", json!({"name": "badformat"})).await;

    let body = assert_error(resp, 400, "INVALID_ARGUMENT").await;
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("badformat"));
    assert!(fixture.directory.calls().is_empty());
}

#[tokio::test]
async fn test_malformed_names_rejected_for_every_operation() {
    let fixture = TestFixture::new().await;

    let cases = [
        ("GetGroup", json!({"name": "groups/g1/members/m2"})),
        ("DeleteGroup", json!({"name": "groups"})),
        ("ListMembers", json!({"parent": "users/g1"})),
        ("GetMember", json!({"name": "groups/g1"})),
        (
            "CreateMember",
            json!({"parent": "groups/g1/members", "member": {"email": "b@x.org"}}),
        ),
        ("DeleteMember", json!({"name": "groups/g1/members/m2/x"})),
        ("DeleteMember", json!({"name": ""})),
    ];

    for (method, body) in cases {
        let resp = fixture.call(method, body).await;
        assert_error(resp, 400, "INVALID_ARGUMENT").await;
    }

    assert!(fixture.directory.calls().is_empty());
}

#[tokio::test]
async fn test_list_groups_network_error_is_internal() {
    // Reserve a port, then close it so connections are refused.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let http = Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    let directory = HttpDirectoryClient::new(
        http,
        &format!("http://{}", addr),
        Arc::new(StaticTokenSource("test-token".to_string())),
    )
    .unwrap();
    let base_url = serve(Arc::new(directory)).await;

    let resp = Client::new()
        .post(format!("{}{}", base_url, method_path("ListGroups")))
        .json(&json!({}))
        .send()
        .await
        .unwrap();

    let body = assert_error(resp, 500, "INTERNAL").await;
    assert!(body.get("groups").is_none());
}

#[tokio::test]
async fn test_list_groups() {
    let fixture = TestFixture::new().await;
    fixture
        .directory
        .add_group(group("g1", "Team", "team@x.org", "d"));
    fixture
        .directory
        .add_group(group("g2", "Ops", "ops@x.org", ""));
    fixture.directory.set_next_page_token("page-2");

    let resp = fixture
        .call("ListGroups", json!({"pageToken": "page-1", "pageSize": 2}))
        .await;

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["groups"],
        json!([
            {"id": "g1", "name": "Team", "email": "team@x.org", "description": "d"},
            {"id": "g2", "name": "Ops", "email": "ops@x.org", "description": ""}
        ])
    );
    assert_eq!(body["nextPageToken"], "page-2");
    assert_eq!(
        fixture.directory.calls(),
        vec![r#"list_groups x.org Some("page-1") Some(2)"#]
    );
}

#[tokio::test]
async fn test_list_groups_negative_page_size() {
    let fixture = TestFixture::new().await;

    let resp = fixture.call("ListGroups", json!({"pageSize": -5})).await;

    assert_error(resp, 400, "INVALID_ARGUMENT").await;
    assert!(fixture.directory.calls().is_empty());
}

#[tokio::test]
async fn test_group_crud() {
    let fixture = TestFixture::new().await;

    // Create group
    let create_resp = fixture
        .call(
            "CreateGroup",
            json!({"group": {"name": "Team", "email": "team@x.org", "description": "d"}}),
        )
        .await;
    assert_eq!(create_resp.status(), 200);
    let created: Value = create_resp.json().await.unwrap();
    let group_id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["name"], "Team");
    assert_eq!(created["email"], "team@x.org");
    assert_eq!(created["description"], "d");

    // Get group
    let get_resp = fixture
        .call("GetGroup", json!({"name": format!("groups/{}", group_id)}))
        .await;
    assert_eq!(get_resp.status(), 200);
    let fetched: Value = get_resp.json().await.unwrap();
    assert_eq!(fetched, created);

    // Delete group
    let delete_resp = fixture
        .call("DeleteGroup", json!({"name": format!("groups/{}", group_id)}))
        .await;
    assert_eq!(delete_resp.status(), 200);
    let body: Value = delete_resp.json().await.unwrap();
    assert_eq!(body, json!({}));

    // Verify deleted
    let get_deleted_resp = fixture
        .call("GetGroup", json!({"name": format!("groups/{}", group_id)}))
        .await;
    assert_error(get_deleted_resp, 404, "NOT_FOUND").await;
}

#[tokio::test]
async fn test_delete_group_twice_is_not_found() {
    let fixture = TestFixture::new().await;
    fixture
        .directory
        .add_group(group("g1", "Team", "team@x.org", "d"));

    let first = fixture.call("DeleteGroup", json!({"name": "groups/g1"})).await;
    assert_eq!(first.status(), 200);

    let second = fixture.call("DeleteGroup", json!({"name": "groups/g1"})).await;
    let body = assert_error(second, 404, "NOT_FOUND").await;
    assert_eq!(body["error"]["message"], "Resource Not Found: groupKey");

    assert_eq!(
        fixture.directory.calls(),
        vec!["delete_group g1", "delete_group g1"]
    );
}

#[tokio::test]
async fn test_create_group_requires_email() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .call("CreateGroup", json!({"group": {"name": "Team"}}))
        .await;
    assert_error(resp, 400, "INVALID_ARGUMENT").await;

    let resp = fixture.call("CreateGroup", json!({})).await;
    assert_error(resp, 400, "INVALID_ARGUMENT").await;

    assert!(fixture.directory.calls().is_empty());
}

#[tokio::test]
async fn test_create_member_requires_member_email() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .call("CreateMember", json!({"parent": "groups/g1", "member": {}}))
        .await;
    assert_error(resp, 400, "INVALID_ARGUMENT").await;

    let resp = fixture
        .call("CreateMember", json!({"parent": "groups/g1"}))
        .await;
    assert_error(resp, 400, "INVALID_ARGUMENT").await;

    assert!(fixture.directory.calls().is_empty());
}

#[tokio::test]
async fn test_whitespace_email_is_left_to_upstream() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .call("CreateGroup", json!({"group": {"email": " "}}))
        .await;
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .call(
            "CreateMember",
            json!({"parent": "groups/g1", "member": {"email": "\t"}}),
        )
        .await;
    assert_eq!(resp.status(), 200);

    assert_eq!(
        fixture.directory.calls(),
        vec!["insert_group  ".to_string(), "insert_member g1 \t".to_string()]
    );
}

#[tokio::test]
async fn test_member_lifecycle() {
    let fixture = TestFixture::new().await;
    fixture
        .directory
        .add_member("g1", member("m1", "a@x.org", "ACTIVE"));
    fixture
        .directory
        .add_member("g2", member("m5", "other@x.org", "ACTIVE"));

    // List members
    let list_resp = fixture
        .call("ListMembers", json!({"parent": "groups/g1", "pageToken": "t"}))
        .await;
    assert_eq!(list_resp.status(), 200);
    let body: Value = list_resp.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "members": [{"id": "m1", "email": "a@x.org", "status": "ACTIVE"}],
            "nextPageToken": ""
        })
    );

    // Delete member
    let delete_resp = fixture
        .call("DeleteMember", json!({"name": "groups/g1/members/m1"}))
        .await;
    assert_eq!(delete_resp.status(), 200);

    // Verify deleted
    let get_resp = fixture
        .call("GetMember", json!({"name": "groups/g1/members/m1"}))
        .await;
    assert_error(get_resp, 404, "NOT_FOUND").await;

    assert_eq!(
        fixture.directory.calls(),
        vec![
            r#"list_members g1 Some("t")"#,
            "delete_member g1 m1",
            "get_member g1 m1"
        ]
    );
}

#[tokio::test]
async fn test_upstream_errors_are_classified() {
    let fixture = TestFixture::new().await;

    fixture
        .directory
        .fail_next(DirectoryError::PermissionDenied(
            "Not Authorized to access this resource/api".to_string(),
        ));
    let resp = fixture.call("GetGroup", json!({"name": "groups/g1"})).await;
    let body = assert_error(resp, 403, "PERMISSION_DENIED").await;
    assert_eq!(
        body["error"]["message"],
        "Not Authorized to access this resource/api"
    );

    fixture
        .directory
        .fail_next(DirectoryError::Unauthenticated("Invalid Credentials".to_string()));
    let resp = fixture.call("ListGroups", json!({})).await;
    assert_error(resp, 401, "UNAUTHENTICATED").await;

    fixture.directory.fail_next(DirectoryError::Status {
        status: 503,
        message: "Backend Error".to_string(),
    });
    let resp = fixture
        .call("ListMembers", json!({"parent": "groups/g1"}))
        .await;
    let body = assert_error(resp, 500, "INTERNAL").await;
    assert_eq!(body["error"]["message"], "Backend Error");
    assert_eq!(body["error"]["details"]["upstreamStatus"], 503);
}

#[tokio::test]
async fn test_malformed_body_is_invalid_argument() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url(&method_path("GetGroup")))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_error(resp, 400, "INVALID_ARGUMENT").await;

    let resp = fixture
        .client
        .post(fixture.url(&method_path("GetGroup")))
        .body(r#"{"name":"groups/g1"}"#)
        .send()
        .await
        .unwrap();
    assert_error(resp, 400, "INVALID_ARGUMENT").await;

    assert!(fixture.directory.calls().is_empty());
}

#[tokio::test]
async fn test_empty_body_is_the_default_message() {
    let fixture = TestFixture::new().await;
    fixture
        .directory
        .add_group(group("g1", "Team", "team@x.org", ""));

    let resp = fixture
        .client
        .post(fixture.url(&method_path("ListGroups")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["groups"][0]["id"], "g1");

    // The default GetGroup message has an empty name, which is still rejected.
    let resp = fixture
        .client
        .post(fixture.url(&method_path("GetGroup")))
        .send()
        .await
        .unwrap();
    assert_error(resp, 400, "INVALID_ARGUMENT").await;

    assert_eq!(
        fixture.directory.calls(),
        vec!["list_groups x.org None None".to_string()]
    );
}
