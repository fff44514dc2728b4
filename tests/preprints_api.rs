mod support;

use std::path::PathBuf;

use axum::http::StatusCode;
use serde_json::{Value, json};
use time::macros::datetime;

use quire::domain::api_keys::ApiScope;

use support::*;

async fn seeded_store() -> std::sync::Arc<MemoryStore> {
    let store = MemoryStore::new();
    store.insert_node(node("abc12")).await;
    store
        .insert_file(stored_file("file1", "abc12", &PathBuf::from("/data/paper.pdf")))
        .await;
    store
        .insert_file(stored_file("foreign", "zzz99", &PathBuf::from("/data/other.pdf")))
        .await;
    store.insert_subject(subject("s1", "Earth Sciences")).await;
    store.insert_subject(subject("s2", "Oceanography")).await;
    store
}

async fn seeded_preprint_store() -> std::sync::Arc<MemoryStore> {
    let store = seeded_store().await;
    let mut preprint = node("pre01");
    preprint.preprint_file = Some("file2".to_string());
    preprint.preprint_subjects = vec!["s2".to_string(), "s1".to_string()];
    preprint.preprint_provider = Some("osf".to_string());
    preprint.preprint_created = Some(datetime!(2016-08-01 12:00 UTC));
    preprint.date_modified = datetime!(2016-08-02 12:00 UTC);
    store.insert_node(preprint).await;
    store
        .insert_file(stored_file("file2", "pre01", &PathBuf::from("/data/pre.pdf")))
        .await;
    store
}

fn create_body(node_id: &str, file_id: Option<&str>, subjects: Option<Value>) -> Value {
    let mut body = json!({
        "data": {
            "type": "preprints",
            "id": node_id,
            "attributes": {
                "title": "Sea level rise, revisited",
                "abstract": "We revisit the record.",
                "tags": ["ocean", "climate"],
                "doi": "10.1234/quire.1"
            }
        }
    });
    if let Some(subjects) = subjects {
        body["data"]["attributes"]["subjects"] = subjects;
    }
    if let Some(file_id) = file_id {
        body["data"]["relationships"] = json!({
            "primary_file": {"data": {"type": "primary", "id": file_id}}
        });
    }
    body
}

fn first_detail(response: &TestResponse) -> Value {
    response.json()["errors"][0]["detail"].clone()
}

#[tokio::test]
async fn get_preprint_serializes_attributes_and_links() {
    let store = seeded_preprint_store().await;
    let cache = tempfile::tempdir().expect("tempdir");
    let app = router(store, immediate_executor(), cache.path());

    let response = send(&app, get("/v2/preprints/pre01/", None)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.content_type(), "application/vnd.api+json");

    let doc = response.json();
    let data = &doc["data"];
    assert_eq!(data["type"], "preprints");
    assert_eq!(data["id"], "pre01");
    assert_eq!(data["attributes"]["title"], "Tide gauges and sea level");
    assert_eq!(data["attributes"]["abstract"], "Long-run trends.");
    assert_eq!(data["attributes"]["tags"], json!(["ocean"]));
    assert_eq!(
        data["attributes"]["subjects"],
        json!([
            {"id": "s2", "text": "Oceanography"},
            {"id": "s1", "text": "Earth Sciences"}
        ])
    );
    assert_eq!(data["attributes"]["date_created"], "2016-08-01T12:00:00Z");
    assert_eq!(data["links"]["self"], "http://localhost:8000/v2/preprints/pre01/");
    assert_eq!(data["links"]["html"], "http://localhost:5000/pre01/");
    assert_eq!(data["links"]["doi"], Value::Null);
    assert_eq!(
        data["relationships"]["contributors"]["links"]["related"]["meta"]["count"],
        2
    );
}

#[tokio::test]
async fn plain_nodes_are_not_preprints() {
    let store = seeded_store().await;
    let cache = tempfile::tempdir().expect("tempdir");
    let app = router(store, immediate_executor(), cache.path());

    let response = send(&app, get("/v2/preprints/abc12/", None)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.json(), json!({"errors": [{"detail": "Not found."}]}));
}

#[tokio::test]
async fn admin_creates_a_preprint_in_one_write() {
    let store = seeded_store().await;
    let token = issue_token(&store, "admin1", vec![ApiScope::PreprintWrite]).await;
    let cache = tempfile::tempdir().expect("tempdir");
    let app = router(store.clone(), immediate_executor(), cache.path());

    let body = create_body("abc12", Some("file1"), Some(json!(["s1", "s2"])));
    let response = send(&app, json_request("POST", "/v2/preprints/", Some(&token), &body)).await;
    assert_eq!(response.status, StatusCode::CREATED);

    let doc = response.json();
    assert_eq!(doc["data"]["attributes"]["title"], "Sea level rise, revisited");
    assert_eq!(doc["data"]["attributes"]["tags"], json!(["climate", "ocean"]));
    assert_eq!(
        doc["data"]["links"]["doi"],
        "https://dx.doi.org/10.1234/quire.1"
    );

    let node = store.node("abc12").await.expect("node");
    assert_eq!(node.preprint_file.as_deref(), Some("file1"));
    assert_eq!(node.preprint_subjects, vec!["s1", "s2"]);
    assert!(node.preprint_created.is_some());
    assert_eq!(store.saves(), 1);
}

#[tokio::test]
async fn writes_need_credentials() {
    let store = seeded_store().await;
    let cache = tempfile::tempdir().expect("tempdir");
    let app = router(store.clone(), immediate_executor(), cache.path());
    let body = create_body("abc12", Some("file1"), Some(json!(["s1"])));

    let response = send(&app, json_request("POST", "/v2/preprints/", None, &body)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        first_detail(&response),
        "Authentication credentials were not provided."
    );

    let response = send(
        &app,
        json_request("POST", "/v2/preprints/", Some("qk_bogus_secret"), &body),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(first_detail(&response), "Incorrect authentication credentials.");
    assert_eq!(store.saves(), 0);
}

#[tokio::test]
async fn read_only_keys_cannot_write() {
    let store = seeded_store().await;
    let token = issue_token(&store, "admin1", vec![ApiScope::PreprintRead]).await;
    let cache = tempfile::tempdir().expect("tempdir");
    let app = router(store, immediate_executor(), cache.path());

    let body = create_body("abc12", Some("file1"), Some(json!(["s1"])));
    let response = send(&app, json_request("POST", "/v2/preprints/", Some(&token), &body)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn create_reports_each_missing_piece() {
    let store = seeded_store().await;
    let token = issue_token(&store, "admin1", vec![ApiScope::PreprintWrite]).await;
    let cache = tempfile::tempdir().expect("tempdir");
    let app = router(store.clone(), immediate_executor(), cache.path());

    let cases = [
        (
            create_body("nope", Some("file1"), Some(json!(["s1"]))),
            StatusCode::NOT_FOUND,
            "Unable to find Node with specified id.",
        ),
        (
            create_body("abc12", None, Some(json!(["s1"]))),
            StatusCode::BAD_REQUEST,
            "You must specify a primary_file to create a preprint.",
        ),
        (
            create_body("abc12", Some("missing"), Some(json!(["s1"]))),
            StatusCode::BAD_REQUEST,
            "You must specify a primary_file to create a preprint.",
        ),
        (
            create_body("abc12", Some("file1"), None),
            StatusCode::BAD_REQUEST,
            "You must specify at least one subject to create a preprint.",
        ),
        (
            create_body("abc12", Some("file1"), Some(json!([]))),
            StatusCode::BAD_REQUEST,
            "You must specify at least one subject to create a preprint.",
        ),
        (
            create_body("abc12", Some("foreign"), Some(json!(["s1"]))),
            StatusCode::BAD_REQUEST,
            "This file is not a valid primary file for this preprint.",
        ),
        (
            create_body("abc12", Some("file1"), Some(json!(["s1", "s9"]))),
            StatusCode::BAD_REQUEST,
            "Subject with id <s9> could not be found.",
        ),
    ];

    for (body, status, detail) in cases {
        let response =
            send(&app, json_request("POST", "/v2/preprints/", Some(&token), &body)).await;
        assert_eq!(response.status, status, "body: {body}");
        assert_eq!(first_detail(&response), detail);
    }

    assert_eq!(store.saves(), 0);
    assert!(!store.node("abc12").await.expect("node").is_preprint());
}

#[tokio::test]
async fn existing_preprints_conflict_on_create() {
    let store = seeded_preprint_store().await;
    let token = issue_token(&store, "admin1", vec![ApiScope::PreprintWrite]).await;
    let cache = tempfile::tempdir().expect("tempdir");
    let app = router(store, immediate_executor(), cache.path());

    let body = create_body("pre01", Some("file2"), Some(json!(["s1"])));
    let response = send(&app, json_request("POST", "/v2/preprints/", Some(&token), &body)).await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(
        first_detail(&response),
        "This node already stored as a preprint, use the update method instead."
    );
}

#[tokio::test]
async fn non_admin_contributors_are_denied() {
    let store = seeded_store().await;
    let token = issue_token(&store, "writer1", vec![ApiScope::PreprintWrite]).await;
    let cache = tempfile::tempdir().expect("tempdir");
    let app = router(store.clone(), immediate_executor(), cache.path());

    let body = create_body("abc12", Some("file1"), Some(json!(["s1"])));
    let response = send(&app, json_request("POST", "/v2/preprints/", Some(&token), &body)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(first_detail(&response), "Not authorized to update this node.");
    assert_eq!(store.saves(), 0);
}

#[tokio::test]
async fn type_problems_use_the_field_and_conflict_forms() {
    let store = seeded_store().await;
    let token = issue_token(&store, "admin1", vec![ApiScope::PreprintWrite]).await;
    let cache = tempfile::tempdir().expect("tempdir");
    let app = router(store, immediate_executor(), cache.path());

    let mut body = create_body("abc12", Some("file1"), Some(json!(["s1"])));
    body["data"].as_object_mut().expect("object").remove("type");
    let response = send(&app, json_request("POST", "/v2/preprints/", Some(&token), &body)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json(),
        json!({"errors": [{"detail": {"type": ["This field is required."]}}]})
    );

    body["data"]["type"] = json!("nodes");
    let response = send(&app, json_request("POST", "/v2/preprints/", Some(&token), &body)).await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn update_applies_only_supplied_fields() {
    let store = seeded_preprint_store().await;
    let token = issue_token(&store, "admin1", vec![ApiScope::PreprintWrite]).await;
    let cache = tempfile::tempdir().expect("tempdir");
    let app = router(store.clone(), immediate_executor(), cache.path());

    let body = json!({
        "data": {
            "type": "preprints",
            "id": "pre01",
            "attributes": {"title": "A better title", "date_created": "2001-01-01T00:00:00Z"}
        }
    });
    let response = send(
        &app,
        json_request("PATCH", "/v2/preprints/pre01/", Some(&token), &body),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);

    let node = store.node("pre01").await.expect("node");
    assert_eq!(node.title, "A better title");
    assert_eq!(node.preprint_file.as_deref(), Some("file2"));
    assert_eq!(node.preprint_subjects, vec!["s2", "s1"]);
    assert_eq!(node.preprint_created, Some(datetime!(2016-08-01 12:00 UTC)));
    assert!(node.date_modified > datetime!(2016-08-02 12:00 UTC));
}

#[tokio::test]
async fn update_replaces_primary_file_and_subjects_through_the_setters() {
    let store = seeded_preprint_store().await;
    store
        .insert_file(stored_file("file3", "pre01", &PathBuf::from("/data/pre-v2.pdf")))
        .await;
    store.insert_subject(subject("s3", "Hydrology")).await;
    let token = issue_token(&store, "admin1", vec![ApiScope::PreprintWrite]).await;
    let cache = tempfile::tempdir().expect("tempdir");
    let app = router(store.clone(), immediate_executor(), cache.path());

    let body = json!({
        "data": {
            "type": "preprints",
            "id": "pre01",
            "attributes": {"subjects": ["s3", "s1", "s3"]},
            "relationships": {"primary_file": {"data": {"type": "primary", "id": "file3"}}}
        }
    });
    let response = send(
        &app,
        json_request("PATCH", "/v2/preprints/pre01/", Some(&token), &body),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);

    let node = store.node("pre01").await.expect("node");
    assert_eq!(node.preprint_file.as_deref(), Some("file3"));
    assert_eq!(node.preprint_subjects, vec!["s3", "s1"]);
    assert_eq!(node.preprint_created, Some(datetime!(2016-08-01 12:00 UTC)));
    assert_eq!(store.saves(), 1);
}

#[tokio::test]
async fn update_with_empty_subjects_keeps_the_current_ones() {
    let store = seeded_preprint_store().await;
    let token = issue_token(&store, "admin1", vec![ApiScope::PreprintWrite]).await;
    let cache = tempfile::tempdir().expect("tempdir");
    let app = router(store.clone(), immediate_executor(), cache.path());

    let body = json!({
        "data": {"type": "preprints", "id": "pre01", "attributes": {"subjects": []}}
    });
    let response = send(
        &app,
        json_request("PATCH", "/v2/preprints/pre01/", Some(&token), &body),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);

    let node = store.node("pre01").await.expect("node");
    assert_eq!(node.preprint_subjects, vec!["s2", "s1"]);
}

#[tokio::test]
async fn non_admin_cannot_update_subjects() {
    let store = seeded_preprint_store().await;
    let token = issue_token(&store, "writer1", vec![ApiScope::PreprintWrite]).await;
    let cache = tempfile::tempdir().expect("tempdir");
    let app = router(store.clone(), immediate_executor(), cache.path());
    let before = store.node("pre01").await.expect("node");

    let body = json!({
        "data": {"type": "preprints", "id": "pre01", "attributes": {"subjects": ["s1"]}}
    });
    let response = send(
        &app,
        json_request("PATCH", "/v2/preprints/pre01/", Some(&token), &body),
    )
    .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(store.saves(), 0);
    assert_eq!(store.node("pre01").await.expect("node"), before);
}

#[tokio::test]
async fn update_failures_commit_nothing() {
    let store = seeded_preprint_store().await;
    let token = issue_token(&store, "admin1", vec![ApiScope::PreprintWrite]).await;
    let cache = tempfile::tempdir().expect("tempdir");
    let app = router(store.clone(), immediate_executor(), cache.path());
    let before = store.node("pre01").await.expect("node");

    let cases = [
        (
            json!({"data": {"type": "preprints", "id": "other", "attributes": {}}}),
            StatusCode::CONFLICT,
        ),
        (
            json!({"data": {"type": "preprints", "attributes": {"title": "  "}}}),
            StatusCode::BAD_REQUEST,
        ),
        (
            json!({"data": {"type": "preprints", "attributes": {
                "subjects": ["s1"],
                "tags": ["x".repeat(129)]
            }}}),
            StatusCode::BAD_REQUEST,
        ),
        (
            json!({"data": {
                "type": "preprints",
                "relationships": {"primary_file": {"data": {"type": "primary", "id": "gone"}}}
            }}),
            StatusCode::BAD_REQUEST,
        ),
    ];

    for (body, status) in cases {
        let response = send(
            &app,
            json_request("PATCH", "/v2/preprints/pre01/", Some(&token), &body),
        )
        .await;
        assert_eq!(response.status, status, "body: {body}");
    }

    assert_eq!(store.saves(), 0);
    assert_eq!(store.node("pre01").await.expect("node"), before);
}
