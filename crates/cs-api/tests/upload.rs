use std::sync::Arc;

use axum::{body::Body, http::Request, http::StatusCode};
use tower::ServiceExt;

mod common;

use common::{COMPANIES, PROGRAMS};

#[tokio::test]
async fn stores_both_expected_files_in_their_containers() {
    let (state, store, _) = common::memory_state();
    let app = cs_api::create_router(state);
    let companies = common::company_workbook(&["Acme"]);
    let programs = common::company_workbook(&["Beta"]);

    let response = app
        .oneshot(common::upload_request(&[
            (COMPANIES, &companies),
            (PROGRAMS, &programs),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = common::body_json(response).await;
    assert_eq!(json["message"], "Files uploaded successfully");
    assert_eq!(json["uploads"][COMPANIES], "memory://companies/Companies_in_Milwaukee.xlsx");
    assert_eq!(
        json["uploads"][PROGRAMS],
        "memory://programs/Affiliated_Program_Industry_Features.xlsx"
    );
    assert!(store.contains("companies", COMPANIES));
    assert!(store.contains("programs", PROGRAMS));
}

#[tokio::test]
async fn reupload_overwrites_existing_blobs() {
    let (state, store, _) = common::memory_state();
    let app = cs_api::create_router(state);

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(common::upload_request(&[(COMPANIES, b"a"), (PROGRAMS, b"b")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn single_file_upload_lists_the_missing_one() {
    let (state, store, _) = common::memory_state();
    let app = cs_api::create_router(state);

    let response = app
        .oneshot(common::upload_request(&[(COMPANIES, b"bytes")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = common::body_json(response).await;
    assert_eq!(json["error"], format!("Missing files: {PROGRAMS}"));
    assert!(store.is_empty());
}

#[tokio::test]
async fn unexpected_file_is_named_and_nothing_is_stored() {
    let (state, store, _) = common::memory_state();
    let app = cs_api::create_router(state);

    let response = app
        .oneshot(common::upload_request(&[
            (COMPANIES, b"a"),
            (PROGRAMS, b"b"),
            ("salaries.xlsx", b"c"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = common::body_json(response).await;
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .starts_with("Unexpected file: salaries.xlsx")
    );
    assert!(store.is_empty());
}

#[tokio::test]
async fn duplicated_file_is_rejected() {
    let (state, store, _) = common::memory_state();
    let app = cs_api::create_router(state);

    let response = app
        .oneshot(common::upload_request(&[
            (COMPANIES, b"a"),
            (PROGRAMS, b"b"),
            (COMPANIES, b"c"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = common::body_json(response).await;
    assert_eq!(json["error"], format!("Duplicate file: {COMPANIES}"));
    assert!(store.is_empty());
}

#[tokio::test]
async fn client_filenames_are_sanitised_before_matching() {
    let (state, store, _) = common::memory_state();
    let app = cs_api::create_router(state);

    let response = app
        .oneshot(common::upload_request(&[
            ("../uploads/Companies in Milwaukee.xlsx", b"a"),
            (PROGRAMS, b"b"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = common::body_json(response).await;
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .contains("Unexpected file: uploads_Companies_in_Milwaukee.xlsx")
    );
    assert!(store.is_empty());
}

#[tokio::test]
async fn non_multipart_request_has_no_files() {
    let (state, _, _) = common::memory_state();
    let app = cs_api::create_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = common::body_json(response).await;
    assert_eq!(json["error"], "No files provided");
}

#[tokio::test]
async fn multipart_without_file_parts_has_no_files() {
    let (state, _, _) = common::memory_state();
    let app = cs_api::create_router(state);
    let boundary = common::BOUNDARY;
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{boundary}--\r\n"
    );

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = common::body_json(response).await;
    assert_eq!(json["error"], "No files provided");
}

#[tokio::test]
async fn storage_failure_names_the_file() {
    let state = common::state_with(
        Arc::new(common::FailingBlobStore),
        Arc::new(common::FakeEmbedder::default()),
    );
    let app = cs_api::create_router(state);

    let response = app
        .oneshot(common::upload_request(&[(COMPANIES, b"a"), (PROGRAMS, b"b")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = common::body_json(response).await;
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .starts_with(&format!("Upload failed for {COMPANIES}:"))
    );
}
