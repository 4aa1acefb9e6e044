//! Helpers for driving the router in integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response};
use http_body_util::BodyExt;
use rust_xlsxwriter::Workbook;
use serde_json::Value;

use cs_api::SharedState;
use cs_common::blob::{BlobStore, InMemoryBlobStore, StorageError};
use cs_common::embedding::{Embedder, EmbeddingError};
use cs_common::reference::{ReferenceEmbedding, ReferenceEmbeddings};

pub const BOUNDARY: &str = "cs-test-boundary";
pub const COMPANIES: &str = "Companies_in_Milwaukee.xlsx";
pub const PROGRAMS: &str = "Affiliated_Program_Industry_Features.xlsx";

/// Deterministic embedder: a four-dimensional vector derived from the text.
#[derive(Default)]
pub struct FakeEmbedder {
    calls: AtomicUsize,
    inputs: Mutex<Vec<String>>,
}

impl FakeEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }

    pub fn vector_for(text: &str) -> Vec<f32> {
        let vowels = text.chars().filter(|c| "aeiouAEIOU".contains(*c)).count();
        let commas = text.matches(',').count();
        vec![text.len() as f32, vowels as f32, commas as f32, 1.0]
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap().push(text.to_string());
        Ok(Self::vector_for(text))
    }
}

/// Answers with a rate limit for the first `failures` calls, then succeeds.
pub struct RateLimitedEmbedder {
    failures: usize,
    calls: AtomicUsize,
}

impl RateLimitedEmbedder {
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for RateLimitedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(EmbeddingError::RateLimited("Rate limit reached".into()));
        }
        Ok(FakeEmbedder::vector_for(text))
    }
}

/// Blob store whose every call fails.
pub struct FailingBlobStore;

#[async_trait]
impl BlobStore for FailingBlobStore {
    async fn put(&self, _container: &str, _name: &str, _bytes: Vec<u8>) -> Result<String, StorageError> {
        Err(StorageError::Status {
            status: 503,
            code: "ServerBusy".into(),
            message: "The server is busy".into(),
        })
    }

    async fn get(&self, _container: &str, _name: &str) -> Result<Vec<u8>, StorageError> {
        Err(StorageError::Status {
            status: 503,
            code: "ServerBusy".into(),
            message: "The server is busy".into(),
        })
    }
}

pub fn references() -> ReferenceEmbeddings {
    ReferenceEmbeddings::new(vec![
        ReferenceEmbedding {
            name: "verizon".into(),
            vector: vec![1.0, 0.0, 0.0, 0.0],
        },
        ReferenceEmbedding {
            name: "rockwell".into(),
            vector: vec![0.0, 1.0, 0.0, 1.0],
        },
    ])
}

pub fn state_with(blob_store: Arc<dyn BlobStore>, embedder: Arc<dyn Embedder>) -> SharedState {
    cs_api::test_state(blob_store, embedder, references())
}

pub fn memory_state() -> (SharedState, Arc<InMemoryBlobStore>, Arc<FakeEmbedder>) {
    let store = Arc::new(InMemoryBlobStore::new());
    let embedder = Arc::new(FakeEmbedder::default());
    let state = state_with(store.clone(), embedder.clone());
    (state, store, embedder)
}

/// An xlsx workbook with a `Company Name` header followed by `names`.
pub fn company_workbook(names: &[&str]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Company Name").unwrap();
    for (row, name) in names.iter().enumerate() {
        if !name.is_empty() {
            sheet.write_string(row as u32 + 1, 0, *name).unwrap();
        }
    }
    workbook.save_to_buffer().unwrap()
}

/// `multipart/form-data` body with one `files` part per entry.
pub fn multipart_body<B: AsRef<[u8]>>(files: &[(&str, B)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, bytes) in files {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(bytes.as_ref());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request<B: AsRef<[u8]>>(files: &[(&str, B)]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(files)))
        .unwrap()
}

pub fn similarity_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/calculate_similarity")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
