//! Test helper utilities for queue and router tests
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response};
use xray_review::app_state::AppState;
use xray_review::config::AppConfig;
use xray_review::services::review_queue::{ReviewQueue, ReviewSettings};
use xray_review::services::storage::MemoryStorage;

pub const BOUNDARY: &str = "xray-review-test-boundary";

/// Queue backed by an in-memory archive the test can inspect.
pub fn queue_with_storage(quota: u32, carousel: usize) -> (ReviewQueue, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let settings = ReviewSettings {
        results_per_image: quota,
        carousel_size: carousel,
        noise_seed: Some(42),
    };
    (ReviewQueue::new(settings, storage.clone()), storage)
}

/// App state for router tests.
pub fn app_state(quota: u32, carousel: usize) -> (AppState, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let config = AppConfig {
        results_per_image: quota,
        carousel_size: carousel,
        animal_types: vec!["cat".to_string(), "dog".to_string()],
        noise_seed: Some(42),
        ..AppConfig::default()
    };
    (AppState::new(config, storage.clone()), storage)
}

/// Hand-built multipart/form-data body.
#[derive(Default)]
pub struct MultipartBody {
    buf: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, data: &[u8]) -> Self {
        self.buf.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(mut self, uri: &str) -> Request<Body> {
        self.buf
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(self.buf))
            .expect("valid request")
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("valid request")
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body")
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).expect("JSON body")
}
