//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all songsurf-server endpoints.
//!
//! When API routes or request formats change, update only this file.

#![allow(dead_code)]

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    async fn post_json(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("POST request failed")
    }

    async fn post_empty(&self, path: &str) -> Response {
        self.client
            .post(self.url(path))
            .send()
            .await
            .expect("POST request failed")
    }

    // ========================================================================
    // Service Endpoints
    // ========================================================================

    /// GET /
    pub async fn home(&self) -> Response {
        self.get("/").await
    }

    /// GET /ping
    pub async fn ping(&self) -> Response {
        self.get("/ping").await
    }

    /// GET /health
    pub async fn health(&self) -> Response {
        self.get("/health").await
    }

    // ========================================================================
    // Queue Endpoints
    // ========================================================================

    /// GET /status
    pub async fn status(&self) -> Response {
        self.get("/status").await
    }

    /// GET /status, decoded
    pub async fn status_json(&self) -> Value {
        let response = self.status().await;
        assert!(response.status().is_success());
        response.json().await.expect("Invalid /status body")
    }

    /// POST /download with an arbitrary body
    pub async fn download(&self, body: &Value) -> Response {
        self.post_json("/download", body).await
    }

    /// POST /download for a single song
    pub async fn download_song(&self, url: &str, artist: &str, title: &str) -> Response {
        self.download(&json!({
            "url": url,
            "artist": artist,
            "album": ALBUM,
            "title": title,
            "year": "2024",
        }))
        .await
    }

    /// POST /download with a raw, possibly malformed, body
    pub async fn download_raw(&self, body: &str) -> Response {
        self.client
            .post(self.url("/download"))
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .expect("POST request failed")
    }

    /// POST /cancel
    pub async fn cancel(&self) -> Response {
        self.post_empty("/cancel").await
    }

    /// POST /cleanup
    pub async fn cleanup(&self) -> Response {
        self.post_empty("/cleanup").await
    }

    // ========================================================================
    // Library Endpoints
    // ========================================================================

    /// GET /stats
    pub async fn stats(&self) -> Response {
        self.get("/stats").await
    }

    /// GET /api/library
    pub async fn library(&self) -> Response {
        self.get("/api/library").await
    }

    /// POST /api/extract-metadata
    pub async fn extract_metadata(&self, url: &str) -> Response {
        self.post_json("/api/extract-metadata", &json!({ "url": url }))
            .await
    }

    /// POST /api/download-playlist
    pub async fn download_playlist(&self, body: &Value) -> Response {
        self.post_json("/api/download-playlist", body).await
    }

    // ========================================================================
    // Polling helpers
    // ========================================================================

    /// Polls /status until `condition` holds and returns that snapshot.
    ///
    /// # Panics
    ///
    /// Panics if the condition is not met within `WORKER_TIMEOUT_MS`.
    pub async fn wait_for_status<F>(&self, condition: F) -> Value
    where
        F: Fn(&Value) -> bool,
    {
        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(WORKER_TIMEOUT_MS);
        loop {
            let status = self.status_json().await;
            if condition(&status) {
                return status;
            }
            if start.elapsed() > timeout {
                panic!("Status condition not met within timeout, last: {}", status);
            }
            tokio::time::sleep(Duration::from_millis(STATUS_POLL_INTERVAL_MS)).await;
        }
    }

    /// Waits until a job is being processed.
    pub async fn wait_for_in_progress(&self) -> Value {
        self.wait_for_status(|s| s["in_progress"] == true).await
    }

    /// Waits until the worker has committed a success for `final_path`.
    pub async fn wait_for_completed(&self, final_path: &str) -> Value {
        self.wait_for_status(|s| {
            s["in_progress"] == false && s["last_completed"]["final_path"] == final_path
        })
        .await
    }

    /// Waits until the worker has committed a failure.
    pub async fn wait_for_error(&self) -> Value {
        self.wait_for_status(|s| s["in_progress"] == false && s["last_error"].is_object())
            .await
    }
}
