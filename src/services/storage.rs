// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Object storage for meal photos.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{AppError, Result};
use crate::services::auth::AuthClient;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload bytes to `path`, replacing any existing object.
    async fn upload(&self, path: &str, body: Bytes, content_type: &str) -> Result<()>;

    /// Publicly readable URL for `path`.
    fn public_url(&self, path: &str) -> String;
}

/// Firebase Storage over its REST API, authenticated as the signed-in user.
#[derive(Clone)]
pub struct FirebaseStorage {
    http: reqwest::Client,
    base_url: String,
    bucket: String,
    auth: AuthClient,
}

impl FirebaseStorage {
    pub fn new(bucket: String, auth: AuthClient) -> Self {
        let base_url = match std::env::var("FIREBASE_STORAGE_EMULATOR_HOST") {
            Ok(host) => format!("http://{}/v0", host),
            Err(_) => "https://firebasestorage.googleapis.com/v0".to_string(),
        };
        Self {
            http: reqwest::Client::new(),
            base_url,
            bucket,
            auth,
        }
    }
}

#[async_trait]
impl ObjectStorage for FirebaseStorage {
    async fn upload(&self, path: &str, body: Bytes, content_type: &str) -> Result<()> {
        let token = self.auth.id_token().await?;
        let size = body.len();

        let response = self
            .http
            .post(format!("{}/b/{}/o", self.base_url, self.bucket))
            .query(&[("uploadType", "media"), ("name", path)])
            .header(reqwest::header::AUTHORIZATION, format!("Firebase {}", token))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::RemoteUnavailable(format!("Upload failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(AppError::Unauthorized);
            }
            return Err(AppError::RemoteUnavailable(format!(
                "Upload HTTP {}: {}",
                status, text
            )));
        }

        tracing::debug!(path, size, "Object uploaded");
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/b/{}/o/{}?alt=media",
            self.base_url,
            self.bucket,
            urlencoding::encode(path)
        )
    }
}

/// In-process storage for offline mode and tests.
#[derive(Default)]
pub struct MemoryStorage {
    objects: DashMap<String, (Bytes, String)>,
    fail_uploads: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Stored bytes and content type for `path`.
    pub fn get(&self, path: &str) -> Option<(Bytes, String)> {
        self.objects.get(path).map(|o| o.clone())
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.objects.iter().map(|o| o.key().clone()).collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(&self, path: &str, body: Bytes, content_type: &str) -> Result<()> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(AppError::RemoteUnavailable("upload rejected".to_string()));
        }
        self.objects
            .insert(path.to_string(), (body, content_type.to_string()));
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("memory://{}", path)
    }
}
