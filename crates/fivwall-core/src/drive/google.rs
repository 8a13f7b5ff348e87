//! Google Drive adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use uuid::Uuid;

use super::{RemoteError, RemoteObjectStore, RemoteResult};
use crate::config::ClientConfig;
use crate::util::compact_text;

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const JSON_MIME_TYPE: &str = "application/json";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct GoogleDriveStore {
    api_url: String,
    upload_url: String,
    client: Client,
}

impl GoogleDriveStore {
    pub fn new(config: &ClientConfig) -> RemoteResult<Self> {
        Ok(Self {
            api_url: config.drive_api_url.trim_end_matches('/').to_string(),
            upload_url: config.drive_upload_url.trim_end_matches('/').to_string(),
            client: Client::builder().timeout(HTTP_TIMEOUT).build()?,
        })
    }

    async fn search(&self, token: &str, query: &str) -> RemoteResult<Option<String>> {
        let response = self
            .client
            .get(format!("{}/files", self.api_url))
            .bearer_auth(token)
            .query(&[
                ("q", query),
                ("fields", "files(id,name)"),
                ("spaces", "drive"),
            ])
            .send()
            .await?;
        let listing = check_status(response)
            .await?
            .json::<FileList>()
            .await?;
        Ok(listing.files.into_iter().next().map(|file| file.id))
    }
}

#[async_trait]
impl RemoteObjectStore for GoogleDriveStore {
    async fn find_or_create_container(&self, token: &str, name: &str) -> RemoteResult<String> {
        if let Some(id) = self.search(token, &folder_query(name)).await? {
            return Ok(id);
        }

        let metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
        });
        let response = self
            .client
            .post(format!("{}/files", self.api_url))
            .bearer_auth(token)
            .query(&[("fields", "id")])
            .json(&metadata)
            .send()
            .await?;
        let created = check_status(response).await?.json::<FileRef>().await?;
        tracing::info!(folder = name, "Created remote sync folder");
        Ok(created.id)
    }

    async fn find_object(
        &self,
        token: &str,
        container_id: &str,
        name: &str,
    ) -> RemoteResult<Option<String>> {
        self.search(token, &file_query(container_id, name)).await
    }

    async fn read_object(&self, token: &str, object_id: &str) -> RemoteResult<Option<Vec<u8>>> {
        let response = self
            .client
            .get(format!("{}/files/{object_id}", self.api_url))
            .bearer_auth(token)
            .query(&[("alt", "media")])
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let bytes = check_status(response).await?.bytes().await?;
        Ok(Some(bytes.to_vec()))
    }

    async fn write_object(
        &self,
        token: &str,
        container_id: &str,
        object_id: Option<&str>,
        name: &str,
        bytes: Vec<u8>,
    ) -> RemoteResult<String> {
        if let Some(object_id) = object_id {
            let response = self
                .client
                .patch(format!("{}/files/{object_id}", self.upload_url))
                .bearer_auth(token)
                .query(&[("uploadType", "media")])
                .header("Content-Type", JSON_MIME_TYPE)
                .body(bytes)
                .send()
                .await?;
            check_status(response).await?;
            return Ok(object_id.to_string());
        }

        let boundary = format!("fivwall_{}", Uuid::now_v7().simple());
        let body = multipart_body(&boundary, container_id, name, &bytes);
        let response = self
            .client
            .post(format!("{}/files", self.upload_url))
            .bearer_auth(token)
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .header(
                "Content-Type",
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await?;
        let created = check_status(response).await?.json::<FileRef>().await?;
        tracing::info!(file = name, "Created remote snapshot file");
        Ok(created.id)
    }
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileRef>,
}

#[derive(Debug, Deserialize)]
struct FileRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DriveErrorResponse {
    error: Option<DriveErrorBody>,
}

#[derive(Debug, Deserialize)]
struct DriveErrorBody {
    message: Option<String>,
}

async fn check_status(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(RemoteError::Unauthorized);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<DriveErrorResponse>(&body)
        .ok()
        .and_then(|payload| payload.error)
        .and_then(|error| error.message)
        .unwrap_or_else(|| {
            let excerpt = compact_text(&body);
            if excerpt.is_empty() {
                format!("HTTP {}", status.as_u16())
            } else {
                excerpt
            }
        });
    Err(RemoteError::Api {
        status: status.as_u16(),
        message,
    })
}

fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn folder_query(name: &str) -> String {
    format!(
        "name='{}' and mimeType='{FOLDER_MIME_TYPE}' and trashed=false",
        escape_query_literal(name)
    )
}

fn file_query(container_id: &str, name: &str) -> String {
    format!(
        "name='{}' and '{}' in parents and trashed=false",
        escape_query_literal(name),
        escape_query_literal(container_id)
    )
}

fn multipart_body(boundary: &str, container_id: &str, name: &str, bytes: &[u8]) -> Vec<u8> {
    let metadata = serde_json::json!({
        "name": name,
        "mimeType": JSON_MIME_TYPE,
        "parents": [container_id],
    });

    let mut body = Vec::with_capacity(bytes.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Type: {JSON_MIME_TYPE}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--").as_bytes());
    body
}
