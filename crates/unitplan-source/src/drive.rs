//! PDFs from a Google Drive folder via the Drive v3 REST API.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use tracing::{debug, info};
use unitplan_core::{FileRef, PdfSource, SourceError};

const DRIVE_API: &str = "https://www.googleapis.com/drive/v3";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const PDF_MIME: &str = "application/pdf";
const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, modifiedTime)";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    mime_type: String,
    modified_time: Option<String>,
}

/// A Drive folder, listed recursively, authorised with a bearer token.
pub struct DriveFolder {
    client: reqwest::Client,
    api_base: String,
    folder_id: String,
    token: String,
}

impl DriveFolder {
    pub fn new(folder_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: DRIVE_API.to_string(),
            folder_id: folder_id.into(),
            token: token.into(),
        }
    }

    /// Point at a different API root (no trailing slash needed).
    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    pub fn folder_id(&self) -> &str {
        &self.folder_id
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::Response, SourceError> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(http_error)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn list_children(&self, folder_id: &str) -> Result<Vec<DriveFile>, SourceError> {
        let url = format!("{}/files", self.api_base);
        let q = children_query(folder_id);
        let mut children = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("q", q.as_str()),
                ("fields", LIST_FIELDS),
                ("pageSize", "1000"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.as_str()));
            }

            let body = self.get(&url, &query).await?.text().await.map_err(http_error)?;
            let page: FileList = serde_json::from_str(&body)
                .map_err(|e| SourceError::Http(format!("unexpected Drive response: {e}")))?;
            debug!(folder_id, count = page.files.len(), "listed Drive page");
            children.extend(page.files);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(children)
    }
}

#[async_trait]
impl PdfSource for DriveFolder {
    async fn list_pdfs(&self) -> Result<Vec<FileRef>, SourceError> {
        let mut pending = vec![self.folder_id.clone()];
        let mut visited = HashSet::new();
        let mut files = Vec::new();

        while let Some(folder) = pending.pop() {
            if !visited.insert(folder.clone()) {
                continue;
            }
            for child in self.list_children(&folder).await? {
                match child.mime_type.as_str() {
                    FOLDER_MIME => pending.push(child.id),
                    PDF_MIME => files.push(FileRef {
                        updated_at: child
                            .modified_time
                            .as_deref()
                            .map(modified_ms)
                            .unwrap_or_default(),
                        id: child.id,
                        name: child.name,
                    }),
                    _ => {}
                }
            }
        }

        info!(folder_id = %self.folder_id, folders = visited.len(), count = files.len(), "listed Drive PDFs");
        Ok(files)
    }

    async fn fetch(&self, file: &FileRef) -> Result<Vec<u8>, SourceError> {
        let url = format!("{}/files/{}", self.api_base, file.id);
        let resp = self
            .get(&url, &[("alt", "media"), ("supportsAllDrives", "true")])
            .await?;
        let bytes = resp.bytes().await.map_err(http_error)?;
        Ok(bytes.to_vec())
    }
}

fn children_query(folder_id: &str) -> String {
    format!("'{}' in parents and trashed = false", folder_id.replace('\'', "\\'"))
}

/// RFC 3339 `modifiedTime` as epoch milliseconds. Unparseable stamps are
/// kept verbatim; they only need to be stable.
fn modified_ms(stamp: &str) -> String {
    DateTime::parse_from_rfc3339(stamp)
        .map(|t| t.timestamp_millis().to_string())
        .unwrap_or_else(|_| stamp.to_string())
}

fn http_error(e: reqwest::Error) -> SourceError {
    SourceError::Http(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modified_time_becomes_epoch_millis() {
        assert_eq!(modified_ms("2024-06-10T06:13:20.000Z"), "1718000000000");
        assert_eq!(modified_ms("2024-06-10T15:13:20.123+09:00"), "1718000000123");
        assert_eq!(modified_ms("yesterday"), "yesterday");
    }

    #[test]
    fn children_query_escapes_quotes() {
        assert_eq!(
            children_query("1AbC"),
            "'1AbC' in parents and trashed = false"
        );
        assert_eq!(children_query("a'b"), "'a\\'b' in parents and trashed = false");
    }

    #[test]
    fn file_list_decodes_with_and_without_token() {
        let page: FileList = serde_json::from_str(
            r#"{
                "nextPageToken": "p2",
                "files": [
                    {"id": "f1", "name": "算数.pdf", "mimeType": "application/pdf",
                     "modifiedTime": "2024-06-10T06:13:20.000Z"},
                    {"id": "d1", "name": "sub", "mimeType": "application/vnd.google-apps.folder"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("p2"));
        assert_eq!(page.files.len(), 2);
        assert_eq!(page.files[1].mime_type, FOLDER_MIME);
        assert!(page.files[1].modified_time.is_none());

        let last: FileList = serde_json::from_str("{}").unwrap();
        assert!(last.files.is_empty());
        assert!(last.next_page_token.is_none());
    }

    #[test]
    fn api_base_is_trimmed() {
        let folder = DriveFolder::new("id", "token").with_api_base("http://localhost:9000/");
        assert_eq!(folder.api_base, "http://localhost:9000");
        assert_eq!(folder.folder_id(), "id");
    }
}
