use reqwest::blocking::{Client, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use crate::drive::{DriveError, FOLDER_MIME};

/// Boundary for multipart uploads
pub const MULTIPART_BOUNDARY: &str = "-------314159265358979323846";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveOwner {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owners: Vec<DriveOwner>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveRole {
    Reader,
    Writer,
}

impl DriveRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriveRole::Reader => "reader",
            DriveRole::Writer => "writer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "reader" => Some(DriveRole::Reader),
            "writer" => Some(DriveRole::Writer),
            _ => None,
        }
    }
}

/// Blocking Drive v3 client authenticated with a bearer token
pub struct DriveClient {
    base_url: String,
    token: String,
    client: Client,
}

impl DriveClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self, DriveError> {
        if token.trim().is_empty() {
            return Err(DriveError::MissingToken);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self::with_client(base_url, token, client))
    }

    pub fn with_client(base_url: &str, token: &str, client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
            client,
        }
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.base_url)
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/drive/v3/files", self.base_url)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn check(op: &'static str, resp: Response) -> Result<Response, DriveError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().unwrap_or_default();
        log::debug!("{} failed with {}: {}", op, status, body);
        Err(DriveError::Status {
            op,
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        })
    }

    fn decode<T: for<'de> Deserialize<'de>>(resp: Response) -> Result<T, DriveError> {
        let text = resp.text()?;
        serde_json::from_str(&text).map_err(|e| DriveError::Decode(e.to_string()))
    }

    pub fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<DriveFile, DriveError> {
        let mut body = json!({ "name": name, "mimeType": FOLDER_MIME });
        if let Some(parent) = parent_id {
            body["parents"] = json!([parent]);
        }
        let resp = self
            .client
            .post(self.files_url())
            .header(AUTHORIZATION, self.bearer())
            .json(&body)
            .send()?;
        Self::decode(Self::check("Create folder", resp)?)
    }

    /// Folders shared with the current account, optionally narrowed by an extra clause
    pub fn list_shared_team_folders(&self, query: Option<&str>) -> Result<Vec<DriveFile>, DriveError> {
        let resp = self
            .client
            .get(self.files_url())
            .header(AUTHORIZATION, self.bearer())
            .query(&[
                ("q", shared_folders_query(query)),
                ("fields", "files(id,name,owners,permissions)".to_string()),
            ])
            .send()?;
        let list: FileList = Self::decode(Self::check("List shared folders", resp)?)?;
        Ok(list.files)
    }

    /// Look up a file by name inside a folder
    pub fn find_file(&self, folder_id: &str, name: &str) -> Result<Option<DriveFile>, DriveError> {
        let q = format!(
            "name = '{}' and '{}' in parents and trashed = false",
            escape_query(name),
            escape_query(folder_id)
        );
        let resp = self
            .client
            .get(self.files_url())
            .header(AUTHORIZATION, self.bearer())
            .query(&[("q", q.as_str()), ("fields", "files(id,name)")])
            .send()?;
        let list: FileList = Self::decode(Self::check("Find file", resp)?)?;
        Ok(list.files.into_iter().next())
    }

    /// Update a file's content, or create it in `parent_id` when `file_id` is None
    ///
    /// Returns the file id.
    pub fn create_or_update_json_file(
        &self,
        file_id: Option<&str>,
        name: &str,
        json_text: &str,
        parent_id: Option<&str>,
    ) -> Result<String, DriveError> {
        if let Some(id) = file_id {
            let resp = self
                .client
                .patch(format!("{}/{}", self.upload_url(), id))
                .query(&[("uploadType", "media")])
                .header(AUTHORIZATION, self.bearer())
                .header(CONTENT_TYPE, "application/json")
                .body(json_text.to_string())
                .send()?;
            Self::check("Update file", resp)?;
            return Ok(id.to_string());
        }

        let mut metadata = json!({ "name": name, "mimeType": "application/json" });
        if let Some(parent) = parent_id {
            metadata["parents"] = json!([parent]);
        }
        let resp = self
            .client
            .post(self.upload_url())
            .query(&[("uploadType", "multipart")])
            .header(AUTHORIZATION, self.bearer())
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
            )
            .body(multipart_body(&metadata, json_text))
            .send()?;
        let file: DriveFile = Self::decode(Self::check("Create file", resp)?)?;
        Ok(file.id)
    }

    pub fn read_json_file(&self, file_id: &str) -> Result<String, DriveError> {
        let resp = self
            .client
            .get(format!("{}/{}", self.files_url(), file_id))
            .query(&[("alt", "media")])
            .header(AUTHORIZATION, self.bearer())
            .send()?;
        Ok(Self::check("Read file", resp)?.text()?)
    }

    /// Share a file or folder with a user
    pub fn set_permission(&self, file_id: &str, email: &str, role: DriveRole) -> Result<(), DriveError> {
        let body = json!({
            "type": "user",
            "role": role.as_str(),
            "emailAddress": email,
            "sendNotificationEmail": true,
        });
        let resp = self
            .client
            .post(format!("{}/{}/permissions", self.files_url(), file_id))
            .header(AUTHORIZATION, self.bearer())
            .json(&body)
            .send()?;
        Self::check("Set permission", resp)?;
        Ok(())
    }
}

/// `multipart/related` body: JSON metadata part followed by the file content
pub fn multipart_body(metadata: &serde_json::Value, content: &str) -> String {
    let delimiter = format!("\r\n--{}\r\n", MULTIPART_BOUNDARY);
    let close = format!("\r\n--{}--", MULTIPART_BOUNDARY);
    format!(
        "{d}Content-Type: application/json; charset=UTF-8\r\n\r\n{meta}{d}Content-Type: application/json\r\n\r\n{content}{close}",
        d = delimiter,
        meta = metadata,
        content = content,
        close = close,
    )
}

pub fn shared_folders_query(extra: Option<&str>) -> String {
    let mut clauses = vec![
        format!("mimeType = '{}'", FOLDER_MIME),
        "sharedWithMe = true".to_string(),
    ];
    if let Some(extra) = extra.map(str::trim).filter(|e| !e.is_empty()) {
        clauses.push(extra.to_string());
    }
    clauses.join(" and ")
}

/// Escape a literal for a Drive `q` string
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
