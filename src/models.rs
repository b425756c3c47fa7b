use serde::{Deserialize, Serialize};

use crate::pipeline::FileOutcome;

// query string naming the progress subscriber, `?socketId=...`
#[derive(Deserialize, Debug)]
pub struct SubscriberQuery {
    #[serde(rename = "socketId")]
    pub socket_id: String,
}

// status of a stored file, as listed by GET /files
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FileStatus {
    pub file: String,
    pub size: u64,
    pub last_modified: String,
}

#[derive(Serialize, Debug)]
pub struct FileListResponse {
    pub files: Vec<FileStatus>,
    pub total: usize,
}

// per-file line of an upload response
#[derive(Serialize, Debug)]
pub struct FileResult {
    pub field_name: String,
    pub filename: String,
    pub bytes: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<FileOutcome> for FileResult {
    fn from(outcome: FileOutcome) -> Self {
        Self {
            success: outcome.is_success(),
            error_kind: outcome.error.as_ref().map(|e| e.kind().to_string()),
            error: outcome.error.as_ref().map(|e| e.to_string()),
            field_name: outcome.field_name,
            filename: outcome.filename,
            bytes: outcome.bytes,
        }
    }
}

// response for the multipart upload endpoint
#[derive(Serialize, Debug)]
pub struct UploadResponse {
    pub success: bool,
    pub result: String,
    pub session_id: String,
    pub files: Vec<FileResult>,
}

// generic error response
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}
