use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Inbound command: a flat JSON object carrying an `action` plus
/// action-specific string fields. Values are strings only; nested objects are
/// not part of the request schema.
#[derive(Debug, Deserialize)]
pub struct Command {
    pub action: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl Command {
    /// The remaining fields as a JSON object, for typed param extraction.
    pub fn params_value(&self) -> Value {
        Value::Object(self.params.clone())
    }
}

// Action names (matched case-insensitively)
pub const ACTION_SHELL_START: &str = "shell_start";
pub const ACTION_SHELL_INPUT: &str = "shell_input";
pub const ACTION_SHELL_OUTPUT: &str = "shell_output";
pub const ACTION_SHELL_STOP: &str = "shell_stop";
pub const ACTION_SHELL_STATUS: &str = "shell_status";
pub const ACTION_LAUNCH_BROWSER: &str = "launch_browser";
pub const ACTION_UPLOAD_FILE: &str = "upload_file";
pub const ACTION_DOWNLOAD_FILE: &str = "download_file";
pub const ACTION_FILE_EXISTS: &str = "file_exists";
pub const ACTION_FILE_INFO: &str = "file_info";
pub const ACTION_DELETE_FILE: &str = "delete_file";
pub const ACTION_LIST_FILES: &str = "list_files";

// --- Request params ---

#[derive(Debug, Deserialize)]
pub struct ShellStartParams {
    #[serde(default)]
    pub working_directory: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShellInputParams {
    pub input: String,
}

#[derive(Debug, Deserialize)]
pub struct LaunchBrowserParams {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadFileParams {
    pub path: String,
    /// Base64-encoded file contents.
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct PathParams {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct ListFilesParams {
    pub path: String,
    #[serde(default)]
    pub pattern: Option<String>,
}

// --- Response payloads ---

#[derive(Debug, Serialize)]
pub struct MessageResult {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct OutputResult {
    pub output: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResult {
    pub running: bool,
}

#[derive(Debug, Serialize)]
pub struct ExistsResult {
    pub exists: bool,
}

#[derive(Debug, Serialize)]
pub struct FileInfoResult {
    pub size: u64,
    /// Modification time, seconds since the unix epoch.
    pub modified: u64,
    /// SHA-256 of the file contents, lowercase hex.
    pub hash: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResult {
    pub message: String,
    pub size: u64,
}

#[derive(Debug, Serialize)]
pub struct DownloadResult {
    /// Base64-encoded file contents.
    pub content: String,
    pub size: u64,
}

#[derive(Debug, Serialize)]
pub struct ListFilesResult {
    pub files: Vec<String>,
    pub full_paths: Vec<String>,
}

// --- Envelope ---

/// `{"success":true}` plus the payload's fields at the top level.
pub fn success<T: Serialize>(payload: T) -> Value {
    let mut value = serde_json::to_value(payload).unwrap_or(Value::Null);
    let map = match &mut value {
        Value::Object(map) => map,
        _ => return serde_json::json!({"success": true}),
    };
    map.insert("success".to_string(), Value::Bool(true));
    value
}

/// `{"success":false,"error":...}`.
pub fn failure(message: impl Into<String>) -> Value {
    serde_json::json!({"success": false, "error": message.into()})
}
