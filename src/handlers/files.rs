use std::path::Path;
use std::time::UNIX_EPOCH;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::protocol::*;

pub async fn handle_upload(params: Value) -> Value {
    let params: UploadFileParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(e) => return failure(format!("Invalid params: {e}")),
    };

    let bytes = match BASE64.decode(&params.content) {
        Ok(b) => b,
        Err(e) => return failure(format!("Invalid base64 content: {e}")),
    };

    if let Some(parent) = Path::new(&params.path).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return failure(format!("Failed to create directory: {e}"));
            }
        }
    }

    let size = bytes.len() as u64;
    match tokio::fs::write(&params.path, bytes).await {
        Ok(()) => success(UploadResult {
            message: format!("Uploaded {}", params.path),
            size,
        }),
        Err(e) => failure(format!("Failed to write file: {e}")),
    }
}

pub async fn handle_download(params: Value) -> Value {
    let params: PathParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(e) => return failure(format!("Invalid params: {e}")),
    };

    match tokio::fs::read(&params.path).await {
        Ok(bytes) => success(DownloadResult {
            size: bytes.len() as u64,
            content: BASE64.encode(bytes),
        }),
        Err(e) => failure(format!("Failed to read file: {e}")),
    }
}

pub async fn handle_exists(params: Value) -> Value {
    let params: PathParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(e) => return failure(format!("Invalid params: {e}")),
    };

    success(ExistsResult {
        exists: tokio::fs::try_exists(&params.path).await.unwrap_or(false),
    })
}

pub async fn handle_info(params: Value) -> Value {
    let params: PathParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(e) => return failure(format!("Invalid params: {e}")),
    };

    let metadata = match tokio::fs::metadata(&params.path).await {
        Ok(m) => m,
        Err(e) => return failure(format!("Failed to stat file: {e}")),
    };
    if !metadata.is_file() {
        return failure(format!("Not a file: {}", params.path));
    }

    let modified = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let bytes = match tokio::fs::read(&params.path).await {
        Ok(b) => b,
        Err(e) => return failure(format!("Failed to read file: {e}")),
    };
    let hash = format!("{:x}", Sha256::digest(&bytes));

    success(FileInfoResult {
        size: metadata.len(),
        modified,
        hash,
    })
}

pub async fn handle_delete(params: Value) -> Value {
    let params: PathParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(e) => return failure(format!("Invalid params: {e}")),
    };

    match tokio::fs::remove_file(&params.path).await {
        Ok(()) => success(MessageResult {
            message: format!("Deleted {}", params.path),
        }),
        Err(e) => failure(format!("Failed to delete file: {e}")),
    }
}

pub async fn handle_list(params: Value) -> Value {
    let params: ListFilesParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(e) => return failure(format!("Invalid params: {e}")),
    };

    let pattern = params.pattern.as_deref().unwrap_or("*");
    let pattern = match glob::Pattern::new(pattern) {
        Ok(p) => p,
        Err(e) => return failure(format!("Invalid pattern: {e}")),
    };

    let mut entries = match tokio::fs::read_dir(&params.path).await {
        Ok(e) => e,
        Err(e) => return failure(format!("Failed to read directory: {e}")),
    };

    let mut files = Vec::new();
    let mut full_paths = Vec::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => return failure(format!("Failed to read directory: {e}")),
        };
        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_file && pattern.matches(&name) {
            full_paths.push(entry.path().to_string_lossy().into_owned());
            files.push(name);
        }
    }

    files.sort();
    full_paths.sort();
    success(ListFilesResult { files, full_paths })
}
