use serde_json::Value;
use tokio::process::Command;
use tracing::info;

use crate::protocol::*;

pub async fn handle_launch(params: Value) -> Value {
    let params: LaunchBrowserParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(e) => return failure(format!("Invalid params: {e}")),
    };

    let url = params.url.trim();
    if url.is_empty() {
        return failure("URL cannot be empty");
    }

    info!("Launching browser for {url}");
    match opener(url).spawn() {
        Ok(_) => success(MessageResult {
            message: format!("Launched browser with URL: {url}"),
        }),
        Err(e) => failure(format!("Failed to launch browser: {e}")),
    }
}

/// Platform command that opens a URL in the default browser.
fn opener(url: &str) -> Command {
    #[cfg(target_os = "windows")]
    {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", "", url]);
        command
    }
    #[cfg(target_os = "macos")]
    {
        let mut command = Command::new("open");
        command.arg(url);
        command
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let mut command = Command::new("xdg-open");
        command.arg(url);
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn empty_url_is_rejected() {
        let response = handle_launch(json!({"url": "  "})).await;
        assert_eq!(
            response,
            json!({"success": false, "error": "URL cannot be empty"})
        );
    }

    #[tokio::test]
    async fn missing_url_is_invalid_params() {
        let response = handle_launch(json!({})).await;
        assert_eq!(response["success"], json!(false));
    }
}
