use std::path::PathBuf;

use serde_json::Value;
use tracing::info;

use crate::protocol::*;
use crate::state::DaemonState;

pub async fn handle_start(params: Value, state: &DaemonState) -> Value {
    let params: ShellStartParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(e) => return failure(format!("Invalid params: {e}")),
    };

    let dir = params
        .working_directory
        .map(PathBuf::from)
        .or_else(|| state.default_working_dir.clone());

    match state.shell.start(dir).await {
        Ok(()) => success(MessageResult {
            message: "Shell started".to_string(),
        }),
        Err(e) => failure(e.to_string()),
    }
}

/// Send one line of input, restarting the shell and retrying exactly once if
/// it turns out to have died. The retry only applies to sessions that have
/// been started before; input against a never-started session fails without
/// spawning anything.
pub async fn handle_input(params: Value, state: &DaemonState) -> Value {
    let params: ShellInputParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(e) => return failure(format!("Invalid params: {e}")),
    };

    let first = match state.shell.send_input(&params.input).await {
        Ok(()) => {
            return success(MessageResult {
                message: "Command sent".to_string(),
            })
        }
        Err(e) => e,
    };

    if !state.shell.ever_started().await {
        return failure(first.to_string());
    }

    info!("Shell input failed ({first}), attempting restart");
    if let Err(restart) = state.shell.try_restart().await {
        return failure(format!("{first} (restart failed: {restart})"));
    }

    match state.shell.send_input(&params.input).await {
        Ok(()) => success(MessageResult {
            message: "Command sent after restart".to_string(),
        }),
        Err(retry) => failure(format!("{first} (retry failed: {retry})")),
    }
}

pub async fn handle_output(state: &DaemonState) -> Value {
    let output = state.shell.read_output().await;
    let error = state.shell.read_error().await;
    success(OutputResult {
        output: block(output),
        error: block(error),
    })
}

/// Join drained lines into a newline-terminated block, so blocks from
/// successive polls concatenate cleanly at the client.
fn block(lines: Vec<String>) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

pub async fn handle_stop(state: &DaemonState) -> Value {
    state.shell.stop().await;
    success(MessageResult {
        message: "Shell stopped".to_string(),
    })
}

pub async fn handle_status(state: &DaemonState) -> Value {
    success(StatusResult {
        running: state.shell.is_running().await,
    })
}
