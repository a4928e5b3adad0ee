pub mod browser;
pub mod files;
pub mod shell;

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::protocol::*;
use crate::state::DaemonState;

/// Dispatch a command to the appropriate handler.
pub async fn dispatch(command: &Command, state: Arc<DaemonState>) -> Value {
    let start = Instant::now();
    let action = command.action.to_ascii_lowercase();
    let params = command.params_value();

    debug!("[dispatch] → action={action}");

    let response = match action.as_str() {
        ACTION_SHELL_START => shell::handle_start(params, &state).await,
        ACTION_SHELL_INPUT => shell::handle_input(params, &state).await,
        ACTION_SHELL_OUTPUT => shell::handle_output(&state).await,
        ACTION_SHELL_STOP => shell::handle_stop(&state).await,
        ACTION_SHELL_STATUS => shell::handle_status(&state).await,
        ACTION_LAUNCH_BROWSER => browser::handle_launch(params).await,
        ACTION_UPLOAD_FILE => files::handle_upload(params).await,
        ACTION_DOWNLOAD_FILE => files::handle_download(params).await,
        ACTION_FILE_EXISTS => files::handle_exists(params).await,
        ACTION_FILE_INFO => files::handle_info(params).await,
        ACTION_DELETE_FILE => files::handle_delete(params).await,
        ACTION_LIST_FILES => files::handle_list(params).await,
        _ => {
            warn!("[dispatch] Unknown action: {action}");
            failure("Unknown action")
        }
    };

    let elapsed = start.elapsed();
    let is_error = response.get("success") == Some(&Value::Bool(false));

    if is_error {
        info!("[dispatch] ← action={action} error elapsed={elapsed:?}");
    } else {
        debug!("[dispatch] ← action={action} ok elapsed={elapsed:?}");
    }

    response
}
