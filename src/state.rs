use std::path::PathBuf;

use crate::shell::ShellSession;

/// Daemon-wide shared state.
pub struct DaemonState {
    /// The single shell session this daemon manages.
    pub shell: ShellSession,

    /// Default working directory for shell starts, from the CLI.
    pub default_working_dir: Option<PathBuf>,
}

impl DaemonState {
    pub fn new(default_working_dir: Option<PathBuf>) -> Self {
        Self {
            shell: ShellSession::new(),
            default_working_dir,
        }
    }
}
