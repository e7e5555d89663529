//! Open a finished PDF in the platform's default viewer.

use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// The command line used to open `path` on this platform.
pub fn viewer_command(path: &Path) -> Command {
    let mut cmd = if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else if cfg!(target_os = "macos") {
        Command::new("open")
    } else {
        Command::new("xdg-open")
    };
    cmd.arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    cmd
}

/// Launch the default viewer for `path` without waiting for it.
///
/// Returns `false` (and logs) if the viewer could not be started; this never
/// fails the run.
pub fn open_in_viewer(path: &Path) -> bool {
    match viewer_command(path).spawn() {
        Ok(child) => {
            debug!("Viewer started (pid {}) for {}", child.id(), path.display());
            true
        }
        Err(e) => {
            warn!("Could not open {} in a viewer: {}", path.display(), e);
            false
        }
    }
}
