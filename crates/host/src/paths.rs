//! Central path resolution for host data files.
//!
//! Resolved once at startup from: CLI `--data-dir` > `OCGUI_DATA_DIR` env > `~/.ocgui`.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

static DATA_DIR: RwLock<Option<PathBuf>> = RwLock::new(None);

/// Initialize the global data directory. Returns the resolved path.
///
/// Falls back to the temp dir when no home directory can be found.
pub fn init_data_dir(explicit: Option<&Path>) -> PathBuf {
    let dir = if let Some(p) = explicit {
        p.to_path_buf()
    } else if let Ok(env_val) = std::env::var("OCGUI_DATA_DIR") {
        PathBuf::from(env_val)
    } else {
        dirs::home_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(".ocgui")
    };

    let mut guard = DATA_DIR.write().unwrap_or_else(|e| e.into_inner());
    *guard = Some(dir.clone());
    dir
}

/// Return the current data directory, resolving the default on first use.
pub fn data_dir() -> PathBuf {
    let current = DATA_DIR.read().unwrap_or_else(|e| e.into_inner()).clone();
    match current {
        Some(dir) => dir,
        None => init_data_dir(None),
    }
}

pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Key-value slots scoped per workspace (active session and friends)
pub fn workspace_state_path() -> PathBuf {
    data_dir().join("workspace-state.json")
}

/// Create all required subdirectories under the data dir.
pub fn ensure_dirs() -> io::Result<()> {
    let base = data_dir();
    std::fs::create_dir_all(&base)?;
    std::fs::create_dir_all(base.join("logs"))?;
    Ok(())
}
