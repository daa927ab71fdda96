//! Host → Surface messages

use serde::{Deserialize, Serialize};

/// Messages posted by the host to an embedded surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HostMessage {
    /// Point the content frame at `url`
    Navigate { url: String },
    /// Reload the content frame in place
    Reload,
    /// Surface a copied file reference in the status line
    ShowFileReference { reference: String },
}
