//! ocgui Protocol
//!
//! Shared types for communication between the ocgui host, the embedded
//! opencode surfaces and the editor extension that drives it.
//! These types are serialized as JSON, one message per line.

use uuid::Uuid;

// Re-exports
pub mod client;
pub mod editor;
pub mod host;
pub mod reference;
pub mod session_url;
pub mod types;
pub mod workspace_path;

pub use client::ClientMessage;
pub use editor::{EditorCommand, EditorReply, EditorRequest, InboundFrame, OutboundFrame};
pub use host::HostMessage;
pub use reference::{parse_file_reference, to_file_reference, FileReference, LineRange};
pub use session_url::{build_session_url, parse_session_url, restore_frame_url};
pub use types::*;
pub use workspace_path::to_workspace_relative_path;

/// Generate a new unique ID
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
