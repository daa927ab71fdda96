//! Editor collaborator
//!
//! Everything the host needs from the editor: dialogs, clipboard, surfaces,
//! the status bar and workspace queries. The stdio bridge implements this by
//! sending `EditorRequest` frames; tests use scripted fakes.

use async_trait::async_trait;
use ocgui_protocol::editor::{
    ActiveFile, InputOptions, MessageLevel, PickItem, SurfaceContent, SymbolHit,
};
use ocgui_protocol::{HostMessage, LineRange, Surface};

#[async_trait]
pub trait Workbench: Send + Sync {
    async fn show_message(&self, level: MessageLevel, message: &str);

    /// Modal confirmation; true when `action` was chosen.
    async fn confirm(&self, message: &str, action: &str) -> bool;

    /// Index of the picked item, `None` when dismissed.
    async fn quick_pick(&self, title: &str, items: Vec<PickItem>) -> Option<usize>;

    /// Entered text, `None` when dismissed.
    async fn input_box(&self, options: InputOptions) -> Option<String>;

    async fn read_clipboard(&self) -> String;
    async fn write_clipboard(&self, text: &str);

    /// Focus the sidebar view.
    async fn reveal_view(&self);
    async fn open_panel(&self);
    async fn render_surface(&self, surface: Surface, content: SurfaceContent);
    async fn post_message(&self, surface: Surface, message: HostMessage);
    async fn set_status(&self, text: &str, tooltip: &str);
    async fn open_document(&self, content: &str, language: &str);

    /// Open a workspace-relative file; false when it does not exist.
    async fn open_file(&self, path: &str, range: Option<LineRange>) -> bool;

    async fn active_file(&self) -> Option<ActiveFile>;

    /// Workspace-relative paths, excluding build and VCS directories.
    async fn workspace_files(&self) -> Vec<String>;
    async fn workspace_symbols(&self, query: &str) -> Vec<SymbolHit>;
    async fn workspace_folders(&self) -> Vec<String>;

    /// Folder of the active editor, else the first workspace folder.
    async fn default_directory(&self) -> Option<String>;

    async fn info(&self, message: &str) {
        self.show_message(MessageLevel::Info, message).await;
    }

    async fn error(&self, message: &str) {
        self.show_message(MessageLevel::Error, message).await;
    }
}
