//! Context attachment actions
//!
//! Turn editor state (active file, picked files, symbols, the working tree
//! diff) into prompt text and hand it to the session send path.

use std::sync::Arc;

use ocgui_protocol::editor::{InputOptions, PickItem};
use ocgui_protocol::{
    parse_file_reference, to_file_reference, to_workspace_relative_path, HostMessage, LineRange,
};
use tracing::warn;

use crate::context_payload::{
    build_file_context_payload, build_files_context_payload, build_git_diff_context_payload,
    build_symbol_context_payload, GIT_DIFF_MAX_CHARS,
};
use crate::git::working_tree_diff;
use crate::menus::AttachMenuAction;
use crate::session_actions::{SessionActions, SessionHost};
use crate::workbench::Workbench;

const FILE_PICKER_LIMIT: usize = 500;
const SYMBOL_PICKER_LIMIT: usize = 100;

pub struct ContextActions<'a, H: SessionHost + ?Sized> {
    host: &'a mut H,
    wb: Arc<dyn Workbench>,
}

impl<'a, H: SessionHost + ?Sized> ContextActions<'a, H> {
    pub fn new(host: &'a mut H) -> Self {
        let wb = host.workbench();
        Self { host, wb }
    }

    pub async fn copy_active_file_reference(&mut self) {
        let Some(reference) = self.active_file_reference().await else {
            self.wb.info("No active file in current workspace").await;
            return;
        };
        self.wb.write_clipboard(&reference).await;
        self.host
            .post_primary(HostMessage::ShowFileReference {
                reference: reference.clone(),
            })
            .await;
        self.wb.info(&format!("Copied {reference}")).await;
    }

    pub async fn send_active_context(&mut self) {
        let Some(reference) = self.active_file_reference().await else {
            self.wb.info("No active file in current workspace").await;
            return;
        };
        self.send(
            &build_file_context_payload(&reference),
            &format!("Sent context to OpenCode: {reference}"),
        )
        .await;
    }

    pub async fn attach_file_context(&mut self) {
        let files = self.wb.workspace_files().await;
        if files.is_empty() {
            self.wb.info("No files found in workspace").await;
            return;
        }

        let files: Vec<String> = files.into_iter().take(FILE_PICKER_LIMIT).collect();
        let items = files.iter().map(PickItem::new).collect();
        let Some(path) = self
            .wb
            .quick_pick("Attach File Context", items)
            .await
            .and_then(|index| files.get(index))
        else {
            return;
        };

        let reference = to_file_reference(path, None);
        self.send(
            &build_file_context_payload(&reference),
            &format!("Attached file context: {reference}"),
        )
        .await;
    }

    /// Attach files selected in the explorer, given as absolute paths.
    pub async fn attach_explorer_files(&mut self, paths: &[String]) {
        if paths.is_empty() {
            self.wb.info("No file selected in explorer").await;
            return;
        }

        let folders = self.wb.workspace_folders().await;
        let mut references: Vec<String> = Vec::new();
        for path in paths {
            let Some(relative) = relative_to_folders(path, &folders) else {
                continue;
            };
            let reference = to_file_reference(&relative, None);
            if !references.contains(&reference) {
                references.push(reference);
            }
        }

        if references.is_empty() {
            self.wb.info("Selected files are not in workspace").await;
            return;
        }

        let payload = build_files_context_payload(&references);
        if payload.is_empty() {
            return;
        }
        let success = match references.as_slice() {
            [only] => format!("Attached file context: {only}"),
            many => format!("Attached {} files as context", many.len()),
        };
        self.send(&payload, &success).await;
    }

    pub async fn attach_symbol_context(&mut self) {
        let query = self
            .wb
            .input_box(InputOptions {
                title: "Attach Symbol Context".into(),
                prompt: "Enter symbol search query".into(),
                placeholder: Some("function or class name".into()),
                required: true,
                ..Default::default()
            })
            .await;
        let Some(query) = query.filter(|q| !q.trim().is_empty()) else {
            return;
        };

        let symbols = self.wb.workspace_symbols(&query).await;
        if symbols.is_empty() {
            self.wb.info("No symbols found").await;
            return;
        }

        let symbols: Vec<_> = symbols.into_iter().take(SYMBOL_PICKER_LIMIT).collect();
        let items = symbols
            .iter()
            .map(|symbol| {
                let kind = if symbol.kind.is_empty() {
                    "Symbol"
                } else {
                    symbol.kind.as_str()
                };
                PickItem::new(symbol.name.clone())
                    .description(kind)
                    .detail(format!("{}:{}", symbol.path, symbol.start_line))
            })
            .collect();
        let Some(symbol) = self
            .wb
            .quick_pick("Select Symbol", items)
            .await
            .and_then(|index| symbols.get(index))
        else {
            return;
        };

        let range = LineRange::new(
            symbol.start_line,
            symbol.start_line.max(symbol.end_line),
        );
        let reference = to_file_reference(&symbol.path, Some(range));
        self.send(
            &build_symbol_context_payload(&symbol.name, &reference),
            &format!("Attached symbol context: {}", symbol.name),
        )
        .await;
    }

    pub async fn attach_git_diff_context(&mut self) {
        let Some(cwd) = self.host.default_directory().await else {
            self.wb.info("No workspace directory available").await;
            return;
        };

        let diff = match working_tree_diff(&cwd).await {
            Ok(diff) => diff,
            Err(e) => {
                warn!(
                    component = "context_actions",
                    event = "context.git_diff_failed",
                    cwd = %cwd,
                    error = %e,
                    "git diff failed"
                );
                self.wb
                    .error(&format!("Failed to read git diff: {e}"))
                    .await;
                return;
            }
        };

        let payload = build_git_diff_context_payload(&diff, GIT_DIFF_MAX_CHARS);
        if payload.text.is_empty() {
            self.wb.info("No unstaged git diff to attach").await;
            return;
        }
        let success = if payload.truncated {
            "Attached git diff (truncated)"
        } else {
            "Attached git diff"
        };
        self.send(&payload.text, success).await;
    }

    pub async fn attach_actions(&mut self) {
        let items = AttachMenuAction::ALL
            .iter()
            .map(|action| PickItem::new(action.label()))
            .collect();
        let Some(action) = self
            .wb
            .quick_pick("OpenCode Attach Context", items)
            .await
            .and_then(|index| AttachMenuAction::ALL.get(index).copied())
        else {
            return;
        };

        match action {
            AttachMenuAction::Active => self.send_active_context().await,
            AttachMenuAction::File => self.attach_file_context().await,
            AttachMenuAction::Symbol => self.attach_symbol_context().await,
            AttachMenuAction::Diff => self.attach_git_diff_context().await,
        }
    }

    /// Prompt for a file reference (prefilled from the clipboard) and open it.
    pub async fn open_reference_in_editor(&mut self) {
        let clipboard = self.wb.read_clipboard().await;
        let prefill = parse_file_reference(&clipboard).map(|_| clipboard.clone());
        let value = self
            .wb
            .input_box(InputOptions {
                title: "Open File Reference".into(),
                prompt: "Use @path or @path#Lx / @path#Lx-y".into(),
                value: Some(prefill.unwrap_or_default()),
                placeholder: Some("@src/index.ts#L42".into()),
                ..Default::default()
            })
            .await;
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            return;
        };

        let Some(parsed) = parse_file_reference(&value).filter(|r| !r.path.is_empty()) else {
            self.wb.error("Invalid file reference").await;
            return;
        };
        let Some(path) = to_workspace_relative_path(&parsed.path) else {
            self.wb.error("Invalid file reference").await;
            return;
        };

        if !self.wb.open_file(&path, parsed.range).await {
            self.wb
                .error(&format!("File not found in workspace: {}", parsed.path))
                .await;
        }
    }

    // -- Helpers ----------------------------------------------------------------

    async fn active_file_reference(&self) -> Option<String> {
        let active = self.wb.active_file().await?;
        let relative = to_workspace_relative_path(&active.path)?;
        Some(to_file_reference(&relative, active.selection))
    }

    async fn send(&mut self, text: &str, success: &str) {
        SessionActions::new(&mut *self.host)
            .send_text_context(text, success)
            .await;
    }
}

/// Path relative to the first workspace folder containing it.
fn relative_to_folders(path: &str, folders: &[String]) -> Option<String> {
    let path = path.replace('\\', "/");
    folders.iter().find_map(|folder| {
        let folder = folder.replace('\\', "/");
        let rest = path.strip_prefix(folder.trim_end_matches('/'))?;
        let rest = rest.strip_prefix('/')?;
        to_workspace_relative_path(rest)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeHost, FakeServer, Said};
    use ocgui_protocol::editor::{ActiveFile, SymbolHit};
    use ocgui_protocol::SessionInfo;

    #[test]
    fn explorer_paths_resolve_against_workspace_folders() {
        let folders = vec!["/w/app".to_string(), "/w/lib/".to_string()];
        assert_eq!(
            relative_to_folders("/w/app/src/a.rs", &folders).as_deref(),
            Some("src/a.rs")
        );
        assert_eq!(
            relative_to_folders("/w/lib/b.rs", &folders).as_deref(),
            Some("b.rs")
        );
        assert_eq!(relative_to_folders("/w/application/x.rs", &folders), None);
        assert_eq!(relative_to_folders("/elsewhere/x.rs", &folders), None);
        assert_eq!(relative_to_folders("/w/app", &folders), None);
    }

    #[tokio::test]
    async fn copy_reference_posts_to_primary_surface() {
        let server = FakeServer::start().await;
        let mut host = FakeHost::new(&server.url);
        host.wb.set_active_file(Some(ActiveFile {
            path: "src/a.rs".into(),
            selection: Some(LineRange::new(9, 4)),
        }));

        ContextActions::new(&mut host)
            .copy_active_file_reference()
            .await;

        assert_eq!(host.wb.clipboard(), "@src/a.rs#L4-9");
        assert_eq!(
            host.posted,
            [HostMessage::ShowFileReference {
                reference: "@src/a.rs#L4-9".into()
            }]
        );
        assert_eq!(host.wb.said(), [Said::Info("Copied @src/a.rs#L4-9".into())]);
    }

    #[tokio::test]
    async fn missing_active_file_is_reported() {
        let server = FakeServer::start().await;
        let mut host = FakeHost::new(&server.url);

        ContextActions::new(&mut host).send_active_context().await;

        assert_eq!(
            host.wb.said(),
            [Said::Info("No active file in current workspace".into())]
        );
        assert!(server.prompts().is_empty());
    }

    #[tokio::test]
    async fn explorer_selection_is_deduplicated_into_one_prompt() {
        let server = FakeServer::start().await;
        let mut host = FakeHost::new(&server.url);
        host.active = Some(SessionInfo::new("s1", "/w"));
        host.wb.set_folders(&["/w"]);

        ContextActions::new(&mut host)
            .attach_explorer_files(&[
                "/w/a.rs".into(),
                "/w/b.rs".into(),
                "/w/a.rs".into(),
                "/tmp/outside.rs".into(),
            ])
            .await;

        assert_eq!(
            server.prompt_texts(),
            ["Use these files as context:\n- In @a.rs\n- In @b.rs"]
        );
        assert_eq!(
            host.wb.said(),
            [Said::Info("Attached 2 files as context".into())]
        );
    }

    #[tokio::test]
    async fn explorer_selection_outside_workspace_is_rejected() {
        let server = FakeServer::start().await;
        let mut host = FakeHost::new(&server.url);
        host.wb.set_folders(&["/w"]);

        ContextActions::new(&mut host)
            .attach_explorer_files(&["/tmp/x.rs".into()])
            .await;

        assert_eq!(
            host.wb.said(),
            [Said::Info("Selected files are not in workspace".into())]
        );
    }

    #[tokio::test]
    async fn symbol_attachment_uses_ranged_reference() {
        let server = FakeServer::start().await;
        let mut host = FakeHost::new(&server.url);
        host.active = Some(SessionInfo::new("s1", "/w"));
        host.wb.set_symbols(vec![SymbolHit {
            name: "parse".into(),
            kind: "Function".into(),
            path: "src/lib.rs".into(),
            start_line: 12,
            end_line: 30,
        }]);
        host.wb.push_input(Some("parse".into()));
        host.wb.push_pick(Some(0));

        ContextActions::new(&mut host).attach_symbol_context().await;

        assert_eq!(
            server.prompt_texts(),
            ["Focus on symbol parse in @src/lib.rs#L12-30"]
        );
        assert_eq!(
            host.wb.pick_items(0),
            [PickItem::new("parse")
                .description("Function")
                .detail("src/lib.rs:12")]
        );
    }

    #[tokio::test]
    async fn open_reference_prefills_from_clipboard() {
        let server = FakeServer::start().await;
        let mut host = FakeHost::new(&server.url);
        host.wb.set_files(&["src/a.rs"]);
        host.wb.set_clipboard("@src/a.rs#L3");
        host.wb.push_input(Some("@src/a.rs#L3".into()));

        ContextActions::new(&mut host)
            .open_reference_in_editor()
            .await;

        assert_eq!(
            host.wb.inputs_shown()[0].value.as_deref(),
            Some("@src/a.rs#L3")
        );
        assert_eq!(
            host.wb.opened_files(),
            [("src/a.rs".to_string(), Some(LineRange::single(3)))]
        );
    }

    #[tokio::test]
    async fn open_reference_reports_invalid_and_missing_files() {
        let server = FakeServer::start().await;
        let mut host = FakeHost::new(&server.url);
        host.wb.set_clipboard("not a reference");
        host.wb.push_input(Some("nope".into()));
        host.wb.push_input(Some("@src/missing.rs".into()));

        let mut actions = ContextActions::new(&mut host);
        actions.open_reference_in_editor().await;
        actions.open_reference_in_editor().await;

        assert_eq!(host.wb.inputs_shown()[0].value.as_deref(), Some(""));
        assert_eq!(
            host.wb.said(),
            [
                Said::Error("Invalid file reference".into()),
                Said::Error("File not found in workspace: src/missing.rs".into()),
            ]
        );
    }

    #[tokio::test]
    async fn attach_menu_dispatches_to_file_picker() {
        let server = FakeServer::start().await;
        let mut host = FakeHost::new(&server.url);
        host.active = Some(SessionInfo::new("s1", "/w"));
        host.wb.set_files(&["README.md", "src/main.rs"]);
        host.wb.push_pick(Some(1));
        host.wb.push_pick(Some(1));

        ContextActions::new(&mut host).attach_actions().await;

        assert_eq!(
            host.wb.pick_titles(),
            ["OpenCode Attach Context", "Attach File Context"]
        );
        assert_eq!(server.prompt_texts(), ["In @src/main.rs"]);
        assert_eq!(
            host.wb.said(),
            [Said::Info("Attached file context: @src/main.rs".into())]
        );
    }
}
