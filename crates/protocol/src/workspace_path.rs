//! Workspace-relative path validation

/// Normalize a user-supplied path into a safe workspace-relative form.
///
/// Absolute paths, drive-letter paths and any `.`/`..` segment are rejected.
pub fn to_workspace_relative_path(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let normalized = trimmed.replace('\\', "/");
    if normalized.contains('\0') || normalized.starts_with('/') || has_drive_prefix(&normalized) {
        return None;
    }

    let segments: Vec<&str> = normalized
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.is_empty() || segments.iter().any(|s| *s == "." || *s == "..") {
        return None;
    }
    Some(segments.join("/"))
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/'
}
