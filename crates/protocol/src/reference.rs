//! `@path#Lstart-end` file references
//!
//! The textual form agents and users paste around: `@src/a.rs`,
//! `@src/a.rs#L4` or `@src/a.rs#L4-9`. Paths always use forward slashes.

use serde::{Deserialize, Serialize};

/// Inclusive, 1-based line range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start_line: u32,
    pub end_line: u32,
}

impl LineRange {
    /// Build a range, swapping inverted bounds.
    pub fn new(start_line: u32, end_line: u32) -> Self {
        if start_line <= end_line {
            Self {
                start_line,
                end_line,
            }
        } else {
            Self {
                start_line: end_line,
                end_line: start_line,
            }
        }
    }

    pub fn single(line: u32) -> Self {
        Self::new(line, line)
    }
}

/// A parsed file reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReference {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<LineRange>,
}

pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

pub fn to_file_reference(path: &str, range: Option<LineRange>) -> String {
    let normalized = normalize_path(path);
    match range {
        None => format!("@{normalized}"),
        Some(r) if r.start_line == r.end_line => format!("@{normalized}#L{}", r.start_line),
        Some(r) => format!("@{normalized}#L{}-{}", r.start_line, r.end_line),
    }
}

pub fn parse_file_reference(input: &str) -> Option<FileReference> {
    let body = input.trim().strip_prefix('@')?;
    if body.is_empty() {
        return None;
    }

    let Some((raw_path, suffix)) = body.split_once('#') else {
        return Some(FileReference {
            path: normalize_path(body),
            range: None,
        });
    };

    if raw_path.is_empty() {
        return None;
    }

    Some(FileReference {
        path: normalize_path(raw_path),
        range: parse_range(suffix),
    })
}

fn parse_range(input: &str) -> Option<LineRange> {
    let digits = input.strip_prefix('L')?;
    match digits.split_once('-') {
        None => parse_line(digits).map(LineRange::single),
        Some((start, end)) => {
            let start = parse_line(start)?;
            let end = parse_line(end)?;
            Some(LineRange::new(start, end))
        }
    }
}

fn parse_line(input: &str) -> Option<u32> {
    if input.is_empty() || !input.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    input.parse::<u32>().ok().filter(|line| *line >= 1)
}
