//! Prompt text for attached context

pub const GIT_DIFF_MAX_CHARS: usize = 14_000;

pub fn build_file_context_payload(file_ref: &str) -> String {
    format!("In {file_ref}")
}

/// Blank references are skipped; a single reference reads like
/// [`build_file_context_payload`].
pub fn build_files_context_payload<S: AsRef<str>>(file_refs: &[S]) -> String {
    let refs: Vec<&str> = file_refs
        .iter()
        .map(|r| r.as_ref().trim())
        .filter(|r| !r.is_empty())
        .collect();
    match refs.as_slice() {
        [] => String::new(),
        [only] => build_file_context_payload(only),
        many => {
            let lines: Vec<String> = many.iter().map(|r| format!("- In {r}")).collect();
            format!("Use these files as context:\n{}", lines.join("\n"))
        }
    }
}

pub fn build_symbol_context_payload(symbol: &str, file_ref: &str) -> String {
    format!("Focus on symbol {symbol} in {file_ref}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitDiffPayload {
    pub text: String,
    pub truncated: bool,
}

pub fn build_git_diff_context_payload(diff: &str, max_chars: usize) -> GitDiffPayload {
    let raw = diff.trim();
    if raw.is_empty() {
        return GitDiffPayload {
            text: String::new(),
            truncated: false,
        };
    }

    let (body, truncated) = match raw.char_indices().nth(max_chars) {
        Some((cut, _)) => (&raw[..cut], true),
        None => (raw, false),
    };
    let suffix = if truncated {
        "\n\n[diff truncated to fit context window]"
    } else {
        ""
    };

    GitDiffPayload {
        text: format!("Use this git diff as context:\n\n```diff\n{body}\n```{suffix}"),
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_payload_shapes() {
        assert_eq!(build_files_context_payload::<&str>(&[]), "");
        assert_eq!(build_files_context_payload(&[" ", "@a.rs"]), "In @a.rs");
        assert_eq!(
            build_files_context_payload(&["@a.rs", "@b.rs#L2"]),
            "Use these files as context:\n- In @a.rs\n- In @b.rs#L2"
        );
    }

    #[test]
    fn symbol_payload() {
        assert_eq!(
            build_symbol_context_payload("Parser", "@src/p.rs#L3-9"),
            "Focus on symbol Parser in @src/p.rs#L3-9"
        );
    }

    #[test]
    fn git_diff_is_fenced() {
        let payload = build_git_diff_context_payload("\n+added\n", GIT_DIFF_MAX_CHARS);
        assert!(!payload.truncated);
        assert_eq!(
            payload.text,
            "Use this git diff as context:\n\n```diff\n+added\n```"
        );
    }

    #[test]
    fn git_diff_is_truncated() {
        let payload = build_git_diff_context_payload("abcdef", 3);
        assert!(payload.truncated);
        assert!(payload.text.contains("```diff\nabc\n```"));
        assert!(payload
            .text
            .ends_with("[diff truncated to fit context window]"));
    }

    #[test]
    fn empty_diff_yields_empty_payload() {
        let payload = build_git_diff_context_payload("  \n ", 10);
        assert_eq!(payload.text, "");
        assert!(!payload.truncated);
    }
}
