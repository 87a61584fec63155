// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! Parsing of persona-supplied fenced diff blocks into file operations.
//!
//! Personas reply with prose interleaved with fenced blocks such as:
//!
//! ```text
//! ```diff:src/lib.rs
//! fn main() {}
//! ```
//!
//! ```delete:src/old.rs
//! ```
//! ```
//!
//! Each `diff:<path>` block replaces (or creates) the named file with the
//! fenced content verbatim; each `delete:<path>` block removes it. This is a
//! bespoke format with no existing parser crate in the corpus, so it is
//! hand-rolled and kept intentionally small.

use crate::error::{OrchestratorError, Result};

const MAX_FILE_BYTES: usize = 512 * 1024;
const ALLOWED_EXTENSIONS: &[&str] = &[
    "rs", "toml", "md", "yaml", "yml", "json", "txt", "sh", "js", "ts", "tsx", "jsx", "py", "go",
    "html", "css", "lock",
];

/// A single file mutation derived from a parsed diff block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    Upsert { path: String, content: String },
    Delete { path: String },
}

/// The set of file mutations to apply for one implementation reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditSpec {
    pub ops: Vec<EditOp>,
}

impl EditSpec {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Parses an EditSpec out of free-form persona reply text.
pub fn parse_diff_blocks(text: &str) -> Result<EditSpec> {
    let mut ops = Vec::new();
    let mut lines = text.lines().peekable();

    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();
        let Some(fence) = trimmed.strip_prefix("```") else { continue };

        let (kind, raw_path) = match fence.split_once(':') {
            Some((k, p)) => (k.trim(), p.trim()),
            None => continue,
        };
        if kind != "diff" && kind != "delete" {
            continue;
        }

        let path = normalize_path(raw_path)?;
        validate_extension(&path)?;

        let mut body = String::new();
        for body_line in lines.by_ref() {
            if body_line.trim_start().starts_with("```") {
                break;
            }
            body.push_str(body_line);
            body.push('\n');
        }

        if body.len() > MAX_FILE_BYTES {
            return Err(OrchestratorError::DiffParse(format!(
                "file '{path}' exceeds maximum size of {MAX_FILE_BYTES} bytes"
            )));
        }

        let op = match kind {
            "diff" => EditOp::Upsert { path, content: body },
            "delete" => EditOp::Delete { path },
            _ => unreachable!(),
        };
        ops.push(op);
    }

    Ok(EditSpec { ops })
}

/// Converts pre-parsed ops back into fenced-block text, so callers that
/// receive already-structured edits can still go through [`parse_diff_blocks`]
/// as the single source of truth.
pub fn render_diff_blocks(spec: &EditSpec) -> String {
    let mut out = String::new();
    for op in &spec.ops {
        match op {
            EditOp::Upsert { path, content } => {
                out.push_str(&format!("```diff:{path}\n{content}```\n"));
            }
            EditOp::Delete { path } => {
                out.push_str(&format!("```delete:{path}\n```\n"));
            }
        }
    }
    out
}

fn normalize_path(raw: &str) -> Result<String> {
    let mut path = raw.replace('\\', "/");
    while let Some(stripped) = path.strip_prefix("./") {
        path = stripped.to_string();
    }
    if path.starts_with('/') || path.contains("..") {
        return Err(OrchestratorError::DiffParse(format!(
            "unsafe path in diff block: '{raw}'"
        )));
    }
    if path.trim().is_empty() {
        return Err(OrchestratorError::DiffParse("diff block missing a path".to_string()));
    }
    Ok(path)
}

fn validate_extension(path: &str) -> Result<()> {
    let ext = path.rsplit('.').next().unwrap_or("");
    if ALLOWED_EXTENSIONS.contains(&ext) {
        Ok(())
    } else {
        Err(OrchestratorError::DiffParse(format!(
            "extension '.{ext}' is not permitted for path '{path}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_upsert_and_delete() {
        let text = "Here is the fix:\n\n```diff:src/lib.rs\nfn main() {}\n```\n\nand remove the old file:\n\n```delete:src/old.rs\n```\n";
        let spec = parse_diff_blocks(text).unwrap();
        assert_eq!(spec.ops.len(), 2);
        assert_eq!(
            spec.ops[0],
            EditOp::Upsert { path: "src/lib.rs".to_string(), content: "fn main() {}\n".to_string() }
        );
        assert_eq!(spec.ops[1], EditOp::Delete { path: "src/old.rs".to_string() });
    }

    #[test]
    fn rejects_path_traversal() {
        let text = "```diff:../../etc/passwd\nbad\n```\n";
        assert!(parse_diff_blocks(text).is_err());
    }

    #[test]
    fn rejects_disallowed_extension() {
        let text = "```diff:payload.exe\nbad\n```\n";
        assert!(parse_diff_blocks(text).is_err());
    }

    #[test]
    fn ignores_unrelated_fences() {
        let text = "```rust\nlet x = 1;\n```\n";
        let spec = parse_diff_blocks(text).unwrap();
        assert!(spec.is_empty());
    }

    #[test]
    fn normalizes_dot_slash_prefix() {
        let text = "```diff:./src/main.rs\nfn f() {}\n```\n";
        let spec = parse_diff_blocks(text).unwrap();
        assert_eq!(spec.ops[0], EditOp::Upsert { path: "src/main.rs".to_string(), content: "fn f() {}\n".to_string() });
    }

    #[test]
    fn render_then_parse_round_trips() {
        let spec = EditSpec {
            ops: vec![
                EditOp::Upsert { path: "a.rs".to_string(), content: "x\n".to_string() },
                EditOp::Delete { path: "b.rs".to_string() },
            ],
        };
        let rendered = render_diff_blocks(&spec);
        let reparsed = parse_diff_blocks(&rendered).unwrap();
        assert_eq!(spec, reparsed);
    }
}
