//! Source document loading.
//!
//! Walks the data directory and turns each supported file into one or more
//! [`LoadedDocument`]s:
//!
//! | Extension | Documents |
//! |-----------|-----------|
//! | `.txt`, `.md`, `.py` | the whole file |
//! | `.ipynb` | one per non-empty cell, tagged with the cell type |
//! | `.pdf` | one per page |
//!
//! A file that cannot be read or parsed is logged and skipped; it never
//! aborts the load. Loading as a whole fails only when the directory is
//! missing or nothing at all could be loaded.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::DataConfig;

/// A unit of raw text ready for chunking.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    /// Path relative to the data directory, plus `#cell-N` / `#page-N`
    /// for notebooks and PDFs.
    pub source: String,
    pub text: String,
}

pub fn load_documents(config: &DataConfig) -> Result<Vec<LoadedDocument>> {
    let root = &config.dir;
    if !root.is_dir() {
        bail!("Data directory does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;
    let mut default_excludes = vec!["**/.git/**".to_string(), "**/.ipynb_checkpoints/**".to_string()];
    default_excludes.extend(config.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&default_excludes)?;

    let mut paths = Vec::new();
    for entry in WalkDir::new(root).follow_links(config.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let rel_str = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }
        paths.push((path.to_path_buf(), rel_str));
    }
    paths.sort_by(|a, b| a.1.cmp(&b.1));

    let mut docs = Vec::new();
    for (path, rel_str) in &paths {
        match load_file(path, rel_str) {
            Ok(Some(mut loaded)) => docs.append(&mut loaded),
            Ok(None) => debug!(file = %rel_str, "unsupported extension, skipping"),
            Err(e) => warn!(file = %rel_str, error = %e, "failed to load file, skipping"),
        }
    }

    if docs.is_empty() {
        bail!("No documents could be loaded from {}", root.display());
    }

    info!(
        documents = docs.len(),
        files = paths.len(),
        dir = %root.display(),
        "loaded raw documents"
    );
    Ok(docs)
}

/// Load one file. `Ok(None)` means the extension is not supported.
fn load_file(path: &Path, rel_str: &str) -> Result<Option<Vec<LoadedDocument>>> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let docs = match ext.as_str() {
        "txt" | "md" | "py" => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            whole_file(rel_str, text)
        }
        "ipynb" => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            notebook_cells(rel_str, &raw)?
        }
        "pdf" => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let text = pdf_extract::extract_text_from_mem(&bytes)
                .map_err(|e| anyhow::anyhow!("PDF extraction failed: {}", e))?;
            pdf_pages(rel_str, &text)
        }
        _ => return Ok(None),
    };
    Ok(Some(docs))
}

fn whole_file(source: &str, text: String) -> Vec<LoadedDocument> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    vec![LoadedDocument {
        source: source.to_string(),
        text,
    }]
}

/// One document per non-empty notebook cell. Cell `source` may be a string
/// or a list of lines.
fn notebook_cells(source: &str, raw: &str) -> Result<Vec<LoadedDocument>> {
    let nb: serde_json::Value = serde_json::from_str(raw).context("Invalid notebook JSON")?;
    let cells = nb
        .get("cells")
        .and_then(|c| c.as_array())
        .ok_or_else(|| anyhow::anyhow!("Notebook has no cells array"))?;

    let mut docs = Vec::new();
    for (i, cell) in cells.iter().enumerate() {
        let cell_type = cell
            .get("cell_type")
            .and_then(|t| t.as_str())
            .unwrap_or("unknown");
        let body = match cell.get("source") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Array(lines)) => {
                lines.iter().filter_map(|l| l.as_str()).collect::<String>()
            }
            _ => String::new(),
        };
        if body.trim().is_empty() {
            continue;
        }
        docs.push(LoadedDocument {
            source: format!("{}#cell-{}", source, i),
            text: format!("[{} cell]\n{}", cell_type, body.trim_end()),
        });
    }
    Ok(docs)
}

/// Split extracted PDF text into pages on form feeds. Text without form
/// feeds counts as a single page.
fn pdf_pages(source: &str, text: &str) -> Vec<LoadedDocument> {
    text.split('\x0c')
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(i, page)| LoadedDocument {
            source: format!("{}#page-{}", source, i + 1),
            text: page.trim().to_string(),
        })
        .collect()
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn data_config(dir: &Path) -> DataConfig {
        DataConfig {
            dir: dir.to_path_buf(),
            include_globs: vec!["**/*".to_string()],
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }

    #[test]
    fn test_loads_text_formats_and_skips_unknown() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.md"), "# Title\n\nBody").unwrap();
        fs::write(tmp.path().join("b.txt"), "plain").unwrap();
        fs::write(tmp.path().join("c.py"), "print('hi')").unwrap();
        fs::write(tmp.path().join("d.csv"), "x,y").unwrap();

        let docs = load_documents(&data_config(tmp.path())).unwrap();
        let sources: Vec<_> = docs.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(sources, vec!["a.md", "b.txt", "c.py"]);
        assert_eq!(docs[1].text, "plain");
    }

    #[test]
    fn test_notebook_cells() {
        let nb = r##"{
            "cells": [
                {"cell_type": "markdown", "source": ["# Intro\n", "Some text"]},
                {"cell_type": "code", "source": "x = 1"},
                {"cell_type": "code", "source": []}
            ]
        }"##;
        let docs = notebook_cells("nb.ipynb", nb).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source, "nb.ipynb#cell-0");
        assert_eq!(docs[0].text, "[markdown cell]\n# Intro\nSome text");
        assert_eq!(docs[1].text, "[code cell]\nx = 1");
    }

    #[test]
    fn test_broken_notebook_is_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("bad.ipynb"), "{not json").unwrap();
        fs::write(tmp.path().join("ok.txt"), "fine").unwrap();
        let docs = load_documents(&data_config(tmp.path())).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source, "ok.txt");
    }

    #[test]
    fn test_pdf_pages_split_on_form_feed() {
        let pages = pdf_pages("doc.pdf", "page one\x0cpage two\x0c  \x0c");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].source, "doc.pdf#page-1");
        assert_eq!(pages[1].text, "page two");
    }

    #[test]
    fn test_missing_dir_errors() {
        let tmp = TempDir::new().unwrap();
        let err = load_documents(&data_config(&tmp.path().join("nope"))).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_nothing_loadable_errors() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("image.png"), [0u8, 1, 2]).unwrap();
        fs::write(tmp.path().join("empty.md"), "   ").unwrap();
        let err = load_documents(&data_config(tmp.path())).unwrap_err();
        assert!(err.to_string().contains("No documents"));
    }

    #[test]
    fn test_globs_and_recursion() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("notes/draft")).unwrap();
        fs::write(tmp.path().join("notes/keep.md"), "keep").unwrap();
        fs::write(tmp.path().join("notes/draft/skip.md"), "skip").unwrap();
        fs::write(tmp.path().join("top.txt"), "top").unwrap();

        let mut config = data_config(tmp.path());
        config.include_globs = vec!["**/*.md".to_string()];
        config.exclude_globs = vec!["**/draft/**".to_string()];

        let docs = load_documents(&config).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source, "notes/keep.md");
    }
}
