use anyhow::{bail, Result};
use chrono::{TimeZone, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::IndexConfig;
use crate::extract::{content_type_for, extract_text};
use crate::models::SourceItem;

/// Walk the document root and extract every matching file.
///
/// Files that cannot be read or extracted are skipped with a warning so one
/// broken PDF does not block the whole index. Items are sorted by source.
pub fn scan_documents(config: &IndexConfig) -> Result<Vec<SourceItem>> {
    let root = &config.root;
    if !root.exists() {
        bail!("Document root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec!["**/.git/**".to_string(), "**/.*".to_string()];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut items = Vec::new();

    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        match file_to_source_item(path, &rel_str) {
            Ok(Some(item)) => items.push(item),
            Ok(None) => tracing::debug!(file = %rel_str, "no text extracted, skipping"),
            Err(err) => tracing::warn!(file = %rel_str, error = %err, "skipping unreadable document"),
        }
    }

    items.sort_by(|a, b| a.source.cmp(&b.source));

    Ok(items)
}

fn file_to_source_item(path: &Path, relative_path: &str) -> Result<Option<SourceItem>> {
    let metadata = std::fs::metadata(path)?;
    let modified_secs = metadata
        .modified()
        .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;

    let content_type = content_type_for(relative_path);
    let bytes = std::fs::read(path)?;
    let body = extract_text(&bytes, content_type)?;
    if body.trim().is_empty() {
        return Ok(None);
    }

    let title = path
        .file_stem()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| relative_path.to_string());

    Ok(Some(SourceItem {
        source: relative_path.to_string(),
        title,
        content_type: content_type.to_string(),
        body,
        updated_at: Utc
            .timestamp_opt(modified_secs, 0)
            .single()
            .unwrap_or_default(),
    }))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn index_config(root: &Path) -> IndexConfig {
        IndexConfig {
            root: root.to_path_buf(),
            ..IndexConfig::default()
        }
    }

    #[test]
    fn test_scan_matches_globs_and_sorts() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("guides")).unwrap();
        fs::write(tmp.path().join("guides/flu.md"), "Influenza causes fever.").unwrap();
        fs::write(tmp.path().join("asthma.txt"), "Asthma narrows airways.").unwrap();
        fs::write(tmp.path().join("image.png"), [0u8, 1, 2]).unwrap();

        let items = scan_documents(&index_config(tmp.path())).unwrap();
        let sources: Vec<&str> = items.iter().map(|i| i.source.as_str()).collect();
        assert_eq!(sources, vec!["asthma.txt", "guides/flu.md"]);
        assert_eq!(items[1].title, "flu");
        assert_eq!(items[1].content_type, "text/markdown");
    }

    #[test]
    fn test_scan_skips_broken_pdf_and_empty_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("broken.pdf"), b"not a pdf").unwrap();
        fs::write(tmp.path().join("empty.txt"), "   \n").unwrap();
        fs::write(tmp.path().join("ok.txt"), "Hydration matters.").unwrap();

        let items = scan_documents(&index_config(tmp.path())).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source, "ok.txt");
    }

    #[test]
    fn test_exclude_globs_apply() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("drafts")).unwrap();
        fs::write(tmp.path().join("drafts/wip.md"), "draft").unwrap();
        fs::write(tmp.path().join("final.md"), "final").unwrap();

        let mut config = index_config(tmp.path());
        config.exclude_globs = vec!["drafts/**".to_string()];
        let items = scan_documents(&config).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source, "final.md");
    }

    #[test]
    fn test_missing_root_is_error() {
        let tmp = TempDir::new().unwrap();
        let err = scan_documents(&index_config(&tmp.path().join("nope"))).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
