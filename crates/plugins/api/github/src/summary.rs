//! Pull request diff summaries.
//!
//! The summary is built from the PR metadata and its changed files only, so
//! the same PR always produces the same text.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::{GitHubFile, GitHubPullRequest};

/// Number of files listed under "Largest changes".
const LARGEST_CHANGES: usize = 5;

/// Files listed individually before the list is truncated.
const MAX_LISTED_FILES: usize = 50;

/// Per-extension line counts.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ExtensionStats {
    pub files: u64,
    pub additions: u64,
    pub deletions: u64,
}

/// Structured summary of a pull request's diff.
#[derive(Debug, Clone, Serialize)]
pub struct PullRequestSummary {
    pub number: u64,
    pub title: String,
    pub files_changed: usize,
    pub additions: u64,
    pub deletions: u64,
    /// Extension (or `(none)`) → counts, sorted by extension
    pub by_extension: BTreeMap<String, ExtensionStats>,
    pub markdown: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_url: Option<String>,
}

fn extension_of(filename: &str) -> String {
    let base = filename.rsplit('/').next().unwrap_or(filename);
    match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_ascii_lowercase(),
        _ => "(none)".to_string(),
    }
}

/// Build the summary for `pr` from its changed `files`.
pub fn summarize(pr: &GitHubPullRequest, files: &[GitHubFile]) -> PullRequestSummary {
    let additions: u64 = files.iter().map(|f| f.additions).sum();
    let deletions: u64 = files.iter().map(|f| f.deletions).sum();

    let mut by_extension: BTreeMap<String, ExtensionStats> = BTreeMap::new();
    for file in files {
        let stats = by_extension.entry(extension_of(&file.filename)).or_default();
        stats.files += 1;
        stats.additions += file.additions;
        stats.deletions += file.deletions;
    }

    let mut largest: Vec<&GitHubFile> = files.iter().collect();
    // Ties broken by name so the order is stable
    largest.sort_by(|a, b| {
        b.changes
            .cmp(&a.changes)
            .then_with(|| a.filename.cmp(&b.filename))
    });
    largest.truncate(LARGEST_CHANGES);

    let mut md = String::new();
    md.push_str(&format!("## Summary of PR #{}: {}\n\n", pr.number, pr.title));
    md.push_str(&format!(
        "`{}` → `{}` · {} files changed, +{} / -{}\n",
        pr.head.ref_name,
        pr.base.ref_name,
        files.len(),
        additions,
        deletions
    ));

    if !by_extension.is_empty() {
        md.push_str("\n### By file type\n\n");
        md.push_str("| Type | Files | + | - |\n|---|---:|---:|---:|\n");
        for (ext, stats) in &by_extension {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                ext, stats.files, stats.additions, stats.deletions
            ));
        }
    }

    if !largest.is_empty() {
        md.push_str("\n### Largest changes\n\n");
        for file in &largest {
            md.push_str(&format!(
                "- `{}` ({} lines, {})\n",
                file.filename, file.changes, file.status
            ));
        }
    }

    if !files.is_empty() {
        md.push_str("\n### Files\n\n");
        for file in files.iter().take(MAX_LISTED_FILES) {
            match &file.previous_filename {
                Some(prev) if file.status == "renamed" => md.push_str(&format!(
                    "- {} `{}` → `{}` (+{} / -{})\n",
                    file.status, prev, file.filename, file.additions, file.deletions
                )),
                _ => md.push_str(&format!(
                    "- {} `{}` (+{} / -{})\n",
                    file.status, file.filename, file.additions, file.deletions
                )),
            }
        }
        if files.len() > MAX_LISTED_FILES {
            md.push_str(&format!(
                "- … and {} more files\n",
                files.len() - MAX_LISTED_FILES
            ));
        }
    }

    PullRequestSummary {
        number: pr.number,
        title: pr.title.clone(),
        files_changed: files.len(),
        additions,
        deletions,
        by_extension,
        markdown: md,
        comment_url: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GitHubBranchRef;

    fn pr() -> GitHubPullRequest {
        GitHubPullRequest {
            id: 1,
            number: 12,
            title: "Add parser".to_string(),
            body: None,
            state: "open".to_string(),
            html_url: "https://github.com/o/r/pull/12".to_string(),
            draft: false,
            merged: None,
            merged_at: None,
            user: None,
            requested_reviewers: vec![],
            labels: vec![],
            head: GitHubBranchRef {
                ref_name: "feature/parser".to_string(),
                sha: "abc".to_string(),
            },
            base: GitHubBranchRef {
                ref_name: "main".to_string(),
                sha: "def".to_string(),
            },
            commits: None,
            additions: None,
            deletions: None,
            changed_files: None,
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    fn file(name: &str, status: &str, additions: u64, deletions: u64) -> GitHubFile {
        GitHubFile {
            sha: None,
            filename: name.to_string(),
            status: status.to_string(),
            additions,
            deletions,
            changes: additions + deletions,
            previous_filename: None,
        }
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("src/lib.rs"), "rs");
        assert_eq!(extension_of("README.MD"), "md");
        assert_eq!(extension_of("Makefile"), "(none)");
        assert_eq!(extension_of(".gitignore"), "(none)");
        assert_eq!(extension_of("dir.d/file"), "(none)");
    }

    #[test]
    fn test_totals_and_extensions() {
        let files = vec![
            file("src/parser.rs", "added", 120, 0),
            file("src/lib.rs", "modified", 3, 1),
            file("README.md", "modified", 10, 2),
        ];
        let summary = summarize(&pr(), &files);

        assert_eq!(summary.files_changed, 3);
        assert_eq!(summary.additions, 133);
        assert_eq!(summary.deletions, 3);
        assert_eq!(
            summary.by_extension["rs"],
            ExtensionStats {
                files: 2,
                additions: 123,
                deletions: 1
            }
        );
        assert!(summary
            .markdown
            .starts_with("## Summary of PR #12: Add parser\n"));
        assert!(summary.markdown.contains("3 files changed, +133 / -3"));
    }

    #[test]
    fn test_largest_changes_order_is_stable() {
        let files = vec![
            file("b.rs", "modified", 5, 5),
            file("a.rs", "modified", 5, 5),
            file("c.rs", "modified", 50, 0),
        ];
        let md = summarize(&pr(), &files).markdown;

        let c = md.find("- `c.rs` (50 lines").unwrap();
        let a = md.find("- `a.rs` (10 lines").unwrap();
        let b = md.find("- `b.rs` (10 lines").unwrap();
        assert!(c < a && a < b);
    }

    #[test]
    fn test_deterministic() {
        let files = vec![file("x.py", "removed", 0, 30), file("y.go", "added", 7, 0)];
        assert_eq!(
            summarize(&pr(), &files).markdown,
            summarize(&pr(), &files).markdown
        );
    }

    #[test]
    fn test_renamed_file_listed_with_previous_name() {
        let mut renamed = file("src/new.rs", "renamed", 0, 0);
        renamed.previous_filename = Some("src/old.rs".to_string());
        let md = summarize(&pr(), &[renamed]).markdown;
        assert!(md.contains("- renamed `src/old.rs` → `src/new.rs` (+0 / -0)"));
    }

    #[test]
    fn test_empty_pr() {
        let summary = summarize(&pr(), &[]);
        assert_eq!(summary.files_changed, 0);
        assert!(!summary.markdown.contains("### Files"));
    }
}
