use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::Page;

/// Pipeline stage an issue was raised in, so a report reader can tell where
/// an item degraded. Detection never raises issues and has no entry here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Extracting,
    Analyzing,
    Normalizing,
    Composing,
}

/// Non-fatal defect or degradation recorded against one import item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub stage: Stage,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Issue {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Issue {
            stage,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Imported,
    PartiallyImported,
    Skipped,
    Failed,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Imported => "imported",
            Outcome::PartiallyImported => "partial",
            Outcome::Skipped => "skipped",
            Outcome::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportItemResult {
    pub source_id: String,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<Page>,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub imported: usize,
    pub partial: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub job_id: String,
    pub platform: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub items: Vec<ImportItemResult>,
    /// Referenced media URLs for the asset-storage collaborator. The
    /// pipeline never stores bytes, only references.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<String>,
    pub summary: Summary,
}

impl ImportReport {
    /// Tally outcomes into summary counts. Called once when the run closes.
    pub fn summarize(items: &[ImportItemResult]) -> Summary {
        let mut s = Summary {
            total: items.len(),
            ..Summary::default()
        };
        for item in items {
            match item.outcome {
                Outcome::Imported => s.imported += 1,
                Outcome::PartiallyImported => s.partial += 1,
                Outcome::Skipped => s.skipped += 1,
                Outcome::Failed => s.failed += 1,
            }
        }
        s
    }

    /// Compact, readable per-item table in the CLI.
    pub fn print_table(&self) {
        println!(
            "{:>3} | {:<28} | {:<8} | {:>6} | {:<40}",
            "#", "Source", "Outcome", "Blocks", "Issues"
        );
        println!("{}", "-".repeat(96));
        for (i, item) in self.items.iter().enumerate() {
            let blocks = item
                .page
                .as_ref()
                .map(|p| p.blocks.len().to_string())
                .unwrap_or_else(|| "-".into());
            let issues = if item.issues.is_empty() {
                String::new()
            } else {
                truncate(&item.issues[0].message, 40)
                    + if item.issues.len() > 1 { " (+)" } else { "" }
            };
            println!(
                "{:>3} | {:<28} | {:<8} | {:>6} | {:<40}",
                i + 1,
                truncate(&item.source_id, 28),
                item.outcome.label(),
                blocks,
                issues
            );
        }
        println!(
            "\n{} items: {} imported, {} partial, {} skipped, {} failed",
            self.summary.total,
            self.summary.imported,
            self.summary.partial,
            self.summary.skipped,
            self.summary.failed
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(outcome: Outcome) -> ImportItemResult {
        ImportItemResult {
            source_id: "p".into(),
            outcome,
            page: None,
            issues: vec![],
        }
    }

    #[test]
    fn summary_counts() {
        let items = vec![
            item(Outcome::Imported),
            item(Outcome::Imported),
            item(Outcome::PartiallyImported),
            item(Outcome::Skipped),
            item(Outcome::Failed),
        ];
        let s = ImportReport::summarize(&items);
        assert_eq!(s.total, 5);
        assert_eq!(s.imported, 2);
        assert_eq!(s.partial, 1);
        assert_eq!(s.skipped, 1);
        assert_eq!(s.failed, 1);
    }

    #[test]
    fn issue_detail_is_optional() {
        let issue = Issue::new(Stage::Normalizing, "dropped property").with_detail("bgColor");
        let json = serde_json::to_string(&issue).unwrap();
        assert!(json.contains("bgColor"));
        let bare = Issue::new(Stage::Composing, "empty page");
        let json = serde_json::to_string(&bare).unwrap();
        assert!(!json.contains("detail"));
    }
}
