use thiserror::Error;

/// Import failure taxonomy. Only `BundleUnreadable` aborts a whole job;
/// everything else is recovered locally and surfaced as an Issue on the
/// affected item.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("bundle unreadable: {0}")]
    BundleUnreadable(String),

    #[error("adapter extraction failed for {source_id}: {reason}")]
    AdapterExtractionFailed { source_id: String, reason: String },

    #[error("classification service unavailable: {0}")]
    ClassificationUnavailable(String),

    #[error("schema violation in block type {block_type}: {reason}")]
    SchemaViolation { block_type: String, reason: String },

    #[error("page {0} has no content blocks")]
    EmptyPage(String),
}

impl ImportError {
    /// True only for errors that must abort the whole job.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ImportError::BundleUnreadable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_bundle_unreadable_is_fatal() {
        assert!(ImportError::BundleUnreadable("gone".into()).is_fatal());
        assert!(!ImportError::AdapterExtractionFailed {
            source_id: "p1".into(),
            reason: "bad markup".into(),
        }
        .is_fatal());
        assert!(!ImportError::ClassificationUnavailable("timeout".into()).is_fatal());
        assert!(!ImportError::EmptyPage("p2".into()).is_fatal());
    }
}
