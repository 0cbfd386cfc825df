use crate::outcome::SkipReason;

/// Terminal state of one item's Fetch -> Normalize -> Load branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchOutcome {
    Loaded { rows: u64 },
    Skipped(SkipReason),
    Failed(String),
    /// The run was cancelled before or while this item was processed.
    Cancelled,
}

/// Counts across all branches of one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub listed: usize,
    pub loaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub rows_appended: u64,
}

impl RunSummary {
    pub fn new(listed: usize) -> Self {
        RunSummary {
            listed,
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: &BranchOutcome) {
        match outcome {
            BranchOutcome::Loaded { rows } => {
                self.loaded += 1;
                self.rows_appended += rows;
            }
            BranchOutcome::Skipped(_) => self.skipped += 1,
            BranchOutcome::Failed(_) => self.failed += 1,
            BranchOutcome::Cancelled => self.cancelled += 1,
        }
    }

    /// Branches that ran to a terminal state (loaded, skipped or failed).
    pub fn completed(&self) -> usize {
        self.loaded + self.skipped + self.failed
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }
}
