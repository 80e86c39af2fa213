use quiz_core::model::SessionStatus;

/// Aggregated view of tracker progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    pub current_index: usize,
    pub status: SessionStatus,
    /// `None` when the quiz has no time limit or the session has not started.
    pub remaining_seconds: Option<u64>,
}

impl SessionProgress {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status.is_terminal()
    }
}
