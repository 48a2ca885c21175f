// Shared types for the cleaning passes

/// Why a message was kept out of the quiz candidate pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// Content contains a link
    Link,
    /// Content contains a mention marker
    Mention,
    /// Fewer tokens than the configured minimum
    TooShort,
    /// More tokens than the configured maximum
    TooLong,
    /// Known system notice ("joined the server", ...)
    SystemMessage,
}

/// Decision from the strict content rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    /// Message may become a quiz question
    Keep,
    /// Message stays in history only
    Discard(DropReason),
}

/// Statistics from a cleaning run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanStats {
    /// Rows read from the exports
    pub raw_rows: usize,
    /// Rows missing author, date or content
    pub dropped_incomplete: usize,
    /// Rows whose date could not be parsed
    pub dropped_bad_date: usize,
    /// Rows from authors outside the configured set
    pub dropped_excluded_author: usize,
    /// Messages in the cleaned history
    pub history_rows: usize,
    /// Messages in the quiz candidate pool
    pub pool_rows: usize,
    pub dropped_link: usize,
    pub dropped_mention: usize,
    pub dropped_length: usize,
    pub dropped_system: usize,
}

impl CleanStats {
    pub(super) fn record_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::Link => self.dropped_link += 1,
            DropReason::Mention => self.dropped_mention += 1,
            DropReason::TooShort | DropReason::TooLong => self.dropped_length += 1,
            DropReason::SystemMessage => self.dropped_system += 1,
        }
    }
}
