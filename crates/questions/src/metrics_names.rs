//! Metric names emitted when the `metrics` feature is enabled.

/// Question lifecycle metrics
pub mod questions {
    /// Total number of `ask` registrations
    pub const ASKED_TOTAL: &str = "promptline_questions_asked_total";
    /// Total number of accepted answers
    pub const ANSWERED_TOTAL: &str = "promptline_questions_answered_total";
    /// Total number of questions retired (count reached or repeat_until fired)
    pub const RETIRED_TOTAL: &str = "promptline_questions_retired_total";
    /// Total number of cancellations, labelled by `scope` (`global`, `question`, `manual`)
    pub const CANCELLED_TOTAL: &str = "promptline_questions_cancelled_total";
    /// Total number of matching events rejected by a validation filter
    pub const FILTERED_TOTAL: &str = "promptline_questions_filtered_total";
    /// Total number of callback failures, labelled by `stage`
    pub const CALLBACK_ERRORS_TOTAL: &str = "promptline_questions_callback_errors_total";
}
