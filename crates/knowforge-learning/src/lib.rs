//! Knowforge Learning - Feedback-driven tuning of suggestion filtering
//!
//! Every approve, reject, apply and revert event on a refactoring suggestion
//! is appended to a feedback log. The engine derives approval rates and a
//! minimum confidence threshold per suggestion type, which the suggestion
//! generator consults before offering new suggestions.

pub mod engine;
pub mod error;
pub mod feedback_log;
pub mod models;

pub use engine::LearningEngine;
pub use error::{LearningError, Result};
pub use feedback_log::FeedbackLog;
pub use models::{
    FeedbackRecord, FeedbackType, LearningConfig, LearningInsights, NewFeedback, TypeInsights,
};
