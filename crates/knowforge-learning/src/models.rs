/// Data models for feedback and learning insights
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::error::{LearningError, Result};

/// Kind of feedback recorded for a suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    /// The suggestion was approved
    Approved,
    /// The suggestion was rejected
    Rejected,
    /// The suggestion was executed
    Applied,
    /// An executed suggestion was rolled back
    Reverted,
}

impl FeedbackType {
    /// Whether the suggestion had been approved when this feedback was given
    pub fn was_approved(&self) -> bool {
        !matches!(self, FeedbackType::Rejected)
    }

    /// Whether the suggestion was in effect when this feedback was given
    pub fn was_applied(&self) -> bool {
        matches!(self, FeedbackType::Applied)
    }

    /// Whether this feedback counts towards the approval rate
    pub fn counts_as_approval(&self) -> bool {
        matches!(self, FeedbackType::Approved | FeedbackType::Applied)
    }
}

impl fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedbackType::Approved => write!(f, "approved"),
            FeedbackType::Rejected => write!(f, "rejected"),
            FeedbackType::Applied => write!(f, "applied"),
            FeedbackType::Reverted => write!(f, "reverted"),
        }
    }
}

impl std::str::FromStr for FeedbackType {
    type Err = LearningError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "approved" => Ok(FeedbackType::Approved),
            "rejected" => Ok(FeedbackType::Rejected),
            "applied" => Ok(FeedbackType::Applied),
            "reverted" => Ok(FeedbackType::Reverted),
            other => Err(LearningError::InvalidFeedback(format!(
                "Unknown feedback type: {}",
                other
            ))),
        }
    }
}

/// Feedback to be recorded
#[derive(Debug, Clone)]
pub struct NewFeedback {
    /// Suggestion the feedback is about
    pub suggestion_id: String,
    /// Refactoring type of the suggestion
    pub suggestion_type: String,
    /// Kind of feedback
    pub feedback_type: FeedbackType,
    /// Free-text comment
    pub comment: Option<String>,
    /// Suggestion confidence at the time of feedback
    pub suggestion_confidence: f64,
    /// Whether the suggestion was approved
    pub was_approved: bool,
    /// Whether the suggestion was applied
    pub was_applied: bool,
    /// Snapshot of the suggestion for later analysis
    pub suggestion_details: serde_json::Value,
}

impl NewFeedback {
    /// Feedback with `was_approved`/`was_applied` derived from the feedback type
    pub fn new(
        suggestion_id: impl Into<String>,
        suggestion_type: impl Into<String>,
        feedback_type: FeedbackType,
        suggestion_confidence: f64,
    ) -> Self {
        Self {
            suggestion_id: suggestion_id.into(),
            suggestion_type: suggestion_type.into(),
            feedback_type,
            comment: None,
            suggestion_confidence,
            was_approved: feedback_type.was_approved(),
            was_applied: feedback_type.was_applied(),
            suggestion_details: serde_json::Value::Null,
        }
    }

    /// Attach a comment
    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment;
        self
    }

    /// Attach the suggestion snapshot
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.suggestion_details = details;
        self
    }
}

/// One recorded feedback event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Unique identifier
    pub feedback_id: String,
    /// Suggestion the feedback is about
    pub suggestion_id: String,
    /// Refactoring type of the suggestion
    pub suggestion_type: String,
    /// Kind of feedback
    pub feedback_type: FeedbackType,
    /// Free-text comment
    #[serde(default)]
    pub comment: Option<String>,
    /// Suggestion confidence at the time of feedback
    pub suggestion_confidence: f64,
    /// Whether the suggestion was approved
    pub was_approved: bool,
    /// Whether the suggestion was applied
    pub was_applied: bool,
    /// Snapshot of the suggestion
    #[serde(default)]
    pub suggestion_details: serde_json::Value,
    /// When the feedback was recorded
    pub timestamp: DateTime<Utc>,
}

impl FeedbackRecord {
    /// Create a record from validated feedback
    pub fn from_new(feedback: NewFeedback) -> Self {
        Self {
            feedback_id: Uuid::new_v4().to_string(),
            suggestion_id: feedback.suggestion_id,
            suggestion_type: feedback.suggestion_type,
            feedback_type: feedback.feedback_type,
            comment: feedback.comment,
            suggestion_confidence: feedback.suggestion_confidence,
            was_approved: feedback.was_approved,
            was_applied: feedback.was_applied,
            suggestion_details: feedback.suggestion_details,
            timestamp: Utc::now(),
        }
    }
}

/// Tuning of the adaptive confidence threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Threshold used until enough feedback exists
    pub base_threshold: f64,
    /// Lowest threshold the engine will derive
    pub floor: f64,
    /// Highest threshold the engine will derive
    pub ceiling: f64,
    /// Approval rate at which the threshold equals the base
    pub target_approval_rate: f64,
    /// How far the threshold moves per unit of rate deviation
    pub adjustment_strength: f64,
    /// Feedback records needed before the threshold adapts
    pub min_samples: usize,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            base_threshold: 0.5,
            floor: 0.3,
            ceiling: 0.9,
            target_approval_rate: 0.5,
            adjustment_strength: 0.4,
            min_samples: 3,
        }
    }
}

impl LearningConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let unit_fields = [
            ("base_threshold", self.base_threshold),
            ("floor", self.floor),
            ("ceiling", self.ceiling),
            ("target_approval_rate", self.target_approval_rate),
        ];
        for (name, value) in unit_fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(LearningError::ConfigurationError(format!(
                    "{} must be between 0.0 and 1.0",
                    name
                )));
            }
        }

        if self.floor > self.ceiling {
            return Err(LearningError::ConfigurationError(
                "floor must not exceed ceiling".to_string(),
            ));
        }

        if self.base_threshold < self.floor || self.base_threshold > self.ceiling {
            return Err(LearningError::ConfigurationError(
                "base_threshold must lie between floor and ceiling".to_string(),
            ));
        }

        if !self.adjustment_strength.is_finite() || self.adjustment_strength < 0.0 {
            return Err(LearningError::ConfigurationError(
                "adjustment_strength must be a non-negative number".to_string(),
            ));
        }

        if self.min_samples == 0 {
            return Err(LearningError::ConfigurationError(
                "min_samples must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Threshold for `approvals` out of `total` feedback records
    pub fn threshold_for(&self, approvals: usize, total: usize) -> f64 {
        if total < self.min_samples || total == 0 {
            return self.base_threshold;
        }
        let rate = approvals as f64 / total as f64;
        let adjusted =
            self.base_threshold + (self.target_approval_rate - rate) * self.adjustment_strength;
        adjusted.max(self.floor).min(self.ceiling)
    }
}

/// Feedback breakdown for one suggestion type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeInsights {
    /// Number of feedback records
    pub total: usize,
    /// Approved feedback count
    pub approved: usize,
    /// Rejected feedback count
    pub rejected: usize,
    /// Applied feedback count
    pub applied: usize,
    /// Reverted feedback count
    pub reverted: usize,
    /// (approved + applied) / total
    pub approval_rate: f64,
    /// Derived minimum confidence for this type
    pub min_confidence_threshold: f64,
}

impl TypeInsights {
    /// Count one feedback event
    pub fn record(&mut self, feedback_type: FeedbackType) {
        self.total += 1;
        match feedback_type {
            FeedbackType::Approved => self.approved += 1,
            FeedbackType::Rejected => self.rejected += 1,
            FeedbackType::Applied => self.applied += 1,
            FeedbackType::Reverted => self.reverted += 1,
        }
    }

    /// Number of events counting towards approval
    pub fn approvals(&self) -> usize {
        self.approved + self.applied
    }

    /// Fill in the derived rate and threshold
    pub fn finalize(&mut self, config: &LearningConfig) {
        self.approval_rate = if self.total == 0 {
            0.0
        } else {
            self.approvals() as f64 / self.total as f64
        };
        self.min_confidence_threshold = config.threshold_for(self.approvals(), self.total);
    }
}

/// Aggregate view over all feedback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningInsights {
    /// Number of feedback records
    pub total_feedback: usize,
    /// (approved + applied) / total
    pub approval_rate: f64,
    /// Derived minimum confidence across all types
    pub min_confidence_threshold: f64,
    /// Per suggestion type breakdown
    pub by_type: BTreeMap<String, TypeInsights>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_type_flags() {
        assert!(FeedbackType::Approved.was_approved());
        assert!(!FeedbackType::Approved.was_applied());
        assert!(FeedbackType::Applied.was_approved());
        assert!(FeedbackType::Applied.was_applied());
        assert!(!FeedbackType::Rejected.was_approved());
        assert!(FeedbackType::Reverted.was_approved());
        assert!(!FeedbackType::Reverted.was_applied());
    }

    #[test]
    fn test_feedback_type_parse() {
        assert_eq!("Approved".parse::<FeedbackType>().unwrap(), FeedbackType::Approved);
        assert!("maybe".parse::<FeedbackType>().is_err());
    }

    #[test]
    fn test_learning_config_default() {
        let config = LearningConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.base_threshold, 0.5);
        assert_eq!(config.min_samples, 3);
    }

    #[test]
    fn test_learning_config_validation() {
        let mut config = LearningConfig::default();
        config.floor = 0.95;
        assert!(config.validate().is_err());

        let mut config = LearningConfig::default();
        config.base_threshold = 0.1;
        assert!(config.validate().is_err());

        let mut config = LearningConfig::default();
        config.min_samples = 0;
        assert!(config.validate().is_err());

        let mut config = LearningConfig::default();
        config.adjustment_strength = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_threshold_uses_base_below_min_samples() {
        let config = LearningConfig::default();
        assert_eq!(config.threshold_for(0, 2), 0.5);
        assert_eq!(config.threshold_for(0, 0), 0.5);
    }

    #[test]
    fn test_threshold_moves_with_rate() {
        let config = LearningConfig::default();
        // all rejected: 0.5 + 0.5 * 0.4
        assert!((config.threshold_for(0, 10) - 0.7).abs() < 1e-9);
        // all approved: 0.5 - 0.5 * 0.4
        assert!((config.threshold_for(10, 10) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_is_clamped() {
        let config = LearningConfig {
            adjustment_strength: 5.0,
            ..LearningConfig::default()
        };
        assert_eq!(config.threshold_for(0, 10), config.ceiling);
        assert_eq!(config.threshold_for(10, 10), config.floor);
    }

    #[test]
    fn test_feedback_record_serialization() {
        let record = FeedbackRecord::from_new(
            NewFeedback::new("s1", "consolidate", FeedbackType::Applied, 0.8)
                .with_comment(Some("ok".to_string())),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["feedback_type"], "applied");
        assert_eq!(json["was_applied"], true);

        let back: FeedbackRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
