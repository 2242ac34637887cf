/// Learning engine deriving an adaptive confidence threshold from feedback
use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::error::{LearningError, Result};
use crate::feedback_log::FeedbackLog;
use crate::models::{FeedbackRecord, LearningConfig, LearningInsights, NewFeedback, TypeInsights};

/// Records feedback and turns it into advisory thresholds for suggestion generation
///
/// ```rust
/// use knowforge_learning::{FeedbackType, LearningEngine, NewFeedback};
///
/// # tokio_test::block_on(async {
/// let engine = LearningEngine::in_memory();
/// for _ in 0..4 {
///     engine
///         .record_feedback(NewFeedback::new("s1", "split", FeedbackType::Rejected, 0.6))
///         .await
///         .unwrap();
/// }
///
/// // Repeated rejections raise the bar for new split suggestions
/// assert!(!engine.should_offer(0.6, "split").await);
/// # });
/// ```
#[derive(Clone)]
pub struct LearningEngine {
    config: LearningConfig,
    log: FeedbackLog,
}

impl LearningEngine {
    /// Create an engine over `log`
    pub fn new(config: LearningConfig, log: FeedbackLog) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, log })
    }

    /// Engine with default tuning and an in-memory log
    pub fn in_memory() -> Self {
        Self {
            config: LearningConfig::default(),
            log: FeedbackLog::in_memory(),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    /// Underlying feedback log
    pub fn log(&self) -> &FeedbackLog {
        &self.log
    }

    /// Append one feedback record. Prior records are never changed.
    pub async fn record_feedback(&self, feedback: NewFeedback) -> Result<FeedbackRecord> {
        if feedback.suggestion_id.trim().is_empty() {
            return Err(LearningError::InvalidFeedback(
                "suggestion_id is required".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&feedback.suggestion_confidence) {
            return Err(LearningError::InvalidFeedback(format!(
                "suggestion_confidence must be between 0.0 and 1.0, got {}",
                feedback.suggestion_confidence
            )));
        }

        let record = FeedbackRecord::from_new(feedback);
        self.log.append(record.clone()).await?;

        info!(
            feedback_id = %record.feedback_id,
            suggestion_id = %record.suggestion_id,
            suggestion_type = %record.suggestion_type,
            feedback_type = %record.feedback_type,
            "Feedback recorded"
        );
        Ok(record)
    }

    /// Aggregate insights over every recorded feedback
    pub async fn get_learning_insights(&self) -> LearningInsights {
        let records = self.log.records().await;

        let mut overall = TypeInsights::default();
        let mut by_type: BTreeMap<String, TypeInsights> = BTreeMap::new();

        for record in &records {
            overall.record(record.feedback_type);
            by_type
                .entry(record.suggestion_type.clone())
                .or_default()
                .record(record.feedback_type);
        }

        overall.finalize(&self.config);
        for insights in by_type.values_mut() {
            insights.finalize(&self.config);
        }

        debug!(
            total_feedback = overall.total,
            approval_rate = overall.approval_rate,
            min_confidence_threshold = overall.min_confidence_threshold,
            "Computed learning insights"
        );

        LearningInsights {
            total_feedback: overall.total,
            approval_rate: overall.approval_rate,
            min_confidence_threshold: overall.min_confidence_threshold,
            by_type,
        }
    }

    /// Minimum confidence a suggestion of `suggestion_type` should have
    pub async fn min_confidence_threshold_for(&self, suggestion_type: &str) -> f64 {
        let records = self.log.records().await;
        let mut insights = TypeInsights::default();
        for record in records.iter().filter(|r| r.suggestion_type == suggestion_type) {
            insights.record(record.feedback_type);
        }
        insights.finalize(&self.config);
        insights.min_confidence_threshold
    }

    /// Whether a suggestion with `confidence` should be offered for approval
    pub async fn should_offer(&self, confidence: f64, suggestion_type: &str) -> bool {
        confidence >= self.min_confidence_threshold_for(suggestion_type).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeedbackType;

    async fn feed(engine: &LearningEngine, suggestion_type: &str, feedback_type: FeedbackType, n: usize) {
        for i in 0..n {
            engine
                .record_feedback(NewFeedback::new(
                    format!("{}-{}", suggestion_type, i),
                    suggestion_type,
                    feedback_type,
                    0.6,
                ))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_empty_insights_use_base() {
        let engine = LearningEngine::in_memory();
        let insights = engine.get_learning_insights().await;

        assert_eq!(insights.total_feedback, 0);
        assert_eq!(insights.approval_rate, 0.0);
        assert_eq!(insights.min_confidence_threshold, 0.5);
        assert!(insights.by_type.is_empty());
    }

    #[tokio::test]
    async fn test_approval_rate_counts_approved_and_applied() {
        let engine = LearningEngine::in_memory();
        feed(&engine, "split", FeedbackType::Approved, 1).await;
        feed(&engine, "split", FeedbackType::Applied, 1).await;
        feed(&engine, "split", FeedbackType::Rejected, 1).await;
        feed(&engine, "split", FeedbackType::Reverted, 1).await;

        let insights = engine.get_learning_insights().await;
        assert_eq!(insights.total_feedback, 4);
        assert!((insights.approval_rate - 0.5).abs() < 1e-9);

        let split = &insights.by_type["split"];
        assert_eq!(split.approved, 1);
        assert_eq!(split.applied, 1);
        assert_eq!(split.rejected, 1);
        assert_eq!(split.reverted, 1);
    }

    #[tokio::test]
    async fn test_per_type_thresholds_diverge() {
        let engine = LearningEngine::in_memory();
        feed(&engine, "consolidate", FeedbackType::Approved, 5).await;
        feed(&engine, "delete", FeedbackType::Rejected, 5).await;

        let consolidate = engine.min_confidence_threshold_for("consolidate").await;
        let delete = engine.min_confidence_threshold_for("delete").await;
        assert!(delete > consolidate);

        assert!(engine.should_offer(0.6, "consolidate").await);
        assert!(!engine.should_offer(0.6, "delete").await);
        assert!(engine.should_offer(0.5, "unknown").await);
    }

    #[tokio::test]
    async fn test_rejects_invalid_feedback() {
        let engine = LearningEngine::in_memory();

        let result = engine
            .record_feedback(NewFeedback::new("", "split", FeedbackType::Approved, 0.5))
            .await;
        assert!(matches!(result, Err(LearningError::InvalidFeedback(_))));

        let result = engine
            .record_feedback(NewFeedback::new("s1", "split", FeedbackType::Approved, 1.5))
            .await;
        assert!(matches!(result, Err(LearningError::InvalidFeedback(_))));
        assert!(engine.log().is_empty().await);
    }

    #[test]
    fn test_new_validates_config() {
        let config = LearningConfig {
            floor: 0.8,
            ceiling: 0.2,
            ..LearningConfig::default()
        };
        assert!(LearningEngine::new(config, FeedbackLog::in_memory()).is_err());
    }
}
