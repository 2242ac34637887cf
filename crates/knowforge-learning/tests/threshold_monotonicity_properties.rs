//! Property-based tests for the adaptive confidence threshold

use knowforge_learning::{FeedbackType, LearningConfig, LearningEngine, NewFeedback};
use proptest::prelude::*;

fn run<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

async fn threshold_after(feedback_type: FeedbackType, n: usize) -> f64 {
    let engine = LearningEngine::in_memory();
    for i in 0..n {
        engine
            .record_feedback(NewFeedback::new(format!("s{}", i), "merge", feedback_type, 0.5))
            .await
            .unwrap();
    }
    engine.min_confidence_threshold_for("merge").await
}

proptest! {
    // Rejections never lower the threshold relative to approvals
    #[test]
    fn prop_rejections_do_not_lower_threshold(n in 0usize..30) {
        let rejected = run(threshold_after(FeedbackType::Rejected, n));
        let approved = run(threshold_after(FeedbackType::Approved, n));
        prop_assert!(rejected >= approved);
    }

    // The derived threshold always stays within the configured bounds
    #[test]
    fn prop_threshold_within_bounds(approvals in 0usize..50, extra in 0usize..50) {
        let config = LearningConfig::default();
        let total = approvals + extra;
        let threshold = config.threshold_for(approvals, total);
        prop_assert!(threshold >= config.floor);
        prop_assert!(threshold <= config.ceiling);
    }

    // More approvals out of the same total never raise the threshold
    #[test]
    fn prop_threshold_non_increasing_in_approvals(total in 1usize..50, a in 0usize..50, b in 0usize..50) {
        let config = LearningConfig::default();
        let low = a.min(b).min(total);
        let high = a.max(b).min(total);
        prop_assert!(config.threshold_for(high, total) <= config.threshold_for(low, total));
    }
}

#[tokio::test]
async fn test_persisted_feedback_drives_threshold_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("feedback.json");

    {
        let (log, _) = knowforge_learning::FeedbackLog::open(&path).await;
        let engine = LearningEngine::new(LearningConfig::default(), log).unwrap();
        for i in 0..4 {
            engine
                .record_feedback(NewFeedback::new(format!("s{}", i), "split", FeedbackType::Rejected, 0.4))
                .await
                .unwrap();
        }
    }

    let (log, report) = knowforge_learning::FeedbackLog::open(&path).await;
    assert_eq!(report.loaded_records, 4);
    let engine = LearningEngine::new(LearningConfig::default(), log).unwrap();
    let insights = engine.get_learning_insights().await;
    assert_eq!(insights.total_feedback, 4);
    assert!((insights.min_confidence_threshold - 0.7).abs() < 1e-9);
}
