use crate::{classifier::ClassificationResult, labels::Label};

/// A frame counts as a touch only when `touched` wins and its confidence is
/// strictly above `threshold`.
pub fn decide(result: &ClassificationResult, threshold: f32) -> bool {
    result.label == Label::Touched && result.confidence(Label::Touched) > threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn result(label: Label, touched: f32) -> ClassificationResult {
        let mut confidences = BTreeMap::new();
        confidences.insert(Label::Touched, touched);
        confidences.insert(Label::NotTouching, 1.0 - touched);
        ClassificationResult { label, confidences }
    }

    #[test]
    fn threshold_itself_does_not_trigger() {
        assert!(!decide(&result(Label::Touched, 0.80), 0.8));
    }

    #[test]
    fn just_above_threshold_triggers() {
        assert!(decide(&result(Label::Touched, 0.801), 0.8));
        assert!(decide(&result(Label::Touched, 1.0), 0.8));
    }

    #[test]
    fn other_label_never_triggers() {
        assert!(!decide(&result(Label::NotTouching, 0.9), 0.8));
    }

    #[test]
    fn missing_touched_confidence_counts_as_zero() {
        let result = ClassificationResult {
            label: Label::Touched,
            confidences: BTreeMap::new(),
        };
        assert!(!decide(&result, 0.0));
    }
}
