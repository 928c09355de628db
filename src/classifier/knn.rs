use std::collections::BTreeMap;

use crate::{embedding::FeatureVector, labels::Label};

use super::{ClassificationResult, Classifier, ClassifierError};

/// k-nearest-neighbour classifier over cosine similarity.
///
/// Examples are kept per label in insertion order and never pruned.
pub struct KnnClassifier {
    k: usize,
    dimension: Option<usize>,
    examples: BTreeMap<Label, Vec<FeatureVector>>,
}

struct Tally {
    votes: usize,
    similarity: f32,
}

impl KnnClassifier {
    pub fn new(k: usize) -> Self {
        Self {
            k: k.max(1),
            dimension: None,
            examples: BTreeMap::new(),
        }
    }

    fn check_dimension(&self, vector: &FeatureVector) -> Result<(), ClassifierError> {
        match self.dimension {
            Some(expected) if expected != vector.dim() => Err(ClassifierError::DimensionMismatch {
                expected,
                actual: vector.dim(),
            }),
            _ => Ok(()),
        }
    }
}

impl Default for KnnClassifier {
    fn default() -> Self {
        Self::new(3)
    }
}

impl Classifier for KnnClassifier {
    fn add_example(&mut self, vector: FeatureVector, label: Label) -> Result<(), ClassifierError> {
        self.check_dimension(&vector)?;
        self.dimension = Some(vector.dim());
        self.examples
            .entry(label)
            .or_default()
            .push(vector.l2_normalized());
        Ok(())
    }

    fn predict_class(&self, vector: &FeatureVector) -> Result<ClassificationResult, ClassifierError> {
        if self.total_examples() == 0 {
            return Err(ClassifierError::Empty);
        }
        self.check_dimension(vector)?;

        let query = vector.l2_normalized();
        let mut scored: Vec<(f32, Label)> = self
            .examples
            .iter()
            .flat_map(|(label, vectors)| {
                let query = &query;
                vectors
                    .iter()
                    .map(move |example| (query.cosine_similarity(example), *label))
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let k = self.k.min(scored.len());
        let mut tallies: BTreeMap<Label, Tally> = BTreeMap::new();
        for (similarity, label) in &scored[..k] {
            let tally = tallies.entry(*label).or_insert(Tally {
                votes: 0,
                similarity: 0.0,
            });
            tally.votes += 1;
            tally.similarity += similarity;
        }

        // BTreeMap iteration is in Label order, so equal tallies resolve to the first label.
        let mut winner: Option<(Label, &Tally)> = None;
        for (label, tally) in &tallies {
            let better = match winner {
                None => true,
                Some((_, best)) => {
                    tally.votes > best.votes
                        || (tally.votes == best.votes && tally.similarity > best.similarity)
                }
            };
            if better {
                winner = Some((*label, tally));
            }
        }
        let label = winner.map(|(label, _)| label).ok_or(ClassifierError::Empty)?;

        let confidences = self
            .examples
            .keys()
            .map(|label| {
                let votes = tallies.get(label).map(|t| t.votes).unwrap_or(0);
                (*label, votes as f32 / k as f32)
            })
            .collect();

        Ok(ClassificationResult { label, confidences })
    }

    fn example_counts(&self) -> BTreeMap<Label, usize> {
        self.examples
            .iter()
            .map(|(label, vectors)| (*label, vectors.len()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(values: &[f32]) -> FeatureVector {
        FeatureVector::new(values.to_vec())
    }

    #[test]
    fn predict_without_examples_is_an_error() {
        let classifier = KnnClassifier::default();
        assert_eq!(
            classifier.predict_class(&v(&[1.0, 0.0])),
            Err(ClassifierError::Empty)
        );
    }

    #[test]
    fn nearest_examples_decide_the_label() {
        let mut classifier = KnnClassifier::new(3);
        for _ in 0..3 {
            classifier.add_example(v(&[1.0, 0.0]), Label::NotTouching).unwrap();
            classifier.add_example(v(&[0.0, 1.0]), Label::Touched).unwrap();
        }

        let result = classifier.predict_class(&v(&[0.1, 0.9])).unwrap();
        assert_eq!(result.label, Label::Touched);
        assert_eq!(result.confidence(Label::Touched), 1.0);
        assert_eq!(result.confidence(Label::NotTouching), 0.0);
        assert_eq!(result.confidences.len(), 2);
    }

    #[test]
    fn confidences_are_vote_shares() {
        let mut classifier = KnnClassifier::new(3);
        classifier.add_example(v(&[1.0, 0.0]), Label::Touched).unwrap();
        classifier.add_example(v(&[0.9, 0.1]), Label::Touched).unwrap();
        classifier.add_example(v(&[0.8, 0.2]), Label::NotTouching).unwrap();
        classifier.add_example(v(&[0.0, 1.0]), Label::NotTouching).unwrap();

        let result = classifier.predict_class(&v(&[1.0, 0.0])).unwrap();
        assert_eq!(result.label, Label::Touched);
        assert!((result.confidence(Label::Touched) - 2.0 / 3.0).abs() < 1e-6);
        assert!((result.confidence(Label::NotTouching) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn k_is_clamped_to_available_examples() {
        let mut classifier = KnnClassifier::new(10);
        classifier.add_example(v(&[1.0, 0.0]), Label::NotTouching).unwrap();

        let result = classifier.predict_class(&v(&[0.0, 1.0])).unwrap();
        assert_eq!(result.label, Label::NotTouching);
        assert_eq!(result.confidence(Label::NotTouching), 1.0);
        assert_eq!(result.confidence(Label::Touched), 0.0);
        assert!(!result.confidences.contains_key(&Label::Touched));
    }

    #[test]
    fn vote_ties_prefer_the_more_similar_label() {
        let mut classifier = KnnClassifier::new(2);
        classifier.add_example(v(&[1.0, 0.0]), Label::NotTouching).unwrap();
        classifier.add_example(v(&[0.6, 0.8]), Label::Touched).unwrap();

        let result = classifier.predict_class(&v(&[0.5, 0.85])).unwrap();
        assert_eq!(result.label, Label::Touched);
        assert_eq!(result.confidence(Label::Touched), 0.5);
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        let mut classifier = KnnClassifier::default();
        classifier.add_example(v(&[1.0, 0.0]), Label::Touched).unwrap();

        assert_eq!(
            classifier.add_example(v(&[1.0, 0.0, 0.0]), Label::Touched),
            Err(ClassifierError::DimensionMismatch { expected: 2, actual: 3 })
        );
        assert!(classifier.predict_class(&v(&[1.0])).is_err());
    }

    #[test]
    fn counts_track_examples_per_label() {
        let mut classifier = KnnClassifier::default();
        classifier.add_example(v(&[1.0]), Label::Touched).unwrap();
        classifier.add_example(v(&[1.0]), Label::Touched).unwrap();
        classifier.add_example(v(&[-1.0]), Label::NotTouching).unwrap();

        let counts = classifier.example_counts();
        assert_eq!(counts.get(&Label::Touched), Some(&2));
        assert_eq!(counts.get(&Label::NotTouching), Some(&1));
        assert_eq!(classifier.total_examples(), 3);
    }
}
