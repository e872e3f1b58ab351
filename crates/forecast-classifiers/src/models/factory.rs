use crate::config::ClassifierType;
use crate::models::knn::Knn;
use crate::models::random_forest::RandomForest;
use crate::models::svm::LinearSvm;
use crate::models::Classifier;

/// Build an unfitted classifier with its tuned hyper-parameter set to `param`
/// (`C`, `n_estimators` or `n_neighbors`). `seed` drives every random choice
/// made while fitting.
pub fn build_model(classifier_type: ClassifierType, param: f64, seed: u64) -> Classifier {
    match classifier_type {
        ClassifierType::LinearSvm => Classifier::LinearSvm(LinearSvm::new(param)),
        ClassifierType::Rf => Classifier::Rf(RandomForest::new(param as usize, seed)),
        ClassifierType::Knn => Classifier::Knn(Knn::new(param as usize)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::classifier_trait::ClassifierModel;

    #[test]
    fn builds_each_classifier_with_its_parameter() {
        for (ct, param) in [
            (ClassifierType::LinearSvm, 0.1),
            (ClassifierType::Rf, 47.0),
            (ClassifierType::Knn, 20.0),
        ] {
            let model = build_model(ct, param, 123456);
            assert_eq!(model.classifier_type(), ct);
            assert_eq!(model.name(), ct.as_str());
            assert_eq!(model.param(), param);
        }
    }

    #[test]
    fn with_param_replaces_only_the_tuned_value() {
        let model = build_model(ClassifierType::Rf, 30.0, 9);
        let other = model.with_param(75.0);
        match other {
            Classifier::Rf(rf) => {
                assert_eq!(rf.n_estimators, 75);
                assert_eq!(rf.seed, 9);
                assert!(rf.oob_score);
            }
            _ => panic!("expected a random forest"),
        }
    }
}
