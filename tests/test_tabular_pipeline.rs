//! Integration test: tabular train → serialize → deserialize → infer

use modelport::artifact::{load_model, save_model, ModelMetadata};
use modelport::data;
use modelport::model::{BinaryClass, FeatureRow, TabularClassifier, TrainedModel};
use modelport::preprocessing::OneHotEncoder;
use modelport::training::LogisticRegression;
use modelport::ModelPortError;
use polars::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

/// Titanic-style training CSV: extra columns to discard, a couple of rows
/// with a missing Age, and a survival pattern that favors first-class women.
fn create_titanic_csv() -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(file, "PassengerId,Survived,Pclass,Name,Sex,Age,Fare").unwrap();

    let mut id = 0;
    let mut row = |survived: u8, pclass: u8, sex: &str, age: &str| {
        id += 1;
        writeln!(
            file,
            "{id},{survived},{pclass},Passenger {id},{sex},{age},{}",
            10.0 + id as f64
        )
        .unwrap();
    };

    for i in 0..12 {
        row(1, 1, "female", &(20 + i).to_string());
    }
    for i in 0..12 {
        row(if i % 2 == 0 { 1 } else { 0 }, 3, "female", &(18 + i).to_string());
    }
    for i in 0..12 {
        row(if i % 3 == 0 { 1 } else { 0 }, 1, "male", &(25 + i).to_string());
    }
    for i in 0..12 {
        row(0, 3, "male", &(22 + i).to_string());
    }
    // incomplete rows, dropped before fitting
    row(1, 2, "female", "");
    row(0, 2, "male", "");

    file
}

fn train_from_csv(path: &std::path::Path) -> TabularClassifier {
    let df = data::load_csv(path).unwrap();
    let complete =
        data::select_complete_rows(&df, &["Survived", "Age", "Sex", "Pclass"]).unwrap();
    let mut encoder = OneHotEncoder::new();
    let encoded = encoder.fit_transform(&complete, &["Sex", "Pclass"]).unwrap();
    TabularClassifier::fit(&encoded, "Survived", LogisticRegression::new()).unwrap()
}

fn first_class_female_row() -> DataFrame {
    FeatureRow::new()
        .with("Age", 30.0)
        .with("Sex_female", 1.0)
        .with("Sex_male", 0.0)
        .with("Pclass_1", 1.0)
        .with("Pclass_2", 0.0)
        .with("Pclass_3", 0.0)
        .into_dataframe()
        .unwrap()
}

#[test]
fn test_train_persist_reload_predict() {
    let csv = create_titanic_csv();
    let model = train_from_csv(csv.path());

    assert_eq!(
        model.feature_names(),
        &["Age", "Sex_female", "Sex_male", "Pclass_1", "Pclass_2", "Pclass_3"]
    );

    let artifact_file = NamedTempFile::new().unwrap();
    let metadata = ModelMetadata::new("survival")
        .with_model_type("tabular_classifier")
        .with_features(model.feature_names().to_vec())
        .with_target("Survived")
        .with_training_rows(48);
    save_model(&TrainedModel::Tabular(model), artifact_file.path(), metadata).unwrap();

    // a separate consumer reconstructs the model without retraining
    let (restored, metadata): (TrainedModel, ModelMetadata) =
        load_model(artifact_file.path()).unwrap();
    assert_eq!(metadata.model_type, "tabular_classifier");
    assert_eq!(metadata.n_training_rows, Some(48));
    let restored = restored.as_tabular().unwrap();

    let proba = restored.class_probabilities(&first_class_female_row()).unwrap();
    let p = proba[[0, BinaryClass::Positive.column()]];
    assert!(p > 0.0 && p < 1.0, "probability out of range: {p}");

    let negative = proba[[0, BinaryClass::Negative.column()]];
    assert!((p + negative - 1.0).abs() < 1e-12);
}

#[test]
fn test_first_class_female_outlives_third_class_male() {
    let csv = create_titanic_csv();
    let model = train_from_csv(csv.path());

    let female = model
        .predict_positive(&first_class_female_row())
        .unwrap()[0];

    let male_row = FeatureRow::new()
        .with("Age", 30.0)
        .with("Sex_female", 0.0)
        .with("Sex_male", 1.0)
        .with("Pclass_1", 0.0)
        .with("Pclass_2", 0.0)
        .with("Pclass_3", 1.0)
        .into_dataframe()
        .unwrap();
    let male = model.predict_positive(&male_row).unwrap()[0];

    assert!(
        female > male,
        "expected first-class female ({female}) above third-class male ({male})"
    );
}

#[test]
fn test_round_trip_idempotence() {
    let csv = create_titanic_csv();
    let df = data::load_csv(csv.path()).unwrap();
    let complete =
        data::select_complete_rows(&df, &["Survived", "Age", "Sex", "Pclass"]).unwrap();
    let mut encoder = OneHotEncoder::new();
    let encoded = encoder.fit_transform(&complete, &["Sex", "Pclass"]).unwrap();
    let model = TabularClassifier::fit(&encoded, "Survived", LogisticRegression::new()).unwrap();

    let features = encoded.drop("Survived").unwrap();
    let before = model.predict_positive(&features).unwrap();

    let artifact_file = NamedTempFile::new().unwrap();
    save_model(
        &TrainedModel::Tabular(model),
        artifact_file.path(),
        ModelMetadata::new("survival"),
    )
    .unwrap();
    let (restored, _): (TrainedModel, ModelMetadata) = load_model(artifact_file.path()).unwrap();
    let after = restored.as_tabular().unwrap().predict_positive(&features).unwrap();

    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(after.iter()) {
        assert!((b - a).abs() <= 1e-6, "round trip drifted: {b} vs {a}");
    }
}

#[test]
fn test_schema_sensitivity() {
    let csv = create_titanic_csv();
    let model = train_from_csv(csv.path());

    // missing column
    let missing = FeatureRow::new()
        .with("Age", 30.0)
        .with("Sex_female", 1.0)
        .with("Sex_male", 0.0)
        .with("Pclass_1", 1.0)
        .with("Pclass_2", 0.0)
        .into_dataframe()
        .unwrap();
    assert!(matches!(
        model.class_probabilities(&missing),
        Err(ModelPortError::SchemaMismatch { .. })
    ));

    // extra column
    let extra = FeatureRow::new()
        .with("Age", 30.0)
        .with("Sex_female", 1.0)
        .with("Sex_male", 0.0)
        .with("Pclass_1", 1.0)
        .with("Pclass_2", 0.0)
        .with("Pclass_3", 0.0)
        .with("Fare", 80.0)
        .into_dataframe()
        .unwrap();
    assert!(matches!(
        model.class_probabilities(&extra),
        Err(ModelPortError::SchemaMismatch { .. })
    ));

    // right names, wrong order
    let reordered = FeatureRow::new()
        .with("Sex_female", 1.0)
        .with("Age", 30.0)
        .with("Sex_male", 0.0)
        .with("Pclass_1", 1.0)
        .with("Pclass_2", 0.0)
        .with("Pclass_3", 0.0)
        .into_dataframe()
        .unwrap();
    assert!(matches!(
        model.class_probabilities(&reordered),
        Err(ModelPortError::SchemaMismatch { .. })
    ));
}

#[test]
fn test_all_rows_incomplete_is_insufficient_data() {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(file, "Survived,Pclass,Sex,Age").unwrap();
    writeln!(file, "1,1,female,").unwrap();
    writeln!(file, "0,3,male,").unwrap();

    let df = data::load_csv(file.path()).unwrap();
    let complete =
        data::select_complete_rows(&df, &["Survived", "Age", "Sex", "Pclass"]).unwrap();
    assert_eq!(complete.height(), 0);

    let mut encoder = OneHotEncoder::new();
    let encoded = encoder.fit_transform(&complete, &["Sex", "Pclass"]).unwrap();
    let result = TabularClassifier::fit(&encoded, "Survived", LogisticRegression::new());
    assert!(matches!(result, Err(ModelPortError::InsufficientData(_))));
}

#[test]
fn test_single_class_labels_is_insufficient_data() {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(file, "Survived,Pclass,Sex,Age").unwrap();
    for i in 0..10 {
        writeln!(file, "1,1,female,{}", 20 + i).unwrap();
    }

    let df = data::load_csv(file.path()).unwrap();
    let complete =
        data::select_complete_rows(&df, &["Survived", "Age", "Sex", "Pclass"]).unwrap();
    let mut encoder = OneHotEncoder::new();
    let encoded = encoder.fit_transform(&complete, &["Sex", "Pclass"]).unwrap();
    let result = TabularClassifier::fit(&encoded, "Survived", LogisticRegression::new());
    assert!(matches!(result, Err(ModelPortError::InsufficientData(_))));
}
