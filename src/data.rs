//! Dataset loading utilities
//!
//! CSV loading via polars plus the column-extraction helpers shared by the
//! trainers and predictors.

use crate::error::{ModelPortError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Load a CSV file with a header row into a DataFrame.
///
/// A missing file surfaces as an IO error; anything the CSV parser rejects
/// surfaces as a data error.
pub fn load_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let file = File::open(path.as_ref())?;

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .into_reader_with_file_handle(file)
        .finish()?;

    info!(
        path = %path.as_ref().display(),
        rows = df.height(),
        cols = df.width(),
        "Loaded CSV"
    );
    Ok(df)
}

/// Select the named columns and drop every row that has a missing value in
/// any of them. Columns absent from the frame are reported by name.
pub fn select_complete_rows(df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
    for name in columns {
        if df.column(name).is_err() {
            return Err(ModelPortError::ColumnNotFound(name.to_string()));
        }
    }

    let selected = df.select(columns.iter().copied())?;

    let selected_height = selected.height();

    let mut mask: Option<BooleanChunked> = None;
    for col in selected.get_columns() {
        let not_null = col.as_materialized_series().is_not_null();
        mask = Some(match mask {
            Some(m) => &m & &not_null,
            None => not_null,
        });
    }

    let filtered = match mask {
        Some(m) => selected.filter(&m)?,
        None => selected,
    };

    info!(
        kept = filtered.height(),
        dropped = selected_height - filtered.height(),
        "Dropped rows with missing values"
    );
    Ok(filtered)
}

/// Extract named columns from a DataFrame into a row-major `Array2<f64>`.
/// Every column is cast to Float64 first; the frame must be null-free.
pub fn columns_to_matrix(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|col_name| {
            let column = df
                .column(col_name)
                .map_err(|_| ModelPortError::ColumnNotFound(col_name.clone()))?;
            let casted = column
                .cast(&DataType::Float64)
                .map_err(|e| ModelPortError::Data(e.to_string()))?;
            let values: Vec<f64> = casted
                .f64()
                .map_err(|e| ModelPortError::Data(e.to_string()))?
                .into_iter()
                .map(|v| {
                    v.ok_or_else(|| {
                        ModelPortError::Data(format!("null value in column '{col_name}'"))
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            Ok(values)
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| {
        col_refs[c][r]
    }))
}

/// Extract a single named column as an `Array1<f64>`.
pub fn column_to_vector(df: &DataFrame, col_name: &str) -> Result<Array1<f64>> {
    let matrix = columns_to_matrix(df, &[col_name.to_string()])?;
    Ok(matrix.column(0).to_owned())
}

/// A text-classification dataset: parallel text and label vectors, plus the
/// counts needed to observe deduplication.
#[derive(Debug, Clone)]
pub struct TextDataset {
    pub texts: Vec<String>,
    pub labels: Array1<f64>,
    /// Row count before exact-duplicate removal
    pub n_rows_raw: usize,
    /// Exact `(text, label)` duplicates collapsed
    pub n_duplicates: usize,
}

/// Load a `(Text, Sentiment)` CSV and collapse exact-duplicate rows,
/// keeping first occurrences in file order.
pub fn load_text_dataset(path: impl AsRef<Path>) -> Result<TextDataset> {
    let df = load_csv(path)?;
    text_dataset_from_frame(&df, "Text", "Sentiment")
}

/// Extract a deduplicated text dataset from an already-loaded frame.
pub fn text_dataset_from_frame(
    df: &DataFrame,
    text_column: &str,
    label_column: &str,
) -> Result<TextDataset> {
    let text_col = df
        .column(text_column)
        .map_err(|_| ModelPortError::ColumnNotFound(text_column.to_string()))?;
    let texts_raw = text_col
        .str()
        .map_err(|e| ModelPortError::Data(e.to_string()))?;

    let label_col = df
        .column(label_column)
        .map_err(|_| ModelPortError::ColumnNotFound(label_column.to_string()))?;
    let labels_casted = label_col
        .cast(&DataType::Float64)
        .map_err(|e| ModelPortError::Data(e.to_string()))?;
    let labels_raw = labels_casted
        .f64()
        .map_err(|e| ModelPortError::Data(e.to_string()))?;

    let n_rows_raw = df.height();
    let mut seen: HashSet<(String, u64)> = HashSet::new();
    let mut texts = Vec::new();
    let mut labels = Vec::new();

    for (text, label) in texts_raw.into_iter().zip(labels_raw.into_iter()) {
        let (Some(text), Some(label)) = (text, label) else {
            continue;
        };
        if seen.insert((text.to_string(), label.to_bits())) {
            texts.push(text.to_string());
            labels.push(label);
        }
    }

    let n_duplicates = n_rows_raw - texts.len();
    info!(
        rows = n_rows_raw,
        unique = texts.len(),
        duplicates = n_duplicates,
        "Deduplicated text dataset"
    );

    Ok(TextDataset {
        texts,
        labels: Array1::from_vec(labels),
        n_rows_raw,
        n_duplicates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "a,b,c").unwrap();
        writeln!(file, "1,2,3").unwrap();
        writeln!(file, "4,,6").unwrap();
        writeln!(file, "7,8,9").unwrap();
        file
    }

    #[test]
    fn test_load_csv() {
        let file = create_test_csv();
        let df = load_csv(file.path()).unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 3);
    }

    #[test]
    fn test_load_csv_missing_file() {
        let err = load_csv("no/such/file.csv").unwrap_err();
        assert!(matches!(err, ModelPortError::Io(_)));
    }

    #[test]
    fn test_select_complete_rows_drops_nulls() {
        let file = create_test_csv();
        let df = load_csv(file.path()).unwrap();
        let complete = select_complete_rows(&df, &["a", "b"]).unwrap();
        // the row with the missing `b` value goes away
        assert_eq!(complete.height(), 2);
        assert_eq!(complete.width(), 2);
    }

    #[test]
    fn test_select_complete_rows_unknown_column() {
        let file = create_test_csv();
        let df = load_csv(file.path()).unwrap();
        let err = select_complete_rows(&df, &["a", "missing"]).unwrap_err();
        assert!(matches!(err, ModelPortError::ColumnNotFound(ref c) if c == "missing"));
    }

    #[test]
    fn test_columns_to_matrix() {
        let df = df!(
            "x1" => &[1.0, 2.0, 3.0],
            "x2" => &[4.0, 5.0, 6.0]
        )
        .unwrap();

        let m = columns_to_matrix(&df, &["x1".to_string(), "x2".to_string()]).unwrap();
        assert_eq!(m.shape(), &[3, 2]);
        assert_eq!(m[[1, 0]], 2.0);
        assert_eq!(m[[2, 1]], 6.0);
    }

    #[test]
    fn test_text_dataset_dedup() {
        let df = df!(
            "Text" => &["good", "bad", "good", "good"],
            "Sentiment" => &[1i64, 0, 1, 0]
        )
        .unwrap();

        let ds = text_dataset_from_frame(&df, "Text", "Sentiment").unwrap();
        // ("good", 1) appears twice and collapses; ("good", 0) is distinct
        assert_eq!(ds.texts.len(), 3);
        assert_eq!(ds.n_rows_raw, 4);
        assert_eq!(ds.n_duplicates, 1);
        assert_eq!(ds.labels.len(), 3);
    }
}
