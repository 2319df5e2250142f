//! One-hot categorical encoding

use crate::error::{ModelPortError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One-hot encoder over DataFrame columns.
///
/// Each fitted column expands into one indicator column per observed
/// category, named `{column}_{category}`. Categories are sorted
/// lexicographically at fit time, so the expanded column layout is
/// deterministic: `Sex` with values `male`/`female` always becomes
/// `Sex_female, Sex_male` in that order. Non-string columns (e.g. an integer
/// `Pclass`) are stringified before encoding, yielding names like `Pclass_1`.
///
/// Categories unseen at fit time transform to all-zero indicators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    // column -> lexicographically sorted categories
    categories: HashMap<String, Vec<String>>,
    // columns in fit order, so output layout is stable
    column_order: Vec<String>,
    is_fitted: bool,
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self {
            categories: HashMap::new(),
            column_order: Vec::new(),
            is_fitted: false,
        }
    }

    /// Learn the category set of each named column.
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.categories.clear();
        self.column_order.clear();

        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| ModelPortError::ColumnNotFound(col_name.to_string()))?;

            let casted = column
                .cast(&DataType::String)
                .map_err(|e| ModelPortError::Data(e.to_string()))?;
            let ca = casted
                .str()
                .map_err(|e| ModelPortError::Data(e.to_string()))?;

            let mut cats: Vec<String> = Vec::new();
            for val in ca.into_iter().flatten() {
                if !cats.iter().any(|c| c == val) {
                    cats.push(val.to_string());
                }
            }
            cats.sort();

            self.categories.insert(col_name.to_string(), cats);
            self.column_order.push(col_name.to_string());
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Expand every fitted column into its indicator columns, dropping the
    /// original. Unfitted columns pass through untouched.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(ModelPortError::NotFitted);
        }

        let mut result = df.clone();

        for col_name in &self.column_order {
            let column = df
                .column(col_name)
                .map_err(|_| ModelPortError::ColumnNotFound(col_name.clone()))?;
            let casted = column
                .cast(&DataType::String)
                .map_err(|e| ModelPortError::Data(e.to_string()))?;
            let ca = casted
                .str()
                .map_err(|e| ModelPortError::Data(e.to_string()))?;

            let cats = &self.categories[col_name];
            for category in cats {
                let new_col_name = format!("{}_{}", col_name, category);
                let values: Vec<i32> = ca
                    .into_iter()
                    .map(|v| if v == Some(category.as_str()) { 1 } else { 0 })
                    .collect();

                let new_series = Series::new(new_col_name.into(), values);
                result = result
                    .with_column(new_series)
                    .map_err(|e| ModelPortError::Data(e.to_string()))?
                    .clone();
            }

            result = result
                .drop(col_name)
                .map_err(|e| ModelPortError::Data(e.to_string()))?;
        }

        Ok(result)
    }

    /// Fit and transform in one step.
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Indicator column names produced for one fitted column, in output order.
    pub fn feature_names(&self, column: &str) -> Option<Vec<String>> {
        self.categories
            .get(column)
            .map(|cats| cats.iter().map(|c| format!("{}_{}", column, c)).collect())
    }
}

impl Default for OneHotEncoder {
    fn default() -> Self {
        Self::new()
    }
}
