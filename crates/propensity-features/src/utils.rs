//! Shared column helpers for the feature encoder.
//!
//! These functions turn polars columns into plain vectors with the missing
//! value rules the encoder relies on: missing numbers become zero, missing
//! categories become the configured token, and anything that cannot be read
//! as a number is kept as a NaN marker so the trainer can reject it.

use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Category of a data type for encoding purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeCategory {
    /// Integer or floating point numbers
    Numeric,
    /// Date or datetime types
    Datetime,
    /// Boolean type
    Boolean,
    /// String/text type
    String,
    /// Other/unknown types
    Other,
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Get the category of a DataType.
pub fn get_dtype_category(dtype: &DataType) -> DtypeCategory {
    if is_numeric_dtype(dtype) {
        DtypeCategory::Numeric
    } else if matches!(
        dtype,
        DataType::Datetime(_, _) | DataType::Date | DataType::Time
    ) {
        DtypeCategory::Datetime
    } else if matches!(dtype, DataType::Boolean) {
        DtypeCategory::Boolean
    } else if matches!(dtype, DataType::String | DataType::Categorical(_, _)) {
        DtypeCategory::String
    } else {
        DtypeCategory::Other
    }
}

// =============================================================================
// String Parsing Utilities
// =============================================================================

/// Characters commonly used in numeric formatting that should be stripped.
pub const NUMERIC_FORMAT_CHARS: [char; 6] = [',', '$', '%', '€', '£', ' '];

/// Markers warehouses export in place of a missing value.
pub const MISSING_MARKERS: [&str; 6] = ["", "nan", "null", "none", "n/a", "na"];

/// Check if a string stands for a missing value.
pub fn is_missing_marker(s: &str) -> bool {
    let lower = s.trim().to_ascii_lowercase();
    MISSING_MARKERS.iter().any(|&marker| lower == marker)
}

/// Try to parse a string as a numeric value (f64).
///
/// Handles currency symbols, percentages, and thousands separators.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    let mut cleaned = s.trim().to_string();
    for c in NUMERIC_FORMAT_CHARS {
        cleaned = cleaned.replace(c, "");
    }
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

// =============================================================================
// Column Extraction
// =============================================================================

/// Numeric values of a column, plus how many cells were not numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericColumn {
    /// One value per row; missing cells are `0.0`, unreadable cells are NaN.
    pub values: Vec<f64>,
    /// Number of cells that held text which is not a number.
    pub non_numeric: usize,
}

/// Read a column as `f64`, replacing missing cells (null or NaN) with zero.
///
/// Text columns are parsed cell by cell. Cells that hold text which is not a
/// number are kept as NaN and counted in [`NumericColumn::non_numeric`].
pub fn numeric_values(series: &Series) -> PolarsResult<NumericColumn> {
    match get_dtype_category(series.dtype()) {
        DtypeCategory::Numeric | DtypeCategory::Boolean => {
            let cast = series.cast(&DataType::Float64)?;
            let values = cast
                .f64()?
                .into_iter()
                .map(|v| v.filter(|x| !x.is_nan()).unwrap_or(0.0))
                .collect();
            Ok(NumericColumn {
                values,
                non_numeric: 0,
            })
        }
        DtypeCategory::String => {
            let cast = series.cast(&DataType::String)?;
            let mut non_numeric = 0;
            let values = cast
                .str()?
                .into_iter()
                .map(|cell| match cell {
                    None => 0.0,
                    Some(text) if is_missing_marker(text) => 0.0,
                    Some(text) => parse_numeric_string(text).unwrap_or_else(|| {
                        non_numeric += 1;
                        f64::NAN
                    }),
                })
                .collect();
            Ok(NumericColumn {
                values,
                non_numeric,
            })
        }
        DtypeCategory::Datetime | DtypeCategory::Other => {
            let non_null = series.len() - series.null_count();
            Ok(NumericColumn {
                values: series
                    .is_null()
                    .into_iter()
                    .map(|is_null| {
                        if is_null.unwrap_or(true) {
                            0.0
                        } else {
                            f64::NAN
                        }
                    })
                    .collect(),
                non_numeric: non_null,
            })
        }
    }
}

/// Read a column as strings, replacing missing cells with `missing_token`.
pub fn string_values(series: &Series, missing_token: &str) -> PolarsResult<Vec<String>> {
    let cast = series.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|cell| cell.unwrap_or(missing_token).to_string())
        .collect())
}

/// Read a column as optional strings, keeping nulls.
pub fn optional_string_values(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let cast = series.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|cell| cell.map(str::to_string))
        .collect())
}

/// Read an identifier column as `i64`, keeping nulls and unparsable cells as `None`.
pub fn integer_values(series: &Series) -> PolarsResult<Vec<Option<i64>>> {
    let cast = series.cast(&DataType::Int64)?;
    Ok(cast.i64()?.into_iter().collect())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_numeric_dtype() {
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(is_numeric_dtype(&DataType::Float64));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_numeric_dtype(&DataType::Boolean));
    }

    #[test]
    fn test_dtype_category() {
        assert_eq!(get_dtype_category(&DataType::Int64), DtypeCategory::Numeric);
        assert_eq!(get_dtype_category(&DataType::Date), DtypeCategory::Datetime);
        assert_eq!(
            get_dtype_category(&DataType::Boolean),
            DtypeCategory::Boolean
        );
        assert_eq!(get_dtype_category(&DataType::String), DtypeCategory::String);
    }

    #[test]
    fn test_parse_numeric_string() {
        assert_eq!(parse_numeric_string("42"), Some(42.0));
        assert_eq!(parse_numeric_string("$1,234.56"), Some(1234.56));
        assert_eq!(parse_numeric_string("-3"), Some(-3.0));
        assert_eq!(parse_numeric_string(""), None);
        assert_eq!(parse_numeric_string("Homeowner"), None);
    }

    #[test]
    fn test_is_missing_marker() {
        assert!(is_missing_marker(""));
        assert!(is_missing_marker(" NaN "));
        assert!(is_missing_marker("NULL"));
        assert!(!is_missing_marker("0"));
    }

    #[test]
    fn test_numeric_values_fills_nulls_with_zero() {
        let series = Series::new("SPEND_30D".into(), &[Some(1.5), None, Some(3.0)]);
        let column = numeric_values(&series).unwrap();

        assert_eq!(column.values, vec![1.5, 0.0, 3.0]);
        assert_eq!(column.non_numeric, 0);
    }

    #[test]
    fn test_numeric_values_marks_text() {
        let series = Series::new("VISITS_60D".into(), &[Some("4"), None, Some("many")]);
        let column = numeric_values(&series).unwrap();

        assert_eq!(column.values[0], 4.0);
        assert_eq!(column.values[1], 0.0);
        assert!(column.values[2].is_nan());
        assert_eq!(column.non_numeric, 1);
    }

    #[test]
    fn test_string_values_uses_missing_token() {
        let series = Series::new("AGE_DESC".into(), &[Some("25-34"), None]);
        let values = string_values(&series, "nan").unwrap();
        assert_eq!(values, vec!["25-34".to_string(), "nan".to_string()]);
    }

    #[test]
    fn test_integer_values() {
        let series = Series::new("HOUSEHOLD_KEY".into(), &[Some(1001i64), None]);
        assert_eq!(integer_values(&series).unwrap(), vec![Some(1001), None]);
    }
}
