//! Selection of the table columns that carry signal channels.

use crate::error::{PipelineError, Result};
use crate::tabular::Table;

/// Header substrings that mark a column as a signal channel (lowercase)
pub const SIGNAL_KEYWORDS: &[&str] = &[
    "eeg", "exg", "channel", "fp", "fz", "cz", "oz", "t3", "t4", "accel",
];

fn has_signal_keyword(name: &str) -> bool {
    let lower = name.to_lowercase();
    SIGNAL_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Indices of the columns to treat as channels, in table order.
///
/// Columns named like signal channels win outright. Only when none is named
/// that way are numeric columns used, skipping constant ones such as sample
/// counters stuck at zero or event markers that never fire.
pub fn select_signal_columns(table: &Table) -> Result<Vec<usize>> {
    let by_name: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .filter(|(_, col)| has_signal_keyword(&col.name))
        .map(|(idx, _)| idx)
        .collect();

    if !by_name.is_empty() {
        return Ok(by_name);
    }

    let varying: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .filter(|(_, col)| col.is_numeric() && col.distinct_values() > 1)
        .map(|(idx, _)| idx)
        .collect();

    if varying.is_empty() {
        return Err(PipelineError::NoSignalColumns);
    }

    Ok(varying)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabular::parse_table;

    fn selected_names(text: &[u8]) -> Result<Vec<String>> {
        let table = parse_table(text).unwrap();
        let indices = select_signal_columns(&table)?;
        Ok(indices
            .into_iter()
            .map(|i| table.columns[i].name.clone())
            .collect())
    }

    #[test]
    fn test_keyword_column_selected() {
        let names = selected_names(b"Index,EEG1,Marker\n0,1.5,0\n1,2.5,0\n2,-0.5,0\n").unwrap();
        assert_eq!(names, vec!["EEG1"]);
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let names = selected_names(b"time,FP1,Cz,Accel X\n0,1,2,3\n1,4,5,6\n").unwrap();
        assert_eq!(names, vec!["FP1", "Cz", "Accel X"]);
    }

    #[test]
    fn test_varying_numeric_fallback() {
        let names = selected_names(b"a,b\n1.0,7\n2.0,7\n3.0,7\n").unwrap();
        assert_eq!(names, vec!["a"]);
    }

    #[test]
    fn test_non_numeric_columns_skipped_in_fallback() {
        let names = selected_names(b"label,value\nx,1\ny,2\n").unwrap();
        assert_eq!(names, vec!["value"]);
    }

    #[test]
    fn test_no_signal_columns() {
        let result = selected_names(b"a,b\n1,5\n1,5\n");
        assert_eq!(result, Err(PipelineError::NoSignalColumns));
    }
}
