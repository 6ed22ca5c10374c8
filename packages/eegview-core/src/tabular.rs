//! Delimited-text table parsing with separator detection.
//!
//! Vendor exports are CSV, TSV, semicolon or whitespace separated and often
//! start with free-text metadata lines. The separator is chosen by how many
//! of the leading lines it splits into the same number of fields; lines that
//! precede the first full-width row are treated as preamble.

use std::collections::HashMap;

/// Number of non-empty lines inspected when choosing a separator
const SNIFF_LINES: usize = 64;

/// Candidate separators in preference order
const CANDIDATES: &[Delimiter] = &[
    Delimiter::Byte(b','),
    Delimiter::Byte(b'\t'),
    Delimiter::Byte(b';'),
    Delimiter::Byte(b'|'),
    Delimiter::Whitespace,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Byte(u8),
    /// Runs of spaces and tabs
    Whitespace,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    /// Parsed values, or `None` if any cell was not a number
    pub values: Option<Vec<f64>>,
}

impl Column {
    pub fn is_numeric(&self) -> bool {
        self.values.is_some()
    }

    /// Count of distinct non-NaN values
    pub fn distinct_values(&self) -> usize {
        let Some(values) = &self.values else {
            return 0;
        };
        let mut seen = std::collections::HashSet::new();
        for &v in values {
            if v.is_nan() {
                continue;
            }
            // -0.0 and 0.0 compare equal
            let v = if v == 0.0 { 0.0 } else { v };
            seen.insert(v.to_bits());
        }
        seen.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub delimiter: Delimiter,
    pub has_header: bool,
    pub columns: Vec<Column>,
    pub num_rows: usize,
}

impl Table {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Why the text could not be read as a table
#[derive(Debug, Clone, PartialEq)]
pub enum TableRejection {
    Empty,
    NoDelimiter,
    NoDataRows,
}

impl std::fmt::Display for TableRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableRejection::Empty => write!(f, "input contains no text lines"),
            TableRejection::NoDelimiter => write!(f, "could not determine a column separator"),
            TableRejection::NoDataRows => write!(f, "no data rows after the header"),
        }
    }
}

fn records<'a>(text: &'a str, delimiter: Delimiter) -> Box<dyn Iterator<Item = Vec<String>> + 'a> {
    match delimiter {
        Delimiter::Byte(byte) => {
            let reader = csv::ReaderBuilder::new()
                .delimiter(byte)
                .has_headers(false)
                .flexible(true)
                .trim(csv::Trim::All)
                .from_reader(text.as_bytes());
            Box::new(
                reader
                    .into_records()
                    .filter_map(|r| r.ok())
                    .map(|r| r.iter().map(|s| s.to_string()).collect::<Vec<_>>())
                    .filter(|fields| !(fields.len() == 1 && fields[0].is_empty())),
            )
        }
        Delimiter::Whitespace => Box::new(
            text.lines()
                .map(|line| {
                    line.split_whitespace()
                        .map(|s| s.to_string())
                        .collect::<Vec<_>>()
                })
                .filter(|fields| !fields.is_empty()),
        ),
    }
}

/// Most common field count among `counts`, ties going to the wider row
fn modal_width(counts: &[usize]) -> Option<(usize, usize)> {
    let mut freq: HashMap<usize, usize> = HashMap::new();
    for &c in counts {
        *freq.entry(c).or_default() += 1;
    }
    freq.into_iter()
        .max_by(|(wa, fa), (wb, fb)| fa.cmp(fb).then(wa.cmp(wb)))
}

/// Pick the separator that splits the leading lines most consistently.
pub fn detect_delimiter(text: &str) -> Option<(Delimiter, usize)> {
    let sample: String = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect::<Vec<_>>()
        .join("\n");

    let mut best: Option<(Delimiter, usize, usize)> = None;
    for &candidate in CANDIDATES {
        let counts: Vec<usize> = records(&sample, candidate).map(|r| r.len()).collect();
        let Some((width, hits)) = modal_width(&counts) else {
            continue;
        };
        if width < 2 {
            continue;
        }
        match best {
            Some((_, _, best_hits)) if best_hits >= hits => {}
            _ => best = Some((candidate, width, hits)),
        }
    }

    best.map(|(delimiter, width, _)| (delimiter, width))
}

fn push_row(row: &[String], values: &mut [Option<Vec<f64>>]) {
    for (slot, cell) in values.iter_mut().zip(row) {
        match parse_cell(cell) {
            Some(v) => {
                if let Some(column) = slot.as_mut() {
                    column.push(v);
                }
            }
            None => *slot = None,
        }
    }
}

fn parse_cell(cell: &str) -> Option<f64> {
    if cell.is_empty() {
        return Some(f64::NAN);
    }
    cell.parse::<f64>().ok()
}

/// Parse delimited text into named columns.
pub fn parse_table(bytes: &[u8]) -> Result<Table, TableRejection> {
    let text = String::from_utf8_lossy(bytes);
    if text.trim().is_empty() {
        return Err(TableRejection::Empty);
    }

    let (delimiter, width) = detect_delimiter(&text).ok_or(TableRejection::NoDelimiter)?;

    let mut rows = records(&text, delimiter).filter(|r| r.len() == width);
    let first = rows.next().ok_or(TableRejection::NoDataRows)?;

    let has_header = first.iter().any(|cell| parse_cell(cell).is_none());
    let names: Vec<String> = if has_header {
        first.clone()
    } else {
        (0..width).map(|i| format!("Column {}", i + 1)).collect()
    };

    let mut values: Vec<Option<Vec<f64>>> = vec![Some(Vec::new()); width];
    let mut num_rows = 0;

    if !has_header {
        push_row(&first, &mut values);
        num_rows += 1;
    }
    for row in rows {
        push_row(&row, &mut values);
        num_rows += 1;
    }

    if num_rows == 0 {
        return Err(TableRejection::NoDataRows);
    }

    log::debug!(
        "Parsed table: delimiter={:?}, columns={}, rows={}, header={}",
        delimiter,
        width,
        num_rows,
        has_header
    );

    let columns = names
        .into_iter()
        .zip(values)
        .map(|(name, values)| Column { name, values })
        .collect();

    Ok(Table {
        delimiter,
        has_header,
        columns,
        num_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_comma() {
        let text = "a,b,c\n1,2,3\n4,5,6\n";
        assert_eq!(detect_delimiter(text), Some((Delimiter::Byte(b','), 3)));
    }

    #[test]
    fn test_detect_tab_and_semicolon() {
        assert_eq!(
            detect_delimiter("x\ty\n1\t2\n"),
            Some((Delimiter::Byte(b'\t'), 2))
        );
        assert_eq!(
            detect_delimiter("x;y;z\n1,5;2;3\n"),
            Some((Delimiter::Byte(b';'), 3))
        );
    }

    #[test]
    fn test_detect_whitespace() {
        let text = "Fp1   Fp2\n1.0   2.0\n3.0   4.0\n";
        assert_eq!(detect_delimiter(text), Some((Delimiter::Whitespace, 2)));
    }

    #[test]
    fn test_single_column_has_no_delimiter() {
        assert_eq!(detect_delimiter("value\n1\n2\n3\n"), None);
        assert_eq!(
            parse_table(b"value\n1\n2\n3\n"),
            Err(TableRejection::NoDelimiter)
        );
    }

    #[test]
    fn test_preamble_skipped() {
        let text = b"Sampling Rate: 256 Hz\nSubject: 7\nEEG1,EEG2\n1,2\n3,4\n5,6\n";
        let table = parse_table(text).unwrap();
        assert!(table.has_header);
        assert_eq!(table.column_names(), vec!["EEG1", "EEG2"]);
        assert_eq!(table.num_rows, 3);
        assert_eq!(table.columns[1].values, Some(vec![2.0, 4.0, 6.0]));
    }

    #[test]
    fn test_headerless_table() {
        let table = parse_table(b"1,2\n3,4\n").unwrap();
        assert!(!table.has_header);
        assert_eq!(table.column_names(), vec!["Column 1", "Column 2"]);
        assert_eq!(table.num_rows, 2);
    }

    #[test]
    fn test_non_numeric_column_and_blank_cells() {
        let table = parse_table(b"time,label,EEG\n0,a,1\n1,b,\n2,c,3\n").unwrap();
        assert!(table.columns[0].is_numeric());
        assert!(!table.columns[1].is_numeric());
        let eeg = table.columns[2].values.as_ref().unwrap();
        assert_eq!(eeg.len(), 3);
        assert!(eeg[1].is_nan());
        assert_eq!(table.columns[2].distinct_values(), 2);
    }

    #[test]
    fn test_header_only_rejected() {
        assert_eq!(parse_table(b"a,b\n"), Err(TableRejection::NoDataRows));
        assert_eq!(parse_table(b"   \n\n"), Err(TableRejection::Empty));
    }
}
