use std::collections::HashSet;
use calamine::Data;
use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use crate::models::{ColumnType, Value, TIMESTAMP_FORMAT};

/// Share of present cells that must agree before a column takes a typed representation.
const TYPE_THRESHOLD: f64 = 0.8;

static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^\d{4}-\d{2}-\d{2}([ T]\d{2}:\d{2}(:\d{2}(\.\d+)?)?)?$",
        r"^\d{2}/\d{2}/\d{4}( \d{2}:\d{2}(:\d{2})?)?$",
        r"^\d{4}/\d{2}/\d{2}( \d{2}:\d{2}(:\d{2})?)?$",
        r"^\d{2}-\d{2}-\d{4}$",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

const DATETIME_FORMATS: [&str; 8] = [
    TIMESTAMP_FORMAT,
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"];

/// Makes header names usable as column keys: blank headers become `Unnamed: <idx>`
/// and repeated names get `.1`, `.2`, ... suffixes. The text is otherwise kept as-is.
pub fn unique_column_name(name: &str, idx: usize, existing_names: &mut HashSet<String>) -> String {
    let trimmed = name.trim();
    let base = if trimmed.is_empty() {
        format!("Unnamed: {}", idx)
    } else {
        trimmed.to_string()
    };

    let mut candidate = base.clone();
    let mut counter = 1;
    while !existing_names.insert(candidate.clone()) {
        candidate = format!("{}.{}", base, counter);
        counter += 1;
    }

    candidate
}

pub fn is_date_string(s: &str) -> bool {
    let s = s.trim();
    DATE_PATTERNS.iter().any(|re| re.is_match(s))
}

pub fn parse_date_string(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if !is_date_string(s) {
        return None;
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// A workbook cell decoded into the shapes type inference cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Number(f64),
    Timestamp(NaiveDateTime),
    Bool(bool),
    Text(String),
}

impl RawCell {
    fn render(&self) -> Option<String> {
        match self {
            RawCell::Empty => None,
            RawCell::Number(n) => Some(n.to_string()),
            RawCell::Timestamp(ts) => Some(ts.format(TIMESTAMP_FORMAT).to_string()),
            RawCell::Bool(b) => Some(b.to_string()),
            RawCell::Text(s) => Some(s.clone()),
        }
    }
}

pub fn decode_cell(cell: &Data) -> RawCell {
    match cell {
        Data::Empty | Data::Error(_) => RawCell::Empty,
        Data::Int(i) => RawCell::Number(*i as f64),
        Data::Float(f) if f.is_finite() => RawCell::Number(*f),
        Data::Float(_) => RawCell::Empty,
        Data::Bool(b) => RawCell::Bool(*b),
        Data::DateTime(d) if d.is_datetime() => match d.as_datetime() {
            Some(ts) => RawCell::Timestamp(ts),
            None => RawCell::Number(d.as_f64()),
        },
        Data::DateTime(d) => RawCell::Number(d.as_f64()),
        Data::DateTimeIso(s) => match parse_date_string(s) {
            Some(ts) => RawCell::Timestamp(ts),
            None => RawCell::Text(s.clone()),
        },
        Data::DurationIso(s) => RawCell::Text(s.clone()),
        Data::String(s) => {
            if s.trim().is_empty() {
                RawCell::Empty
            } else if let Some(ts) = parse_date_string(s) {
                RawCell::Timestamp(ts)
            } else {
                RawCell::Text(s.clone())
            }
        }
    }
}

pub fn detect_column_type(values: &[RawCell]) -> ColumnType {
    let (mut numeric, mut fractional, mut date, mut boolean, mut present) = (0usize, 0usize, 0usize, 0usize, 0usize);

    for value in values {
        match value {
            RawCell::Empty => continue,
            RawCell::Number(n) => {
                numeric += 1;
                if n.fract() != 0.0 {
                    fractional += 1;
                }
            }
            RawCell::Timestamp(_) => date += 1,
            RawCell::Bool(_) => boolean += 1,
            RawCell::Text(_) => {}
        }
        present += 1;
    }

    if present == 0 {
        return ColumnType::Empty;
    }

    let threshold = present as f64 * TYPE_THRESHOLD;
    match () {
        _ if numeric as f64 >= threshold && fractional == 0 => ColumnType::Integer,
        _ if numeric as f64 >= threshold => ColumnType::Float,
        _ if date as f64 >= threshold => ColumnType::Datetime,
        _ if boolean as f64 >= threshold => ColumnType::Boolean,
        _ => ColumnType::String,
    }
}

/// Converts a decoded cell to the column's type. Cells that disagree with a typed
/// column become `Value::Null`; string columns keep a text rendering of everything present.
pub fn coerce_cell(cell: &RawCell, data_type: ColumnType) -> Value {
    match (data_type, cell) {
        (_, RawCell::Empty) | (ColumnType::Empty, _) => Value::Null,
        (ColumnType::Integer | ColumnType::Float, RawCell::Number(n)) => Value::Number(*n),
        (ColumnType::Datetime, RawCell::Timestamp(ts)) => Value::Timestamp(*ts),
        (ColumnType::Boolean, RawCell::Bool(b)) => Value::Bool(*b),
        (ColumnType::String, other) => other.render().map(Value::Text).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}
