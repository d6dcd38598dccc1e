//! CSV Reader - decodes raw CSV bytes with an ordered encoding fallback and
//! converts the rows into typed cells.

use crate::error::{DashboardError, Result};
use crate::ingestion::table::Table;
use csv::ReaderBuilder;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};
use lazy_static::lazy_static;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Encodings tried, in order, when decoding a CSV file.
pub const CSV_ENCODINGS: &[&str] = &["utf-8", "latin-1", "iso-8859-1", "cp1252", "utf-16"];

lazy_static! {
    /// Cell texts read as missing values.
    static ref NA_TOKENS: HashSet<&'static str> = [
        "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan",
        "1.#IND", "1.#QNAN", "<NA>", "N/A", "NA", "NULL", "NaN", "None",
        "n/a", "nan", "null",
    ]
    .into_iter()
    .collect();
}

/// CSV parsed into a table, plus the encoding that worked
#[derive(Clone, Debug)]
pub struct DecodedCsv {
    pub table: Table,
    pub encoding: &'static str,
}

/// Try each encoding in `CSV_ENCODINGS`; a decode failure, or a parse failure
/// with any but the last encoding, moves on to the next one.
pub fn read_csv_bytes(bytes: &[u8]) -> Result<DecodedCsv> {
    let last = CSV_ENCODINGS.len() - 1;

    for (idx, label) in CSV_ENCODINGS.iter().enumerate() {
        let text = match decode(bytes, label) {
            Some(text) => text,
            None => {
                debug!("Failed with {} encoding, trying next...", label);
                continue;
            }
        };

        match parse_csv(&text) {
            Ok(table) => {
                info!("Successfully loaded CSV with {} encoding", label);
                return Ok(DecodedCsv {
                    table,
                    encoding: *label,
                });
            }
            Err(e) if idx == last => return Err(e),
            Err(e) => {
                debug!("Parsing with {} encoding failed ({}), trying next...", label, e);
            }
        }
    }

    Err(DashboardError::Decode(
        "Could not decode the CSV file with any supported encoding".to_string(),
    ))
}

/// Strict decode; `None` when the bytes are not valid in `label`. Decoded
/// text containing NUL characters is rejected as well.
fn decode<'a>(bytes: &'a [u8], label: &str) -> Option<Cow<'a, str>> {
    let (encoding, body): (&'static Encoding, &[u8]) = match label {
        "utf-8" => (UTF_8, bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)),
        "utf-16" => match Encoding::for_bom(bytes) {
            Some((enc, bom_len)) if enc == UTF_16LE || enc == UTF_16BE => (enc, &bytes[bom_len..]),
            _ => (UTF_16LE, bytes),
        },
        // latin-1 and iso-8859-1 resolve to windows-1252 under WHATWG labels
        "latin-1" | "iso-8859-1" | "cp1252" => (WINDOWS_1252, bytes),
        _ => return None,
    };

    let (text, had_errors) = encoding.decode_without_bom_handling(body);
    if had_errors || text.contains('\0') {
        return None;
    }
    Some(text)
}

/// Parse decoded CSV text. The first record is the header row.
pub fn parse_csv(text: &str) -> Result<Table> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    if headers.is_empty() {
        return Err(DashboardError::Csv("No columns to parse from file".to_string()));
    }

    let mut rows = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let record = result?;
        if record.len() > headers.len() {
            warn!(
                "Row {} has {} fields but the header has {}; dropping the extra fields",
                line + 1,
                record.len(),
                headers.len()
            );
        }
        let row = (0..headers.len())
            .map(|idx| coerce_cell(record.get(idx).unwrap_or("")))
            .collect();
        rows.push(row);
    }

    Ok(Table::new(headers, rows))
}

/// Typed reading of a CSV cell: NA tokens become null, then booleans,
/// integers and finite floats; everything else is kept as trimmed text.
pub fn coerce_cell(s: &str) -> Value {
    let trimmed = s.trim();
    if is_na_token(trimmed) {
        return Value::Null;
    }

    match trimmed {
        "true" | "True" | "TRUE" => return Value::Bool(true),
        "false" | "False" | "FALSE" => return Value::Bool(false),
        _ => {}
    }

    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Number(i.into());
    }

    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }

    Value::String(trimmed.to_string())
}

pub fn is_na_token(s: &str) -> bool {
    NA_TOKENS.contains(s)
}
