//! MT4/MT5 history export: `YYYY.MM.DD,HH:MM,open,high,low,close,volume`.

use anyhow::{bail, Context, Result};
use chrono::{NaiveDateTime, TimeZone, Utc};
use market_core::Candle;
use std::io::Read;

const TIMESTAMP_FORMATS: &[&str] = &["%Y.%m.%d %H:%M", "%Y.%m.%d %H:%M:%S"];

fn parse_timestamp(date: &str, time: &str) -> Option<chrono::DateTime<Utc>> {
    let joined = format!("{} {}", date.trim(), time.trim());
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&joined, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn parse_field(record: &csv::StringRecord, idx: usize, name: &str, line: u64) -> Result<f64> {
    let raw = record.get(idx).unwrap_or("").trim();
    raw.parse()
        .with_context(|| format!("line {}: invalid {} '{}'", line, name, raw))
}

/// Parse every row; timestamps are taken as UTC. Any malformed row aborts the file.
pub fn parse_candles<R: Read>(reader: R, has_header: bool) -> Result<Vec<Candle>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(has_header)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut candles = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        if record.len() < 7 {
            bail!("line {}: expected 7 columns, found {}", line, record.len());
        }

        let date = record.get(0).unwrap_or("");
        let time = record.get(1).unwrap_or("");
        let ts = parse_timestamp(date, time)
            .with_context(|| format!("line {}: invalid timestamp '{} {}'", line, date, time))?;

        candles.push(Candle {
            ts,
            open: parse_field(&record, 2, "open", line)?,
            high: parse_field(&record, 3, "high", line)?,
            low: parse_field(&record, 4, "low", line)?,
            close: parse_field(&record, 5, "close", line)?,
            volume: parse_field(&record, 6, "volume", line)?,
        });
    }

    Ok(candles)
}
