//! Decodes fixed-size SCID records into the logical schema used downstream.
//!
//! Pure and allocation-light: given a byte slice and stream identity,
//! produces a `Vec<LogicalRecord>` with no intermediate copies of the
//! input buffer.

use chrono::{DateTime, TimeZone, Utc};

/// On-disk record width in bytes.
pub const RECORD_SIZE: usize = 40;
/// Size of the opaque header preceding the first record.
pub const HEADER_SIZE: u64 = 56;

/// Microseconds between the SCID epoch (1899-12-30 00:00:00 UTC) and the
/// Unix epoch. SCID timestamps are added to this constant.
fn scid_epoch_unix_micros() -> i64 {
    // 1899-12-30 00:00:00 UTC, computed once rather than hand-derived so the
    // constant is checkable against the chrono calendar it came from.
    Utc.with_ymd_and_hms(1899, 12, 30, 0, 0, 0)
        .single()
        .expect("valid calendar date")
        .timestamp_micros()
}

/// One decoded market data record in the target schema.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalRecord {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i32,
    pub number_of_trades: i32,
    pub bid_volume: i32,
    pub ask_volume: i32,
    pub symbol: String,
    pub symbol_period: String,
    pub front_contract: bool,
}

/// Decodes a raw 40-byte record at the front of `bytes` (little-endian),
/// per the `sciddtype` layout: `scdatetime:u64, open/high/low/close:f32 x4,
/// numtrades/totalvolume/bidvolume/askvolume:u32 x4`.
fn decode_one(bytes: &[u8], symbol: &str, symbol_period: &str) -> LogicalRecord {
    debug_assert_eq!(bytes.len(), RECORD_SIZE);

    let scdatetime = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
    let open = f32::from_le_bytes(bytes[8..12].try_into().unwrap());
    let high = f32::from_le_bytes(bytes[12..16].try_into().unwrap());
    let low = f32::from_le_bytes(bytes[16..20].try_into().unwrap());
    let close = f32::from_le_bytes(bytes[20..24].try_into().unwrap());
    let numtrades = u32::from_le_bytes(bytes[24..28].try_into().unwrap());
    let totalvolume = u32::from_le_bytes(bytes[28..32].try_into().unwrap());
    let bidvolume = u32::from_le_bytes(bytes[32..36].try_into().unwrap());
    let askvolume = u32::from_le_bytes(bytes[36..40].try_into().unwrap());

    let unix_micros = scid_epoch_unix_micros() + scdatetime as i64;
    let time = Utc.timestamp_micros(unix_micros).single().unwrap_or_else(|| {
        // Only reachable for scdatetime values far outside any sane market
        // data range; clamp rather than panic on a malformed record.
        DateTime::<Utc>::from_timestamp(0, 0).unwrap()
    });

    LogicalRecord {
        time,
        open: open as f64,
        high: high as f64,
        low: low as f64,
        close: close as f64,
        volume: totalvolume as i32,
        number_of_trades: numtrades as i32,
        bid_volume: bidvolume as i32,
        ask_volume: askvolume as i32,
        symbol: symbol.to_owned(),
        symbol_period: symbol_period.to_owned(),
        front_contract: false,
    }
}

/// Decodes every complete record in `slice`. Any trailing bytes shorter
/// than `RECORD_SIZE` are silently ignored by the caller rounding the
/// slice length down before calling this; this function additionally
/// rounds defensively so it never panics on a partial trailing record.
pub fn decode_records(slice: &[u8], symbol: &str, symbol_period: &str) -> Vec<LogicalRecord> {
    let whole_records = slice.len() / RECORD_SIZE;
    let mut out = Vec::with_capacity(whole_records);
    for i in 0..whole_records {
        let start = i * RECORD_SIZE;
        out.push(decode_one(
            &slice[start..start + RECORD_SIZE],
            symbol,
            symbol_period,
        ));
    }
    out
}
