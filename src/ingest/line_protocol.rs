//! Encodes a [`LogicalRecord`] as one InfluxDB/QuestDB-style line protocol
//! entry: `measurement,tag=value,... field=value,... timestamp\n`.
//!
//! Escaping rules for tags/fields/measurement names are grounded verbatim
//! on `lib/codecs/src/encoding/format/influxdb.rs`'s
//! `encode_string`/`encode_tags`/`encode_fields`.

use bytes::{BufMut, BytesMut};

use crate::codec::LogicalRecord;

/// Escapes `,`, `=`, and space, the characters with syntactic meaning
/// outside of quoted strings in line protocol.
fn encode_key_or_tag_value(value: &str, output: &mut BytesMut) {
    for ch in value.chars() {
        if ",= ".contains(ch) {
            output.put_u8(b'\\');
        }
        let mut buf = [0u8; 4];
        output.put_slice(ch.encode_utf8(&mut buf).as_bytes());
    }
}

fn put_field_f64(name: &str, value: f64, output: &mut BytesMut) {
    encode_key_or_tag_value(name, output);
    output.put_u8(b'=');
    output.put_slice(value.to_string().as_bytes());
    output.put_u8(b',');
}

fn put_field_i32(name: &str, value: i32, output: &mut BytesMut) {
    encode_key_or_tag_value(name, output);
    output.put_u8(b'=');
    output.put_slice(value.to_string().as_bytes());
    output.put_u8(b'i');
    output.put_u8(b',');
}

fn put_field_bool(name: &str, value: bool, output: &mut BytesMut) {
    encode_key_or_tag_value(name, output);
    output.put_u8(b'=');
    output.put_slice(if value { b"true" } else { b"false" });
    output.put_u8(b',');
}

/// Appends one line to `output`. `table_name` is the measurement;
/// `symbol`/`symbol_period` are tags (QuestDB `SYMBOL` semantics); the
/// remaining columns are fields; `time` is the trailing timestamp in
/// microseconds.
pub fn encode_record(table_name: &str, record: &LogicalRecord, output: &mut BytesMut) {
    encode_key_or_tag_value(table_name, output);

    output.put_u8(b',');
    encode_key_or_tag_value("symbol", output);
    output.put_u8(b'=');
    encode_key_or_tag_value(&record.symbol, output);
    output.put_u8(b',');
    encode_key_or_tag_value("symbol_period", output);
    output.put_u8(b'=');
    encode_key_or_tag_value(&record.symbol_period, output);

    output.put_u8(b' ');

    let fields_start = output.len();
    put_field_f64("open", record.open, output);
    put_field_f64("high", record.high, output);
    put_field_f64("low", record.low, output);
    put_field_f64("close", record.close, output);
    put_field_i32("volume", record.volume, output);
    put_field_i32("number_of_trades", record.number_of_trades, output);
    put_field_i32("bid_volume", record.bid_volume, output);
    put_field_i32("ask_volume", record.ask_volume, output);
    put_field_bool("front_contract", record.front_contract, output);
    // drop the trailing comma appended after the last field
    if output.len() > fields_start {
        output.truncate(output.len() - 1);
    }

    output.put_u8(b' ');
    output.put_slice(
        record
            .time
            .timestamp_micros()
            .to_string()
            .as_bytes(),
    );
    output.put_u8(b'\n');
}

pub fn encode_batch(table_name: &str, records: &[LogicalRecord]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(records.len() * 128);
    for record in records {
        encode_record(table_name, record, &mut buf);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample_record() -> LogicalRecord {
        LogicalRecord {
            time: Utc.with_ymd_and_hms(2025, 9, 2, 14, 30, 0).unwrap(),
            open: 100.25,
            high: 101.5,
            low: 99.75,
            close: 100.8,
            volume: 250,
            number_of_trades: 7,
            bid_volume: 3,
            ask_volume: 4,
            symbol: "ES".to_owned(),
            symbol_period: "U5".to_owned(),
            front_contract: false,
        }
    }

    #[test]
    fn encodes_expected_shape() {
        let mut buf = BytesMut::new();
        encode_record("trades", &sample_record(), &mut buf);
        let line = String::from_utf8(buf.to_vec()).unwrap();

        assert!(line.starts_with("trades,symbol=ES,symbol_period=U5 "));
        assert!(line.contains("open=100.25"));
        assert!(line.contains("volume=250i"));
        assert!(line.contains("front_contract=false"));
        assert!(line.ends_with('\n'));

        let ts = line
            .trim_end()
            .rsplit(' ')
            .next()
            .unwrap()
            .parse::<i64>()
            .unwrap();
        assert_eq!(ts, sample_record().time.timestamp_micros());
    }

    #[test]
    fn escapes_special_characters_in_symbol() {
        let mut record = sample_record();
        record.symbol = "E S".to_owned();
        let mut buf = BytesMut::new();
        encode_record("trades", &record, &mut buf);
        let line = String::from_utf8(buf.to_vec()).unwrap();
        assert!(line.contains("symbol=E\\ S"));
    }

    #[test]
    fn batch_encodes_one_line_per_record() {
        let records = vec![sample_record(), sample_record(), sample_record()];
        let buf = encode_batch("trades", &records);
        let text = String::from_utf8(buf.to_vec()).unwrap();
        assert_eq!(text.lines().count(), 3);
    }
}
