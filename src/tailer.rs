//! Offset-tracked incremental file reader. Maps `(file_path,
//! last_position)` to a decoded record batch plus the next offset,
//! rounding to record boundaries and clamping past the header. Grounded
//! on `scid_to_qdb.py`'s `get_scid_np`.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::codec::{self, LogicalRecord, HEADER_SIZE, RECORD_SIZE};
use crate::error::{SourceFileSnafu, TailError};
use snafu::ResultExt;

pub struct TailResult {
    pub records: Vec<LogicalRecord>,
    pub new_position: u64,
}

/// Reads and decodes whatever new, complete records exist past
/// `last_position` in `path`. Never blocks waiting for the file to grow;
/// the supervisor is responsible for polling cadence.
pub fn tail(
    stream_id: &str,
    path: &Path,
    last_position: u64,
    symbol: &str,
    symbol_period: &str,
) -> Result<TailResult, TailError> {
    let mut file = File::open(path).context(SourceFileSnafu {
        stream_id: stream_id.to_owned(),
        path: path.to_owned(),
    })?;

    let file_size = file
        .seek(SeekFrom::End(0))
        .context(SourceFileSnafu {
            stream_id: stream_id.to_owned(),
            path: path.to_owned(),
        })?;

    if file_size < HEADER_SIZE {
        // File doesn't even hold a complete header yet (freshly created,
        // or truncated): nothing to tail, leave the offset untouched so
        // the next tick retries from the same place.
        tracing::warn!(
            message = "file is shorter than the header, skipping this tick",
            stream = stream_id,
            path = %path.display(),
            file_size,
        );
        return Ok(TailResult {
            records: Vec::new(),
            new_position: last_position,
        });
    }

    let clamped_start = last_position.max(HEADER_SIZE);

    if clamped_start >= file_size {
        // No new data: round down to the last full record boundary past
        // the header.
        let body = file_size - HEADER_SIZE;
        let new_position = HEADER_SIZE + body - (body % RECORD_SIZE as u64);
        return Ok(TailResult {
            records: Vec::new(),
            new_position,
        });
    }

    file.seek(SeekFrom::Start(clamped_start))
        .context(SourceFileSnafu {
            stream_id: stream_id.to_owned(),
            path: path.to_owned(),
        })?;

    let available = file_size - clamped_start;
    let whole_bytes = available - (available % RECORD_SIZE as u64);

    let mut buf = vec![0u8; whole_bytes as usize];
    file.read_exact(&mut buf).context(SourceFileSnafu {
        stream_id: stream_id.to_owned(),
        path: path.to_owned(),
    })?;

    let records = codec::decode_records(&buf, symbol, symbol_period);
    let new_position = clamped_start + whole_bytes;

    Ok(TailResult {
        records,
        new_position,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn record(scdatetime: u64) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        buf[0..8].copy_from_slice(&scdatetime.to_le_bytes());
        buf
    }

    fn write_scid(path: &Path, header_len: usize, records: &[[u8; RECORD_SIZE]]) {
        let mut f = File::create(path).unwrap();
        f.write_all(&vec![0u8; header_len]).unwrap();
        for r in records {
            f.write_all(r).unwrap();
        }
    }

    #[test]
    fn cold_start_reads_all_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ESU5.CME.scid");
        let records: Vec<_> = (0..1000u64).map(record).collect();
        write_scid(&path, 56, &records);

        let result = tail("ESU5", &path, 0, "ES", "U5").unwrap();
        assert_eq!(result.records.len(), 1000);
        assert_eq!(result.new_position, 56 + 1000 * RECORD_SIZE as u64);
    }

    #[test]
    fn incremental_append_only_reads_new_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ESU5.CME.scid");
        let records: Vec<_> = (0..1500u64).map(record).collect();
        write_scid(&path, 56, &records);

        let checkpoint = 56 + 1000 * RECORD_SIZE as u64;
        let result = tail("ESU5", &path, checkpoint, "ES", "U5").unwrap();
        assert_eq!(result.records.len(), 500);
        assert_eq!(result.new_position, 56 + 1500 * RECORD_SIZE as u64);
    }

    #[test]
    fn no_op_when_last_position_at_file_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ESU5.CME.scid");
        let records: Vec<_> = (0..10u64).map(record).collect();
        write_scid(&path, 56, &records);

        let file_size = 56 + 10 * RECORD_SIZE as u64;
        let result = tail("ESU5", &path, file_size, "ES", "U5").unwrap();
        assert!(result.records.is_empty());
        assert_eq!(result.new_position, file_size);
    }

    #[test]
    fn last_position_below_header_is_clamped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ESU5.CME.scid");
        let records: Vec<_> = (0..5u64).map(record).collect();
        write_scid(&path, 56, &records);

        let result = tail("ESU5", &path, 10, "ES", "U5").unwrap();
        assert_eq!(result.records.len(), 5);
    }

    #[test]
    fn trailing_fractional_record_waits_for_next_tick() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ESU5.CME.scid");
        let records: Vec<_> = (0..3u64).map(record).collect();
        write_scid(&path, 56, &records);
        // append a partial, incomplete record
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(&[1, 2, 3]).unwrap();

        let result = tail("ESU5", &path, 0, "ES", "U5").unwrap();
        assert_eq!(result.records.len(), 3);
        assert_eq!(result.new_position, 56 + 3 * RECORD_SIZE as u64);

        // rerun with unchanged file: no-op, offset does not include the fraction
        let rerun = tail("ESU5", &path, result.new_position, "ES", "U5").unwrap();
        assert!(rerun.records.is_empty());
        assert_eq!(rerun.new_position, result.new_position);
    }

    #[test]
    fn empty_file_is_a_no_op_and_does_not_advance() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ESU5.CME.scid");
        File::create(&path).unwrap();

        let result = tail("ESU5", &path, 0, "ES", "U5").unwrap();
        assert!(result.records.is_empty());
        assert_eq!(result.new_position, 0);
    }

    #[test]
    fn file_shorter_than_header_is_a_no_op_and_does_not_advance() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ESU5.CME.scid");
        std::fs::write(&path, [0u8; 20]).unwrap();

        let result = tail("ESU5", &path, 0, "ES", "U5").unwrap();
        assert!(result.records.is_empty());
        assert_eq!(result.new_position, 0);
    }
}
