//! Per-worker ingestion loop: pop a window, encode it, send it over a
//! dedicated connection, flush. Grounded on `scid_to_qdb.py`'s
//! `send_batch` (one connection per worker, pop-until-empty, record
//! success/failure), translated from OS threads to `tokio::task::spawn`.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::batch::Window;
use crate::codec::LogicalRecord;
use crate::error::{ConnectSnafu, FlushSnafu, IngestError, SendSnafu};
use crate::ingest::line_protocol;
use snafu::ResultExt;

/// Outcome of one worker's run: how many rows it sent before either
/// draining the queue or hitting a failure.
pub struct WorkerReport {
    pub rows_sent: usize,
    pub error: Option<IngestError>,
}

/// Drains `queue` until empty or until a send fails, streaming each
/// window to `endpoint` as line protocol over its own TCP connection. A
/// transport failure stops this worker immediately; the caller (the
/// fan-out orchestrator) decides whether siblings keep draining or
/// abort.
pub async fn run(
    stream_id: Arc<str>,
    table_name: Arc<str>,
    endpoint: (String, u16),
    records: Arc<Vec<LogicalRecord>>,
    queue: Arc<Mutex<std::collections::VecDeque<Window>>>,
) -> WorkerReport {
    let mut stream = match TcpStream::connect(&endpoint).await.context(ConnectSnafu {
        stream_id: stream_id.to_string(),
        endpoint: format!("{}:{}", endpoint.0, endpoint.1),
    }) {
        Ok(s) => s,
        Err(error) => {
            return WorkerReport {
                rows_sent: 0,
                error: Some(error),
            }
        }
    };

    let mut rows_sent = 0;
    loop {
        let window = {
            let mut q = queue.lock().await;
            match q.pop_front() {
                Some(w) => w,
                None => break,
            }
        };

        let slice = &records[window.start..window.end];
        let buf = line_protocol::encode_batch(&table_name, slice);

        if let Err(error) = stream.write_all(&buf).await.context(SendSnafu {
            stream_id: stream_id.to_string(),
            offset_start: window.start,
            offset_end: window.end,
        }) {
            return WorkerReport {
                rows_sent,
                error: Some(error),
            };
        }
        if let Err(error) = stream.flush().await.context(FlushSnafu {
            stream_id: stream_id.to_string(),
            offset_start: window.start,
            offset_end: window.end,
        }) {
            return WorkerReport {
                rows_sent,
                error: Some(error),
            };
        }

        rows_sent += window.len();
    }

    WorkerReport {
        rows_sent,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch;
    use chrono::Utc;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn sample_records(n: usize) -> Vec<LogicalRecord> {
        (0..n)
            .map(|i| LogicalRecord {
                time: Utc::now(),
                open: i as f64,
                high: i as f64,
                low: i as f64,
                close: i as f64,
                volume: i as i32,
                number_of_trades: 0,
                bid_volume: 0,
                ask_volume: 0,
                symbol: "ES".to_owned(),
                symbol_period: "U5".to_owned(),
                front_contract: false,
            })
            .collect()
    }

    #[tokio::test]
    async fn single_worker_drains_whole_queue() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let records = Arc::new(sample_records(10));
        let queue = Arc::new(Mutex::new(batch::plan(10, 3)));

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            received
        });

        let report = run(
            Arc::from("ESU5"),
            Arc::from("trades"),
            (addr.ip().to_string(), addr.port()),
            records,
            queue,
        )
        .await;

        assert!(report.error.is_none());
        assert_eq!(report.rows_sent, 10);

        drop(report); // ensure the stream side is dropped before join, closing the socket
        let received = server.await.unwrap();
        let text = String::from_utf8(received).unwrap();
        assert_eq!(text.lines().count(), 10);
    }

    #[tokio::test]
    async fn connect_failure_is_reported_without_panicking() {
        let records = Arc::new(sample_records(1));
        let queue = Arc::new(Mutex::new(batch::plan(1, 1)));
        // Port 0 in a connect address is invalid and fails fast.
        let report = run(
            Arc::from("ESU5"),
            Arc::from("trades"),
            ("127.0.0.1".to_owned(), 1),
            records,
            queue,
        )
        .await;
        assert!(report.error.is_some());
        assert_eq!(report.rows_sent, 0);
    }
}
