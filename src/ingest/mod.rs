pub mod line_protocol;
pub mod worker;

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::batch::{self, Window};
use crate::codec::LogicalRecord;
use crate::error::{IngestError, WorkerPanickedSnafu};
use snafu::IntoError;

/// Result of fanning a polled record buffer out across the worker pool
/// for one tick.
pub struct IngestOutcome {
    pub rows_sent: usize,
    /// Present iff at least one worker failed; the tick as a whole is
    /// failed and the checkpoint must not advance.
    pub failure: Option<IngestError>,
}

/// Partitions `records` into windows of `batch_size` and fans them out
/// across `parallel_workers` tasks, each holding its own TCP connection
/// to `endpoint`. Mirrors `scid_to_qdb.py`'s `ThreadPoolExecutor` fan-out,
/// translated to async tasks over a shared `tokio::sync::Mutex` queue.
pub async fn ingest_batch(
    stream_id: &str,
    table_name: &str,
    endpoint: (String, u16),
    records: Vec<LogicalRecord>,
    batch_size: usize,
    parallel_workers: usize,
) -> IngestOutcome {
    if records.is_empty() {
        return IngestOutcome {
            rows_sent: 0,
            failure: None,
        };
    }

    let windows: VecDeque<Window> = batch::plan(records.len(), batch_size);
    let queue = Arc::new(Mutex::new(windows));
    let records = Arc::new(records);
    let table_name: Arc<str> = Arc::from(table_name);
    let stream_id: Arc<str> = Arc::from(stream_id);

    let mut tasks = Vec::with_capacity(parallel_workers);
    for _ in 0..parallel_workers {
        tasks.push(tokio::spawn(worker::run(
            Arc::clone(&stream_id),
            Arc::clone(&table_name),
            endpoint.clone(),
            Arc::clone(&records),
            Arc::clone(&queue),
        )));
    }

    let mut rows_sent = 0;
    let mut failure = None;
    for task in tasks {
        match task.await {
            Ok(report) => {
                rows_sent += report.rows_sent;
                if let Some(error) = report.error {
                    failure.get_or_insert(error);
                }
            }
            Err(join_error) => {
                failure.get_or_insert(WorkerPanickedSnafu {
                    stream_id: stream_id.to_string(),
                }.into_error(join_error));
            }
        }
    }

    IngestOutcome { rows_sent, failure }
}

#[cfg(test)]
mod tests {
    use super::*;
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
    async fn all_rows_delivered_across_many_workers() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let total_lines = Arc::new(tokio::sync::Mutex::new(0usize));
        let total_lines_reader = Arc::clone(&total_lines);
        let server = tokio::spawn(async move {
            loop {
                let (mut socket, _) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(_) => break,
                };
                let mut buf = Vec::new();
                if socket.read_to_end(&mut buf).await.is_ok() {
                    let lines = String::from_utf8_lossy(&buf).lines().count();
                    *total_lines_reader.lock().await += lines;
                }
            }
        });

        let outcome = ingest_batch(
            "ESU5",
            "trades",
            (addr.ip().to_string(), addr.port()),
            sample_records(2_000_000),
            200_000,
            8,
        )
        .await;

        assert!(outcome.failure.is_none());
        assert_eq!(outcome.rows_sent, 2_000_000);

        // give the server tasks a moment to finish reading their sockets
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        server.abort();
        assert_eq!(*total_lines.lock().await, 2_000_000);
    }

    #[tokio::test]
    async fn empty_input_is_a_no_op() {
        let outcome = ingest_batch(
            "ESU5",
            "trades",
            ("127.0.0.1".to_owned(), 1),
            Vec::new(),
            200_000,
            8,
        )
        .await;
        assert_eq!(outcome.rows_sent, 0);
        assert!(outcome.failure.is_none());
    }

    #[tokio::test]
    async fn transport_failure_is_reported_as_tick_failure() {
        let outcome = ingest_batch(
            "ESU5",
            "trades",
            ("127.0.0.1".to_owned(), 1), // nothing listens on port 1
            sample_records(10),
            5,
            2,
        )
        .await;
        assert!(outcome.failure.is_some());
    }
}
