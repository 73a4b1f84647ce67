//! Tick loop: tail each configured stream, fan out ingestion, advance the
//! checkpoint only on full success, sleep, repeat. Grounded on
//! `lib/file-source/src/file_server.rs`'s tick/backoff/shutdown
//! structure, translated from a blocking `mpsc::Receiver::recv_timeout`
//! to `tokio::select!` over a sleep timer and a Ctrl-C signal future.

use std::time::Duration;

use sqlx::PgPool;

use crate::checkpoint::OffsetStore;
use crate::config::Config;
use crate::filename;
use crate::ingest;
use crate::tailer;

/// Runs one supervisor tick across every configured stream. Returns
/// `false` only on a worker failure: the whole tick fails and the
/// checkpoint is not advanced for that stream. Per-stream I/O errors are
/// logged and the stream is retried on the next tick without aborting
/// the other streams.
async fn run_tick(config: &Config, offsets: &mut OffsetStore, table_name: &str, endpoint: (String, u16)) -> bool {
    let mut any_worker_failure = false;

    for path in &config.scid_files {
        let identity = filename::parse(path);
        let stream_id = identity.stream_id();
        let checkpoint = offsets.get(&stream_id);

        let tail_result = match tailer::tail(
            &stream_id,
            path,
            checkpoint.last_position,
            &identity.symbol,
            &identity.symbol_period,
        ) {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!(message = "tailer failed for stream, will retry next tick", stream = %stream_id, %error);
                continue;
            }
        };

        if tail_result.records.is_empty() {
            if tail_result.new_position != checkpoint.last_position {
                // Boundary adjustment (e.g. clamping below the header) with
                // no decoded rows; still safe to persist since no data was
                // dropped.
                if let Err(error) = offsets.advance(&stream_id, tail_result.new_position) {
                    tracing::warn!(message = "failed to persist checkpoint", stream = %stream_id, %error);
                }
            }
            continue;
        }

        let outcome = ingest::ingest_batch(
            &stream_id,
            table_name,
            endpoint.clone(),
            tail_result.records,
            config.batch_size,
            config.parallel_workers,
        )
        .await;

        if let Some(error) = outcome.failure {
            tracing::error!(
                message = "ingestion tick failed for stream, checkpoint not advanced",
                stream = %stream_id,
                offset_start = checkpoint.last_position,
                offset_end = tail_result.new_position,
                %error,
            );
            any_worker_failure = true;
            continue;
        }

        tracing::info!(
            message = "ingested records for stream",
            stream = %stream_id,
            rows = outcome.rows_sent,
            offset_start = checkpoint.last_position,
            offset_end = tail_result.new_position,
        );

        if let Err(error) = offsets.advance(&stream_id, tail_result.new_position) {
            tracing::error!(message = "failed to persist checkpoint after successful ingest", stream = %stream_id, %error);
            any_worker_failure = true;
        }
    }

    !any_worker_failure
}

/// Runs the supervisor loop until a worker failure (non-zero exit) or an
/// interrupt signal (graceful, zero exit).
pub async fn run(config: &Config, pool: &PgPool) -> bool {
    let mut offsets = OffsetStore::load(&config.checkpoint_file);
    let endpoint = (config.db_host.clone(), config.db_port);

    if let Err(error) = crate::schema::bootstrap(pool, &config.table_name).await {
        tracing::error!(message = "schema bootstrap failed", %error);
        return false;
    }

    loop {
        let tick_ok = tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received, draining in-flight windows and exiting");
                return true;
            }
            result = run_tick(config, &mut offsets, &config.table_name, endpoint.clone()) => result,
        };

        if !tick_ok {
            return false;
        }

        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received during sleep, exiting");
                return true;
            }
            _ = tokio::time::sleep(Duration::from_secs(config.sleep_duration_secs)) => {}
        }
    }
}
