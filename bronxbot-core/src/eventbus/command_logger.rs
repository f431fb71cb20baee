//! src/eventbus/command_logger.rs
//!
//! Spawns a task that subscribes to the EventBus, buffers command usage
//! records, and flushes them to the DB. Drains the queue on shutdown, then
//! does a final flush.

use std::time::Duration;

use bronxbot_common::models::CommandUsageRecord;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{error, info};

use crate::eventbus::EventBus;
use crate::repositories::postgres::CommandLogRepository;
use crate::Error;

/// Spawns an asynchronous task to receive events from the bus
/// and batch-write them to the database. Returns a `JoinHandle<()>`
/// so the caller can `.await` the final flush in tests or shutdown logic.
pub fn spawn_command_logger_task<R>(
    event_bus: &EventBus,
    command_log_repo: R,
    buffer_size: usize,
    flush_interval_sec: u64,
) -> JoinHandle<()>
where
    R: CommandLogRepository + 'static,
{
    let mut rx = futures_lite::future::block_on(event_bus.subscribe(Some(buffer_size)));
    let mut shutdown_rx = event_bus.shutdown_rx.clone();

    tokio::spawn(async move {
        let mut buffer: Vec<CommandUsageRecord> = Vec::with_capacity(buffer_size);
        let flush_interval = Duration::from_secs(flush_interval_sec);
        let mut last_flush = Instant::now();

        info!(
            "command logger task started with batch_size={} flush_interval={}s",
            buffer_size, flush_interval_sec
        );

        loop {
            tokio::select! {
                biased;
                maybe_event = rx.recv() => {
                    match maybe_event {
                        Some(event) => {
                            if let Some(rec) = event.usage_record() {
                                buffer.push(rec.clone());
                            }
                            if buffer.len() >= buffer_size {
                                if let Err(e) = insert_batch(&command_log_repo, &mut buffer).await {
                                    error!("Error inserting batch: {:?}", e);
                                }
                                last_flush = Instant::now();
                            }
                        },
                        None => {
                            info!("command logger channel closed => break from loop.");
                            break;
                        }
                    }
                },
                Ok(_) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("command logger shutting down => break from loop.");
                        break;
                    }
                },
                _ = sleep(flush_interval) => {
                    if !buffer.is_empty() && last_flush.elapsed() >= flush_interval {
                        if let Err(e) = insert_batch(&command_log_repo, &mut buffer).await {
                            error!("Periodic flush error: {:?}", e);
                        }
                        last_flush = Instant::now();
                    }
                }
            }
        }

        // Drain whatever is still queued, then flush once more.
        while let Ok(event) = rx.try_recv() {
            if let Some(rec) = event.usage_record() {
                buffer.push(rec.clone());
            }
        }

        if !buffer.is_empty() {
            info!("command logger final flush: {} records remain.", buffer.len());
            if let Err(e) = insert_batch(&command_log_repo, &mut buffer).await {
                error!("Final flush error: {:?}", e);
            }
        }

        info!("command logger task exited completely.");
    })
}

/// Failed records go into both logs: every record lands in `command_logs`,
/// failures additionally land in `error_logs`.
async fn insert_batch<R: CommandLogRepository>(
    repo: &R,
    buffer: &mut Vec<CommandUsageRecord>,
) -> Result<(), Error> {
    if buffer.is_empty() {
        return Ok(());
    }
    for rec in buffer.iter() {
        repo.insert_usage(rec).await?;
        if !rec.success {
            repo.insert_error(rec).await?;
        }
    }
    buffer.clear();
    Ok(())
}
