//! Write-behind persistence
//!
//! Mirrors cache mutations into the turn store off the request path. A fixed
//! pool of background workers drains a bounded queue; the request path never
//! waits on a write. Jobs are at-most-once: a full queue or a failed write
//! logs the job and drops it. No retry, no dead-letter queue.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, warn};

use crate::session::Turn;
use crate::store::TurnStore;

/// A single write-behind job
pub enum WriteJob {
    /// Append one completed exchange to the session's log
    AppendTurn {
        user_id: String,
        session_id: String,
        turn: Turn,
    },
    /// Record session creation metadata
    CreateSession {
        user_id: String,
        session_id: String,
        created_at: DateTime<Utc>,
    },
    /// Bump the session's durable last-activity timestamp
    UpdateActivity {
        user_id: String,
        session_id: String,
        last_activity: DateTime<Utc>,
    },
    /// Mark the session ended after termination or eviction
    MarkEnded {
        user_id: String,
        session_id: String,
    },
    /// Acks once a worker dequeues it; lets tests and shutdown drain the
    /// queue. Jobs already running on other workers may still be in flight.
    Flush(oneshot::Sender<()>),
}

/// Bounded pool of background writers feeding the turn store.
///
/// Dropping the writer closes the queue; workers finish what is already
/// queued and stop.
pub struct PersistenceWriter {
    tx: mpsc::Sender<WriteJob>,
}

impl PersistenceWriter {
    /// Spawn `workers` background tasks sharing a queue of `queue_size` jobs
    pub fn new(store: Arc<dyn TurnStore>, workers: usize, queue_size: usize) -> Self {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        let rx = Arc::new(Mutex::new(rx));

        for worker in 0..workers.max(1) {
            let rx = Arc::clone(&rx);
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                loop {
                    let job = rx.lock().await.recv().await;
                    let Some(job) = job else { break };
                    run_job(store.as_ref(), job, worker).await;
                }
                debug!("Persistence worker {} stopped", worker);
            });
        }

        Self { tx }
    }

    /// Submit a job without blocking the request path.
    ///
    /// A full queue drops the job: request latency wins over persistence
    /// completeness here.
    pub fn enqueue(&self, job: WriteJob) {
        if self.tx.try_send(job).is_err() {
            warn!("Persistence queue full, dropping write job");
        }
    }

    /// Wait until the queue has drained past this point
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(WriteJob::Flush(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }
}

async fn run_job(store: &dyn TurnStore, job: WriteJob, worker: usize) {
    let result = match job {
        WriteJob::AppendTurn {
            user_id,
            session_id,
            turn,
        } => store.append_turn(&user_id, &session_id, &turn).await,
        WriteJob::CreateSession {
            user_id,
            session_id,
            created_at,
        } => store.create_session(&user_id, &session_id, created_at).await,
        WriteJob::UpdateActivity {
            user_id,
            session_id,
            last_activity,
        } => {
            store
                .update_activity(&user_id, &session_id, last_activity)
                .await
        }
        WriteJob::MarkEnded {
            user_id,
            session_id,
        } => store.end_session(&user_id, &session_id).await,
        WriteJob::Flush(ack) => {
            let _ = ack.send(());
            return;
        }
    };

    if let Err(e) = result {
        // At-most-once: the job is gone, only the log knows.
        warn!("Persistence worker {} write failed: {}", worker, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::store::{MemoryTurnStore, TurnRecord};
    use async_trait::async_trait;

    struct FailingStore;

    #[async_trait]
    impl TurnStore for FailingStore {
        async fn append_turn(&self, _: &str, _: &str, _: &Turn) -> Result<()> {
            Err(Error::Store("backend down".to_string()))
        }

        async fn load_turns(&self, _: &str, _: &str, _: usize) -> Result<Vec<TurnRecord>> {
            Err(Error::Store("backend down".to_string()))
        }

        async fn create_session(&self, _: &str, _: &str, _: DateTime<Utc>) -> Result<()> {
            Err(Error::Store("backend down".to_string()))
        }

        async fn update_activity(&self, _: &str, _: &str, _: DateTime<Utc>) -> Result<()> {
            Err(Error::Store("backend down".to_string()))
        }

        async fn end_session(&self, _: &str, _: &str) -> Result<()> {
            Err(Error::Store("backend down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_jobs_reach_store() {
        let store = Arc::new(MemoryTurnStore::new());
        let writer = PersistenceWriter::new(Arc::clone(&store) as Arc<dyn TurnStore>, 1, 16);

        writer.enqueue(WriteJob::AppendTurn {
            user_id: "u1".to_string(),
            session_id: "s1".to_string(),
            turn: Turn::new(0, "hi", "hello"),
        });
        writer.enqueue(WriteJob::MarkEnded {
            user_id: "u1".to_string(),
            session_id: "s1".to_string(),
        });
        writer.flush().await;

        assert_eq!(store.turn_count("u1", "s1").await, 1);
        assert!(store.is_ended("u1", "s1").await);
    }

    #[tokio::test]
    async fn test_failed_writes_are_dropped_silently() {
        let writer = PersistenceWriter::new(Arc::new(FailingStore), 2, 16);

        for i in 0..8 {
            writer.enqueue(WriteJob::AppendTurn {
                user_id: "u1".to_string(),
                session_id: "s1".to_string(),
                turn: Turn::new(i, "hi", "hello"),
            });
        }

        // Failures are logged and dropped; flushing still completes.
        writer.flush().await;
    }

    #[tokio::test]
    async fn test_full_queue_drops_new_jobs() {
        let store = Arc::new(MemoryTurnStore::new());
        // One slot and one worker: most of this burst has nowhere to go.
        let writer = PersistenceWriter::new(Arc::clone(&store) as Arc<dyn TurnStore>, 1, 1);

        for i in 0..50 {
            writer.enqueue(WriteJob::AppendTurn {
                user_id: "u1".to_string(),
                session_id: "s1".to_string(),
                turn: Turn::new(i, "hi", "hello"),
            });
        }
        writer.flush().await;

        assert!(store.turn_count("u1", "s1").await <= 50);
    }

    #[tokio::test]
    async fn test_enqueue_never_blocks() {
        let writer = PersistenceWriter::new(Arc::new(FailingStore), 1, 1);

        // Synchronous burst from the request path: must return immediately
        // even with a full queue and a failing backend.
        for i in 0..100 {
            writer.enqueue(WriteJob::UpdateActivity {
                user_id: "u1".to_string(),
                session_id: format!("s{}", i),
                last_activity: Utc::now(),
            });
        }
    }
}
