//! Bounded queue of delayed replies.
//!
//! One worker task owns a min-heap of pending replies keyed by fire time and
//! sleeps until the earliest is due. Capacity is fixed; once it is reached new
//! replies are refused until older ones fire. [`DeferredQueue::shutdown`]
//! either cancels what is left or fires it on the spot.

use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use flume::{Receiver, Sender};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::synth::Synthesizer;
use crate::transport::{ReplyTarget, Transport};

/// What happens to replies still pending at shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    Cancel,
    /// Fire every pending reply immediately.
    Drain,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Replies that fired on schedule during the queue's lifetime.
    pub fired: usize,
    pub drained: usize,
    pub cancelled: usize,
}

#[derive(Debug)]
struct PendingReply {
    id: Uuid,
    seq: u64,
    target: ReplyTarget,
    fire_at: Instant,
    scheduled_at: DateTime<Utc>,
}

impl PartialEq for PendingReply {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for PendingReply {}

impl PartialOrd for PendingReply {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingReply {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Earliest fire time on top of the max-heap; ties fire in schedule order
        other
            .fire_at
            .cmp(&self.fire_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

enum QueueCommand {
    Schedule(PendingReply),
    Shutdown(ShutdownMode),
}

pub struct DeferredQueue {
    commands: Sender<QueueCommand>,
    /// Set once shutdown has been sent; held while sending so nothing is
    /// queued behind the shutdown command.
    closed: StdMutex<bool>,
    pending: Arc<AtomicUsize>,
    capacity: usize,
    next_seq: AtomicU64,
    worker: Mutex<Option<JoinHandle<ShutdownReport>>>,
}

impl DeferredQueue {
    /// Start the worker. Must be called from within a tokio runtime.
    pub fn spawn(synth: Synthesizer, transport: Arc<dyn Transport>, capacity: usize) -> Self {
        let (tx, rx) = flume::unbounded();
        let pending = Arc::new(AtomicUsize::new(0));
        let worker = tokio::spawn(run_worker(rx, synth, transport, pending.clone()));

        Self {
            commands: tx,
            closed: StdMutex::new(false),
            pending,
            capacity,
            next_seq: AtomicU64::new(0),
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Replies scheduled but not yet fired or cancelled.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Queue a reply to `target` that fires once `delay` has elapsed.
    pub fn schedule(&self, target: ReplyTarget, delay: Duration) -> Result<Uuid> {
        let capacity = self.capacity;
        self.pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                (count < capacity).then_some(count + 1)
            })
            .map_err(|_| anyhow!("deferred reply queue is full ({} pending)", capacity))?;

        let reply = PendingReply {
            id: Uuid::new_v4(),
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
            target,
            fire_at: Instant::now() + delay,
            scheduled_at: Utc::now(),
        };
        let id = reply.id;

        let sent = {
            let closed = self.closed.lock().unwrap_or_else(|e| e.into_inner());
            !*closed && self.commands.send(QueueCommand::Schedule(reply)).is_ok()
        };
        if !sent {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(anyhow!("deferred reply queue has shut down"));
        }

        tracing::debug!("Deferred reply {} scheduled in {:?}", id, delay);
        Ok(id)
    }

    /// Stop the worker and settle pending replies according to `mode`.
    /// Later calls return an empty report.
    pub async fn shutdown(&self, mode: ShutdownMode) -> ShutdownReport {
        let Some(worker) = self.worker.lock().await.take() else {
            return ShutdownReport::default();
        };

        {
            let mut closed = self.closed.lock().unwrap_or_else(|e| e.into_inner());
            *closed = true;
            let _ = self.commands.send(QueueCommand::Shutdown(mode));
        }
        match worker.await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Deferred reply worker failed: {}", e);
                ShutdownReport::default()
            }
        }
    }
}

async fn run_worker(
    commands: Receiver<QueueCommand>,
    synth: Synthesizer,
    transport: Arc<dyn Transport>,
    pending: Arc<AtomicUsize>,
) -> ShutdownReport {
    let mut queue: BinaryHeap<PendingReply> = BinaryHeap::new();
    let mut report = ShutdownReport::default();

    loop {
        let next_fire = queue.peek().map(|reply| reply.fire_at);

        // Commands first, so a shutdown is never overtaken by a due timer
        tokio::select! {
            biased;

            command = commands.recv_async() => {
                match command {
                    Ok(QueueCommand::Schedule(reply)) => queue.push(reply),
                    Ok(QueueCommand::Shutdown(ShutdownMode::Drain)) => {
                        while let Some(reply) = queue.pop() {
                            fire(&synth, transport.as_ref(), reply).await;
                            pending.fetch_sub(1, Ordering::SeqCst);
                            report.drained += 1;
                        }
                        break;
                    }
                    // Explicit cancel, or every handle is gone
                    Ok(QueueCommand::Shutdown(ShutdownMode::Cancel)) | Err(_) => {
                        report.cancelled += queue.len();
                        pending.fetch_sub(queue.len(), Ordering::SeqCst);
                        queue.clear();
                        break;
                    }
                }
            }
            _ = tokio::time::sleep_until(next_fire.unwrap_or_else(Instant::now)), if next_fire.is_some() => {
                let now = Instant::now();
                while queue.peek().is_some_and(|reply| reply.fire_at <= now) {
                    if let Some(reply) = queue.pop() {
                        fire(&synth, transport.as_ref(), reply).await;
                        pending.fetch_sub(1, Ordering::SeqCst);
                        report.fired += 1;
                    }
                }
            }
        }
    }

    tracing::info!(
        "Deferred reply worker stopped (fired: {}, drained: {}, cancelled: {})",
        report.fired,
        report.drained,
        report.cancelled
    );
    report
}

async fn fire(synth: &Synthesizer, transport: &dyn Transport, reply: PendingReply) {
    let text = synth.compose();
    tracing::info!(
        "Firing deferred reply {} to {} (scheduled at {})",
        reply.id,
        reply.target.name(),
        reply.scheduled_at.to_rfc3339()
    );
    if let Err(e) = transport.reply(&reply.target, &text).await {
        tracing::error!("Failed to deliver deferred reply {}: {}", reply.id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{CorpusStore, MemoryCorpusStore};
    use crate::rng::SharedRng;
    use crate::transport::{ChannelTransport, OutboundReply};

    struct Harness {
        store: Arc<MemoryCorpusStore>,
        queue: DeferredQueue,
        replies: Receiver<OutboundReply>,
    }

    fn harness(capacity: usize) -> Harness {
        let rng = SharedRng::seeded(17);
        let store = Arc::new(MemoryCorpusStore::new(rng.clone()));
        let synth = Synthesizer::new(store.clone(), rng, 50);
        let (tx, rx) = flume::unbounded();
        let queue = DeferredQueue::spawn(synth, Arc::new(ChannelTransport::new(tx)), capacity);
        Harness {
            store,
            queue,
            replies: rx,
        }
    }

    fn channel() -> ReplyTarget {
        ReplyTarget::Channel("#afterlunch".to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay_with_fire_time_corpus() {
        let h = harness(8);
        let scheduled_at = Instant::now();
        h.queue
            .schedule(channel(), Duration::from_secs(30 * 60))
            .expect("schedule");

        tokio::time::sleep(Duration::from_secs(29 * 60)).await;
        assert!(h.replies.is_empty(), "reply fired before its delay");

        // Corpus was empty when the reply was scheduled.
        h.store.insert("hello world").expect("insert");

        let reply = h.replies.recv_async().await.expect("deferred reply");
        assert!(scheduled_at.elapsed() >= Duration::from_secs(30 * 60));
        assert_eq!(reply.target, channel());
        assert!(!reply.text.is_empty());
        for token in reply.text.split_whitespace() {
            assert!(token == "hello" || token == "world", "unexpected {:?}", token);
        }
        assert_eq!(h.queue.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fires_in_fire_time_order() {
        let h = harness(8);
        let late = ReplyTarget::Channel("#late".to_string());
        let early = ReplyTarget::Channel("#early".to_string());
        h.queue.schedule(late.clone(), Duration::from_secs(600)).expect("late");
        h.queue.schedule(early.clone(), Duration::from_secs(60)).expect("early");

        assert_eq!(h.replies.recv_async().await.expect("first").target, early);
        assert_eq!(h.replies.recv_async().await.expect("second").target, late);
    }

    #[tokio::test(start_paused = true)]
    async fn refuses_replies_beyond_capacity() {
        let h = harness(2);
        h.queue.schedule(channel(), Duration::from_secs(60)).expect("first");
        h.queue.schedule(channel(), Duration::from_secs(60)).expect("second");
        assert!(h.queue.schedule(channel(), Duration::from_secs(60)).is_err());
        assert_eq!(h.queue.pending(), 2);

        h.replies.recv_async().await.expect("first reply");
        h.replies.recv_async().await.expect("second reply");
        tokio::task::yield_now().await;
        assert_eq!(h.queue.pending(), 0);
        h.queue
            .schedule(channel(), Duration::from_secs(60))
            .expect("room again after firing");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_replies() {
        let h = harness(8);
        for _ in 0..3 {
            h.queue.schedule(channel(), Duration::from_secs(3600)).expect("schedule");
        }

        let report = h.queue.shutdown(ShutdownMode::Cancel).await;
        assert_eq!(
            report,
            ShutdownReport {
                fired: 0,
                drained: 0,
                cancelled: 3,
            }
        );
        assert_eq!(h.queue.pending(), 0);
        assert!(h.replies.is_empty());
        assert!(h.queue.schedule(channel(), Duration::ZERO).is_err());
        assert_eq!(h.queue.shutdown(ShutdownMode::Cancel).await, ShutdownReport::default());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_drains_pending_replies() {
        let h = harness(8);
        h.store.insert("drain me now please").expect("insert");
        h.queue.schedule(channel(), Duration::from_secs(3600)).expect("first");
        h.queue.schedule(channel(), Duration::from_secs(7200)).expect("second");

        let report = h.queue.shutdown(ShutdownMode::Drain).await;
        assert_eq!(report.drained, 2);
        assert_eq!(report.cancelled, 0);
        assert_eq!(h.replies.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn schedules_racing_shutdown_are_all_accounted_for() {
        let h = harness(100_000);
        let queue = Arc::new(h.queue);

        let scheduler = {
            let queue = queue.clone();
            tokio::spawn(async move {
                let mut accepted = 0usize;
                while queue.schedule(channel(), Duration::from_secs(3600)).is_ok() {
                    accepted += 1;
                    tokio::task::yield_now().await;
                }
                accepted
            })
        };

        tokio::task::yield_now().await;
        let report = queue.shutdown(ShutdownMode::Cancel).await;
        let accepted = scheduler.await.expect("scheduler task");

        assert_eq!(report.cancelled, accepted);
        assert_eq!(queue.pending(), 0);
        assert!(queue.schedule(channel(), Duration::ZERO).is_err());
    }
}
