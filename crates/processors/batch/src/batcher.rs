use crate::batch::{Batch, SentBatch};
use crate::telemetry::{BatchTelemetry, SendTrigger};
use otel_stage_component::{ConsumeError, Context};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::warn;

/// Capacity of each batcher's input channel. A full channel blocks the
/// producer, which is the stage's only form of backpressure.
pub const INPUT_CHANNEL_CAPACITY: usize = 64;

/// Deadline used to park the timer arm of the select loop when no timeout
/// is configured; the arm is disabled and never fires.
const IDLE_TIMER_PERIOD: Duration = Duration::from_secs(3600);

/// Read-only state shared by every batcher of one processor.
pub(crate) struct BatcherShared {
    pub timeout: Duration,
    pub send_batch_size: usize,
    pub send_batch_max_size: usize,
    pub telemetry: BatchTelemetry,
}

/// Producer-side handle to one batcher worker.
#[derive(Debug)]
pub(crate) struct BatcherHandle<T> {
    items_tx: mpsc::Sender<T>,
    worker: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> BatcherHandle<T> {
    pub async fn send(&self, item: T) -> Result<(), ConsumeError> {
        self.items_tx
            .send(item)
            .await
            .map_err(|_| ConsumeError::new("batcher is shut down"))
    }

    /// Waits for the worker to drain and exit. A no-op after the first call.
    pub async fn join(&self) {
        let worker = self.worker.lock().unwrap().take();
        if let Some(worker) = worker {
            if let Err(err) = worker.await {
                warn!("batcher worker failed: {err}");
            }
        }
    }
}

/// A single instance of the batching logic. When metadata keys are in use,
/// one of these exists per distinct combination of values.
pub(crate) struct Batcher<B: Batch> {
    shared: Arc<BatcherShared>,
    /// Carries the metadata key-values this batcher was created for.
    export_ctx: Context,
    batch: B,
    items_rx: mpsc::Receiver<B::Input>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<B: Batch> Batcher<B> {
    /// Spawns the worker loop and returns the producer-side handle.
    pub fn spawn(
        shared: Arc<BatcherShared>,
        export_ctx: Context,
        batch: B,
        shutdown_rx: watch::Receiver<bool>,
    ) -> BatcherHandle<B::Input> {
        let (items_tx, items_rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
        let batcher = Batcher {
            shared,
            export_ctx,
            batch,
            items_rx,
            shutdown_rx,
        };
        let worker = tokio::spawn(batcher.run());
        BatcherHandle {
            items_tx,
            worker: std::sync::Mutex::new(Some(worker)),
        }
    }

    async fn run(mut self) {
        let has_timer = !self.shared.timeout.is_zero();
        let timeout = if has_timer {
            self.shared.timeout
        } else {
            IDLE_TIMER_PERIOD
        };
        let timer = tokio::time::sleep(timeout);
        tokio::pin!(timer);
        loop {
            tokio::select! {
                _ = self.shutdown_rx.changed() => {
                    // Take whatever producers managed to enqueue, then flush
                    // the remainder.
                    while let Ok(item) = self.items_rx.try_recv() {
                        self.process_item(item).await;
                    }
                    if self.batch.item_count() > 0 {
                        self.send_batch(SendTrigger::Timeout).await;
                    }
                    return;
                }
                Some(item) = self.items_rx.recv() => {
                    let sent = self.process_item(item).await;
                    if sent && has_timer {
                        // The next timeout is measured from the last send.
                        timer.as_mut().reset(tokio::time::Instant::now() + timeout);
                    }
                }
                () = timer.as_mut(), if has_timer => {
                    if self.batch.item_count() > 0 {
                        self.send_batch(SendTrigger::Timeout).await;
                    }
                    timer.as_mut().reset(tokio::time::Instant::now() + timeout);
                }
            }
        }
    }

    /// Adds `item` to the batch, then sends as long as the size trigger
    /// holds; one oversized arrival can take several sends to drain down
    /// below the threshold. Returns whether anything was sent.
    async fn process_item(&mut self, item: B::Input) -> bool {
        self.batch.add(item);
        let mut sent = false;
        while self.batch.item_count() > 0 && self.ready_to_send() {
            sent = true;
            self.send_batch(SendTrigger::BatchSize).await;
        }
        sent
    }

    /// Without a timer everything is sent as it arrives; with one, only
    /// once the soft threshold is reached. A zero threshold leaves sending
    /// to the timer alone.
    fn ready_to_send(&self) -> bool {
        if self.shared.timeout.is_zero() {
            return true;
        }
        self.shared.send_batch_size > 0
            && self.batch.item_count() >= self.shared.send_batch_size
    }

    async fn send_batch(&mut self, trigger: SendTrigger) {
        let result = self
            .batch
            .export(
                &self.export_ctx,
                self.shared.send_batch_max_size,
                self.shared.telemetry.detailed,
            )
            .await;
        match result {
            Ok(SentBatch { items, bytes }) => {
                self.shared
                    .telemetry
                    .record(trigger, items as u64, bytes as u64);
            }
            Err(err) => {
                warn!(error = %err, "sender failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::TracesBatch;
    use otel_stage_component::pdata::{ResourceSpans, ScopeSpans, Span, Traces};
    use otel_stage_component::telemetry::TelemetrySettings;
    use otel_stage_component::ConsumeTraces;
    use std::sync::Mutex;

    #[derive(Default)]
    struct TracesSink {
        batches: Mutex<Vec<usize>>,
    }

    #[async_trait::async_trait]
    impl ConsumeTraces for TracesSink {
        async fn consume_traces(&self, _ctx: &Context, traces: Traces) -> Result<(), ConsumeError> {
            self.batches.lock().unwrap().push(traces.span_count());
            Ok(())
        }
    }

    fn traces(count: usize) -> Traces {
        Traces {
            resource_spans: vec![ResourceSpans {
                scope_spans: vec![ScopeSpans {
                    spans: (0..count).map(|_| Span::default()).collect(),
                    ..ScopeSpans::default()
                }],
                ..ResourceSpans::default()
            }],
        }
    }

    fn shared(timeout: Duration, size: usize, max_size: usize) -> Arc<BatcherShared> {
        Arc::new(BatcherShared {
            timeout,
            send_batch_size: size,
            send_batch_max_size: max_size,
            telemetry: BatchTelemetry::new(&TelemetrySettings::default(), || 1),
        })
    }

    fn spawn_batcher(
        shared: Arc<BatcherShared>,
        sink: Arc<TracesSink>,
    ) -> (BatcherHandle<Traces>, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = Batcher::spawn(
            shared,
            Context::default(),
            TracesBatch::new(sink),
            shutdown_rx,
        );
        (handle, shutdown_tx)
    }

    #[tokio::test]
    async fn flushes_once_threshold_is_reached() {
        let sink = Arc::new(TracesSink::default());
        let (handle, shutdown_tx) =
            spawn_batcher(shared(Duration::from_secs(10), 5, 0), sink.clone());

        handle.send(traces(3)).await.unwrap();
        handle.send(traces(3)).await.unwrap();
        shutdown_tx.send(true).unwrap();
        handle.join().await;

        assert_eq!(*sink.batches.lock().unwrap(), [6]);
    }

    #[tokio::test]
    async fn oversized_arrival_drains_in_chunks() {
        let sink = Arc::new(TracesSink::default());
        let (handle, shutdown_tx) =
            spawn_batcher(shared(Duration::from_secs(10), 5, 5), sink.clone());

        handle.send(traces(13)).await.unwrap();
        shutdown_tx.send(true).unwrap();
        handle.join().await;

        assert_eq!(*sink.batches.lock().unwrap(), [5, 5, 3]);
    }

    #[tokio::test]
    async fn without_a_timer_everything_flushes_immediately() {
        let sink = Arc::new(TracesSink::default());
        let (handle, shutdown_tx) = spawn_batcher(shared(Duration::ZERO, 100, 0), sink.clone());

        handle.send(traces(2)).await.unwrap();
        handle.send(traces(3)).await.unwrap();
        shutdown_tx.send(true).unwrap();
        handle.join().await;

        assert_eq!(*sink.batches.lock().unwrap(), [2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_flushes_after_quiescence() {
        let sink = Arc::new(TracesSink::default());
        let (handle, _shutdown_tx) =
            spawn_batcher(shared(Duration::from_millis(200), 100, 0), sink.clone());

        handle.send(traces(4)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(sink.batches.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(*sink.batches.lock().unwrap(), [4]);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_alone_flushes_when_size_trigger_is_disabled() {
        let sink = Arc::new(TracesSink::default());
        let (handle, _shutdown_tx) =
            spawn_batcher(shared(Duration::from_millis(200), 0, 0), sink.clone());

        handle.send(traces(4)).await.unwrap();
        handle.send(traces(4)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(sink.batches.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(*sink.batches.lock().unwrap(), [8]);
    }

    #[tokio::test]
    async fn shutdown_drains_the_channel_before_exiting() {
        let sink = Arc::new(TracesSink::default());
        let (handle, shutdown_tx) =
            spawn_batcher(shared(Duration::from_secs(10), 1000, 0), sink.clone());

        for _ in 0..4 {
            handle.send(traces(2)).await.unwrap();
        }
        shutdown_tx.send(true).unwrap();
        handle.join().await;

        let batches = sink.batches.lock().unwrap();
        let total: usize = batches.iter().sum();
        assert_eq!(total, 8);
    }

    #[tokio::test]
    async fn send_after_shutdown_fails() {
        let sink = Arc::new(TracesSink::default());
        let (handle, shutdown_tx) =
            spawn_batcher(shared(Duration::from_secs(10), 1000, 0), sink);

        shutdown_tx.send(true).unwrap();
        handle.join().await;

        assert!(handle.send(traces(1)).await.is_err());
    }
}
