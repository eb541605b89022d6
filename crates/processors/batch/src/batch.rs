use otel_stage_component::pdata::{Logs, Metrics, Traces};
use otel_stage_component::{ConsumeError, ConsumeLogs, ConsumeMetrics, ConsumeTraces, Context};
use std::sync::Arc;

/// Outcome of one successful send.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct SentBatch {
    pub items: usize,
    /// Serialized size of the sent payload; 0 unless requested.
    pub bytes: usize,
}

/// One signal kind's accumulation buffer.
///
/// The batcher worker that owns the buffer is its only caller, so
/// implementations need no internal locking.
#[async_trait::async_trait]
pub trait Batch: Send + 'static {
    /// Payload type this buffer accumulates.
    type Input: Send + 'static;

    /// Moves the items of `input` into the buffer. Inputs without items are
    /// a no-op.
    fn add(&mut self, input: Self::Input);

    /// Number of buffered items.
    fn item_count(&self) -> usize;

    /// Sends buffered items to the next consumer. With a nonzero `max_size`
    /// and more than `max_size` buffered items, exactly the first
    /// `max_size` items are sent and the rest stay buffered; otherwise the
    /// whole buffer is sent. Sent items are gone even when the consumer
    /// returns an error.
    async fn export(
        &mut self,
        ctx: &Context,
        max_size: usize,
        return_bytes: bool,
    ) -> Result<SentBatch, ConsumeError>;
}

pub struct TracesBatch {
    next: Arc<dyn ConsumeTraces>,
    data: Traces,
    span_count: usize,
}

impl TracesBatch {
    pub fn new(next: Arc<dyn ConsumeTraces>) -> Self {
        Self {
            next,
            data: Traces::new(),
            span_count: 0,
        }
    }
}

#[async_trait::async_trait]
impl Batch for TracesBatch {
    type Input = Traces;

    fn add(&mut self, input: Traces) {
        let count = input.span_count();
        if count == 0 {
            return;
        }
        self.span_count += count;
        self.data.append(input);
    }

    fn item_count(&self) -> usize {
        self.span_count
    }

    async fn export(
        &mut self,
        ctx: &Context,
        max_size: usize,
        return_bytes: bool,
    ) -> Result<SentBatch, ConsumeError> {
        let (request, sent) = if max_size > 0 && self.span_count > max_size {
            self.span_count -= max_size;
            (self.data.split(max_size), max_size)
        } else {
            let sent = self.span_count;
            self.span_count = 0;
            (std::mem::take(&mut self.data), sent)
        };
        let bytes = if return_bytes {
            request.encoded_size()
        } else {
            0
        };
        self.next.consume_traces(ctx, request).await?;
        Ok(SentBatch { items: sent, bytes })
    }
}

pub struct MetricsBatch {
    next: Arc<dyn ConsumeMetrics>,
    data: Metrics,
    data_point_count: usize,
}

impl MetricsBatch {
    pub fn new(next: Arc<dyn ConsumeMetrics>) -> Self {
        Self {
            next,
            data: Metrics::new(),
            data_point_count: 0,
        }
    }
}

#[async_trait::async_trait]
impl Batch for MetricsBatch {
    type Input = Metrics;

    fn add(&mut self, input: Metrics) {
        let count = input.data_point_count();
        if count == 0 {
            return;
        }
        self.data_point_count += count;
        self.data.append(input);
    }

    fn item_count(&self) -> usize {
        self.data_point_count
    }

    async fn export(
        &mut self,
        ctx: &Context,
        max_size: usize,
        return_bytes: bool,
    ) -> Result<SentBatch, ConsumeError> {
        let (request, sent) = if max_size > 0 && self.data_point_count > max_size {
            self.data_point_count -= max_size;
            (self.data.split(max_size), max_size)
        } else {
            let sent = self.data_point_count;
            self.data_point_count = 0;
            (std::mem::take(&mut self.data), sent)
        };
        let bytes = if return_bytes {
            request.encoded_size()
        } else {
            0
        };
        self.next.consume_metrics(ctx, request).await?;
        Ok(SentBatch { items: sent, bytes })
    }
}

pub struct LogsBatch {
    next: Arc<dyn ConsumeLogs>,
    data: Logs,
    log_count: usize,
}

impl LogsBatch {
    pub fn new(next: Arc<dyn ConsumeLogs>) -> Self {
        Self {
            next,
            data: Logs::new(),
            log_count: 0,
        }
    }
}

#[async_trait::async_trait]
impl Batch for LogsBatch {
    type Input = Logs;

    fn add(&mut self, input: Logs) {
        let count = input.log_record_count();
        if count == 0 {
            return;
        }
        self.log_count += count;
        self.data.append(input);
    }

    fn item_count(&self) -> usize {
        self.log_count
    }

    async fn export(
        &mut self,
        ctx: &Context,
        max_size: usize,
        return_bytes: bool,
    ) -> Result<SentBatch, ConsumeError> {
        let (request, sent) = if max_size > 0 && self.log_count > max_size {
            self.log_count -= max_size;
            (self.data.split(max_size), max_size)
        } else {
            let sent = self.log_count;
            self.log_count = 0;
            (std::mem::take(&mut self.data), sent)
        };
        let bytes = if return_bytes {
            request.encoded_size()
        } else {
            0
        };
        self.next.consume_logs(ctx, request).await?;
        Ok(SentBatch { items: sent, bytes })
    }
}
