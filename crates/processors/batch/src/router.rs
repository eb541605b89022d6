use crate::batch::Batch;
use crate::batcher::{Batcher, BatcherHandle, BatcherShared};
use otel_stage_component::{ConsumeError, Context, Metadata};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Raised when the configured metadata cardinality limit has been reached.
#[derive(Debug, thiserror::Error)]
#[error("too many batcher metadata-value combinations")]
pub struct TooManyBatchers;

/// Canonical identity of one metadata-value combination.
///
/// Entries follow the configured key order, which is lowercased, sorted and
/// deduplicated up front, so equal projections compare equal no matter how
/// the incoming metadata was cased or ordered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BatcherKey(Vec<(String, Vec<String>)>);

pub(crate) type SharedHandle<T> = Arc<BatcherHandle<T>>;

/// Everything needed to bring up a new batcher worker.
pub(crate) struct BatcherSpawner<B: Batch> {
    pub shared: Arc<BatcherShared>,
    pub new_batch: Box<dyn Fn() -> B + Send + Sync>,
    pub shutdown_rx: watch::Receiver<bool>,
    pub cardinality: Arc<AtomicUsize>,
}

impl<B: Batch> BatcherSpawner<B> {
    fn spawn(&self, export_ctx: Context) -> SharedHandle<B::Input> {
        self.cardinality.fetch_add(1, Ordering::Relaxed);
        Arc::new(Batcher::spawn(
            self.shared.clone(),
            export_ctx,
            (self.new_batch)(),
            self.shutdown_rx.clone(),
        ))
    }
}

/// Maps an inbound context to the batcher responsible for it.
pub(crate) enum BatcherRouter<B: Batch> {
    /// No metadata keys configured: all traffic shares one batcher.
    Single(SharedHandle<B::Input>),
    /// One batcher per distinct metadata-value combination.
    Multi(MultiRouter<B>),
}

pub(crate) struct MultiRouter<B: Batch> {
    spawner: BatcherSpawner<B>,
    metadata_keys: Vec<String>,
    cardinality_limit: usize,
    batchers: Mutex<HashMap<BatcherKey, SharedHandle<B::Input>>>,
}

impl<B: Batch> BatcherRouter<B> {
    /// `metadata_keys` must already be lowercased, sorted and deduplicated.
    pub fn new(
        spawner: BatcherSpawner<B>,
        metadata_keys: Vec<String>,
        cardinality_limit: usize,
    ) -> Self {
        if metadata_keys.is_empty() {
            let handle = spawner.spawn(Context::default());
            return Self::Single(handle);
        }
        Self::Multi(MultiRouter {
            spawner,
            metadata_keys,
            cardinality_limit,
            batchers: Mutex::new(HashMap::new()),
        })
    }

    /// Resolves the batcher responsible for the metadata carried by `ctx`,
    /// creating it on first sight.
    pub fn route(&self, ctx: &Context) -> Result<SharedHandle<B::Input>, ConsumeError> {
        match self {
            Self::Single(handle) => Ok(handle.clone()),
            Self::Multi(multi) => multi.route(ctx),
        }
    }

    /// Removes and returns every batcher handle, for joining on shutdown.
    pub fn drain(&self) -> Vec<SharedHandle<B::Input>> {
        match self {
            Self::Single(handle) => vec![handle.clone()],
            Self::Multi(multi) => multi
                .batchers
                .lock()
                .unwrap()
                .drain()
                .map(|(_, handle)| handle)
                .collect(),
        }
    }
}

impl<B: Batch> MultiRouter<B> {
    fn route(&self, ctx: &Context) -> Result<SharedHandle<B::Input>, ConsumeError> {
        // Project the incoming metadata onto the configured keys. Missing
        // keys stay in the projection with an empty value list.
        let mut entries = Vec::with_capacity(self.metadata_keys.len());
        for key in &self.metadata_keys {
            let values = ctx.metadata().get(key).to_vec();
            entries.push((key.clone(), values));
        }
        let key = BatcherKey(entries);

        let mut batchers = self.batchers.lock().unwrap();
        if let Some(handle) = batchers.get(&key) {
            return Ok(handle.clone());
        }
        if self.cardinality_limit != 0 && batchers.len() >= self.cardinality_limit {
            return Err(ConsumeError::permanent(TooManyBatchers));
        }
        let export_metadata = Metadata::new(key.0.iter().cloned());
        let handle = self.spawner.spawn(Context::new(export_metadata));
        batchers.insert(key, handle.clone());
        Ok(handle)
    }
}
