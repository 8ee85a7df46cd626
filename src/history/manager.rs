use std::collections::HashMap;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use parking_lot::RwLock;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::HistoryCollector;
use super::HistoryKind;
use crate::config::HistoryConfig;
use crate::constants::LATEST_PAGE_PROPERTY;
use crate::metrics::HISTORY_PUSHES;
use crate::Context;
use crate::Fault;
use crate::FaultResult;
use crate::ManagedObject;
use crate::ManagedObjectReference;
use crate::PropertyChange;
use crate::Value;

type SharedCollector<K> = Arc<Mutex<HistoryCollector<K>>>;

/// Authoritative bounded history of one kind plus its live collectors.
///
/// Every pushed item lands in the master log first (oldest evicted), then
/// in each collector whose filter accepts it; that collector's
/// `latestPage` is then republished through the registry so live property
/// filters observe it. A collector's offer and republish run under its
/// object lock, so `latestPage` always shows the newest accepted item.
pub struct HistoryManager<K: HistoryKind> {
    config: HistoryConfig,
    history_size: usize,
    max_collectors: usize,
    /// Reserved collector slots, registered or transient
    live: AtomicUsize,
    history: Mutex<VecDeque<K::Item>>,
    collectors: RwLock<HashMap<ManagedObjectReference, SharedCollector<K>>>,
}

/// One reserved collector slot, given back on drop unless kept.
pub(crate) struct CollectorSlot<'a> {
    live: &'a AtomicUsize,
}

impl CollectorSlot<'_> {
    /// Hands the slot to a registered collector; destroying it frees the slot.
    fn keep(self) {
        std::mem::forget(self);
    }
}

impl Drop for CollectorSlot<'_> {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<K: HistoryKind> fmt::Debug for HistoryManager<K> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("HistoryManager")
            .field("kind", &K::COLLECTOR_KIND)
            .field("history", &self.history.lock().len())
            .field("collectors", &self.collectors.read().len())
            .finish()
    }
}

impl<K: HistoryKind> HistoryManager<K> {
    pub(crate) fn new(
        config: HistoryConfig,
        history_size: usize,
        max_collectors: usize,
    ) -> Self {
        Self {
            config,
            history_size: history_size.max(1),
            max_collectors,
            live: AtomicUsize::new(0),
            history: Mutex::new(VecDeque::new()),
            collectors: RwLock::new(HashMap::new()),
        }
    }

    /// Master log, oldest first.
    pub fn history(&self) -> Vec<K::Item> {
        self.history.lock().iter().cloned().collect()
    }

    pub fn collector_count(&self) -> usize {
        self.collectors.read().len()
    }

    pub fn max_collectors(&self) -> usize {
        self.max_collectors
    }

    /// `0` selects the default size, negative sizes are rejected and sizes
    /// above the maximum are clamped.
    pub fn page_size(
        &self,
        requested: i32,
    ) -> FaultResult<usize> {
        match requested {
            0 => Ok(self.config.default_page_size),
            n if n < 0 => Err(Fault::invalid_argument("maxCount")),
            n => Ok((n as usize).min(self.config.max_page_size)),
        }
    }

    /// Claims one of the `max_collectors` slots; none left is `InvalidState`.
    pub(crate) fn reserve(&self) -> FaultResult<CollectorSlot<'_>> {
        self.live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < self.max_collectors).then_some(n + 1))
            .map_err(|_| {
                debug!(kind = K::COLLECTOR_KIND, limit = self.max_collectors, "collector limit reached");
                Fault::InvalidState
            })?;
        Ok(CollectorSlot { live: &self.live })
    }

    /// An unregistered collector preloaded from the master log.
    pub(crate) fn build(
        &self,
        ctx: &Context,
        filter: K::Filter,
        page_size: usize,
    ) -> HistoryCollector<K> {
        let mut collector = HistoryCollector::new(
            ManagedObjectReference::new(K::COLLECTOR_KIND, ""),
            filter,
            page_size,
            self.config.max_page_size,
        );
        let history = self.history();
        collector.fill(ctx, history.iter());
        collector
    }

    /// Creates a session-scoped collector. Exceeding the live-collector
    /// limit is `InvalidState`.
    pub fn create_collector(
        &self,
        ctx: &Context,
        filter: K::Filter,
        page_size: i32,
    ) -> FaultResult<ManagedObjectReference> {
        let page_size = self.page_size(page_size)?;
        let slot = self.reserve()?;
        let mut collector = self.build(ctx, filter, page_size);

        let page = render(ctx, &collector);
        let reference = ctx.put_scoped(ManagedObject::new(K::COLLECTOR_KIND).with_property(LATEST_PAGE_PROPERTY, page));
        collector.set_reference(reference.clone());
        self.collectors
            .write()
            .insert(reference.clone(), Arc::new(Mutex::new(collector)));
        slot.keep();

        debug!(kind = K::COLLECTOR_KIND, collector = %reference, "history collector created");
        Ok(reference)
    }

    pub fn collector(
        &self,
        reference: &ManagedObjectReference,
    ) -> FaultResult<SharedCollector<K>> {
        self.collectors
            .read()
            .get(reference)
            .cloned()
            .ok_or_else(|| Fault::not_found(reference))
    }

    pub fn destroy_collector(
        &self,
        ctx: &Context,
        reference: &ManagedObjectReference,
    ) -> FaultResult<()> {
        self.collectors
            .write()
            .remove(reference)
            .ok_or_else(|| Fault::not_found(reference))?;
        self.live.fetch_sub(1, Ordering::AcqRel);
        ctx.remove_scoped(reference);

        debug!(kind = K::COLLECTOR_KIND, collector = %reference, "history collector destroyed");
        Ok(())
    }

    /// Records `item` and republishes the latest page of every collector
    /// that accepts it.
    pub fn push(
        &self,
        ctx: &Context,
        item: K::Item,
    ) {
        {
            let mut history = self.history.lock();
            if history.len() >= self.history_size {
                history.pop_front();
            }
            history.push_back(item.clone());
        }
        HISTORY_PUSHES.with_label_values(&[K::COLLECTOR_KIND]).inc();

        let mut accepted = 0;
        for (reference, collector) in self.collectors() {
            let offered = ctx.with_lock(&reference, || {
                let page = {
                    let mut collector = collector.lock();
                    if !collector.offer(ctx, &item) {
                        return false;
                    }
                    render(ctx, &collector)
                };
                publish(ctx, &reference, page);
                true
            });
            if offered {
                accepted += 1;
            }
        }
        trace!(kind = K::COLLECTOR_KIND, ?item, accepted, "history push");
    }

    /// Republishes the latest page of every collector holding `item`.
    pub(crate) fn refresh(
        &self,
        ctx: &Context,
        item: &K::Item,
    ) {
        for (reference, collector) in self.collectors() {
            ctx.with_lock(&reference, || {
                let page = {
                    let collector = collector.lock();
                    if !collector.latest_page().contains(&item) {
                        return;
                    }
                    render(ctx, &collector)
                };
                publish(ctx, &reference, page);
            });
        }
    }

    pub fn read_next(
        &self,
        ctx: &Context,
        reference: &ManagedObjectReference,
        max: i32,
    ) -> FaultResult<Vec<Value>> {
        let collector = self.collector(reference)?;
        let mut items = Vec::new();
        collector.lock().next(max, |item| items.push(item.clone()))?;
        Ok(items.iter().filter_map(|item| K::render(ctx, item)).collect())
    }

    pub fn read_previous(
        &self,
        ctx: &Context,
        reference: &ManagedObjectReference,
        max: i32,
    ) -> FaultResult<Vec<Value>> {
        let collector = self.collector(reference)?;
        let mut items = Vec::new();
        collector.lock().prev(max, |item| items.push(item.clone()))?;
        Ok(items.iter().filter_map(|item| K::render(ctx, item)).collect())
    }

    pub fn rewind(
        &self,
        reference: &ManagedObjectReference,
    ) -> FaultResult<()> {
        self.collector(reference)?.lock().rewind();
        Ok(())
    }

    pub fn reset(
        &self,
        reference: &ManagedObjectReference,
    ) -> FaultResult<()> {
        self.collector(reference)?.lock().reset();
        Ok(())
    }

    pub fn latest_page(
        &self,
        ctx: &Context,
        reference: &ManagedObjectReference,
    ) -> FaultResult<Vec<Value>> {
        let collector = self.collector(reference)?;
        let items: Vec<K::Item> = collector.lock().latest_page().into_iter().cloned().collect();
        Ok(items.iter().filter_map(|item| K::render(ctx, item)).collect())
    }

    pub fn set_page_size(
        &self,
        ctx: &Context,
        reference: &ManagedObjectReference,
        page_size: i32,
    ) -> FaultResult<()> {
        let page_size = self.page_size(page_size)?;
        let collector = self.collector(reference)?;
        ctx.with_lock(reference, || {
            let page = {
                let mut collector = collector.lock();
                collector.set_page_size(page_size);
                render(ctx, &collector)
            };
            publish(ctx, reference, page);
        });
        Ok(())
    }

    fn collectors(&self) -> Vec<(ManagedObjectReference, SharedCollector<K>)> {
        self.collectors
            .read()
            .iter()
            .map(|(reference, collector)| (reference.clone(), collector.clone()))
            .collect()
    }
}

/// `latestPage` value of `collector`.
pub(crate) fn render<K: HistoryKind>(
    ctx: &Context,
    collector: &HistoryCollector<K>,
) -> Value {
    Value::Array(
        collector
            .latest_page()
            .into_iter()
            .filter_map(|item| K::render(ctx, item))
            .collect(),
    )
}

fn publish(
    ctx: &Context,
    reference: &ManagedObjectReference,
    page: Value,
) {
    if let Err(e) = ctx
        .registry()
        .update(ctx, reference, &[PropertyChange::assign(LATEST_PAGE_PROPERTY, page)])
    {
        warn!(collector = %reference, "latestPage not published: {}", e);
    }
}
