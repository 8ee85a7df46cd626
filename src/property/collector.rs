use std::future;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use parking_lot::RwLock;
use tokio::time::interval;
use tokio::time::sleep_until;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;

use super::filter::PropertyFilter;
use super::queue::UpdateQueue;
use super::retrieve::collect;
use super::retrieve::RetrieveBook;
use super::traversal::TraversalPlan;
use crate::config::PropertyCollectorConfig;
use crate::constants::FILTER_PROPERTY;
use crate::metrics::WAIT_OUTCOMES;
use crate::Context;
use crate::Fault;
use crate::FaultResult;
use crate::ManagedObject;
use crate::ManagedObjectReference;
use crate::ObjectContent;
use crate::ObjectSpec;
use crate::ObserverId;
use crate::PropertyFilterSpec;
use crate::PropertyFilterUpdate;
use crate::PropertySpec;
use crate::RetrieveOptions;
use crate::RetrieveResult;
use crate::UpdateSet;
use crate::Value;
use crate::WaitOptions;

/// Value of the service-wide collector's reference.
pub const PROPERTY_COLLECTOR_VALUE: &str = "propertyCollector";

struct FilterEntry {
    filter: Arc<PropertyFilter>,
    observer: ObserverId,
}

/// Property collection endpoint: one-shot retrieval plus the live filters
/// it owns and the blocking update wait over them.
///
/// Registry mutations are queued by an observer registered on the first
/// wait; each poll drains the queue and hands the batch to every filter.
pub struct PropertyCollector {
    reference: ManagedObjectReference,
    config: PropertyCollectorConfig,
    filters: RwLock<Vec<FilterEntry>>,
    queue: Arc<UpdateQueue>,
    listener: Mutex<Option<ObserverId>>,
    /// Remainder of a truncated update set
    pending: Mutex<Option<UpdateSet>>,
    version: AtomicU64,
    current_wait: Mutex<Option<CancellationToken>>,
    book: Arc<RetrieveBook>,
}

impl std::fmt::Debug for PropertyCollector {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("PropertyCollector")
            .field("reference", &self.reference)
            .field("filters", &self.filters.read().len())
            .field("queued", &self.queue.len())
            .finish()
    }
}

impl PropertyCollector {
    /// Stores the service-wide collector `PropertyCollector:propertyCollector`.
    pub fn new(
        ctx: &Context,
        config: PropertyCollectorConfig,
    ) -> Arc<Self> {
        let reference = ctx.registry().put(
            ctx,
            ManagedObject::with_reference(ManagedObjectReference::new("PropertyCollector", PROPERTY_COLLECTOR_VALUE)),
        );
        Arc::new(Self::with_parts(reference, config, Arc::default()))
    }

    fn with_parts(
        reference: ManagedObjectReference,
        config: PropertyCollectorConfig,
        book: Arc<RetrieveBook>,
    ) -> Self {
        Self {
            reference,
            config,
            filters: RwLock::new(Vec::new()),
            queue: Arc::default(),
            listener: Mutex::new(None),
            pending: Mutex::new(None),
            version: AtomicU64::new(0),
            current_wait: Mutex::new(None),
            book,
        }
    }

    pub fn reference(&self) -> &ManagedObjectReference {
        &self.reference
    }

    /// A session-scoped collector sharing this one's configuration.
    pub fn create_property_collector(
        &self,
        ctx: &Context,
    ) -> Arc<PropertyCollector> {
        let reference = ctx.put_scoped(ManagedObject::new("PropertyCollector"));
        debug!(collector = %reference, "property collector created");
        Arc::new(Self::with_parts(reference, self.config.clone(), self.book.clone()))
    }

    /// Cancels a running wait, destroys every filter, stops listening and
    /// removes the collector object.
    pub fn destroy_property_collector(
        &self,
        ctx: &Context,
    ) {
        self.cancel_wait_for_updates();

        let entries = std::mem::take(&mut *self.filters.write());
        for entry in entries {
            ctx.registry().remove_observer(entry.observer);
            ctx.remove_scoped(entry.filter.reference());
        }
        if let Some(id) = self.listener.lock().take() {
            ctx.registry().remove_observer(id);
        }
        ctx.remove_scoped(&self.reference);
        debug!(collector = %self.reference, "property collector destroyed");
    }

    /// Every matching object, unpaged.
    pub fn retrieve_properties(
        &self,
        ctx: &Context,
        specs: &[PropertyFilterSpec],
    ) -> FaultResult<Vec<ObjectContent>> {
        let plan = TraversalPlan::compile(specs)?;
        Ok(collect(ctx, specs, &plan, false)?.objects)
    }

    /// First page of at most `maxObjects` results, with a continuation token
    /// when more remain.
    pub fn retrieve_properties_ex(
        &self,
        ctx: &Context,
        specs: &[PropertyFilterSpec],
        options: &RetrieveOptions,
    ) -> FaultResult<RetrieveResult> {
        let objects = self.retrieve_properties(ctx, specs)?;
        let max = options.max_objects.unwrap_or(0).max(0) as usize;
        Ok(self.book.page(objects, max))
    }

    pub fn continue_retrieve_properties_ex(
        &self,
        token: &str,
    ) -> FaultResult<RetrieveResult> {
        self.book.next(token)
    }

    /// Discards the pages behind `token`.
    pub fn cancel_retrieve_properties_ex(
        &self,
        token: &str,
    ) -> FaultResult<()> {
        self.book.cancel(token)
    }

    /// Registers a live filter; an undefined named traversal step is
    /// `InvalidArgument` and nothing is stored.
    pub fn create_filter(
        &self,
        ctx: &Context,
        spec: PropertyFilterSpec,
        partial_updates: bool,
    ) -> FaultResult<ManagedObjectReference> {
        let filter = PropertyFilter::new(ManagedObjectReference::new("PropertyFilter", ""), spec, partial_updates)?;

        let reference = ctx.put_scoped(
            ManagedObject::new("PropertyFilter").with_property("partialUpdates", partial_updates),
        );
        let filter = Arc::new(filter.with_reference(reference.clone()));
        let observer = ctx.registry().add_observer(filter.clone());
        self.filters.write().push(FilterEntry { filter, observer });
        ctx.registry()
            .add_reference(ctx, &self.reference, FILTER_PROPERTY, &reference)?;

        debug!(collector = %self.reference, filter = %reference, partial_updates, "filter created");
        Ok(reference)
    }

    pub fn filter(
        &self,
        reference: &ManagedObjectReference,
    ) -> Option<Arc<PropertyFilter>> {
        self.filters
            .read()
            .iter()
            .find(|e| e.filter.reference() == reference)
            .map(|e| e.filter.clone())
    }

    pub fn filters(&self) -> Vec<ManagedObjectReference> {
        self.filters.read().iter().map(|e| e.filter.reference().clone()).collect()
    }

    pub fn destroy_filter(
        &self,
        ctx: &Context,
        reference: &ManagedObjectReference,
    ) -> FaultResult<()> {
        let entry = {
            let mut filters = self.filters.write();
            let position = filters
                .iter()
                .position(|e| e.filter.reference() == reference)
                .ok_or_else(|| Fault::not_found(reference))?;
            filters.remove(position)
        };

        ctx.registry().remove_observer(entry.observer);
        ctx.registry()
            .remove_reference(ctx, &self.reference, FILTER_PROPERTY, reference)?;
        ctx.remove_scoped(reference);
        debug!(collector = %self.reference, filter = %reference, "filter destroyed");
        Ok(())
    }

    /// Blocking incremental update retrieval.
    ///
    /// An empty `version` returns the full current state of every filter as
    /// Enter updates. Otherwise a remaining page of an earlier truncated
    /// response is returned first, then the call waits for changes:
    /// - `maxWaitSeconds` absent: until there are updates or the wait is
    ///   cancelled
    /// - `0`: one check, `None` when nothing changed
    /// - positive: `None` once the timeout expires
    ///
    /// Cancellation through [`PropertyCollector::cancel_wait_for_updates`] or
    /// the request context is `RequestCanceled`.
    pub async fn wait_for_updates_ex(
        &self,
        ctx: &Context,
        version: &str,
        options: &WaitOptions,
    ) -> FaultResult<Option<UpdateSet>> {
        let max = self.max_object_updates(options);
        let wait = CancellationToken::new();
        *self.current_wait.lock() = Some(wait.clone());
        self.listen(ctx);

        if version.is_empty() {
            self.pending.lock().take();
            self.queue.drain();
            let filters = self.live_filters();
            for filter in &filters {
                filter.reset();
            }
            let filter_set: Vec<PropertyFilterUpdate> = filters.iter().filter_map(|f| f.poll(ctx, &[])).collect();
            WAIT_OUTCOMES.with_label_values(&["baseline"]).inc();
            return Ok(Some(self.page(
                UpdateSet {
                    version: String::new(),
                    filter_set,
                    truncated: None,
                },
                max,
            )));
        }

        let pending = self.pending.lock().take();
        if let Some(pending) = pending {
            WAIT_OUTCOMES.with_label_values(&["pending"]).inc();
            return Ok(Some(self.page(pending, max)));
        }

        let one_update = options.max_wait_seconds == Some(0);
        let deadline = options
            .max_wait_seconds
            .filter(|s| *s > 0)
            .map(|s| Instant::now() + Duration::from_secs(s as u64));
        let mut ticker = interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if let Some(set) = self.poll(ctx) {
                WAIT_OUTCOMES.with_label_values(&["updates"]).inc();
                return Ok(Some(self.page(set, max)));
            }
            if one_update {
                WAIT_OUTCOMES.with_label_values(&["empty"]).inc();
                return Ok(None);
            }

            tokio::select! {
                _ = wait.cancelled() => {
                    trace!(collector = %self.reference, "wait canceled");
                    WAIT_OUTCOMES.with_label_values(&["canceled"]).inc();
                    return Err(Fault::RequestCanceled);
                }
                _ = ctx.cancellation_token().cancelled() => {
                    trace!(collector = %self.reference, "request canceled");
                    WAIT_OUTCOMES.with_label_values(&["canceled"]).inc();
                    return Err(Fault::RequestCanceled);
                }
                _ = until(deadline) => {
                    trace!(collector = %self.reference, "max wait exceeded");
                    WAIT_OUTCOMES.with_label_values(&["timeout"]).inc();
                    return Ok(None);
                }
                _ = ticker.tick() => {}
            }
        }
    }

    /// `WaitForUpdatesEx` without options: blocks until updates arrive.
    pub async fn wait_for_updates(
        &self,
        ctx: &Context,
        version: &str,
    ) -> FaultResult<UpdateSet> {
        let set = self.wait_for_updates_ex(ctx, version, &WaitOptions::default()).await?;
        Ok(set.unwrap_or_else(|| UpdateSet {
            version: version.to_string(),
            ..Default::default()
        }))
    }

    /// A non-blocking `WaitForUpdatesEx`.
    pub async fn check_for_updates(
        &self,
        ctx: &Context,
        version: &str,
    ) -> FaultResult<Option<UpdateSet>> {
        let options = WaitOptions {
            max_wait_seconds: Some(0),
            max_object_updates: None,
        };
        self.wait_for_updates_ex(ctx, version, &options).await
    }

    /// Wakes the running (or most recent) wait with `RequestCanceled`.
    /// Safe to call when no wait is running.
    pub fn cancel_wait_for_updates(&self) {
        if let Some(wait) = self.current_wait.lock().as_ref() {
            wait.cancel();
        }
    }

    /// Reads one property of one object.
    pub fn fetch(
        &self,
        ctx: &Context,
        obj: &ManagedObjectReference,
        prop: &str,
    ) -> FaultResult<Option<Value>> {
        let spec = PropertyFilterSpec {
            prop_set: vec![PropertySpec::new(obj.kind.clone(), &[prop])],
            object_set: vec![ObjectSpec::new(obj.clone())],
            report_missing_objects_in_results: None,
        };
        let mut objects = self.retrieve_properties(ctx, &[spec])?;
        let Some(content) = objects.pop() else {
            return Ok(None);
        };
        if let Some(property) = content.prop_set.into_iter().next() {
            return Ok(Some(property.val));
        }
        match content.missing_set.into_iter().next() {
            Some(missing) => Err(missing.fault),
            None => Ok(None),
        }
    }

    fn listen(
        &self,
        ctx: &Context,
    ) {
        let mut listener = self.listener.lock();
        if listener.is_none() {
            *listener = Some(ctx.registry().add_observer(self.queue.clone()));
        }
    }

    fn live_filters(&self) -> Vec<Arc<PropertyFilter>> {
        self.filters.read().iter().map(|e| e.filter.clone()).collect()
    }

    fn poll(
        &self,
        ctx: &Context,
    ) -> Option<UpdateSet> {
        let batch = self.queue.drain();
        let filters = self.live_filters();
        if batch.is_empty() && !filters.iter().any(|f| f.needs_walk()) {
            return None;
        }
        trace!(collector = %self.reference, updates = batch.len(), filters = filters.len(), "poll");

        let filter_set: Vec<_> = filters.iter().filter_map(|f| f.poll(ctx, &batch)).collect();
        if filter_set.is_empty() {
            return None;
        }
        Some(UpdateSet {
            version: String::new(),
            filter_set,
            truncated: None,
        })
    }

    /// Stamps a version on the first `max` object updates of `set` and
    /// keeps the rest for the next call.
    fn page(
        &self,
        set: UpdateSet,
        max: usize,
    ) -> UpdateSet {
        let (mut page, rest) = split_update_set(set, max);
        page.version = (self.version.fetch_add(1, Ordering::Relaxed) + 1).to_string();
        if let Some(rest) = &rest {
            trace!(
                collector = %self.reference,
                remaining = rest.filter_set.iter().map(|f| f.object_set.len()).sum::<usize>(),
                "update set truncated"
            );
        }
        *self.pending.lock() = rest;
        page
    }

    fn max_object_updates(
        &self,
        options: &WaitOptions,
    ) -> usize {
        let cap = self.config.max_object_updates;
        match options.max_object_updates {
            Some(n) if n > 0 => (n as usize).min(cap),
            _ => cap,
        }
    }
}

/// Splits `set` after `max` object updates. The first part is marked
/// truncated when a remainder exists.
pub(crate) fn split_update_set(
    mut set: UpdateSet,
    max: usize,
) -> (UpdateSet, Option<UpdateSet>) {
    let mut remaining = max;

    for i in 0..set.filter_set.len() {
        let n = set.filter_set[i].object_set.len();
        if n <= remaining {
            remaining -= n;
            continue;
        }

        let mut rest = set.filter_set.split_off(i);
        if remaining > 0 {
            let head = &mut rest[0];
            let tail = head.object_set.split_off(remaining);
            set.filter_set.push(PropertyFilterUpdate {
                filter: head.filter.clone(),
                object_set: std::mem::replace(&mut head.object_set, tail),
                missing_set: std::mem::take(&mut head.missing_set),
            });
        }
        set.truncated = Some(true);
        let rest = UpdateSet {
            version: String::new(),
            filter_set: rest,
            truncated: None,
        };
        return (set, Some(rest));
    }
    (set, None)
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}
