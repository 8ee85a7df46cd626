use std::collections::VecDeque;
use std::fmt;

use crate::Context;
use crate::Fault;
use crate::FaultResult;
use crate::ManagedObjectReference;
use crate::Value;

/// A family of history collectors: what they record, how a collector's
/// filter selects entries, and how entries are shown in `latestPage`.
pub trait HistoryKind: Send + Sync + 'static {
    type Item: Clone + PartialEq + fmt::Debug + Send + Sync;
    type Filter: Clone + fmt::Debug + Send + Sync;

    /// Managed object type of a collector
    const COLLECTOR_KIND: &'static str;

    fn matches(
        ctx: &Context,
        filter: &Self::Filter,
        item: &Self::Item,
    ) -> bool;

    /// Wire form of `item`; `None` drops it from pages.
    fn render(
        ctx: &Context,
        item: &Self::Item,
    ) -> Option<Value>;
}

/// Filtered, bounded log of one collector with a read cursor.
///
/// The cursor sits between entries. Until it is first positioned, reading
/// forward starts at the oldest entry and reading backward at the newest.
pub struct HistoryCollector<K: HistoryKind> {
    reference: ManagedObjectReference,
    filter: K::Filter,
    log: VecDeque<K::Item>,
    capacity: usize,
    cursor: Option<usize>,
    page_size: usize,
}

impl<K: HistoryKind> fmt::Debug for HistoryCollector<K> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("HistoryCollector")
            .field("reference", &self.reference)
            .field("kind", &K::COLLECTOR_KIND)
            .field("entries", &self.log.len())
            .field("cursor", &self.cursor)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl<K: HistoryKind> HistoryCollector<K> {
    pub(crate) fn new(
        reference: ManagedObjectReference,
        filter: K::Filter,
        page_size: usize,
        capacity: usize,
    ) -> Self {
        Self {
            reference,
            filter,
            log: VecDeque::new(),
            capacity: capacity.max(1),
            cursor: None,
            page_size,
        }
    }

    pub fn reference(&self) -> &ManagedObjectReference {
        &self.reference
    }

    pub(crate) fn set_reference(
        &mut self,
        reference: ManagedObjectReference,
    ) {
        self.reference = reference;
    }

    pub fn filter(&self) -> &K::Filter {
        &self.filter
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn contains(
        &self,
        item: &K::Item,
    ) -> bool {
        self.log.contains(item)
    }

    /// Appends `item` when the filter accepts it, evicting the oldest entry
    /// once full. Returns whether it was accepted.
    pub(crate) fn offer(
        &mut self,
        ctx: &Context,
        item: &K::Item,
    ) -> bool {
        if !K::matches(ctx, &self.filter, item) {
            return false;
        }
        self.push(item.clone());
        true
    }

    fn push(
        &mut self,
        item: K::Item,
    ) {
        if self.log.len() >= self.capacity {
            self.log.pop_front();
            if let Some(cursor) = self.cursor.as_mut() {
                *cursor = cursor.saturating_sub(1);
            }
        }
        self.log.push_back(item);
    }

    /// Loads the matching entries of `history`, oldest first.
    pub(crate) fn fill<'a>(
        &mut self,
        ctx: &Context,
        history: impl Iterator<Item = &'a K::Item>,
    ) where
        K::Item: 'a,
    {
        for item in history {
            self.offer(ctx, item);
        }
    }

    /// Visits up to `max` entries after the cursor, oldest first, and moves
    /// the cursor past them.
    pub fn next(
        &mut self,
        max: i32,
        mut visit: impl FnMut(&K::Item),
    ) -> FaultResult<usize> {
        let max = max_count(max)?;
        let start = self.cursor.unwrap_or(0);
        let end = (start + max).min(self.log.len());

        for item in self.log.range(start..end) {
            visit(item);
        }
        self.cursor = Some(end);
        Ok(end - start)
    }

    /// Visits up to `max` entries before the cursor, newest first, and
    /// moves the cursor before them.
    pub fn prev(
        &mut self,
        max: i32,
        mut visit: impl FnMut(&K::Item),
    ) -> FaultResult<usize> {
        let max = max_count(max)?;
        let end = self.cursor.unwrap_or(self.log.len());
        let start = end.saturating_sub(max);

        for item in self.log.range(start..end).rev() {
            visit(item);
        }
        self.cursor = Some(start);
        Ok(end - start)
    }

    /// Moves the cursor before the oldest entry.
    pub fn rewind(&mut self) {
        self.cursor = Some(0);
    }

    /// Moves the cursor after the newest entry.
    pub fn reset(&mut self) {
        self.cursor = Some(self.log.len());
    }

    /// The most recent `page_size` entries, newest first.
    pub fn latest_page(&self) -> Vec<&K::Item> {
        self.log.iter().rev().take(self.page_size).collect()
    }

    pub(crate) fn set_page_size(
        &mut self,
        page_size: usize,
    ) {
        self.page_size = page_size;
    }
}

fn max_count(max: i32) -> FaultResult<usize> {
    if max <= 0 {
        return Err(Fault::invalid_argument("maxCount"));
    }
    Ok(max as usize)
}
