//! Batch extractor: pages through a source table in bounded chunks.
//!
//! Paging is keyset-based on the primary key, so a page never re-reads or
//! skips rows regardless of batch size, and the source store holds no open
//! cursor between batches.

use crate::{
    error::EtlResult,
    records::{RawLoan, RawMember},
    store::SourceStore,
    types::TableName,
};
use std::marker::PhantomData;

/// A source row type that can be read page by page.
pub trait SourceRow: Sized {
    const TABLE: TableName;

    /// Primary key, strictly increasing in page order.
    fn key(&self) -> i64;

    fn fetch_page(store: &SourceStore, after: i64, limit: usize) -> EtlResult<Vec<Self>>;
}

impl SourceRow for RawMember {
    const TABLE: TableName = TableName::Members;

    fn key(&self) -> i64 {
        self.member_id
    }

    fn fetch_page(store: &SourceStore, after: i64, limit: usize) -> EtlResult<Vec<Self>> {
        store.members_after(after, limit)
    }
}

impl SourceRow for RawLoan {
    const TABLE: TableName = TableName::Loans;

    fn key(&self) -> i64 {
        self.loan_id
    }

    fn fetch_page(store: &SourceStore, after: i64, limit: usize) -> EtlResult<Vec<Self>> {
        store.loans_after(after, limit)
    }
}

/// Iterator over successive batches of one source table.
///
/// Yields `Err` at most once; after an error or a short page the iterator
/// is exhausted.
pub struct BatchExtractor<'s, R: SourceRow> {
    store: &'s SourceStore,
    batch_size: usize,
    after: i64,
    done: bool,
    _row: PhantomData<R>,
}

impl<'s, R: SourceRow> BatchExtractor<'s, R> {
    pub fn new(store: &'s SourceStore, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            after: i64::MIN,
            done: false,
            _row: PhantomData,
        }
    }
}

impl<R: SourceRow> Iterator for BatchExtractor<'_, R> {
    type Item = EtlResult<Vec<R>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let page = match R::fetch_page(self.store, self.after, self.batch_size) {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        let Some(last) = page.last() else {
            self.done = true;
            return None;
        };
        self.after = last.key();
        if page.len() < self.batch_size {
            self.done = true;
        }
        log::debug!("extract {}: {} rows up to key {}", R::TABLE, page.len(), self.after);
        Some(Ok(page))
    }
}
