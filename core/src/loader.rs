//! Loader: bulk-writes clean batches and reports progress.
//!
//! Each batch is committed on its own. A failure later in the run leaves
//! earlier batches in place; the next run starts by clearing both tables.

use crate::{
    error::EtlResult,
    records::{CleanLoan, CleanMember},
    run_control::RunController,
    store::AnalyticsStore,
    types::TableName,
};

/// A clean row type the analytics store can bulk-insert.
pub trait Loadable: Sized {
    const TABLE: TableName;

    fn insert_batch(store: &AnalyticsStore, batch: &[Self]) -> EtlResult<usize>;
}

impl Loadable for CleanMember {
    const TABLE: TableName = TableName::MembersClean;

    fn insert_batch(store: &AnalyticsStore, batch: &[Self]) -> EtlResult<usize> {
        store.insert_members(batch)
    }
}

impl Loadable for CleanLoan {
    const TABLE: TableName = TableName::LoansClean;

    fn insert_batch(store: &AnalyticsStore, batch: &[Self]) -> EtlResult<usize> {
        store.insert_loans(batch)
    }
}

pub struct Loader<'a> {
    store: &'a AnalyticsStore,
    progress: &'a RunController,
}

impl<'a> Loader<'a> {
    pub fn new(store: &'a AnalyticsStore, progress: &'a RunController) -> Self {
        Self { store, progress }
    }

    /// Clear the destination tables before the first batch of a run.
    pub fn prepare(&self) -> EtlResult<()> {
        self.store.clear()
    }

    /// Write one batch and bump the matching counter on the run status.
    pub fn load<T: Loadable>(&self, batch: &[T]) -> EtlResult<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let written = T::insert_batch(self.store, batch)?;
        self.progress.record_loaded(T::TABLE, written);
        Ok(written)
    }
}
