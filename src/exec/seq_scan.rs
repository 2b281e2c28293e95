use std::sync::Arc;

use super::error::{ExecError, ExecResult};
use super::OpIterator;
use crate::storage::{BufferPool, HeapFileIterator};
use crate::tuple::{Tuple, TupleDesc};
use crate::txn::TransactionId;

/// Sequential scan over one table. Column names in the exposed
/// descriptor are prefixed with the scan's alias (`alias.column`).
pub struct SeqScan {
    pool: Arc<BufferPool>,
    tid: TransactionId,
    table_id: i32,
    desc: TupleDesc,
    iter: Option<HeapFileIterator>,
}

impl SeqScan {
    pub fn new(
        pool: Arc<BufferPool>,
        tid: TransactionId,
        table_id: i32,
        alias: &str,
    ) -> ExecResult<Self> {
        let desc = pool.catalog().tuple_desc(table_id)?.with_alias(alias);
        Ok(Self {
            pool,
            tid,
            table_id,
            desc,
            iter: None,
        })
    }
}

impl OpIterator for SeqScan {
    fn open(&mut self) -> ExecResult<()> {
        let file = self.pool.catalog().table_file(self.table_id)?;
        let mut iter = file.iter(Arc::clone(&self.pool), self.tid);
        iter.open();
        self.iter = Some(iter);
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<Tuple>> {
        let iter = self.iter.as_mut().ok_or(ExecError::NotOpen)?;
        Ok(iter.next()?)
    }

    fn rewind(&mut self) -> ExecResult<()> {
        let iter = self.iter.as_mut().ok_or(ExecError::NotOpen)?;
        iter.rewind();
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut iter) = self.iter.take() {
            iter.close();
        }
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }
}
