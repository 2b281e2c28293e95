use std::sync::Arc;

use super::error::{ExecError, ExecResult};
use super::OpIterator;
use crate::storage::BufferPool;
use crate::tuple::{Field, Tuple, TupleDesc, Type};
use crate::txn::TransactionId;

/// Deletes every tuple its child produces (located by record id) through
/// the buffer pool, then yields a single one-column count tuple.
pub struct Delete {
    pool: Arc<BufferPool>,
    tid: TransactionId,
    child: Box<dyn OpIterator>,
    desc: TupleDesc,
    count: Option<i32>,
    emitted: bool,
    opened: bool,
}

impl Delete {
    pub fn new(pool: Arc<BufferPool>, tid: TransactionId, child: Box<dyn OpIterator>) -> Self {
        Self {
            pool,
            tid,
            child,
            desc: TupleDesc::of_types(&[Type::Int]),
            count: None,
            emitted: false,
            opened: false,
        }
    }
}

impl OpIterator for Delete {
    fn open(&mut self) -> ExecResult<()> {
        self.child.open()?;
        self.opened = true;
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<Tuple>> {
        if !self.opened {
            return Err(ExecError::NotOpen);
        }
        if self.emitted {
            return Ok(None);
        }
        let count = match self.count {
            Some(count) => count,
            None => {
                let mut count = 0;
                while let Some(tuple) = self.child.next()? {
                    self.pool.delete_tuple(self.tid, &tuple)?;
                    count += 1;
                }
                self.count = Some(count);
                count
            }
        };
        self.emitted = true;
        Ok(Some(Tuple::new(self.desc.clone(), vec![Field::Int(count)])?))
    }

    fn rewind(&mut self) -> ExecResult<()> {
        if !self.opened {
            return Err(ExecError::NotOpen);
        }
        self.emitted = false;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.opened = false;
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }
}
