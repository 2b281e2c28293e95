use std::sync::Arc;

use super::error::{ExecError, ExecResult};
use super::OpIterator;
use crate::storage::BufferPool;
use crate::tuple::{Field, Tuple, TupleDesc, Type};
use crate::txn::TransactionId;

/// Drains its child into a table through the buffer pool (so locking and
/// dirty-page tracking apply) and yields a single one-column tuple with
/// the number of rows inserted.
pub struct Insert {
    pool: Arc<BufferPool>,
    tid: TransactionId,
    child: Box<dyn OpIterator>,
    table_id: i32,
    desc: TupleDesc,
    count: Option<i32>,
    emitted: bool,
    opened: bool,
}

impl Insert {
    pub fn new(
        pool: Arc<BufferPool>,
        tid: TransactionId,
        child: Box<dyn OpIterator>,
        table_id: i32,
    ) -> ExecResult<Self> {
        let table_desc = pool.catalog().tuple_desc(table_id)?;
        if child.tuple_desc() != &table_desc {
            return Err(ExecError::SchemaMismatch {
                child: child.tuple_desc().to_string(),
                table: table_desc.to_string(),
            });
        }
        Ok(Self {
            pool,
            tid,
            child,
            table_id,
            desc: TupleDesc::of_types(&[Type::Int]),
            count: None,
            emitted: false,
            opened: false,
        })
    }
}

impl OpIterator for Insert {
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
                    self.pool.insert_tuple(self.tid, self.table_id, &tuple)?;
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
        // re-emit the count; the side effect is not repeated
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
