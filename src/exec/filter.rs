use super::error::{ExecError, ExecResult};
use super::predicate::Predicate;
use super::OpIterator;
use crate::tuple::{Tuple, TupleDesc};

/// Passes through only the child tuples that satisfy the predicate
pub struct Filter {
    predicate: Predicate,
    child: Box<dyn OpIterator>,
    opened: bool,
}

impl Filter {
    pub fn new(predicate: Predicate, child: Box<dyn OpIterator>) -> Self {
        Self {
            predicate,
            child,
            opened: false,
        }
    }
}

impl OpIterator for Filter {
    fn open(&mut self) -> ExecResult<()> {
        self.child.open()?;
        self.opened = true;
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<Tuple>> {
        if !self.opened {
            return Err(ExecError::NotOpen);
        }
        while let Some(tuple) = self.child.next()? {
            if self.predicate.filter(&tuple)? {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }

    fn rewind(&mut self) -> ExecResult<()> {
        if !self.opened {
            return Err(ExecError::NotOpen);
        }
        self.child.rewind()
    }

    fn close(&mut self) {
        self.child.close();
        self.opened = false;
    }

    fn tuple_desc(&self) -> &TupleDesc {
        self.child.tuple_desc()
    }
}
