use super::error::{ExecError, ExecResult};
use super::predicate::JoinPredicate;
use super::OpIterator;
use crate::tuple::{Tuple, TupleDesc};

/// Nested-loop join: for every left tuple the right child is streamed
/// (and rewound), and each pair satisfying the predicate is emitted as
/// the concatenation of the two tuples.
pub struct Join {
    predicate: JoinPredicate,
    left: Box<dyn OpIterator>,
    right: Box<dyn OpIterator>,
    desc: TupleDesc,
    current_left: Option<Tuple>,
    opened: bool,
}

impl Join {
    pub fn new(
        predicate: JoinPredicate,
        left: Box<dyn OpIterator>,
        right: Box<dyn OpIterator>,
    ) -> Self {
        let desc = TupleDesc::merge(left.tuple_desc(), right.tuple_desc());
        Self {
            predicate,
            left,
            right,
            desc,
            current_left: None,
            opened: false,
        }
    }

    fn combine(&self, left: &Tuple, right: &Tuple) -> ExecResult<Tuple> {
        let mut fields = Vec::with_capacity(self.desc.num_fields());
        fields.extend(left.fields().iter().cloned());
        fields.extend(right.fields().iter().cloned());
        Ok(Tuple::new(self.desc.clone(), fields)?)
    }
}

impl OpIterator for Join {
    fn open(&mut self) -> ExecResult<()> {
        self.left.open()?;
        self.right.open()?;
        self.current_left = None;
        self.opened = true;
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<Tuple>> {
        if !self.opened {
            return Err(ExecError::NotOpen);
        }
        loop {
            let left = match &self.current_left {
                Some(tuple) => tuple.clone(),
                None => match self.left.next()? {
                    Some(tuple) => {
                        self.current_left = Some(tuple.clone());
                        tuple
                    }
                    None => return Ok(None),
                },
            };
            while let Some(right) = self.right.next()? {
                if self.predicate.filter(&left, &right)? {
                    return Ok(Some(self.combine(&left, &right)?));
                }
            }
            // right child exhausted for this left tuple: restart it and
            // advance the outer side
            self.current_left = None;
            self.right.rewind()?;
        }
    }

    fn rewind(&mut self) -> ExecResult<()> {
        if !self.opened {
            return Err(ExecError::NotOpen);
        }
        self.left.rewind()?;
        self.right.rewind()?;
        self.current_left = None;
        Ok(())
    }

    fn close(&mut self) {
        self.left.close();
        self.right.close();
        self.current_left = None;
        self.opened = false;
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }
}
