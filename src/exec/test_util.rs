use super::error::{ExecError, ExecResult};
use super::OpIterator;
use crate::tuple::{Field, Tuple, TupleDesc, Type};

/// In-memory operator over a fixed tuple list, for wiring operator tests
/// without a table underneath
pub struct ListScan {
    desc: TupleDesc,
    tuples: Vec<Tuple>,
    cursor: usize,
    opened: bool,
}

impl ListScan {
    pub fn new(desc: TupleDesc, tuples: Vec<Tuple>) -> Self {
        Self {
            desc,
            tuples,
            cursor: 0,
            opened: false,
        }
    }

    pub fn of_ints(values: &[i32]) -> Self {
        let desc = TupleDesc::of_types(&[Type::Int]);
        let tuples = values
            .iter()
            .map(|&v| Tuple::new(desc.clone(), vec![Field::Int(v)]).unwrap())
            .collect();
        Self::new(desc, tuples)
    }

    /// One tuple per row, each row a (key, value) int pair
    pub fn of_int_pairs(rows: &[(i32, i32)]) -> Self {
        let desc = TupleDesc::of_types(&[Type::Int, Type::Int]);
        let tuples = rows
            .iter()
            .map(|&(k, v)| Tuple::new(desc.clone(), vec![Field::Int(k), Field::Int(v)]).unwrap())
            .collect();
        Self::new(desc, tuples)
    }
}

impl OpIterator for ListScan {
    fn open(&mut self) -> ExecResult<()> {
        self.opened = true;
        self.cursor = 0;
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<Tuple>> {
        if !self.opened {
            return Err(ExecError::NotOpen);
        }
        if self.cursor >= self.tuples.len() {
            return Ok(None);
        }
        let tuple = self.tuples[self.cursor].clone();
        self.cursor += 1;
        Ok(Some(tuple))
    }

    fn rewind(&mut self) -> ExecResult<()> {
        if !self.opened {
            return Err(ExecError::NotOpen);
        }
        self.cursor = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }
}
