use super::error::ExecResult;
use crate::tuple::{Field, Op, Tuple};

/// Compares one field of a tuple against a constant
#[derive(Debug, Clone)]
pub struct Predicate {
    field: usize,
    op: Op,
    operand: Field,
}

impl Predicate {
    pub fn new(field: usize, op: Op, operand: Field) -> Self {
        Self { field, op, operand }
    }

    pub fn field(&self) -> usize {
        self.field
    }

    pub fn op(&self) -> Op {
        self.op
    }

    pub fn operand(&self) -> &Field {
        &self.operand
    }

    /// Does the tuple satisfy `tuple[field] op operand`?
    pub fn filter(&self, tuple: &Tuple) -> ExecResult<bool> {
        Ok(tuple.field(self.field)?.compare(self.op, &self.operand)?)
    }
}

/// Compares a field of one tuple against a field of another; drives the
/// nested-loop join
#[derive(Debug, Clone)]
pub struct JoinPredicate {
    left_field: usize,
    op: Op,
    right_field: usize,
}

impl JoinPredicate {
    pub fn new(left_field: usize, op: Op, right_field: usize) -> Self {
        Self {
            left_field,
            op,
            right_field,
        }
    }

    pub fn filter(&self, left: &Tuple, right: &Tuple) -> ExecResult<bool> {
        Ok(left
            .field(self.left_field)?
            .compare(self.op, right.field(self.right_field)?)?)
    }
}
