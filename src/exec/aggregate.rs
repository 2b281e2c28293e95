use std::collections::HashMap;
use std::fmt;

use super::error::{ExecError, ExecResult};
use super::OpIterator;
use crate::tuple::{Field, TdItem, Tuple, TupleDesc, Type};

/// Aggregation operator kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl fmt::Display for AggOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggOp::Min => "min",
            AggOp::Max => "max",
            AggOp::Sum => "sum",
            AggOp::Avg => "avg",
            AggOp::Count => "count",
        };
        write!(f, "{}", s)
    }
}

/// Running state for one group: enough to materialize any of the five
/// operators in a single pass. Sums are kept in i64 so SUM and AVG do not
/// overflow mid-stream; SUM wraps to i32 two's complement on emit.
#[derive(Debug, Clone, Copy)]
struct GroupState {
    count: i64,
    sum: i64,
    min: i32,
    max: i32,
}

impl GroupState {
    fn new() -> Self {
        Self {
            count: 0,
            sum: 0,
            min: i32::MAX,
            max: i32::MIN,
        }
    }

    fn merge(&mut self, v: i32) {
        self.count += 1;
        self.sum += v as i64;
        self.min = self.min.min(v);
        self.max = self.max.max(v);
    }

    fn materialize(&self, op: AggOp) -> i32 {
        match op {
            AggOp::Min => self.min,
            AggOp::Max => self.max,
            AggOp::Sum => self.sum as i32,
            AggOp::Avg => (self.sum / self.count) as i32,
            AggOp::Count => self.count as i32,
        }
    }
}

/// Computes one aggregate over an integer column, optionally grouped by
/// another column. `group` is the group-by field index, or `None` for a
/// single ungrouped result.
pub struct IntAggregator {
    group: Option<usize>,
    field: usize,
    op: AggOp,
    groups: HashMap<Option<Field>, GroupState>,
    desc: TupleDesc,
}

impl IntAggregator {
    pub fn new(group: Option<usize>, group_type: Option<Type>, field: usize, op: AggOp) -> Self {
        Self {
            group,
            field,
            op,
            groups: HashMap::new(),
            desc: result_desc(group_type),
        }
    }

    /// Fold one tuple into its group's running state
    pub fn merge(&mut self, tuple: &Tuple) -> ExecResult<()> {
        let value = match tuple.field(self.field)? {
            Field::Int(v) => *v,
            other => {
                return Err(ExecError::IllegalAggregate {
                    op: self.op.to_string(),
                    ty: other.field_type().to_string(),
                })
            }
        };
        let key = match self.group {
            Some(g) => Some(tuple.field(g)?.clone()),
            None => None,
        };
        self.groups.entry(key).or_insert_with(GroupState::new).merge(value);
        Ok(())
    }

    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }

    /// Materialize one result tuple per group. Ungrouped aggregation over
    /// zero input rows yields a single zero COUNT/SUM (extrema have no
    /// meaningful value and are not emitted).
    pub fn results(&self) -> ExecResult<Vec<Tuple>> {
        if self.group.is_none() && self.groups.is_empty() {
            return match self.op {
                AggOp::Count | AggOp::Sum => {
                    Ok(vec![Tuple::new(self.desc.clone(), vec![Field::Int(0)])?])
                }
                _ => Ok(Vec::new()),
            };
        }
        let mut out = Vec::with_capacity(self.groups.len());
        for (key, state) in &self.groups {
            let agg = Field::Int(state.materialize(self.op));
            let fields = match key {
                Some(group) => vec![group.clone(), agg],
                None => vec![agg],
            };
            out.push(Tuple::new(self.desc.clone(), fields)?);
        }
        Ok(out)
    }
}

/// Aggregation over a text column only supports COUNT; anything else is
/// rejected at construction.
pub struct TextAggregator {
    group: Option<usize>,
    field: usize,
    op: AggOp,
    counts: HashMap<Option<Field>, i64>,
    desc: TupleDesc,
}

impl TextAggregator {
    pub fn new(
        group: Option<usize>,
        group_type: Option<Type>,
        field: usize,
        op: AggOp,
    ) -> ExecResult<Self> {
        if op != AggOp::Count {
            return Err(ExecError::IllegalAggregate {
                op: op.to_string(),
                ty: Type::Text.to_string(),
            });
        }
        Ok(Self {
            group,
            field,
            op,
            counts: HashMap::new(),
            desc: result_desc(group_type),
        })
    }

    pub fn merge(&mut self, tuple: &Tuple) -> ExecResult<()> {
        if !matches!(tuple.field(self.field)?, Field::Text(_)) {
            return Err(ExecError::IllegalAggregate {
                op: self.op.to_string(),
                ty: tuple.field(self.field)?.field_type().to_string(),
            });
        }
        let key = match self.group {
            Some(g) => Some(tuple.field(g)?.clone()),
            None => None,
        };
        *self.counts.entry(key).or_insert(0) += 1;
        Ok(())
    }

    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }

    pub fn results(&self) -> ExecResult<Vec<Tuple>> {
        if self.group.is_none() && self.counts.is_empty() {
            return Ok(vec![Tuple::new(self.desc.clone(), vec![Field::Int(0)])?]);
        }
        let mut out = Vec::with_capacity(self.counts.len());
        for (key, count) in &self.counts {
            let agg = Field::Int(*count as i32);
            let fields = match key {
                Some(group) => vec![group.clone(), agg],
                None => vec![agg],
            };
            out.push(Tuple::new(self.desc.clone(), fields)?);
        }
        Ok(out)
    }
}

/// Grouped results are (group, INT); ungrouped results are a lone INT
fn result_desc(group_type: Option<Type>) -> TupleDesc {
    match group_type {
        Some(ty) => TupleDesc::new(vec![
            TdItem::new(ty, None),
            TdItem::new(Type::Int, None),
        ]),
        None => TupleDesc::of_types(&[Type::Int]),
    }
}

enum AnyAggregator {
    Int(IntAggregator),
    Text(TextAggregator),
}

/// Pull operator wrapping the aggregators: drains its child on open,
/// then streams the materialized per-group results. Group order is a
/// hash-map artifact and deliberately unspecified.
pub struct Aggregate {
    child: Box<dyn OpIterator>,
    field: usize,
    group: Option<usize>,
    op: AggOp,
    desc: TupleDesc,
    results: Option<Vec<Tuple>>,
    cursor: usize,
}

impl Aggregate {
    pub fn new(
        child: Box<dyn OpIterator>,
        field: usize,
        group: Option<usize>,
        op: AggOp,
    ) -> ExecResult<Self> {
        let child_desc = child.tuple_desc();
        // both field indexes are validated up front so a bad plan fails
        // before any tuples move
        child_desc.field_type(field)?;
        let group_type = match group {
            Some(g) => Some(child_desc.field_type(g)?),
            None => None,
        };
        let desc = result_desc(group_type);
        Ok(Self {
            child,
            field,
            group,
            op,
            desc,
            results: None,
            cursor: 0,
        })
    }

    fn build_aggregator(&self) -> ExecResult<AnyAggregator> {
        let child_desc = self.child.tuple_desc();
        let group_type = match self.group {
            Some(g) => Some(child_desc.field_type(g)?),
            None => None,
        };
        match child_desc.field_type(self.field)? {
            Type::Int => Ok(AnyAggregator::Int(IntAggregator::new(
                self.group, group_type, self.field, self.op,
            ))),
            Type::Text => Ok(AnyAggregator::Text(TextAggregator::new(
                self.group, group_type, self.field, self.op,
            )?)),
        }
    }
}

impl OpIterator for Aggregate {
    fn open(&mut self) -> ExecResult<()> {
        self.child.open()?;
        let mut agg = self.build_aggregator()?;
        while let Some(tuple) = self.child.next()? {
            match &mut agg {
                AnyAggregator::Int(a) => a.merge(&tuple)?,
                AnyAggregator::Text(a) => a.merge(&tuple)?,
            }
        }
        self.results = Some(match &agg {
            AnyAggregator::Int(a) => a.results()?,
            AnyAggregator::Text(a) => a.results()?,
        });
        self.cursor = 0;
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<Tuple>> {
        let results = self.results.as_ref().ok_or(ExecError::NotOpen)?;
        if self.cursor >= results.len() {
            return Ok(None);
        }
        let tuple = results[self.cursor].clone();
        self.cursor += 1;
        Ok(Some(tuple))
    }

    fn rewind(&mut self) -> ExecResult<()> {
        if self.results.is_none() {
            return Err(ExecError::NotOpen);
        }
        self.cursor = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.results = None;
        self.cursor = 0;
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }
}
