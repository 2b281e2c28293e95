use super::error::{ExecError, ExecResult};
use super::OpIterator;
use crate::tuple::{TdItem, Tuple, TupleDesc, Type};

/// Emits, for each child tuple, a narrower tuple holding the chosen
/// subfields in the given order
pub struct Project {
    child: Box<dyn OpIterator>,
    fields: Vec<usize>,
    desc: TupleDesc,
    opened: bool,
}

impl Project {
    /// `fields` are indexes into the child's tuples; `types` must match
    /// the child's column types at those indexes.
    pub fn new(child: Box<dyn OpIterator>, fields: Vec<usize>, types: Vec<Type>) -> ExecResult<Self> {
        let child_desc = child.tuple_desc();
        let mut items = Vec::with_capacity(fields.len());
        for (&idx, &ty) in fields.iter().zip(&types) {
            let actual = child_desc.field_type(idx)?;
            if actual != ty {
                return Err(ExecError::SchemaMismatch {
                    child: actual.to_string(),
                    table: ty.to_string(),
                });
            }
            let name = child_desc.field_name(idx)?.map(|n| n.to_string());
            items.push(TdItem::new(ty, name));
        }
        Ok(Self {
            child,
            fields,
            desc: TupleDesc::new(items),
            opened: false,
        })
    }
}

impl OpIterator for Project {
    fn open(&mut self) -> ExecResult<()> {
        self.child.open()?;
        self.opened = true;
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<Tuple>> {
        if !self.opened {
            return Err(ExecError::NotOpen);
        }
        match self.child.next()? {
            Some(tuple) => {
                let mut fields = Vec::with_capacity(self.fields.len());
                for &idx in &self.fields {
                    fields.push(tuple.field(idx)?.clone());
                }
                Ok(Some(Tuple::new(self.desc.clone(), fields)?))
            }
            None => Ok(None),
        }
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
        &self.desc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::test_util::ListScan;
    use crate::tuple::Field;

    #[test]
    fn test_project_narrows_and_reorders() {
        let child = Box::new(ListScan::of_int_pairs(&[(1, 10), (2, 20)]));
        let mut project = Project::new(child, vec![1, 0], vec![Type::Int, Type::Int]).unwrap();
        project.open().unwrap();

        let t = project.next().unwrap().unwrap();
        assert_eq!(t.fields(), &[Field::Int(10), Field::Int(1)]);
        let t = project.next().unwrap().unwrap();
        assert_eq!(t.fields(), &[Field::Int(20), Field::Int(2)]);
        assert!(project.next().unwrap().is_none());
        project.close();
    }

    #[test]
    fn test_project_desc() {
        let child = Box::new(ListScan::of_int_pairs(&[(1, 10)]));
        let project = Project::new(child, vec![0], vec![Type::Int]).unwrap();
        assert_eq!(project.tuple_desc(), &TupleDesc::of_types(&[Type::Int]));
    }

    #[test]
    fn test_project_type_mismatch() {
        let child = Box::new(ListScan::of_ints(&[1]));
        assert!(Project::new(child, vec![0], vec![Type::Text]).is_err());
    }

    #[test]
    fn test_project_bad_index() {
        let child = Box::new(ListScan::of_ints(&[1]));
        assert!(Project::new(child, vec![5], vec![Type::Int]).is_err());
    }

    #[test]
    fn test_project_rewind() {
        let child = Box::new(ListScan::of_ints(&[1, 2]));
        let mut project = Project::new(child, vec![0], vec![Type::Int]).unwrap();
        project.open().unwrap();
        assert!(project.next().unwrap().is_some());
        project.rewind().unwrap();
        let t = project.next().unwrap().unwrap();
        assert_eq!(t.fields(), &[Field::Int(1)]);
    }
}
