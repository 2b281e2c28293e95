mod desc;
mod error;
mod field;
#[allow(clippy::module_inception)]
mod tuple;

pub use desc::{TdItem, TupleDesc};
pub use error::{TupleError, TupleResult};
pub use field::{Field, Op, Type, MAX_TEXT_LEN};
pub use tuple::{RecordId, Tuple};
