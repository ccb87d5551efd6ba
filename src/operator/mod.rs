//! Physical operators that make up a candidate path.

use std::fmt::{Display, Formatter};

use enum_as_inner::EnumAsInner;

mod join;
pub use join::*;
mod table_scan;
pub use table_scan::*;

#[derive(Clone, Debug, Hash, Eq, PartialEq, EnumAsInner)]
pub enum Operator {
    Scan(TableScan),
    Join(Join),
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Operator::Scan(scan) => write!(f, "{}({})", scan.method(), scan.table_name()),
            Operator::Join(join) => write!(f, "{}", join.strategy()),
        }
    }
}
