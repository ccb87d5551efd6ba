use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::relset::RelId;

#[derive(
    Clone,
    Copy,
    Debug,
    Hash,
    Eq,
    PartialEq,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum ScanMethod {
    SeqScan,
    IndexScan,
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct TableScan {
    relation: RelId,
    table_name: String,
    method: ScanMethod,
}

impl TableScan {
    pub fn new<S: Into<String>>(relation: RelId, table_name: S, method: ScanMethod) -> Self {
        Self {
            relation,
            table_name: table_name.into(),
            method,
        }
    }

    pub fn relation(&self) -> RelId {
        self.relation
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn method(&self) -> ScanMethod {
        self.method
    }
}
