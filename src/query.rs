use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::relset::{RelId, RelSet};

/// A base table taking part in a join.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct BaseRelation {
    id: RelId,
    name: String,
}

impl BaseRelation {
    pub fn new<S: Into<String>>(id: RelId, name: S) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn id(&self) -> RelId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The join block handed to the optimizer: a list of base relations whose ids are their
/// positions in the list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinQuery {
    relations: Vec<BaseRelation>,
}

impl JoinQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_relation<S: Into<String>>(&mut self, name: S) -> RelId {
        let id = self.relations.len();
        self.relations.push(BaseRelation::new(id, name));
        id
    }

    pub fn with_relation<S: Into<String>>(mut self, name: S) -> Self {
        self.add_relation(name);
        self
    }

    pub fn relations(&self) -> &[BaseRelation] {
        &self.relations
    }

    pub fn relation(&self, id: RelId) -> Option<&BaseRelation> {
        self.relations.get(id)
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    pub fn all_relids(&self) -> RelSet {
        RelSet::full(self.relations.len())
    }

    /// Comma separated relation names, used in diagnostics.
    pub fn describe(&self, relids: RelSet) -> String {
        relids
            .iter()
            .map(|id| {
                self.relation(id)
                    .map(|r| r.name().to_string())
                    .unwrap_or_else(|| format!("#{}", id))
            })
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_ids_are_dense() {
        let query = JoinQuery::new()
            .with_relation("users")
            .with_relation("orders")
            .with_relation("items");

        assert_eq!(query.len(), 3);
        assert_eq!(query.relation(1).map(|r| r.name()), Some("orders"));
        assert_eq!(query.all_relids(), RelSet::full(3));
        assert_eq!(query.describe(RelSet::from_ids([0, 2])), "users,items");
        assert_eq!(query.describe(RelSet::singleton(7)), "#7");
    }
}
