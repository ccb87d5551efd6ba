//! Human readable rendering of a compiled plan.

use std::fmt::Write;
use std::sync::Arc;

use prettytable::format;

use crate::plan::{Path, Plan};

/// Compact one-line shape, e.g. `HashJoin(SeqScan(a), SeqScan(b))`.
pub fn shape(path: &Path) -> String {
    match (path.outer(), path.inner()) {
        (Some(outer), Some(inner)) => {
            format!("{}({}, {})", path.operator(), shape(outer), shape(inner))
        }
        _ => path.operator().to_string(),
    }
}

fn write_tree(out: &mut String, path: &Path, depth: usize) {
    let cost = path.cost();
    let _ = writeln!(
        out,
        "{:indent$}{} relids={} rows={:.0} cost={:.2}..{:.2}",
        "",
        path.operator(),
        path.relids(),
        path.rows(),
        cost.startup,
        cost.total,
        indent = depth * 2
    );
    for input in path.inputs() {
        write_tree(out, input, depth + 1);
    }
}

impl Plan {
    /// Join tree of the selected path followed by the final candidate table.
    pub fn explain(&self) -> String {
        let root = self.root();
        let mut out = String::new();
        write_tree(&mut out, &root, 0);
        let _ = writeln!(out, "score: {}", self.score());

        let mut table = table!(["#", "shape", "startup", "total", "rows", ""]);
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        for (i, candidate) in self.candidates().iter().enumerate() {
            let selected = if Arc::ptr_eq(candidate, &root) { "*" } else { "" };
            table.add_row(row![
                i,
                shape(candidate),
                r->format!("{:.2}", candidate.cost().startup),
                r->format!("{:.2}", candidate.cost().total),
                r->format!("{:.0}", candidate.rows()),
                selected
            ]);
        }
        out.push_str(&table.to_string());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::{Cost, Estimate, JoinChoice, ScanChoice};
    use crate::objective::ObjectiveScore;
    use crate::operator::{JoinStrategy, ScanMethod};
    use crate::plan::PathBuilder;
    use crate::query::BaseRelation;
    use crate::relset::RelSet;

    #[test]
    fn test_explain() {
        let leaf = |id: usize, name: &str| {
            PathBuilder::new(RelSet::singleton(id)).scan(
                &BaseRelation::new(id, name),
                &ScanChoice {
                    method: ScanMethod::SeqScan,
                    estimate: Estimate::new(Cost::from(10.0), 100.0),
                    ordering: None,
                },
            )
        };
        let (a, b) = (leaf(0, "a"), leaf(1, "b"));
        let mut builder = PathBuilder::new(RelSet::full(2));
        let hash = builder.join(
            &JoinChoice::unordered(JoinStrategy::HashJoin),
            &a,
            &b,
            Estimate::new(Cost::new(12.0, 30.0), 50.0),
        );
        let nested = builder.join(
            &JoinChoice::unordered(JoinStrategy::NestedLoop),
            &b,
            &a,
            Estimate::new(Cost::new(0.0, 80.0), 50.0),
        );
        assert_eq!(shape(&hash), "HashJoin(SeqScan(a), SeqScan(b))");

        let plan = Plan::new(hash.clone(), ObjectiveScore::from(0.5), vec![hash, nested]);
        let text = plan.explain();
        assert!(text.starts_with("HashJoin relids={0,1} rows=50 cost=12.00..30.00\n"));
        assert!(text.contains("\n  SeqScan(a) relids={0}"));
        assert!(text.contains("score: 0.5"));
        assert!(text.contains("NestedLoop(SeqScan(b), SeqScan(a))"));
    }
}
