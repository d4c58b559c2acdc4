mod insert;
mod tree;

use std::collections::BTreeSet;

use crate::error::CompileError;
use crate::expand::Expanded;

pub use tree::{Node, NodeId, Plan};

#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Test-name prefixes; empty selects everything. A prefix matches the
    /// API name or any of its groups.
    pub test_filters: Vec<String>,
}

/// Build the execution tree: every selected, insertable Concrete API is
/// inserted at each location whose accumulated produces newly satisfy its
/// dependencies; producers are pulled in on demand.
pub fn build_plan(
    expanded: Expanded,
    predefined: &BTreeSet<String>,
    options: &PlanOptions,
) -> Result<Plan, CompileError> {
    let mut builder = insert::Builder::new(expanded, predefined.clone());
    builder.validate_corpus();

    let selected: Vec<usize> = (0..builder.api_count())
        .filter(|&idx| {
            let api = builder.api(idx);
            options.test_filters.is_empty()
                || options.test_filters.iter().any(|prefix| {
                    api.name.starts_with(prefix.as_str())
                        || api.groups.iter().any(|g| g.starts_with(prefix.as_str()))
                })
        })
        .collect();

    let root = builder.root();
    for idx in selected {
        builder.insert(idx, root);
    }

    builder.finish()
}
