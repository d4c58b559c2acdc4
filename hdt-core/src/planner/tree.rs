use std::collections::{BTreeMap, BTreeSet};

use crate::expand::ConcreteApi;

pub type NodeId = usize;

/// One position in the execution tree. Nodes live in the plan's arena;
/// parent/child links are indices.
#[derive(Debug, Clone)]
pub struct Node {
    /// Stable dotted identifier (`0.2.1`) used in logs and reports.
    pub id: String,
    /// Index into the plan's API corpus; `None` only for the root.
    pub api: Option<usize>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Names produced on the path from the root through this node, minus
    /// upstream deletions.
    pub produces: BTreeSet<String>,
    /// Names produced anywhere in the subtree rooted here.
    pub subtree_produces: BTreeSet<String>,
    /// Getter→destructor cleanup subtree, run before this node's API with
    /// failures ignored.
    pub pre_run: Option<NodeId>,
    /// Destructor subtree, run after this node's entire subtree.
    pub post_run: Option<NodeId>,
    /// True for pre/post satellites; they never join sibling
    /// subtree-produces.
    pub satellite: bool,
    /// Transient re-entrancy guard used while the tree is built.
    pub(crate) inserting: BTreeSet<String>,
}

impl Node {
    pub(crate) fn new(id: String, api: Option<usize>, parent: Option<NodeId>) -> Self {
        Self {
            id,
            api,
            parent,
            children: Vec::new(),
            produces: BTreeSet::new(),
            subtree_produces: BTreeSet::new(),
            pre_run: None,
            post_run: None,
            satellite: false,
            inserting: BTreeSet::new(),
        }
    }
}

/// The compiled execution plan: the API corpus plus the tree over it.
#[derive(Debug)]
pub struct Plan {
    pub apis: Vec<ConcreteApi>,
    pub nodes: Vec<Node>,
    pub root: NodeId,
    by_name: BTreeMap<String, usize>,
}

impl Plan {
    pub(crate) fn new(apis: Vec<ConcreteApi>, nodes: Vec<Node>, root: NodeId) -> Self {
        let by_name = apis
            .iter()
            .enumerate()
            .map(|(i, api)| (api.name.clone(), i))
            .collect();
        Self {
            apis,
            nodes,
            root,
            by_name,
        }
    }

    pub fn api_of(&self, node: NodeId) -> Option<&ConcreteApi> {
        self.nodes[node].api.map(|i| &self.apis[i])
    }

    pub fn api_by_name(&self, name: &str) -> Option<&ConcreteApi> {
        self.by_name.get(name).map(|&i| &self.apis[i])
    }

    /// Ancestors from the parent up to the root.
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes[node].parent, move |&n| self.nodes[n].parent)
    }

    /// Deterministic printout for CI diffing: one `id: name` line per node,
    /// satellites marked.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_node(self.root, 0, "", &mut out);
        out
    }

    fn render_node(&self, node: NodeId, depth: usize, label: &str, out: &mut String) {
        let n = &self.nodes[node];
        let name = self
            .api_of(node)
            .map(|api| api.name.as_str())
            .unwrap_or("<root>");
        for _ in 0..depth {
            out.push_str("  ");
        }
        if !label.is_empty() {
            out.push_str(label);
            out.push(' ');
        }
        out.push_str(&n.id);
        out.push_str(": ");
        out.push_str(name);
        out.push('\n');
        if let Some(pre) = n.pre_run {
            self.render_node(pre, depth + 1, "pre", out);
        }
        for &child in &n.children {
            self.render_node(child, depth + 1, "", out);
        }
        if let Some(post) = n.post_run {
            self.render_node(post, depth + 1, "post", out);
        }
    }
}
