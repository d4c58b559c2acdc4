use std::collections::{BTreeMap, BTreeSet};

use crate::error::Violation;
use crate::expand::{ConcreteApi, Expanded};

use super::tree::{Node, NodeId, Plan};

pub(crate) struct Builder {
    apis: Vec<ConcreteApi>,
    referenced: BTreeSet<String>,
    predefined: BTreeSet<String>,
    /// Variable name → corpus indices of its producers, in corpus order.
    producers: BTreeMap<String, Vec<usize>>,
    nodes: Vec<Node>,
    root: NodeId,
    errors: Vec<Violation>,
}

impl Builder {
    pub(crate) fn new(expanded: Expanded, predefined: BTreeSet<String>) -> Self {
        let Expanded { apis, referenced } = expanded;
        let mut producers: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, api) in apis.iter().enumerate() {
            for name in &api.produces {
                producers.entry(name.clone()).or_default().push(idx);
            }
        }
        let root = Node::new("0".to_string(), None, None);
        Self {
            apis,
            referenced,
            predefined,
            producers,
            nodes: vec![root],
            root: 0,
            errors: Vec::new(),
        }
    }

    pub(crate) fn root(&self) -> NodeId {
        self.root
    }

    pub(crate) fn api(&self, idx: usize) -> &ConcreteApi {
        &self.apis[idx]
    }

    pub(crate) fn api_count(&self) -> usize {
        self.apis.len()
    }

    /// Corpus-level invariants, checked before any insertion: peer and hook
    /// references must resolve, and deletions must target names the API can
    /// actually see.
    pub(crate) fn validate_corpus(&mut self) {
        let names: BTreeSet<&str> = self.apis.iter().map(|a| a.name.as_str()).collect();
        let mut errors = Vec::new();
        for api in &self.apis {
            for reference in api.hooks.api_refs() {
                if !names.contains(reference) {
                    errors.push(Violation::new(
                        &api.name,
                        format!("hook references unknown API {reference}"),
                    ));
                }
            }
            if let Some(var_new) = &api.var_new {
                for peer in [&var_new.get, &var_new.delete] {
                    if !names.contains(peer.as_str()) {
                        errors.push(Violation::new(
                            &api.name,
                            format!("var_new references unknown API {peer}"),
                        ));
                    }
                }
            }
            for deleted in &api.deletes {
                if !api.consumes.iter().any(|c| c == deleted)
                    && !self.predefined.contains(deleted)
                {
                    errors.push(Violation::new(
                        &api.name,
                        format!("deletes {deleted}, which is neither consumed nor predefined"),
                    ));
                }
            }
        }
        self.errors.extend(errors);
    }

    pub(crate) fn finish(mut self) -> Result<Plan, crate::error::CompileError> {
        if !self.errors.is_empty() {
            return Err(crate::error::CompileError::new(self.errors));
        }
        for node in &mut self.nodes {
            node.inserting.clear();
        }
        Ok(Plan::new(self.apis, self.nodes, self.root))
    }

    /// An API is insertable iff its name is not a prefix of any referenced
    /// peer name; referenced APIs run only as satellites or inside hooks.
    pub(crate) fn insertable(&self, api: usize) -> bool {
        let name = &self.apis[api].name;
        !self.referenced.iter().any(|r| r.starts_with(name.as_str()))
    }

    /// Insert `api` at `node`, descending into children that produce a
    /// missing variable and seeding producers where none does. Returns true
    /// when the API was appended somewhere under `node`.
    pub(crate) fn insert(&mut self, api: usize, node: NodeId) -> bool {
        let name = self.apis[api].name.clone();
        if self.nodes[node].inserting.contains(&name) {
            return false;
        }
        if !self.insertable(api) {
            return false;
        }
        if self.hosted_on_path(node, &name) {
            return false;
        }
        self.nodes[node].inserting.insert(name.clone());

        let undef = self.undefined_at(api, node);
        if undef.is_empty() {
            self.append(api, node);
            self.nodes[node].inserting.remove(&name);
            return true;
        }

        let children = self.nodes[node].children.clone();
        let mut accepted = false;
        for child in children {
            if self.nodes[child]
                .subtree_produces
                .iter()
                .any(|p| undef.iter().any(|u| u == p))
            {
                accepted |= self.insert(api, child);
            }
        }
        if accepted {
            self.nodes[node].inserting.remove(&name);
            return true;
        }

        // No child helps: seed producers of the first missing variable here,
        // then retry.
        let needed = undef[0].clone();
        let producers = self.producers.get(&needed).cloned().unwrap_or_default();
        let candidates: Vec<usize> = producers.into_iter().filter(|&p| p != api).collect();
        if candidates.is_empty() {
            self.errors.push(Violation::new(
                &name,
                format!("no producer exists for variable {needed}"),
            ));
            self.nodes[node].inserting.remove(&name);
            return false;
        }

        let mut seeded = false;
        for producer in candidates {
            seeded |= self.insert(producer, node);
        }
        if !seeded {
            self.errors.push(Violation::new(
                &name,
                format!("producers of {needed} exist but none could be placed (no progress)"),
            ));
            self.nodes[node].inserting.remove(&name);
            return false;
        }

        self.nodes[node].inserting.remove(&name);
        self.insert(api, node)
    }

    fn hosted_on_path(&self, node: NodeId, name: &str) -> bool {
        let mut cur = Some(node);
        while let Some(n) = cur {
            if let Some(api) = self.nodes[n].api {
                if self.apis[api].name == name {
                    return true;
                }
            }
            cur = self.nodes[n].parent;
        }
        false
    }

    /// Consumed names not produced on the path and not predefined, in the
    /// API's declared order (the seeding tie-break depends on it).
    fn undefined_at(&self, api: usize, node: NodeId) -> Vec<String> {
        let produced = &self.nodes[node].produces;
        self.apis[api]
            .consumes
            .iter()
            .filter(|c| !produced.contains(*c) && !self.predefined.contains(*c))
            .cloned()
            .collect()
    }

    fn append(&mut self, api: usize, node: NodeId) -> NodeId {
        let id = format!("{}.{}", self.nodes[node].id, self.nodes[node].children.len());
        let k = self.new_node(id, api, node);
        self.nodes[node].children.push(k);

        if let Some(var_new) = self.apis[api].var_new.clone() {
            self.attach_satellites(k, &var_new);
        }

        // Propagate the new produces up the ancestor chain; an upstream
        // delete stops the name from climbing past the deleting node.
        let mut climbing = self.apis[api].produces.clone();
        let mut cur = Some(node);
        while let Some(n) = cur {
            if climbing.is_empty() {
                break;
            }
            self.nodes[n]
                .subtree_produces
                .extend(climbing.iter().cloned());
            if let Some(a) = self.nodes[n].api {
                for deleted in &self.apis[a].deletes {
                    climbing.remove(deleted);
                }
            }
            cur = self.nodes[n].parent;
        }

        k
    }

    fn new_node(&mut self, id: String, api: usize, parent: NodeId) -> NodeId {
        let mut n = Node::new(id, Some(api), Some(parent));
        let mut produces = self.nodes[parent].produces.clone();
        for deleted in &self.apis[api].deletes {
            produces.remove(deleted);
        }
        produces.extend(self.apis[api].produces.iter().cloned());
        n.produces = produces;
        n.subtree_produces = self.apis[api].produces.clone();
        let idx = self.nodes.len();
        self.nodes.push(n);
        idx
    }

    fn attach_satellites(&mut self, k: NodeId, var_new: &crate::types::VarNew) {
        let api_name = self.apis[self.nodes[k].api.expect("appended node has an API")]
            .name
            .clone();
        let Some(get_idx) = self.find_api(&var_new.get) else {
            self.errors.push(Violation::new(
                &api_name,
                format!("getter {} does not resolve to a concrete API", var_new.get),
            ));
            return;
        };
        let Some(del_idx) = self.find_api(&var_new.delete) else {
            self.errors.push(Violation::new(
                &api_name,
                format!(
                    "destructor {} does not resolve to a concrete API",
                    var_new.delete
                ),
            ));
            return;
        };

        let base = self.nodes[k].id.clone();
        let pre = self.new_node(format!("{base}.pre"), get_idx, k);
        self.nodes[pre].satellite = true;
        let pre_del = self.new_node(format!("{base}.pre.0"), del_idx, pre);
        self.nodes[pre_del].satellite = true;
        self.nodes[pre].children.push(pre_del);

        let post = self.new_node(format!("{base}.post"), del_idx, k);
        self.nodes[post].satellite = true;

        self.nodes[k].pre_run = Some(pre);
        self.nodes[k].post_run = Some(post);
    }

    fn find_api(&self, name: &str) -> Option<usize> {
        self.apis.iter().position(|api| api.name == name)
    }
}
