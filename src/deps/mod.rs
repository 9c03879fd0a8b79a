use std::collections::{BTreeMap, BTreeSet};

/// One node of the dependency graph.
///
/// `depends_on` and `used_by` hold keys into the graph's node map and are
/// kept mutually transposed at all times: `a` depends on `b` exactly when
/// `b` is used by `a`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNode<K: Ord> {
    key: K,
    depends_on: BTreeSet<K>,
    used_by: BTreeSet<K>,
}

impl<K: Ord + Clone> DependencyNode<K> {
    fn new(key: K) -> Self {
        Self {
            key,
            depends_on: BTreeSet::new(),
            used_by: BTreeSet::new(),
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn depends_on(&self) -> &BTreeSet<K> {
        &self.depends_on
    }

    pub fn used_by(&self) -> &BTreeSet<K> {
        &self.used_by
    }
}

/// A bidirectional dependency graph over stable keys.
///
/// Nodes live in a map owned by the graph and reference each other by key,
/// so cycles are representable without ownership cycles and removal stays
/// proportional to the node's degree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph<K: Ord> {
    nodes: BTreeMap<K, DependencyNode<K>>,
}

impl<K: Ord + Clone> DependencyGraph<K> {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
        }
    }

    pub fn find(&self, key: &K) -> Option<&DependencyNode<K>> {
        self.nodes.get(key)
    }

    pub fn find_or_create(&mut self, key: K) -> &mut DependencyNode<K> {
        self.nodes
            .entry(key.clone())
            .or_insert_with(|| DependencyNode::new(key))
    }

    /// Record that `from` uses `to`, creating either node on demand.
    pub fn add_dependency(&mut self, from: K, to: K) {
        self.find_or_create(to.clone()).used_by.insert(from.clone());
        self.find_or_create(from).depends_on.insert(to);
    }

    /// Detach a node's outgoing edges and drop the node once nothing
    /// references it.
    ///
    /// Incoming `used_by` edges survive so that dependents recorded before
    /// the removal can still be discovered after the key is re-registered.
    pub fn remove(&mut self, key: &K) {
        let Some(node) = self.nodes.get_mut(key) else {
            return;
        };
        let targets: Vec<K> = node.depends_on.iter().cloned().collect();
        node.depends_on.clear();
        let orphaned = node.used_by.is_empty();
        for target in targets {
            let mut drop_target = false;
            if let Some(target_node) = self.nodes.get_mut(&target) {
                target_node.used_by.remove(key);
                drop_target = target_node.used_by.is_empty() && target_node.depends_on.is_empty();
            }
            if drop_target && &target != key {
                self.nodes.remove(&target);
            }
        }
        if orphaned {
            self.nodes.remove(key);
        }
    }

    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate every node in key order.
    pub fn nodes(&self) -> impl Iterator<Item = &DependencyNode<K>> {
        self.nodes.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.nodes.keys()
    }
}
