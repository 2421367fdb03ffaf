// ─── Entity Tree ───
// Provider -> entity -> version hierarchy stored in an arena.
//
// Nodes are addressed by generational handles. Freeing a node bumps its
// slot generation, so handles into a removed subtree stop resolving.

use crate::core::events::{ListChange, Subscribers};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Root,
    Provider { id: String },
    Entity { provider: String, internal_id: String },
    Version { descriptor: String },
}

/// A structural change scoped to the children of `parent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeChange {
    pub parent: NodeHandle,
    pub change: ListChange,
}

#[derive(Debug)]
struct Node {
    generation: u32,
    data: Option<NodeData>,
    parent: Option<NodeHandle>,
    children: Vec<NodeHandle>,
}

#[derive(Debug)]
pub struct EntityTree {
    nodes: Vec<Node>,
    free: Vec<u32>,
    root: NodeHandle,
    changes: Subscribers<TreeChange>,
}

impl Default for EntityTree {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityTree {
    pub fn new() -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: NodeHandle {
                index: 0,
                generation: 0,
            },
            changes: Subscribers::new(),
        };
        tree.root = tree.alloc(NodeData::Root, None);
        tree
    }

    pub fn root(&self) -> NodeHandle {
        self.root
    }

    pub fn changes(&mut self) -> &mut Subscribers<TreeChange> {
        &mut self.changes
    }

    fn node(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes
            .get(handle.index as usize)
            .filter(|n| n.generation == handle.generation && n.data.is_some())
    }

    fn node_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.nodes
            .get_mut(handle.index as usize)
            .filter(|n| n.generation == handle.generation && n.data.is_some())
    }

    pub fn is_valid(&self, handle: NodeHandle) -> bool {
        self.node(handle).is_some()
    }

    pub fn get(&self, handle: NodeHandle) -> Option<&NodeData> {
        self.node(handle).and_then(|n| n.data.as_ref())
    }

    pub fn parent(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.node(handle).and_then(|n| n.parent)
    }

    pub fn children(&self, handle: NodeHandle) -> &[NodeHandle] {
        self.node(handle).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn child(&self, parent: NodeHandle, index: usize) -> Option<NodeHandle> {
        self.children(parent).get(index).copied()
    }

    /// Position of the first child of `parent` whose data matches.
    pub fn find_child(
        &self,
        parent: NodeHandle,
        mut matches: impl FnMut(&NodeData) -> bool,
    ) -> Option<(usize, NodeHandle)> {
        self.children(parent)
            .iter()
            .enumerate()
            .find(|(_, h)| self.get(**h).is_some_and(&mut matches))
            .map(|(i, h)| (i, *h))
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.data.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn alloc(&mut self, data: NodeData, parent: Option<NodeHandle>) -> NodeHandle {
        if let Some(index) = self.free.pop() {
            let node = &mut self.nodes[index as usize];
            node.data = Some(data);
            node.parent = parent;
            node.children.clear();
            NodeHandle {
                index,
                generation: node.generation,
            }
        } else {
            let index = self.nodes.len() as u32;
            self.nodes.push(Node {
                generation: 0,
                data: Some(data),
                parent,
                children: Vec::new(),
            });
            NodeHandle {
                index,
                generation: 0,
            }
        }
    }

    fn free_subtree(&mut self, handle: NodeHandle) {
        let mut stack = vec![handle];
        while let Some(h) = stack.pop() {
            let Some(node) = self.node_mut(h) else {
                continue;
            };
            stack.extend(node.children.drain(..));
            node.data = None;
            node.parent = None;
            node.generation = node.generation.wrapping_add(1);
            self.free.push(h.index);
        }
    }

    /// Insert children at `index` (clamped), emitting `Inserted` scoped to `parent`.
    pub fn insert_children(
        &mut self,
        parent: NodeHandle,
        index: usize,
        data: Vec<NodeData>,
    ) -> Vec<NodeHandle> {
        if !self.is_valid(parent) || data.is_empty() {
            return Vec::new();
        }
        let handles: Vec<_> = data
            .into_iter()
            .map(|d| self.alloc(d, Some(parent)))
            .collect();

        let Some(node) = self.node_mut(parent) else {
            return Vec::new();
        };
        let index = index.min(node.children.len());
        node.children.splice(index..index, handles.iter().copied());

        if let Some(change) = ListChange::inserted(index, handles.len()) {
            self.changes.emit(&TreeChange { parent, change });
        }
        handles
    }

    /// Remove `count` children starting at `first`, freeing their subtrees.
    pub fn remove_children(&mut self, parent: NodeHandle, first: usize, count: usize) {
        let removed: Vec<NodeHandle> = match self.node_mut(parent) {
            Some(node) if first < node.children.len() => {
                let end = first.saturating_add(count).min(node.children.len());
                node.children.drain(first..end).collect()
            }
            _ => return,
        };
        let n = removed.len();
        for h in removed {
            self.free_subtree(h);
        }
        if let Some(change) = ListChange::removed(first, n) {
            self.changes.emit(&TreeChange { parent, change });
        }
    }

    /// Replace all children of `parent` at once, emitting a scoped `Reset`.
    pub fn reset_children(&mut self, parent: NodeHandle, data: Vec<NodeData>) -> Vec<NodeHandle> {
        let old: Vec<NodeHandle> = match self.node_mut(parent) {
            Some(node) => node.children.drain(..).collect(),
            None => return Vec::new(),
        };
        for h in old {
            self.free_subtree(h);
        }
        let handles: Vec<_> = data
            .into_iter()
            .map(|d| self.alloc(d, Some(parent)))
            .collect();
        if let Some(node) = self.node_mut(parent) {
            node.children = handles.clone();
        }
        self.changes.emit(&TreeChange {
            parent,
            change: ListChange::Reset,
        });
        handles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::recorder;

    fn provider(id: &str) -> NodeData {
        NodeData::Provider { id: id.into() }
    }

    fn entity(id: &str) -> NodeData {
        NodeData::Entity {
            provider: "p".into(),
            internal_id: id.into(),
        }
    }

    #[test]
    fn inserts_are_scoped_to_parent() {
        let mut tree = EntityTree::new();
        let events = recorder(tree.changes());
        let root = tree.root();

        let p = tree.insert_children(root, 0, vec![provider("p")])[0];
        tree.insert_children(p, 0, vec![entity("a"), entity("c")]);
        tree.insert_children(p, 1, vec![entity("b")]);

        let ids: Vec<_> = tree
            .children(p)
            .iter()
            .map(|h| match tree.get(*h) {
                Some(NodeData::Entity { internal_id, .. }) => internal_id.as_str(),
                _ => "?",
            })
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(tree.parent(tree.child(p, 1).unwrap()), Some(p));

        let events = events.lock().unwrap();
        assert_eq!(
            events[2],
            TreeChange {
                parent: p,
                change: ListChange::Inserted { first: 1, last: 1 }
            }
        );
    }

    #[test]
    fn removing_a_subtree_invalidates_handles() {
        let mut tree = EntityTree::new();
        let root = tree.root();
        let p = tree.insert_children(root, 0, vec![provider("p")])[0];
        let e = tree.insert_children(p, 0, vec![entity("a")])[0];
        let v = tree.insert_children(e, 0, vec![NodeData::Version {
            descriptor: "1.0".into(),
        }])[0];
        assert_eq!(tree.len(), 4);

        tree.remove_children(root, 0, 1);
        assert!(!tree.is_valid(p));
        assert!(!tree.is_valid(e));
        assert!(!tree.is_valid(v));
        assert_eq!(tree.len(), 1);

        // Reused slot gets a new generation.
        let q = tree.insert_children(root, 0, vec![provider("q")])[0];
        assert!(tree.is_valid(q));
        assert!(!tree.is_valid(p));
        assert_eq!(tree.find_child(root, |d| *d == provider("q")), Some((0, q)));
    }

    #[test]
    fn reset_replaces_children_with_one_event() {
        let mut tree = EntityTree::new();
        let root = tree.root();
        let p = tree.insert_children(root, 0, vec![provider("p")])[0];
        let old = tree.insert_children(p, 0, vec![entity("a"), entity("b")]);

        let events = recorder(tree.changes());
        let new = tree.reset_children(p, vec![entity("c")]);
        assert!(old.iter().all(|h| !tree.is_valid(*h)));
        assert_eq!(tree.children(p), new.as_slice());
        assert_eq!(
            *events.lock().unwrap(),
            vec![TreeChange {
                parent: p,
                change: ListChange::Reset
            }]
        );
    }
}
