//! Flat store of agent observables and the parent/child tree built from it.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// One unit of agent activity (a reasoning step, an action call, ...).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Observable {
    pub id: i32,
    /// `None` for roots; the backend omits zero.
    #[serde(default, deserialize_with = "zero_as_none", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i32>,
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation: Option<Value>,
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub progress: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<Value>,
}

impl Observable {
    fn stub(id: i32) -> Self {
        Self {
            id,
            name: "unknown".to_string(),
            ..Default::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completion.is_some()
    }
}

fn zero_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
    Ok(Option::<i32>::deserialize(deserializer)?.filter(|id| *id != 0))
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Value>, D::Error> {
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A node of the rebuilt tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservableNode {
    #[serde(flatten)]
    pub observable: Observable,
    pub children: Vec<ObservableNode>,
}

impl ObservableNode {
    /// Number of nodes in this subtree, itself included.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(ObservableNode::count).sum::<usize>()
    }
}

#[derive(Debug, Default, Clone)]
pub struct ObservableStore {
    nodes: HashMap<i32, Observable>,
}

impl ObservableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: i32) -> Option<&Observable> {
        self.nodes.get(&id)
    }

    /// Merge a (possibly partial) update.
    ///
    /// `creation`/`completion` are only replaced when present, `progress`
    /// only when the update has strictly more entries. An unseen parent gets
    /// a stub until its own update arrives.
    pub fn apply(&mut self, update: Observable) {
        if let Some(parent) = update.parent_id {
            if parent != update.id {
                self.nodes
                    .entry(parent)
                    .or_insert_with(|| Observable::stub(parent));
            }
        }

        match self.nodes.get_mut(&update.id) {
            None => {
                self.nodes.insert(update.id, update);
            }
            Some(node) => {
                if update.parent_id.is_some() {
                    node.parent_id = update.parent_id;
                }
                for (field, value) in [
                    (&mut node.agent, update.agent),
                    (&mut node.name, update.name),
                    (&mut node.icon, update.icon),
                ] {
                    if !value.is_empty() {
                        *field = value;
                    }
                }
                if update.creation.is_some() {
                    node.creation = update.creation;
                }
                if update.progress.len() > node.progress.len() {
                    node.progress = update.progress;
                }
                if update.completion.is_some() {
                    node.completion = update.completion;
                }
            }
        }
    }

    /// Roots with their descendants, siblings ordered by id.
    pub fn tree(&self) -> Vec<ObservableNode> {
        let mut children: HashMap<i32, Vec<i32>> = HashMap::new();
        let mut roots: Vec<i32> = Vec::new();
        for node in self.nodes.values() {
            match node.parent_id {
                Some(parent) if parent != node.id && self.nodes.contains_key(&parent) => {
                    children.entry(parent).or_default().push(node.id)
                }
                _ => roots.push(node.id),
            }
        }
        for ids in children.values_mut() {
            ids.sort_unstable();
        }
        roots.sort_unstable();

        // A parent cycle never reaches a root; surface it as extra roots so
        // no node is lost.
        let mut placed = HashSet::new();
        let mut tree: Vec<ObservableNode> = roots
            .iter()
            .map(|id| self.build(*id, &children, &mut placed))
            .collect();
        let mut orphans: Vec<i32> = self
            .nodes
            .keys()
            .filter(|id| !placed.contains(*id))
            .copied()
            .collect();
        orphans.sort_unstable();
        for id in orphans {
            if !placed.contains(&id) {
                tree.push(self.build(id, &children, &mut placed));
            }
        }
        tree
    }

    fn build(
        &self,
        id: i32,
        children: &HashMap<i32, Vec<i32>>,
        placed: &mut HashSet<i32>,
    ) -> ObservableNode {
        placed.insert(id);
        let kids = children
            .get(&id)
            .map(|ids| {
                ids.iter()
                    .filter(|child| !placed.contains(*child))
                    .copied()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default()
            .into_iter()
            .map(|child| self.build(child, children, placed))
            .collect();
        ObservableNode {
            observable: self.nodes.get(&id).cloned().unwrap_or_else(|| Observable::stub(id)),
            children: kids,
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn obs(value: Value) -> Observable {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn same_update_twice_is_idempotent() {
        let update = obs(json!({"id": 1, "agent": "a", "name": "job", "icon": "i",
                                "creation": {"x": 1}, "progress": [{"p": 1}]}));
        let mut once = ObservableStore::new();
        once.apply(update.clone());
        let mut twice = ObservableStore::new();
        twice.apply(update.clone());
        twice.apply(update);
        assert_eq!(once.tree(), twice.tree());
    }

    #[test]
    fn child_before_parent_is_attached_once_parent_arrives() {
        let mut store = ObservableStore::new();
        store.apply(obs(json!({"id": 2, "parent_id": 1, "name": "search"})));

        let tree = store.tree();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].observable.name, "unknown");
        assert_eq!(tree[0].children[0].observable.id, 2);

        store.apply(obs(json!({"id": 1, "agent": "a", "name": "job"})));
        let tree = store.tree();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].observable.name, "job");
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(tree[0].count(), 2);
    }

    #[test]
    fn partial_updates_follow_merge_rules() {
        let mut store = ObservableStore::new();
        store.apply(obs(json!({"id": 1, "name": "job", "creation": {"c": 1},
                               "progress": [{"p": 1}, {"p": 2}]})));
        store.apply(obs(json!({"id": 1, "progress": [{"p": 1}]})));
        store.apply(obs(json!({"id": 1, "completion": {"done": true}})));

        let node = store.get(1).unwrap();
        assert_eq!(node.name, "job");
        assert_eq!(node.creation, Some(json!({"c": 1})));
        assert_eq!(node.progress.len(), 2);
        assert!(node.is_complete());

        store.apply(obs(json!({"id": 1, "progress": [{}, {}, {}]})));
        assert_eq!(store.get(1).unwrap().progress.len(), 3);
    }

    #[test]
    fn siblings_sorted_and_nothing_dropped() {
        let mut store = ObservableStore::new();
        for (id, parent) in [(5, 1), (3, 1), (1, 0), (9, 0), (4, 3)] {
            store.apply(obs(json!({"id": id, "parent_id": parent, "name": format!("n{id}")})));
        }
        let tree = store.tree();
        let roots: Vec<_> = tree.iter().map(|n| n.observable.id).collect();
        assert_eq!(roots, [1, 9]);
        let kids: Vec<_> = tree[0].children.iter().map(|n| n.observable.id).collect();
        assert_eq!(kids, [3, 5]);
        assert_eq!(tree.iter().map(ObservableNode::count).sum::<usize>(), store.len());
    }

    #[test]
    fn parent_cycle_keeps_every_node() {
        let mut store = ObservableStore::new();
        store.apply(obs(json!({"id": 1, "parent_id": 2})));
        store.apply(obs(json!({"id": 2, "parent_id": 1})));
        let tree = store.tree();
        assert_eq!(tree.iter().map(ObservableNode::count).sum::<usize>(), 2);
    }
}
