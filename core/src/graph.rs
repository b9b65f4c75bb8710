//! Hierarchy and dependency traversal: ancestors, descendants, cycle
//! detection, dependency chains and blocker resolution.

use std::collections::{HashSet, VecDeque};

use crate::{
    error::Result,
    models::{DependencyType, Role, WorkItem},
    store::Store,
};

/// Direction for [`GraphService::dependency_chain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Follow `BLOCKS`/`RELATES_TO` edges from→to.
    Outgoing,
    /// Follow edges in reverse, to→from.
    Incoming,
}

/// An item paired with its BFS distance from the nearest seed in a
/// [`GraphService::dependency_chain`] result.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainEntry {
    pub item: WorkItem,
    pub distance: u32,
}

/// Pure traversal/validation operations over the hierarchy and dependency
/// graph. Holds no state of its own; every call reads through to the store.
pub struct GraphService<'a> {
    store: &'a dyn Store,
}

impl<'a> GraphService<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Ordered root…direct-parent. Empty for roots.
    pub async fn ancestors(&self, id: i64) -> Result<Vec<WorkItem>> {
        let mut chain = Vec::new();
        let mut current = self.store.get_item(id).await?;
        let mut guard = 0usize;
        while let Some(item) = current {
            let Some(parent_id) = item.parent_id else {
                break;
            };
            let parent = self.store.get_item(parent_id).await?;
            match parent {
                Some(p) => {
                    chain.push(p.clone());
                    current = Some(p);
                }
                None => break,
            }
            guard += 1;
            if guard > WorkItem::MAX_DEPTH as usize + 1 {
                break;
            }
        }
        chain.reverse();
        Ok(chain)
    }

    /// All items in the subtree rooted at `id`, in BFS order, optionally
    /// bounded to `max_depth` levels below `id`.
    pub async fn descendants(&self, id: i64, max_depth: Option<u32>) -> Result<Vec<WorkItem>> {
        let mut result = Vec::new();
        let mut queue: VecDeque<(i64, u32)> = VecDeque::new();
        queue.push_back((id, 0));
        while let Some((current_id, depth)) = queue.pop_front() {
            if let Some(limit) = max_depth {
                if depth >= limit {
                    continue;
                }
            }
            let children = self.store.items_by_parent(Some(current_id)).await?;
            for child in children {
                queue.push_back((child.id, depth + 1));
                result.push(child);
            }
        }
        Ok(result)
    }

    /// Would setting `child_id`'s parent to `new_parent_id` introduce a
    /// cycle in the parent chain? Walks `new_parent_id`'s ancestors looking
    /// for `child_id`.
    pub async fn would_introduce_parent_cycle(
        &self,
        child_id: i64,
        new_parent_id: i64,
    ) -> Result<bool> {
        if child_id == new_parent_id {
            return Ok(true);
        }
        let mut current = self.store.get_item(new_parent_id).await?;
        let mut guard = 0usize;
        while let Some(item) = current {
            if item.id == child_id {
                return Ok(true);
            }
            current = match item.parent_id {
                Some(pid) => self.store.get_item(pid).await?,
                None => None,
            };
            guard += 1;
            if guard > 10_000 {
                break;
            }
        }
        Ok(false)
    }

    /// Would a new dependency edge `from_id --type--> to_id` introduce a
    /// directed cycle among BLOCKS/IS_BLOCKED_BY edges? `RELATES_TO` never
    /// cycles. `IS_BLOCKED_BY` is treated as the reverse of `BLOCKS`: an
    /// edge `from --IS_BLOCKED_BY--> to` is equivalent to `to --BLOCKS--> from`.
    pub async fn would_introduce_dependency_cycle(
        &self,
        from_id: i64,
        to_id: i64,
        dep_type: DependencyType,
    ) -> Result<bool> {
        if dep_type == DependencyType::RelatesTo {
            return Ok(false);
        }
        let (effective_from, effective_to) = match dep_type {
            DependencyType::Blocks => (from_id, to_id),
            DependencyType::IsBlockedBy => (to_id, from_id),
            DependencyType::RelatesTo => unreachable!(),
        };
        // DFS from effective_to along BLOCKS-forward edges; cycle if we
        // reach effective_from.
        let mut visited = HashSet::new();
        let mut stack = vec![effective_to];
        while let Some(node) = stack.pop() {
            if node == effective_from {
                return Ok(true);
            }
            if !visited.insert(node) {
                continue;
            }
            let outgoing = self.store.dependencies_by_from_item(node).await?;
            for dep in outgoing {
                match dep.dep_type {
                    DependencyType::Blocks => stack.push(dep.to_item_id),
                    DependencyType::IsBlockedBy => { /* reverse edge, not a forward BLOCKS hop */ }
                    DependencyType::RelatesTo => {}
                }
            }
            let incoming = self.store.dependencies_by_to_item(node).await?;
            for dep in incoming {
                if dep.dep_type == DependencyType::IsBlockedBy {
                    // row (from, to=node, IS_BLOCKED_BY) means "node BLOCKS
                    // from" per the reverse-edge equivalence above: a
                    // forward BLOCKS hop from node to dep.from_item_id.
                    if !visited.contains(&dep.from_item_id) {
                        stack.push(dep.from_item_id);
                    }
                }
            }
        }
        Ok(false)
    }

    /// Items reachable from `root_ids` along dependency edges, each paired
    /// with its minimum BFS distance from the nearest seed.
    pub async fn dependency_chain(
        &self,
        root_ids: &[i64],
        direction: Direction,
        max_depth: Option<u32>,
    ) -> Result<Vec<ChainEntry>> {
        let mut distances: std::collections::HashMap<i64, u32> = std::collections::HashMap::new();
        let mut queue: VecDeque<(i64, u32)> = VecDeque::new();
        for &root in root_ids {
            if distances.insert(root, 0).is_none() {
                queue.push_back((root, 0));
            }
        }
        while let Some((node, depth)) = queue.pop_front() {
            if let Some(limit) = max_depth {
                if depth >= limit {
                    continue;
                }
            }
            let neighbors = match direction {
                Direction::Outgoing => self
                    .store
                    .dependencies_by_from_item(node)
                    .await?
                    .into_iter()
                    .filter(|d| d.dep_type != DependencyType::IsBlockedBy)
                    .map(|d| d.to_item_id)
                    .collect::<Vec<_>>(),
                Direction::Incoming => self
                    .store
                    .dependencies_by_to_item(node)
                    .await?
                    .into_iter()
                    .filter(|d| d.dep_type != DependencyType::IsBlockedBy)
                    .map(|d| d.from_item_id)
                    .collect::<Vec<_>>(),
            };
            for next in neighbors {
                let candidate = depth + 1;
                let improved = match distances.get(&next) {
                    Some(&existing) => candidate < existing,
                    None => true,
                };
                if improved {
                    distances.insert(next, candidate);
                    queue.push_back((next, candidate));
                }
            }
        }
        let mut entries = Vec::new();
        for (id, distance) in distances {
            if let Some(item) = self.store.get_item(id).await? {
                entries.push(ChainEntry { item, distance });
            }
        }
        entries.sort_by(|a, b| a.distance.cmp(&b.distance).then(a.item.id.cmp(&b.item.id)));
        Ok(entries)
    }

    /// All items with an outgoing BLOCKS edge into `item_id`, or an
    /// outgoing IS_BLOCKED_BY edge from `item_id` (its reverse-form peer).
    pub async fn blockers(&self, item_id: i64) -> Result<Vec<WorkItem>> {
        let mut blocker_ids = HashSet::new();
        for dep in self.store.dependencies_by_to_item(item_id).await? {
            if dep.dep_type == DependencyType::Blocks {
                blocker_ids.insert(dep.from_item_id);
            }
        }
        for dep in self.store.dependencies_by_from_item(item_id).await? {
            if dep.dep_type == DependencyType::IsBlockedBy {
                blocker_ids.insert(dep.to_item_id);
            }
        }
        let mut items = Vec::new();
        for id in blocker_ids {
            if let Some(item) = self.store.get_item(id).await? {
                items.push(item);
            }
        }
        items.sort_by_key(|i| i.id);
        Ok(items)
    }

    /// Is `blocker`'s obligation toward `item_id` satisfied? A blocker is
    /// resolved iff its role is `terminal`.
    pub async fn is_resolved_blocker(&self, blocker: &WorkItem) -> bool {
        blocker.role == Role::Terminal
    }

    /// Every item that (a) has `completed_item_id` as a blocker and (b) now
    /// has zero unresolved blockers.
    pub async fn newly_unblocked(&self, completed_item_id: i64) -> Result<Vec<WorkItem>> {
        let mut dependents = HashSet::new();
        for dep in self.store.dependencies_by_from_item(completed_item_id).await? {
            if dep.dep_type == DependencyType::Blocks {
                dependents.insert(dep.to_item_id);
            }
        }
        for dep in self.store.dependencies_by_to_item(completed_item_id).await? {
            if dep.dep_type == DependencyType::IsBlockedBy {
                dependents.insert(dep.from_item_id);
            }
        }
        let mut result = Vec::new();
        for id in dependents {
            let blockers = self.blockers(id).await?;
            let unresolved = blockers.iter().any(|b| b.role != Role::Terminal);
            if !unresolved {
                if let Some(item) = self.store.get_item(id).await? {
                    result.push(item);
                }
            }
        }
        result.sort_by_key(|i| i.id);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DependencyType, NewDependency};
    use crate::test_support::InMemoryTestStore;

    #[tokio::test]
    async fn ancestors_returns_root_to_direct_parent_order() {
        let store = InMemoryTestStore::new();
        let root = store.seed_item(None).await;
        let mid = store.seed_item(Some(root)).await;
        let leaf = store.seed_item(Some(mid)).await;

        let graph = GraphService::new(&store);
        let chain = graph.ancestors(leaf).await.unwrap();
        assert_eq!(chain.iter().map(|i| i.id).collect::<Vec<_>>(), vec![root, mid]);
    }

    #[tokio::test]
    async fn ancestors_of_root_is_empty() {
        let store = InMemoryTestStore::new();
        let root = store.seed_item(None).await;
        let graph = GraphService::new(&store);
        assert!(graph.ancestors(root).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn descendants_bfs_order_includes_whole_subtree() {
        let store = InMemoryTestStore::new();
        let root = store.seed_item(None).await;
        let c1 = store.seed_item(Some(root)).await;
        let c2 = store.seed_item(Some(root)).await;
        let gc1 = store.seed_item(Some(c1)).await;

        let graph = GraphService::new(&store);
        let descendants = graph.descendants(root, None).await.unwrap();
        let ids: Vec<i64> = descendants.iter().map(|i| i.id).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&c1) && ids.contains(&c2) && ids.contains(&gc1));
    }

    #[tokio::test]
    async fn parent_cycle_detected_when_reparenting_to_own_descendant() {
        let store = InMemoryTestStore::new();
        let root = store.seed_item(None).await;
        let child = store.seed_item(Some(root)).await;

        let graph = GraphService::new(&store);
        assert!(graph
            .would_introduce_parent_cycle(root, child)
            .await
            .unwrap());
        assert!(!graph
            .would_introduce_parent_cycle(child, root)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn dependency_cycle_detected_for_blocks_chain() {
        let store = InMemoryTestStore::new();
        let a = store.seed_item(None).await;
        let b = store.seed_item(None).await;
        let c = store.seed_item(None).await;
        store
            .create_dependency(NewDependency {
                from_item_id: a,
                to_item_id: b,
                dep_type: DependencyType::Blocks,
            })
            .await
            .unwrap();
        store
            .create_dependency(NewDependency {
                from_item_id: b,
                to_item_id: c,
                dep_type: DependencyType::Blocks,
            })
            .await
            .unwrap();

        let graph = GraphService::new(&store);
        assert!(graph
            .would_introduce_dependency_cycle(c, a, DependencyType::Blocks)
            .await
            .unwrap());
        assert!(!graph
            .would_introduce_dependency_cycle(a, c, DependencyType::Blocks)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn newly_unblocked_reports_dependents_with_zero_remaining_blockers() {
        let store = InMemoryTestStore::new();
        let a = store.seed_item(None).await;
        let b = store.seed_item(None).await;
        store
            .create_dependency(NewDependency {
                from_item_id: a,
                to_item_id: b,
                dep_type: DependencyType::Blocks,
            })
            .await
            .unwrap();

        let graph = GraphService::new(&store);
        assert!(!graph.newly_unblocked(a).await.unwrap().iter().any(|i| i.id == b));

        store.mark_terminal(a).await;
        let unblocked = graph.newly_unblocked(a).await.unwrap();
        assert!(unblocked.iter().any(|i| i.id == b));
    }
}
