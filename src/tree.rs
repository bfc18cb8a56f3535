//! Tree reconstruction from flat relationship rows.
//!
//! The builder works in three passes over an index arena:
//!
//! 1. Index every row by id and link it under its parent. Rows whose parent
//!    is absent from the input are dropped; parentless rows become roots.
//! 2. Sort roots and every child list with the injected collation, walking
//!    with an explicit stack.
//! 3. Assemble immutable [`TreeNode`]s bottom-up in iterative post-order.
//!
//! No pass recurses, so pathological depths cannot exhaust the call stack.
//! Mutable state never leaves the builder; callers only see finished nodes.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::collation::NameCollation;
use crate::model::RelationshipRow;
use crate::EntityId;

/// Read-only node of an assembled tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    id: EntityId,
    name: String,
    children: Vec<TreeNode>,
}

impl TreeNode {
    #[inline]
    pub fn id(&self) -> EntityId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Children in collation order.
    #[inline]
    pub fn children(&self) -> &[TreeNode] {
        &self.children
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Nodes in this subtree, self included.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Pre-order traversal of this subtree.
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder { stack: vec![self] }
    }

    /// Find a node by id within this subtree.
    pub fn find(&self, id: EntityId) -> Option<&TreeNode> {
        self.iter().find(|n| n.id == id)
    }
}

impl Drop for TreeNode {
    // Unlink iteratively so very deep trees do not overflow the stack.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Pre-order iterator over a [`TreeNode`].
#[derive(Debug)]
pub struct PreOrder<'a> {
    stack: Vec<&'a TreeNode>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[derive(Debug)]
struct Slot {
    id: EntityId,
    name: String,
    children: Vec<usize>,
}

/// Assemble a forest from one-row-per-entity input.
///
/// Duplicate ids keep their first row. A row naming itself as parent, or a
/// parent that never appears, is dropped along with anything only reachable
/// through it.
pub fn build_forest<C>(rows: Vec<RelationshipRow>, collation: &C) -> Vec<TreeNode>
where
    C: NameCollation + ?Sized,
{
    let total = rows.len();
    let mut arena: Vec<Slot> = Vec::with_capacity(total);
    let mut parents: Vec<Option<EntityId>> = Vec::with_capacity(total);
    let mut index: HashMap<EntityId, usize> = HashMap::with_capacity(total);

    for row in rows {
        if index.contains_key(&row.id) {
            tracing::debug!(id = row.id, "ignoring repeated relationship row");
            continue;
        }
        index.insert(row.id, arena.len());
        parents.push(row.parent_id);
        arena.push(Slot {
            id: row.id,
            name: row.name,
            children: Vec::new(),
        });
    }

    // Pass 1: link
    let mut roots = Vec::new();
    let mut dangling = 0usize;
    for (i, parent) in parents.iter().enumerate() {
        match parent {
            None => roots.push(i),
            Some(p) => match index.get(p) {
                Some(&pi) if pi != i => arena[pi].children.push(i),
                _ => dangling += 1,
            },
        }
    }

    // Pass 2: sort siblings
    let by_name = |arena: &[Slot], a: usize, b: usize| -> Ordering {
        collation
            .compare(&arena[a].name, &arena[b].name)
            .then_with(|| arena[a].id.cmp(&arena[b].id))
    };
    roots.sort_by(|&a, &b| by_name(&arena, a, b));
    let mut stack: Vec<usize> = roots.clone();
    while let Some(i) = stack.pop() {
        let mut children = std::mem::take(&mut arena[i].children);
        children.sort_by(|&a, &b| by_name(&arena, a, b));
        stack.extend(children.iter().copied());
        arena[i].children = children;
    }

    // Pass 3: assemble bottom-up
    let mut built: Vec<Option<TreeNode>> = (0..arena.len()).map(|_| None).collect();
    let mut work: Vec<(usize, bool)> = roots.iter().rev().map(|&i| (i, false)).collect();
    while let Some((i, expanded)) = work.pop() {
        if expanded {
            let children = arena[i]
                .children
                .iter()
                .filter_map(|&c| built[c].take())
                .collect();
            built[i] = Some(TreeNode {
                id: arena[i].id,
                name: std::mem::take(&mut arena[i].name),
                children,
            });
        } else {
            work.push((i, true));
            work.extend(arena[i].children.iter().map(|&c| (c, false)));
        }
    }

    let forest: Vec<TreeNode> = roots.iter().filter_map(|&i| built[i].take()).collect();
    let placed: usize = forest.iter().map(TreeNode::len).sum();
    tracing::debug!(
        rows = total,
        roots = forest.len(),
        placed,
        dangling,
        "assembled forest"
    );
    forest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collation::{CodePointOrder, LocaleCollation};

    fn row(id: EntityId, name: &str, parent: Option<EntityId>) -> RelationshipRow {
        RelationshipRow::new(id, name, parent)
    }

    fn names(nodes: &[TreeNode]) -> Vec<&str> {
        nodes.iter().map(TreeNode::name).collect()
    }

    #[test]
    fn korean_children_are_collated() {
        let rows = vec![row(1, "나", None), row(2, "다", Some(1)), row(3, "가", Some(1))];
        let forest = build_forest(rows, &LocaleCollation::korean().unwrap());
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].id(), 1);
        assert_eq!(names(forest[0].children()), vec!["가", "다"]);
        assert_eq!(forest[0].children()[0].id(), 3);
    }

    #[test]
    fn children_may_precede_parents_in_input() {
        let rows = vec![
            row(4, "leaf", Some(3)),
            row(3, "mid", Some(1)),
            row(1, "top", None),
        ];
        let forest = build_forest(rows, &CodePointOrder);
        assert_eq!(forest.len(), 1);
        let leaf = forest[0].find(4).unwrap();
        assert_eq!(leaf.name(), "leaf");
        assert!(leaf.is_leaf());
        assert_eq!(forest[0].len(), 3);
    }

    #[test]
    fn roots_are_sorted_too() {
        let rows = vec![row(1, "b", None), row(2, "c", None), row(3, "a", None)];
        let forest = build_forest(rows, &CodePointOrder);
        assert_eq!(names(&forest), vec!["a", "b", "c"]);
    }

    #[test]
    fn equal_names_fall_back_to_id() {
        let rows = vec![row(9, "x", None), row(2, "x", None)];
        let forest = build_forest(rows, &CodePointOrder);
        assert_eq!(forest.iter().map(TreeNode::id).collect::<Vec<_>>(), vec![2, 9]);
    }

    #[test]
    fn dangling_parent_drops_row_and_its_subtree() {
        let rows = vec![
            row(1, "root", None),
            row(2, "orphan", Some(99)),
            row(3, "orphan child", Some(2)),
            row(4, "kept", Some(1)),
        ];
        let forest = build_forest(rows, &CodePointOrder);
        assert_eq!(names(&forest), vec!["root"]);
        assert_eq!(forest[0].len(), 2);
        assert!(forest[0].find(2).is_none());
        assert!(forest[0].find(3).is_none());
    }

    #[test]
    fn self_parent_and_cycles_are_unreachable() {
        let rows = vec![
            row(1, "loop", Some(1)),
            row(2, "a", Some(3)),
            row(3, "b", Some(2)),
        ];
        assert!(build_forest(rows, &CodePointOrder).is_empty());
    }

    #[test]
    fn repeated_id_keeps_first_row() {
        let rows = vec![row(1, "first", None), row(1, "second", None)];
        let forest = build_forest(rows, &CodePointOrder);
        assert_eq!(names(&forest), vec!["first"]);
    }

    #[test]
    fn empty_input_gives_empty_forest() {
        assert!(build_forest(Vec::new(), &CodePointOrder).is_empty());
    }

    #[test]
    fn very_deep_chain_does_not_recurse() {
        let depth = 100_000u64;
        let mut rows = vec![row(0, "n0", None)];
        rows.extend((1..depth).map(|i| row(i, &format!("n{}", i), Some(i - 1))));
        let forest = build_forest(rows, &CodePointOrder);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].iter().count(), depth as usize);
        drop(forest);
    }

    #[test]
    fn pre_order_visits_sorted_children() {
        let rows = vec![
            row(1, "r", None),
            row(2, "b", Some(1)),
            row(3, "a", Some(1)),
            row(4, "a2", Some(3)),
        ];
        let forest = build_forest(rows, &CodePointOrder);
        let order: Vec<EntityId> = forest[0].iter().map(TreeNode::id).collect();
        assert_eq!(order, vec![1, 3, 4, 2]);
    }

    #[test]
    fn serializes_as_nested_json() {
        let rows = vec![row(1, "r", None), row(2, "c", Some(1))];
        let forest = build_forest(rows, &CodePointOrder);
        let json = serde_json::to_value(&forest).unwrap();
        assert_eq!(json[0]["id"], 1);
        assert_eq!(json[0]["children"][0]["name"], "c");
        assert!(json[0]["children"][0]["children"].as_array().unwrap().is_empty());
    }
}
