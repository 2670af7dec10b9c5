/*
 *   Copyright (c) 2025 R3BL LLC
 *   All rights reserved.
 *
 *   Licensed under the Apache License, Version 2.0 (the "License");
 *   you may not use this file except in compliance with the License.
 *   You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 *   Unless required by applicable law or agreed to in writing, software
 *   distributed under the License is distributed on an "AS IS" BASIS,
 *   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *   See the License for the specific language governing permissions and
 *   limitations under the License.
 */

//! Arena red-black tree keyed through a [`TreeAdapter`]. See [`SlotTree`] for details.

use super::SlotKey;
use slab::Slab;
use std::{cmp::Ordering, marker::PhantomData};

/// Intrusive tree links. Embed one of these in every node type that can live in a
/// [`SlotTree`]. The default value is the unlinked state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeLink {
    parent: Option<SlotKey>,
    left: Option<SlotKey>,
    right: Option<SlotKey>,
    red: bool,
}

/// Projects the [`TreeLink`] and the ordering key out of a node.
///
/// `Key: Ord` plays the role that an init-time comparator function plays in
/// pointer-intrusive tree libraries: the caller picks the ordering once, by type, when
/// declaring the adapter.
pub trait TreeAdapter {
    type Node;
    type Key: Ord;
    fn key(node: &Self::Node) -> Self::Key;
    fn link(node: &Self::Node) -> &TreeLink;
    fn link_mut(node: &mut Self::Node) -> &mut TreeLink;
}

/// An intrusive balanced binary search tree over a caller-owned [`Slab`] arena.
///
/// A single entity can live in a [`SlotTree`] and one or more
/// [`SlotList`](super::SlotList)s at the same time without any allocation beyond its
/// arena slot; this is what the scheduler does with its coroutine entries (identity
/// index + busy/wait queue).
///
/// In-order traversal via [`next`] is O(log n) worst-case per step, amortized O(1) over
/// a full sweep.
///
/// [`next`]: Self::next
#[derive(Debug)]
pub struct SlotTree<A: TreeAdapter> {
    root: Option<SlotKey>,
    len: usize,
    _adapter: PhantomData<A>,
}

impl<A: TreeAdapter> Default for SlotTree<A> {
    fn default() -> Self { Self::new() }
}

impl<A: TreeAdapter> SlotTree<A> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            root: None,
            len: 0,
            _adapter: PhantomData,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize { self.len }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.len == 0 }

    /// Insert `key`. On key collision nothing is inserted and the colliding slot is
    /// returned in `Err`.
    pub fn insert(&mut self, arena: &mut Slab<A::Node>, key: SlotKey) -> Result<(), SlotKey> {
        let needle = A::key(&arena[key]);
        let mut parent = None;
        let mut cursor = self.root;
        let mut went_left = false;
        while let Some(current) = cursor {
            match needle.cmp(&A::key(&arena[current])) {
                Ordering::Less => {
                    parent = Some(current);
                    cursor = Self::links(arena, current).left;
                    went_left = true;
                }
                Ordering::Greater => {
                    parent = Some(current);
                    cursor = Self::links(arena, current).right;
                    went_left = false;
                }
                Ordering::Equal => return Err(current),
            }
        }

        *A::link_mut(&mut arena[key]) = TreeLink {
            parent,
            left: None,
            right: None,
            red: true,
        };
        match parent {
            None => self.root = Some(key),
            Some(p) if went_left => Self::set_left(arena, p, Some(key)),
            Some(p) => Self::set_right(arena, p, Some(key)),
        }
        self.len += 1;
        self.insert_fixup(arena, key);
        Ok(())
    }

    /// Swap `new_key` in place of an existing equal-keyed node and return the old slot,
    /// or insert `new_key` and return [`None`]. The tree shape and colors are untouched
    /// on the swap path.
    pub fn replace(&mut self, arena: &mut Slab<A::Node>, new_key: SlotKey) -> Option<SlotKey> {
        let needle = A::key(&arena[new_key]);
        let old = self.find(arena, &needle)?;
        debug_assert_ne!(old, new_key, "cannot replace a node with itself");

        let old_link = *Self::links(arena, old);
        *A::link_mut(&mut arena[new_key]) = old_link;
        match old_link.parent {
            None => self.root = Some(new_key),
            Some(p) if Self::links(arena, p).left == Some(old) => {
                Self::set_left(arena, p, Some(new_key));
            }
            Some(p) => Self::set_right(arena, p, Some(new_key)),
        }
        if let Some(left) = old_link.left {
            Self::set_parent(arena, left, Some(new_key));
        }
        if let Some(right) = old_link.right {
            Self::set_parent(arena, right, Some(new_key));
        }
        *A::link_mut(&mut arena[old]) = TreeLink::default();
        Some(old)
    }

    /// Unlink `key` from the tree. The slot itself stays alive in the arena.
    pub fn erase(&mut self, arena: &mut Slab<A::Node>, key: SlotKey) {
        let z_link = *Self::links(arena, key);
        let mut removed_red = z_link.red;
        let fix_node;
        let fix_parent;

        if z_link.left.is_none() {
            fix_node = z_link.right;
            fix_parent = z_link.parent;
            self.transplant(arena, key, z_link.right);
        } else if z_link.right.is_none() {
            fix_node = z_link.left;
            fix_parent = z_link.parent;
            self.transplant(arena, key, z_link.left);
        } else {
            // Two children: splice in the in-order successor.
            let successor = Self::minimum(
                arena,
                z_link.right.expect("two-children branch has a right child"),
            );
            removed_red = Self::links(arena, successor).red;
            fix_node = Self::links(arena, successor).right;
            if Self::links(arena, successor).parent == Some(key) {
                fix_parent = Some(successor);
            } else {
                fix_parent = Self::links(arena, successor).parent;
                let successor_right = Self::links(arena, successor).right;
                self.transplant(arena, successor, successor_right);
                let z_right = Self::links(arena, key).right;
                Self::set_right(arena, successor, z_right);
                if let Some(r) = z_right {
                    Self::set_parent(arena, r, Some(successor));
                }
            }
            self.transplant(arena, key, Some(successor));
            let z_left = Self::links(arena, key).left;
            Self::set_left(arena, successor, z_left);
            if let Some(l) = z_left {
                Self::set_parent(arena, l, Some(successor));
            }
            let z_red = Self::links(arena, key).red;
            Self::set_red(arena, successor, z_red);
        }

        if !removed_red {
            self.erase_fixup(arena, fix_node, fix_parent);
        }
        *A::link_mut(&mut arena[key]) = TreeLink::default();
        self.len -= 1;
    }

    #[must_use]
    pub fn find(&self, arena: &Slab<A::Node>, needle: &A::Key) -> Option<SlotKey> {
        let mut cursor = self.root;
        while let Some(current) = cursor {
            match needle.cmp(&A::key(&arena[current])) {
                Ordering::Less => cursor = Self::links(arena, current).left,
                Ordering::Greater => cursor = Self::links(arena, current).right,
                Ordering::Equal => return Some(current),
            }
        }
        None
    }

    /// First node whose key is ≥ `needle`.
    #[must_use]
    pub fn find_lower(&self, arena: &Slab<A::Node>, needle: &A::Key) -> Option<SlotKey> {
        let mut best = None;
        let mut cursor = self.root;
        while let Some(current) = cursor {
            if A::key(&arena[current]).cmp(needle) == Ordering::Less {
                cursor = Self::links(arena, current).right;
            } else {
                best = Some(current);
                cursor = Self::links(arena, current).left;
            }
        }
        best
    }

    /// First node whose key is > `needle`.
    #[must_use]
    pub fn find_upper(&self, arena: &Slab<A::Node>, needle: &A::Key) -> Option<SlotKey> {
        let mut best = None;
        let mut cursor = self.root;
        while let Some(current) = cursor {
            if A::key(&arena[current]).cmp(needle) == Ordering::Greater {
                best = Some(current);
                cursor = Self::links(arena, current).left;
            } else {
                cursor = Self::links(arena, current).right;
            }
        }
        best
    }

    #[must_use]
    pub fn first(&self, arena: &Slab<A::Node>) -> Option<SlotKey> {
        self.root.map(|root| Self::minimum(arena, root))
    }

    #[must_use]
    pub fn last(&self, arena: &Slab<A::Node>) -> Option<SlotKey> {
        self.root.map(|root| Self::maximum(arena, root))
    }

    #[must_use]
    pub fn next(&self, arena: &Slab<A::Node>, key: SlotKey) -> Option<SlotKey> {
        if let Some(right) = Self::links(arena, key).right {
            return Some(Self::minimum(arena, right));
        }
        let mut child = key;
        let mut parent = Self::links(arena, child).parent;
        while let Some(p) = parent {
            if Self::links(arena, p).left == Some(child) {
                return Some(p);
            }
            child = p;
            parent = Self::links(arena, p).parent;
        }
        None
    }

    #[must_use]
    pub fn prev(&self, arena: &Slab<A::Node>, key: SlotKey) -> Option<SlotKey> {
        if let Some(left) = Self::links(arena, key).left {
            return Some(Self::maximum(arena, left));
        }
        let mut child = key;
        let mut parent = Self::links(arena, child).parent;
        while let Some(p) = parent {
            if Self::links(arena, p).right == Some(child) {
                return Some(p);
            }
            child = p;
            parent = Self::links(arena, p).parent;
        }
        None
    }

    fn links(arena: &Slab<A::Node>, key: SlotKey) -> &TreeLink { A::link(&arena[key]) }

    fn set_parent(arena: &mut Slab<A::Node>, key: SlotKey, parent: Option<SlotKey>) {
        A::link_mut(&mut arena[key]).parent = parent;
    }

    fn set_left(arena: &mut Slab<A::Node>, key: SlotKey, left: Option<SlotKey>) {
        A::link_mut(&mut arena[key]).left = left;
    }

    fn set_right(arena: &mut Slab<A::Node>, key: SlotKey, right: Option<SlotKey>) {
        A::link_mut(&mut arena[key]).right = right;
    }

    fn set_red(arena: &mut Slab<A::Node>, key: SlotKey, red: bool) {
        A::link_mut(&mut arena[key]).red = red;
    }

    fn is_red(arena: &Slab<A::Node>, key: Option<SlotKey>) -> bool {
        key.is_some_and(|k| Self::links(arena, k).red)
    }

    fn minimum(arena: &Slab<A::Node>, mut key: SlotKey) -> SlotKey {
        while let Some(left) = Self::links(arena, key).left {
            key = left;
        }
        key
    }

    fn maximum(arena: &Slab<A::Node>, mut key: SlotKey) -> SlotKey {
        while let Some(right) = Self::links(arena, key).right {
            key = right;
        }
        key
    }

    fn rotate_left(&mut self, arena: &mut Slab<A::Node>, x: SlotKey) {
        let y = Self::links(arena, x)
            .right
            .expect("rotate_left requires a right child");
        let y_left = Self::links(arena, y).left;
        Self::set_right(arena, x, y_left);
        if let Some(child) = y_left {
            Self::set_parent(arena, child, Some(x));
        }
        let x_parent = Self::links(arena, x).parent;
        Self::set_parent(arena, y, x_parent);
        match x_parent {
            None => self.root = Some(y),
            Some(p) if Self::links(arena, p).left == Some(x) => {
                Self::set_left(arena, p, Some(y));
            }
            Some(p) => Self::set_right(arena, p, Some(y)),
        }
        Self::set_left(arena, y, Some(x));
        Self::set_parent(arena, x, Some(y));
    }

    fn rotate_right(&mut self, arena: &mut Slab<A::Node>, x: SlotKey) {
        let y = Self::links(arena, x)
            .left
            .expect("rotate_right requires a left child");
        let y_right = Self::links(arena, y).right;
        Self::set_left(arena, x, y_right);
        if let Some(child) = y_right {
            Self::set_parent(arena, child, Some(x));
        }
        let x_parent = Self::links(arena, x).parent;
        Self::set_parent(arena, y, x_parent);
        match x_parent {
            None => self.root = Some(y),
            Some(p) if Self::links(arena, p).left == Some(x) => {
                Self::set_left(arena, p, Some(y));
            }
            Some(p) => Self::set_right(arena, p, Some(y)),
        }
        Self::set_right(arena, y, Some(x));
        Self::set_parent(arena, x, Some(y));
    }

    fn insert_fixup(&mut self, arena: &mut Slab<A::Node>, mut z: SlotKey) {
        loop {
            let parent = match Self::links(arena, z).parent {
                Some(p) if Self::links(arena, p).red => p,
                _ => break,
            };
            let grandparent = Self::links(arena, parent)
                .parent
                .expect("a red node always has a parent");

            if Self::links(arena, grandparent).left == Some(parent) {
                let uncle = Self::links(arena, grandparent).right;
                if Self::is_red(arena, uncle) {
                    Self::set_red(arena, parent, false);
                    Self::set_red(arena, uncle.expect("red uncle exists"), false);
                    Self::set_red(arena, grandparent, true);
                    z = grandparent;
                } else {
                    if Self::links(arena, parent).right == Some(z) {
                        z = parent;
                        self.rotate_left(arena, z);
                    }
                    let parent = Self::links(arena, z).parent.expect("rotated child has a parent");
                    let grandparent = Self::links(arena, parent)
                        .parent
                        .expect("red node has a grandparent");
                    Self::set_red(arena, parent, false);
                    Self::set_red(arena, grandparent, true);
                    self.rotate_right(arena, grandparent);
                }
            } else {
                let uncle = Self::links(arena, grandparent).left;
                if Self::is_red(arena, uncle) {
                    Self::set_red(arena, parent, false);
                    Self::set_red(arena, uncle.expect("red uncle exists"), false);
                    Self::set_red(arena, grandparent, true);
                    z = grandparent;
                } else {
                    if Self::links(arena, parent).left == Some(z) {
                        z = parent;
                        self.rotate_right(arena, z);
                    }
                    let parent = Self::links(arena, z).parent.expect("rotated child has a parent");
                    let grandparent = Self::links(arena, parent)
                        .parent
                        .expect("red node has a grandparent");
                    Self::set_red(arena, parent, false);
                    Self::set_red(arena, grandparent, true);
                    self.rotate_left(arena, grandparent);
                }
            }
        }
        if let Some(root) = self.root {
            Self::set_red(arena, root, false);
        }
    }

    /// Replace the subtree rooted at `u` with the subtree rooted at `v`.
    fn transplant(&mut self, arena: &mut Slab<A::Node>, u: SlotKey, v: Option<SlotKey>) {
        let u_parent = Self::links(arena, u).parent;
        match u_parent {
            None => self.root = v,
            Some(p) if Self::links(arena, p).left == Some(u) => Self::set_left(arena, p, v),
            Some(p) => Self::set_right(arena, p, v),
        }
        if let Some(v) = v {
            Self::set_parent(arena, v, u_parent);
        }
    }

    fn erase_fixup(
        &mut self,
        arena: &mut Slab<A::Node>,
        mut x: Option<SlotKey>,
        mut x_parent: Option<SlotKey>,
    ) {
        while x != self.root && !Self::is_red(arena, x) {
            let Some(parent) = x_parent else { break };
            if Self::links(arena, parent).left == x {
                let Some(mut sibling) = Self::links(arena, parent).right else {
                    break;
                };
                if Self::links(arena, sibling).red {
                    Self::set_red(arena, sibling, false);
                    Self::set_red(arena, parent, true);
                    self.rotate_left(arena, parent);
                    sibling = Self::links(arena, parent)
                        .right
                        .expect("sibling exists after rotation");
                }
                let near = Self::links(arena, sibling).left;
                let far = Self::links(arena, sibling).right;
                if !Self::is_red(arena, near) && !Self::is_red(arena, far) {
                    Self::set_red(arena, sibling, true);
                    x = Some(parent);
                    x_parent = Self::links(arena, parent).parent;
                } else {
                    if !Self::is_red(arena, far) {
                        if let Some(near) = near {
                            Self::set_red(arena, near, false);
                        }
                        Self::set_red(arena, sibling, true);
                        self.rotate_right(arena, sibling);
                        sibling = Self::links(arena, parent)
                            .right
                            .expect("sibling exists after rotation");
                    }
                    let parent_red = Self::links(arena, parent).red;
                    Self::set_red(arena, sibling, parent_red);
                    Self::set_red(arena, parent, false);
                    if let Some(far) = Self::links(arena, sibling).right {
                        Self::set_red(arena, far, false);
                    }
                    self.rotate_left(arena, parent);
                    x = self.root;
                    x_parent = None;
                }
            } else {
                let Some(mut sibling) = Self::links(arena, parent).left else {
                    break;
                };
                if Self::links(arena, sibling).red {
                    Self::set_red(arena, sibling, false);
                    Self::set_red(arena, parent, true);
                    self.rotate_right(arena, parent);
                    sibling = Self::links(arena, parent)
                        .left
                        .expect("sibling exists after rotation");
                }
                let near = Self::links(arena, sibling).right;
                let far = Self::links(arena, sibling).left;
                if !Self::is_red(arena, near) && !Self::is_red(arena, far) {
                    Self::set_red(arena, sibling, true);
                    x = Some(parent);
                    x_parent = Self::links(arena, parent).parent;
                } else {
                    if !Self::is_red(arena, far) {
                        if let Some(near) = near {
                            Self::set_red(arena, near, false);
                        }
                        Self::set_red(arena, sibling, true);
                        self.rotate_left(arena, sibling);
                        sibling = Self::links(arena, parent)
                            .left
                            .expect("sibling exists after rotation");
                    }
                    let parent_red = Self::links(arena, parent).red;
                    Self::set_red(arena, sibling, parent_red);
                    Self::set_red(arena, parent, false);
                    if let Some(far) = Self::links(arena, sibling).left {
                        Self::set_red(arena, far, false);
                    }
                    self.rotate_right(arena, parent);
                    x = self.root;
                    x_parent = None;
                }
            }
        }
        if let Some(x) = x {
            Self::set_red(arena, x, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::seq::SliceRandom;

    #[derive(Debug)]
    struct TestNode {
        id: u64,
        link: TreeLink,
    }

    #[derive(Debug)]
    struct TestAdapter;

    impl TreeAdapter for TestAdapter {
        type Node = TestNode;
        type Key = u64;
        fn key(node: &TestNode) -> u64 { node.id }
        fn link(node: &TestNode) -> &TreeLink { &node.link }
        fn link_mut(node: &mut TestNode) -> &mut TreeLink { &mut node.link }
    }

    type Tree = SlotTree<TestAdapter>;

    fn node(arena: &mut Slab<TestNode>, id: u64) -> SlotKey {
        arena.insert(TestNode {
            id,
            link: TreeLink::default(),
        })
    }

    fn in_order(tree: &Tree, arena: &Slab<TestNode>) -> Vec<u64> {
        let mut out = vec![];
        let mut cursor = tree.first(arena);
        while let Some(key) = cursor {
            out.push(arena[key].id);
            cursor = tree.next(arena, key);
        }
        out
    }

    /// Walks the whole tree checking the red-black invariants: root is black, no red
    /// node has a red child, and every root-to-nil path has the same black height.
    /// Returns the black height of the checked subtree.
    fn assert_valid_from(arena: &Slab<TestNode>, key: Option<SlotKey>) -> usize {
        let Some(key) = key else { return 1 };
        let link = *TestAdapter::link(&arena[key]);
        if link.red {
            assert!(
                !Tree::is_red(arena, link.left) && !Tree::is_red(arena, link.right),
                "red node {key} has a red child"
            );
        }
        if let Some(left) = link.left {
            assert_eq!(TestAdapter::link(&arena[left]).parent, Some(key));
            assert!(arena[left].id < arena[key].id);
        }
        if let Some(right) = link.right {
            assert_eq!(TestAdapter::link(&arena[right]).parent, Some(key));
            assert!(arena[right].id > arena[key].id);
        }
        let left_height = assert_valid_from(arena, link.left);
        let right_height = assert_valid_from(arena, link.right);
        assert_eq!(left_height, right_height, "unbalanced at {key}");
        left_height + usize::from(!link.red)
    }

    fn assert_valid(tree: &Tree, arena: &Slab<TestNode>) {
        if let Some(root) = tree.root {
            assert!(!TestAdapter::link(&arena[root]).red, "root must be black");
            assert_eq!(TestAdapter::link(&arena[root]).parent, None);
        }
        let _black_height = assert_valid_from(arena, tree.root);
    }

    #[test]
    fn insert_iterates_in_key_order() {
        let mut arena = Slab::new();
        let mut tree = Tree::new();
        for id in [5_u64, 1, 9, 3, 7, 2, 8] {
            let k = node(&mut arena, id);
            tree.insert(&mut arena, k).unwrap();
            assert_valid(&tree, &arena);
        }
        assert_eq!(in_order(&tree, &arena), vec![1, 2, 3, 5, 7, 8, 9]);
        assert_eq!(tree.len(), 7);
    }

    #[test]
    fn insert_collision_returns_existing_and_does_not_mutate() {
        let mut arena = Slab::new();
        let mut tree = Tree::new();
        let first = node(&mut arena, 42);
        tree.insert(&mut arena, first).unwrap();

        let duplicate = node(&mut arena, 42);
        assert_eq!(tree.insert(&mut arena, duplicate), Err(first));
        assert_eq!(tree.len(), 1);
        assert_eq!(*TestAdapter::link(&arena[duplicate]), TreeLink::default());
    }

    #[test]
    fn replace_swaps_equal_key_in_place() {
        let mut arena = Slab::new();
        let mut tree = Tree::new();
        for id in [10_u64, 5, 15, 3, 7] {
            let k = node(&mut arena, id);
            tree.insert(&mut arena, k).unwrap();
        }
        let old = tree.find(&arena, &5).unwrap();
        let new = node(&mut arena, 5);

        assert_eq!(tree.replace(&mut arena, new), Some(old));
        assert_eq!(tree.find(&arena, &5), Some(new));
        assert_eq!(tree.len(), 5);
        assert_valid(&tree, &arena);
        assert_eq!(in_order(&tree, &arena), vec![3, 5, 7, 10, 15]);
    }

    #[test]
    fn replace_without_collision_inserts() {
        let mut arena = Slab::new();
        let mut tree = Tree::new();
        let k = node(&mut arena, 1);
        assert_eq!(tree.replace(&mut arena, k), None);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.find(&arena, &1), Some(k));
    }

    #[test]
    fn find_lower_and_upper_bounds() {
        let mut arena = Slab::new();
        let mut tree = Tree::new();
        for id in [10_u64, 20, 30] {
            let k = node(&mut arena, id);
            tree.insert(&mut arena, k).unwrap();
        }

        let key_of = |k: Option<SlotKey>| k.map(|k| arena[k].id);
        assert_eq!(key_of(tree.find_lower(&arena, &10)), Some(10));
        assert_eq!(key_of(tree.find_lower(&arena, &15)), Some(20));
        assert_eq!(key_of(tree.find_lower(&arena, &31)), None);
        assert_eq!(key_of(tree.find_upper(&arena, &10)), Some(20));
        assert_eq!(key_of(tree.find_upper(&arena, &30)), None);
        assert_eq!(key_of(tree.find_upper(&arena, &5)), Some(10));
    }

    #[test]
    fn prev_walks_in_reverse_order() {
        let mut arena = Slab::new();
        let mut tree = Tree::new();
        for id in [4_u64, 2, 6, 1, 3, 5, 7] {
            let k = node(&mut arena, id);
            tree.insert(&mut arena, k).unwrap();
        }
        let mut out = vec![];
        let mut cursor = tree.last(&arena);
        while let Some(key) = cursor {
            out.push(arena[key].id);
            cursor = tree.prev(&arena, key);
        }
        assert_eq!(out, vec![7, 6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn erase_keeps_tree_balanced_and_ordered() {
        let mut arena = Slab::new();
        let mut tree = Tree::new();
        let keys: Vec<_> = (0..64_u64)
            .map(|id| {
                let k = node(&mut arena, id);
                tree.insert(&mut arena, k).unwrap();
                k
            })
            .collect();

        // Remove evens; odds must survive in order.
        for (id, key) in keys.iter().enumerate() {
            if id % 2 == 0 {
                tree.erase(&mut arena, *key);
                assert_valid(&tree, &arena);
            }
        }
        let expected: Vec<u64> = (0..64).filter(|id| id % 2 == 1).collect();
        assert_eq!(in_order(&tree, &arena), expected);
        assert_eq!(tree.len(), 32);
    }

    #[test]
    fn randomized_insert_erase_shaker() {
        let mut rng = rand::rng();
        let mut arena = Slab::new();
        let mut tree = Tree::new();

        let mut ids: Vec<u64> = (0..256).collect();
        ids.shuffle(&mut rng);
        let mut keys = std::collections::HashMap::new();
        for id in &ids {
            let k = node(&mut arena, *id);
            tree.insert(&mut arena, k).unwrap();
            keys.insert(*id, k);
        }
        assert_valid(&tree, &arena);

        ids.shuffle(&mut rng);
        for (round, id) in ids.iter().enumerate() {
            tree.erase(&mut arena, keys[id]);
            arena.remove(keys[id]);
            if round % 32 == 0 {
                assert_valid(&tree, &arena);
            }
        }
        assert!(tree.is_empty());
        assert_eq!(tree.first(&arena), None);
    }
}
