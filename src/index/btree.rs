//! In-memory B-tree
//!
//! A classic B-tree of order `m` (maximum number of children per node):
//! - every node holds at most `m - 1` keys
//! - every non-root node holds at least `ceil(m / 2) - 1` keys
//! - all leaves sit at the same depth
//!
//! Inserts split overflowing nodes bottom-up; deletes repair underflowing
//! nodes by borrowing from a sibling or merging with it.

use std::mem;

use super::{IndexError, IndexResult, KeyValue, OrderedIndex};

/// Smallest order that still yields a valid B-tree
pub const MIN_ORDER: usize = 3;

/// A node; leaves have no children
#[derive(Debug, Default)]
struct Node {
    keys: Vec<String>,
    values: Vec<String>,
    children: Vec<Node>,
}

impl Node {
    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    fn search(&self, key: &str) -> Result<usize, usize> {
        self.keys.binary_search_by(|k| k.as_str().cmp(key))
    }

    /// Split an overflowing node around its median
    ///
    /// Returns the median entry and the new right sibling.
    fn split(&mut self) -> (String, String, Node) {
        let mid = self.keys.len() / 2;

        let right_keys = self.keys.split_off(mid + 1);
        let right_values = self.values.split_off(mid + 1);
        let right_children = if self.is_leaf() {
            Vec::new()
        } else {
            self.children.split_off(mid + 1)
        };

        // mid < len, so both pops hit the median
        let median_key = self.keys.pop().unwrap_or_default();
        let median_value = self.values.pop().unwrap_or_default();

        let right = Node {
            keys: right_keys,
            values: right_values,
            children: right_children,
        };

        (median_key, median_value, right)
    }
}

/// Outcome of a recursive insert
enum Insert {
    /// New key placed, no structural change above this node
    Added,
    /// Existing key overwritten; carries the previous value
    Replaced(String),
    /// New key placed and the node split; the parent must adopt the median
    Split(String, String, Node),
}

/// B-tree keyed and valued by strings
#[derive(Debug)]
pub struct BTree {
    order: usize,
    root: Node,
    len: usize,
}

impl BTree {
    /// Create an empty tree of the given order
    pub fn new(order: usize) -> IndexResult<Self> {
        if order < MIN_ORDER {
            return Err(IndexError::InvalidOrder(order));
        }
        Ok(Self {
            order,
            root: Node::default(),
            len: 0,
        })
    }

    fn max_keys(&self) -> usize {
        self.order - 1
    }

    fn min_keys(&self) -> usize {
        self.order.div_ceil(2) - 1
    }

    /// Look up a key
    pub fn get(&self, key: &str) -> Option<&str> {
        let mut node = &self.root;
        loop {
            match node.search(key) {
                Ok(i) => return Some(node.values[i].as_str()),
                Err(i) => {
                    if node.is_leaf() {
                        return None;
                    }
                    node = &node.children[i];
                }
            }
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert or overwrite a key, returning the previous value
    pub fn put(&mut self, key: String, value: String) -> Option<String> {
        let max = self.max_keys();
        match Self::insert_into(&mut self.root, key, value, max) {
            Insert::Replaced(old) => Some(old),
            Insert::Added => {
                self.len += 1;
                None
            }
            Insert::Split(key, value, right) => {
                // Tree grows by one level
                let left = mem::take(&mut self.root);
                self.root = Node {
                    keys: vec![key],
                    values: vec![value],
                    children: vec![left, right],
                };
                self.len += 1;
                None
            }
        }
    }

    fn insert_into(node: &mut Node, key: String, value: String, max: usize) -> Insert {
        let idx = match node.search(&key) {
            Ok(i) => return Insert::Replaced(mem::replace(&mut node.values[i], value)),
            Err(i) => i,
        };

        if node.is_leaf() {
            node.keys.insert(idx, key);
            node.values.insert(idx, value);
        } else {
            match Self::insert_into(&mut node.children[idx], key, value, max) {
                Insert::Split(median_key, median_value, right) => {
                    node.keys.insert(idx, median_key);
                    node.values.insert(idx, median_value);
                    node.children.insert(idx + 1, right);
                }
                other => return other,
            }
        }

        if node.keys.len() > max {
            let (key, value, right) = node.split();
            Insert::Split(key, value, right)
        } else {
            Insert::Added
        }
    }

    /// Overwrite an existing key; false if absent
    pub fn replace(&mut self, key: &str, value: String) -> bool {
        let mut node = &mut self.root;
        loop {
            match node.search(key) {
                Ok(i) => {
                    node.values[i] = value;
                    return true;
                }
                Err(i) => {
                    if node.is_leaf() {
                        return false;
                    }
                    node = &mut node.children[i];
                }
            }
        }
    }

    /// Remove a key, returning its value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let min = self.min_keys();
        let removed = Self::remove_from(&mut self.root, key, min);

        if removed.is_some() {
            self.len -= 1;
            // Tree shrinks by one level once the root runs dry
            if self.root.keys.is_empty() && !self.root.is_leaf() {
                if let Some(child) = self.root.children.pop() {
                    self.root = child;
                }
            }
        }

        removed
    }

    fn remove_from(node: &mut Node, key: &str, min: usize) -> Option<String> {
        match node.search(key) {
            Ok(i) if node.is_leaf() => {
                node.keys.remove(i);
                Some(node.values.remove(i))
            }
            Ok(i) => {
                // Swap in the in-order predecessor, then repair the left subtree
                let (pred_key, pred_value) = Self::remove_max(&mut node.children[i], min)?;
                node.keys[i] = pred_key;
                let old = mem::replace(&mut node.values[i], pred_value);
                if node.children[i].keys.len() < min {
                    Self::rebalance(node, i, min);
                }
                Some(old)
            }
            Err(_) if node.is_leaf() => None,
            Err(i) => {
                let removed = Self::remove_from(&mut node.children[i], key, min);
                if removed.is_some() && node.children[i].keys.len() < min {
                    Self::rebalance(node, i, min);
                }
                removed
            }
        }
    }

    /// Remove and return the largest entry of a subtree
    fn remove_max(node: &mut Node, min: usize) -> Option<(String, String)> {
        if node.is_leaf() {
            let key = node.keys.pop()?;
            let value = node.values.pop()?;
            return Some((key, value));
        }

        let last = node.children.len() - 1;
        let entry = Self::remove_max(&mut node.children[last], min);
        if node.children[last].keys.len() < min {
            Self::rebalance(node, last, min);
        }
        entry
    }

    /// Repair `parent.children[i]` after it dropped below `min` keys
    fn rebalance(parent: &mut Node, i: usize, min: usize) {
        // Borrow from the left sibling
        if i > 0 && parent.children[i - 1].keys.len() > min {
            let (head, tail) = parent.children.split_at_mut(i);
            let left = &mut head[i - 1];
            let child = &mut tail[0];

            if let (Some(k), Some(v)) = (left.keys.pop(), left.values.pop()) {
                let sep_key = mem::replace(&mut parent.keys[i - 1], k);
                let sep_value = mem::replace(&mut parent.values[i - 1], v);
                child.keys.insert(0, sep_key);
                child.values.insert(0, sep_value);
                if let Some(grandchild) = left.children.pop() {
                    child.children.insert(0, grandchild);
                }
            }
            return;
        }

        // Borrow from the right sibling
        if i + 1 < parent.children.len() && parent.children[i + 1].keys.len() > min {
            let (head, tail) = parent.children.split_at_mut(i + 1);
            let child = &mut head[i];
            let right = &mut tail[0];

            let k = right.keys.remove(0);
            let v = right.values.remove(0);
            let sep_key = mem::replace(&mut parent.keys[i], k);
            let sep_value = mem::replace(&mut parent.values[i], v);
            child.keys.push(sep_key);
            child.values.push(sep_value);
            if !right.is_leaf() {
                child.children.push(right.children.remove(0));
            }
            return;
        }

        // Neither sibling can spare a key: merge
        if i > 0 {
            Self::merge(parent, i - 1);
        } else if parent.children.len() > 1 {
            Self::merge(parent, i);
        }
    }

    /// Fold `children[j + 1]` and separator `j` into `children[j]`
    fn merge(parent: &mut Node, j: usize) {
        let right = parent.children.remove(j + 1);
        let sep_key = parent.keys.remove(j);
        let sep_value = parent.values.remove(j);

        let left = &mut parent.children[j];
        left.keys.push(sep_key);
        left.values.push(sep_value);
        left.keys.extend(right.keys);
        left.values.extend(right.values);
        left.children.extend(right.children);
    }

    /// Iterate entries in ascending key order
    pub fn iter(&self) -> Iter<'_> {
        let mut iter = Iter { stack: Vec::new() };
        if !self.root.keys.is_empty() {
            iter.descend(&self.root);
        }
        iter
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.root = Node::default();
        self.len = 0;
    }

    /// Number of levels (1 for a lone root)
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut node = &self.root;
        while let Some(child) = node.children.first() {
            depth += 1;
            node = child;
        }
        depth
    }

    /// Check every structural invariant of the tree
    pub fn validate(&self) -> IndexResult<()> {
        let mut leaf_depth = None;
        let counted = self.validate_node(&self.root, None, None, 1, true, &mut leaf_depth)?;
        if counted != self.len {
            return Err(IndexError::Structure(format!(
                "length {} but {} keys reachable",
                self.len, counted
            )));
        }
        Ok(())
    }

    fn validate_node(
        &self,
        node: &Node,
        lower: Option<&str>,
        upper: Option<&str>,
        depth: usize,
        is_root: bool,
        leaf_depth: &mut Option<usize>,
    ) -> IndexResult<usize> {
        let violation = |msg: String| Err(IndexError::Structure(msg));

        if node.keys.len() != node.values.len() {
            return violation(format!(
                "{} keys but {} values",
                node.keys.len(),
                node.values.len()
            ));
        }
        if node.keys.len() > self.max_keys() {
            return violation(format!("node holds {} keys", node.keys.len()));
        }
        if !is_root && node.keys.len() < self.min_keys() {
            return violation(format!("non-root node holds {} keys", node.keys.len()));
        }
        if node.keys.windows(2).any(|w| w[0] >= w[1]) {
            return violation("keys out of order within a node".to_string());
        }
        if let (Some(lo), Some(first)) = (lower, node.keys.first()) {
            if first.as_str() <= lo {
                return violation(format!("key '{}' not above bound '{}'", first, lo));
            }
        }
        if let (Some(hi), Some(last)) = (upper, node.keys.last()) {
            if last.as_str() >= hi {
                return violation(format!("key '{}' not below bound '{}'", last, hi));
            }
        }

        if node.is_leaf() {
            match *leaf_depth {
                Some(d) if d != depth => {
                    return violation(format!("leaves at depths {} and {}", d, depth));
                }
                _ => *leaf_depth = Some(depth),
            }
            return Ok(node.keys.len());
        }

        if node.children.len() != node.keys.len() + 1 {
            return violation(format!(
                "{} keys but {} children",
                node.keys.len(),
                node.children.len()
            ));
        }

        let mut count = node.keys.len();
        for (i, child) in node.children.iter().enumerate() {
            let lo = if i == 0 { lower } else { Some(node.keys[i - 1].as_str()) };
            let hi = node.keys.get(i).map(String::as_str).or(upper);
            count += self.validate_node(child, lo, hi, depth + 1, false, leaf_depth)?;
        }
        Ok(count)
    }
}

impl OrderedIndex for BTree {
    fn order(&self) -> usize {
        self.order
    }

    fn insert(&mut self, key: &str, value: &str) -> IndexResult<()> {
        self.put(key.to_string(), value.to_string());
        Ok(())
    }

    fn find(&self, key: &str) -> IndexResult<Option<String>> {
        Ok(self.get(key).map(str::to_string))
    }

    fn update(&mut self, key: &str, value: &str) -> IndexResult<bool> {
        Ok(self.replace(key, value.to_string()))
    }

    fn delete(&mut self, key: &str) -> IndexResult<bool> {
        Ok(self.remove(key).is_some())
    }

    fn find_all(&self) -> IndexResult<Vec<KeyValue>> {
        Ok(self.iter().map(|(k, v)| KeyValue::new(k, v)).collect())
    }

    fn len(&self) -> usize {
        self.len
    }
}

/// In-order iterator over a [`BTree`]
pub struct Iter<'a> {
    /// Nodes on the current root-to-leaf path with the next key index to emit
    stack: Vec<(&'a Node, usize)>,
}

impl<'a> Iter<'a> {
    fn descend(&mut self, mut node: &'a Node) {
        loop {
            self.stack.push((node, 0));
            match node.children.first() {
                Some(child) => node = child,
                None => break,
            }
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (node, idx) = self.stack.pop()?;
            if idx < node.keys.len() {
                self.stack.push((node, idx + 1));
                if !node.is_leaf() {
                    self.descend(&node.children[idx + 1]);
                }
                return Some((node.keys[idx].as_str(), node.values[idx].as_str()));
            }
        }
    }
}
