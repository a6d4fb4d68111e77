//! The resource-hierarchy trie and its derived views.
//!
//! A [`PolicyTrie`] mirrors the shape of the resources a policy mentions: the
//! first level holds resource types, deeper levels hold JSON pointer segments.
//! Each node carries a [`GrantRevokeIndex`]. The raw trie built from a policy
//! only holds the facts stated at each node; the derived tries push those facts
//! down (inheritance) or up (aggregation) so that queries can be answered by
//! looking at a single node.

use crate::index::GrantRevokeIndex;
use crate::policy::Policy;
use crate::subjects::PermissionSubjectsMap;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// An immutable node of the resource trie. Children are owned exclusively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyTrie {
    index: GrantRevokeIndex,
    children: BTreeMap<String, PolicyTrie>,
}

/// Accumulates policy facts into a trie; consumed by [`PolicyTrieBuilder::build`].
#[derive(Debug, Default)]
pub struct PolicyTrieBuilder {
    root: PolicyTrie,
}

impl PolicyTrieBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `subject_ids` are granted `grant` and revoked `revoke` at `path`.
    ///
    /// Missing nodes along `path` are created.
    pub fn record<'a, I>(
        &mut self,
        path: I,
        subject_ids: &BTreeSet<String>,
        grant: impl IntoIterator<Item = &'a String>,
        revoke: impl IntoIterator<Item = &'a String>,
    ) -> &mut Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.root
            .seek_or_create(path)
            .index
            .grant(grant, subject_ids)
            .revoke(revoke, subject_ids);
        self
    }

    pub fn build(self) -> PolicyTrie {
        self.root
    }
}

impl PolicyTrie {
    /// Builds the raw trie of a policy: one node per mentioned resource, each
    /// holding the weight-0 facts of the entries naming it.
    pub fn from_policy(policy: &Policy) -> Self {
        let mut builder = PolicyTrieBuilder::new();
        for entry in policy.entries() {
            for resource in entry.resources() {
                builder.record(
                    resource.key.segments(),
                    entry.subject_ids(),
                    &resource.grant,
                    &resource.revoke,
                );
            }
        }
        builder.build()
    }

    fn seek_or_create<I>(&mut self, path: I) -> &mut PolicyTrie
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut node = self;
        for segment in path {
            node = node
                .children
                .entry(segment.as_ref().to_string())
                .or_default();
        }
        node
    }

    pub fn grant_revoke_index(&self) -> &GrantRevokeIndex {
        &self.index
    }

    pub fn children(&self) -> &BTreeMap<String, PolicyTrie> {
        &self.children
    }

    pub fn has_child(&self, key: &str) -> bool {
        self.children.contains_key(key)
    }

    /// Deepest existing node along `path` and the number of segments consumed.
    pub fn seek_to_least_ancestor_with_depth<I>(&self, path: I) -> (&PolicyTrie, usize)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut node = self;
        let mut depth = 0;
        for segment in path {
            match node.children.get(segment.as_ref()) {
                Some(child) => {
                    node = child;
                    depth += 1;
                }
                None => break,
            }
        }
        (node, depth)
    }

    /// Deepest existing node along `path`; the root when nothing matches.
    pub fn seek_to_least_ancestor<I>(&self, path: I) -> &PolicyTrie
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.seek_to_least_ancestor_with_depth(path).0
    }

    /// The node at exactly `path`, if every segment exists.
    pub fn seek_to_exact_node<I>(&self, path: I) -> Option<&PolicyTrie>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        path.into_iter()
            .try_fold(self, |node, segment| node.children.get(segment.as_ref()))
    }

    /// Number of nodes in the trie, root included.
    pub fn node_count(&self) -> usize {
        1 + self.children.values().map(PolicyTrie::node_count).sum::<usize>()
    }

    /// Pushes every node's facts down to its descendants.
    ///
    /// Each level down decrements inherited weights by one, and each node's
    /// own facts override what it inherits. The result has the same shape.
    pub fn transitive_closure(&self) -> PolicyTrie {
        self.close_under(&GrantRevokeIndex::new())
    }

    fn close_under(&self, inherited: &GrantRevokeIndex) -> PolicyTrie {
        let mut effective = inherited.copy_with_decremented_weight();
        effective.override_by(&self.index);
        debug_assert!(effective.is_exclusive());

        let children = self
            .children
            .iter()
            .map(|(key, child)| (key.clone(), child.close_under(&effective)))
            .collect();
        PolicyTrie {
            index: effective,
            children,
        }
    }

    /// Aggregates descendant grants upwards, one weight step per level.
    ///
    /// Revokes stated at a node are dropped for the pairs that some descendant
    /// (or the node itself) grants, so a node is partially accessible when any
    /// descendant is.
    pub fn bottom_up_grant_trie(&self) -> PolicyTrie {
        let children: BTreeMap<String, PolicyTrie> = self
            .children
            .iter()
            .map(|(key, child)| (key.clone(), child.bottom_up_grant_trie()))
            .collect();

        let grants = aggregate(self.index.grants(), children.values(), |child| {
            child.index.grants()
        });
        let mut revokes = self.index.revokes().clone();
        revokes.remove_all_entries_from(&grants);

        PolicyTrie {
            index: GrantRevokeIndex::from_parts(grants, revokes),
            children,
        }
    }

    /// Aggregates descendant revokes upwards, one weight step per level.
    ///
    /// Grants are kept as they are, so a revoke anywhere below a node counts
    /// against unrestricted access to that node.
    pub fn bottom_up_revoke_trie(&self) -> PolicyTrie {
        let children: BTreeMap<String, PolicyTrie> = self
            .children
            .iter()
            .map(|(key, child)| (key.clone(), child.bottom_up_revoke_trie()))
            .collect();

        let revokes = aggregate(self.index.revokes(), children.values(), |child| {
            child.index.revokes()
        });

        PolicyTrie {
            index: GrantRevokeIndex::from_parts(self.index.grants().clone(), revokes),
            children,
        }
    }

    /// Rebuilds `fields` keeping only what `subject_ids` may see with `permissions`.
    ///
    /// Fields without a matching child node are judged by this node's index.
    /// Objects and arrays survive when something inside them is visible or
    /// when they are visible themselves, in which case they may be empty.
    pub fn build_json_view<'a, P>(
        &self,
        fields: &Map<String, Value>,
        subject_ids: &BTreeSet<String>,
        permissions: P,
    ) -> Map<String, Value>
    where
        P: IntoIterator<Item = &'a String> + Clone,
    {
        ViewNode::of(self).view_of_fields(fields, subject_ids, permissions)
    }
}

fn aggregate<'a, F>(
    own: &PermissionSubjectsMap,
    children: impl Iterator<Item = &'a PolicyTrie>,
    select: F,
) -> PermissionSubjectsMap
where
    F: Fn(&'a PolicyTrie) -> &'a PermissionSubjectsMap,
{
    let mut merged = own.clone();
    for child in children {
        merged.add_all_entries_from(&select(child).copy_with_incremented_weight());
    }
    merged
}

/// A borrowed trie position used while building views. Fields with no child
/// node reuse the parent's index and have no children of their own.
#[derive(Clone, Copy)]
struct ViewNode<'t> {
    index: &'t GrantRevokeIndex,
    children: Option<&'t BTreeMap<String, PolicyTrie>>,
}

impl<'t> ViewNode<'t> {
    fn of(trie: &'t PolicyTrie) -> Self {
        Self {
            index: &trie.index,
            children: Some(&trie.children),
        }
    }

    fn child(self, key: &str) -> Self {
        match self.children.and_then(|children| children.get(key)) {
            Some(child) => ViewNode::of(child),
            None => Self {
                index: self.index,
                children: None,
            },
        }
    }

    fn view_of_fields<'a, P>(
        self,
        fields: &Map<String, Value>,
        subject_ids: &BTreeSet<String>,
        permissions: P,
    ) -> Map<String, Value>
    where
        P: IntoIterator<Item = &'a String> + Clone,
    {
        fields
            .iter()
            .filter_map(|(key, value)| {
                self.child(key)
                    .view_of_value(value, subject_ids, permissions.clone())
                    .map(|view| (key.clone(), view))
            })
            .collect()
    }

    fn view_of_value<'a, P>(
        self,
        value: &Value,
        subject_ids: &BTreeSet<String>,
        permissions: P,
    ) -> Option<Value>
    where
        P: IntoIterator<Item = &'a String> + Clone,
    {
        let visible = || self.index.has_permissions(subject_ids, permissions.clone());
        match value {
            Value::Object(fields) => {
                let view = self.view_of_fields(fields, subject_ids, permissions.clone());
                (!view.is_empty() || visible()).then_some(Value::Object(view))
            }
            // Array elements are judged by the array's own node.
            Value::Array(elements) => {
                let view: Vec<Value> = elements
                    .iter()
                    .filter_map(|element| {
                        self.view_of_value(element, subject_ids, permissions.clone())
                    })
                    .collect();
                (!view.is_empty() || visible()).then_some(Value::Array(view))
            }
            scalar => visible().then(|| scalar.clone()),
        }
    }
}
