//! The trie-backed [`PolicyEnforcer`].

use crate::evaluation::{AccessEvaluation, Coverage, NodeLookup, PolicyEvalResult, TrieKind};
use crate::index::EffectedSubjectIds;
use crate::policy::{AuthorizationContext, Permissions, Policy, ResourceKey};
use crate::trie::PolicyTrie;
use crate::PolicyEnforcer;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Answers permission queries for one policy using three derived tries.
///
/// All tries are computed once in [`TrieBasedPolicyEnforcer::new`]; afterwards
/// the enforcer is read-only and can be shared between threads, e.g. behind an
/// `Arc`. A changed policy needs a new enforcer.
#[derive(Debug, Clone)]
pub struct TrieBasedPolicyEnforcer {
    inherited_trie: PolicyTrie,
    bottom_up_grant_trie: PolicyTrie,
    bottom_up_revoke_trie: PolicyTrie,
}

/// A node found for a resource key, and where it was found.
struct Located<'t> {
    node: &'t PolicyTrie,
    trie: TrieKind,
    depth: usize,
    exact: bool,
}

impl TrieBasedPolicyEnforcer {
    /// Compiles `policy` into the inherited, bottom-up-grant and bottom-up-revoke tries.
    #[tracing::instrument(skip_all, fields(policy.id = ?policy.id(), entries = policy.entries().len()))]
    pub fn new(policy: &Policy) -> Self {
        let raw = PolicyTrie::from_policy(policy);
        let inherited_trie = raw.transitive_closure();
        let bottom_up_grant_trie = inherited_trie.bottom_up_grant_trie();
        let bottom_up_revoke_trie = inherited_trie.bottom_up_revoke_trie();
        tracing::debug!(nodes = inherited_trie.node_count(), "Built policy tries");

        Self {
            inherited_trie,
            bottom_up_grant_trie,
            bottom_up_revoke_trie,
        }
    }

    pub fn inherited_trie(&self) -> &PolicyTrie {
        &self.inherited_trie
    }

    pub fn bottom_up_grant_trie(&self) -> &PolicyTrie {
        &self.bottom_up_grant_trie
    }

    pub fn bottom_up_revoke_trie(&self) -> &PolicyTrie {
        &self.bottom_up_revoke_trie
    }

    fn trie(&self, kind: TrieKind) -> &PolicyTrie {
        match kind {
            TrieKind::Inherited => &self.inherited_trie,
            TrieKind::BottomUpGrant => &self.bottom_up_grant_trie,
            TrieKind::BottomUpRevoke => &self.bottom_up_revoke_trie,
        }
    }

    /// Exact node of `resource_key` in the `kind` trie, falling back to its
    /// deepest ancestor in the inherited trie.
    ///
    /// Aggregated facts only exist at nodes the policy names; anything below
    /// them is governed by inheritance alone.
    fn seek_with_fallback(&self, resource_key: &ResourceKey, kind: TrieKind) -> Located<'_> {
        let full_depth = resource_key.path().len() + 1;
        if let Some(node) = self.trie(kind).seek_to_exact_node(resource_key.segments()) {
            return Located {
                node,
                trie: kind,
                depth: full_depth,
                exact: true,
            };
        }
        let (node, depth) = self
            .inherited_trie
            .seek_to_least_ancestor_with_depth(resource_key.segments());
        tracing::trace!(
            resource.key = %resource_key,
            depth,
            "No exact node, falling back to inherited ancestor"
        );
        Located {
            node,
            trie: TrieKind::Inherited,
            depth,
            exact: depth == full_depth,
        }
    }

    fn has_permissions_with_coverage(
        &self,
        resource_key: &ResourceKey,
        context: &AuthorizationContext,
        permissions: &Permissions,
        coverage: Coverage,
    ) -> bool {
        self.seek_with_fallback(resource_key, coverage.trie())
            .node
            .grant_revoke_index()
            .has_permissions(context.subject_ids(), permissions)
    }

    /// Checks access like [`PolicyEnforcer::has_unrestricted_permissions`] or
    /// [`PolicyEnforcer::has_partial_permissions`] and explains the outcome.
    #[tracing::instrument(skip_all, fields(resource.key = %resource_key, %coverage))]
    pub fn evaluate_access(
        &self,
        resource_key: &ResourceKey,
        context: &AuthorizationContext,
        permissions: &Permissions,
        coverage: Coverage,
    ) -> AccessEvaluation {
        let located = self.seek_with_fallback(resource_key, coverage.trie());
        let index = located.node.grant_revoke_index();
        let subject_ids = context.subject_ids();
        let lookup = NodeLookup {
            trie: located.trie,
            path: resource_key
                .segments()
                .take(located.depth)
                .map(str::to_string)
                .collect(),
            exact: located.exact,
            grant_weight: index.grant_weight(subject_ids, permissions),
            revoke_weight: index.revoke_weight(subject_ids, permissions),
        };

        let result = PolicyEvalResult::from_lookup(lookup, permissions);
        let lookup = result.lookup();
        let event_outcome = if result.is_granted() {
            "success"
        } else {
            "failure"
        };
        let node_path = lookup.path.join("/");
        let permissions_str = permissions.to_string();
        let reason = result.reason();

        tracing::trace!(
            target: "trie_enforcer::security",
            {
                event.outcome = event_outcome,
                resource.key = %resource_key,
                enforcer.coverage = %coverage,
                enforcer.trie = %lookup.trie,
                enforcer.node = node_path.as_str(),
                enforcer.exact = lookup.exact,
                enforcer.permissions = permissions_str.as_str(),
                grant.weight = lookup.grant_weight,
                revoke.weight = lookup.revoke_weight,
                policy.result.reason = reason.as_deref(),
            },
            "Access evaluated"
        );

        AccessEvaluation::from_result(coverage, result)
    }
}

impl PolicyEnforcer for TrieBasedPolicyEnforcer {
    fn has_unrestricted_permissions(
        &self,
        resource_key: &ResourceKey,
        context: &AuthorizationContext,
        permissions: &Permissions,
    ) -> bool {
        self.has_permissions_with_coverage(
            resource_key,
            context,
            permissions,
            Coverage::Unrestricted,
        )
    }

    fn has_partial_permissions(
        &self,
        resource_key: &ResourceKey,
        context: &AuthorizationContext,
        permissions: &Permissions,
    ) -> bool {
        self.has_permissions_with_coverage(resource_key, context, permissions, Coverage::Partial)
    }

    fn effected_subject_ids(
        &self,
        resource_key: &ResourceKey,
        permissions: &Permissions,
    ) -> EffectedSubjectIds {
        self.inherited_trie
            .seek_to_least_ancestor(resource_key.segments())
            .grant_revoke_index()
            .effected_subject_ids(permissions)
    }

    fn subject_ids_with_partial_permission(
        &self,
        resource_key: &ResourceKey,
        permissions: &Permissions,
    ) -> BTreeSet<String> {
        self.seek_with_fallback(resource_key, TrieKind::BottomUpGrant)
            .node
            .grant_revoke_index()
            .effected_subject_ids(permissions)
            .granted
    }

    fn subject_ids_with_unrestricted_permission(
        &self,
        resource_key: &ResourceKey,
        permissions: &Permissions,
    ) -> BTreeSet<String> {
        let index = self
            .seek_with_fallback(resource_key, TrieKind::BottomUpRevoke)
            .node
            .grant_revoke_index();
        index
            .effected_subject_ids(permissions)
            .granted
            .into_iter()
            .filter(|subject_id| {
                let single = BTreeSet::from([subject_id.clone()]);
                index.has_permissions(&single, permissions)
            })
            .collect()
    }

    fn build_json_view(
        &self,
        resource_key: &ResourceKey,
        fields: &Map<String, Value>,
        context: &AuthorizationContext,
        permissions: &Permissions,
    ) -> Value {
        if !self.inherited_trie.has_child(resource_key.resource_type()) {
            tracing::debug!(
                resource_type = resource_key.resource_type(),
                "Policy has no entries for resource type, view is empty"
            );
            return Value::Object(Map::new());
        }
        let start = self
            .inherited_trie
            .seek_to_least_ancestor(resource_key.segments());
        Value::Object(start.build_json_view(fields, context.subject_ids(), permissions))
    }
}
