//! A trie-based policy enforcer for hierarchical resources.
//!
//! Resources such as a digital twin's JSON document form a tree: `thing:/`
//! contains `thing:/attributes`, which contains `thing:/attributes/location`,
//! and so on. A [`Policy`] grants and revokes permissions to authorization
//! subjects at arbitrary points of that tree. Facts are inherited downwards and
//! more specific facts override less specific ones.
//!
//! # Overview
//!
//! A [`TrieBasedPolicyEnforcer`] compiles a policy once into a [`PolicyTrie`]
//! and three derived tries:
//!
//!  - the *inherited* trie, where every node holds its own facts on top of the
//!    facts of its ancestors,
//!  - the *bottom-up-grant* trie, where every node also knows about grants
//!    anywhere below it,
//!  - the *bottom-up-revoke* trie, where every node also knows about revokes
//!    anywhere below it.
//!
//! Every query is then a walk over one of these tries. The enforcer implements
//! the [`PolicyEnforcer`] trait, which is the seam callers program against.
//!
//! ## Weights
//!
//! Each (permission, subject) fact carries a [`Weight`]. Facts stated in the
//! policy start at 0; inheriting a fact one level down decrements it and
//! aggregating it one level up increments it. A grant authorizes only if every
//! requested permission is granted and no revoke at the same node is at least
//! as specific (has a weight at least as large).
//!
//! ## Example
//!
//! Below the owner may read and write the whole thing except the
//! `attributes`, of which only `location` is readable again.
//!
//! ```rust
//! # use trie_enforcer::*;
//! # use serde_json::json;
//! let owner = "issuer:owner";
//! let policy = Policy::new("org.example:lamp").entry(
//!     PolicyEntry::new("owner")
//!         .subject(owner)
//!         .grant(ResourceKey::new("thing", "/"), ["READ", "WRITE"])
//!         .revoke(ResourceKey::new("thing", "/attributes"), ["READ", "WRITE"])
//!         .grant(ResourceKey::new("thing", "/attributes/location"), ["READ"]),
//! );
//! let enforcer = TrieBasedPolicyEnforcer::new(&policy);
//!
//! let context = AuthorizationContext::new([owner]);
//! let read = Permissions::new(["READ"]);
//! let root = ResourceKey::new("thing", "/");
//!
//! // Something below the root is revoked, so the root is only partially readable.
//! assert!(!enforcer.has_unrestricted_permissions(&root, &context, &read));
//! assert!(enforcer.has_partial_permissions(&root, &context, &read));
//!
//! let thing = json!({
//!     "attributes": { "location": { "latitude": 44.6 }, "serial": "A-1" },
//!     "features": { "lamp": { "properties": { "on": true } } }
//! });
//! let view = enforcer.build_json_view(&root, thing.as_object().unwrap(), &context, &read);
//! assert_eq!(view, json!({
//!     "attributes": { "location": { "latitude": 44.6 } },
//!     "features": { "lamp": { "properties": { "on": true } } }
//! }));
//! ```
//!
//! ## Explained decisions
//!
//! [`TrieBasedPolicyEnforcer::evaluate_access`] returns an [`AccessEvaluation`]
//! that names the trie and node a decision was read from, see
//! [`AccessEvaluation`] for an example. Each explained decision is also emitted
//! as a `tracing` event on the `trie_enforcer::security` target.

use serde_json::{Map, Value};
use std::collections::BTreeSet;

mod enforcer;
mod error;
mod evaluation;
mod index;
mod policy;
mod subjects;
mod trie;

pub use enforcer::TrieBasedPolicyEnforcer;
pub use error::PolicyError;
pub use evaluation::{
    AccessEvaluation, Coverage, EvalTrace, NodeLookup, PolicyEvalResult, TrieKind,
};
pub use index::{EffectedSubjectIds, GrantRevokeIndex};
pub use policy::{
    AuthorizationContext, Permissions, Policy, PolicyEntry, PolicyResource, ResourceKey,
};
pub use subjects::{PermissionSubjectsMap, Weight};
pub use trie::{PolicyTrie, PolicyTrieBuilder};

/// Permission queries against one policy.
///
/// Implementations are expected to be immutable once built, so every method
/// takes `&self` and the trait requires `Send + Sync`. Resources the policy
/// never mentions are not an error: they simply carry no permissions.
pub trait PolicyEnforcer: Send + Sync {
    /// Whether the subjects hold `permissions` on the resource and everything below it.
    ///
    /// A revoke anywhere below `resource_key` that is at least as specific as
    /// the grant denies the check.
    fn has_unrestricted_permissions(
        &self,
        resource_key: &ResourceKey,
        context: &AuthorizationContext,
        permissions: &Permissions,
    ) -> bool;

    /// Whether the subjects hold `permissions` on the resource or on something below it.
    fn has_partial_permissions(
        &self,
        resource_key: &ResourceKey,
        context: &AuthorizationContext,
        permissions: &Permissions,
    ) -> bool;

    /// Subjects granted all of `permissions` and subjects revoked any of them,
    /// as inherited at the resource.
    fn effected_subject_ids(
        &self,
        resource_key: &ResourceKey,
        permissions: &Permissions,
    ) -> EffectedSubjectIds;

    /// Subjects holding all of `permissions` on the resource or on something below it.
    fn subject_ids_with_partial_permission(
        &self,
        resource_key: &ResourceKey,
        permissions: &Permissions,
    ) -> BTreeSet<String>;

    /// Subjects that, each on their own, hold all of `permissions` on the
    /// resource and everything below it.
    fn subject_ids_with_unrestricted_permission(
        &self,
        resource_key: &ResourceKey,
        permissions: &Permissions,
    ) -> BTreeSet<String>;

    /// The part of `fields` (the content of the resource at `resource_key`)
    /// that the subjects may see with `permissions`, as a JSON object.
    ///
    /// The walk starts at the deepest node the policy holds along
    /// `resource_key`. When the key reaches below every node the policy names,
    /// that ancestor's children are matched against the top-level keys of
    /// `fields`, so a field is judged as if it sat directly below the ancestor.
    /// An unknown resource type yields an empty object.
    fn build_json_view(
        &self,
        resource_key: &ResourceKey,
        fields: &Map<String, Value>,
        context: &AuthorizationContext,
        permissions: &Permissions,
    ) -> Value;
}
