//! Grants and revokes recorded at a single trie node.

use crate::subjects::{PermissionSubjectsMap, Weight};
use std::collections::BTreeSet;

/// Subjects affected by a permission set at one resource.
///
/// `granted` holds subjects granted *all* requested permissions, `revoked`
/// holds subjects revoked *any* of them. The two sets may overlap; combining
/// them is up to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectedSubjectIds {
    pub granted: BTreeSet<String>,
    pub revoked: BTreeSet<String>,
}

/// The grant and revoke relations of one resource node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantRevokeIndex {
    grants: PermissionSubjectsMap,
    revokes: PermissionSubjectsMap,
}

impl GrantRevokeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(grants: PermissionSubjectsMap, revokes: PermissionSubjectsMap) -> Self {
        Self { grants, revokes }
    }

    pub fn grants(&self) -> &PermissionSubjectsMap {
        &self.grants
    }

    pub fn revokes(&self) -> &PermissionSubjectsMap {
        &self.revokes
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty() && self.revokes.is_empty()
    }

    /// Records a weight-0 grant of every permission to every subject.
    pub fn grant<'p, 's, P, S>(&mut self, permissions: P, subject_ids: S) -> &mut Self
    where
        P: IntoIterator<Item = &'p String>,
        S: IntoIterator<Item = &'s String> + Clone,
    {
        self.grants.add_total_relation_of_weight_zero(permissions, subject_ids);
        self
    }

    /// Records a weight-0 revoke of every permission from every subject.
    pub fn revoke<'p, 's, P, S>(&mut self, permissions: P, subject_ids: S) -> &mut Self
    where
        P: IntoIterator<Item = &'p String>,
        S: IntoIterator<Item = &'s String> + Clone,
    {
        self.revokes.add_total_relation_of_weight_zero(permissions, subject_ids);
        self
    }

    /// Weight of the grant that would authorize `subject_ids` for all of `permissions`.
    pub fn grant_weight<'a, P>(
        &self,
        subject_ids: &BTreeSet<String>,
        permissions: P,
    ) -> Option<Weight>
    where
        P: IntoIterator<Item = &'a String>,
    {
        self.grants
            .max_nonempty_weight_for_all_permissions(subject_ids, permissions)
    }

    /// Weight of the most specific revoke hitting `subject_ids` on any of `permissions`.
    pub fn revoke_weight<'a, P>(
        &self,
        subject_ids: &BTreeSet<String>,
        permissions: P,
    ) -> Option<Weight>
    where
        P: IntoIterator<Item = &'a String>,
    {
        self.revokes.max_weight_for_all_permissions(subject_ids, permissions)
    }

    /// Whether `subject_ids` together hold all of `permissions` here.
    ///
    /// A grant must exist for every permission, and any revoke must be strictly
    /// less specific than that grant. An empty permission set is never granted.
    pub fn has_permissions<'a, P>(&self, subject_ids: &BTreeSet<String>, permissions: P) -> bool
    where
        P: IntoIterator<Item = &'a String> + Clone,
    {
        let Some(grant_weight) = self.grant_weight(subject_ids, permissions.clone()) else {
            return false;
        };
        match self.revoke_weight(subject_ids, permissions) {
            Some(revoke_weight) => revoke_weight < grant_weight,
            None => true,
        }
    }

    pub fn effected_subject_ids<'a, P>(&self, permissions: P) -> EffectedSubjectIds
    where
        P: IntoIterator<Item = &'a String> + Clone,
    {
        EffectedSubjectIds {
            granted: self
                .grants
                .subject_intersect(permissions.clone())
                .into_keys()
                .collect(),
            revoked: self.revokes.subject_union(permissions).into_keys().collect(),
        }
    }

    /// Applies `update` on top of this index, the update taking precedence.
    ///
    /// Subjects granted by `update` lose their revokes here and subjects revoked
    /// by `update` lose their grants. A pair both granted and revoked by
    /// `update` ends up revoked.
    pub fn override_by(&mut self, update: &GrantRevokeIndex) -> &mut Self {
        self.grants
            .add_all_entries_from(&update.grants)
            .remove_all_entries_from(&update.revokes);
        self.revokes
            .remove_all_entries_from(&update.grants)
            .add_all_entries_from(&update.revokes);
        self
    }

    pub fn copy_with_decremented_weight(&self) -> Self {
        Self {
            grants: self.grants.copy_with_decremented_weight(),
            revokes: self.revokes.copy_with_decremented_weight(),
        }
    }

    /// True when no (permission, subject) pair is both granted and revoked.
    pub fn is_exclusive(&self) -> bool {
        self.grants
            .iter()
            .all(|(permission, subject_id, _)| !self.revokes.contains(permission, subject_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn subject_set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn grant_without_revoke_is_permitted() {
        let mut index = GrantRevokeIndex::new();
        index.grant(&strings(&["READ", "WRITE"]), &strings(&["a"]));

        assert!(index.has_permissions(&subject_set(&["a"]), &strings(&["READ"])));
        assert!(index.has_permissions(&subject_set(&["a"]), &strings(&["READ", "WRITE"])));
        assert!(!index.has_permissions(&subject_set(&["b"]), &strings(&["READ"])));
    }

    #[test]
    fn empty_permission_set_is_not_granted() {
        let mut index = GrantRevokeIndex::new();
        index.grant(&strings(&["READ"]), &strings(&["a"]));
        assert!(!index.has_permissions(&subject_set(&["a"]), &strings(&[])));
    }

    #[test]
    fn revoke_at_equal_weight_wins() {
        let mut index = GrantRevokeIndex::new();
        index
            .grant(&strings(&["READ"]), &strings(&["a"]))
            .revoke(&strings(&["READ"]), &strings(&["b"]));

        // Subjects a and b together: grant weight 0, revoke weight 0.
        assert!(!index.has_permissions(&subject_set(&["a", "b"]), &strings(&["READ"])));
        assert!(index.has_permissions(&subject_set(&["a"]), &strings(&["READ"])));
    }

    #[test]
    fn less_specific_revoke_loses_to_grant() {
        let mut inherited = GrantRevokeIndex::new();
        inherited.revoke(&strings(&["READ"]), &strings(&["a"]));
        let mut index = inherited.copy_with_decremented_weight();
        let mut own = GrantRevokeIndex::new();
        own.grant(&strings(&["READ"]), &strings(&["b"]));
        index.override_by(&own);

        assert_eq!(
            index.revoke_weight(&subject_set(&["a", "b"]), &strings(&["READ"])),
            Some(-1)
        );
        assert!(index.has_permissions(&subject_set(&["a", "b"]), &strings(&["READ"])));
    }

    #[test]
    fn effected_subjects_intersect_grants_and_union_revokes() {
        let mut index = GrantRevokeIndex::new();
        index
            .grant(&strings(&["READ", "WRITE"]), &strings(&["a"]))
            .grant(&strings(&["READ"]), &strings(&["b"]))
            .revoke(&strings(&["WRITE"]), &strings(&["c"]));

        let effected = index.effected_subject_ids(&strings(&["READ", "WRITE"]));
        assert_eq!(effected.granted, subject_set(&["a"]));
        assert_eq!(effected.revoked, subject_set(&["c"]));
    }

    #[test]
    fn override_replaces_opposite_sense() {
        let mut index = GrantRevokeIndex::new();
        index
            .grant(&strings(&["READ"]), &strings(&["a"]))
            .revoke(&strings(&["WRITE"]), &strings(&["a"]));

        let mut update = GrantRevokeIndex::new();
        update
            .revoke(&strings(&["READ"]), &strings(&["a"]))
            .grant(&strings(&["WRITE"]), &strings(&["a"]));
        index.override_by(&update);

        assert!(index.revokes().contains("READ", "a"));
        assert!(!index.grants().contains("READ", "a"));
        assert!(index.grants().contains("WRITE", "a"));
        assert!(!index.revokes().contains("WRITE", "a"));
        assert!(index.is_exclusive());
    }

    #[test]
    fn override_with_conflicting_update_revokes() {
        let mut update = GrantRevokeIndex::new();
        update
            .grant(&strings(&["READ"]), &strings(&["a"]))
            .revoke(&strings(&["READ"]), &strings(&["a"]));

        let mut index = GrantRevokeIndex::new();
        index.override_by(&update);

        assert!(index.is_exclusive());
        assert!(!index.has_permissions(&subject_set(&["a"]), &strings(&["READ"])));
    }
}
