//! The permission → subject relation stored in every trie node.

use std::collections::{BTreeMap, BTreeSet};

/// Distance marker attached to each (permission, subject) pair.
///
/// Raw policy facts start at weight 0. Inheriting a fact one level down
/// decrements it; aggregating a fact one level up increments it. After
/// inheritance a larger weight means the fact originated closer to the node.
pub type Weight = i32;

/// Relation from permission names to the subjects holding them, each with a [`Weight`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSubjectsMap {
    entries: BTreeMap<String, BTreeMap<String, Weight>>,
}

impl PermissionSubjectsMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Subjects (and their weights) recorded for a single permission.
    pub fn subjects_for(&self, permission: &str) -> Option<&BTreeMap<String, Weight>> {
        self.entries.get(permission)
    }

    /// Iterates over all `(permission, subject, weight)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, Weight)> + '_ {
        self.entries.iter().flat_map(|(permission, subjects)| {
            subjects
                .iter()
                .map(move |(subject, weight)| (permission.as_str(), subject.as_str(), *weight))
        })
    }

    pub fn contains(&self, permission: &str, subject_id: &str) -> bool {
        self.entries
            .get(permission)
            .is_some_and(|subjects| subjects.contains_key(subject_id))
    }

    /// Relates every permission to every subject at weight 0.
    pub fn add_total_relation_of_weight_zero<'p, 's, P, S>(
        &mut self,
        permissions: P,
        subject_ids: S,
    ) -> &mut Self
    where
        P: IntoIterator<Item = &'p String>,
        S: IntoIterator<Item = &'s String> + Clone,
    {
        for permission in permissions {
            for subject_id in subject_ids.clone() {
                self.insert_weight(permission, subject_id, 0);
            }
        }
        self
    }

    fn insert_weight(&mut self, permission: &str, subject_id: &str, weight: Weight) {
        let subjects = self.entries.entry(permission.to_string()).or_default();
        subjects
            .entry(subject_id.to_string())
            .and_modify(|existing| *existing = (*existing).max(weight))
            .or_insert(weight);
    }

    /// Adds every pair of `other`. A pair present on both sides keeps the larger weight.
    pub fn add_all_entries_from(&mut self, other: &PermissionSubjectsMap) -> &mut Self {
        for (permission, subject_id, weight) in other.iter() {
            self.insert_weight(permission, subject_id, weight);
        }
        self
    }

    /// Removes every (permission, subject) pair present in `other`, regardless of weight.
    pub fn remove_all_entries_from(&mut self, other: &PermissionSubjectsMap) -> &mut Self {
        for (permission, removed) in &other.entries {
            if let Some(subjects) = self.entries.get_mut(permission) {
                subjects.retain(|subject_id, _| !removed.contains_key(subject_id));
                if subjects.is_empty() {
                    self.entries.remove(permission);
                }
            }
        }
        self
    }

    /// Subjects holding every one of `permissions`.
    ///
    /// The attached weight is one witnessing weight, not necessarily the
    /// largest; only the key set is meaningful. An empty permission set yields
    /// an empty result.
    pub fn subject_intersect<'a, P>(&self, permissions: P) -> BTreeMap<String, Weight>
    where
        P: IntoIterator<Item = &'a String>,
    {
        let mut permissions = permissions.into_iter();
        let Some(first) = permissions.next() else {
            return BTreeMap::new();
        };
        let mut result = self.entries.get(first).cloned().unwrap_or_default();
        for permission in permissions {
            match self.entries.get(permission) {
                Some(subjects) => result.retain(|subject_id, _| subjects.contains_key(subject_id)),
                None => return BTreeMap::new(),
            }
        }
        result
    }

    /// Subjects holding at least one of `permissions`, with their largest weight.
    pub fn subject_union<'a, P>(&self, permissions: P) -> BTreeMap<String, Weight>
    where
        P: IntoIterator<Item = &'a String>,
    {
        let mut result: BTreeMap<String, Weight> = BTreeMap::new();
        for permission in permissions {
            let Some(subjects) = self.entries.get(permission) else {
                continue;
            };
            for (subject_id, weight) in subjects {
                result
                    .entry(subject_id.clone())
                    .and_modify(|existing| *existing = (*existing).max(*weight))
                    .or_insert(*weight);
            }
        }
        result
    }

    fn max_weight_for_permission(
        &self,
        subject_ids: &BTreeSet<String>,
        permission: &str,
    ) -> Option<Weight> {
        let subjects = self.entries.get(permission)?;
        subject_ids
            .iter()
            .filter_map(|subject_id| subjects.get(subject_id).copied())
            .max()
    }

    /// The weakest link among the strongest matches per permission.
    ///
    /// For each permission the largest weight among `subject_ids` is taken; the
    /// result is the smallest of those. `None` when any permission has no
    /// matching subject, or when `permissions` is empty.
    pub fn max_nonempty_weight_for_all_permissions<'a, P>(
        &self,
        subject_ids: &BTreeSet<String>,
        permissions: P,
    ) -> Option<Weight>
    where
        P: IntoIterator<Item = &'a String>,
    {
        let mut result: Option<Weight> = None;
        for permission in permissions {
            let weight = self.max_weight_for_permission(subject_ids, permission)?;
            result = Some(result.map_or(weight, |current| current.min(weight)));
        }
        result
    }

    /// The largest weight among `subject_ids` for any of `permissions`.
    pub fn max_weight_for_all_permissions<'a, P>(
        &self,
        subject_ids: &BTreeSet<String>,
        permissions: P,
    ) -> Option<Weight>
    where
        P: IntoIterator<Item = &'a String>,
    {
        permissions
            .into_iter()
            .filter_map(|permission| self.max_weight_for_permission(subject_ids, permission))
            .max()
    }

    pub fn copy_with_incremented_weight(&self) -> Self {
        self.copy_with_weight_shift(1)
    }

    pub fn copy_with_decremented_weight(&self) -> Self {
        self.copy_with_weight_shift(-1)
    }

    fn copy_with_weight_shift(&self, shift: Weight) -> Self {
        let entries = self
            .entries
            .iter()
            .map(|(permission, subjects)| {
                let shifted = subjects
                    .iter()
                    .map(|(subject_id, weight)| (subject_id.clone(), weight + shift))
                    .collect();
                (permission.clone(), shifted)
            })
            .collect();
        Self { entries }
    }
}
