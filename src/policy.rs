//! The policy document and the resource-key model the enforcer consumes.
//!
//! A [`Policy`] is an ordered list of [`PolicyEntry`] values. Each entry names a
//! set of authorization subjects and, per [`ResourceKey`], the permissions that
//! are granted to or revoked from those subjects.

use crate::error::{PolicyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::btree_set;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Address of a (sub-)resource: a resource type followed by the segments of a
/// JSON pointer into a document of that type.
///
/// The textual form is `type:/json/pointer`, e.g. `thing:/attributes/location`.
/// `thing:/` addresses the whole thing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceKey {
    resource_type: String,
    path: Vec<String>,
}

impl ResourceKey {
    /// Creates a key from a resource type and a JSON pointer.
    ///
    /// Empty pointer segments are ignored, so `""`, `"/"` and `"//"` all address
    /// the root of the resource type. The leading `/` is optional.
    pub fn new(resource_type: impl Into<String>, pointer: &str) -> Self {
        let path = pointer
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(unescape_segment)
            .collect();
        Self {
            resource_type: resource_type.into(),
            path,
        }
    }

    /// Creates a key from already-decoded path segments.
    pub fn from_segments<I, S>(resource_type: impl Into<String>, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resource_type: resource_type.into(),
            path: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// The decoded pointer segments, without the resource type.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// The trie path of this key: the resource type followed by the pointer segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> + '_ {
        std::iter::once(self.resource_type.as_str()).chain(self.path.iter().map(String::as_str))
    }
}

fn unescape_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

impl FromStr for ResourceKey {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        let (resource_type, pointer) = s.split_once(':').ok_or_else(|| {
            PolicyError::invalid_resource_key(s, "expected '<type>:<pointer>'")
        })?;
        if resource_type.trim().is_empty() {
            return Err(PolicyError::invalid_resource_key(s, "resource type is empty"));
        }
        Ok(Self::new(resource_type, pointer))
    }
}

impl TryFrom<String> for ResourceKey {
    type Error = PolicyError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ResourceKey> for String {
    fn from(key: ResourceKey) -> Self {
        key.to_string()
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.resource_type)?;
        if self.path.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.path {
            write!(f, "/{}", escape_segment(segment))?;
        }
        Ok(())
    }
}

/// An ordered set of permission names, e.g. `READ` and `WRITE`.
///
/// The engine attaches no meaning to the names; they are compared verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(BTreeSet<String>);

impl Permissions {
    pub fn new<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        permissions.into_iter().collect()
    }

    pub fn contains(&self, permission: &str) -> bool {
        self.0.contains(permission)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, String> {
        self.0.iter()
    }

    /// Adds all permissions of `other` to this set.
    pub fn extend_from(&mut self, other: &Permissions) {
        self.0.extend(other.0.iter().cloned());
    }
}

impl<S: Into<String>> FromIterator<S> for Permissions {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<'a> IntoIterator for &'a Permissions {
    type Item = &'a String;
    type IntoIter = btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(String::as_str).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// The subjects on whose behalf a request is made.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationContext {
    subject_ids: BTreeSet<String>,
}

impl AuthorizationContext {
    pub fn new<I, S>(subject_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        subject_ids.into_iter().collect()
    }

    /// Adds a subject to the context.
    pub fn with_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_ids.insert(subject_id.into());
        self
    }

    pub fn subject_ids(&self) -> &BTreeSet<String> {
        &self.subject_ids
    }
}

impl<S: Into<String>> FromIterator<S> for AuthorizationContext {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            subject_ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<BTreeSet<String>> for AuthorizationContext {
    fn from(subject_ids: BTreeSet<String>) -> Self {
        Self { subject_ids }
    }
}

/// Granted and revoked permissions of one resource within a [`PolicyEntry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyResource {
    pub key: ResourceKey,
    pub grant: Permissions,
    pub revoke: Permissions,
}

/// One labelled entry of a policy: a subject set and the resources it applies to.
///
/// ```rust
/// # use trie_enforcer::*;
/// let entry = PolicyEntry::new("owner")
///     .subject("issuer:alice")
///     .grant(ResourceKey::new("thing", "/"), ["READ", "WRITE"])
///     .revoke(ResourceKey::new("thing", "/attributes/secret"), ["READ"]);
///
/// assert_eq!(entry.resources().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyEntry {
    label: String,
    subjects: BTreeSet<String>,
    resources: Vec<PolicyResource>,
}

impl PolicyEntry {
    /// Creates an entry with the given label and no subjects or resources.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            subjects: BTreeSet::new(),
            resources: Vec::new(),
        }
    }

    /// Adds a subject to the entry.
    pub fn subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subjects.insert(subject_id.into());
        self
    }

    /// Adds several subjects to the entry.
    pub fn subjects<I, S>(mut self, subject_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subjects.extend(subject_ids.into_iter().map(Into::into));
        self
    }

    /// Grants `permissions` on `key` to the entry's subjects.
    pub fn grant<I, S>(mut self, key: ResourceKey, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let permissions = Permissions::new(permissions);
        self.resource_mut(key).grant.extend_from(&permissions);
        self
    }

    /// Revokes `permissions` on `key` from the entry's subjects.
    pub fn revoke<I, S>(mut self, key: ResourceKey, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let permissions = Permissions::new(permissions);
        self.resource_mut(key).revoke.extend_from(&permissions);
        self
    }

    fn resource_mut(&mut self, key: ResourceKey) -> &mut PolicyResource {
        let position = match self.resources.iter().position(|r| r.key == key) {
            Some(position) => position,
            None => {
                self.resources.push(PolicyResource {
                    key,
                    grant: Permissions::default(),
                    revoke: Permissions::default(),
                });
                self.resources.len() - 1
            }
        };
        &mut self.resources[position]
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn subject_ids(&self) -> &BTreeSet<String> {
        &self.subjects
    }

    pub fn resources(&self) -> &[PolicyResource] {
        &self.resources
    }
}

/// A complete policy: an optional identifier and its entries, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Policy {
    id: Option<String>,
    entries: Vec<PolicyEntry>,
}

impl Policy {
    /// Creates an empty policy with the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            entries: Vec::new(),
        }
    }

    /// Appends an entry to the policy.
    pub fn entry(mut self, entry: PolicyEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn entries(&self) -> &[PolicyEntry] {
        &self.entries
    }

    /// Reads a policy from its JSON document form.
    ///
    /// ```rust
    /// # use trie_enforcer::*;
    /// let policy = Policy::from_json(r#"{
    ///     "policyId": "org.example:lamp",
    ///     "entries": {
    ///         "owner": {
    ///             "subjects": { "issuer:alice": { "type": "user" } },
    ///             "resources": { "thing:/": { "grant": ["READ", "WRITE"], "revoke": [] } }
    ///         }
    ///     }
    /// }"#).unwrap();
    ///
    /// assert_eq!(policy.id(), Some("org.example:lamp"));
    /// assert_eq!(policy.entries()[0].label(), "owner");
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let document: PolicyDocument = serde_json::from_str(json)?;
        document.into_policy()
    }
}

impl FromIterator<PolicyEntry> for Policy {
    fn from_iter<I: IntoIterator<Item = PolicyEntry>>(iter: I) -> Self {
        Self {
            id: None,
            entries: iter.into_iter().collect(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PolicyDocument {
    #[serde(default)]
    policy_id: Option<String>,
    #[serde(default)]
    entries: BTreeMap<String, EntryDocument>,
}

#[derive(Deserialize)]
struct EntryDocument {
    // Subject payloads (type, expiry, ...) carry no weight in enforcement.
    #[serde(default)]
    subjects: BTreeMap<String, serde_json::Value>,
    // Raw keys, so that spellings of the same resource (`thing:` and `thing:/`) merge.
    #[serde(default)]
    resources: BTreeMap<String, ResourceDocument>,
}

#[derive(Deserialize)]
struct ResourceDocument {
    #[serde(default)]
    grant: Permissions,
    #[serde(default)]
    revoke: Permissions,
}

impl PolicyDocument {
    fn into_policy(self) -> Result<Policy> {
        let mut entries = Vec::with_capacity(self.entries.len());
        for (label, document) in self.entries {
            if label.trim().is_empty() {
                return Err(PolicyError::invalid_document("entry label is empty"));
            }
            if let Some(subject) = document.subjects.keys().find(|s| s.trim().is_empty()) {
                return Err(PolicyError::invalid_document(format!(
                    "entry '{label}' has an empty subject id '{subject}'"
                )));
            }
            let mut entry = PolicyEntry::new(label).subjects(document.subjects.into_keys());
            for (raw_key, resource) in document.resources {
                let merged = entry.resource_mut(raw_key.parse()?);
                merged.grant.extend_from(&resource.grant);
                merged.revoke.extend_from(&resource.revoke);
            }
            entries.push(entry);
        }
        Ok(Policy {
            id: self.policy_id,
            entries,
        })
    }
}
