//! Explained access decisions.
//!
//! [`TrieBasedPolicyEnforcer::evaluate_access`](crate::TrieBasedPolicyEnforcer::evaluate_access)
//! answers the same question as the boolean checks but also reports which trie
//! and node were consulted and which weights decided the outcome.

use crate::policy::Permissions;
use crate::subjects::Weight;
use std::fmt;

/// The derived tries an enforcer consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrieKind {
    /// Ancestor facts pushed down to every node.
    Inherited,
    /// Descendant grants aggregated upwards.
    BottomUpGrant,
    /// Descendant revokes aggregated upwards.
    BottomUpRevoke,
}

impl fmt::Display for TrieKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrieKind::Inherited => write!(f, "inherited"),
            TrieKind::BottomUpGrant => write!(f, "bottom-up-grant"),
            TrieKind::BottomUpRevoke => write!(f, "bottom-up-revoke"),
        }
    }
}

/// How much of a resource the permissions must cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Coverage {
    /// The resource and everything below it.
    Unrestricted,
    /// The resource or at least something below it.
    Partial,
}

impl Coverage {
    /// The trie that answers checks of this coverage for resources the policy names.
    pub fn trie(self) -> TrieKind {
        match self {
            Coverage::Unrestricted => TrieKind::BottomUpRevoke,
            Coverage::Partial => TrieKind::BottomUpGrant,
        }
    }
}

impl fmt::Display for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coverage::Unrestricted => write!(f, "unrestricted"),
            Coverage::Partial => write!(f, "partial"),
        }
    }
}

/// The node a decision was read from and the weights found there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLookup {
    pub trie: TrieKind,
    /// Path of the matched node, starting with the resource type.
    pub path: Vec<String>,
    /// Whether the node matched the whole requested path.
    pub exact: bool,
    pub grant_weight: Option<Weight>,
    pub revoke_weight: Option<Weight>,
}

impl NodeLookup {
    pub fn is_granted(&self) -> bool {
        match (self.grant_weight, self.revoke_weight) {
            (Some(grant), Some(revoke)) => revoke < grant,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

impl fmt::Display for NodeLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.exact { "exact" } else { "ancestor" };
        write!(f, "{} @ /{} ({})", self.trie, self.path.join("/"), kind)
    }
}

/// The result of reading one node.
#[derive(Debug, Clone)]
pub enum PolicyEvalResult {
    /// Access granted, with an optional reason.
    Granted {
        lookup: NodeLookup,
        reason: Option<String>,
    },
    /// Access denied, with a reason.
    Denied { lookup: NodeLookup, reason: String },
}

impl PolicyEvalResult {
    /// Turns the weights of a lookup into a decision with a readable reason.
    pub fn from_lookup(lookup: NodeLookup, permissions: &Permissions) -> Self {
        match (lookup.grant_weight, lookup.revoke_weight) {
            (None, _) => PolicyEvalResult::Denied {
                reason: format!("No grant covers all of {}", permissions),
                lookup,
            },
            (Some(grant), Some(revoke)) if revoke >= grant => PolicyEvalResult::Denied {
                reason: format!(
                    "Revoke at weight {} overrides grant at weight {}",
                    revoke, grant
                ),
                lookup,
            },
            (Some(grant), Some(revoke)) => PolicyEvalResult::Granted {
                reason: Some(format!(
                    "Grant at weight {} outweighs revoke at weight {}",
                    grant, revoke
                )),
                lookup,
            },
            (Some(grant), None) => PolicyEvalResult::Granted {
                reason: Some(format!("Grant at weight {}", grant)),
                lookup,
            },
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }

    pub fn lookup(&self) -> &NodeLookup {
        match self {
            Self::Granted { lookup, .. } | Self::Denied { lookup, .. } => lookup,
        }
    }

    pub fn reason(&self) -> Option<String> {
        match self {
            Self::Granted { reason, .. } => reason.clone(),
            Self::Denied { reason, .. } => Some(reason.clone()),
        }
    }

    /// Formats the result with indentation for readability
    pub fn format(&self, indent: usize) -> String {
        let indent_str = " ".repeat(indent);

        match self {
            Self::Granted { lookup, reason } => {
                let reason_text = reason
                    .as_ref()
                    .map_or("".to_string(), |r| format!(": {}", r));
                format!("{}✔ {} GRANTED{}", indent_str, lookup, reason_text)
            }
            Self::Denied { lookup, reason } => {
                format!("{}✘ {} DENIED: {}", indent_str, lookup, reason)
            }
        }
    }
}

impl fmt::Display for PolicyEvalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(0))
    }
}

/// Container for the evaluation details
#[derive(Debug, Clone, Default)]
pub struct EvalTrace {
    root: Option<PolicyEvalResult>,
}

impl EvalTrace {
    pub fn new() -> Self {
        Self { root: None }
    }

    pub fn with_root(result: PolicyEvalResult) -> Self {
        Self { root: Some(result) }
    }

    pub fn root(&self) -> Option<&PolicyEvalResult> {
        self.root.as_ref()
    }

    /// Returns a formatted representation of the evaluation
    pub fn format(&self) -> String {
        match &self.root {
            Some(root) => root.format(0),
            None => "No evaluation trace available".to_string(),
        }
    }
}

/// The complete result of an explained permission check.
///
/// ```rust
/// # use trie_enforcer::*;
/// let policy = Policy::new("ns:lamp").entry(
///     PolicyEntry::new("owner")
///         .subject("issuer:alice")
///         .grant(ResourceKey::new("thing", "/"), ["READ"])
///         .revoke(ResourceKey::new("thing", "/attributes/secret"), ["READ"]),
/// );
/// let enforcer = TrieBasedPolicyEnforcer::new(&policy);
///
/// let result = enforcer.evaluate_access(
///     &ResourceKey::new("thing", "/"),
///     &AuthorizationContext::new(["issuer:alice"]),
///     &Permissions::new(["READ"]),
///     Coverage::Unrestricted,
/// );
///
/// match &result {
///     AccessEvaluation::Granted { reason, trace, .. } => {
///         println!("Access granted: {:?}\n{}", reason, trace.format());
///     }
///     AccessEvaluation::Denied { reason, trace } => {
///         println!("Access denied: {}\n{}", reason, trace.format());
///     }
/// }
/// assert!(!result.is_granted());
/// ```
#[derive(Debug, Clone)]
pub enum AccessEvaluation {
    /// Access was granted.
    Granted {
        /// The coverage that was checked
        coverage: Coverage,
        /// Optional reason for granting
        reason: Option<String>,
        /// Node lookup that decided the outcome
        trace: EvalTrace,
    },
    /// Access was denied.
    Denied {
        /// Node lookup that decided the outcome
        trace: EvalTrace,
        /// Summary reason for denial
        reason: String,
    },
}

impl AccessEvaluation {
    pub(crate) fn from_result(coverage: Coverage, result: PolicyEvalResult) -> Self {
        match &result {
            PolicyEvalResult::Granted { reason, .. } => Self::Granted {
                coverage,
                reason: reason.clone(),
                trace: EvalTrace::with_root(result),
            },
            PolicyEvalResult::Denied { reason, .. } => Self::Denied {
                reason: reason.clone(),
                trace: EvalTrace::with_root(result),
            },
        }
    }

    /// Whether access was granted
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }

    pub fn trace(&self) -> &EvalTrace {
        match self {
            Self::Granted { trace, .. } | Self::Denied { trace, .. } => trace,
        }
    }

    /// Converts the evaluation into a `Result`, mapping a denial into an error.
    pub fn to_result<E>(&self, error_fn: impl FnOnce(&str) -> E) -> Result<(), E> {
        match self {
            Self::Granted { .. } => Ok(()),
            Self::Denied { reason, .. } => Err(error_fn(reason)),
        }
    }

    pub fn display_trace(&self) -> String {
        format!("{}\nEvaluation Trace:\n{}", self, self.trace().format())
    }
}

/// A concise line about the final decision.
impl fmt::Display for AccessEvaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Granted {
                coverage, reason, ..
            } => match reason {
                Some(r) => write!(f, "[GRANTED] {} access - {}", coverage, r),
                None => write!(f, "[GRANTED] {} access", coverage),
            },
            Self::Denied { reason, .. } => {
                write!(f, "[Denied] - {}", reason)
            }
        }
    }
}
