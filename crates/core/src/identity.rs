//! Member identities and role membership.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a participant in the governance system.
///
/// Identities are opaque strings (typically a DID or an account address);
/// the governance engine only ever compares them for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberId(String);

impl MemberId {
    /// Create a member identity from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MemberId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MemberId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A set of members holding a particular role (administrators, verifiers).
///
/// Replaces boolean-map role lists with a proper membership set, decoupled
/// from the identity representation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleSet {
    members: HashSet<MemberId>,
}

impl RoleSet {
    /// Create an empty role set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a role set from an initial list of members.
    pub fn with_members(members: impl IntoIterator<Item = MemberId>) -> Self {
        Self {
            members: members.into_iter().collect(),
        }
    }

    /// Grant the role to a member. Returns false if they already held it.
    pub fn grant(&mut self, member: MemberId) -> bool {
        self.members.insert(member)
    }

    /// Revoke the role from a member. Returns false if they did not hold it.
    pub fn revoke(&mut self, member: &MemberId) -> bool {
        self.members.remove(member)
    }

    /// Check whether a member holds the role.
    pub fn contains(&self, member: &MemberId) -> bool {
        self.members.contains(member)
    }

    /// Number of members holding the role.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether no member holds the role.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
