//! Authorization policy value type.
//!
//! A policy has three independent any-of requirements. An empty set means no
//! requirement on that axis, so `AuthorizationPolicy::default()` admits every
//! authenticated caller. Policies are built once per route at startup.

use std::collections::BTreeSet;

/// Per-route authorization requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationPolicy {
    scopes_any: BTreeSet<String>,
    roles_any: BTreeSet<String>,
    groups_any: BTreeSet<String>,
}

impl AuthorizationPolicy {
    /// A policy satisfied by any authenticated caller.
    pub fn authenticated() -> Self {
        Self::default()
    }

    /// Build a policy from comma-separated lists. Blank entries are ignored.
    pub fn from_lists(scopes: &str, roles: &str, groups: &str) -> Self {
        Self::default()
            .with_scopes(parse_list(scopes))
            .with_roles(parse_list(roles))
            .with_groups(parse_list(groups))
    }

    /// Add accepted scopes.
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes_any.extend(scopes.into_iter().map(Into::into));
        self
    }

    /// Add accepted roles.
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles_any.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Add accepted group ids.
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups_any.extend(groups.into_iter().map(Into::into));
        self
    }

    pub fn scopes_any(&self) -> &BTreeSet<String> {
        &self.scopes_any
    }

    pub fn roles_any(&self) -> &BTreeSet<String> {
        &self.roles_any
    }

    pub fn groups_any(&self) -> &BTreeSet<String> {
        &self.groups_any
    }

    /// True if the policy imposes no requirement beyond authentication.
    pub fn is_empty(&self) -> bool {
        self.scopes_any.is_empty() && self.roles_any.is_empty() && self.groups_any.is_empty()
    }
}

fn parse_list(list: &str) -> impl Iterator<Item = String> + '_ {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
}
