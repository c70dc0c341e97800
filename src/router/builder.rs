//! Builds a [`RouteTable`] from the handler groups in a [`ComponentRegistry`].

use std::any::TypeId;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::errors::{DefaultErrorGroup, ErrorRoute};
use super::table::{normalize_uri, RouteTable};
use super::types::Route;
use crate::error::RegistrationError;
use crate::registry::{declare, ComponentRegistry, GroupDeclaration};
use std::sync::Arc;

/// What happens when two actions produce the same final URI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Last registration wins; a warning is logged
    #[default]
    Overwrite,
    /// The build fails with [`RegistrationError::DuplicateRoute`]
    Reject,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(DuplicatePolicy::Overwrite),
            "reject" => Ok(DuplicatePolicy::Reject),
            other => Err(format!("unknown duplicate route policy: {other}")),
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicatePolicy::Overwrite => f.write_str("overwrite"),
            DuplicatePolicy::Reject => f.write_str("reject"),
        }
    }
}

/// Normalize a group prefix: empty stays empty, anything else gets a leading
/// separator and loses its trailing one.
#[must_use]
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim();
    if trimmed.trim_matches('/').is_empty() {
        return String::new();
    }
    normalize_uri(trimmed).into_owned()
}

/// Final URI for a prefix and a method-level suffix, or `None` when the suffix
/// is empty and the action must not be routed.
#[must_use]
pub fn join_uri(prefix: &str, suffix: &str) -> Option<String> {
    let suffix = suffix.trim();
    if suffix.is_empty() {
        return None;
    }
    Some(normalize_uri(&format!("{}/{}", normalize_prefix(prefix), suffix)).into_owned())
}

/// Walks handler-group declarations and produces the route table.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteBuilder {
    policy: DuplicatePolicy,
}

impl RouteBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_policy(policy: DuplicatePolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Build the table: default error routes first, then every registered group
    /// except the default error group, in registration order.
    pub fn build(&self, registry: &ComponentRegistry) -> Result<RouteTable, RegistrationError> {
        let mut table = RouteTable::new();

        self.register_group(&mut table, &declare(Arc::new(DefaultErrorGroup)))?;
        for route in ErrorRoute::ALL {
            if !table.contains(route.uri()) {
                return Err(RegistrationError::MissingErrorRoute { uri: route.uri() });
            }
        }

        let mut groups = 0usize;
        for group in registry.handler_groups() {
            if group.type_id == TypeId::of::<DefaultErrorGroup>() {
                debug!(group = %group.name, "Skipping default error group");
                continue;
            }
            self.register_group(&mut table, &group)?;
            groups += 1;
        }

        info!(
            groups,
            routes = table.len(),
            policy = %self.policy,
            "Route table built"
        );
        Ok(table)
    }

    fn register_group(
        &self,
        table: &mut RouteTable,
        group: &GroupDeclaration,
    ) -> Result<(), RegistrationError> {
        let prefix = normalize_prefix(group.prefix.as_deref().unwrap_or_default());

        for decl in &group.actions {
            let qualified = format!("{}::{}", group.name, decl.action.name());
            let Some(mapping) = &decl.mapping else {
                debug!(action = %qualified, "Action has no mapping, not routed");
                continue;
            };
            let Some(uri) = join_uri(&prefix, &mapping.uri) else {
                debug!(action = %qualified, "Mapping has no URI, not routed");
                continue;
            };

            for spec in &decl.params {
                spec.validate()
                    .map_err(|reason| RegistrationError::InvalidParamSpec {
                        action: qualified.clone(),
                        alias: spec.alias.clone(),
                        reason,
                    })?;
            }

            if let Some(existing) = table.lookup(&uri) {
                let default_error = existing.invoker().is::<DefaultErrorGroup>();
                match self.policy {
                    _ if default_error => debug!(
                        uri = %uri,
                        replacement = %qualified,
                        "Default error route overridden"
                    ),
                    DuplicatePolicy::Reject => {
                        return Err(RegistrationError::DuplicateRoute {
                            uri,
                            existing: existing.qualified_name(),
                            replacement: qualified,
                        });
                    }
                    DuplicatePolicy::Overwrite => warn!(
                        uri = %uri,
                        existing = %existing.qualified_name(),
                        replacement = %qualified,
                        "Duplicate route, last registration wins"
                    ),
                }
            }

            debug!(
                uri = %uri,
                action = %qualified,
                methods = ?mapping.methods,
                params = decl.params.len(),
                "Route registered"
            );
            table.put(Route::new(
                uri,
                Arc::clone(&group.name),
                Arc::clone(&group.invoker),
                decl.action.clone(),
                mapping.methods.clone(),
                decl.params.clone(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix("users"), "/users");
        assert_eq!(normalize_prefix("/users/"), "/users");
        assert_eq!(normalize_prefix("api/v1/"), "/api/v1");
    }

    #[test]
    fn test_join_uri() {
        assert_eq!(join_uri("/users", "/{id}").as_deref(), Some("/users/{id}"));
        assert_eq!(join_uri("users", "{id}").as_deref(), Some("/users/{id}"));
        assert_eq!(join_uri("", "/health").as_deref(), Some("/health"));
        assert_eq!(join_uri("/users", "/").as_deref(), Some("/users"));
        assert_eq!(join_uri("", "/").as_deref(), Some("/"));
        assert_eq!(join_uri("/users", ""), None);
        assert_eq!(join_uri("/users", "   "), None);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("Reject".parse::<DuplicatePolicy>(), Ok(DuplicatePolicy::Reject));
        assert_eq!("overwrite".parse::<DuplicatePolicy>(), Ok(DuplicatePolicy::Overwrite));
        assert!("merge".parse::<DuplicatePolicy>().is_err());
    }

    #[test]
    fn test_empty_registry_yields_error_routes_only() {
        let table = RouteBuilder::new().build(&ComponentRegistry::new()).unwrap();
        assert_eq!(table.len(), ErrorRoute::ALL.len());
        for route in ErrorRoute::ALL {
            assert_eq!(table.error(route).uri(), route.uri());
        }
    }
}
