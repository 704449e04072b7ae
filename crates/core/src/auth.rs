//! Client identity, permissions and the authorization collaborator
//!
//! A [`Client`] carries the identity token of a session and three grant
//! maps. The store never interprets grants; it hands them to an
//! [`Authority`], which owns their semantics. [`DefaultAuthority`] is a
//! small allow/deny implementation good enough for a single process.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::backend::ResourceType;
use crate::resource::ResourceId;

/// Operation a permission applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Read => write!(f, "read"),
            Action::Write => write!(f, "write"),
            Action::Delete => write!(f, "delete"),
        }
    }
}

impl std::str::FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "read" => Ok(Action::Read),
            "write" => Ok(Action::Write),
            "delete" => Ok(Action::Delete),
            _ => Err(format!("Invalid action: {s}")),
        }
    }
}

/// Whether a permission grants or refuses its actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    #[default]
    Allow,
    Deny,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Allow => write!(f, "allow"),
            Effect::Deny => write!(f, "deny"),
        }
    }
}

/// A grant or refusal of a set of actions, optionally expiring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    #[serde(default)]
    pub effect: Effect,

    pub actions: BTreeSet<Action>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
}

impl Permission {
    /// Allow the given actions
    pub fn allow(actions: impl IntoIterator<Item = Action>) -> Self {
        Self {
            effect: Effect::Allow,
            actions: actions.into_iter().collect(),
            expires_at: None,
        }
    }

    /// Refuse the given actions
    pub fn deny(actions: impl IntoIterator<Item = Action>) -> Self {
        Self {
            effect: Effect::Deny,
            actions: actions.into_iter().collect(),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: Timestamp) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    fn overlaps(&self, other: &Permission) -> bool {
        !self.actions.is_disjoint(&other.actions)
    }
}

/// Grant maps carried by a client
#[derive(Debug, Clone, Default)]
pub struct Grants {
    /// Permission per identity token
    pub by_identity: HashMap<String, Permission>,

    /// Permission per identifier glob pattern (e.g. `/data/reports/*`)
    pub by_pattern: BTreeMap<String, Permission>,

    /// Permission per backend resource type
    pub by_type: HashMap<ResourceType, Permission>,
}

/// Identity and permission state of one client session
///
/// The grant maps sit behind a single lock; every read and write of them
/// goes through [`Client::grants`] or [`Client::grants_mut`].
#[derive(Debug)]
pub struct Client {
    identity: String,
    grants: RwLock<Grants>,
}

impl Client {
    /// Create a client with empty grant maps
    pub fn new(identity: impl Into<String>) -> Self {
        Self::with_grants(identity, Grants::default())
    }

    pub fn with_grants(identity: impl Into<String>, grants: Grants) -> Self {
        Self {
            identity: identity.into(),
            grants: RwLock::new(grants),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn grants(&self) -> RwLockReadGuard<'_, Grants> {
        self.grants.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn grants_mut(&self) -> RwLockWriteGuard<'_, Grants> {
        self.grants.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current grant maps
    pub fn snapshot(&self) -> Grants {
        self.grants().clone()
    }
}

/// Authorization collaborator
///
/// The store forwards permission calls here and never looks at the
/// result. Implementations decide what a permission means.
pub trait Authority: Send + Sync {
    fn identity_permission(&self, client: &Client, identity: &str) -> Option<Permission>;

    fn set_identity_permission(&self, client: &Client, identity: &str, permission: Permission);

    fn pattern_permission(&self, client: &Client, pattern: &str) -> Option<Permission>;

    fn set_pattern_permission(&self, client: &Client, pattern: &str, permission: Permission);

    fn type_permission(&self, client: &Client, resource_type: ResourceType) -> Option<Permission>;

    fn set_type_permission(
        &self,
        client: &Client,
        resource_type: ResourceType,
        permission: Permission,
    );

    /// Stamp an expiry on the grant of `identity`; false if there is none
    fn set_expiry(&self, client: &Client, identity: &str, expires_at: Timestamp) -> bool;

    /// Whether `client` holds `required` on the resource `id` of type `resource_type`
    fn has_permission(
        &self,
        client: &Client,
        id: &ResourceId,
        resource_type: ResourceType,
        required: &Permission,
    ) -> bool;

    /// Whether two permissions contradict each other
    fn conflicts(&self, a: &Permission, b: &Permission) -> bool;
}

/// Allow/deny evaluation over a client's grant maps
///
/// Expired grants are ignored. A deny that overlaps the required actions
/// wins; otherwise every required action needs an allow from the client's
/// identity grant, a matching pattern grant or the type grant.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAuthority;

impl DefaultAuthority {
    fn applicable(
        grants: &Grants,
        identity: &str,
        id: &ResourceId,
        resource_type: ResourceType,
        now: Timestamp,
    ) -> Vec<Permission> {
        let by_pattern = grants.by_pattern.iter().filter_map(|(pattern, p)| {
            match glob::Pattern::new(pattern) {
                Ok(compiled) if compiled.matches(id.as_str()) => Some(p),
                Ok(_) => None,
                Err(e) => {
                    tracing::debug!(
                        pattern = %pattern,
                        error = %e,
                        "Skipping invalid grant pattern"
                    );
                    None
                }
            }
        });

        grants
            .by_identity
            .get(identity)
            .into_iter()
            .chain(by_pattern)
            .chain(grants.by_type.get(&resource_type))
            .filter(|p| !p.is_expired(now))
            .cloned()
            .collect()
    }
}

impl Authority for DefaultAuthority {
    fn identity_permission(&self, client: &Client, identity: &str) -> Option<Permission> {
        client.grants().by_identity.get(identity).cloned()
    }

    fn set_identity_permission(&self, client: &Client, identity: &str, permission: Permission) {
        client
            .grants_mut()
            .by_identity
            .insert(identity.to_string(), permission);
    }

    fn pattern_permission(&self, client: &Client, pattern: &str) -> Option<Permission> {
        client.grants().by_pattern.get(pattern).cloned()
    }

    fn set_pattern_permission(&self, client: &Client, pattern: &str, permission: Permission) {
        client
            .grants_mut()
            .by_pattern
            .insert(pattern.to_string(), permission);
    }

    fn type_permission(&self, client: &Client, resource_type: ResourceType) -> Option<Permission> {
        client.grants().by_type.get(&resource_type).cloned()
    }

    fn set_type_permission(
        &self,
        client: &Client,
        resource_type: ResourceType,
        permission: Permission,
    ) {
        client.grants_mut().by_type.insert(resource_type, permission);
    }

    fn set_expiry(&self, client: &Client, identity: &str, expires_at: Timestamp) -> bool {
        match client.grants_mut().by_identity.get_mut(identity) {
            Some(permission) => {
                permission.expires_at = Some(expires_at);
                true
            }
            None => false,
        }
    }

    fn has_permission(
        &self,
        client: &Client,
        id: &ResourceId,
        resource_type: ResourceType,
        required: &Permission,
    ) -> bool {
        let applicable = {
            let grants = client.grants();
            Self::applicable(
                &grants,
                client.identity(),
                id,
                resource_type,
                Timestamp::now(),
            )
        };

        if applicable
            .iter()
            .any(|p| p.effect == Effect::Deny && p.overlaps(required))
        {
            return false;
        }

        required.actions.iter().all(|action| {
            applicable
                .iter()
                .any(|p| p.effect == Effect::Allow && p.actions.contains(action))
        })
    }

    fn conflicts(&self, a: &Permission, b: &Permission) -> bool {
        a.effect != b.effect && a.overlaps(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Bucket, Object};

    fn read() -> Permission {
        Permission::allow([Action::Read])
    }

    #[test]
    fn test_action_from_str() {
        assert_eq!("read".parse::<Action>().unwrap(), Action::Read);
        assert_eq!("DELETE".parse::<Action>().unwrap(), Action::Delete);
        assert!("execute".parse::<Action>().is_err());
    }

    #[test]
    fn test_client_starts_empty() {
        let client = Client::new("alice");
        let grants = client.snapshot();
        assert_eq!(client.identity(), "alice");
        assert!(grants.by_identity.is_empty());
        assert!(grants.by_pattern.is_empty());
        assert!(grants.by_type.is_empty());
    }

    #[test]
    fn test_getters_and_setters() {
        let authority = DefaultAuthority;
        let client = Client::new("alice");

        authority.set_identity_permission(&client, "alice", read());
        authority.set_pattern_permission(&client, "/data/*", read());
        authority.set_type_permission(&client, ResourceType::of::<Bucket>(), read());

        assert_eq!(authority.identity_permission(&client, "alice"), Some(read()));
        assert_eq!(authority.identity_permission(&client, "bob"), None);
        assert_eq!(authority.pattern_permission(&client, "/data/*"), Some(read()));
        assert_eq!(
            authority.type_permission(&client, ResourceType::of::<Bucket>()),
            Some(read())
        );
        assert_eq!(
            authority.type_permission(&client, ResourceType::of::<Object>()),
            None
        );
    }

    #[test]
    fn test_has_permission_allow_and_deny() {
        let authority = DefaultAuthority;
        let client = Client::new("alice");
        let id = ResourceId::new("/data/reports/q1.csv");
        let object = ResourceType::of::<Object>();

        assert!(!authority.has_permission(&client, &id, object, &read()));

        authority.set_identity_permission(&client, "alice", read());
        assert!(authority.has_permission(&client, &id, object, &read()));
        assert!(!authority.has_permission(
            &client,
            &id,
            object,
            &Permission::allow([Action::Read, Action::Write])
        ));

        authority.set_type_permission(&client, object, Permission::allow([Action::Write]));
        assert!(authority.has_permission(
            &client,
            &id,
            object,
            &Permission::allow([Action::Read, Action::Write])
        ));

        authority.set_pattern_permission(
            &client,
            "/data/reports/*",
            Permission::deny([Action::Write]),
        );
        assert!(!authority.has_permission(
            &client,
            &id,
            object,
            &Permission::allow([Action::Write])
        ));
        assert!(authority.has_permission(&client, &id, object, &read()));
    }

    #[test]
    fn test_expired_grants_are_ignored() {
        let authority = DefaultAuthority;
        let client = Client::new("alice");
        let id = ResourceId::new("/data/a");

        authority.set_identity_permission(&client, "alice", read());
        assert!(authority.set_expiry(&client, "alice", Timestamp::UNIX_EPOCH));
        assert!(!authority.has_permission(&client, &id, ResourceType::of::<Object>(), &read()));
        assert!(!authority.set_expiry(&client, "bob", Timestamp::UNIX_EPOCH));
    }

    #[test]
    fn test_invalid_pattern_never_matches() {
        let authority = DefaultAuthority;
        let client = Client::new("alice");
        authority.set_pattern_permission(&client, "[", read());
        assert!(!authority.has_permission(
            &client,
            &ResourceId::new("/data/["),
            ResourceType::of::<Object>(),
            &read()
        ));
    }

    #[test]
    fn test_conflicts() {
        let authority = DefaultAuthority;
        assert!(authority.conflicts(&read(), &Permission::deny([Action::Read, Action::Write])));
        assert!(!authority.conflicts(&read(), &Permission::deny([Action::Write])));
        assert!(!authority.conflicts(&read(), &Permission::allow([Action::Read])));
    }

    #[test]
    fn test_permission_serialization() {
        let permission = Permission::allow([Action::Write, Action::Read]);
        let json = serde_json::to_string(&permission).unwrap();
        assert_eq!(json, r#"{"effect":"allow","actions":["read","write"]}"#);

        let parsed: Permission = serde_json::from_str(r#"{"actions":["delete"]}"#).unwrap();
        assert_eq!(parsed, Permission::allow([Action::Delete]));
    }
}
