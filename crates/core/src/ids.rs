use std::fmt;
use std::sync::Arc;

/// Unique identifier for an entity observed by the host.
///
/// The dispatcher never owns entity identity; hosts map whatever they use
/// (UUIDs, slot indices, network ids) onto this opaque 64-bit value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Classification group an entity belongs to; selects which rule subset applies.
///
/// Backed by `Arc<str>` so every rule of a scope shares one allocation and
/// clones on the lookup path stay cheap.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScopeId(Arc<str>);

impl ScopeId {
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(Arc::from(value.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScopeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ScopeId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl AsRef<str> for ScopeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Globally unique rule key in the form `scope:rule`.
///
/// Used by the cooldown ledger and for duplicate detection when an index is
/// built.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuleKey(Arc<str>);

impl RuleKey {
    pub fn new(scope: &ScopeId, rule_id: &str) -> Self {
        Self(Arc::from(format!("{}:{}", scope.as_str(), rule_id)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RuleKey {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_key_joins_scope_and_id() {
        let key = RuleKey::new(&ScopeId::new("S"), "r1");
        assert_eq!(key.as_str(), "S:r1");
        assert_eq!(key, RuleKey::from("S:r1"));
    }

    #[test]
    fn entity_id_display() {
        assert_eq!(EntityId(42).to_string(), "#42");
    }
}
