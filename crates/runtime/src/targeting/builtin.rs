//! Fixed `@` tokens backed by session context references.

use reflex_core::EntityId;

use super::{TargetContext, TargetResolver};
use crate::error::ResolveError;

/// Resolves `@self`, `@victim`, `@attacker`, `@vehicle` and `@mount`.
///
/// Tokens match case-insensitively. A reference that no longer points at a
/// valid entity resolves to nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinResolver;

impl BuiltinResolver {
    pub const NAME: &'static str = "builtin";
    pub const TOKENS: [&'static str; 5] = ["@self", "@victim", "@attacker", "@vehicle", "@mount"];

    fn candidate(selector: &str, ctx: &TargetContext<'_>) -> Option<EntityId> {
        match selector.to_ascii_lowercase().as_str() {
            "@self" => Some(ctx.entity),
            "@victim" => ctx.victim,
            "@attacker" => ctx.attacker,
            "@vehicle" => ctx.vehicle,
            "@mount" => ctx.mount,
            _ => None,
        }
    }
}

impl TargetResolver for BuiltinResolver {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> i32 {
        10
    }

    fn supports(&self, selector: &str) -> bool {
        Self::TOKENS
            .iter()
            .any(|token| token.eq_ignore_ascii_case(selector))
    }

    fn resolve(
        &self,
        selector: &str,
        ctx: &TargetContext<'_>,
    ) -> Result<Vec<EntityId>, ResolveError> {
        Ok(Self::candidate(selector, ctx)
            .filter(|&entity| ctx.entities.is_valid(entity))
            .into_iter()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::host::{EntityOracle, MotionSample};

    struct Valid(HashSet<EntityId>);

    impl EntityOracle for Valid {
        fn is_valid(&self, entity: EntityId) -> bool {
            self.0.contains(&entity)
        }
        fn is_online(&self, entity: EntityId) -> bool {
            self.0.contains(&entity)
        }
        fn motion(&self, _: EntityId) -> Option<MotionSample> {
            None
        }
        fn kind_of(&self, _: EntityId) -> Option<String> {
            None
        }
    }

    #[test]
    fn tokens_are_case_insensitive() {
        assert!(BuiltinResolver.supports("@SELF"));
        assert!(BuiltinResolver.supports("@Mount"));
        assert!(!BuiltinResolver.supports("@nearest"));
        assert!(!BuiltinResolver.supports("self"));
    }

    #[test]
    fn resolves_only_valid_references() {
        let oracle = Valid([EntityId(1), EntityId(2)].into_iter().collect());
        let mut ctx = TargetContext::bare(EntityId(1), &oracle);
        ctx.victim = Some(EntityId(2));
        ctx.attacker = Some(EntityId(3));

        let resolve = |s| BuiltinResolver.resolve(s, &ctx).unwrap();
        assert_eq!(resolve("@self"), vec![EntityId(1)]);
        assert_eq!(resolve("@Victim"), vec![EntityId(2)]);
        assert!(resolve("@attacker").is_empty());
        assert!(resolve("@vehicle").is_empty());
    }
}
