//! Legal state transitions per entity kind and role.
//!
//! Each `(kind, role)` pair owns a list of rules mapping an origin range to a
//! target range. A transition is judged against the rules whose target range
//! contains the requested state, in this order:
//!
//! 1. a target at or below the current state is `NonMonotonic`
//! 2. no rule reaches the target: `RoleNotPermitted`
//! 3. current state inside a rule's origin range: `Allowed`
//! 4. current state past every origin range: `StaleState`
//! 5. otherwise: `InsufficientState`

use freight_types::{
	DenyReason, EntityKind, Link, Role, TransitionDecision, MIN_BOX_STATE_FOR_CONTAINER,
	MIN_STATE_FOR_BOX,
};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::ops::RangeInclusive;

#[derive(Debug, Clone)]
struct Rule {
	origin: RangeInclusive<i32>,
	target: RangeInclusive<i32>,
}

const fn rule(origin: RangeInclusive<i32>, target: RangeInclusive<i32>) -> Rule {
	Rule { origin, target }
}

static RULES: Lazy<HashMap<(EntityKind, Role), Vec<Rule>>> = Lazy::new(|| {
	use EntityKind::{Box as Bx, Container as Ct, Order as Or};

	let mut m = HashMap::new();
	// Orders
	m.insert((Or, Role::Client), vec![rule(2..=2, 3..=3)]);
	m.insert(
		(Or, Role::China),
		vec![rule(1..=1, 2..=2), rule(4..=7, 5..=8)],
	);
	m.insert((Or, Role::Payments), vec![rule(3..=3, 4..=4)]);
	m.insert((Or, Role::Venezuela), vec![rule(8..=12, 9..=13)]);
	m.insert((Or, Role::Admin), vec![rule(1..=12, 2..=13)]);
	// Boxes
	m.insert((Bx, Role::China), vec![rule(1..=2, 2..=3)]);
	m.insert((Bx, Role::Venezuela), vec![rule(3..=4, 4..=5)]);
	m.insert((Bx, Role::Admin), vec![rule(1..=4, 2..=5)]);
	// Containers
	m.insert((Ct, Role::China), vec![rule(1..=2, 2..=3)]);
	m.insert((Ct, Role::Venezuela), vec![rule(3..=3, 4..=4)]);
	m.insert((Ct, Role::Admin), vec![rule(1..=3, 2..=4)]);
	m
});

fn evaluate(rules: &[Rule], from: i32, to: i32) -> TransitionDecision {
	if to <= from {
		return TransitionDecision::Denied(DenyReason::NonMonotonic);
	}
	let reaching: Vec<&Rule> = rules.iter().filter(|r| r.target.contains(&to)).collect();
	if reaching.is_empty() {
		return TransitionDecision::Denied(DenyReason::RoleNotPermitted);
	}
	if reaching.iter().any(|r| r.origin.contains(&from)) {
		return TransitionDecision::Allowed;
	}
	if reaching.iter().all(|r| from > *r.origin.end()) {
		return TransitionDecision::Denied(DenyReason::StaleState);
	}
	TransitionDecision::Denied(DenyReason::InsufficientState)
}

/// Decides whether `role` may move an entity of `kind` from `from` to `to`.
///
/// Pure and total: unknown states and roles without rules are denied, never
/// panicked on.
pub fn can_transition(kind: EntityKind, from: i32, to: i32, role: Role) -> TransitionDecision {
	let rules = RULES.get(&(kind, role)).map(Vec::as_slice).unwrap_or(&[]);
	evaluate(rules, from, to)
}

/// Decides whether `role` may attach the owning entity of `link`, currently at
/// `owner_state`, to its parent.
pub fn can_link(link: Link, owner_state: i32, role: Role) -> TransitionDecision {
	if !matches!(role, Role::China | Role::Admin) {
		return TransitionDecision::Denied(DenyReason::RoleNotPermitted);
	}
	let minimum = match link {
		Link::OrderToBox => MIN_STATE_FOR_BOX,
		Link::BoxToContainer => MIN_BOX_STATE_FOR_CONTAINER,
	};
	if owner_state < minimum {
		return TransitionDecision::Denied(DenyReason::InsufficientState);
	}
	TransitionDecision::Allowed
}

#[cfg(test)]
mod tests {
	use super::*;
	use freight_types::DELIVERED_STATE;

	const KINDS: [EntityKind; 3] = [EntityKind::Order, EntityKind::Box, EntityKind::Container];

	#[test]
	fn test_same_state_is_always_non_monotonic() {
		for kind in KINDS {
			for role in Role::ALL {
				for s in -1..=DELIVERED_STATE + 1 {
					assert_eq!(
						can_transition(kind, s, s, role),
						TransitionDecision::Denied(DenyReason::NonMonotonic),
						"{kind} {s} as {role}"
					);
				}
			}
		}
	}

	#[test]
	fn test_regression_is_non_monotonic() {
		assert_eq!(
			can_transition(EntityKind::Order, 9, 4, Role::Admin),
			TransitionDecision::Denied(DenyReason::NonMonotonic)
		);
		assert_eq!(
			can_transition(EntityKind::Container, 4, 1, Role::Admin),
			TransitionDecision::Denied(DenyReason::NonMonotonic)
		);
	}

	#[test]
	fn test_order_happy_path_by_role() {
		let steps = [
			(1, 2, Role::China),
			(2, 3, Role::Client),
			(3, 4, Role::Payments),
			(4, 5, Role::China),
			(7, 8, Role::China),
			(8, 9, Role::Venezuela),
			(12, 13, Role::Venezuela),
		];
		for (from, to, role) in steps {
			assert!(
				can_transition(EntityKind::Order, from, to, role).is_allowed(),
				"{from} -> {to} as {role}"
			);
		}
	}

	#[test]
	fn test_venezuela_requires_goods_in_hand() {
		assert_eq!(
			can_transition(EntityKind::Order, 5, 9, Role::Venezuela),
			TransitionDecision::Denied(DenyReason::InsufficientState)
		);
		assert_eq!(
			can_transition(EntityKind::Order, 3, 4, Role::Venezuela),
			TransitionDecision::Denied(DenyReason::RoleNotPermitted)
		);
	}

	#[test]
	fn test_role_not_permitted_is_distinct() {
		assert_eq!(
			can_transition(EntityKind::Order, 3, 4, Role::Client),
			TransitionDecision::Denied(DenyReason::RoleNotPermitted)
		);
		assert_eq!(
			can_transition(EntityKind::Box, 1, 2, Role::Payments),
			TransitionDecision::Denied(DenyReason::RoleNotPermitted)
		);
		assert_eq!(
			can_transition(EntityKind::Order, 12, 14, Role::Admin),
			TransitionDecision::Denied(DenyReason::RoleNotPermitted)
		);
	}

	#[test]
	fn test_insufficient_state_for_early_origin() {
		assert_eq!(
			can_transition(EntityKind::Order, 1, 3, Role::Client),
			TransitionDecision::Denied(DenyReason::InsufficientState)
		);
		assert_eq!(
			can_transition(EntityKind::Box, 2, 4, Role::Venezuela),
			TransitionDecision::Denied(DenyReason::InsufficientState)
		);
	}

	#[test]
	fn test_origin_past_every_rule_is_stale() {
		// A single-step rule whose target range is wider than its origin
		let rules = [rule(1..=1, 2..=5)];
		assert_eq!(
			evaluate(&rules, 3, 4),
			TransitionDecision::Denied(DenyReason::StaleState)
		);
		assert_eq!(evaluate(&rules, 1, 4), TransitionDecision::Allowed);
		assert_eq!(
			evaluate(&rules, 0, 4),
			TransitionDecision::Denied(DenyReason::InsufficientState)
		);
	}

	#[test]
	fn test_box_and_container_tables() {
		assert!(can_transition(EntityKind::Box, 1, 2, Role::China).is_allowed());
		assert!(can_transition(EntityKind::Box, 4, 5, Role::Venezuela).is_allowed());
		assert!(can_transition(EntityKind::Container, 2, 3, Role::China).is_allowed());
		assert!(can_transition(EntityKind::Container, 3, 4, Role::Venezuela).is_allowed());
		assert_eq!(
			can_transition(EntityKind::Container, 3, 4, Role::China),
			TransitionDecision::Denied(DenyReason::RoleNotPermitted)
		);
	}

	#[test]
	fn test_link_minimums() {
		assert_eq!(
			can_link(Link::OrderToBox, 3, Role::China),
			TransitionDecision::Denied(DenyReason::InsufficientState)
		);
		assert!(can_link(Link::OrderToBox, 4, Role::China).is_allowed());
		assert_eq!(
			can_link(Link::BoxToContainer, 1, Role::Admin),
			TransitionDecision::Denied(DenyReason::InsufficientState)
		);
		assert!(can_link(Link::BoxToContainer, 2, Role::Admin).is_allowed());
		assert_eq!(
			can_link(Link::OrderToBox, 6, Role::Venezuela),
			TransitionDecision::Denied(DenyReason::RoleNotPermitted)
		);
	}
}
