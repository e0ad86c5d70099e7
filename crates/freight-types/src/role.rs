//! Operator roles.
//!
//! Role names arrive in several spellings depending on which page or table
//! produced them. `Role::from_str` is the single place those synonyms are
//! resolved; everything past the data boundary uses the enum.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Operator role that owns a view or originates a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
	/// Customer who placed the order.
	Client,
	/// China-side purchasing and packing operator.
	China,
	/// Venezuela-side receiving and delivery operator.
	Venezuela,
	/// Payment validator.
	Payments,
	Admin,
}

#[derive(Debug, Error)]
#[error("Unrecognized role: {0}")]
pub struct UnknownRole(pub String);

impl Role {
	pub const ALL: [Role; 5] = [
		Role::Client,
		Role::China,
		Role::Venezuela,
		Role::Payments,
		Role::Admin,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			Role::Client => "client",
			Role::China => "china",
			Role::Venezuela => "venezuela",
			Role::Payments => "payments",
			Role::Admin => "admin",
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Role {
	type Err = UnknownRole;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
		match normalized.as_str() {
			"client" | "cliente" | "customer" => Ok(Role::Client),
			"china" | "chinese" | "china_operator" | "chinaoperator" | "china_employee" => {
				Ok(Role::China)
			},
			"venezuela" | "vzla" | "venezuela_operator" | "venezuelaoperator"
			| "venezuela_employee" => Ok(Role::Venezuela),
			"payments" | "payment" | "pagos" | "payment_validator" | "validator" => {
				Ok(Role::Payments)
			},
			"admin" | "administrator" | "administrador" => Ok(Role::Admin),
			_ => Err(UnknownRole(s.to_string())),
		}
	}
}
