//! Registry trait for self-registering backend implementations.

/// Declares the configuration name and factory of a backend implementation.
///
/// The name must match the key used under `implementations` in the TOML
/// configuration, e.g. `"memory"` for `[storage.implementations.memory]`.
pub trait ImplementationRegistry {
	const NAME: &'static str;

	/// Factory function type, defined per backend family.
	type Factory;

	fn factory() -> Self::Factory;
}
