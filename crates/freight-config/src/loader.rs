//! Multi-file configuration loading.
//!
//! A root file may pull in other files with `include = [...]`. Every top-level
//! section must come from exactly one file so that merging never has to pick a
//! winner.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Loads a root configuration file together with its includes.
pub struct ConfigLoader {
	/// Directory relative includes are resolved against.
	base_path: PathBuf,
	/// Canonical paths already read, for cycle detection.
	loaded_files: HashSet<PathBuf>,
	/// Which file each top-level section came from.
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			loaded_files: HashSet::new(),
			section_sources: HashMap::new(),
		}
	}

	/// Reads `config_path` and its includes, then parses and validates the
	/// merged document.
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let root_path = self.resolve_path(config_path)?;
		let mut root = self.read_document(&root_path).await?;
		let includes = take_includes(&mut root)?;

		if !includes.is_empty() {
			self.claim_sections(&root, &root_path)?;
			for include in includes {
				let path = self.resolve_path(&include)?;
				let mut document = self.read_document(&path).await?;
				if !take_includes(&mut document)?.is_empty() {
					return Err(ConfigError::Validation(format!(
						"Nested include in {} is not supported",
						path.display()
					)));
				}
				self.claim_sections(&document, &path)?;
				merge_into(&mut root, document);
			}
		}

		let merged = toml::to_string(&root).map_err(|e| {
			ConfigError::Parse(format!("Failed to serialize combined config: {}", e))
		})?;
		merged.parse()
	}

	/// Reads a file once, resolves `${VAR}` references and parses it as TOML.
	async fn read_document(&mut self, path: &Path) -> Result<toml::Value, ConfigError> {
		let canonical_path = path.canonicalize().map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;

		if !self.loaded_files.insert(canonical_path.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical_path.display()
			)));
		}

		let content = tokio::fs::read_to_string(path).await?;
		Ok(toml::from_str(&resolve_env_vars(&content)?)?)
	}

	/// Records the origin of each top-level section, rejecting duplicates.
	fn claim_sections(&mut self, document: &toml::Value, source: &Path) -> Result<(), ConfigError> {
		let Some(table) = document.as_table() else {
			return Ok(());
		};
		for key in table.keys() {
			if let Some(existing) = self.section_sources.get(key) {
				return Err(ConfigError::Validation(format!(
					"Duplicate section '{}' found in {} and {}. \
					Each top-level section must be unique across all configuration files.",
					key,
					existing.display(),
					source.display()
				)));
			}
			self.section_sources.insert(key.clone(), source.to_path_buf());
		}
		Ok(())
	}

	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();
		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};

		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}
		Ok(resolved)
	}
}

/// Removes the `include` directive from a document and returns its paths.
///
/// Accepts a single string or an array of strings.
fn take_includes(document: &mut toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
	let Some(value) = document.as_table_mut().and_then(|t| t.remove("include")) else {
		return Ok(Vec::new());
	};
	match value {
		toml::Value::String(path) => Ok(vec![PathBuf::from(path)]),
		toml::Value::Array(items) => items
			.into_iter()
			.map(|item| match item {
				toml::Value::String(path) => Ok(PathBuf::from(path)),
				_ => Err(ConfigError::Validation(
					"Include array must contain only strings".into(),
				)),
			})
			.collect(),
		_ => Err(ConfigError::Validation(
			"Include must be a string or array of strings".into(),
		)),
	}
}

fn merge_into(root: &mut toml::Value, document: toml::Value) {
	if let (Some(root), toml::Value::Table(sections)) = (root.as_table_mut(), document) {
		root.extend(sections);
	}
}
