//! Injector settings
//!
//! Settings can be built in code through [`InjectorBuilder`](crate::InjectorBuilder)
//! or loaded from TOML:
//!
//! ```toml
//! private_injection = false
//! static_injection = true
//! multi_bindings = true
//! optional_bindings = true
//! max_resolution_depth = 64
//! ```

use serde::{Deserialize, Serialize};

use crate::cycle_detection::DEFAULT_MAX_RESOLUTION_DEPTH;

/// Feature flags and limits of an injector. Every feature is off by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionSettings {
	/// Inject into non-public constructors, fields and methods
	pub private_injection: bool,
	/// Inject static fields and methods, once per injector
	pub static_injection: bool,
	/// Allow several providers to share one identifier
	pub multi_bindings: bool,
	/// Allow optional dependencies and optional requests
	pub optional_bindings: bool,
	/// Deepest chain of nested resolutions within one request
	pub max_resolution_depth: usize,
}

impl Default for InjectionSettings {
	fn default() -> Self {
		Self {
			private_injection: false,
			static_injection: false,
			multi_bindings: false,
			optional_bindings: false,
			max_resolution_depth: DEFAULT_MAX_RESOLUTION_DEPTH,
		}
	}
}

/// Settings loading errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
	#[error("Failed to parse injector settings: {0}")]
	Parse(#[from] toml::de::Error),

	#[error("Failed to serialize injector settings: {0}")]
	Serialize(#[from] toml::ser::Error),

	#[error("Invalid injector settings: {0}")]
	Invalid(String),
}

impl InjectionSettings {
	/// Parses settings from a TOML document. Missing keys keep their defaults.
	pub fn from_toml_str(source: &str) -> Result<Self, SettingsError> {
		let settings: Self = toml::from_str(source)?;
		settings.validate()?;
		Ok(settings)
	}

	pub fn to_toml_string(&self) -> Result<String, SettingsError> {
		Ok(toml::to_string(self)?)
	}

	pub fn validate(&self) -> Result<(), SettingsError> {
		if self.max_resolution_depth == 0 {
			return Err(SettingsError::Invalid(
				"max_resolution_depth must be at least 1".to_string(),
			));
		}
		Ok(())
	}
}
