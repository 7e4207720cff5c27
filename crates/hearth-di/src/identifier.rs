//! Binding identifiers
//!
//! An [`Identifier`] is the sole key space for resolution: a type plus an
//! optional qualifier. Two identifiers with the same type but different
//! qualifiers are distinct bindings.

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Runtime descriptor of a Rust type.
///
/// Equality and hashing use the [`TypeId`] only; the name is kept for messages.
/// Unsized types such as `dyn Trait` are supported.
#[derive(Clone, Copy)]
pub struct TypeKey {
	id: TypeId,
	name: &'static str,
}

impl TypeKey {
	pub fn of<T: ?Sized + 'static>() -> Self {
		Self {
			id: TypeId::of::<T>(),
			name: type_name::<T>(),
		}
	}

	pub fn id(&self) -> TypeId {
		self.id
	}

	pub fn name(&self) -> &'static str {
		self.name
	}
}

impl PartialEq for TypeKey {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.id.hash(state);
	}
}

impl fmt::Debug for TypeKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name)
	}
}

impl fmt::Display for TypeKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name)
	}
}

/// Disambiguates multiple bindings of the same type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Qualifier {
	/// Qualified by a marker type
	Marker(TypeKey),
	/// Qualified by a name
	Named(Arc<str>),
}

impl fmt::Display for Qualifier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Qualifier::Marker(marker) => write!(f, "@{}", marker),
			Qualifier::Named(name) => write!(f, "@Named(\"{}\")", name),
		}
	}
}

/// A type plus an optional qualifier. Immutable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
	ty: TypeKey,
	qualifier: Option<Qualifier>,
}

impl Identifier {
	/// Unqualified identifier for `T`
	pub fn of<T: ?Sized + 'static>() -> Self {
		Self::of_type(TypeKey::of::<T>())
	}

	/// Identifier for `T` qualified by the marker type `Q`
	pub fn qualified<T: ?Sized + 'static, Q: ?Sized + 'static>() -> Self {
		Self::of_type_and_qualifier(TypeKey::of::<T>(), TypeKey::of::<Q>())
	}

	/// Identifier for `T` qualified by `name`
	pub fn named<T: ?Sized + 'static>(name: impl Into<Arc<str>>) -> Self {
		Self::of_type_and_named(TypeKey::of::<T>(), name)
	}

	pub fn of_type(ty: TypeKey) -> Self {
		Self {
			ty,
			qualifier: None,
		}
	}

	pub fn of_type_and_qualifier(ty: TypeKey, marker: TypeKey) -> Self {
		Self {
			ty,
			qualifier: Some(Qualifier::Marker(marker)),
		}
	}

	pub fn of_type_and_named(ty: TypeKey, name: impl Into<Arc<str>>) -> Self {
		Self {
			ty,
			qualifier: Some(Qualifier::Named(name.into())),
		}
	}

	pub(crate) fn with_qualifier(ty: TypeKey, qualifier: Option<Qualifier>) -> Self {
		Self { ty, qualifier }
	}

	pub fn type_key(&self) -> TypeKey {
		self.ty
	}

	pub fn qualifier(&self) -> Option<&Qualifier> {
		self.qualifier.as_ref()
	}

	pub fn is_qualified(&self) -> bool {
		self.qualifier.is_some()
	}
}

impl fmt::Display for Identifier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.qualifier {
			Some(qualifier) => write!(f, "{} {}", qualifier, self.ty),
			None => write!(f, "{}", self.ty),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use std::collections::HashSet;

	struct Engine;
	struct Primary;
	trait Service {}

	#[rstest]
	fn test_same_type_identifiers_are_equal() {
		// Act
		let first = Identifier::of::<Engine>();
		let second = Identifier::of::<Engine>();

		// Assert
		assert_eq!(first, second);
		let set: HashSet<_> = [first, second].into_iter().collect();
		assert_eq!(set.len(), 1);
	}

	#[rstest]
	fn test_qualifiers_distinguish_identifiers() {
		// Act
		let plain = Identifier::of::<Engine>();
		let marked = Identifier::qualified::<Engine, Primary>();
		let named_a = Identifier::named::<Engine>("a");
		let named_b = Identifier::named::<Engine>("b");

		// Assert
		assert_ne!(plain, marked);
		assert_ne!(named_a, named_b);
		assert_ne!(plain, named_a);
		assert_eq!(named_a, Identifier::of_type_and_named(TypeKey::of::<Engine>(), "a"));
	}

	#[rstest]
	fn test_trait_object_identifier() {
		// Act
		let id = Identifier::of::<dyn Service>();

		// Assert
		assert_eq!(id.type_key(), TypeKey::of::<dyn Service>());
		assert!(id.to_string().contains("Service"));
		assert!(!id.is_qualified());
	}

	#[rstest]
	fn test_display_includes_qualifier() {
		// Act
		let rendered = Identifier::named::<Engine>("main").to_string();

		// Assert
		assert!(rendered.starts_with("@Named(\"main\")"));
		assert!(rendered.ends_with("Engine"));
	}
}
