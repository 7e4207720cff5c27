//! Markers and marker vocabularies
//!
//! Program elements (constructors, fields, methods, parameters, types) carry
//! [`Marker`]s. The engine never interprets marker types directly, except for
//! the core [`MultiBinding`] marker; it asks a [`Vocabulary`] whether a set of
//! markers means "inject", "singleton", "qualifier" or "named".
//!
//! [`StandardVocabulary`] ships with the crate. [`CombinedVocabulary`] lets two
//! competing vocabularies be recognised at the same time.

use std::fmt;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::identifier::{Identifier, Qualifier, TypeKey};

/// A marker attached to a program element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Marker {
	kind: TypeKey,
	value: Option<Arc<str>>,
	meta: Vec<TypeKey>,
}

impl Marker {
	pub fn new(kind: TypeKey) -> Self {
		Self {
			kind,
			value: None,
			meta: Vec::new(),
		}
	}

	/// Marker whose kind is the type `M`
	pub fn of<M: ?Sized + 'static>() -> Self {
		Self::new(TypeKey::of::<M>())
	}

	/// Attaches a string value (e.g. the name of a named qualifier).
	pub fn with_value(mut self, value: impl Into<Arc<str>>) -> Self {
		self.value = Some(value.into());
		self
	}

	/// Marks this marker with a meta-marker (e.g. "is a qualifier").
	pub fn with_meta(mut self, meta: TypeKey) -> Self {
		self.meta.push(meta);
		self
	}

	pub fn kind(&self) -> TypeKey {
		self.kind
	}

	pub fn value(&self) -> Option<&str> {
		self.value.as_deref()
	}

	pub fn has_meta(&self, meta: TypeKey) -> bool {
		self.meta.contains(&meta)
	}

	pub fn is<M: ?Sized + 'static>(&self) -> bool {
		self.kind == TypeKey::of::<M>()
	}
}

impl fmt::Display for Marker {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.value {
			Some(value) => write!(f, "@{}(\"{}\")", self.kind, value),
			None => write!(f, "@{}", self.kind),
		}
	}
}

/// Core marker permitting several providers to share one identifier, and
/// requesting a set of instances at an injection point.
#[derive(Debug, Clone, Copy)]
pub struct MultiBinding;

/// The multi-binding marker
pub fn multi_binding() -> Marker {
	Marker::of::<MultiBinding>()
}

pub(crate) fn has_multi_binding(markers: &[Marker]) -> bool {
	markers.iter().any(Marker::is::<MultiBinding>)
}

/// Capability used by the engine to interpret markers.
pub trait Vocabulary: Send + Sync + fmt::Debug {
	/// Whether the element is marked for injection
	fn has_inject(&self, markers: &[Marker]) -> bool;

	/// Whether the element is marked as single-instance scoped
	fn has_singleton(&self, markers: &[Marker]) -> bool;

	/// Whether `marker` qualifies the identifier of an injection point
	fn is_qualifier(&self, marker: &Marker) -> bool;

	/// The name carried by `marker`, if it is this vocabulary's named qualifier
	fn named_qualifier<'m>(&self, marker: &'m Marker) -> Option<&'m str>;

	/// Whether `raw` is this vocabulary's deferred-factory type
	fn is_deferred_factory(&self, raw: TypeKey) -> bool;
}

/// The vocabulary shipped with the crate.
pub mod standard {
	use super::{Marker, Vocabulary};
	use crate::dependency::DeclaredType;
	use crate::identifier::TypeKey;

	/// Marks a constructor, field or method for injection
	#[derive(Debug, Clone, Copy)]
	pub struct Inject;

	/// Marks a type or producer as single-instance scoped
	#[derive(Debug, Clone, Copy)]
	pub struct Singleton;

	/// Named qualifier
	#[derive(Debug, Clone, Copy)]
	pub struct Named;

	/// Meta-marker: a marker type carrying it acts as a qualifier
	#[derive(Debug, Clone, Copy)]
	pub struct Qualifier;

	/// Raw type token of the deferred-factory type
	pub enum Deferred {}

	pub fn inject() -> Marker {
		Marker::of::<Inject>()
	}

	pub fn singleton() -> Marker {
		Marker::of::<Singleton>()
	}

	pub fn named(name: &str) -> Marker {
		Marker::of::<Named>()
			.with_value(name)
			.with_meta(TypeKey::of::<Qualifier>())
	}

	/// A qualifier marker of type `Q`
	pub fn qualifier<Q: ?Sized + 'static>() -> Marker {
		Marker::of::<Q>().with_meta(TypeKey::of::<Qualifier>())
	}

	/// Declared type of a deferred factory of `inner`
	pub fn deferred(inner: DeclaredType) -> DeclaredType {
		DeclaredType::generic(TypeKey::of::<Deferred>(), inner)
	}

	#[derive(Debug, Clone, Copy, Default)]
	pub struct StandardVocabulary;

	impl Vocabulary for StandardVocabulary {
		fn has_inject(&self, markers: &[Marker]) -> bool {
			markers.iter().any(Marker::is::<Inject>)
		}

		fn has_singleton(&self, markers: &[Marker]) -> bool {
			markers.iter().any(Marker::is::<Singleton>)
		}

		fn is_qualifier(&self, marker: &Marker) -> bool {
			marker.has_meta(TypeKey::of::<Qualifier>())
		}

		fn named_qualifier<'m>(&self, marker: &'m Marker) -> Option<&'m str> {
			if marker.is::<Named>() {
				marker.value()
			} else {
				None
			}
		}

		fn is_deferred_factory(&self, raw: TypeKey) -> bool {
			raw == TypeKey::of::<Deferred>()
		}
	}
}

pub use standard::StandardVocabulary;

/// Recognises markers of every member vocabulary.
#[derive(Debug, Clone)]
pub struct CombinedVocabulary {
	members: Vec<Arc<dyn Vocabulary>>,
}

impl CombinedVocabulary {
	pub fn new(members: Vec<Arc<dyn Vocabulary>>) -> Self {
		Self { members }
	}

	pub fn pair<A, B>(first: A, second: B) -> Self
	where
		A: Vocabulary + 'static,
		B: Vocabulary + 'static,
	{
		Self::new(vec![Arc::new(first), Arc::new(second)])
	}
}

impl Vocabulary for CombinedVocabulary {
	fn has_inject(&self, markers: &[Marker]) -> bool {
		self.members.iter().any(|v| v.has_inject(markers))
	}

	fn has_singleton(&self, markers: &[Marker]) -> bool {
		self.members.iter().any(|v| v.has_singleton(markers))
	}

	fn is_qualifier(&self, marker: &Marker) -> bool {
		self.members.iter().any(|v| v.is_qualifier(marker))
	}

	fn named_qualifier<'m>(&self, marker: &'m Marker) -> Option<&'m str> {
		self.members.iter().find_map(|v| v.named_qualifier(marker))
	}

	fn is_deferred_factory(&self, raw: TypeKey) -> bool {
		self.members.iter().any(|v| v.is_deferred_factory(raw))
	}
}

/// Extracts the single qualifier found across all marker sources.
pub(crate) fn qualifier_in(
	vocabulary: &dyn Vocabulary,
	sources: &[&[Marker]],
) -> DiResult<Option<Qualifier>> {
	let mut found: Option<&Marker> = None;
	for marker in sources.iter().flat_map(|markers| markers.iter()) {
		if !vocabulary.is_qualifier(marker) {
			continue;
		}
		if let Some(previous) = found {
			return Err(DiError::MisannotatedInjectee(format!(
				"Duplicate qualifier {} found; {} is already present",
				marker, previous
			)));
		}
		found = Some(marker);
	}
	Ok(found.map(|marker| match vocabulary.named_qualifier(marker) {
		Some(name) => Qualifier::Named(name.into()),
		None => Qualifier::Marker(marker.kind()),
	}))
}

/// Identifier for `ty`, qualified by whatever qualifier the sources carry.
pub(crate) fn identifier_for(
	vocabulary: &dyn Vocabulary,
	ty: TypeKey,
	sources: &[&[Marker]],
) -> DiResult<Identifier> {
	let qualifier = qualifier_in(vocabulary, sources)?;
	Ok(Identifier::with_qualifier(ty, qualifier))
}
