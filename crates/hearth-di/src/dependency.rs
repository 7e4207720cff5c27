//! Dependency descriptors
//!
//! Every injection point (constructor parameter, field, method parameter)
//! declares a [`DeclaredType`]. The classifier turns it into a [`Dependency`]:
//! the strategy used to produce its [`Argument`].

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::context::ResolutionContext;
use crate::error::{DiError, DiResult, ResultExt};
use crate::identifier::{Identifier, TypeKey};
use crate::instance::{ErasedSet, Instance, InstanceSet};
use crate::marker::{Marker, Vocabulary, has_multi_binding, identifier_for};
use crate::provider::{DeferredFactory, Provider, SetProvider};
use crate::type_info::ParameterInfo;

/// Raw type token of the optional container
pub enum OptionalType {}

/// Raw type token of the set container
pub enum SetType {}

/// The declared type of an injection point: a raw type, at most one type
/// argument, and the type-use markers at this nesting level.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeclaredType {
	raw: TypeKey,
	argument: Option<Box<DeclaredType>>,
	markers: Vec<Marker>,
}

impl DeclaredType {
	pub fn of<T: ?Sized + 'static>() -> Self {
		Self::of_raw(TypeKey::of::<T>())
	}

	pub fn of_raw(raw: TypeKey) -> Self {
		Self {
			raw,
			argument: None,
			markers: Vec::new(),
		}
	}

	/// A generic type `raw<argument>`
	pub fn generic(raw: TypeKey, argument: DeclaredType) -> Self {
		Self {
			raw,
			argument: Some(Box::new(argument)),
			markers: Vec::new(),
		}
	}

	pub fn optional(argument: DeclaredType) -> Self {
		Self::generic(TypeKey::of::<OptionalType>(), argument)
	}

	pub fn set(argument: DeclaredType) -> Self {
		Self::generic(TypeKey::of::<SetType>(), argument)
	}

	/// Adds a type-use marker at this nesting level.
	pub fn marked(mut self, marker: Marker) -> Self {
		self.markers.push(marker);
		self
	}

	pub fn raw_type(&self) -> TypeKey {
		self.raw
	}

	pub fn argument(&self) -> Option<&DeclaredType> {
		self.argument.as_deref()
	}

	pub fn markers(&self) -> &[Marker] {
		&self.markers
	}

	fn type_argument(&self) -> DiResult<&DeclaredType> {
		self.argument().ok_or_else(|| {
			DiError::InternalFailure(format!(
				"Unable to determine details of parameterized type {}. Reason: no type argument was declared",
				self.raw
			))
		})
	}

	fn is<T: ?Sized + 'static>(&self) -> bool {
		self.raw == TypeKey::of::<T>()
	}
}

/// How an injection point is satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dependency {
	Instance(Identifier),
	DeferredFactory(Identifier),
	OptionalInstance(Identifier),
	OptionalDeferredFactory(Identifier),
	MultiInstance(Identifier),
	MultiDeferredFactory(Identifier),
}

impl Dependency {
	/// Classifies an injection point.
	///
	/// `site` holds the markers on the injection point itself. Qualifiers are
	/// merged from the site and from the type-use markers of every nesting
	/// level that is unwrapped.
	pub fn classify(
		vocabulary: &dyn Vocabulary,
		declared: &DeclaredType,
		site: &[Marker],
	) -> DiResult<Self> {
		let multi = has_multi_binding(site);

		if vocabulary.is_deferred_factory(declared.raw) {
			let produced = declared.type_argument()?;
			if multi {
				let element = set_element(produced)?;
				let id = identifier_for(
					vocabulary,
					element.raw,
					&[site, declared.markers(), produced.markers(), element.markers()],
				)?;
				return Ok(Dependency::MultiDeferredFactory(id));
			}
			let id = identifier_for(
				vocabulary,
				produced.raw,
				&[site, declared.markers(), produced.markers()],
			)?;
			return Ok(Dependency::DeferredFactory(id));
		}

		if multi {
			let element = set_element(declared)?;
			let id = identifier_for(
				vocabulary,
				element.raw,
				&[site, declared.markers(), element.markers()],
			)?;
			return Ok(Dependency::MultiInstance(id));
		}

		if declared.is::<OptionalType>() {
			let wrapped = declared.type_argument()?;
			if vocabulary.is_deferred_factory(wrapped.raw) {
				let produced = wrapped.type_argument()?;
				let id = identifier_for(
					vocabulary,
					produced.raw,
					&[site, declared.markers(), wrapped.markers(), produced.markers()],
				)?;
				return Ok(Dependency::OptionalDeferredFactory(id));
			}
			let id = identifier_for(
				vocabulary,
				wrapped.raw,
				&[site, declared.markers(), wrapped.markers()],
			)?;
			return Ok(Dependency::OptionalInstance(id));
		}

		let id = identifier_for(vocabulary, declared.raw, &[site, declared.markers()])?;
		Ok(Dependency::Instance(id))
	}

	pub fn identifier(&self) -> &Identifier {
		match self {
			Dependency::Instance(id)
			| Dependency::DeferredFactory(id)
			| Dependency::OptionalInstance(id)
			| Dependency::OptionalDeferredFactory(id)
			| Dependency::MultiInstance(id)
			| Dependency::MultiDeferredFactory(id) => id,
		}
	}

	pub(crate) fn resolve(&self, context: &mut ResolutionContext<'_>) -> DiResult<Argument> {
		let root = Arc::downgrade(context.root());
		match self {
			Dependency::Instance(id) => context.request_instance(id).map(Argument::Instance),
			Dependency::DeferredFactory(id) => {
				let provider = context.request_provider(id)?;
				Ok(Argument::Factory(provider.detach(root)))
			}
			Dependency::OptionalInstance(id) => {
				context.request_optional_instance(id).map(Argument::Optional)
			}
			Dependency::OptionalDeferredFactory(id) => {
				let provider = context.request_optional_provider(id)?;
				Ok(Argument::OptionalFactory(
					provider.map(|provider| provider.detach(root)),
				))
			}
			Dependency::MultiInstance(id) => {
				context.request_multiple_instances(id).map(Argument::Set)
			}
			Dependency::MultiDeferredFactory(id) => {
				let provider = context.request_multiple_providers(id)?;
				Ok(Argument::SetFactory(provider.detach(root)))
			}
		}
	}
}

fn set_element(declared: &DeclaredType) -> DiResult<&DeclaredType> {
	if !declared.is::<SetType>() {
		return Err(DiError::MultiBinding(format!(
			"To use multi-binding, you must inject a set of requested instances; found {}",
			declared.raw
		)));
	}
	declared.type_argument()
}

/// The dependencies of one constructor, method or producer, in parameter order.
#[derive(Debug, Clone, Default)]
pub(crate) struct DependencyBunch {
	dependencies: Vec<Dependency>,
}

impl DependencyBunch {
	pub(crate) fn collect(
		vocabulary: &dyn Vocabulary,
		owner: &str,
		parameters: &[ParameterInfo],
	) -> DiResult<Self> {
		let dependencies = parameters
			.iter()
			.enumerate()
			.map(|(index, parameter)| {
				Dependency::classify(vocabulary, parameter.declared_type(), parameter.markers())
					.context_with(|| format!("On parameter {} of {}", index, owner))
			})
			.collect::<DiResult<Vec<_>>>()?;
		Ok(Self { dependencies })
	}

	pub(crate) fn resolve_all(&self, context: &mut ResolutionContext<'_>) -> DiResult<Arguments> {
		let mut values = Vec::with_capacity(self.dependencies.len());
		for (index, dependency) in self.dependencies.iter().enumerate() {
			let value = dependency
				.resolve(context)
				.context_with(|| format!("On parameter {}", index))?;
			values.push(value);
		}
		Ok(Arguments { values })
	}
}

/// Argument access failures inside user-supplied closures
#[derive(Debug, Error)]
pub enum ArgumentError {
	#[error("No argument at position {index}; {len} arguments were supplied")]
	Missing { index: usize, len: usize },

	#[error("Expected {expected} argument but the dependency was resolved as {found}")]
	Shape {
		expected: &'static str,
		found: &'static str,
	},

	#[error("Argument holds {found}, not {expected}")]
	Type {
		expected: &'static str,
		found: &'static str,
	},
}

/// A resolved dependency.
#[derive(Debug, Clone)]
pub enum Argument {
	Instance(Instance),
	Factory(DeferredFactory),
	Optional(Option<Instance>),
	OptionalFactory(Option<DeferredFactory>),
	Set(ErasedSet),
	SetFactory(DeferredFactory),
}

impl Argument {
	fn shape(&self) -> &'static str {
		match self {
			Argument::Instance(_) => "an instance",
			Argument::Factory(_) => "a deferred factory",
			Argument::Optional(_) => "an optional instance",
			Argument::OptionalFactory(_) => "an optional deferred factory",
			Argument::Set(_) => "an instance set",
			Argument::SetFactory(_) => "a deferred set factory",
		}
	}

	fn shape_error(&self, expected: &'static str) -> ArgumentError {
		ArgumentError::Shape {
			expected,
			found: self.shape(),
		}
	}

	pub fn instance<T>(&self) -> Result<Arc<T>, ArgumentError>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		match self {
			Argument::Instance(instance) => typed(instance),
			other => Err(other.shape_error("an instance")),
		}
	}

	pub fn provider<T>(&self) -> Result<Provider<T>, ArgumentError>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		match self {
			Argument::Factory(factory) => Ok(Provider::new(factory.clone())),
			other => Err(other.shape_error("a deferred factory")),
		}
	}

	pub fn optional<T>(&self) -> Result<Option<Arc<T>>, ArgumentError>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		match self {
			Argument::Optional(instance) => instance.as_ref().map(typed::<T>).transpose(),
			other => Err(other.shape_error("an optional instance")),
		}
	}

	pub fn optional_provider<T>(&self) -> Result<Option<Provider<T>>, ArgumentError>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		match self {
			Argument::OptionalFactory(factory) => Ok(factory.clone().map(Provider::new)),
			other => Err(other.shape_error("an optional deferred factory")),
		}
	}

	pub fn set<T>(&self) -> Result<InstanceSet<T>, ArgumentError>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		match self {
			Argument::Set(set) => set.clone().into_typed().map_err(|found| ArgumentError::Type {
				expected: std::any::type_name::<T>(),
				found,
			}),
			other => Err(other.shape_error("an instance set")),
		}
	}

	pub fn set_provider<T>(&self) -> Result<SetProvider<T>, ArgumentError>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		match self {
			Argument::SetFactory(factory) => Ok(SetProvider::new(factory.clone())),
			other => Err(other.shape_error("a deferred set factory")),
		}
	}
}

fn typed<T>(instance: &Instance) -> Result<Arc<T>, ArgumentError>
where
	T: ?Sized + Send + Sync + 'static,
{
	instance.downcast::<T>().ok_or(ArgumentError::Type {
		expected: std::any::type_name::<T>(),
		found: instance.type_name(),
	})
}

/// Resolved arguments, in parameter order.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
	values: Vec<Argument>,
}

impl Arguments {
	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	pub fn get(&self, index: usize) -> Result<&Argument, ArgumentError> {
		self.values.get(index).ok_or(ArgumentError::Missing {
			index,
			len: self.values.len(),
		})
	}

	pub fn instance<T>(&self, index: usize) -> Result<Arc<T>, ArgumentError>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		self.get(index)?.instance()
	}

	pub fn provider<T>(&self, index: usize) -> Result<Provider<T>, ArgumentError>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		self.get(index)?.provider()
	}

	pub fn optional<T>(&self, index: usize) -> Result<Option<Arc<T>>, ArgumentError>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		self.get(index)?.optional()
	}

	pub fn optional_provider<T>(&self, index: usize) -> Result<Option<Provider<T>>, ArgumentError>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		self.get(index)?.optional_provider()
	}

	pub fn set<T>(&self, index: usize) -> Result<InstanceSet<T>, ArgumentError>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		self.get(index)?.set()
	}

	pub fn set_provider<T>(&self, index: usize) -> Result<SetProvider<T>, ArgumentError>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		self.get(index)?.set_provider()
	}
}

impl fmt::Display for Dependency {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Dependency::Instance(id) => write!(f, "{}", id),
			Dependency::DeferredFactory(id) => write!(f, "deferred {}", id),
			Dependency::OptionalInstance(id) => write!(f, "optional {}", id),
			Dependency::OptionalDeferredFactory(id) => write!(f, "optional deferred {}", id),
			Dependency::MultiInstance(id) => write!(f, "set of {}", id),
			Dependency::MultiDeferredFactory(id) => write!(f, "deferred set of {}", id),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ErrorKind;
	use crate::marker::multi_binding;
	use crate::marker::standard::{self, StandardVocabulary};
	use rstest::rstest;

	struct Wheel;
	struct Spare;

	#[rstest]
	fn test_plain_type_is_instance() {
		// Act
		let dependency =
			Dependency::classify(&StandardVocabulary, &DeclaredType::of::<Wheel>(), &[]).unwrap();

		// Assert
		assert_eq!(dependency, Dependency::Instance(Identifier::of::<Wheel>()));
	}

	#[rstest]
	fn test_deferred_factory() {
		// Arrange
		let declared = standard::deferred(DeclaredType::of::<Wheel>());

		// Act
		let dependency = Dependency::classify(&StandardVocabulary, &declared, &[]).unwrap();

		// Assert
		assert_eq!(
			dependency,
			Dependency::DeferredFactory(Identifier::of::<Wheel>())
		);
	}

	#[rstest]
	fn test_deferred_factory_of_marked_set() {
		// Arrange
		let declared = standard::deferred(DeclaredType::set(
			DeclaredType::of::<Wheel>().marked(standard::named("front")),
		));

		// Act
		let dependency =
			Dependency::classify(&StandardVocabulary, &declared, &[multi_binding()]).unwrap();

		// Assert
		assert_eq!(
			dependency,
			Dependency::MultiDeferredFactory(Identifier::named::<Wheel>("front"))
		);
	}

	#[rstest]
	fn test_multi_binding_set() {
		// Act
		let dependency = Dependency::classify(
			&StandardVocabulary,
			&DeclaredType::set(DeclaredType::of::<Wheel>()),
			&[multi_binding(), standard::qualifier::<Spare>()],
		)
		.unwrap();

		// Assert
		assert_eq!(
			dependency,
			Dependency::MultiInstance(Identifier::qualified::<Wheel, Spare>())
		);
	}

	#[rstest]
	fn test_multi_binding_on_non_set_is_rejected() {
		// Act
		let error = Dependency::classify(
			&StandardVocabulary,
			&DeclaredType::of::<Wheel>(),
			&[multi_binding()],
		)
		.unwrap_err();

		// Assert
		assert!(error.is_a(ErrorKind::MisconfiguredBindings));
		assert!(error.to_string().contains("set of requested instances"));
	}

	#[rstest]
	fn test_optional_instance_and_optional_factory() {
		// Arrange
		let optional = DeclaredType::optional(DeclaredType::of::<Wheel>());
		let optional_factory =
			DeclaredType::optional(standard::deferred(DeclaredType::of::<Wheel>()));

		// Act
		let first = Dependency::classify(&StandardVocabulary, &optional, &[]).unwrap();
		let second = Dependency::classify(&StandardVocabulary, &optional_factory, &[]).unwrap();

		// Assert
		assert_eq!(first, Dependency::OptionalInstance(Identifier::of::<Wheel>()));
		assert_eq!(
			second,
			Dependency::OptionalDeferredFactory(Identifier::of::<Wheel>())
		);
	}

	#[rstest]
	fn test_missing_type_argument_is_internal_failure() {
		// Arrange
		let declared = DeclaredType::of_raw(TypeKey::of::<OptionalType>());

		// Act
		let error = Dependency::classify(&StandardVocabulary, &declared, &[]).unwrap_err();

		// Assert
		assert_eq!(error.kind(), ErrorKind::InternalFailure);
	}

	#[rstest]
	fn test_qualifiers_merged_across_levels_must_be_unique() {
		// Arrange
		let declared = DeclaredType::optional(
			DeclaredType::of::<Wheel>().marked(standard::named("inner")),
		);

		// Act
		let error =
			Dependency::classify(&StandardVocabulary, &declared, &[standard::named("outer")])
				.unwrap_err();

		// Assert
		assert_eq!(error.kind(), ErrorKind::MisannotatedInjectee);
	}

	#[rstest]
	fn test_parameter_context_is_attached() {
		// Arrange
		let parameters = [
			ParameterInfo::of::<Wheel>(),
			ParameterInfo::of::<Spare>().marked(multi_binding()),
		];

		// Act
		let error = DependencyBunch::collect(&StandardVocabulary, "car::Car::new", &parameters)
			.unwrap_err();

		// Assert
		assert!(error.to_string().starts_with("On parameter 1 of car::Car::new"));
		assert_eq!(error.kind(), ErrorKind::MultiBinding);
	}

	#[rstest]
	fn test_argument_accessors_check_shape_and_type() {
		// Arrange
		let arguments = Arguments {
			values: vec![
				Argument::Instance(Instance::new(Arc::new(Wheel))),
				Argument::Optional(None),
			],
		};

		// Act & Assert
		assert!(arguments.instance::<Wheel>(0).is_ok());
		assert!(matches!(
			arguments.instance::<Spare>(0),
			Err(ArgumentError::Type { .. })
		));
		assert!(matches!(
			arguments.provider::<Wheel>(0),
			Err(ArgumentError::Shape { .. })
		));
		assert!(arguments.optional::<Wheel>(1).unwrap().is_none());
		assert!(matches!(
			arguments.instance::<Wheel>(2),
			Err(ArgumentError::Missing { index: 2, len: 2 })
		));
	}
}
