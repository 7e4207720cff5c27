//! Injector builder
//!
//! Collects settings, binding modules, registered types and explicit bindings.
//! Binding mistakes are recorded as they are made and reported by
//! [`InjectorBuilder::build`], so the builder can be used fluently.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::configuration::{Configuration, DelegateBinding};
use crate::error::{DiError, DiResult};
use crate::identifier::{Identifier, TypeKey};
use crate::injector::{Injector, InjectorCore};
use crate::instance::Instance;
use crate::marker::{StandardVocabulary, Vocabulary};
use crate::module::BindingModule;
use crate::provider::Converter;
use crate::settings::InjectionSettings;
use crate::type_info::{Injectable, TypeCatalog, TypeInfo};

/// Builder for [`Injector`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use hearth_di::{Identifier, Injector};
///
/// trait Greeter: Send + Sync {
/// 	fn greet(&self) -> String;
/// }
///
/// struct English;
///
/// impl Greeter for English {
/// 	fn greet(&self) -> String {
/// 		"hello".to_string()
/// 	}
/// }
///
/// let injector = Injector::builder()
/// 	.bind_instance(Identifier::named::<English>("english"), Arc::new(English))
/// 	.bind_implementor::<dyn Greeter, English>(
/// 		Identifier::of::<dyn Greeter>(),
/// 		Identifier::named::<English>("english"),
/// 		|english: Arc<English>| -> Arc<dyn Greeter> { english },
/// 	)
/// 	.build()
/// 	.unwrap();
///
/// assert_eq!(injector.request::<dyn Greeter>().unwrap().greet(), "hello");
/// ```
pub struct InjectorBuilder {
	settings: InjectionSettings,
	vocabulary: Arc<dyn Vocabulary>,
	modules: Vec<BindingModule>,
	catalog: TypeCatalog,
	delegates: IndexMap<Identifier, DelegateBinding>,
	instances: IndexMap<Identifier, Instance>,
	failure: Option<DiError>,
}

impl Default for InjectorBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl InjectorBuilder {
	pub fn new() -> Self {
		Self {
			settings: InjectionSettings::default(),
			vocabulary: Arc::new(StandardVocabulary),
			modules: Vec::new(),
			catalog: TypeCatalog::new(),
			delegates: IndexMap::new(),
			instances: IndexMap::new(),
			failure: None,
		}
	}

	/// Allow injection into non-public constructors and members.
	pub fn private_injection(mut self, enabled: bool) -> Self {
		self.settings.private_injection = enabled;
		self
	}

	/// Inject static members, once per injector.
	pub fn static_injection(mut self, enabled: bool) -> Self {
		self.settings.static_injection = enabled;
		self
	}

	/// Allow several producers to share an identifier.
	pub fn multi_bindings(mut self, enabled: bool) -> Self {
		self.settings.multi_bindings = enabled;
		self
	}

	/// Allow optional dependencies and optional requests.
	pub fn optional_bindings(mut self, enabled: bool) -> Self {
		self.settings.optional_bindings = enabled;
		self
	}

	pub fn max_resolution_depth(mut self, depth: usize) -> Self {
		self.settings.max_resolution_depth = depth;
		self
	}

	/// Replaces every setting at once, e.g. with settings loaded from TOML.
	pub fn settings(mut self, settings: InjectionSettings) -> Self {
		self.settings = settings;
		self
	}

	pub fn vocabulary(mut self, vocabulary: impl Vocabulary + 'static) -> Self {
		self.vocabulary = Arc::new(vocabulary);
		self
	}

	pub fn add_module(mut self, module: BindingModule) -> Self {
		self.modules.push(module);
		self
	}

	pub fn add_modules(mut self, modules: impl IntoIterator<Item = BindingModule>) -> Self {
		self.modules.extend(modules);
		self
	}

	/// Registers `T` for automatic binding.
	pub fn register<T: Injectable>(self) -> Self {
		self.register_type(T::type_info())
	}

	pub fn register_type(mut self, info: TypeInfo) -> Self {
		self.catalog.insert(info);
		self
	}

	/// Binds `identifier` to whatever `target` resolves to.
	pub fn bind_identifier(self, identifier: Identifier, target: Identifier) -> Self {
		if identifier.type_key() != target.type_key() {
			let error = DiError::MisconfiguredBindings(format!(
				"Cannot bind {} to {}: the types differ",
				identifier, target
			));
			return self.fail(error);
		}
		self.bind_delegate(
			identifier,
			DelegateBinding {
				target,
				convert: None,
			},
		)
	}

	/// Binds `identifier` of type `T` to an implementor identifier of type `I`.
	pub fn bind_implementor<T, I>(
		self,
		identifier: Identifier,
		implementor: Identifier,
		upcast: fn(Arc<I>) -> Arc<T>,
	) -> Self
	where
		T: ?Sized + Send + Sync + 'static,
		I: ?Sized + Send + Sync + 'static,
	{
		if let Err(error) = expect_key::<T>(&identifier).and(expect_key::<I>(&implementor)) {
			return self.fail(error);
		}
		let convert: Converter = Arc::new(move |instance: &Instance| {
			instance
				.downcast::<I>()
				.map(|implementor| Instance::new(upcast(implementor)))
		});
		self.bind_delegate(
			identifier,
			DelegateBinding {
				target: implementor,
				convert: Some(convert),
			},
		)
	}

	/// Binds `identifier` to a fixed instance.
	pub fn bind_instance<T>(mut self, identifier: Identifier, instance: Arc<T>) -> Self
	where
		T: ?Sized + Send + Sync + 'static,
	{
		if let Err(error) = expect_key::<T>(&identifier) {
			return self.fail(error);
		}
		if self.instances.contains_key(&identifier) {
			return self.fail(duplicate(&identifier));
		}
		debug!("Bound instance to {}", identifier);
		self.instances.insert(identifier, Instance::new(instance));
		self
	}

	/// Binds the unqualified identifier of `T` to a fixed instance.
	pub fn bind_type_instance<T>(self, instance: Arc<T>) -> Self
	where
		T: ?Sized + Send + Sync + 'static,
	{
		self.bind_instance(Identifier::of::<T>(), instance)
	}

	pub fn build(self) -> DiResult<Injector> {
		if let Some(failure) = self.failure {
			return Err(failure);
		}
		self.settings
			.validate()
			.map_err(|error| DiError::MisconfiguredBindings(error.to_string()))?;

		let registry = Configuration {
			settings: &self.settings,
			vocabulary: self.vocabulary.as_ref(),
			modules: &self.modules,
			delegates: &self.delegates,
			instances: &self.instances,
		}
		.configure()?;

		Ok(Injector::from_core(InjectorCore::new(
			self.settings,
			self.vocabulary,
			self.catalog,
			registry,
		)))
	}

	fn bind_delegate(mut self, identifier: Identifier, delegate: DelegateBinding) -> Self {
		if identifier == delegate.target {
			let error = DiError::MisconfiguredBindings(format!(
				"Cannot bind identifier {} to itself",
				identifier
			));
			return self.fail(error);
		}
		if self.delegates.contains_key(&identifier) {
			return self.fail(duplicate(&identifier));
		}
		debug!("Bound {} to {}", identifier, delegate.target);
		self.delegates.insert(identifier, delegate);
		self
	}

	/// Keeps the first failure; later ones are only logged.
	fn fail(mut self, error: DiError) -> Self {
		match self.failure {
			Some(_) => warn!("Ignoring further binding failure: {}", error),
			None => self.failure = Some(error),
		}
		self
	}
}

fn duplicate(identifier: &Identifier) -> DiError {
	DiError::MisconfiguredBindings(format!("Binding already exists for identifier {}", identifier))
}

fn expect_key<T: ?Sized + 'static>(identifier: &Identifier) -> DiResult<()> {
	if identifier.type_key() == TypeKey::of::<T>() {
		return Ok(());
	}
	Err(DiError::MisconfiguredBindings(format!(
		"Identifier {} does not match the bound type {}",
		identifier,
		std::any::type_name::<T>()
	)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ErrorKind;
	use rstest::rstest;

	struct Port(u16);

	#[rstest]
	fn test_duplicate_instance_is_reported_at_build() {
		// Arrange
		let builder = InjectorBuilder::new()
			.bind_type_instance(Arc::new(Port(1)))
			.bind_type_instance(Arc::new(Port(2)));

		// Act
		let error = builder.build().unwrap_err();

		// Assert
		assert_eq!(error.kind(), ErrorKind::MisconfiguredBindings);
		assert!(error.to_string().contains("Binding already exists"));
	}

	#[rstest]
	fn test_self_binding_is_rejected() {
		// Arrange
		let id = Identifier::of::<Port>();

		// Act
		let error = InjectorBuilder::new()
			.bind_identifier(id.clone(), id)
			.build()
			.unwrap_err();

		// Assert
		assert!(error.to_string().contains("to itself"));
	}

	#[rstest]
	fn test_mismatched_instance_type_is_rejected() {
		// Act
		let error = InjectorBuilder::new()
			.bind_instance(Identifier::of::<u32>(), Arc::new(Port(1)))
			.build()
			.unwrap_err();

		// Assert
		assert!(error.to_string().contains("does not match"));
	}

	#[rstest]
	fn test_first_failure_wins() {
		// Act
		let error = InjectorBuilder::new()
			.bind_identifier(Identifier::of::<Port>(), Identifier::of::<u32>())
			.bind_instance(Identifier::of::<u32>(), Arc::new(Port(1)))
			.build()
			.unwrap_err();

		// Assert
		assert!(error.to_string().contains("the types differ"));
	}

	#[rstest]
	fn test_invalid_settings_fail_build() {
		// Act
		let result = InjectorBuilder::new().max_resolution_depth(0).build();

		// Assert
		assert_eq!(result.unwrap_err().kind(), ErrorKind::MisconfiguredBindings);
	}

	#[rstest]
	fn test_registered_types_are_retained() {
		// Arrange
		let info = TypeInfo::builder::<Port>().build();

		// Act
		let builder = InjectorBuilder::new().register_type(info);

		// Assert
		assert!(builder.catalog.get(&TypeKey::of::<Port>()).is_some());
	}
}
