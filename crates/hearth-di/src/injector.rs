//! The container root
//!
//! An [`Injector`] owns the frozen provider registry, the catalog of types
//! eligible for automatic binding, and the once-set of static members already
//! injected. Every request runs in a fresh resolution context, so requests
//! from different threads never share in-progress state.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::binding::{self, StaticMemberKey};
use crate::builder::InjectorBuilder;
use crate::context::ResolutionContext;
use crate::error::{DiError, DiResult};
use crate::identifier::{Identifier, TypeKey};
use crate::instance::{Instance, InstanceSet};
use crate::marker::Vocabulary;
use crate::provider::SharedProvider;
use crate::registry::{ConcurrentStore, ProviderRegistry};
use crate::settings::InjectionSettings;
use crate::type_info::TypeCatalog;

/// State shared by an injector and the deferred factories it hands out.
pub(crate) struct InjectorCore {
	settings: InjectionSettings,
	vocabulary: Arc<dyn Vocabulary>,
	catalog: TypeCatalog,
	registry: ProviderRegistry<ConcurrentStore>,
	static_injected: Mutex<HashSet<StaticMemberKey>>,
}

impl InjectorCore {
	pub(crate) fn new(
		settings: InjectionSettings,
		vocabulary: Arc<dyn Vocabulary>,
		catalog: TypeCatalog,
		registry: ProviderRegistry<ConcurrentStore>,
	) -> Self {
		Self {
			settings,
			vocabulary,
			catalog,
			registry,
			static_injected: Mutex::new(HashSet::new()),
		}
	}

	pub(crate) fn settings(&self) -> &InjectionSettings {
		&self.settings
	}

	/// The provider for `identifier`, binding it automatically if needed.
	pub(crate) fn lookup_provider(&self, identifier: &Identifier) -> DiResult<SharedProvider> {
		self.registry
			.request_single(identifier, |missing| self.bind_automatically(missing))
	}

	pub(crate) fn multiple_provider(&self, identifier: &Identifier) -> DiResult<SharedProvider> {
		self.registry.request_multiple(identifier)
	}

	pub(crate) fn optional_provider(
		&self,
		identifier: &Identifier,
	) -> DiResult<Option<SharedProvider>> {
		if !self.settings.optional_bindings {
			return Err(DiError::OptionalBinding(format!(
				"Optional binding was requested for identifier {}, but the optional binding feature must be explicitly enabled with InjectorBuilder::optional_bindings(true)",
				identifier
			)));
		}
		self.registry.request_optional(identifier)
	}

	/// Records `key` as injected. Returns `false` if it already was.
	pub(crate) fn mark_static_injected(&self, key: &StaticMemberKey) -> bool {
		self.static_injected.lock().insert(key.clone())
	}

	fn bind_automatically(&self, identifier: &Identifier) -> DiResult<SharedProvider> {
		if identifier.is_qualified() {
			return Err(DiError::MisconfiguredBindings(format!(
				"No binding found for qualified identifier {}",
				identifier
			)));
		}
		let info = self.catalog.get(&identifier.type_key()).ok_or_else(|| {
			DiError::MisconfiguredBindings(format!("No binding found for identifier {}", identifier))
		})?;
		if info.is_abstract() {
			return Err(DiError::MisconfiguredBindings(format!(
				"No binding found for abstract identifier {}",
				identifier
			)));
		}
		debug!("Binding {} automatically", identifier);
		binding::automatic_provider(&self.settings, self.vocabulary.as_ref(), &info)
	}
}

impl fmt::Debug for InjectorCore {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("InjectorCore")
			.field("settings", &self.settings)
			.field("vocabulary", &self.vocabulary)
			.field("registered_types", &self.catalog.len())
			.field("bindings", &self.registry.len())
			.finish_non_exhaustive()
	}
}

/// A configured dependency-injection container.
///
/// Injectors are cheap to clone; clones share bindings and singletons.
///
/// ```
/// use std::sync::Arc;
/// use hearth_di::Injector;
///
/// struct Config {
/// 	port: u16,
/// }
///
/// let injector = Injector::builder()
/// 	.bind_type_instance(Arc::new(Config { port: 8080 }))
/// 	.build()
/// 	.unwrap();
///
/// let config = injector.request::<Config>().unwrap();
/// assert_eq!(config.port, 8080);
/// ```
#[derive(Clone)]
pub struct Injector {
	core: Arc<InjectorCore>,
}

impl Injector {
	pub fn builder() -> InjectorBuilder {
		InjectorBuilder::new()
	}

	pub(crate) fn from_core(core: InjectorCore) -> Self {
		Self {
			core: Arc::new(core),
		}
	}

	pub fn settings(&self) -> &InjectionSettings {
		self.core.settings()
	}

	/// An instance bound to the unqualified identifier of `T`.
	pub fn request<T>(&self) -> DiResult<Arc<T>>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		self.request_identifier(&Identifier::of::<T>())
	}

	/// An instance bound to `identifier`, whose type must be `T`.
	pub fn request_identifier<T>(&self, identifier: &Identifier) -> DiResult<Arc<T>>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		expect_type::<T>(identifier)?;
		let instance = self.request_instance(identifier)?;
		typed(instance)
	}

	/// An erased instance bound to `identifier`.
	pub fn request_instance(&self, identifier: &Identifier) -> DiResult<Instance> {
		let mut context = ResolutionContext::new(&self.core);
		context.request_instance(identifier)
	}

	/// An instance of `T` if one is explicitly bound.
	///
	/// Requires [`InjectorBuilder::optional_bindings`].
	pub fn request_optional<T>(&self) -> DiResult<Option<Arc<T>>>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		self.request_optional_identifier(&Identifier::of::<T>())
	}

	pub fn request_optional_identifier<T>(&self, identifier: &Identifier) -> DiResult<Option<Arc<T>>>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		expect_type::<T>(identifier)?;
		let mut context = ResolutionContext::new(&self.core);
		context
			.request_optional_instance(identifier)?
			.map(typed)
			.transpose()
	}

	/// Every instance multi-bound to the unqualified identifier of `T`.
	///
	/// Requires [`InjectorBuilder::multi_bindings`].
	pub fn request_multiple<T>(&self) -> DiResult<InstanceSet<T>>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		self.request_multiple_identifier(&Identifier::of::<T>())
	}

	pub fn request_multiple_identifier<T>(&self, identifier: &Identifier) -> DiResult<InstanceSet<T>>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		expect_type::<T>(identifier)?;
		let mut context = ResolutionContext::new(&self.core);
		context
			.request_multiple_instances(identifier)?
			.into_typed()
			.map_err(|found| {
				DiError::InternalFailure(format!(
					"Multi-binding for {} produced an instance of {}",
					identifier, found
				))
			})
	}
}

impl fmt::Debug for Injector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Injector").field("core", &self.core).finish()
	}
}

fn expect_type<T: ?Sized + 'static>(identifier: &Identifier) -> DiResult<()> {
	if identifier.type_key() == TypeKey::of::<T>() {
		return Ok(());
	}
	Err(DiError::InternalFailure(format!(
		"Identifier {} cannot be requested as {}",
		identifier,
		std::any::type_name::<T>()
	)))
}

fn typed<T>(instance: Instance) -> DiResult<Arc<T>>
where
	T: ?Sized + Send + Sync + 'static,
{
	instance.downcast::<T>().ok_or_else(|| {
		DiError::InternalFailure(format!(
			"Resolved an instance of {} where {} was expected",
			instance.type_name(),
			std::any::type_name::<T>()
		))
	})
}
