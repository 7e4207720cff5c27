//! Providers and provider decorators
//!
//! A provider produces an [`Instance`] given a [`ResolutionContext`]. Providers
//! can be detached into a [`DeferredFactory`] bound to the container root, which
//! is how lazy injection and cycle breaking work.

use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::debug;

use crate::context::ResolutionContext;
use crate::error::{DiError, DiResult};
use crate::identifier::Identifier;
use crate::injector::InjectorCore;
use crate::instance::{ErasedSet, Instance, InstanceSet};

/// A zero-argument factory detached from the resolution that created it.
///
/// Each call runs in a fresh resolution context.
#[derive(Clone)]
pub struct DeferredFactory {
	produce: Arc<dyn Fn() -> DiResult<Instance> + Send + Sync>,
}

impl DeferredFactory {
	pub(crate) fn new<F>(produce: F) -> Self
	where
		F: Fn() -> DiResult<Instance> + Send + Sync + 'static,
	{
		Self {
			produce: Arc::new(produce),
		}
	}

	pub(crate) fn fixed(instance: Instance) -> Self {
		Self::new(move || Ok(instance.clone()))
	}

	pub fn produce(&self) -> DiResult<Instance> {
		(self.produce)()
	}
}

impl fmt::Debug for DeferredFactory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DeferredFactory").finish_non_exhaustive()
	}
}

/// Typed deferred factory of `T`, injected in place of a direct instance.
pub struct Provider<T: ?Sized> {
	factory: DeferredFactory,
	_marker: PhantomData<fn() -> Arc<T>>,
}

impl<T> Provider<T>
where
	T: ?Sized + Send + Sync + 'static,
{
	pub(crate) fn new(factory: DeferredFactory) -> Self {
		Self {
			factory,
			_marker: PhantomData,
		}
	}

	pub fn get(&self) -> DiResult<Arc<T>> {
		let instance = self.factory.produce()?;
		instance.downcast::<T>().ok_or_else(|| {
			DiError::InternalFailure(format!(
				"Deferred factory produced {} where {} was expected",
				instance.type_name(),
				std::any::type_name::<T>()
			))
		})
	}
}

impl<T: ?Sized> Clone for Provider<T> {
	fn clone(&self) -> Self {
		Self {
			factory: self.factory.clone(),
			_marker: PhantomData,
		}
	}
}

impl<T: ?Sized> fmt::Debug for Provider<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Provider")
			.field("type_name", &std::any::type_name::<T>())
			.finish()
	}
}

/// Typed deferred factory of a multi-bound set of `T`.
pub struct SetProvider<T: ?Sized> {
	factory: DeferredFactory,
	_marker: PhantomData<fn() -> Arc<T>>,
}

impl<T> SetProvider<T>
where
	T: ?Sized + Send + Sync + 'static,
{
	pub(crate) fn new(factory: DeferredFactory) -> Self {
		Self {
			factory,
			_marker: PhantomData,
		}
	}

	pub fn get(&self) -> DiResult<InstanceSet<T>> {
		let instance = self.factory.produce()?;
		erased_set_of(&instance)?.into_typed().map_err(|found| {
			DiError::InternalFailure(format!(
				"Multi-binding produced {} where {} was expected",
				found,
				std::any::type_name::<T>()
			))
		})
	}
}

impl<T: ?Sized> Clone for SetProvider<T> {
	fn clone(&self) -> Self {
		Self {
			factory: self.factory.clone(),
			_marker: PhantomData,
		}
	}
}

impl<T: ?Sized> fmt::Debug for SetProvider<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SetProvider")
			.field("type_name", &std::any::type_name::<T>())
			.finish()
	}
}

/// Unwraps the set carried by an aggregate provider's instance.
pub(crate) fn erased_set_of(instance: &Instance) -> DiResult<ErasedSet> {
	instance
		.downcast::<ErasedSet>()
		.map(|set| set.as_ref().clone())
		.ok_or_else(|| {
			DiError::InternalFailure(format!(
				"Expected an instance set but found {}",
				instance.type_name()
			))
		})
}

/// Produces instances within a resolution context.
pub(crate) trait ContextualProvider: Send + Sync + fmt::Debug + 'static {
	fn provide(&self, context: &mut ResolutionContext<'_>) -> DiResult<Instance>;

	/// Detaches this provider into a factory bound to the container root.
	fn detach(self: Arc<Self>, root: Weak<InjectorCore>) -> DeferredFactory {
		detach_to_root(self, root)
	}

	/// Whether this provider may share its identifier with sibling providers.
	fn permits_multi_binding(&self) -> bool {
		false
	}
}

pub(crate) type SharedProvider = Arc<dyn ContextualProvider>;

fn detach_to_root<P>(provider: Arc<P>, root: Weak<InjectorCore>) -> DeferredFactory
where
	P: ContextualProvider + ?Sized,
{
	DeferredFactory::new(move || {
		let core = root.upgrade().ok_or_else(|| {
			DiError::InternalFailure(
				"The injector backing this deferred factory has been dropped".to_string(),
			)
		})?;
		let mut context = ResolutionContext::new(&core);
		provider.provide(&mut context)
	})
}

/// Always yields the same instance.
#[derive(Debug)]
pub(crate) struct FixedProvider {
	instance: Instance,
}

impl FixedProvider {
	pub(crate) fn new(instance: Instance) -> Self {
		Self { instance }
	}
}

impl ContextualProvider for FixedProvider {
	fn provide(&self, _context: &mut ResolutionContext<'_>) -> DiResult<Instance> {
		Ok(self.instance.clone())
	}

	fn detach(self: Arc<Self>, _root: Weak<InjectorCore>) -> DeferredFactory {
		DeferredFactory::fixed(self.instance.clone())
	}
}

/// Converts an instance of an implementor into an instance of the bound type.
pub(crate) type Converter = Arc<dyn Fn(&Instance) -> Option<Instance> + Send + Sync>;

/// Resolves another identifier in the same context.
pub(crate) struct AliasProvider {
	target: Identifier,
	convert: Option<Converter>,
}

impl AliasProvider {
	pub(crate) fn new(target: Identifier, convert: Option<Converter>) -> Self {
		Self { target, convert }
	}
}

impl fmt::Debug for AliasProvider {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AliasProvider")
			.field("target", &self.target)
			.field("converts", &self.convert.is_some())
			.finish()
	}
}

impl ContextualProvider for AliasProvider {
	fn provide(&self, context: &mut ResolutionContext<'_>) -> DiResult<Instance> {
		let instance = context.request_instance(&self.target)?;
		match &self.convert {
			None => Ok(instance),
			Some(convert) => convert(&instance).ok_or_else(|| {
				DiError::InternalFailure(format!(
					"Instance of {} resolved for {} could not be converted to the bound type",
					instance.type_name(),
					self.target
				))
			}),
		}
	}
}

/// A provider that may yield no instance.
pub(crate) trait NullableProvider: Send + Sync + fmt::Debug + 'static {
	fn provide_nullable(&self, context: &mut ResolutionContext<'_>) -> DiResult<Option<Instance>>;

	fn description(&self) -> String;
}

/// Turns an absent result into an invocation failure.
#[derive(Debug)]
pub(crate) struct NullChecked<P> {
	inner: P,
}

impl<P: NullableProvider> NullChecked<P> {
	pub(crate) fn new(inner: P) -> Self {
		Self { inner }
	}
}

impl<P: NullableProvider> ContextualProvider for NullChecked<P> {
	fn provide(&self, context: &mut ResolutionContext<'_>) -> DiResult<Instance> {
		match self.inner.provide_nullable(context)? {
			Some(instance) => Ok(instance),
			None => Err(DiError::Invocation {
				message: format!("{} returned no instance", self.inner.description()),
				source: None,
			}),
		}
	}
}

/// Computes its delegate at most once.
///
/// Concurrent first requests block until the first computation completes. A
/// failed computation is not cached. A request for this singleton made on the
/// computing thread while the computation runs, such as through a deferred
/// factory called from its own constructor, fails as a circular dependency.
#[derive(Debug)]
pub(crate) struct SingletonProvider {
	delegate: SharedProvider,
	label: String,
	instance: OnceCell<Instance>,
	initializing: Mutex<Option<ThreadId>>,
}

impl SingletonProvider {
	pub(crate) fn new(delegate: SharedProvider, label: String) -> Self {
		Self {
			delegate,
			label,
			instance: OnceCell::new(),
			initializing: Mutex::new(None),
		}
	}
}

/// Clears the initializing thread when the computation ends, including on failure.
struct InitializingGuard<'a>(&'a Mutex<Option<ThreadId>>);

impl Drop for InitializingGuard<'_> {
	fn drop(&mut self) {
		*self.0.lock() = None;
	}
}

impl ContextualProvider for SingletonProvider {
	fn provide(&self, context: &mut ResolutionContext<'_>) -> DiResult<Instance> {
		if let Some(instance) = self.instance.get() {
			return Ok(instance.clone());
		}
		let current = thread::current().id();
		if *self.initializing.lock() == Some(current) {
			return Err(DiError::CircularDependency {
				identifier: self.label.clone(),
				path: format!("{0} -> {0}", self.label),
			});
		}
		self.instance
			.get_or_try_init(|| -> DiResult<Instance> {
				*self.initializing.lock() = Some(current);
				let _guard = InitializingGuard(&self.initializing);
				let instance = self.delegate.provide(context)?;
				debug!("Created singleton instance of {}", instance.type_name());
				Ok(instance)
			})
			.cloned()
	}

	fn detach(self: Arc<Self>, root: Weak<InjectorCore>) -> DeferredFactory {
		if let Some(instance) = self.instance.get() {
			return DeferredFactory::fixed(instance.clone());
		}
		detach_to_root(self, root)
	}

	fn permits_multi_binding(&self) -> bool {
		self.delegate.permits_multi_binding()
	}
}

/// Marks its delegate as eligible for multi-binding.
#[derive(Debug)]
pub(crate) struct MultiBindable {
	delegate: SharedProvider,
}

impl MultiBindable {
	pub(crate) fn new(delegate: SharedProvider) -> Self {
		Self { delegate }
	}
}

impl ContextualProvider for MultiBindable {
	fn provide(&self, context: &mut ResolutionContext<'_>) -> DiResult<Instance> {
		self.delegate.provide(context)
	}

	fn detach(self: Arc<Self>, root: Weak<InjectorCore>) -> DeferredFactory {
		Arc::clone(&self.delegate).detach(root)
	}

	fn permits_multi_binding(&self) -> bool {
		true
	}
}

/// Queries every sibling provider and collects the results into a set.
#[derive(Debug)]
pub(crate) struct AggregateProvider {
	providers: Arc<[SharedProvider]>,
}

impl AggregateProvider {
	pub(crate) fn new(providers: Arc<[SharedProvider]>) -> Self {
		Self { providers }
	}
}

impl ContextualProvider for AggregateProvider {
	fn provide(&self, context: &mut ResolutionContext<'_>) -> DiResult<Instance> {
		let mut set = ErasedSet::new();
		for provider in self.providers.iter() {
			set.insert(provider.provide(context)?);
		}
		Ok(Instance::new(Arc::new(set)))
	}
}

/// Yields an empty set.
#[derive(Debug)]
pub(crate) struct EmptySetProvider;

impl ContextualProvider for EmptySetProvider {
	fn provide(&self, _context: &mut ResolutionContext<'_>) -> DiResult<Instance> {
		Ok(Instance::new(Arc::new(ErasedSet::new())))
	}
}
