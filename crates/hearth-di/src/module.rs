//! Binding modules
//!
//! A [`BindingModule`] groups producer declarations. Each [`ProducerInfo`]
//! binds the identifier formed by its return type and the qualifier among its
//! markers.
//!
//! ```
//! use std::sync::Arc;
//! use hearth_di::standard::{named, singleton};
//! use hearth_di::{BindingModule, ParameterInfo, ProducerInfo};
//!
//! trait Store: Send + Sync {}
//! struct MemoryStore;
//! impl Store for MemoryStore {}
//!
//! let module = BindingModule::new("storage").producer(
//! 	ProducerInfo::new::<dyn Store, _>("memory_store", |_| {
//! 		Ok(Some(Arc::new(MemoryStore) as Arc<dyn Store>))
//! 	})
//! 	.marked(singleton())
//! 	.marked(named("primary")),
//! );
//! assert_eq!(module.producers().len(), 1);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::context::ResolutionContext;
use crate::dependency::{Arguments, DependencyBunch};
use crate::error::{BoxError, DiError, DiResult, ResultExt};
use crate::identifier::TypeKey;
use crate::instance::Instance;
use crate::marker::Marker;
use crate::provider::NullableProvider;
use crate::type_info::ParameterInfo;

pub(crate) type ProduceFn =
	Arc<dyn Fn(Arguments) -> Result<Option<Instance>, BoxError> + Send + Sync>;

/// A producer declaration.
///
/// Returning `Ok(None)` is an invocation failure at resolution time.
#[derive(Clone)]
pub struct ProducerInfo {
	name: String,
	returns: TypeKey,
	markers: Vec<Marker>,
	parameters: Vec<ParameterInfo>,
	produce: ProduceFn,
}

impl ProducerInfo {
	pub fn new<T, F>(name: impl Into<String>, produce: F) -> Self
	where
		T: ?Sized + Send + Sync + 'static,
		F: Fn(Arguments) -> Result<Option<Arc<T>>, BoxError> + Send + Sync + 'static,
	{
		Self {
			name: name.into(),
			returns: TypeKey::of::<T>(),
			markers: Vec::new(),
			parameters: Vec::new(),
			produce: Arc::new(move |arguments| Ok(produce(arguments)?.map(Instance::new))),
		}
	}

	pub fn param(mut self, parameter: ParameterInfo) -> Self {
		self.parameters.push(parameter);
		self
	}

	pub fn marked(mut self, marker: Marker) -> Self {
		self.markers.push(marker);
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn returns(&self) -> TypeKey {
		self.returns
	}

	pub fn markers(&self) -> &[Marker] {
		&self.markers
	}

	pub fn parameters(&self) -> &[ParameterInfo] {
		&self.parameters
	}

	pub(crate) fn produce_fn(&self) -> ProduceFn {
		Arc::clone(&self.produce)
	}
}

impl fmt::Debug for ProducerInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ProducerInfo")
			.field("name", &self.name)
			.field("returns", &self.returns)
			.field("markers", &self.markers)
			.field("parameters", &self.parameters)
			.finish_non_exhaustive()
	}
}

/// A named group of producer declarations.
#[derive(Debug, Clone)]
pub struct BindingModule {
	name: String,
	producers: Vec<ProducerInfo>,
}

impl BindingModule {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			producers: Vec::new(),
		}
	}

	pub fn producer(mut self, producer: ProducerInfo) -> Self {
		self.producers.push(producer);
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn producers(&self) -> &[ProducerInfo] {
		&self.producers
	}
}

/// Invokes a producer with resolved arguments.
pub(crate) struct ProducerProvider {
	name: String,
	dependencies: DependencyBunch,
	produce: ProduceFn,
}

impl ProducerProvider {
	pub(crate) fn new(name: String, dependencies: DependencyBunch, produce: ProduceFn) -> Self {
		Self {
			name,
			dependencies,
			produce,
		}
	}
}

impl fmt::Debug for ProducerProvider {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ProducerProvider")
			.field("name", &self.name)
			.field("dependencies", &self.dependencies)
			.finish_non_exhaustive()
	}
}

impl NullableProvider for ProducerProvider {
	fn provide_nullable(&self, context: &mut ResolutionContext<'_>) -> DiResult<Option<Instance>> {
		let arguments = self
			.dependencies
			.resolve_all(context)
			.context_with(|| format!("On producer {}", self.name))?;
		(self.produce)(arguments).map_err(|source| {
			DiError::invocation(format!("Producer {} failed", self.name), source)
		})
	}

	fn description(&self) -> String {
		format!("Producer {}", self.name)
	}
}
