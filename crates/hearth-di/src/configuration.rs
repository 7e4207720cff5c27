//! Registry configuration
//!
//! Installs the providers declared by binding modules and the builder's
//! explicit bindings, then freezes the registry for concurrent resolution.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::dependency::DependencyBunch;
use crate::error::{DiError, DiResult, ResultExt};
use crate::identifier::Identifier;
use crate::instance::Instance;
use crate::marker::{Vocabulary, has_multi_binding, identifier_for};
use crate::module::{BindingModule, ProducerInfo, ProducerProvider};
use crate::provider::{
	AliasProvider, Converter, FixedProvider, MultiBindable, NullChecked, SharedProvider,
	SingletonProvider,
};
use crate::registry::{ConcurrentStore, ConfigurationStore, ProviderRegistry};
use crate::settings::InjectionSettings;

/// An identifier bound to another identifier.
#[derive(Clone)]
pub(crate) struct DelegateBinding {
	pub(crate) target: Identifier,
	pub(crate) convert: Option<Converter>,
}

/// Everything installed into the registry before the injector is built.
pub(crate) struct Configuration<'a> {
	pub(crate) settings: &'a InjectionSettings,
	pub(crate) vocabulary: &'a dyn Vocabulary,
	pub(crate) modules: &'a [BindingModule],
	pub(crate) delegates: &'a IndexMap<Identifier, DelegateBinding>,
	pub(crate) instances: &'a IndexMap<Identifier, Instance>,
}

impl Configuration<'_> {
	/// Installs producers, then delegates, then instances, and freezes the result.
	pub(crate) fn configure(&self) -> DiResult<ProviderRegistry<ConcurrentStore>> {
		let registry = ProviderRegistry::new(self.settings.multi_bindings);

		for module in self.modules {
			debug!(
				"Configuring module {} with {} producers",
				module.name(),
				module.producers().len()
			);
			for producer in module.producers() {
				self.install_producer(&registry, producer)?;
			}
		}

		for (identifier, delegate) in self.delegates {
			let provider: SharedProvider = Arc::new(AliasProvider::new(
				delegate.target.clone(),
				delegate.convert.clone(),
			));
			install(&registry, identifier, provider)?;
		}

		for (identifier, instance) in self.instances {
			let provider: SharedProvider = Arc::new(FixedProvider::new(instance.clone()));
			install(&registry, identifier, provider)?;
		}

		let registry = registry.freeze();
		info!(
			"Configured injector with {} bindings from {} modules",
			registry.len(),
			self.modules.len()
		);
		Ok(registry)
	}

	fn install_producer(
		&self,
		registry: &ProviderRegistry<ConfigurationStore>,
		producer: &ProducerInfo,
	) -> DiResult<()> {
		let identifier = identifier_for(self.vocabulary, producer.returns(), &[producer.markers()])
			.context_with(|| format!("On producer {}", producer.name()))?;
		let dependencies =
			DependencyBunch::collect(self.vocabulary, producer.name(), producer.parameters())
				.context_with(|| format!("On producer {}", producer.name()))?;

		let mut provider: SharedProvider = Arc::new(NullChecked::new(ProducerProvider::new(
			producer.name().to_string(),
			dependencies,
			producer.produce_fn(),
		)));
		if self.vocabulary.has_singleton(producer.markers()) {
			provider = Arc::new(SingletonProvider::new(provider, identifier.to_string()));
		}
		if registry.permits_multi_binding() && has_multi_binding(producer.markers()) {
			provider = Arc::new(MultiBindable::new(provider));
		}

		match registry.install(&identifier, provider) {
			None => Ok(()),
			Some(reason) => Err(DiError::MisconfiguredBindings(format!(
				"Failed to bind producer {}. {}",
				producer.name(),
				reason
			))),
		}
	}
}

fn install(
	registry: &ProviderRegistry<ConfigurationStore>,
	identifier: &Identifier,
	provider: SharedProvider,
) -> DiResult<()> {
	match registry.install(identifier, provider) {
		None => Ok(()),
		Some(reason) => Err(DiError::MisconfiguredBindings(reason)),
	}
}
