//! Automatic binding of concrete types
//!
//! A registered, unqualified, non-abstract type without an explicit binding is
//! bound on first access: a constructor is selected, its parameters classified,
//! and the result wrapped with post-construction member injection and, for
//! types carrying the singleton marker, single-instance scoping.

mod constructor_scan;
mod member_scan;

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::context::ResolutionContext;
use crate::dependency::DependencyBunch;
use crate::error::{DiError, DiResult, ResultExt};
use crate::instance::Instance;
use crate::marker::Vocabulary;
use crate::provider::{ContextualProvider, SharedProvider, SingletonProvider};
use crate::settings::InjectionSettings;
use crate::type_info::{ConstructFn, Receiver, TypeInfo};

pub(crate) use constructor_scan::select_constructor;
pub(crate) use member_scan::{MemberInjection, StaticMemberKey, scan_members};

/// Builds the provider used to bind `info` automatically.
pub(crate) fn automatic_provider(
	settings: &InjectionSettings,
	vocabulary: &dyn Vocabulary,
	info: &TypeInfo,
) -> DiResult<SharedProvider> {
	let constructor = select_constructor(settings, vocabulary, info)?;
	let name = format!("{}::{}", info.key(), constructor.name());
	let dependencies = DependencyBunch::collect(vocabulary, &name, constructor.parameters())?;

	let mut provider: SharedProvider = Arc::new(ConstructorProvider {
		name,
		dependencies,
		construct: constructor.construct_fn(),
	});

	let injections = scan_members(settings, vocabulary, info)?;
	if !injections.is_empty() {
		provider = Arc::new(PostConstructionProvider {
			delegate: provider,
			receiver: info.receiver(),
			injections: injections.into(),
		});
	}

	if vocabulary.has_singleton(info.markers()) {
		provider = Arc::new(SingletonProvider::new(provider, info.key().to_string()));
	}

	debug!("Created automatic binding for {}", info.key());
	Ok(provider)
}

/// Invokes a constructor with resolved arguments.
struct ConstructorProvider {
	name: String,
	dependencies: DependencyBunch,
	construct: ConstructFn,
}

impl fmt::Debug for ConstructorProvider {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ConstructorProvider")
			.field("name", &self.name)
			.field("dependencies", &self.dependencies)
			.finish_non_exhaustive()
	}
}

impl ContextualProvider for ConstructorProvider {
	fn provide(&self, context: &mut ResolutionContext<'_>) -> DiResult<Instance> {
		let arguments = self
			.dependencies
			.resolve_all(context)
			.context_with(|| format!("Invoking constructor {}", self.name))?;
		(self.construct)(arguments).map_err(|source| {
			DiError::invocation(format!("Constructor {} failed", self.name), source)
		})
	}
}

/// Injects members into the instance produced by its delegate.
struct PostConstructionProvider {
	delegate: SharedProvider,
	receiver: Receiver,
	injections: Arc<[MemberInjection]>,
}

impl fmt::Debug for PostConstructionProvider {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PostConstructionProvider")
			.field("delegate", &self.delegate)
			.field("injections", &self.injections)
			.finish_non_exhaustive()
	}
}

impl ContextualProvider for PostConstructionProvider {
	fn provide(&self, context: &mut ResolutionContext<'_>) -> DiResult<Instance> {
		let instance = self.delegate.provide(context)?;
		for injection in self.injections.iter() {
			injection.inject(&instance, self.receiver, context)?;
		}
		Ok(instance)
	}
}
