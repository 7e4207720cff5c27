//! Resolution context
//!
//! One context serves one top-level request tree. It tracks the identifiers
//! in progress for cycle detection and routes lookups to the container root.

use std::sync::Arc;

use tracing::trace;

use crate::cycle_detection::CycleDetectionState;
use crate::error::DiResult;
use crate::identifier::Identifier;
use crate::injector::InjectorCore;
use crate::instance::{ErasedSet, Instance};
use crate::provider::{SharedProvider, erased_set_of};

pub(crate) struct ResolutionContext<'a> {
	root: &'a Arc<InjectorCore>,
	cycles: CycleDetectionState,
}

impl<'a> ResolutionContext<'a> {
	pub(crate) fn new(root: &'a Arc<InjectorCore>) -> Self {
		Self {
			root,
			cycles: CycleDetectionState::new(root.settings().max_resolution_depth),
		}
	}

	pub(crate) fn root(&self) -> &'a Arc<InjectorCore> {
		self.root
	}

	/// Resolves a single instance of `identifier`.
	pub(crate) fn request_instance(&mut self, identifier: &Identifier) -> DiResult<Instance> {
		self.tracked(identifier, |context| {
			let provider = context.root.lookup_provider(identifier)?;
			provider.provide(context)
		})
	}

	/// The provider for `identifier`, without invoking it.
	pub(crate) fn request_provider(&self, identifier: &Identifier) -> DiResult<SharedProvider> {
		self.root.lookup_provider(identifier)
	}

	pub(crate) fn request_multiple_providers(
		&self,
		identifier: &Identifier,
	) -> DiResult<SharedProvider> {
		self.root.multiple_provider(identifier)
	}

	pub(crate) fn request_multiple_instances(
		&mut self,
		identifier: &Identifier,
	) -> DiResult<ErasedSet> {
		let provider = self.request_multiple_providers(identifier)?;
		let instance = self.tracked(identifier, |context| provider.provide(context))?;
		erased_set_of(&instance)
	}

	pub(crate) fn request_optional_provider(
		&self,
		identifier: &Identifier,
	) -> DiResult<Option<SharedProvider>> {
		self.root.optional_provider(identifier)
	}

	pub(crate) fn request_optional_instance(
		&mut self,
		identifier: &Identifier,
	) -> DiResult<Option<Instance>> {
		match self.request_optional_provider(identifier)? {
			Some(provider) => self
				.tracked(identifier, |context| provider.provide(context))
				.map(Some),
			None => Ok(None),
		}
	}

	/// Runs `resolve` with `identifier` marked in progress.
	///
	/// The marker is released whether or not `resolve` succeeds.
	fn tracked<R>(
		&mut self,
		identifier: &Identifier,
		resolve: impl FnOnce(&mut Self) -> DiResult<R>,
	) -> DiResult<R> {
		self.cycles.begin_resolution(identifier)?;
		trace!(
			depth = self.cycles.depth(),
			"Resolving {}",
			identifier
		);
		let result = resolve(self);
		self.cycles.end_resolution(identifier);
		result
	}
}
