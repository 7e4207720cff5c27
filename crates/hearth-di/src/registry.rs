//! Provider registry
//!
//! Maps identifiers to providers. Configuration installs providers into a
//! plain map; [`ProviderRegistry::freeze`] then copies the entries into a
//! concurrent map used during resolution.
//!
//! Updates follow an optimistic discipline: read the current entry, compute the
//! replacement, compare-and-replace, retry on mismatch.

use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::hash_map::Entry as MapEntry;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry as DashEntry;
use tracing::debug;

use crate::error::{DiError, DiResult};
use crate::identifier::Identifier;
use crate::provider::{AggregateProvider, EmptySetProvider, SharedProvider};

/// Registry entry: one provider, or several under multi-binding.
#[derive(Clone)]
pub(crate) enum Binding {
	Single(SharedProvider),
	Multiple(Arc<[SharedProvider]>),
}

impl Binding {
	/// Snapshot identity, used for compare-and-replace.
	fn same_as(&self, other: &Binding) -> bool {
		match (self, other) {
			(Binding::Single(a), Binding::Single(b)) => Arc::ptr_eq(a, b),
			(Binding::Multiple(a), Binding::Multiple(b)) => Arc::ptr_eq(a, b),
			_ => false,
		}
	}
}

/// Backing map of a registry
pub(crate) trait ProviderStore {
	fn lookup(&self, identifier: &Identifier) -> Option<Binding>;

	/// Inserts `binding` if the identifier is vacant, otherwise returns the occupant.
	fn put_if_absent(&self, identifier: &Identifier, binding: Binding) -> Option<Binding>;

	/// Replaces the entry if it is still `expected`.
	fn replace(&self, identifier: &Identifier, expected: &Binding, binding: Binding) -> bool;

	fn len(&self) -> usize;
}

/// Single-threaded store used while configuring.
#[derive(Default)]
pub(crate) struct ConfigurationStore {
	map: RefCell<HashMap<Identifier, Binding>>,
}

impl ProviderStore for ConfigurationStore {
	fn lookup(&self, identifier: &Identifier) -> Option<Binding> {
		self.map.borrow().get(identifier).cloned()
	}

	fn put_if_absent(&self, identifier: &Identifier, binding: Binding) -> Option<Binding> {
		match self.map.borrow_mut().entry(identifier.clone()) {
			MapEntry::Occupied(occupied) => Some(occupied.get().clone()),
			MapEntry::Vacant(vacant) => {
				vacant.insert(binding);
				None
			}
		}
	}

	fn replace(&self, identifier: &Identifier, expected: &Binding, binding: Binding) -> bool {
		match self.map.borrow_mut().get_mut(identifier) {
			Some(current) if current.same_as(expected) => {
				*current = binding;
				true
			}
			_ => false,
		}
	}

	fn len(&self) -> usize {
		self.map.borrow().len()
	}
}

/// Concurrent store used after [`ProviderRegistry::freeze`].
#[derive(Default)]
pub(crate) struct ConcurrentStore {
	map: DashMap<Identifier, Binding>,
}

impl ProviderStore for ConcurrentStore {
	fn lookup(&self, identifier: &Identifier) -> Option<Binding> {
		self.map.get(identifier).map(|entry| entry.value().clone())
	}

	fn put_if_absent(&self, identifier: &Identifier, binding: Binding) -> Option<Binding> {
		match self.map.entry(identifier.clone()) {
			DashEntry::Occupied(occupied) => Some(occupied.get().clone()),
			DashEntry::Vacant(vacant) => {
				vacant.insert(binding);
				None
			}
		}
	}

	fn replace(&self, identifier: &Identifier, expected: &Binding, binding: Binding) -> bool {
		match self.map.get_mut(identifier) {
			Some(mut current) if current.same_as(expected) => {
				*current = binding;
				true
			}
			_ => false,
		}
	}

	fn len(&self) -> usize {
		self.map.len()
	}
}

/// Identifier to provider map.
///
/// With multi-binding disabled, every identifier holds at most one provider
/// and any multi-value request is rejected.
pub(crate) struct ProviderRegistry<S> {
	store: S,
	multi_binding: bool,
}

impl ProviderRegistry<ConfigurationStore> {
	pub(crate) fn new(multi_binding: bool) -> Self {
		Self {
			store: ConfigurationStore::default(),
			multi_binding,
		}
	}

	/// Copies the entries into a concurrent registry.
	pub(crate) fn freeze(self) -> ProviderRegistry<ConcurrentStore> {
		let map: DashMap<Identifier, Binding> = self.store.map.into_inner().into_iter().collect();
		debug!("Froze provider registry with {} bindings", map.len());
		ProviderRegistry {
			store: ConcurrentStore { map },
			multi_binding: self.multi_binding,
		}
	}
}

impl<S: ProviderStore> ProviderRegistry<S> {
	pub(crate) fn permits_multi_binding(&self) -> bool {
		self.multi_binding
	}

	pub(crate) fn len(&self) -> usize {
		self.store.len()
	}

	/// Installs `provider` at `identifier`.
	///
	/// Returns the reason on failure so the caller can add context.
	pub(crate) fn install(&self, identifier: &Identifier, provider: SharedProvider) -> Option<String> {
		loop {
			let Some(existing) = self.store.lookup(identifier) else {
				if self
					.store
					.put_if_absent(identifier, Binding::Single(Arc::clone(&provider)))
					.is_none()
				{
					debug!("Installed provider for {}", identifier);
					return None;
				}
				continue;
			};

			if !self.multi_binding {
				return Some(format!("Duplicate binding exists for identifier {}", identifier));
			}
			if !provider.permits_multi_binding() {
				return Some(not_multi_bindable(identifier));
			}
			let appended = match &existing {
				Binding::Single(current) => {
					if !current.permits_multi_binding() {
						return Some(not_multi_bindable(identifier));
					}
					vec![Arc::clone(current), Arc::clone(&provider)]
				}
				Binding::Multiple(current) => {
					let mut providers = current.to_vec();
					providers.push(Arc::clone(&provider));
					providers
				}
			};
			if self
				.store
				.replace(identifier, &existing, Binding::Multiple(appended.into()))
			{
				debug!("Appended multi-bound provider for {}", identifier);
				return None;
			}
		}
	}

	/// The provider for `identifier`, synthesising one with `on_miss` if none is
	/// installed.
	///
	/// `on_miss` may run more than once under contention; only the first
	/// provider to be installed is ever returned.
	pub(crate) fn request_single<F>(&self, identifier: &Identifier, on_miss: F) -> DiResult<SharedProvider>
	where
		F: FnOnce(&Identifier) -> DiResult<SharedProvider>,
	{
		if let Some(binding) = self.store.lookup(identifier) {
			return single_of(identifier, binding);
		}

		let created = on_miss(identifier)?;
		match self
			.store
			.put_if_absent(identifier, Binding::Single(Arc::clone(&created)))
		{
			None => {
				debug!("Installed automatic binding for {}", identifier);
				Ok(created)
			}
			Some(winner) => {
				debug!("Discarding automatic binding for {}; another was installed first", identifier);
				single_of(identifier, winner)
			}
		}
	}

	/// An aggregate provider over every provider bound at `identifier`.
	pub(crate) fn request_multiple(&self, identifier: &Identifier) -> DiResult<SharedProvider> {
		if !self.multi_binding {
			return Err(DiError::MultiBinding(format!(
				"Multiple bindings were requested for identifier {}, but the multi-binding feature must be explicitly enabled with InjectorBuilder::multi_bindings(true)",
				identifier
			)));
		}
		match self.store.lookup(identifier) {
			None => Ok(Arc::new(EmptySetProvider)),
			Some(Binding::Multiple(providers)) => Ok(Arc::new(AggregateProvider::new(providers))),
			Some(Binding::Single(provider)) => {
				if !provider.permits_multi_binding() {
					return Err(DiError::MultiBinding(format!(
						"Multiple bindings were requested for identifier {}, but the registered binding does not permit multi-binding",
						identifier
					)));
				}
				Ok(Arc::new(AggregateProvider::new(Arc::from(vec![provider]))))
			}
		}
	}

	/// The provider bound at `identifier`, if any. Never synthesises one.
	pub(crate) fn request_optional(&self, identifier: &Identifier) -> DiResult<Option<SharedProvider>> {
		self.store
			.lookup(identifier)
			.map(|binding| single_of(identifier, binding))
			.transpose()
	}
}

fn single_of(identifier: &Identifier, binding: Binding) -> DiResult<SharedProvider> {
	match binding {
		Binding::Single(provider) => Ok(provider),
		Binding::Multiple(_) => Err(DiError::MultiBinding(format!(
			"Multiple bindings are registered for identifier {}, but only one instance was requested",
			identifier
		))),
	}
}

fn not_multi_bindable(identifier: &Identifier) -> String {
	format!(
		"Binding for identifier {} does not permit multi-binding. Mark every producer bound to it with the multi-binding marker",
		identifier
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ErrorKind;
	use crate::instance::Instance;
	use crate::provider::{FixedProvider, MultiBindable};
	use rstest::rstest;
	use std::sync::atomic::{AtomicUsize, Ordering};

	struct Plugin(u8);

	fn fixed(value: u8) -> SharedProvider {
		Arc::new(FixedProvider::new(Instance::new(Arc::new(Plugin(value)))))
	}

	fn bindable(value: u8) -> SharedProvider {
		Arc::new(MultiBindable::new(fixed(value)))
	}

	#[rstest]
	fn test_single_registry_rejects_duplicates() {
		// Arrange
		let registry = ProviderRegistry::new(false);
		let id = Identifier::of::<Plugin>();

		// Act
		let first = registry.install(&id, fixed(1));
		let second = registry.install(&id, fixed(2));

		// Assert
		assert!(first.is_none());
		assert!(second.unwrap().contains("Duplicate binding"));
		assert_eq!(registry.len(), 1);
	}

	#[rstest]
	fn test_multi_registry_appends_eligible_providers() {
		// Arrange
		let registry = ProviderRegistry::new(true);
		let id = Identifier::of::<Plugin>();

		// Act
		let results = [
			registry.install(&id, bindable(1)),
			registry.install(&id, bindable(2)),
			registry.install(&id, bindable(3)),
		];

		// Assert
		assert!(results.iter().all(Option::is_none));
		match registry.store.lookup(&id) {
			Some(Binding::Multiple(providers)) => assert_eq!(providers.len(), 3),
			_ => panic!("expected a multi-provider entry"),
		}
	}

	#[rstest]
	#[case(fixed(1), bindable(2))]
	#[case(bindable(1), fixed(2))]
	fn test_multi_registry_requires_both_sides_eligible(
		#[case] first: SharedProvider,
		#[case] second: SharedProvider,
	) {
		// Arrange
		let registry = ProviderRegistry::new(true);
		let id = Identifier::of::<Plugin>();
		registry.install(&id, first);

		// Act
		let reason = registry.install(&id, second);

		// Assert
		assert!(reason.unwrap().contains("does not permit multi-binding"));
	}

	#[rstest]
	fn test_request_single_rejects_multi_entry() {
		// Arrange
		let registry = ProviderRegistry::new(true);
		let id = Identifier::of::<Plugin>();
		registry.install(&id, bindable(1));
		registry.install(&id, bindable(2));

		// Act
		let error = registry
			.request_single(&id, |_| Ok(fixed(9)))
			.unwrap_err();

		// Assert
		assert!(error.is_a(ErrorKind::MisconfiguredBindings));
		assert!(error.to_string().contains("only one instance was requested"));
	}

	#[rstest]
	fn test_request_single_installs_on_miss_once() {
		// Arrange
		let registry = ProviderRegistry::new(false).freeze();
		let id = Identifier::of::<Plugin>();
		let calls = AtomicUsize::new(0);
		let on_miss = |_: &Identifier| {
			calls.fetch_add(1, Ordering::SeqCst);
			Ok(fixed(4))
		};

		// Act
		let first = registry.request_single(&id, on_miss).unwrap();
		let second = registry.request_single(&id, on_miss).unwrap();

		// Assert
		assert!(Arc::ptr_eq(&first, &second));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[rstest]
	fn test_request_multiple_outcomes() {
		// Arrange
		let simple = ProviderRegistry::new(false);
		let multi = ProviderRegistry::new(true);
		let id = Identifier::of::<Plugin>();
		multi.install(&Identifier::named::<Plugin>("single"), fixed(1));

		// Act
		let disabled = simple.request_multiple(&id);
		let empty = multi.request_multiple(&id);
		let ineligible = multi.request_multiple(&Identifier::named::<Plugin>("single"));

		// Assert
		assert_eq!(disabled.unwrap_err().kind(), ErrorKind::MultiBinding);
		assert!(empty.is_ok());
		assert!(ineligible.unwrap_err().to_string().contains("does not permit"));
	}

	#[rstest]
	fn test_request_optional() {
		// Arrange
		let registry = ProviderRegistry::new(false);
		let bound = Identifier::named::<Plugin>("bound");
		registry.install(&bound, fixed(1));

		// Act
		let present = registry.request_optional(&bound).unwrap();
		let absent = registry.request_optional(&Identifier::of::<Plugin>()).unwrap();

		// Assert
		assert!(present.is_some());
		assert!(absent.is_none());
	}

	#[rstest]
	fn test_freeze_keeps_entries() {
		// Arrange
		let registry = ProviderRegistry::new(true);
		registry.install(&Identifier::of::<Plugin>(), bindable(1));
		registry.install(&Identifier::of::<Plugin>(), bindable(2));
		registry.install(&Identifier::named::<Plugin>("x"), fixed(3));

		// Act
		let frozen = registry.freeze();

		// Assert
		assert_eq!(frozen.len(), 2);
		assert!(frozen.permits_multi_binding());
		assert!(frozen.request_multiple(&Identifier::of::<Plugin>()).is_ok());
	}
}
