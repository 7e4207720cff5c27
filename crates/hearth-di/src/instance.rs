//! Type-erased instances and instance sets

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

/// A shared, type-erased instance produced by a provider.
///
/// Holds an `Arc<T>` for some `T`, which may be unsized (`dyn Trait`).
/// Cloning is cheap and never clones the underlying value.
#[derive(Clone)]
pub struct Instance {
	value: Arc<dyn Any + Send + Sync>,
	identity: usize,
	type_name: &'static str,
}

impl Instance {
	pub fn new<T>(value: Arc<T>) -> Self
	where
		T: ?Sized + Send + Sync + 'static,
	{
		let identity = Arc::as_ptr(&value).cast::<()>() as usize;
		Self {
			value: Arc::new(value),
			identity,
			type_name: type_name::<T>(),
		}
	}

	/// Returns the instance as `Arc<T>` if it was created from an `Arc<T>`.
	pub fn downcast<T>(&self) -> Option<Arc<T>>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		self.value.downcast_ref::<Arc<T>>().cloned()
	}

	pub fn is<T>(&self) -> bool
	where
		T: ?Sized + Send + Sync + 'static,
	{
		self.value.is::<Arc<T>>()
	}

	/// Borrows the concrete value behind the instance.
	pub(crate) fn concrete<T>(&self) -> Option<&T>
	where
		T: Send + Sync + 'static,
	{
		self.value.downcast_ref::<Arc<T>>().map(|value| value.as_ref())
	}

	/// Name of the type the instance was created as.
	pub fn type_name(&self) -> &'static str {
		self.type_name
	}

	/// Whether both handles refer to the same underlying value.
	pub fn same_instance(&self, other: &Instance) -> bool {
		self.identity == other.identity
	}
}

impl fmt::Debug for Instance {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Instance")
			.field("type_name", &self.type_name)
			.field("identity", &format_args!("{:#x}", self.identity))
			.finish()
	}
}

/// Set of erased instances, deduplicated by identity and kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ErasedSet {
	members: Vec<Instance>,
}

impl ErasedSet {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	/// Adds `instance` unless the same allocation is already present.
	pub(crate) fn insert(&mut self, instance: Instance) -> bool {
		if self
			.members
			.iter()
			.any(|member| member.same_instance(&instance))
		{
			return false;
		}
		self.members.push(instance);
		true
	}

	pub fn len(&self) -> usize {
		self.members.len()
	}

	pub fn is_empty(&self) -> bool {
		self.members.is_empty()
	}

	/// Converts into a typed set, returning the first mismatching member on failure.
	pub(crate) fn into_typed<T>(self) -> Result<InstanceSet<T>, &'static str>
	where
		T: ?Sized + Send + Sync + 'static,
	{
		let mut items = Vec::with_capacity(self.members.len());
		for member in self.members {
			match member.downcast::<T>() {
				Some(item) => items.push(item),
				None => return Err(member.type_name()),
			}
		}
		Ok(InstanceSet { items })
	}
}

/// Set of instances produced by a multi-binding request.
///
/// Members are unique by identity: a shared instance produced by several
/// bindings appears once, while distinct instances that compare equal are all
/// kept. Iteration order follows the order in which the bound providers were
/// declared, but callers should not rely on it.
pub struct InstanceSet<T: ?Sized> {
	items: Vec<Arc<T>>,
}

impl<T: ?Sized> InstanceSet<T> {
	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	pub fn iter(&self) -> std::slice::Iter<'_, Arc<T>> {
		self.items.iter()
	}

	/// Whether `value` (by identity) is a member of the set.
	pub fn contains(&self, value: &Arc<T>) -> bool {
		self.items.iter().any(|item| Arc::ptr_eq(item, value))
	}

	pub fn into_vec(self) -> Vec<Arc<T>> {
		self.items
	}
}

impl<T: ?Sized> Clone for InstanceSet<T> {
	fn clone(&self) -> Self {
		Self {
			items: self.items.clone(),
		}
	}
}

impl<T: ?Sized> fmt::Debug for InstanceSet<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("InstanceSet")
			.field("type_name", &type_name::<T>())
			.field("len", &self.items.len())
			.finish()
	}
}

impl<T: ?Sized> IntoIterator for InstanceSet<T> {
	type Item = Arc<T>;
	type IntoIter = std::vec::IntoIter<Arc<T>>;

	fn into_iter(self) -> Self::IntoIter {
		self.items.into_iter()
	}
}

impl<'a, T: ?Sized> IntoIterator for &'a InstanceSet<T> {
	type Item = &'a Arc<T>;
	type IntoIter = std::slice::Iter<'a, Arc<T>>;

	fn into_iter(self) -> Self::IntoIter {
		self.items.iter()
	}
}
