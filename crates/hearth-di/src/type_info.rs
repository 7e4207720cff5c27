//! Registration descriptors for injectable types
//!
//! Rust has no runtime reflection, so every type that should be bound
//! automatically describes itself with a [`TypeInfo`]: its constructors, its
//! injectable fields and methods, its markers and its declared supertype.
//! Descriptors are registered on the builder and scanned on first access.
//!
//! ```
//! use std::sync::Arc;
//! use hearth_di::standard::inject;
//! use hearth_di::{ConstructorInfo, Injectable, ParameterInfo, TypeInfo};
//!
//! struct Engine;
//! struct Car {
//! 	engine: Arc<Engine>,
//! }
//!
//! impl Injectable for Engine {
//! 	fn type_info() -> TypeInfo {
//! 		TypeInfo::builder::<Engine>()
//! 			.constructor(ConstructorInfo::new(|_| Ok(Engine)))
//! 			.build()
//! 	}
//! }
//!
//! impl Injectable for Car {
//! 	fn type_info() -> TypeInfo {
//! 		TypeInfo::builder::<Car>()
//! 			.constructor(
//! 				ConstructorInfo::new(|args| Ok(Car { engine: args.instance(0)? }))
//! 					.param(ParameterInfo::of::<Engine>())
//! 					.marked(inject()),
//! 			)
//! 			.build()
//! 	}
//! }
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

use crate::dependency::{Argument, Arguments, DeclaredType};
use crate::error::BoxError;
use crate::identifier::TypeKey;
use crate::instance::Instance;
use crate::marker::Marker;

/// Erased reference to a concrete value
pub(crate) type AnyRef<'a> = &'a (dyn Any + Send + Sync);

pub(crate) type ConstructFn = Arc<dyn Fn(Arguments) -> Result<Instance, BoxError> + Send + Sync>;
pub(crate) type FieldFn = Arc<dyn Fn(AnyRef<'_>, Argument) -> Result<(), BoxError> + Send + Sync>;
pub(crate) type MethodFn = Arc<dyn Fn(AnyRef<'_>, Arguments) -> Result<(), BoxError> + Send + Sync>;
pub(crate) type Upcast = Arc<dyn for<'a> Fn(AnyRef<'a>) -> Option<AnyRef<'a>> + Send + Sync>;
pub(crate) type Receiver = fn(&Instance) -> Option<AnyRef<'_>>;

/// Visibility of a member, as seen by the injector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
	#[default]
	Public,
	Protected,
	/// Visible within the declaring module only
	PackagePrivate,
	Private,
}

/// Types that can be bound automatically.
pub trait Injectable: Send + Sync + Sized + 'static {
	fn type_info() -> TypeInfo;
}

/// A constructor, field-setter or method parameter.
#[derive(Debug, Clone)]
pub struct ParameterInfo {
	declared: DeclaredType,
	markers: Vec<Marker>,
}

impl ParameterInfo {
	pub fn new(declared: DeclaredType) -> Self {
		Self {
			declared,
			markers: Vec::new(),
		}
	}

	/// Plain instance parameter of type `T`
	pub fn of<T: ?Sized + 'static>() -> Self {
		Self::new(DeclaredType::of::<T>())
	}

	pub fn marked(mut self, marker: Marker) -> Self {
		self.markers.push(marker);
		self
	}

	pub fn declared_type(&self) -> &DeclaredType {
		&self.declared
	}

	pub fn markers(&self) -> &[Marker] {
		&self.markers
	}
}

/// A way of constructing a value of the described type.
#[derive(Clone)]
pub struct ConstructorInfo {
	name: &'static str,
	visibility: Visibility,
	markers: Vec<Marker>,
	parameters: Vec<ParameterInfo>,
	construct: ConstructFn,
}

impl ConstructorInfo {
	pub fn new<T, F>(construct: F) -> Self
	where
		T: Send + Sync + 'static,
		F: Fn(Arguments) -> Result<T, BoxError> + Send + Sync + 'static,
	{
		Self {
			name: "new",
			visibility: Visibility::Public,
			markers: Vec::new(),
			parameters: Vec::new(),
			construct: Arc::new(move |arguments| {
				construct(arguments).map(|value| Instance::new(Arc::new(value)))
			}),
		}
	}

	pub fn named(mut self, name: &'static str) -> Self {
		self.name = name;
		self
	}

	pub fn visibility(mut self, visibility: Visibility) -> Self {
		self.visibility = visibility;
		self
	}

	pub fn param(mut self, parameter: ParameterInfo) -> Self {
		self.parameters.push(parameter);
		self
	}

	pub fn marked(mut self, marker: Marker) -> Self {
		self.markers.push(marker);
		self
	}

	pub fn name(&self) -> &'static str {
		self.name
	}

	pub(crate) fn visibility_of(&self) -> Visibility {
		self.visibility
	}

	pub(crate) fn markers(&self) -> &[Marker] {
		&self.markers
	}

	pub(crate) fn parameters(&self) -> &[ParameterInfo] {
		&self.parameters
	}

	pub(crate) fn construct_fn(&self) -> ConstructFn {
		Arc::clone(&self.construct)
	}
}

impl fmt::Debug for ConstructorInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ConstructorInfo")
			.field("name", &self.name)
			.field("visibility", &self.visibility)
			.field("markers", &self.markers)
			.field("parameters", &self.parameters)
			.finish_non_exhaustive()
	}
}

/// A field that can receive an injected value.
///
/// Setters receive `&T`, so fields use interior mutability.
#[derive(Clone)]
pub struct FieldInfo {
	name: &'static str,
	declaring: TypeKey,
	declared: DeclaredType,
	visibility: Visibility,
	is_static: bool,
	is_final: bool,
	markers: Vec<Marker>,
	set: FieldFn,
}

impl FieldInfo {
	pub fn new<T, F>(name: &'static str, declared: DeclaredType, set: F) -> Self
	where
		T: Send + Sync + 'static,
		F: Fn(&T, Argument) -> Result<(), BoxError> + Send + Sync + 'static,
	{
		Self {
			name,
			declaring: TypeKey::of::<T>(),
			declared,
			visibility: Visibility::Public,
			is_static: false,
			is_final: false,
			markers: Vec::new(),
			set: Arc::new(move |receiver: AnyRef<'_>, value: Argument| {
				let this = receiver
					.downcast_ref::<T>()
					.ok_or_else(|| receiver_mismatch::<T>(name))?;
				set(this, value)
			}),
		}
	}

	pub fn visibility(mut self, visibility: Visibility) -> Self {
		self.visibility = visibility;
		self
	}

	/// Declares the field as static: injected at most once per container.
	pub fn static_member(mut self) -> Self {
		self.is_static = true;
		self
	}

	/// Declares the field as final: marking it for injection is an error.
	pub fn final_member(mut self) -> Self {
		self.is_final = true;
		self
	}

	pub fn marked(mut self, marker: Marker) -> Self {
		self.markers.push(marker);
		self
	}

	pub fn name(&self) -> &'static str {
		self.name
	}

	pub(crate) fn declaring(&self) -> TypeKey {
		self.declaring
	}

	pub(crate) fn declared_type(&self) -> &DeclaredType {
		&self.declared
	}

	pub(crate) fn visibility_of(&self) -> Visibility {
		self.visibility
	}

	pub(crate) fn is_static(&self) -> bool {
		self.is_static
	}

	pub(crate) fn is_final(&self) -> bool {
		self.is_final
	}

	pub(crate) fn markers(&self) -> &[Marker] {
		&self.markers
	}

	pub(crate) fn set_fn(&self) -> FieldFn {
		Arc::clone(&self.set)
	}
}

impl fmt::Debug for FieldInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FieldInfo")
			.field("name", &self.name)
			.field("declaring", &self.declaring)
			.field("declared", &self.declared)
			.field("visibility", &self.visibility)
			.field("is_static", &self.is_static)
			.field("is_final", &self.is_final)
			.finish_non_exhaustive()
	}
}

/// A method that can be invoked with injected arguments.
#[derive(Clone)]
pub struct MethodInfo {
	name: &'static str,
	declaring: TypeKey,
	visibility: Visibility,
	is_static: bool,
	is_abstract: bool,
	markers: Vec<Marker>,
	parameters: Vec<ParameterInfo>,
	invoke: MethodFn,
}

impl MethodInfo {
	pub fn new<T, F>(name: &'static str, invoke: F) -> Self
	where
		T: Send + Sync + 'static,
		F: Fn(&T, Arguments) -> Result<(), BoxError> + Send + Sync + 'static,
	{
		Self {
			name,
			declaring: TypeKey::of::<T>(),
			visibility: Visibility::Public,
			is_static: false,
			is_abstract: false,
			markers: Vec::new(),
			parameters: Vec::new(),
			invoke: Arc::new(move |receiver: AnyRef<'_>, arguments: Arguments| {
				let this = receiver
					.downcast_ref::<T>()
					.ok_or_else(|| receiver_mismatch::<T>(name))?;
				invoke(this, arguments)
			}),
		}
	}

	/// An abstract method declaration. Abstract methods are never injected but
	/// still take part in override tracking.
	pub fn abstract_method<T: Send + Sync + 'static>(name: &'static str) -> Self {
		let mut method = Self::new::<T, _>(name, |_, _| Ok(()));
		method.is_abstract = true;
		method
	}

	pub fn visibility(mut self, visibility: Visibility) -> Self {
		self.visibility = visibility;
		self
	}

	/// Declares the method as static: injected at most once per container.
	pub fn static_member(mut self) -> Self {
		self.is_static = true;
		self
	}

	pub fn param(mut self, parameter: ParameterInfo) -> Self {
		self.parameters.push(parameter);
		self
	}

	pub fn marked(mut self, marker: Marker) -> Self {
		self.markers.push(marker);
		self
	}

	pub fn name(&self) -> &'static str {
		self.name
	}

	pub(crate) fn declaring(&self) -> TypeKey {
		self.declaring
	}

	pub(crate) fn visibility_of(&self) -> Visibility {
		self.visibility
	}

	pub(crate) fn is_static(&self) -> bool {
		self.is_static
	}

	pub(crate) fn is_abstract(&self) -> bool {
		self.is_abstract
	}

	pub(crate) fn markers(&self) -> &[Marker] {
		&self.markers
	}

	pub(crate) fn parameters(&self) -> &[ParameterInfo] {
		&self.parameters
	}

	pub(crate) fn invoke_fn(&self) -> MethodFn {
		Arc::clone(&self.invoke)
	}
}

impl fmt::Debug for MethodInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MethodInfo")
			.field("name", &self.name)
			.field("declaring", &self.declaring)
			.field("visibility", &self.visibility)
			.field("is_static", &self.is_static)
			.field("is_abstract", &self.is_abstract)
			.field("parameters", &self.parameters)
			.finish_non_exhaustive()
	}
}

/// The declared supertype of a described type.
#[derive(Clone)]
pub(crate) struct Supertype {
	pub(crate) describe: fn() -> TypeInfo,
	pub(crate) upcast: Upcast,
}

/// Descriptor of an injectable type.
#[derive(Clone)]
pub struct TypeInfo {
	key: TypeKey,
	module_path: &'static str,
	is_abstract: bool,
	markers: Vec<Marker>,
	constructors: Vec<ConstructorInfo>,
	fields: Vec<FieldInfo>,
	methods: Vec<MethodInfo>,
	supertype: Option<Supertype>,
	receiver: Receiver,
}

impl TypeInfo {
	pub fn builder<T: Send + Sync + 'static>() -> TypeInfoBuilder<T> {
		TypeInfoBuilder::new()
	}

	pub fn key(&self) -> TypeKey {
		self.key
	}

	/// Module the type is declared in. Package-private methods only override
	/// methods declared in the same module.
	pub fn module_path(&self) -> &'static str {
		self.module_path
	}

	pub fn is_abstract(&self) -> bool {
		self.is_abstract
	}

	pub fn markers(&self) -> &[Marker] {
		&self.markers
	}

	pub fn constructors(&self) -> &[ConstructorInfo] {
		&self.constructors
	}

	pub fn fields(&self) -> &[FieldInfo] {
		&self.fields
	}

	pub fn methods(&self) -> &[MethodInfo] {
		&self.methods
	}

	pub(crate) fn supertype(&self) -> Option<&Supertype> {
		self.supertype.as_ref()
	}

	pub(crate) fn receiver(&self) -> Receiver {
		self.receiver
	}
}

impl fmt::Debug for TypeInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TypeInfo")
			.field("key", &self.key)
			.field("module_path", &self.module_path)
			.field("is_abstract", &self.is_abstract)
			.field("markers", &self.markers)
			.field("constructors", &self.constructors)
			.field("fields", &self.fields)
			.field("methods", &self.methods)
			.field("has_supertype", &self.supertype.is_some())
			.finish()
	}
}

/// Builder for [`TypeInfo`].
pub struct TypeInfoBuilder<T> {
	info: TypeInfo,
	_marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> TypeInfoBuilder<T> {
	fn new() -> Self {
		let key = TypeKey::of::<T>();
		let module_path = key.name().rsplit_once("::").map_or("", |(path, _)| path);
		Self {
			info: TypeInfo {
				key,
				module_path,
				is_abstract: false,
				markers: Vec::new(),
				constructors: Vec::new(),
				fields: Vec::new(),
				methods: Vec::new(),
				supertype: None,
				receiver: receiver_of::<T>,
			},
			_marker: PhantomData,
		}
	}

	/// Overrides the module path derived from the type name.
	pub fn in_module(mut self, module_path: &'static str) -> Self {
		self.info.module_path = module_path;
		self
	}

	/// Declares the type abstract: it is never bound automatically.
	pub fn abstract_type(mut self) -> Self {
		self.info.is_abstract = true;
		self
	}

	pub fn marked(mut self, marker: Marker) -> Self {
		self.info.markers.push(marker);
		self
	}

	/// Declares `S` as the supertype, reachable from `T` through `upcast`.
	///
	/// Members of `S` are injected into every constructed `T`, before the
	/// members of `T`.
	pub fn extends<S: Injectable>(mut self, upcast: fn(&T) -> &S) -> Self {
		self.info.supertype = Some(Supertype {
			describe: S::type_info,
			upcast: erase_upcast(upcast),
		});
		self
	}

	pub fn constructor(mut self, constructor: ConstructorInfo) -> Self {
		self.info.constructors.push(constructor);
		self
	}

	pub fn field(mut self, field: FieldInfo) -> Self {
		self.info.fields.push(field);
		self
	}

	pub fn method(mut self, method: MethodInfo) -> Self {
		self.info.methods.push(method);
		self
	}

	pub fn build(self) -> TypeInfo {
		self.info
	}
}

fn receiver_of<T: Send + Sync + 'static>(instance: &Instance) -> Option<AnyRef<'_>> {
	instance.concrete::<T>().map(|value| value as AnyRef<'_>)
}

fn erase_upcast<T, S>(upcast: fn(&T) -> &S) -> Upcast
where
	T: Send + Sync + 'static,
	S: Send + Sync + 'static,
{
	Arc::new(constrain_upcast(move |receiver: AnyRef<'_>| {
		receiver
			.downcast_ref::<T>()
			.map(|value| upcast(value) as AnyRef<'_>)
	}))
}

fn constrain_upcast<F>(upcast: F) -> F
where
	F: for<'a> Fn(AnyRef<'a>) -> Option<AnyRef<'a>>,
{
	upcast
}

fn receiver_mismatch<T>(member: &str) -> BoxError {
	format!(
		"member {} declared on {} was invoked on a different type",
		member,
		std::any::type_name::<T>()
	)
	.into()
}

/// Types registered for automatic binding.
#[derive(Debug, Clone, Default)]
pub(crate) struct TypeCatalog {
	types: HashMap<TypeKey, Arc<TypeInfo>>,
}

impl TypeCatalog {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	/// Registers `info`; the first registration of a type wins.
	pub(crate) fn insert(&mut self, info: TypeInfo) {
		let key = info.key();
		if self.types.contains_key(&key) {
			debug!("Type {} is already registered; keeping the first registration", key);
			return;
		}
		self.types.insert(key, Arc::new(info));
	}

	pub(crate) fn get(&self, key: &TypeKey) -> Option<Arc<TypeInfo>> {
		self.types.get(key).cloned()
	}

	pub(crate) fn len(&self) -> usize {
		self.types.len()
	}
}
