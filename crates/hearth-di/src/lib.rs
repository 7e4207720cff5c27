//! # Hearth Dependency Injection
//!
//! A dependency-injection container. An [`Injector`] resolves instances by
//! [`Identifier`], a type optionally refined by a qualifier.
//!
//! ## Features
//!
//! - **Explicit bindings**: fixed instances, identifier aliases and trait-object implementors
//! - **Producers**: [`BindingModule`]s declare producers whose parameters are injected
//! - **Automatic binding**: registered concrete types are bound on first request
//! - **Member injection**: fields and methods marked for injection, supertypes first
//! - **Deferred factories**: [`Provider<T>`] parameters resolve lazily and break cycles
//! - **Multi-binding**: several producers contribute to one [`InstanceSet`]
//! - **Optional binding**: `Option` dependencies resolve to `None` when nothing is bound
//! - **Cycle detection**: circular dependencies fail with the resolution path
//!
//! Every optional feature is disabled by default and enabled on the
//! [`InjectorBuilder`] or through [`InjectionSettings`].
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use hearth_di::standard::{inject, singleton};
//! use hearth_di::{ConstructorInfo, Injectable, Injector, ParameterInfo, TypeInfo};
//!
//! struct Database {
//! 	url: String,
//! }
//!
//! impl Injectable for Database {
//! 	fn type_info() -> TypeInfo {
//! 		TypeInfo::builder::<Database>()
//! 			.marked(singleton())
//! 			.constructor(ConstructorInfo::new(|_| {
//! 				Ok(Database {
//! 					url: "sqlite::memory:".to_string(),
//! 				})
//! 			}))
//! 			.build()
//! 	}
//! }
//!
//! struct UserRepository {
//! 	database: Arc<Database>,
//! }
//!
//! impl Injectable for UserRepository {
//! 	fn type_info() -> TypeInfo {
//! 		TypeInfo::builder::<UserRepository>()
//! 			.constructor(
//! 				ConstructorInfo::new(|args| {
//! 					Ok(UserRepository {
//! 						database: args.instance(0)?,
//! 					})
//! 				})
//! 				.param(ParameterInfo::of::<Database>())
//! 				.marked(inject()),
//! 			)
//! 			.build()
//! 	}
//! }
//!
//! let injector = Injector::builder()
//! 	.register::<Database>()
//! 	.register::<UserRepository>()
//! 	.build()
//! 	.unwrap();
//!
//! let first = injector.request::<UserRepository>().unwrap();
//! let second = injector.request::<UserRepository>().unwrap();
//! assert!(!Arc::ptr_eq(&first, &second));
//! assert!(Arc::ptr_eq(&first.database, &second.database));
//! assert_eq!(first.database.url, "sqlite::memory:");
//! ```

mod binding;
mod builder;
mod configuration;
mod context;
mod cycle_detection;
pub mod dependency;
pub mod error;
pub mod identifier;
mod injector;
pub mod instance;
pub mod marker;
pub mod module;
mod provider;
mod registry;
pub mod settings;
pub mod type_info;

pub use builder::InjectorBuilder;
pub use cycle_detection::DEFAULT_MAX_RESOLUTION_DEPTH;
pub use dependency::{
	Argument, ArgumentError, Arguments, DeclaredType, Dependency, OptionalType, SetType,
};
pub use error::{BoxError, DiError, DiResult, ErrorKind};
pub use identifier::{Identifier, Qualifier, TypeKey};
pub use injector::Injector;
pub use instance::{ErasedSet, Instance, InstanceSet};
pub use marker::{
	CombinedVocabulary, Marker, MultiBinding, StandardVocabulary, Vocabulary, multi_binding,
	standard,
};
pub use module::{BindingModule, ProducerInfo};
pub use provider::{DeferredFactory, Provider, SetProvider};
pub use settings::{InjectionSettings, SettingsError};
pub use type_info::{
	ConstructorInfo, FieldInfo, Injectable, MethodInfo, ParameterInfo, TypeInfo, TypeInfoBuilder,
	Visibility,
};
