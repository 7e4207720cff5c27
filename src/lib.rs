//! # Hearth
//!
//! A dependency-injection container with automatic binding of registered
//! types, producer modules, deferred factories, multi-bindings, optional
//! bindings and circular dependency detection.
//!
//! The container lives in [`hearth_di`]; this crate re-exports it.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use hearth::prelude::*;
//!
//! struct Clock;
//!
//! impl Clock {
//! 	fn now(&self) -> u64 {
//! 		42
//! 	}
//! }
//!
//! let module = BindingModule::new("time").producer(
//! 	ProducerInfo::new::<Clock, _>("clock", |_| Ok(Some(Arc::new(Clock)))).marked(singleton()),
//! );
//!
//! let injector = Injector::builder().add_module(module).build().unwrap();
//! assert_eq!(injector.request::<Clock>().unwrap().now(), 42);
//! ```

pub use hearth_di::*;

/// The types and marker constructors needed by most users.
pub mod prelude {
	pub use hearth_di::standard::{deferred, inject, named, qualifier, singleton};
	pub use hearth_di::{
		Arguments, BindingModule, ConstructorInfo, DeclaredType, DiError, DiResult, ErrorKind,
		FieldInfo, Identifier, Injectable, InjectionSettings, Injector, InjectorBuilder,
		InstanceSet, MethodInfo, ParameterInfo, ProducerInfo, Provider, SetProvider, TypeInfo,
		multi_binding,
	};
}
