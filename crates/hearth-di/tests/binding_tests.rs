//! Explicit binding, vocabulary and settings tests
//!
//! These tests verify:
//! 1. Identifier aliases and trait-object implementor bindings
//! 2. Injectors configured with a combined marker vocabulary
//! 3. Injectors configured from TOML settings

use std::sync::Arc;

use hearth_di::standard::{inject, qualifier};
use hearth_di::{
	BindingModule, CombinedVocabulary, ConstructorInfo, DeclaredType, ErrorKind, Identifier,
	Injectable, InjectionSettings, Injector, Marker, ParameterInfo, ProducerInfo,
	StandardVocabulary, TypeInfo, TypeKey, Vocabulary, multi_binding,
};
use rstest::*;

trait Storage: Send + Sync {
	fn kind(&self) -> &'static str;
}

#[derive(Debug)]
struct DiskStorage;

impl Storage for DiskStorage {
	fn kind(&self) -> &'static str {
		"disk"
	}
}

impl Injectable for DiskStorage {
	fn type_info() -> TypeInfo {
		TypeInfo::builder::<DiskStorage>()
			.constructor(ConstructorInfo::new(|_| Ok(DiskStorage)))
			.build()
	}
}

/// Qualifier marker type
struct Primary;

#[rstest]
fn test_trait_object_bound_to_registered_implementor() {
	// Arrange
	let injector = Injector::builder()
		.register::<DiskStorage>()
		.bind_implementor::<dyn Storage, DiskStorage>(
			Identifier::of::<dyn Storage>(),
			Identifier::of::<DiskStorage>(),
			|disk: Arc<DiskStorage>| -> Arc<dyn Storage> { disk },
		)
		.build()
		.unwrap();

	// Act
	let storage = injector.request::<dyn Storage>().unwrap();

	// Assert
	assert_eq!(storage.kind(), "disk");
}

#[rstest]
fn test_qualified_identifier_aliases_unqualified_binding() {
	// Arrange
	let shared = Arc::new(DiskStorage);
	let injector = Injector::builder()
		.bind_type_instance(Arc::clone(&shared))
		.bind_identifier(
			Identifier::qualified::<DiskStorage, Primary>(),
			Identifier::of::<DiskStorage>(),
		)
		.build()
		.unwrap();

	// Act
	let primary = injector
		.request_identifier::<DiskStorage>(&Identifier::qualified::<DiskStorage, Primary>())
		.unwrap();

	// Assert
	assert!(Arc::ptr_eq(&primary, &shared));
}

#[rstest]
fn test_marker_qualified_parameter() {
	// Arrange
	struct Archive {
		storage: Arc<DiskStorage>,
	}
	let shared = Arc::new(DiskStorage);
	let module = BindingModule::new("archive").producer(
		ProducerInfo::new::<Archive, _>("archive", |args| {
			Ok(Some(Arc::new(Archive {
				storage: args.instance(0)?,
			})))
		})
		.param(ParameterInfo::of::<DiskStorage>().marked(qualifier::<Primary>())),
	);
	let injector = Injector::builder()
		.add_module(module)
		.bind_instance(Identifier::qualified::<DiskStorage, Primary>(), Arc::clone(&shared))
		.build()
		.unwrap();

	// Act
	let archive = injector.request::<Archive>().unwrap();

	// Assert
	assert!(Arc::ptr_eq(&archive.storage, &shared));
}

#[rstest]
fn test_alias_to_unbound_target_fails_on_request() {
	// Arrange
	let injector = Injector::builder()
		.bind_identifier(
			Identifier::named::<DiskStorage>("backup"),
			Identifier::named::<DiskStorage>("missing"),
		)
		.build()
		.unwrap();

	// Act
	let error = injector
		.request_identifier::<DiskStorage>(&Identifier::named::<DiskStorage>("backup"))
		.unwrap_err();

	// Assert
	assert_eq!(error.kind(), ErrorKind::MisconfiguredBindings);
}

/// A vocabulary with its own inject marker and deferred type
#[derive(Debug)]
struct LegacyVocabulary;

struct LegacyInject;

enum LegacyDeferred {}

impl Vocabulary for LegacyVocabulary {
	fn has_inject(&self, markers: &[Marker]) -> bool {
		markers.iter().any(Marker::is::<LegacyInject>)
	}

	fn has_singleton(&self, _markers: &[Marker]) -> bool {
		false
	}

	fn is_qualifier(&self, _marker: &Marker) -> bool {
		false
	}

	fn named_qualifier<'m>(&self, _marker: &'m Marker) -> Option<&'m str> {
		None
	}

	fn is_deferred_factory(&self, raw: TypeKey) -> bool {
		raw == TypeKey::of::<LegacyDeferred>()
	}
}

struct Report {
	storage: Arc<DiskStorage>,
	lazy_kind: &'static str,
}

impl Injectable for Report {
	fn type_info() -> TypeInfo {
		TypeInfo::builder::<Report>()
			.constructor(
				ConstructorInfo::new(|args| {
					let lazy = args.provider::<DiskStorage>(1)?;
					Ok(Report {
						storage: args.instance(0)?,
						lazy_kind: lazy.get()?.kind(),
					})
				})
				.param(ParameterInfo::of::<DiskStorage>())
				.param(ParameterInfo::new(DeclaredType::generic(
					TypeKey::of::<LegacyDeferred>(),
					DeclaredType::of::<DiskStorage>(),
				)))
				.marked(Marker::of::<LegacyInject>()),
			)
			.constructor(
				ConstructorInfo::new::<Report, _>(|_| Err("never selected".into())).named("empty"),
			)
			.build()
	}
}

#[rstest]
#[case(true)]
#[case(false)]
fn test_combined_vocabulary_recognises_foreign_markers(#[case] combined: bool) {
	// Arrange
	let mut builder = Injector::builder()
		.register::<DiskStorage>()
		.register::<Report>();
	if combined {
		builder = builder.vocabulary(CombinedVocabulary::pair(StandardVocabulary, LegacyVocabulary));
	}
	let injector = builder.build().unwrap();

	// Act
	let result = injector.request::<Report>();

	// Assert
	match result {
		Ok(report) => {
			assert!(combined);
			assert_eq!(report.storage.kind(), "disk");
			assert_eq!(report.lazy_kind, "disk");
		}
		Err(error) => {
			assert!(!combined);
			assert_eq!(error.kind(), ErrorKind::MisannotatedInjectee);
		}
	}
}

#[rstest]
fn test_standard_markers_still_work_with_combined_vocabulary() {
	// Arrange
	struct Index {
		storage: Arc<DiskStorage>,
	}
	let info = TypeInfo::builder::<Index>()
		.constructor(
			ConstructorInfo::new(|args| {
				Ok(Index {
					storage: args.instance(0)?,
				})
			})
			.param(ParameterInfo::of::<DiskStorage>())
			.marked(inject()),
		)
		.build();
	let injector = Injector::builder()
		.vocabulary(CombinedVocabulary::pair(StandardVocabulary, LegacyVocabulary))
		.register::<DiskStorage>()
		.register_type(info)
		.build()
		.unwrap();

	// Act
	let index = injector.request::<Index>().unwrap();

	// Assert
	assert_eq!(index.storage.kind(), "disk");
}

#[rstest]
fn test_injector_configured_from_toml() {
	// Arrange
	let settings = InjectionSettings::from_toml_str(
		r#"
		multi_bindings = true
		optional_bindings = true
		max_resolution_depth = 16
		"#,
	)
	.unwrap();
	let module = BindingModule::new("storage")
		.producer(
			ProducerInfo::new::<dyn Storage, _>("disk", |_| {
				Ok(Some(Arc::new(DiskStorage) as Arc<dyn Storage>))
			})
			.marked(multi_binding()),
		)
		.producer(
			ProducerInfo::new::<dyn Storage, _>("second_disk", |_| {
				Ok(Some(Arc::new(DiskStorage) as Arc<dyn Storage>))
			})
			.marked(multi_binding()),
		);

	// Act
	let injector = Injector::builder()
		.settings(settings)
		.add_module(module)
		.build()
		.unwrap();

	// Assert
	assert_eq!(injector.settings().max_resolution_depth, 16);
	assert_eq!(injector.request_multiple::<dyn Storage>().unwrap().len(), 2);
	assert!(injector.request_optional::<DiskStorage>().unwrap().is_none());
}
