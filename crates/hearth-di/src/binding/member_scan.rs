//! Post-construction member injection
//!
//! The scan walks from the registered type up through its declared supertypes.
//! At each level it records methods first (for override tracking) and then
//! fields. The resulting injections run supertype first; within one level,
//! fields run before methods, each in declaration order.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::context::ResolutionContext;
use crate::dependency::{Dependency, DependencyBunch};
use crate::error::{DiError, DiResult, ResultExt};
use crate::identifier::TypeKey;
use crate::instance::Instance;
use crate::marker::{Marker, Vocabulary};
use crate::settings::InjectionSettings;
use crate::type_info::{
	AnyRef, FieldFn, FieldInfo, MethodFn, MethodInfo, Receiver, TypeInfo, Upcast, Visibility,
};

/// Identity of a static member in the injector's once-set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct StaticMemberKey {
	declaring: TypeKey,
	name: &'static str,
	/// Parameter types, for methods
	signature: Option<Vec<TypeKey>>,
}

/// Override identity of a method.
///
/// Package-private methods are only distinct within their module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MethodSignature {
	name: &'static str,
	parameters: Vec<TypeKey>,
	module: Option<&'static str>,
}

impl MethodSignature {
	/// `None` for methods that never override: static and private ones.
	fn of(method: &MethodInfo, module_path: &'static str) -> Option<Self> {
		if method.is_static() || method.visibility_of() == Visibility::Private {
			return None;
		}
		let module = (method.visibility_of() == Visibility::PackagePrivate).then_some(module_path);
		Some(Self {
			name: method.name(),
			parameters: parameter_types(method),
			module,
		})
	}
}

fn parameter_types(method: &MethodInfo) -> Vec<TypeKey> {
	method
		.parameters()
		.iter()
		.map(|parameter| parameter.declared_type().raw_type())
		.collect()
}

enum Target {
	Field { dependency: Dependency, set: FieldFn },
	Method { dependencies: DependencyBunch, invoke: MethodFn },
}

/// One field or method to inject after construction.
pub(crate) struct MemberInjection {
	member: String,
	upcasts: Arc<[Upcast]>,
	static_key: Option<StaticMemberKey>,
	target: Target,
}

impl fmt::Debug for MemberInjection {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MemberInjection")
			.field("member", &self.member)
			.field("depth", &self.upcasts.len())
			.field("static_key", &self.static_key)
			.finish_non_exhaustive()
	}
}

impl MemberInjection {
	/// Injects this member into `instance`.
	///
	/// Static members are injected at most once per injector.
	pub(crate) fn inject(
		&self,
		instance: &Instance,
		receiver: Receiver,
		context: &mut ResolutionContext<'_>,
	) -> DiResult<()> {
		if let Some(key) = &self.static_key {
			if !context.root().mark_static_injected(key) {
				return Ok(());
			}
		}
		let description = match self.target {
			Target::Field { .. } => "Injecting field",
			Target::Method { .. } => "Injecting method",
		};
		self.perform(instance, receiver, context)
			.context_with(|| format!("{} {}", description, self.member))
	}

	fn perform(
		&self,
		instance: &Instance,
		receiver: Receiver,
		context: &mut ResolutionContext<'_>,
	) -> DiResult<()> {
		let target = self.resolve_receiver(instance, receiver)?;
		match &self.target {
			Target::Field { dependency, set } => {
				let value = dependency.resolve(context)?;
				set(target, value).map_err(|source| {
					DiError::invocation(format!("Setting field {} failed", self.member), source)
				})
			}
			Target::Method {
				dependencies,
				invoke,
			} => {
				let arguments = dependencies.resolve_all(context)?;
				invoke(target, arguments).map_err(|source| {
					DiError::invocation(format!("Invoking method {} failed", self.member), source)
				})
			}
		}
	}

	fn resolve_receiver<'i>(&self, instance: &'i Instance, receiver: Receiver) -> DiResult<AnyRef<'i>> {
		let mismatch = || {
			DiError::InternalFailure(format!(
				"Instance of {} cannot receive member {}",
				instance.type_name(),
				self.member
			))
		};
		let mut target = receiver(instance).ok_or_else(mismatch)?;
		for upcast in self.upcasts.iter() {
			target = (upcast.as_ref())(target).ok_or_else(mismatch)?;
		}
		Ok(target)
	}
}

/// Collects the member injections of `subject` and its supertypes.
pub(crate) fn scan_members(
	settings: &InjectionSettings,
	vocabulary: &dyn Vocabulary,
	subject: &TypeInfo,
) -> DiResult<Vec<MemberInjection>> {
	let mut overridden = HashSet::new();
	let mut visited = HashSet::new();
	let mut levels = Vec::new();
	let mut upcasts: Vec<Upcast> = Vec::new();
	let mut level = subject.clone();

	loop {
		if !visited.insert(level.key()) {
			return Err(DiError::InternalFailure(format!(
				"Type hierarchy of {} declares {} as its own supertype",
				subject.key(),
				level.key()
			)));
		}
		let chain: Arc<[Upcast]> = upcasts.clone().into();
		levels.push(scan_level(settings, vocabulary, &level, chain, &mut overridden)?);

		let Some(supertype) = level.supertype().cloned() else {
			break;
		};
		upcasts.push(supertype.upcast);
		level = (supertype.describe)();
	}

	levels.reverse();
	Ok(levels.into_iter().flatten().collect())
}

fn scan_level(
	settings: &InjectionSettings,
	vocabulary: &dyn Vocabulary,
	level: &TypeInfo,
	upcasts: Arc<[Upcast]>,
	overridden: &mut HashSet<MethodSignature>,
) -> DiResult<Vec<MemberInjection>> {
	let mut methods = Vec::new();
	for method in level.methods() {
		check_declaring(level, method.declaring(), method.name())?;
		if let Some(signature) = MethodSignature::of(method, level.module_path()) {
			if !overridden.insert(signature) {
				continue;
			}
		}
		if !eligible(
			settings,
			vocabulary,
			method.visibility_of(),
			method.is_static(),
			method.is_abstract(),
			method.markers(),
		) {
			continue;
		}
		let member = format!("{}::{}", level.key(), method.name());
		let dependencies = DependencyBunch::collect(vocabulary, &member, method.parameters())?;
		methods.push(MemberInjection {
			static_key: method.is_static().then(|| StaticMemberKey {
				declaring: level.key(),
				name: method.name(),
				signature: Some(parameter_types(method)),
			}),
			member,
			upcasts: Arc::clone(&upcasts),
			target: Target::Method {
				dependencies,
				invoke: method.invoke_fn(),
			},
		});
	}

	let mut injections = Vec::new();
	for field in level.fields() {
		check_declaring(level, field.declaring(), field.name())?;
		if !eligible(
			settings,
			vocabulary,
			field.visibility_of(),
			field.is_static(),
			false,
			field.markers(),
		) {
			continue;
		}
		injections.push(field_injection(vocabulary, level, field, Arc::clone(&upcasts))?);
	}

	injections.extend(methods);
	Ok(injections)
}

fn field_injection(
	vocabulary: &dyn Vocabulary,
	level: &TypeInfo,
	field: &FieldInfo,
	upcasts: Arc<[Upcast]>,
) -> DiResult<MemberInjection> {
	let member = format!("{}::{}", level.key(), field.name());
	if field.is_final() {
		return Err(DiError::MisannotatedInjectee(format!(
			"Cannot inject into final field {}",
			member
		)));
	}
	let dependency = Dependency::classify(vocabulary, field.declared_type(), field.markers())
		.context_with(|| format!("On field {}", member))?;
	Ok(MemberInjection {
		static_key: field.is_static().then(|| StaticMemberKey {
			declaring: level.key(),
			name: field.name(),
			signature: None,
		}),
		member,
		upcasts,
		target: Target::Field {
			dependency,
			set: field.set_fn(),
		},
	})
}

fn eligible(
	settings: &InjectionSettings,
	vocabulary: &dyn Vocabulary,
	visibility: Visibility,
	is_static: bool,
	is_abstract: bool,
	markers: &[Marker],
) -> bool {
	(settings.private_injection || visibility == Visibility::Public)
		&& (settings.static_injection || !is_static)
		&& !is_abstract
		&& vocabulary.has_inject(markers)
}

fn check_declaring(level: &TypeInfo, declaring: TypeKey, member: &str) -> DiResult<()> {
	if declaring != level.key() {
		return Err(DiError::InternalFailure(format!(
			"Member {} is declared on {} but registered on {}",
			member,
			declaring,
			level.key()
		)));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dependency::DeclaredType;
	use crate::error::ErrorKind;
	use crate::marker::standard::{StandardVocabulary, inject};
	use crate::type_info::{ConstructorInfo, Injectable, ParameterInfo};
	use rstest::rstest;

	struct Base;
	struct Derived {
		base: Base,
	}
	struct Dep;

	impl Injectable for Base {
		fn type_info() -> TypeInfo {
			TypeInfo::builder::<Base>()
				.constructor(ConstructorInfo::new(|_| Ok(Base)))
				.field(FieldInfo::new("base_field", DeclaredType::of::<Dep>(), |_: &Base, _| Ok(())).marked(inject()))
				.method(MethodInfo::new("overridden", |_: &Base, _| Ok(())).marked(inject()))
				.method(MethodInfo::new("base_only", |_: &Base, _| Ok(())).marked(inject()))
				.build()
		}
	}

	impl Injectable for Derived {
		fn type_info() -> TypeInfo {
			TypeInfo::builder::<Derived>()
				.extends::<Base>(|derived| &derived.base)
				.constructor(ConstructorInfo::new(|_| Ok(Derived { base: Base })))
				.method(MethodInfo::new("overridden", |_: &Derived, _| Ok(())))
				.field(FieldInfo::new("derived_field", DeclaredType::of::<Dep>(), |_: &Derived, _| Ok(())).marked(inject()))
				.method(
					MethodInfo::new("derived_method", |_: &Derived, _| Ok(()))
						.param(ParameterInfo::of::<Dep>())
						.marked(inject()),
				)
				.build()
		}
	}

	fn members(injections: &[MemberInjection]) -> Vec<String> {
		injections.iter().map(|i| i.member.clone()).collect()
	}

	#[rstest]
	fn test_supertype_members_come_first_and_overrides_are_skipped() {
		// Act
		let injections = scan_members(
			&InjectionSettings::default(),
			&StandardVocabulary,
			&Derived::type_info(),
		)
		.unwrap();

		// Assert
		let base = TypeKey::of::<Base>();
		let derived = TypeKey::of::<Derived>();
		assert_eq!(
			members(&injections),
			vec![
				format!("{}::base_field", base),
				format!("{}::base_only", base),
				format!("{}::derived_field", derived),
				format!("{}::derived_method", derived),
			]
		);
	}

	#[rstest]
	fn test_static_members_need_static_injection() {
		// Arrange
		let info = TypeInfo::builder::<Dep>()
			.method(MethodInfo::new("configure", |_: &Dep, _| Ok(())).static_member().marked(inject()))
			.build();

		// Act
		let disabled = scan_members(&InjectionSettings::default(), &StandardVocabulary, &info).unwrap();
		let enabled = scan_members(
			&InjectionSettings {
				static_injection: true,
				..InjectionSettings::default()
			},
			&StandardVocabulary,
			&info,
		)
		.unwrap();

		// Assert
		assert!(disabled.is_empty());
		assert_eq!(enabled.len(), 1);
		assert!(enabled[0].static_key.is_some());
	}

	#[rstest]
	fn test_final_field_is_misannotated() {
		// Arrange
		let info = TypeInfo::builder::<Dep>()
			.field(
				FieldInfo::new("locked", DeclaredType::of::<Base>(), |_: &Dep, _| Ok(()))
					.final_member()
					.marked(inject()),
			)
			.build();

		// Act
		let error = scan_members(&InjectionSettings::default(), &StandardVocabulary, &info).unwrap_err();

		// Assert
		assert_eq!(error.kind(), ErrorKind::MisannotatedInjectee);
		assert!(error.to_string().contains("Cannot inject into final field"));
	}

	#[rstest]
	fn test_package_private_methods_only_override_within_module() {
		// Arrange
		let info = TypeInfo::builder::<Derived>()
			.in_module("other::module")
			.extends::<Base>(|derived| &derived.base)
			.method(
				MethodInfo::new("overridden", |_: &Derived, _| Ok(()))
					.visibility(Visibility::PackagePrivate),
			)
			.build();

		// Act
		let injections = scan_members(&InjectionSettings::default(), &StandardVocabulary, &info).unwrap();

		// Assert
		let names = members(&injections);
		assert!(names.iter().any(|name| name.ends_with("Base::overridden")));
	}

	#[rstest]
	fn test_member_registered_on_wrong_type_is_rejected() {
		// Arrange
		let info = TypeInfo::builder::<Dep>()
			.method(MethodInfo::new("foreign", |_: &Base, _| Ok(())).marked(inject()))
			.build();

		// Act
		let error = scan_members(&InjectionSettings::default(), &StandardVocabulary, &info).unwrap_err();

		// Assert
		assert_eq!(error.kind(), ErrorKind::InternalFailure);
	}
}
