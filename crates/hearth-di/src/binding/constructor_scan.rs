//! Constructor selection for automatic binding

use crate::error::{DiError, DiResult};
use crate::marker::Vocabulary;
use crate::settings::InjectionSettings;
use crate::type_info::{ConstructorInfo, TypeInfo, Visibility};

/// Selects the constructor used to bind `info` automatically.
///
/// At most one visible constructor may be marked for injection. Without a
/// marked constructor, a public zero-argument constructor is used only if it
/// is the sole visible constructor.
pub(crate) fn select_constructor<'t>(
	settings: &InjectionSettings,
	vocabulary: &dyn Vocabulary,
	info: &'t TypeInfo,
) -> DiResult<&'t ConstructorInfo> {
	let mut marked: Option<&ConstructorInfo> = None;
	let mut default: Option<&ConstructorInfo> = None;
	let mut found_other = false;

	for constructor in info.constructors() {
		let public = constructor.visibility_of() == Visibility::Public;
		if !public && !settings.private_injection {
			continue;
		}
		if vocabulary.has_inject(constructor.markers()) {
			if marked.is_some() {
				return Err(DiError::MisannotatedInjectee(format!(
					"Multiple constructors marked for injection present on {}",
					info.key()
				)));
			}
			marked = Some(constructor);
		}
		if public && constructor.parameters().is_empty() {
			default = Some(constructor);
		} else {
			found_other = true;
		}
	}

	if let Some(constructor) = marked {
		return Ok(constructor);
	}
	match default {
		Some(constructor) if !found_other => Ok(constructor),
		_ => Err(DiError::MisannotatedInjectee(format!(
			"No injectable constructors found for concrete type {}",
			info.key()
		))),
	}
}
