//! Error types for dependency resolution

use thiserror::Error;

/// Boxed error returned by user-supplied constructors, producers and member setters.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type used throughout the container
pub type DiResult<T> = std::result::Result<T, DiError>;

/// Coarse classification of a [`DiError`].
///
/// Kinds form a small hierarchy: a multi-binding failure is also a
/// misconfigured-bindings failure. Use [`ErrorKind::is_a`] for ancestor checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	MisconfiguredBindings,
	MultiBinding,
	OptionalBinding,
	MisannotatedInjectee,
	CircularDependency,
	InvocationFailure,
	InternalFailure,
}

impl ErrorKind {
	/// Returns `true` if this kind is `ancestor` or descends from it.
	pub fn is_a(self, ancestor: ErrorKind) -> bool {
		self == ancestor
			|| matches!(
				(self, ancestor),
				(ErrorKind::MultiBinding, ErrorKind::MisconfiguredBindings)
			)
	}
}

/// Dependency injection errors
#[derive(Debug, Error)]
pub enum DiError {
	#[error("Misconfigured bindings: {0}")]
	MisconfiguredBindings(String),

	#[error("Multi-binding failure: {0}")]
	MultiBinding(String),

	#[error("Optional binding failure: {0}")]
	OptionalBinding(String),

	#[error("Misannotated injectee: {0}")]
	MisannotatedInjectee(String),

	#[error(
		"Circular dependency detected while serving request for {identifier}\n  Path: {path}\nThis forms a cycle that cannot be resolved."
	)]
	CircularDependency {
		/// Identifier that was re-entered
		identifier: String,
		/// Circular path (format: A -> B -> C -> A)
		path: String,
	},

	#[error(
		"Maximum resolution depth exceeded: {0}\nThis likely indicates an extremely deep or circular dependency chain."
	)]
	MaxDepthExceeded(usize),

	#[error("Invocation failed: {message}")]
	Invocation {
		message: String,
		#[source]
		source: Option<BoxError>,
	},

	#[error("Internal failure: {0}")]
	InternalFailure(String),

	/// An error re-raised with positional context. The kind of the wrapped
	/// error is preserved.
	#[error("{context}\n  caused by: {source}")]
	Context {
		context: String,
		#[source]
		source: Box<DiError>,
	},
}

impl DiError {
	/// Kind of the underlying error, looking through context wrappers.
	pub fn kind(&self) -> ErrorKind {
		match self {
			DiError::MisconfiguredBindings(_) => ErrorKind::MisconfiguredBindings,
			DiError::MultiBinding(_) => ErrorKind::MultiBinding,
			DiError::OptionalBinding(_) => ErrorKind::OptionalBinding,
			DiError::MisannotatedInjectee(_) => ErrorKind::MisannotatedInjectee,
			DiError::CircularDependency { .. } | DiError::MaxDepthExceeded(_) => {
				ErrorKind::CircularDependency
			}
			DiError::Invocation { .. } => ErrorKind::InvocationFailure,
			DiError::InternalFailure(_) => ErrorKind::InternalFailure,
			DiError::Context { source, .. } => source.kind(),
		}
	}

	/// Shorthand for `self.kind().is_a(ancestor)`.
	pub fn is_a(&self, ancestor: ErrorKind) -> bool {
		self.kind().is_a(ancestor)
	}

	/// The innermost error, with all context wrappers removed.
	pub fn root_cause(&self) -> &DiError {
		match self {
			DiError::Context { source, .. } => source.root_cause(),
			other => other,
		}
	}

	/// Wraps this error with additional positional context.
	pub fn with_context(self, context: impl Into<String>) -> Self {
		DiError::Context {
			context: context.into(),
			source: Box::new(self),
		}
	}

	pub(crate) fn invocation(message: impl Into<String>, source: BoxError) -> Self {
		DiError::Invocation {
			message: message.into(),
			source: Some(source),
		}
	}
}

/// Adds positional context to the error of a [`DiResult`].
pub(crate) trait ResultExt<T> {
	fn context_with<F>(self, context: F) -> DiResult<T>
	where
		F: FnOnce() -> String;
}

impl<T> ResultExt<T> for DiResult<T> {
	fn context_with<F>(self, context: F) -> DiResult<T>
	where
		F: FnOnce() -> String,
	{
		self.map_err(|error| error.with_context(context()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(ErrorKind::MultiBinding, ErrorKind::MisconfiguredBindings, true)]
	#[case(ErrorKind::MisconfiguredBindings, ErrorKind::MultiBinding, false)]
	#[case(ErrorKind::OptionalBinding, ErrorKind::MisconfiguredBindings, false)]
	#[case(ErrorKind::CircularDependency, ErrorKind::CircularDependency, true)]
	fn test_kind_ancestry(
		#[case] kind: ErrorKind,
		#[case] ancestor: ErrorKind,
		#[case] expected: bool,
	) {
		// Act
		let result = kind.is_a(ancestor);

		// Assert
		assert_eq!(result, expected);
	}

	#[rstest]
	fn test_context_preserves_kind_and_cause() {
		// Arrange
		let error = DiError::MisannotatedInjectee("Cannot inject into final field x".to_string());

		// Act
		let wrapped = error
			.with_context("Injecting field my::Type::x")
			.with_context("Invoking constructor my::Outer::new");

		// Assert
		assert_eq!(wrapped.kind(), ErrorKind::MisannotatedInjectee);
		assert!(matches!(
			wrapped.root_cause(),
			DiError::MisannotatedInjectee(_)
		));
		let message = wrapped.to_string();
		assert!(message.starts_with("Invoking constructor my::Outer::new"));
		assert!(message.contains("Injecting field my::Type::x"));
		assert!(message.contains("Cannot inject into final field x"));
	}

	#[rstest]
	fn test_max_depth_counts_as_circular() {
		// Arrange
		let error = DiError::MaxDepthExceeded(101);

		// Act & Assert
		assert!(error.is_a(ErrorKind::CircularDependency));
	}
}
