//! Per-resolution circular dependency detection
//!
//! Each [`ResolutionContext`](crate::context::ResolutionContext) owns one
//! [`CycleDetectionState`]. The state is never shared across threads or across
//! distinct request trees.
//!
//! ## Features
//!
//! - **O(1) Circular Detection**: lookup in a `HashSet<Identifier>`
//! - **Depth Limiting**: a configurable maximum depth stops pathological chains
//! - **Readable Paths**: the in-flight path is kept for error messages (`A -> B -> A`)

use std::collections::HashSet;

use crate::error::DiError;
use crate::identifier::Identifier;

/// Default maximum resolution depth
pub const DEFAULT_MAX_RESOLUTION_DEPTH: usize = 100;

/// In-flight identifiers of one resolution context
#[derive(Debug)]
pub(crate) struct CycleDetectionState {
	/// Identifiers currently being resolved (O(1) circular detection)
	resolution_set: HashSet<Identifier>,
	/// Resolution path (for displaying circular paths)
	resolution_path: Vec<Identifier>,
	max_depth: usize,
}

impl CycleDetectionState {
	pub(crate) fn new(max_depth: usize) -> Self {
		Self {
			resolution_set: HashSet::new(),
			resolution_path: Vec::new(),
			max_depth,
		}
	}

	/// Marks `identifier` as in progress.
	///
	/// Fails if it is already in progress or the depth limit would be exceeded.
	pub(crate) fn begin_resolution(&mut self, identifier: &Identifier) -> Result<(), CycleError> {
		if self.resolution_set.contains(identifier) {
			return Err(CycleError::CircularDependency {
				identifier: identifier.to_string(),
				path: self.build_cycle_path(identifier),
			});
		}

		let depth = self.resolution_path.len() + 1;
		if depth > self.max_depth {
			return Err(CycleError::MaxDepthExceeded(depth));
		}

		self.resolution_set.insert(identifier.clone());
		self.resolution_path.push(identifier.clone());
		Ok(())
	}

	/// Releases the in-progress marker of `identifier`.
	pub(crate) fn end_resolution(&mut self, identifier: &Identifier) {
		self.resolution_set.remove(identifier);
		if let Some(pos) = self
			.resolution_path
			.iter()
			.rposition(|entry| entry == identifier)
		{
			self.resolution_path.remove(pos);
		}
	}

	pub(crate) fn depth(&self) -> usize {
		self.resolution_path.len()
	}

	fn build_cycle_path(&self, current: &Identifier) -> String {
		match self
			.resolution_path
			.iter()
			.position(|entry| entry == current)
		{
			Some(cycle_start) => {
				let cycle: Vec<String> = self.resolution_path[cycle_start..]
					.iter()
					.map(ToString::to_string)
					.collect();
				format!("{} -> {}", cycle.join(" -> "), current)
			}
			None => format!("Unknown cycle involving {}", current),
		}
	}
}

/// Circular dependency error
#[derive(Debug, thiserror::Error)]
pub(crate) enum CycleError {
	#[error("Circular dependency detected: {identifier}\n  Path: {path}")]
	CircularDependency { identifier: String, path: String },

	#[error("Maximum resolution depth exceeded: {0}")]
	MaxDepthExceeded(usize),
}

impl From<CycleError> for DiError {
	fn from(error: CycleError) -> Self {
		match error {
			CycleError::CircularDependency { identifier, path } => {
				DiError::CircularDependency { identifier, path }
			}
			CycleError::MaxDepthExceeded(depth) => DiError::MaxDepthExceeded(depth),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use std::marker::PhantomData;

	struct TypeA;
	struct TypeB;
	struct TypeC;

	#[rstest]
	fn test_simple_cycle_detection() {
		// Arrange
		let mut state = CycleDetectionState::new(DEFAULT_MAX_RESOLUTION_DEPTH);
		let type_a = Identifier::of::<TypeA>();

		// Act
		state.begin_resolution(&type_a).unwrap();

		// Assert: resolving TypeA again is circular
		let result = state.begin_resolution(&type_a);
		assert!(matches!(result, Err(CycleError::CircularDependency { .. })));

		// Act: release the marker
		state.end_resolution(&type_a);

		// Assert: after cleanup, resolution succeeds again
		assert!(state.begin_resolution(&type_a).is_ok());
	}

	#[rstest]
	fn test_cycle_path_lists_participants() {
		// Arrange
		let mut state = CycleDetectionState::new(DEFAULT_MAX_RESOLUTION_DEPTH);
		let type_a = Identifier::of::<TypeA>();
		let type_b = Identifier::of::<TypeB>();
		let type_c = Identifier::of::<TypeC>();
		state.begin_resolution(&type_a).unwrap();
		state.begin_resolution(&type_b).unwrap();
		state.begin_resolution(&type_c).unwrap();

		// Act
		let error = state.begin_resolution(&type_b).unwrap_err();

		// Assert
		match error {
			CycleError::CircularDependency { path, .. } => {
				assert_eq!(path, format!("{} -> {} -> {}", type_b, type_c, type_b));
			}
			other => panic!("unexpected error: {other}"),
		}
	}

	#[rstest]
	fn test_qualified_identifiers_do_not_collide() {
		// Arrange
		let mut state = CycleDetectionState::new(DEFAULT_MAX_RESOLUTION_DEPTH);
		state.begin_resolution(&Identifier::of::<TypeA>()).unwrap();

		// Act
		let result = state.begin_resolution(&Identifier::named::<TypeA>("other"));

		// Assert
		assert!(result.is_ok());
		assert_eq!(state.depth(), 2);
	}

	#[rstest]
	fn test_depth_tracking() {
		// Arrange
		let mut state = CycleDetectionState::new(DEFAULT_MAX_RESOLUTION_DEPTH);
		let type1 = Identifier::of::<PhantomData<[u8; 0]>>();
		let type2 = Identifier::of::<PhantomData<[u8; 1]>>();
		let type3 = Identifier::of::<PhantomData<[u8; 2]>>();

		// Act & Assert
		state.begin_resolution(&type1).unwrap();
		state.begin_resolution(&type2).unwrap();
		state.begin_resolution(&type3).unwrap();
		assert_eq!(state.depth(), 3, "Depth should be 3 after third resolution");

		state.end_resolution(&type3);
		assert_eq!(state.depth(), 2);
		state.end_resolution(&type2);
		state.end_resolution(&type1);
		assert_eq!(state.depth(), 0, "Depth should be 0 after releasing all markers");
	}

	#[rstest]
	fn test_depth_limit() {
		// Arrange
		let mut state = CycleDetectionState::new(2);
		state.begin_resolution(&Identifier::of::<TypeA>()).unwrap();
		state.begin_resolution(&Identifier::of::<TypeB>()).unwrap();

		// Act
		let result = state.begin_resolution(&Identifier::of::<TypeC>());

		// Assert
		assert!(matches!(result, Err(CycleError::MaxDepthExceeded(3))));
		assert_eq!(state.depth(), 2);
	}

	#[rstest]
	fn test_deterministic_detection_at_deep_depth() {
		// Arrange: push depth past 50 with unique identifiers
		let mut state = CycleDetectionState::new(DEFAULT_MAX_RESOLUTION_DEPTH);
		for index in 0..60 {
			state
				.begin_resolution(&Identifier::named::<TypeA>(format!("level-{index}")))
				.unwrap();
		}

		// Act
		let result = state.begin_resolution(&Identifier::named::<TypeA>("level-55"));

		// Assert
		assert_eq!(state.depth(), 60);
		assert!(
			matches!(result, Err(CycleError::CircularDependency { .. })),
			"Cycle must be detected deterministically at depth > 50"
		);
	}
}
