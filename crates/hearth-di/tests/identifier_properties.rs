//! Property-based tests for identifiers and instance sets
//!
//! Uses proptest to verify:
//! 1. Named identifiers are equal exactly when their names are equal
//! 2. Equal identifiers hash alike
//! 3. Multi-bound sets never hold the same instance twice

use std::collections::HashSet;
use std::sync::Arc;

use hearth_di::{BindingModule, Identifier, Injector, ProducerInfo, multi_binding};
use proptest::prelude::*;

struct Service;

struct Token(usize);

proptest! {
	#[test]
	fn prop_named_identifier_equality_follows_names(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
		let first = Identifier::named::<Service>(a.as_str());
		let second = Identifier::named::<Service>(b.as_str());

		prop_assert_eq!(first == second, a == b);
		prop_assert_ne!(first, Identifier::of::<Service>());
	}

	#[test]
	fn prop_equal_identifiers_collapse_in_sets(names in prop::collection::vec("[a-c]", 1..20)) {
		let distinct: HashSet<&String> = names.iter().collect();
		let identifiers: HashSet<Identifier> = names
			.iter()
			.map(|name| Identifier::named::<Service>(name.as_str()))
			.collect();

		prop_assert_eq!(identifiers.len(), distinct.len());
	}

	#[test]
	fn prop_shared_instance_appears_once_in_multi_binding(
		fresh in 0usize..5,
		shared_bindings in 1usize..4,
	) {
		let shared = Arc::new(Token(usize::MAX));
		let mut module = BindingModule::new("tokens");
		for index in 0..fresh {
			module = module.producer(
				ProducerInfo::new::<Token, _>(format!("fresh_{index}"), move |_| {
					Ok(Some(Arc::new(Token(index))))
				})
				.marked(multi_binding()),
			);
		}
		for index in 0..shared_bindings {
			let shared = Arc::clone(&shared);
			module = module.producer(
				ProducerInfo::new::<Token, _>(format!("shared_{index}"), move |_| {
					Ok(Some(Arc::clone(&shared)))
				})
				.marked(multi_binding()),
			);
		}
		let injector = Injector::builder()
			.multi_bindings(true)
			.add_module(module)
			.build()
			.unwrap();

		let set = injector.request_multiple::<Token>().unwrap();

		prop_assert_eq!(set.len(), fresh + 1);
		prop_assert!(set.contains(&shared));
		prop_assert_eq!(set.iter().filter(|token| token.0 == usize::MAX).count(), 1);
	}
}
