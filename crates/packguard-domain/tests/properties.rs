//! Property-based tests for the configuration resolution algorithm.

use proptest::prelude::*;

use packguard_domain::{Checklist, Planner};
use packguard_types::CheckSpec;

const MODULES: &[&str] = &["acme", "widgets"];
const LIST_NAMES: &[&str] = &["basic", "extra", "strict"];
const CHECK_NAMES: &[&str] = &["paths", "filters", "acls", "overlaps"];
const IMPLS: &[&str] = &["Paths", "Filters", "Acls", "Overlaps"];

fn check_strategy() -> impl Strategy<Value = CheckSpec> {
    (
        prop::sample::select(CHECK_NAMES),
        prop::sample::select(IMPLS),
        any::<bool>(),
        prop::option::of(0u8..5),
    )
        .prop_map(|(name, impl_ref, skip, threshold)| {
            let mut config = serde_json::Map::new();
            if let Some(threshold) = threshold {
                config.insert("threshold".to_string(), serde_json::json!(threshold));
            }
            CheckSpec {
                name: Some(name.to_string()),
                impl_ref: Some(impl_ref.to_string()),
                skip,
                config,
                ..CheckSpec::default()
            }
        })
}

fn checklist_strategy() -> impl Strategy<Value = Checklist> {
    (
        prop::sample::select(MODULES),
        prop::sample::select(LIST_NAMES),
        prop::collection::vec(check_strategy(), 0..4),
    )
        .prop_map(|(module, name, checks)| {
            Checklist::builder(module)
                .with_name(name)
                .with_checks(checks)
                .build()
                .expect("generated checks are concrete and slash-free")
        })
}

/// Overrides reference either a bare check name (abstract suffix override)
/// or a fully qualified one, with an optional replacement impl. Templates
/// are deliberately not generated here; template resolution has dedicated
/// unit tests and its failure mode is a typed error, not a resolution.
fn override_strategy() -> impl Strategy<Value = CheckSpec> {
    (
        prop::sample::select(CHECK_NAMES),
        prop::option::of(prop::sample::select(MODULES)),
        prop::option::of(prop::sample::select(IMPLS)),
        any::<bool>(),
        prop::option::of(5u8..10),
    )
        .prop_map(|(name, qualifier, impl_ref, skip, threshold)| {
            let name = match qualifier {
                Some(module) => format!("{module}/basic/{name}"),
                None => name.to_string(),
            };
            let mut config = serde_json::Map::new();
            if let Some(threshold) = threshold {
                config.insert("threshold".to_string(), serde_json::json!(threshold));
            }
            CheckSpec {
                name: Some(name),
                impl_ref: impl_ref.map(str::to_string),
                skip,
                config,
                ..CheckSpec::default()
            }
        })
}

fn scenario_strategy() -> impl Strategy<
    Value = (
        Vec<Checklist>,
        Vec<String>,
        Vec<CheckSpec>,
    ),
> {
    (
        prop::collection::vec(checklist_strategy(), 0..4),
        prop::collection::vec(
            prop::sample::select(vec![
                "basic".to_string(),
                "extra".to_string(),
                "acme/*".to_string(),
                "*".to_string(),
                "nothing-matches".to_string(),
            ]),
            0..3,
        ),
        prop::collection::vec(override_strategy(), 0..4),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    // Resolving the same checklist set and override list twice yields an
    // identical effective list: same order, same content.
    #[test]
    fn resolution_is_deterministic(
        (checklists, patterns, overrides) in scenario_strategy(),
    ) {
        let first = Planner::new(checklists.clone(), &patterns)
            .expect("patterns compile")
            .effective_checks(&overrides)
            .expect("no templates generated");
        let second = Planner::new(checklists, &patterns)
            .expect("patterns compile")
            .effective_checks(&overrides)
            .expect("no templates generated");

        prop_assert_eq!(first, second);
    }

    // The effective list never contains two specs with the same final name.
    #[test]
    fn effective_names_are_unique(
        (checklists, patterns, overrides) in scenario_strategy(),
    ) {
        let effective = Planner::new(checklists, &patterns)
            .expect("patterns compile")
            .effective_checks(&overrides)
            .expect("no templates generated");

        let mut names: Vec<&str> = effective.iter().map(|s| s.name_or_empty()).collect();
        let before = names.len();
        names.sort_unstable();
        names.dedup();
        prop_assert_eq!(before, names.len());
    }

    // Every effective spec is invokable: abstract specs never survive
    // resolution, and skipped specs never appear.
    #[test]
    fn effective_specs_are_concrete_and_unskipped(
        (checklists, patterns, overrides) in scenario_strategy(),
    ) {
        let effective = Planner::new(checklists, &patterns)
            .expect("patterns compile")
            .effective_checks(&overrides)
            .expect("no templates generated");

        for spec in &effective {
            prop_assert!(!spec.is_abstract());
            prop_assert!(!spec.skip);
        }
    }
}
