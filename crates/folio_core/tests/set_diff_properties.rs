use folio_core::model::identifier::{Identifier, IDENTIFIER_COMPARE_FIELDS};
use folio_core::versioning::set_diff::{changed_or_new, has_changed, project, unchanged, Projection};
use proptest::prelude::*;
use std::collections::HashSet;

fn identifier_strategy() -> impl Strategy<Value = Identifier> {
    (1i64..=3, "[a-c]{1,2}").prop_map(|(type_id, value)| Identifier::new(type_id, value))
}

/// Members with distinct stored ids `1..=n`.
fn stored_set() -> impl Strategy<Value = Vec<Identifier>> {
    prop::collection::vec(identifier_strategy(), 0..8).prop_map(|members| {
        members
            .into_iter()
            .enumerate()
            .map(|(index, member)| member.with_id(index as i64 + 1))
            .collect()
    })
}

fn projections<'a>(members: impl IntoIterator<Item = &'a Identifier>) -> HashSet<Projection> {
    members
        .into_iter()
        .map(|member| project(member, IDENTIFIER_COMPARE_FIELDS))
        .collect()
}

proptest! {
    #[test]
    fn reused_and_created_partition_the_submission(
        old in stored_set(),
        new in prop::collection::vec(identifier_strategy(), 0..8),
    ) {
        let reused = unchanged(&old, &new, IDENTIFIER_COMPARE_FIELDS);
        let created = changed_or_new(&old, &new, IDENTIFIER_COMPARE_FIELDS);

        let reused_projections = projections(reused.iter().copied());
        let created_projections = projections(created.iter().copied());
        prop_assert!(reused_projections.is_disjoint(&created_projections));

        let covered: HashSet<Projection> =
            reused_projections.union(&created_projections).cloned().collect();
        prop_assert_eq!(covered, projections(&new));

        prop_assert_eq!(reused.len(), reused_projections.len());
        prop_assert_eq!(created.len(), created_projections.len());
    }

    #[test]
    fn resubmitting_stored_members_is_not_a_change(
        old in stored_set(),
        seed in any::<u64>(),
    ) {
        let mut new = old.clone();
        let len = new.len();
        if len > 1 {
            new.rotate_left((seed as usize) % len);
        }
        prop_assert!(!has_changed(&old, &new, IDENTIFIER_COMPARE_FIELDS));
    }

    #[test]
    fn kept_ids_change_exactly_when_projections_differ(
        old in stored_set(),
        replacement in identifier_strategy(),
        index in any::<prop::sample::Index>(),
    ) {
        prop_assume!(!old.is_empty());
        let target = index.index(old.len());
        let mut new = old.clone();
        let id = new[target].id;
        new[target] = Identifier { id, ..replacement };

        let projection_differs = project(&old[target], IDENTIFIER_COMPARE_FIELDS)
            != project(&new[target], IDENTIFIER_COMPARE_FIELDS);
        prop_assert_eq!(
            has_changed(&old, &new, IDENTIFIER_COMPARE_FIELDS),
            projection_differs
        );
    }

    #[test]
    fn dropping_a_stored_member_is_a_change(
        old in stored_set(),
        index in any::<prop::sample::Index>(),
    ) {
        prop_assume!(!old.is_empty());
        let mut new = old.clone();
        new.remove(index.index(old.len()));
        prop_assert!(has_changed(&old, &new, IDENTIFIER_COMPARE_FIELDS));
    }

    #[test]
    fn everything_is_new_against_an_empty_set(
        new in prop::collection::vec(identifier_strategy(), 1..8),
    ) {
        let old: Vec<Identifier> = Vec::new();
        prop_assert!(has_changed(&old, &new, IDENTIFIER_COMPARE_FIELDS));
        prop_assert!(unchanged(&old, &new, IDENTIFIER_COMPARE_FIELDS).is_empty());
        prop_assert_eq!(
            projections(changed_or_new(&old, &new, IDENTIFIER_COMPARE_FIELDS)),
            projections(&new)
        );
    }
}
