use proptest::prelude::*;
use tasksync_core::board::project;
use tasksync_core::cache::tags::tags_for;
use tasksync_core::query::{QueryKey, TaskFilter};

#[path = "generators.rs"]
mod generators;
use generators::*;

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    #[test]
    fn query_key_ignores_change_order(
        changes in arb_field_changes(),
        order in Just((0..7).collect::<Vec<usize>>()).prop_shuffle(),
    ) {
        let forward = TaskFilter::default().with(changes.clone());
        let shuffled = TaskFilter::default().with(order.iter().map(|&i| changes[i].clone()));
        prop_assert_eq!(forward.query_key(), shuffled.query_key());
    }

    #[test]
    fn query_key_survives_param_round_trip(changes in arb_field_changes()) {
        let filter = TaskFilter::default().with(changes);
        let key = filter.query_key();
        let QueryKey::Tasks(params) = &key else {
            panic!("filters always produce collection keys");
        };
        prop_assert_eq!(TaskFilter::from_pairs(params.iter()).query_key(), key);
    }

    #[test]
    fn patch_then_inverse_restores(data in arb_collection(8), patch in arb_patch()) {
        let mut patched = data.clone();
        let changed = patch.apply(&mut patched);
        match patch.inverse(&data) {
            Some(inverse) => {
                prop_assert!(changed);
                inverse.apply(&mut patched);
                prop_assert_eq!(patched, data);
            }
            None => prop_assert_eq!(patched, data),
        }
    }

    #[test]
    fn tags_follow_contents(data in arb_collection(8), patch in arb_patch()) {
        let key = TaskFilter::default().query_key();
        let mut patched = data;
        patch.apply(&mut patched);
        let tags = tags_for(&key, Some(&patched));
        prop_assert_eq!(tags.len(), patched.tasks().len() + 1);
    }

    #[test]
    fn board_keeps_every_task_once(data in arb_collection(8)) {
        let grouping = project(data.tasks());
        prop_assert_eq!(grouping.len(), data.tasks().len());
        for task in data.tasks() {
            prop_assert_eq!(grouping.locate(&task.id), Some(task.column()));
        }
    }
}
