use pagekit_core::config::EditorConfig;
use pagekit_core::model::block::{BlockPatch, BlockType, Properties};
use pagekit_core::service::save_scheduler::PersistenceScheduler;
use pagekit_core::MutationEngine;
use proptest::prelude::*;
use std::collections::HashSet;

#[derive(Debug, Clone)]
enum Op {
    Insert { after: Option<usize>, kind: usize },
    Update { target: usize, content: String },
    Delete(usize),
    Duplicate(usize),
    Transform { target: usize, kind: usize },
    Move { target: usize, to: usize },
    Indent(usize),
    Outdent(usize),
    ToggleChecked(usize),
    Split(usize),
    Ghost,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (proptest::option::of(0..16usize), 0..12usize)
            .prop_map(|(after, kind)| Op::Insert { after, kind }),
        (0..16usize, "[a-z# ]{0,4}").prop_map(|(target, content)| Op::Update { target, content }),
        (0..16usize).prop_map(Op::Delete),
        (0..16usize).prop_map(Op::Duplicate),
        (0..16usize, 0..12usize).prop_map(|(target, kind)| Op::Transform { target, kind }),
        (0..16usize, 0..40usize).prop_map(|(target, to)| Op::Move { target, to }),
        (0..16usize).prop_map(Op::Indent),
        (0..16usize).prop_map(Op::Outdent),
        (0..16usize).prop_map(Op::ToggleChecked),
        (0..16usize).prop_map(Op::Split),
        Just(Op::Ghost),
    ]
}

fn pick(engine: &MutationEngine, index: usize) -> uuid::Uuid {
    let blocks = engine.blocks();
    blocks[index % blocks.len()].id
}

fn apply(engine: &mut MutationEngine, op: &Op) {
    match op {
        Op::Insert { after, kind } => {
            let after = after.map(|index| pick(engine, index));
            engine.insert(after, BlockType::ALL[*kind], "", Properties::new());
        }
        Op::Update { target, content } => {
            let id = pick(engine, *target);
            engine.update(id, &BlockPatch::content(content.clone()));
        }
        Op::Delete(target) => {
            let id = pick(engine, *target);
            engine.delete(id);
        }
        Op::Duplicate(target) => {
            let id = pick(engine, *target);
            engine.duplicate(id);
        }
        Op::Transform { target, kind } => {
            let id = pick(engine, *target);
            engine.transform(id, BlockType::ALL[*kind], None);
        }
        Op::Move { target, to } => {
            let id = pick(engine, *target);
            engine.move_to(id, *to);
        }
        Op::Indent(target) => {
            let id = pick(engine, *target);
            engine.indent(id);
        }
        Op::Outdent(target) => {
            let id = pick(engine, *target);
            engine.outdent(id);
        }
        Op::ToggleChecked(target) => {
            let id = pick(engine, *target);
            engine.toggle_checked(id);
        }
        Op::Split(target) => {
            let id = pick(engine, *target);
            engine.split_after(id);
        }
        Op::Ghost => {
            let ghost = uuid::Uuid::new_v4();
            assert!(engine.delete(ghost).is_none());
            assert!(engine.update(ghost, &BlockPatch::content("x")).is_none());
        }
    }
}

proptest! {
    #[test]
    fn documents_stay_non_empty_with_unique_ids(ops in proptest::collection::vec(op_strategy(), 0..64)) {
        let mut engine = MutationEngine::new("prop-page");
        for op in &ops {
            apply(&mut engine, op);

            prop_assert!(!engine.blocks().is_empty());
            let ids = engine.blocks().iter().map(|block| block.id).collect::<HashSet<_>>();
            prop_assert_eq!(ids.len(), engine.blocks().len());
            prop_assert!(engine.store().check_invariants().is_ok(), "{:?}", op);
            prop_assert!(engine.blocks().iter().all(|block| block.indent() <= 3));
        }
    }

    #[test]
    fn move_only_reorders(count in 1..10usize, from in 0..10usize, to in 0..20usize) {
        let mut engine = MutationEngine::new("prop-page");
        for _ in 1..count {
            engine.insert(None, BlockType::Text, "", Properties::new());
        }
        let before = engine.store().ids();
        let target = before[from % before.len()];

        engine.move_to(target, to);

        let after = engine.store().ids();
        prop_assert_eq!(after.len(), before.len());
        prop_assert_eq!(after.iter().collect::<HashSet<_>>(), before.iter().collect::<HashSet<_>>());
        prop_assert_eq!(after[to.min(before.len() - 1)], target);
        let rest_before = before.iter().filter(|id| **id != target).collect::<Vec<_>>();
        let rest_after = after.iter().filter(|id| **id != target).collect::<Vec<_>>();
        prop_assert_eq!(rest_before, rest_after);
    }

    #[test]
    fn transform_is_idempotent(kind in 0..12usize, content in "[a-z]{0,6}") {
        let mut engine = MutationEngine::new("prop-page");
        let id = engine.blocks()[0].id;
        engine.update(id, &BlockPatch::content(content));

        engine.transform(id, BlockType::ALL[kind], None);
        let once = engine.get(id).cloned();
        engine.transform(id, BlockType::ALL[kind], None);

        prop_assert_eq!(engine.get(id).cloned(), once);
    }

    #[test]
    fn bursts_of_mutations_collapse_into_one_trailing_save(
        gaps in proptest::collection::vec(0..999u64, 1..20)
    ) {
        let mut scheduler = PersistenceScheduler::new(&EditorConfig::default());
        let mut now = 0_u64;
        for gap in &gaps {
            now += gap;
            prop_assert!(scheduler.begin_save(now).is_none());
            scheduler.record_mutation(now);
        }

        prop_assert!(scheduler.begin_save(now + 999).is_none());
        let ticket = scheduler.begin_save(now + 1_000);
        prop_assert!(ticket.is_some());
        prop_assert!(scheduler.begin_save(now + 5_000).is_none());
    }
}
