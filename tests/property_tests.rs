//! Property-based tests for sync and push selection.
//!
//! These tests use proptest to build random commit graphs and branch
//! layouts on the in-memory store, then check the reconciler and publisher
//! against the graph itself.

use proptest::prelude::*;
use proptest::sample::Index;

use refsync::core::types::{BranchName, Oid};
use refsync::engine::{Outcome, Publisher, PushOptions, Reconciler, SyncOptions};
use refsync::git::mock::MockRefStore;
use refsync::git::RefStore;
use refsync::ui::output::Verbosity;
use refsync::ui::prompts::ScriptedPrompt;

/// Commit `i` gets a first parent below `i` and, if the flag is set, a
/// second one (a merge).
fn commit_graph() -> impl Strategy<Value = Vec<(Index, Index, bool)>> {
    prop::collection::vec((any::<Index>(), any::<Index>(), any::<bool>()), 1..14)
}

/// Per branch: local tip, remote tip, whether it has an upstream.
fn branch_layout() -> impl Strategy<Value = Vec<(Index, Index, bool)>> {
    prop::collection::vec((any::<Index>(), any::<Index>(), any::<bool>()), 1..5)
}

fn build_graph(store: &MockRefStore, shape: &[(Index, Index, bool)]) -> Vec<Oid> {
    let mut oids: Vec<Oid> = Vec::new();
    for (i, (first, second, merge)) in shape.iter().enumerate() {
        let oid = if i == 0 {
            store.commit(&[], "root")
        } else {
            let p1 = first.index(i);
            let p2 = second.index(i);
            if *merge && p1 != p2 {
                store.commit(&[&oids[p1], &oids[p2]], "merge")
            } else {
                store.commit(&[&oids[p1]], "commit")
            }
        };
        oids.push(oid);
    }
    oids
}

struct Layout {
    name: String,
    local: Oid,
    remote: Oid,
    tracked: bool,
}

fn arrange(
    graph: &[(Index, Index, bool)],
    branches: &[(Index, Index, bool)],
) -> (MockRefStore, Vec<Layout>) {
    let store = MockRefStore::new();
    let oids = build_graph(&store, graph);

    let layouts: Vec<Layout> = branches
        .iter()
        .enumerate()
        .map(|(i, (local, remote, tracked))| Layout {
            name: format!("b{i}"),
            local: oids[local.index(oids.len())].clone(),
            remote: oids[remote.index(oids.len())].clone(),
            tracked: *tracked,
        })
        .collect();

    for layout in &layouts {
        store.set_branch(&layout.name, &layout.local);
        if layout.tracked {
            store.set_upstream(&layout.name, &layout.name);
            store.set_tracking(&layout.name, &layout.remote);
            store.set_server_branch(&layout.name, &layout.remote);
        }
    }
    store.checkout("b0");
    (store, layouts)
}

proptest! {
    /// A branch that was an ancestor of its upstream ends at the upstream;
    /// any other branch is left where it was.
    #[test]
    fn sync_only_fast_forwards(graph in commit_graph(), branches in branch_layout()) {
        let (store, layouts) = arrange(&graph, &branches);
        let opts = SyncOptions { lfs: false, ..Default::default() };

        let report = Reconciler::new(&store, &ScriptedPrompt::declining(), Verbosity::Quiet)
            .sync(&opts)
            .unwrap();
        prop_assert_eq!(report.outcome, Outcome::Completed);

        for layout in &layouts {
            let tip = store.branch(&layout.name).unwrap();
            let can_ff = layout.tracked && store.is_ancestor(&layout.local, &layout.remote).unwrap();
            if can_ff {
                prop_assert_eq!(&tip, &layout.remote, "{} should be fast-forwarded", layout.name);
            } else {
                prop_assert_eq!(&tip, &layout.local, "{} should be untouched", layout.name);
            }
        }
    }

    /// Syncing again without remote changes does nothing.
    #[test]
    fn sync_is_idempotent(graph in commit_graph(), branches in branch_layout()) {
        let (store, _) = arrange(&graph, &branches);
        let opts = SyncOptions { lfs: false, ..Default::default() };
        let prompt = ScriptedPrompt::declining();

        Reconciler::new(&store, &prompt, Verbosity::Quiet).sync(&opts).unwrap();
        let before = store.snapshot();
        let second = Reconciler::new(&store, &prompt, Verbosity::Quiet).sync(&opts).unwrap();

        prop_assert!(second.updated.is_empty());
        prop_assert!(second.is_noop());
        prop_assert_eq!(store.snapshot(), before);
    }

    /// A branch is selected iff it has no upstream or is strictly ahead.
    #[test]
    fn push_selects_exactly_ahead(graph in commit_graph(), branches in branch_layout()) {
        let (store, layouts) = arrange(&graph, &branches);
        let before = store.snapshot();

        let report = Publisher::new(&store, &ScriptedPrompt::declining(), Verbosity::Quiet)
            .push(&PushOptions::default())
            .unwrap();

        let selected: Vec<BranchName> = report.candidates.iter().map(|c| c.branch.clone()).collect();
        for layout in &layouts {
            let name = BranchName::new(layout.name.as_str()).unwrap();
            let expected = !layout.tracked
                || store.ahead_count(&layout.remote, &layout.local).unwrap() > 0;
            prop_assert_eq!(selected.contains(&name), expected, "{}", layout.name);
        }

        // Declined, so nothing moved
        if !report.nothing_to_do() {
            prop_assert_eq!(report.outcome, Outcome::Aborted);
        }
        prop_assert_eq!(store.snapshot(), before);
    }
}
