use tracing::{debug, trace};

use crate::table::Table;

impl Table {
    /// Minimizes the table in place by merging behaviorally indistinguishable states,
    /// returning the number of states that were merged away.
    ///
    /// Two live states are indistinguishable when, for every input value, they emit the
    /// same output and name the same successor. This is a one-step, name-literal
    /// comparison rather than a bisimulation check: a merge rewrites every transition
    /// into the removed state to name the surviving state instead, and the scan then
    /// restarts from the first pair. Each merge can thereby make further pairs equal, and
    /// repeating the scan until no pair matches reaches the same fixed point that
    /// partition refinement would, so the observable input/output behavior is unchanged.
    ///
    /// Merged states are tombstoned, not removed: their slots (and indices) survive, but
    /// they are skipped by live-state iteration and by serialization. The live-state
    /// count decreases by exactly the returned number of merges.
    pub fn minimize(&mut self) -> usize {
        let mut merged = 0;
        'scan: loop {
            for p in 0..self.states.len() {
                if !self.is_live(p) {
                    continue;
                }
                for q in p + 1..self.states.len() {
                    if !self.is_live(q) {
                        continue;
                    }
                    if self.indistinguishable(p, q) {
                        trace!(
                            "merging state `{}` into `{}`",
                            self.states[q].name,
                            self.states[p].name
                        );
                        self.merge(p, q);
                        merged += 1;
                        // every merge may unlock earlier pairs, so the scan starts over
                        continue 'scan;
                    }
                }
            }
            break;
        }
        debug!("merged {merged} states, {} remain live", self.live_count());
        merged
    }

    /// Whether states `p` and `q` emit the same output and name the same successor for
    /// every input value.
    fn indistinguishable(&self, p: usize, q: usize) -> bool {
        self.states[p]
            .cells
            .iter()
            .zip(&self.states[q].cells)
            .all(|(a, b)| a.output == b.output && a.next == b.next)
    }

    /// Redirects every transition naming `q` (in live and tombstoned states alike, so
    /// that indices stay simple) to name `p` instead, then tombstones `q`.
    fn merge(&mut self, p: usize, q: usize) {
        let removed = self.states[q].name.clone();
        let survivor = self.states[p].name.clone();
        for state in &mut self.states {
            for cell in &mut state.cells {
                if cell.next == removed {
                    cell.next.clone_from(&survivor);
                }
            }
        }
        self.dead.insert(q);
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    /// The table from the worked example: `B` and `C` emit the same outputs and both
    /// return to `A` on every input, so they are indistinguishable.
    fn mergeable_table() -> Table {
        let mut builder = TableBuilder::new(1, 1, 3).unwrap();
        for (input, current, next, output) in [
            ("0", "A", "B", "0"),
            ("1", "A", "C", "1"),
            ("0", "B", "A", "0"),
            ("1", "B", "A", "1"),
            ("0", "C", "A", "0"),
            ("1", "C", "A", "1"),
        ] {
            builder.record(input, current, next, output).unwrap();
        }
        builder.finish().unwrap()
    }

    /// Every pair of states differs in at least one output.
    fn rigid_table() -> Table {
        let mut builder = TableBuilder::new(1, 2, 3).unwrap();
        for (input, current, next, output) in [
            ("0", "A", "B", "00"),
            ("1", "A", "C", "01"),
            ("0", "B", "C", "10"),
            ("1", "B", "A", "01"),
            ("0", "C", "A", "11"),
            ("1", "C", "B", "01"),
        ] {
            builder.record(input, current, next, output).unwrap();
        }
        builder.finish().unwrap()
    }

    #[test_log::test]
    fn merges_indistinguishable_pair() {
        let mut table = mergeable_table();
        assert_eq!(table.minimize(), 1);
        assert_eq!(table.live_count(), 2);

        // B (earlier in sequence order) survives, C is tombstoned but keeps its slot.
        assert_eq!(table.state_count(), 3);
        assert!(table.is_live(0));
        assert!(table.is_live(1));
        assert!(!table.is_live(2));

        // every transition into C was redirected to B
        assert_eq!(table.states()[0].cell(1).unwrap().next, "B");
        assert!(table
            .live_states()
            .flat_map(|(_, state)| state.cells())
            .all(|cell| cell.next != "C"));
    }

    #[test]
    fn rigid_table_is_left_unchanged() {
        let mut table = rigid_table();
        let before = table.clone();
        assert_eq!(table.minimize(), 0);
        assert_eq!(table, before);
    }

    #[test]
    fn minimization_is_idempotent() {
        let mut table = mergeable_table();
        table.minimize();
        let once = table.clone();
        assert_eq!(table.minimize(), 0);
        assert_eq!(table, once);
    }

    #[test_log::test]
    fn cascading_merge_requires_restart() {
        // D and E only become indistinguishable after C is merged into B: before that
        // merge D points at B where E points at C. A single pass without the restart
        // would miss the second merge.
        let mut builder = TableBuilder::new(1, 1, 5).unwrap();
        for (input, current, next, output) in [
            ("0", "A", "D", "0"),
            ("1", "A", "E", "1"),
            ("0", "B", "A", "0"),
            ("1", "B", "A", "1"),
            ("0", "C", "A", "0"),
            ("1", "C", "A", "1"),
            ("0", "D", "B", "1"),
            ("1", "D", "B", "0"),
            ("0", "E", "C", "1"),
            ("1", "E", "B", "0"),
        ] {
            builder.record(input, current, next, output).unwrap();
        }
        let mut table = builder.finish().unwrap();

        assert_eq!(table.minimize(), 2);
        assert_eq!(table.live_count(), 3);
        assert_eq!(table.position("C"), None);
        assert_eq!(table.position("E"), None);
    }

    #[test]
    fn reduction_preserves_behavior() {
        let original = mergeable_table();
        let mut reduced = original.clone();
        reduced.minimize();

        let words: Vec<Vec<u64>> = vec![
            vec![],
            vec![0],
            vec![1],
            vec![0, 1, 0, 1],
            vec![1, 1, 1, 0, 0, 1],
            vec![0, 0, 0, 0, 1, 1, 0, 1],
        ];
        for word in words {
            for (_, state) in original.live_states() {
                let name = state.name().to_string();
                // a state merged away is represented by the survivor it was folded into
                let representative = if reduced.position(&name).is_some() {
                    name.clone()
                } else {
                    "B".to_string()
                };
                assert_eq!(
                    original.trace(&name, word.iter().copied()),
                    reduced.trace(&representative, word.iter().copied()),
                    "word {word:?} from state {name}"
                );
            }
        }
    }

    #[test]
    fn live_count_shrinks_monotonically() {
        let mut table = mergeable_table();
        let declared = table.state_count();
        table.minimize();
        assert!(table.live_count() < declared);

        let mut rigid = rigid_table();
        let declared = rigid.state_count();
        rigid.minimize();
        assert_eq!(rigid.live_count(), declared);
    }
}
