use bit_set::BitSet;
use thiserror::Error;
use tracing::trace;

use crate::{
    bits::{decode, encode, BitsError},
    Map,
};

/// Errors that can occur while building a [`Table`] from a stream of transitions.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum TableError {
    /// The declared input width is zero.
    #[error("number of input bits must be positive")]
    ZeroInputWidth,
    /// The declared output width is zero.
    #[error("number of output bits must be positive")]
    ZeroOutputWidth,
    /// The declared state count is zero.
    #[error("a table must declare at least one state")]
    ZeroStates,
    /// The input domain `2^width` does not fit into a `usize`.
    #[error("input width of {0} bits exceeds what can be allocated")]
    WidthTooLarge(u32),
    /// A bit-string could not be decoded.
    #[error("malformed bit-string: {0}")]
    Bits(#[from] BitsError),
    /// A decoded input value lies outside the declared input domain.
    #[error("input value {value} does not fit into {width} bits")]
    InputOutOfRange {
        /// The decoded value.
        value: u64,
        /// The declared input width.
        width: u32,
    },
    /// A decoded output value lies outside the declared output domain.
    #[error("output value {value} does not fit into {width} bits")]
    OutputOutOfRange {
        /// The decoded value.
        value: u64,
        /// The declared output width.
        width: u32,
    },
    /// More distinct state names appeared than the table declared.
    #[error("state `{name}` exceeds the declared count of {declared} states")]
    Capacity {
        /// The name that did not fit.
        name: String,
        /// The declared number of states.
        declared: usize,
    },
    /// A declared state slot was never assigned a name.
    #[error("state slot {index} was declared but never named")]
    UnnamedState {
        /// Position of the empty slot.
        index: usize,
    },
    /// A state is missing the transition for one of its input values.
    #[error("state `{state}` has no transition for input {input}")]
    MissingCell {
        /// Name of the incompletely specified state.
        state: String,
        /// The input value without a transition.
        input: u64,
    },
}

/// One transition entry: the output emitted and the successor state entered when the
/// owning state reads the input value this cell is indexed by.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Cell {
    /// The decoded output value emitted by this transition.
    pub output: u64,
    /// Name of the state this transition leads to.
    pub next: String,
}

/// One row of a [`Table`]: a named state together with its transition cells, one per
/// input value, indexed by the numeric value of the input.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct State {
    pub(crate) name: String,
    pub(crate) cells: Vec<Cell>,
}

impl State {
    /// The unique name of this state.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All transition cells of this state, in input-value order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// The transition cell for the given input value, if it lies within the domain.
    pub fn cell(&self, input: u64) -> Option<&Cell> {
        usize::try_from(input).ok().and_then(|i| self.cells.get(i))
    }
}

/// A completely specified Mealy-style transition table.
///
/// States are kept in the order their names were first observed. Minimization never
/// removes a state from the sequence; it tombstones it instead, so the indices of all
/// other states remain stable. Tombstoned states are skipped by [`Self::live_states`]
/// and by serialization, but still occupy their slot.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Table {
    pub(crate) input_bits: u32,
    pub(crate) output_bits: u32,
    pub(crate) states: Vec<State>,
    pub(crate) dead: BitSet,
}

impl Table {
    /// Number of bits per input symbol.
    pub fn input_bits(&self) -> u32 {
        self.input_bits
    }

    /// Number of bits per output symbol.
    pub fn output_bits(&self) -> u32 {
        self.output_bits
    }

    /// Size of the input domain, i.e. `2^input_bits`.
    pub fn domain_size(&self) -> usize {
        1 << self.input_bits
    }

    /// Total number of state slots, including tombstoned ones.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Number of states that have not been tombstoned.
    pub fn live_count(&self) -> usize {
        self.states.len() - self.dead.len()
    }

    /// Returns true if the state at `index` exists and has not been tombstoned.
    pub fn is_live(&self, index: usize) -> bool {
        index < self.states.len() && !self.dead.contains(index)
    }

    /// All state slots in first-observation order, tombstoned ones included.
    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// Iterates over the live states together with their (stable) indices.
    pub fn live_states(&self) -> impl Iterator<Item = (usize, &State)> + '_ {
        self.states
            .iter()
            .enumerate()
            .filter(|(index, _)| !self.dead.contains(*index))
    }

    /// Index of the live state with the given name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.live_states()
            .find_map(|(index, state)| (state.name == name).then_some(index))
    }

    /// Runs the machine from the live state named `start`, feeding it the given input
    /// values and collecting the emitted outputs. Returns `None` if the start state is
    /// unknown, an input value lies outside the domain, or a transition names a state
    /// that does not exist.
    pub fn trace<I: IntoIterator<Item = u64>>(&self, start: &str, inputs: I) -> Option<Vec<u64>> {
        let mut current = self.position(start)?;
        let mut outputs = Vec::new();
        for input in inputs {
            let cell = self.states[current].cell(input)?;
            outputs.push(cell.output);
            current = self.position(&cell.next)?;
        }
        Some(outputs)
    }

    /// Renders the table as an ASCII grid for diagnostics, one row per state slot and
    /// one column per input value. Tombstoned rows are dimmed. This is not the exchange
    /// format, see [`Self::to_kiss`] for that.
    pub fn show(&self) -> String {
        use owo_colors::OwoColorize;
        let mut b = tabled::builder::Builder::default();

        let mut header = vec![String::new()];
        header.extend((0..self.domain_size()).map(|i| encode(i as u64, self.input_bits)));
        b.push_record(header);

        for (index, state) in self.states.iter().enumerate() {
            let mut row = vec![if self.dead.contains(index) {
                state.name.dimmed().to_string()
            } else {
                state.name.bold().to_string()
            }];
            row.extend(state.cells.iter().map(|cell| {
                format!(
                    "{}|{}",
                    cell.next.blue(),
                    encode(cell.output, self.output_bits).purple()
                )
            }));
            b.push_record(row);
        }

        b.build().with(tabled::settings::Style::ascii()).to_string()
    }
}

/// Incremental construction of a [`Table`] from a stream of transition quadruples.
///
/// The builder preallocates the declared number of state slots. The first occurrence of
/// a state name claims the next unassigned slot, so states end up in the order they were
/// first observed; later occurrences address the same slot. [`Self::finish`] refuses
/// tables that are not completely specified.
#[derive(Debug, Clone)]
pub struct TableBuilder {
    input_bits: u32,
    output_bits: u32,
    slots: Vec<Slot>,
    index: Map<String, usize>,
    assigned: usize,
}

#[derive(Debug, Clone)]
struct Slot {
    name: Option<String>,
    cells: Vec<Option<Cell>>,
}

impl TableBuilder {
    /// Creates a builder for a table with the given input/output widths and declared
    /// state count. All three must be positive and the input domain `2^input_bits` must
    /// be allocatable.
    pub fn new(input_bits: u32, output_bits: u32, state_count: usize) -> Result<Self, TableError> {
        if input_bits == 0 {
            return Err(TableError::ZeroInputWidth);
        }
        if output_bits == 0 {
            return Err(TableError::ZeroOutputWidth);
        }
        if state_count == 0 {
            return Err(TableError::ZeroStates);
        }
        let domain = 1usize
            .checked_shl(input_bits)
            .ok_or(TableError::WidthTooLarge(input_bits))?;
        Ok(Self {
            input_bits,
            output_bits,
            slots: vec![
                Slot {
                    name: None,
                    cells: vec![None; domain],
                };
                state_count
            ],
            index: Map::default(),
            assigned: 0,
        })
    }

    /// Records one transition quadruple: in state `current`, reading `input`, the
    /// machine moves to `next` and emits `output`. The two bit-strings are decoded and
    /// range-checked against the declared widths. Writing the same (state, input) cell
    /// twice keeps the last write.
    pub fn record(
        &mut self,
        input: &str,
        current: &str,
        next: &str,
        output: &str,
    ) -> Result<(), TableError> {
        let input = decode(input)?;
        let output = decode(output)?;
        if input >= 1 << self.input_bits {
            return Err(TableError::InputOutOfRange {
                value: input,
                width: self.input_bits,
            });
        }
        if self.output_bits < u64::BITS && output >> self.output_bits != 0 {
            return Err(TableError::OutputOutOfRange {
                value: output,
                width: self.output_bits,
            });
        }

        let slot = self.slot_for(current)?;
        trace!("state {current} (slot {slot}): input {input} -> {next} emitting {output}");
        self.slots[slot].cells[input as usize] = Some(Cell {
            output,
            next: next.to_string(),
        });
        Ok(())
    }

    fn slot_for(&mut self, name: &str) -> Result<usize, TableError> {
        if let Some(&index) = self.index.get(name) {
            return Ok(index);
        }
        if self.assigned == self.slots.len() {
            return Err(TableError::Capacity {
                name: name.to_string(),
                declared: self.slots.len(),
            });
        }
        let index = self.assigned;
        self.assigned += 1;
        self.slots[index].name = Some(name.to_string());
        self.index.insert(name.to_string(), index);
        Ok(index)
    }

    /// Freezes the builder into a [`Table`], verifying that every declared slot was
    /// named and every cell written. Next-state names are not required to resolve to a
    /// declared state; a dangling name is carried verbatim.
    pub fn finish(self) -> Result<Table, TableError> {
        let mut states = Vec::with_capacity(self.slots.len());
        for (index, slot) in self.slots.into_iter().enumerate() {
            let name = slot.name.ok_or(TableError::UnnamedState { index })?;
            let mut cells = Vec::with_capacity(slot.cells.len());
            for (input, cell) in slot.cells.into_iter().enumerate() {
                cells.push(cell.ok_or_else(|| TableError::MissingCell {
                    state: name.clone(),
                    input: input as u64,
                })?);
            }
            states.push(State { name, cells });
        }
        Ok(Table {
            input_bits: self.input_bits,
            output_bits: self.output_bits,
            states,
            dead: BitSet::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{TableBuilder, TableError};
    use crate::bits::BitsError;

    fn three_state_builder() -> TableBuilder {
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
        builder
    }

    #[test]
    fn builds_states_in_first_observation_order() {
        let table = three_state_builder().finish().unwrap();
        assert_eq!(
            table.states().iter().map(|s| s.name()).collect::<Vec<_>>(),
            vec!["A", "B", "C"]
        );
        assert_eq!(table.live_count(), 3);
        assert_eq!(table.states()[0].cell(1).unwrap().next, "C");
    }

    #[test]
    fn zero_parameters_are_rejected() {
        assert_eq!(
            TableBuilder::new(0, 1, 1).unwrap_err(),
            TableError::ZeroInputWidth
        );
        assert_eq!(
            TableBuilder::new(1, 0, 1).unwrap_err(),
            TableError::ZeroOutputWidth
        );
        assert_eq!(
            TableBuilder::new(1, 1, 0).unwrap_err(),
            TableError::ZeroStates
        );
    }

    #[test]
    fn capacity_overflow_is_detected() {
        let mut builder = TableBuilder::new(1, 1, 1).unwrap();
        builder.record("0", "A", "A", "0").unwrap();
        assert_eq!(
            builder.record("0", "B", "A", "0").unwrap_err(),
            TableError::Capacity {
                name: "B".to_string(),
                declared: 1
            }
        );
    }

    #[test]
    fn incomplete_tables_are_rejected() {
        let mut builder = TableBuilder::new(1, 1, 1).unwrap();
        builder.record("0", "A", "A", "0").unwrap();
        assert_eq!(
            builder.finish().unwrap_err(),
            TableError::MissingCell {
                state: "A".to_string(),
                input: 1
            }
        );

        let builder = TableBuilder::new(1, 1, 2).unwrap();
        assert_eq!(
            builder.finish().unwrap_err(),
            TableError::UnnamedState { index: 0 }
        );
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut builder = TableBuilder::new(1, 1, 1).unwrap();
        assert_eq!(
            builder.record("10", "A", "A", "0").unwrap_err(),
            TableError::InputOutOfRange { value: 2, width: 1 }
        );
        assert_eq!(
            builder.record("0", "A", "A", "11").unwrap_err(),
            TableError::OutputOutOfRange { value: 3, width: 1 }
        );
    }

    #[test]
    fn malformed_bits_propagate() {
        let mut builder = TableBuilder::new(1, 1, 1).unwrap();
        assert_eq!(
            builder.record("x", "A", "A", "0").unwrap_err(),
            TableError::Bits(BitsError::InvalidDigit { found: 'x' })
        );
    }

    #[test]
    fn trace_follows_transitions() {
        let table = three_state_builder().finish().unwrap();
        assert_eq!(table.trace("A", [0, 0, 1]), Some(vec![0, 0, 1]));
        assert_eq!(table.trace("B", [1, 1]), Some(vec![1, 1]));
        assert_eq!(table.trace("D", [0]), None);
        // input outside the 1-bit domain
        assert_eq!(table.trace("A", [2]), None);
    }

    #[test]
    fn show_renders_all_rows() {
        let table = three_state_builder().finish().unwrap();
        let rendered = table.show();
        for name in ["A", "B", "C"] {
            assert!(rendered.contains(name));
        }
    }
}
