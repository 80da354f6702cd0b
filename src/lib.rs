//! Library for reducing finite-state-machine transition tables.
//!
//! A [`table::Table`] is a completely specified, Mealy-style transition table: a finite
//! collection of named states, where each state owns one [`table::Cell`] per input value.
//! Input and output symbols are fixed-width bit-strings, so a table with input width $i$
//! has exactly $2^i$ cells per state, indexed by the numeric value of the input.
//!
//! Tables are built incrementally through a [`table::TableBuilder`], which consumes the
//! `(input, current state, next state, output)` quadruples of a table specification and
//! enforces that the result is completely specified. A frozen table can then be minimized
//! in place: [`table::Table::minimize`] repeatedly merges pairs of states that emit the
//! same output and name the same successor for every input, redirecting all transitions
//! into the removed state, until no such pair remains. Since every merge immediately
//! rewrites all forward references and restarts the scan, the iteration converges to the
//! same fixed point that partition refinement would reach, and the observable input/output
//! behavior of the machine is unchanged.
//!
//! The [`kiss`] module implements the textual exchange format the tables travel in, a
//! KISS-like tag grammar (`.t`, `.i`, `.o`, `.s`, `.e`). Parsing is streaming: a
//! [`kiss::TableStream`] yields one table at a time, so a malformed table can be skipped
//! without giving up on the remainder of the run.
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// The prelude re-exports the types needed for working with this crate. Importing
/// everything, i.e. `use fsmred::prelude::*;` should be enough to use the package.
pub mod prelude {
    pub use super::{
        bits::{decode, encode, BitsError},
        kiss::{ParseError, TableStream},
        table::{Cell, State, Table, TableBuilder, TableError},
        Map, Set,
    };
}

/// Conversion between fixed-width bit-strings and unsigned integers.
pub mod bits;

/// The in-memory model of a transition table and the builder that constructs it.
pub mod table;

/// Contains the implementation of the state minimization algorithm.
pub mod minimization;

/// Parsing and serialization of the KISS-like tag format for table files.
pub mod kiss;

/// Type alias for sets, we use this to hide which type of `HashSet` we are actually using.
pub type Set<S> = fxhash::FxHashSet<S>;
/// Type alias for maps, we use this to hide which type of `HashMap` we are actually using.
pub type Map<K, V> = fxhash::FxHashMap<K, V>;
