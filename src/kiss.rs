//! The KISS-like tag format in which transition tables are exchanged.
//!
//! A file holds a run of tables. The header tag `.t` declares how many tables follow;
//! each table declares its input width, output width and state count before listing one
//! whitespace-separated quadruple per transition and closing with `.e`:
//!
//! ```text
//! .t 1
//!
//! .i 1
//! .o 1
//! .s 3
//! 0 A B 0
//! 1 A C 1
//! 0 B A 0
//! 1 B A 1
//! 0 C A 0
//! 1 C A 1
//! .e
//! ```
//!
//! The grammar is token-based, so any whitespace separates fields and line breaks carry
//! no meaning. Parsing is streaming: [`TableStream`] yields one [`Table`] at a time and
//! recovers from a malformed table by skipping ahead to its `.e` terminator, so a bad
//! table does not take down the tables that follow it. Errors in the run structure
//! itself (a misplaced tag, a zero size parameter, premature end of input) are fatal and
//! fuse the stream.

use std::fmt;
use std::str::SplitWhitespace;

use itertools::Itertools;
use thiserror::Error;
use tracing::{debug, trace};

use crate::bits::encode;
use crate::table::{Table, TableBuilder, TableError};

/// Abstracts the types of errors that can occur when parsing a run of tables.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ParseError {
    /// A structural tag was missing or out of order.
    #[error("expected tag `{expected}`, found `{found}`")]
    ExpectedTag {
        /// The tag that should have appeared.
        expected: &'static str,
        /// The token found instead.
        found: String,
    },
    /// A tag was not followed by an unsigned number.
    #[error("tag `{tag}` is not followed by a number, found `{found}`")]
    InvalidCount {
        /// The tag whose value was malformed.
        tag: &'static str,
        /// The token found instead of a number.
        found: String,
    },
    /// A size parameter that must be positive was declared as zero.
    #[error("tag `{tag}` declares a zero value")]
    ZeroParameter {
        /// The offending tag.
        tag: &'static str,
    },
    /// The input ended in the middle of the run structure.
    #[error("unexpected end of input")]
    UnexpectedEof,
    /// A table body could not be turned into a valid [`Table`].
    #[error("invalid table: {0}")]
    Table(#[from] TableError),
}

impl ParseError {
    /// Whether this error invalidates the whole run rather than a single table. Fatal
    /// errors fuse the [`TableStream`] they occur in; a non-fatal error only loses the
    /// table it occurred in.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ParseError::Table(_))
    }
}

const END_TAG: &str = ".e";

/// Streaming parser for a run of tables. Created from the full source text, it consumes
/// the `.t` header eagerly and then yields one `Result<Table, ParseError>` per declared
/// table. After a fatal error the stream is fused and yields nothing further.
#[derive(Debug, Clone)]
pub struct TableStream<'a> {
    tokens: SplitWhitespace<'a>,
    declared: usize,
    produced: usize,
    fused: bool,
}

impl<'a> TableStream<'a> {
    /// Parses the `.t` header of `src` and returns the stream of tables that follow.
    /// `.t 0` is legal and declares an empty run.
    pub fn new(src: &'a str) -> Result<Self, ParseError> {
        let mut tokens = src.split_whitespace();
        expect_tag(&mut tokens, ".t")?;
        let declared = parse_count(&mut tokens, ".t")?;
        debug!("run declares {declared} tables");
        Ok(Self {
            tokens,
            declared,
            produced: 0,
            fused: false,
        })
    }

    /// The number of tables the `.t` header declares.
    pub fn declared(&self) -> usize {
        self.declared
    }

    fn parse_table(&mut self) -> Result<Table, ParseError> {
        expect_tag(&mut self.tokens, ".i")?;
        let input_bits: u32 = parse_nonzero(&mut self.tokens, ".i")?;
        expect_tag(&mut self.tokens, ".o")?;
        let output_bits: u32 = parse_nonzero(&mut self.tokens, ".o")?;
        expect_tag(&mut self.tokens, ".s")?;
        let state_count: u32 = parse_nonzero(&mut self.tokens, ".s")?;
        trace!("reading table with .i {input_bits} .o {output_bits} .s {state_count}");

        let mut builder = match TableBuilder::new(input_bits, output_bits, state_count as usize) {
            Ok(builder) => builder,
            Err(e) => {
                self.skip_table();
                return Err(e.into());
            }
        };

        loop {
            let token = next_token(&mut self.tokens)?;
            if token == END_TAG {
                break;
            }
            let Some((current, next, output)) = self.tokens.next_tuple() else {
                return Err(ParseError::UnexpectedEof);
            };
            if let Err(e) = builder.record(token, current, next, output) {
                self.skip_table();
                return Err(e.into());
            }
        }

        Ok(builder.finish()?)
    }

    /// Discards tokens up to and including the current table's `.e` terminator.
    fn skip_table(&mut self) {
        debug!("skipping remainder of malformed table");
        for token in self.tokens.by_ref() {
            if token == END_TAG {
                return;
            }
        }
    }
}

impl Iterator for TableStream<'_> {
    type Item = Result<Table, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fused || self.produced == self.declared {
            return None;
        }
        self.produced += 1;
        match self.parse_table() {
            Ok(table) => Some(Ok(table)),
            Err(e) => {
                if e.is_fatal() {
                    self.fused = true;
                }
                Some(Err(e))
            }
        }
    }
}

fn next_token<'t>(tokens: &mut SplitWhitespace<'t>) -> Result<&'t str, ParseError> {
    tokens.next().ok_or(ParseError::UnexpectedEof)
}

fn expect_tag(tokens: &mut SplitWhitespace<'_>, tag: &'static str) -> Result<(), ParseError> {
    let found = next_token(tokens)?;
    if found == tag {
        Ok(())
    } else {
        Err(ParseError::ExpectedTag {
            expected: tag,
            found: found.to_string(),
        })
    }
}

fn parse_count<T: std::str::FromStr>(
    tokens: &mut SplitWhitespace<'_>,
    tag: &'static str,
) -> Result<T, ParseError> {
    let token = next_token(tokens)?;
    token.parse().map_err(|_| ParseError::InvalidCount {
        tag,
        found: token.to_string(),
    })
}

fn parse_nonzero(tokens: &mut SplitWhitespace<'_>, tag: &'static str) -> Result<u32, ParseError> {
    match parse_count(tokens, tag)? {
        0 => Err(ParseError::ZeroParameter { tag }),
        value => Ok(value),
    }
}

/// Writes the `.t` run header followed by the separating blank line.
pub fn write_header<W: fmt::Write>(w: &mut W, tables: usize) -> fmt::Result {
    writeln!(w, ".t {tables}")?;
    writeln!(w)
}

impl Table {
    /// Serializes the table in the exchange format, mirroring the input grammar. The
    /// `.s` line carries the live-state count, and one row is emitted per live state and
    /// input value, in input-value order, with input and output re-encoded as
    /// fixed-width bit-strings. Tombstoned states are not emitted.
    pub fn write_kiss<W: fmt::Write>(&self, w: &mut W) -> fmt::Result {
        writeln!(w, ".i {}", self.input_bits())?;
        writeln!(w, ".o {}", self.output_bits())?;
        writeln!(w, ".s {}", self.live_count())?;
        for (_, state) in self.live_states() {
            for (value, cell) in state.cells().iter().enumerate() {
                writeln!(
                    w,
                    "{} {} {} {}",
                    encode(value as u64, self.input_bits()),
                    state.name(),
                    cell.next,
                    encode(cell.output, self.output_bits())
                )?;
            }
        }
        writeln!(w, "{END_TAG}")
    }

    /// Serializes the table into a fresh string, see [`Self::write_kiss`].
    pub fn to_kiss(&self) -> String {
        let mut w = String::new();
        self.write_kiss(&mut w).unwrap();
        w
    }
}
