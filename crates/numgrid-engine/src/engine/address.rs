//! Cell addresses and rectangular ranges.
//!
//! Provides bidirectional conversion between spreadsheet-style references
//! (e.g. "A1", "B2", "AA100") and zero-indexed row/column coordinates, plus
//! the normalized [`Range`] used for formula domains and range inputs.
//!
//! # Examples
//!
//! ```
//! use numgrid_engine::engine::Address;
//!
//! let cell = Address::parse("B3").unwrap();
//! assert_eq!(cell.col, 1); // 0-indexed
//! assert_eq!(cell.row, 2);
//! assert_eq!(cell.to_string(), "B3");
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// A cell position (0-indexed). Ordering is row-major.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Address {
    pub row: usize,
    pub col: usize,
}

impl Address {
    pub fn new(row: usize, col: usize) -> Address {
        Address { row, col }
    }

    /// Parse an address from spreadsheet notation (e.g. "A1", "B2", "AA10").
    /// Returns None if the input is invalid.
    pub fn parse(name: &str) -> Option<Address> {
        let caps = a1_re().captures(name.trim())?;
        let col = column_index(&caps["letters"])?;
        let row = caps["numbers"].parse::<usize>().ok()?.checked_sub(1)?;
        Some(Address::new(row, col))
    }

    /// Shift by a signed offset. Returns None when the result would be negative.
    pub fn offset(&self, d_row: isize, d_col: isize) -> Option<Address> {
        Some(Address::new(
            self.row.checked_add_signed(d_row)?,
            self.col.checked_add_signed(d_col)?,
        ))
    }

    /// The `(row, column)` pair used at the persistence boundary.
    pub fn to_pair(self) -> (usize, usize) {
        (self.row, self.col)
    }

    pub fn from_pair((row, col): (usize, usize)) -> Address {
        Address::new(row, col)
    }
}

fn a1_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?<letters>[A-Za-z]+)(?<numbers>[0-9]+)$")
            .expect("address regex must compile")
    })
}

/// Convert a column index to its bijective base-26 label
/// (0 -> A, 25 -> Z, 26 -> AA, 701 -> ZZ, 702 -> AAA).
pub fn column_label(col: usize) -> String {
    let mut result = Vec::new();
    let mut n = col as u128 + 1;
    while n > 0 {
        n -= 1;
        result.push(b'A' + (n % 26) as u8);
        n /= 26;
    }
    result.reverse();
    String::from_utf8(result).unwrap_or_default()
}

/// Inverse of [`column_label`]. Case-insensitive; returns None on overflow or
/// on any non-letter.
pub fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut acc = 0usize;
    for c in letters.bytes() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() - b'A') as usize + 1;
        acc = acc.checked_mul(26)?.checked_add(digit)?;
    }
    acc.checked_sub(1)
}

impl std::str::FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s).ok_or_else(|| format!("Invalid cell reference: {}", s))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_label(self.col), self.row as u128 + 1)
    }
}

/// A rectangle of cells with `top_left <= bottom_right` componentwise.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Range {
    pub top_left: Address,
    pub bottom_right: Address,
}

impl Range {
    /// Build a range from any two corners.
    pub fn new(a: Address, b: Address) -> Range {
        Range {
            top_left: Address::new(a.row.min(b.row), a.col.min(b.col)),
            bottom_right: Address::new(a.row.max(b.row), a.col.max(b.col)),
        }
    }

    pub fn single(address: Address) -> Range {
        Range::new(address, address)
    }

    /// A range anchored at `top_left` spanning `rows` x `columns` cells.
    /// Zero dimensions are treated as one. None if the far corner overflows.
    pub fn with_shape(top_left: Address, rows: usize, columns: usize) -> Option<Range> {
        let bottom_right = Address::new(
            top_left.row.checked_add(rows.max(1) - 1)?,
            top_left.col.checked_add(columns.max(1) - 1)?,
        );
        Some(Range { top_left, bottom_right })
    }

    /// Parse "A1:B5" or the bracketed form "[A1:B5]".
    pub fn parse(text: &str) -> Option<Range> {
        let text = text.trim();
        let text = text
            .strip_prefix('[')
            .and_then(|t| t.strip_suffix(']'))
            .unwrap_or(text);
        let (start, end) = text.split_once(':')?;
        Some(Range::new(Address::parse(start)?, Address::parse(end)?))
    }

    pub fn rows(&self) -> usize {
        (self.bottom_right.row - self.top_left.row).saturating_add(1)
    }

    pub fn columns(&self) -> usize {
        (self.bottom_right.col - self.top_left.col).saturating_add(1)
    }

    /// Number of cells, or None when it does not fit in `usize`.
    pub fn cell_count(&self) -> Option<usize> {
        self.rows().checked_mul(self.columns())
    }

    pub fn contains(&self, address: &Address) -> bool {
        (self.top_left.row..=self.bottom_right.row).contains(&address.row)
            && (self.top_left.col..=self.bottom_right.col).contains(&address.col)
    }

    pub fn intersects(&self, other: &Range) -> bool {
        self.top_left.row <= other.bottom_right.row
            && other.top_left.row <= self.bottom_right.row
            && self.top_left.col <= other.bottom_right.col
            && other.top_left.col <= self.bottom_right.col
    }

    /// Translate both corners. Returns None if any coordinate would go negative.
    pub fn translate(&self, d_row: isize, d_col: isize) -> Option<Range> {
        Some(Range {
            top_left: self.top_left.offset(d_row, d_col)?,
            bottom_right: self.bottom_right.offset(d_row, d_col)?,
        })
    }

    /// Row-major iterator over every address in the range.
    pub fn cells(&self) -> impl Iterator<Item = Address> + use<> {
        let Range { top_left, bottom_right } = *self;
        (top_left.row..=bottom_right.row).flat_map(move |row| {
            (top_left.col..=bottom_right.col).map(move |col| Address::new(row, col))
        })
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.top_left, self.bottom_right)
    }
}

/// Expand the rectangle spanned by two corners into row-major order.
pub fn expand_range(top_left: Address, bottom_right: Address) -> Vec<Address> {
    Range::new(top_left, bottom_right).cells().collect()
}
