//! A character tape with a read/write head.

use crate::types::BLANK_SYMBOL;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A tape of characters.
///
/// Unbounded tapes grow with blanks when the head moves past either end. Bounded tapes
/// keep their content and clamp the head to `[0, len]`, so `head == len` means the whole
/// content has been consumed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tape {
    cells: Vec<char>,
    head: usize,
    blank: char,
    bounded: bool,
}

impl Tape {
    pub fn new(content: &str, bounded: bool) -> Self {
        Self {
            cells: content.chars().collect(),
            head: 0,
            blank: BLANK_SYMBOL,
            bounded,
        }
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn cells(&self) -> &[char] {
        &self.cells
    }

    pub fn content(&self) -> String {
        self.cells.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn is_bounded(&self) -> bool {
        self.bounded
    }

    /// Returns true once the head has moved past the last cell.
    pub fn is_at_end(&self) -> bool {
        self.head >= self.cells.len()
    }

    /// Reads `width` characters starting at the head.
    ///
    /// A bounded tape returns fewer characters near its end; an unbounded tape pads the
    /// read with blanks.
    pub fn read(&self, width: usize) -> String {
        let available = self.cells.iter().skip(self.head).take(width);
        if self.bounded {
            return available.collect();
        }

        let mut symbol: String = available.collect();
        let missing = width.saturating_sub(symbol.chars().count());
        symbol.extend(std::iter::repeat_n(self.blank, missing));
        symbol
    }

    /// Overwrites cells from the head onward with `symbol`, growing the tape if needed.
    pub fn write(&mut self, symbol: &str) {
        for (i, c) in symbol.chars().enumerate() {
            let position = self.head + i;
            if position >= self.cells.len() {
                self.cells.resize(position + 1, self.blank);
            }
            self.cells[position] = c;
        }
    }

    /// Moves the head by `offset` cells.
    pub fn shift(&mut self, offset: isize) {
        if self.bounded {
            let target = self.head as isize + offset;
            self.head = target.clamp(0, self.cells.len() as isize) as usize;
            return;
        }

        if offset < 0 {
            for _ in 0..offset.unsigned_abs() {
                if self.head == 0 {
                    // Extend tape to the left
                    self.cells.insert(0, self.blank);
                } else {
                    self.head -= 1;
                }
            }
        } else {
            self.head += offset as usize;
            self.fill();
        }
    }

    /// Removes up to `count` characters from the front. Used for stacks.
    pub fn pop_front(&mut self, count: usize) {
        let count = count.min(self.cells.len());
        self.cells.drain(..count);
    }

    /// Inserts `symbol` at the front, so its first character becomes the new front.
    pub fn push_front(&mut self, symbol: &str) {
        self.cells.splice(0..0, symbol.chars());
    }

    fn fill(&mut self) {
        if !self.bounded && self.head >= self.cells.len() {
            self.cells.resize(self.head + 1, self.blank);
        }
    }
}

impl fmt::Display for Tape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.cells.iter().enumerate() {
            if i == self.head {
                write!(f, "[{c}]")?;
            } else {
                write!(f, "{c}")?;
            }
        }
        if self.head >= self.cells.len() {
            write!(f, "[]")?;
        }
        Ok(())
    }
}
