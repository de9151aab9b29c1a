//! Edit commands replayed against a document.
//!
//! One command per line:
//!
//! ```text
//! A1 2
//! B1 =A1*10
//! erase A1
//! move A1:B2 1 0
//! copy B1 0 1
//! undo
//! redo
//! print B1
//! formula B1
//! recalc
//! dump
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use numgrid_core::{Address, Document, Range};
use std::io::Write;

use crate::error::{CommandError, Result};

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Set { address: Address, input: String },
    Erase(Address),
    Move { source: Range, d_row: isize, d_col: isize, copy: bool },
    Undo,
    Redo,
    Print(Address),
    Formula(Address),
    Recalc,
    Dump,
}

fn parse_error(line: usize, message: impl Into<String>) -> CommandError {
    CommandError::Parse {
        line,
        message: message.into(),
    }
}

fn parse_address(token: Option<&str>, line: usize) -> Result<Address> {
    let token = token.ok_or_else(|| parse_error(line, "missing cell address"))?;
    Address::parse(token)
        .ok_or_else(|| parse_error(line, format!("invalid cell address: {}", token)))
}

fn parse_range(token: Option<&str>, line: usize) -> Result<Range> {
    let token = token.ok_or_else(|| parse_error(line, "missing range"))?;
    Range::parse(token)
        .or_else(|| Address::parse(token).map(Range::single))
        .ok_or_else(|| parse_error(line, format!("invalid range: {}", token)))
}

fn parse_offset(token: Option<&str>, line: usize) -> Result<isize> {
    let token = token.ok_or_else(|| parse_error(line, "missing offset"))?;
    token
        .parse()
        .map_err(|_| parse_error(line, format!("invalid offset: {}", token)))
}

/// Parse one line. `Ok(None)` for blank lines and comments.
pub fn parse_command(text: &str, line: usize) -> Result<Option<Command>> {
    let text = text.trim();
    if text.is_empty() || text.starts_with('#') {
        return Ok(None);
    }
    let (head, rest) = match text.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (text, ""),
    };
    let mut args = rest.split_whitespace();

    let command = match head {
        "erase" => Command::Erase(parse_address(args.next(), line)?),
        "move" | "copy" => Command::Move {
            source: parse_range(args.next(), line)?,
            d_row: parse_offset(args.next(), line)?,
            d_col: parse_offset(args.next(), line)?,
            copy: head == "copy",
        },
        "undo" => Command::Undo,
        "redo" => Command::Redo,
        "print" => Command::Print(parse_address(args.next(), line)?),
        "formula" => Command::Formula(parse_address(args.next(), line)?),
        "recalc" => Command::Recalc,
        "dump" => Command::Dump,
        cell => Command::Set {
            address: parse_address(Some(cell), line)?,
            input: rest.to_string(),
        },
    };
    Ok(Some(command))
}

/// Apply a command, writing any output to `out`.
pub fn execute(doc: &mut Document, command: &Command, out: &mut impl Write) -> anyhow::Result<()> {
    match command {
        Command::Set { address, input } => doc.set_cell_from_input(*address, input)?,
        Command::Erase(address) => doc.erase_cell(*address)?,
        Command::Move {
            source,
            d_row,
            d_col,
            copy,
        } => {
            let report = doc.move_region(*source, *d_row, *d_col, *copy)?;
            for old in &report.demoted {
                log::info!("formula from {} landed as a plain value", old);
            }
        }
        Command::Undo => doc.undo()?,
        Command::Redo => doc.redo()?,
        Command::Print(address) => writeln!(out, "{}", doc.display(address))?,
        Command::Formula(address) => {
            writeln!(out, "{}", doc.formula_text(address).unwrap_or_default())?
        }
        Command::Recalc => {
            let report = doc.recalculate_all();
            log::info!("recalculated {} formula(s)", report.order.len());
        }
        Command::Dump => {
            for (address, _) in doc.values() {
                match doc.formula_text(&address) {
                    Some(text) => {
                        writeln!(out, "{}\t{}\t{}", address, doc.display(&address), text)?
                    }
                    None => writeln!(out, "{}\t{}", address, doc.display(&address))?,
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set_keeps_input_verbatim() {
        let cmd = parse_command("B1 =A1 + A2", 1).unwrap();
        assert_eq!(
            cmd,
            Some(Command::Set {
                address: Address::new(0, 1),
                input: "=A1 + A2".into()
            })
        );
    }

    #[test]
    fn test_parse_move_single_cell() {
        let cmd = parse_command("copy C3 -1 2", 1).unwrap();
        assert_eq!(
            cmd,
            Some(Command::Move {
                source: Range::single(Address::new(2, 2)),
                d_row: -1,
                d_col: 2,
                copy: true
            })
        );
    }

    #[test]
    fn test_parse_skips_comments() {
        assert_eq!(parse_command("   # note", 3).unwrap(), None);
        assert_eq!(parse_command("", 4).unwrap(), None);
    }

    #[test]
    fn test_parse_errors_carry_line() {
        let err = parse_command("move A1:B2 x 0", 7).unwrap_err();
        assert!(err.to_string().contains("line 7"));
        assert!(parse_command("hello world", 1).is_err());
    }

    #[test]
    fn test_execute_print_and_dump() {
        let mut doc = Document::new();
        let mut out = Vec::new();
        for line in ["A1 2", "B1 =A1*3", "print B1", "dump"] {
            let cmd = parse_command(line, 1).unwrap().unwrap();
            execute(&mut doc, &cmd, &mut out).unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "6\nA1\t2\nB1\t6\t=A1*3\n");
    }
}
