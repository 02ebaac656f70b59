//! CSV record reader.

use crate::error::{Error, Result};

#[derive(Clone, Copy, PartialEq)]
enum State {
  /// At the start of a field.
  FieldStart,
  /// Inside an unquoted field.
  Unquoted,
  /// Inside a quoted field.
  Quoted,
  /// Just read a quote inside a quoted field: either the closing quote or
  /// the first half of an escaped `""`.
  QuoteInQuoted,
}

/// Split `input` into records of fields. Blank lines produce no record.
pub(crate) fn records(input: &str) -> Result<Vec<Vec<String>>> {
  let input = input.strip_prefix('\u{feff}').unwrap_or(input);

  let mut records = Vec::new();
  let mut record: Vec<String> = Vec::new();
  let mut field = String::new();
  let mut state = State::FieldStart;

  let mut line = 1usize;
  let mut column = 0usize;
  let mut quote_line = 1usize;

  let mut chars = input.chars().peekable();
  while let Some(c) = chars.next() {
    column += 1;
    match (state, c) {
      (State::Quoted, '"') => state = State::QuoteInQuoted,
      (State::Quoted, c) => {
        if c == '\n' {
          line += 1;
          column = 0;
        }
        field.push(c);
      }
      (State::QuoteInQuoted, '"') => {
        field.push('"');
        state = State::Quoted;
      }

      (State::FieldStart, '"') => {
        state = State::Quoted;
        quote_line = line;
      }
      (State::Unquoted, '"') => return Err(Error::StrayQuote { line, column }),

      (_, ',') => {
        record.push(std::mem::take(&mut field));
        state = State::FieldStart;
      }
      (_, '\r') if chars.peek() == Some(&'\n') => {}
      (_, '\n' | '\r') => {
        end_record(&mut records, &mut record, &mut field, state);
        state = State::FieldStart;
        line += 1;
        column = 0;
      }

      (State::QuoteInQuoted, _) => return Err(Error::StrayQuote { line, column }),
      (_, c) => {
        field.push(c);
        state = State::Unquoted;
      }
    }
  }

  if state == State::Quoted {
    return Err(Error::UnterminatedQuote { line: quote_line });
  }
  end_record(&mut records, &mut record, &mut field, state);
  Ok(records)
}

fn end_record(
  records: &mut Vec<Vec<String>>,
  record: &mut Vec<String>,
  field: &mut String,
  state: State,
) {
  // A line with nothing on it at all is blank, not a record with one empty
  // field. `""` on its own line is a real (empty) field.
  if record.is_empty() && field.is_empty() && state == State::FieldStart {
    return;
  }
  record.push(std::mem::take(field));
  records.push(std::mem::take(record));
}
