//! PostgreSQL one-dimensional array literals (`{a,b,"c d"}`).

use crate::error::{Result, SchemaError};

/// Element separator for every supported element type.
pub const ARRAY_DELIMITER: char = ',';

/// Join already-encoded elements into an array literal.
pub fn format_array<S: AsRef<str>>(items: &[S]) -> String {
    let mut out = String::from("{");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(ARRAY_DELIMITER);
        }
        push_element(&mut out, item.as_ref());
    }
    out.push('}');
    out
}

fn push_element(out: &mut String, item: &str) {
    if !needs_quotes(item) {
        out.push_str(item);
        return;
    }
    out.push('"');
    for c in item.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

fn needs_quotes(item: &str) -> bool {
    item.is_empty()
        || item.eq_ignore_ascii_case("NULL")
        || item
            .chars()
            .any(|c| matches!(c, '{' | '}' | '"' | '\\') || c == ARRAY_DELIMITER || c.is_whitespace())
}

/// Whitespace the engine skips around array elements. Other Unicode
/// spaces are element content.
fn is_array_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c')
}

/// Split an array literal into its unescaped element texts.
///
/// Only one-dimensional arrays are accepted. Unquoted `NULL` elements are
/// rejected since no slice kind can hold a null element.
pub fn parse_array(text: &str) -> Result<Vec<String>> {
    let body = text
        .trim_matches(is_array_space)
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(|| SchemaError::decode(0, format!("not an array literal: {:?}", text)))?;

    let mut items = Vec::new();
    if body.trim_matches(is_array_space).is_empty() {
        return Ok(items);
    }

    let mut chars = body.chars().peekable();
    loop {
        let position = items.len();
        while chars.peek().is_some_and(|&c| is_array_space(c)) {
            chars.next();
        }

        let mut item = String::new();
        match chars.peek() {
            Some('"') => {
                chars.next();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => match chars.next() {
                            Some(escaped) => item.push(escaped),
                            None => break,
                        },
                        '"' => {
                            closed = true;
                            break;
                        }
                        other => item.push(other),
                    }
                }
                if !closed {
                    return Err(SchemaError::decode(position, "unterminated quoted element"));
                }
                while chars.peek().is_some_and(|&c| is_array_space(c)) {
                    chars.next();
                }
            }
            Some('{') => {
                return Err(SchemaError::decode(
                    position,
                    "multi-dimensional arrays are not supported",
                ));
            }
            _ => {
                let mut raw = String::new();
                while let Some(&c) = chars.peek() {
                    if c == ARRAY_DELIMITER {
                        break;
                    }
                    chars.next();
                    match c {
                        '\\' => match chars.next() {
                            Some(escaped) => item.push(escaped),
                            None => {
                                return Err(SchemaError::decode(position, "dangling escape"));
                            }
                        },
                        '"' | '{' | '}' => {
                            return Err(SchemaError::decode(
                                position,
                                format!("unexpected {:?} in unquoted element", c),
                            ));
                        }
                        other => item.push(other),
                    }
                    raw.push(c);
                }
                let trimmed = item.trim_end_matches(is_array_space).len();
                item.truncate(trimmed);
                if item.is_empty() {
                    return Err(SchemaError::decode(position, "empty unquoted element"));
                }
                if raw.trim_end_matches(is_array_space).eq_ignore_ascii_case("NULL") {
                    return Err(SchemaError::decode(
                        position,
                        "null array elements are not supported",
                    ));
                }
            }
        }

        items.push(item);
        match chars.next() {
            None => break,
            Some(c) if c == ARRAY_DELIMITER => continue,
            Some(c) => {
                return Err(SchemaError::decode(
                    position,
                    format!("expected {:?} after element, found {:?}", ARRAY_DELIMITER, c),
                ));
            }
        }
    }

    Ok(items)
}
