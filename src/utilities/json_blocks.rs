//! Locating JSON payloads embedded in free-form model output.
//!
//! Model and planner text often wraps structured data in prose or markdown
//! fences. These helpers find syntactically valid JSON arrays of objects
//! without any knowledge of the surrounding natural language.

use serde_json::{Deserializer, Value};

/// A JSON array of objects found inside a larger text.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonBlock {
    /// Byte offset of the opening `[`.
    pub start: usize,
    /// Byte offset one past the closing `]`.
    pub end: usize,
    /// The parsed array.
    pub value: Value,
}

impl JsonBlock {
    /// The array elements.
    pub fn items(&self) -> &[Value] {
        self.value.as_array().map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Find every non-empty JSON array whose elements are all objects.
///
/// Scanning resumes after the end of each accepted block, so arrays nested
/// inside an accepted block are not reported separately. A bracketed span
/// that is not valid JSON is skipped as a whole: nothing nested inside a
/// broken payload is reported.
pub fn find_object_arrays(text: &str) -> Vec<JsonBlock> {
    let mut blocks = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find('[') {
        let start = cursor + offset;
        match parse_array_at(text, start) {
            Some((value, end)) if is_object_array(&value) => {
                blocks.push(JsonBlock { start, end, value });
                cursor = end;
            }
            Some(_) => cursor = start + 1,
            None => match bracket_span_end(text, start) {
                Some(end) => cursor = end,
                // Unclosed bracket: the rest of the text belongs to it.
                None => break,
            },
        }
    }

    blocks
}

/// Return the body of the single fenced code block in `text`, if there is
/// exactly one. Both ```` ```json ```` and bare ```` ``` ```` fences count.
pub fn single_fenced_block(text: &str) -> Option<&str> {
    let mut fences = text.match_indices("```").map(|(i, _)| i);
    let open = fences.next()?;
    let close = fences.next()?;
    if fences.next().is_some() {
        return None;
    }

    let after_open = &text[open + 3..close];
    // Skip the language tag on the opening fence line.
    let body = match after_open.find('\n') {
        Some(nl) => &after_open[nl + 1..],
        None => after_open,
    };
    Some(body.trim())
}

fn parse_array_at(text: &str, start: usize) -> Option<(Value, usize)> {
    let mut stream = Deserializer::from_str(&text[start..]).into_iter::<Value>();
    match stream.next() {
        Some(Ok(value)) if value.is_array() => Some((value, start + stream.byte_offset())),
        _ => None,
    }
}

/// End offset (one past the matching `]`) of the bracket opened at `start`.
/// Brackets inside JSON string literals are not counted.
fn bracket_span_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in text.bytes().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn is_object_array(value: &Value) -> bool {
    match value.as_array() {
        Some(items) => !items.is_empty() && items.iter().all(Value::is_object),
        None => false,
    }
}
