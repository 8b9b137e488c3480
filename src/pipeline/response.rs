//! Parsing of the vision collaborator's insertion response.
//!
//! The collaborator is asked for a bare JSON array but in practice wraps it
//! in a ```` ```json ```` fence, an `{"insertions": [...]}` object or a
//! sentence of prose. Parsing never fails: an unreadable response yields no
//! instructions and a warning, and an unreadable element is dropped on its
//! own while its siblings are kept.

use crate::instruction::InsertionInstruction;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

/// Keys under which an object-shaped response may hold the array.
const ARRAY_KEYS: [&str; 2] = ["insertions", "instructions"];

/// Instructions recovered from one response, plus what was wrong with it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedInstructions {
    pub instructions: Vec<InsertionInstruction>,
    pub warnings: Vec<String>,
}

impl ParsedInstructions {
    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Parse a raw collaborator response into normalised instructions.
pub fn parse_instructions(raw: &str) -> ParsedInstructions {
    let mut parsed = ParsedInstructions::default();

    let Some(value) = parse_payload(raw.trim(), &mut parsed) else {
        return parsed;
    };

    let elements = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            match ARRAY_KEYS
                .iter()
                .find_map(|k| map.remove(*k).filter(Value::is_array))
            {
                Some(Value::Array(items)) => items,
                _ => {
                    parsed.warn("response object holds no instruction array".to_string());
                    return parsed;
                }
            }
        }
        other => {
            parsed.warn(format!(
                "response is JSON but not an instruction array: {}",
                type_name(&other)
            ));
            return parsed;
        }
    };

    for (n, element) in elements.into_iter().enumerate() {
        match serde_json::from_value::<InsertionInstruction>(element) {
            Ok(ins) => parsed.instructions.push(ins.normalized()),
            Err(e) => parsed.warn(format!("dropping instruction #{}: {}", n + 1, e)),
        }
    }

    debug!(
        "Parsed {} instruction(s), {} warning(s)",
        parsed.instructions.len(),
        parsed.warnings.len()
    );
    parsed
}

// ── Step 1: Strip a surrounding code fence ───────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?[ \t]*\n(.*)\n```\s*$").unwrap());

/// Body of a fence wrapping the whole (trimmed) response.
fn strip_outer_fence(trimmed: &str) -> Option<&str> {
    RE_OUTER_FENCE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

// ── Step 2: Parse, falling back to the fence body, then the outermost array ──

fn parse_payload(trimmed: &str, parsed: &mut ParsedInstructions) -> Option<Value> {
    let err = match serde_json::from_str::<Value>(trimmed) {
        Ok(v) => return Some(v),
        Err(e) => e,
    };

    if let Some(body) = strip_outer_fence(trimmed) {
        if let Ok(v) = serde_json::from_str::<Value>(body) {
            debug!("Parsed instructions from fenced response");
            return Some(v);
        }
    }

    if let (Some(open), Some(close)) = (trimmed.find('['), trimmed.rfind(']')) {
        if open < close {
            if let Ok(v) = serde_json::from_str::<Value>(&trimmed[open..=close]) {
                debug!("Recovered instruction array from surrounding prose");
                return Some(v);
            }
        }
    }

    parsed.warn(format!("could not parse collaborator response as JSON: {err}"));
    None
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{ImageType, InsertOperation};

    #[test]
    fn bare_array() {
        let raw = r#"[{"image_index": 1, "anchor_text": "Fig. 1", "operation": "insert_after"}]"#;
        let p = parse_instructions(raw);
        assert!(p.warnings.is_empty());
        assert_eq!(p.instructions.len(), 1);
        let ins = &p.instructions[0];
        assert_eq!(ins.image_type, ImageType::Image);
        assert_eq!(ins.description, "图片1");
        assert_eq!(ins.reason, "");
        assert_eq!(ins.bbox, None);
    }

    #[test]
    fn fenced_array_with_prose() {
        let raw = "Here are the placements:\n```json\n[\n  {\"image_index\": 2, \"anchor_text\": \"Table 3\", \
                   \"operation\": \"replace\", \"bbox\": [0, 10, 100, 60], \"image_type\": \"table\"}\n]\n```\nDone.";
        let p = parse_instructions(raw);
        assert!(p.warnings.is_empty(), "{:?}", p.warnings);
        let ins = &p.instructions[0];
        assert_eq!(ins.operation, InsertOperation::InsertAfter);
        assert_eq!(ins.image_type, ImageType::Table);
        assert_eq!(ins.bbox.map(|b| b.center_y()), Some(35.0));
    }

    #[test]
    fn object_wrapper() {
        let raw = r#"{"insertions": [{"image_index": 1, "anchor_text": "a", "operation": "insert_before"}]}"#;
        let p = parse_instructions(raw);
        assert_eq!(p.instructions.len(), 1);

        let raw = r#"{"instructions": []}"#;
        let p = parse_instructions(raw);
        assert!(p.instructions.is_empty());
        assert!(p.warnings.is_empty());
    }

    #[test]
    fn array_embedded_in_prose() {
        let raw = r#"Sure! [{"image_index": 3, "anchor_text": "x", "operation": "insert_after"}] hope this helps"#;
        let p = parse_instructions(raw);
        assert_eq!(p.instructions.len(), 1);
        assert_eq!(p.instructions[0].image_index, 3);
    }

    #[test]
    fn bad_element_is_dropped_alone() {
        let raw = r#"[
            {"image_index": 1, "anchor_text": "ok", "operation": "insert_after"},
            {"image_index": 2, "operation": "insert_after"},
            {"image_index": "three", "anchor_text": "x", "operation": "insert_after"},
            {"image_index": 4, "anchor_text": "ok", "operation": "explode"}
        ]"#;
        let p = parse_instructions(raw);
        assert_eq!(p.instructions.len(), 1);
        assert_eq!(p.warnings.len(), 3);
        assert!(p.warnings[0].contains("#2"));
    }

    #[test]
    fn garbage_yields_empty_list_and_warning() {
        let p = parse_instructions("I could not find any images on this page.");
        assert!(p.instructions.is_empty());
        assert_eq!(p.warnings.len(), 1);
    }

    #[test]
    fn object_without_array_warns() {
        let p = parse_instructions(r#"{"result": "none"}"#);
        assert!(p.instructions.is_empty());
        assert!(p.warnings[0].contains("no instruction array"));
    }

    #[test]
    fn fences_inside_anchor_text_are_kept() {
        let raw = r#"[{"image_index":1,"anchor_text":"```python","operation":"insert_after"},{"image_index":2,"anchor_text":"print(1)\n```","operation":"insert_before"}]"#;
        let p = parse_instructions(raw);
        assert!(p.warnings.is_empty(), "{:?}", p.warnings);
        assert_eq!(p.instructions.len(), 2);
        assert_eq!(p.instructions[0].anchor_text, "```python");
        assert_eq!(p.instructions[1].anchor_text, "print(1)\n```");
    }

    #[test]
    fn fenced_response_with_fenced_anchor() {
        let raw = "```json\n[{\"image_index\": 1, \"anchor_text\": \"```rust\", \"operation\": \"insert_after\"}]\n```\n";
        let p = parse_instructions(raw);
        assert!(p.warnings.is_empty(), "{:?}", p.warnings);
        assert_eq!(p.instructions.len(), 1);
        assert_eq!(p.instructions[0].anchor_text, "```rust");
    }

    #[test]
    fn null_optional_fields_take_defaults() {
        let raw = r#"[{"image_index":1,"anchor_text":"Fig 1","operation":"insert_after","description":null,"reason":null,"image_type":null,"bbox":null}]"#;
        let p = parse_instructions(raw);
        assert!(p.warnings.is_empty(), "{:?}", p.warnings);
        let ins = &p.instructions[0];
        assert_eq!(ins.image_type, ImageType::Image);
        assert_eq!(ins.description, "图片1");
        assert_eq!(ins.reason, "");
        assert_eq!(ins.bbox, None);
    }
}
