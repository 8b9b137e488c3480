//! Image insertion instructions produced by the vision collaborator.
//!
//! An [`InsertionInstruction`] says "put image *n* before/after this piece of
//! the page's own text". Instructions arrive as JSON (see
//! [`crate::pipeline::response`]) and are validated, but never rejected:
//! a dubious instruction is still matched and the problem is reported.

use crate::error::InstructionIssue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum anchor length (in characters) the collaborator is asked to produce.
pub const MAX_ANCHOR_CHARS: usize = 200;

/// Bounding box of a detected image region, in rendered-page pixels.
///
/// Serialised as the `[x1, y1, x2, y2]` array the collaborator emits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Vertical centre of the box.
    pub fn center_y(&self) -> f64 {
        (self.y1 + self.y2) / 2.0
    }

    pub fn is_valid(&self) -> bool {
        self.x2 > self.x1 && self.y2 > self.y1
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([x1, y1, x2, y2]: [f64; 4]) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// What kind of visual the image region holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageType {
    Chart,
    Table,
    Formula,
    Diagram,
    ImageText,
    /// Generic picture; used when the collaborator omits the type.
    #[default]
    Image,
    #[serde(other)]
    Other,
}

/// Where the image reference goes relative to the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertOperation {
    InsertBefore,
    InsertAfter,
    /// Legacy value from older prompts. Accepted on input and normalised to
    /// [`InsertOperation::InsertAfter`]: the anchor text is never replaced.
    Replace,
}

impl InsertOperation {
    /// Map legacy operations onto the supported ones.
    pub fn normalized(self) -> Self {
        match self {
            InsertOperation::Replace => InsertOperation::InsertAfter,
            op => op,
        }
    }
}

impl fmt::Display for InsertOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InsertOperation::InsertBefore => "insert_before",
            InsertOperation::InsertAfter => "insert_after",
            InsertOperation::Replace => "replace",
        })
    }
}

/// One image placement request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertionInstruction {
    /// 1-based index of the image region on the page.
    pub image_index: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub image_type: ImageType,
    /// Alt text for the reference; defaults to `图片{index}` when empty.
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    /// Verbatim excerpt of the page Markdown the image belongs next to.
    pub anchor_text: String,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    pub operation: InsertOperation,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reason: String,
}

/// Treat an explicit `null` like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl InsertionInstruction {
    /// Instruction with defaults for every optional field.
    pub fn new(image_index: i64, anchor_text: impl Into<String>, operation: InsertOperation) -> Self {
        Self {
            image_index,
            image_type: ImageType::default(),
            description: default_description(image_index),
            anchor_text: anchor_text.into(),
            bbox: None,
            operation,
            reason: String::new(),
        }
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_image_type(mut self, image_type: ImageType) -> Self {
        self.image_type = image_type;
        self
    }

    /// Fill defaults the collaborator left empty and map legacy operations.
    pub fn normalized(mut self) -> Self {
        if self.description.trim().is_empty() {
            self.description = default_description(self.image_index);
        }
        self.operation = self.operation.normalized();
        self
    }

    /// Collect every contract violation; an empty vector means valid.
    pub fn validate(&self) -> Vec<InstructionIssue> {
        let mut issues = Vec::new();
        if self.image_index <= 0 {
            issues.push(InstructionIssue::NonPositiveIndex {
                image_index: self.image_index,
            });
        }
        if self.anchor_text.trim().is_empty() {
            issues.push(InstructionIssue::EmptyAnchor {
                image_index: self.image_index,
            });
        }
        let len = self.anchor_text.chars().count();
        if len > MAX_ANCHOR_CHARS {
            issues.push(InstructionIssue::AnchorTooLong {
                image_index: self.image_index,
                len,
                max: MAX_ANCHOR_CHARS,
            });
        }
        if let Some(b) = self.bbox {
            if !b.is_valid() {
                issues.push(InstructionIssue::InvalidBbox {
                    image_index: self.image_index,
                    x1: b.x1,
                    y1: b.y1,
                    x2: b.x2,
                    y2: b.y2,
                });
            }
        }
        issues
    }
}

pub(crate) fn default_description(image_index: i64) -> String {
    format!("图片{image_index}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_serialises_as_array() {
        let b = BoundingBox::new(1.0, 2.0, 30.0, 40.0);
        assert_eq!(serde_json::to_string(&b).unwrap(), "[1.0,2.0,30.0,40.0]");
        let back: BoundingBox = serde_json::from_str("[1, 2, 30, 40]").unwrap();
        assert_eq!(back, b);
        assert_eq!(b.center_y(), 21.0);
    }

    #[test]
    fn replace_normalises_to_insert_after() {
        let ins = InsertionInstruction::new(1, "anchor", InsertOperation::Replace).normalized();
        assert_eq!(ins.operation, InsertOperation::InsertAfter);
    }

    #[test]
    fn unknown_image_type_maps_to_other() {
        let t: ImageType = serde_json::from_str("\"photo\"").unwrap();
        assert_eq!(t, ImageType::Other);
        let t: ImageType = serde_json::from_str("\"image_text\"").unwrap();
        assert_eq!(t, ImageType::ImageText);
    }

    #[test]
    fn empty_description_gets_default() {
        let ins = InsertionInstruction::new(4, "x", InsertOperation::InsertBefore)
            .with_description("  ")
            .normalized();
        assert_eq!(ins.description, "图片4");
    }

    #[test]
    fn validate_reports_every_issue() {
        let ins = InsertionInstruction::new(0, "   ", InsertOperation::InsertAfter)
            .with_bbox(BoundingBox::new(10.0, 10.0, 5.0, 5.0));
        let issues = ins.validate();
        assert_eq!(issues.len(), 3);
        assert!(matches!(issues[0], InstructionIssue::NonPositiveIndex { .. }));
        assert!(matches!(issues[1], InstructionIssue::EmptyAnchor { .. }));
        assert!(matches!(issues[2], InstructionIssue::InvalidBbox { .. }));
    }

    #[test]
    fn anchor_length_counts_chars_not_bytes() {
        let anchor = "图".repeat(MAX_ANCHOR_CHARS);
        let ins = InsertionInstruction::new(1, anchor, InsertOperation::InsertAfter);
        assert!(ins.validate().is_empty());

        let anchor = "图".repeat(MAX_ANCHOR_CHARS + 1);
        let ins = InsertionInstruction::new(1, anchor, InsertOperation::InsertAfter);
        assert!(matches!(
            ins.validate()[0],
            InstructionIssue::AnchorTooLong { len: 201, .. }
        ));
    }
}
