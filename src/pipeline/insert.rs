//! Image insertion: weave image references into the page Markdown.
//!
//! ## Ordering
//!
//! All anchors are resolved against the untouched text first. Insertions are
//! then applied from the highest offset down, so text added at a later
//! offset never shifts a pending earlier one. Each anchor is still
//! re-located right before its insertion; the span is reused when its bytes
//! are unchanged.
//!
//! Instructions whose anchor cannot be found are not dropped: their images
//! go to a trailing fallback section so nothing the collaborator detected is
//! lost.

use crate::instruction::{InsertOperation, InsertionInstruction};
use crate::pipeline::anchor::AnchorMatcher;
use crate::report::{MatchResult, MatchStrategy};
use tracing::{debug, info, warn};

/// Heading of the end-of-page section holding unplaced images.
pub const FALLBACK_HEADING: &str = "## 附加图片 (锚点匹配失败)";

/// Root of the media directory when a task id is set.
pub const TASK_MEDIA_ROOT: &str = "/media/oss-bucket/_toolkit/_extractor";

const REASON_NOT_FOUND: &str = "锚点未找到";
const REASON_RELOCATION_FAILED: &str = "重新定位失败";

/// Result of applying a page's instructions.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertionOutcome {
    /// Markdown with image references inserted.
    pub text: String,
    /// One result per instruction, in input order.
    pub match_results: Vec<MatchResult>,
    /// Validation issues found on the instructions.
    pub warnings: Vec<String>,
}

/// Places image references next to their anchors.
#[derive(Debug, Clone, Default)]
pub struct InsertionEngine {
    task_id: Option<String>,
    matcher: AnchorMatcher,
}

fn tier_confidence(strategy: MatchStrategy) -> f64 {
    match strategy {
        MatchStrategy::Exact => 1.0,
        MatchStrategy::Normalized => 0.9,
        MatchStrategy::Regex => 0.75,
        MatchStrategy::Fallback | MatchStrategy::None => 0.0,
    }
}

impl InsertionEngine {
    pub fn new(task_id: Option<String>) -> Self {
        Self {
            task_id,
            matcher: AnchorMatcher::new(),
        }
    }

    /// Path an image reference points to.
    pub fn image_path(&self, page_number: u32, image_index: i64) -> String {
        match &self.task_id {
            Some(task) => format!(
                "{TASK_MEDIA_ROOT}/{task}/page_{page_number}/image_{image_index}.png"
            ),
            None => format!("page_{page_number}/image_{image_index}.png"),
        }
    }

    /// Markdown image reference for one instruction.
    pub fn image_reference(&self, instruction: &InsertionInstruction, page_number: u32) -> String {
        format!(
            "![{}]({})",
            instruction.description,
            self.image_path(page_number, instruction.image_index)
        )
    }

    /// Apply `instructions` to `text` for page `page_number`.
    ///
    /// `page_height` enables the spatial tie-break for anchors that occur
    /// more than once.
    pub fn apply(
        &self,
        text: &str,
        instructions: &[InsertionInstruction],
        page_number: u32,
        page_height: Option<f64>,
    ) -> InsertionOutcome {
        // Boundary step: legacy operations and empty descriptions are
        // normalised here and nowhere else.
        let instructions: Vec<InsertionInstruction> =
            instructions.iter().cloned().map(InsertionInstruction::normalized).collect();

        let mut warnings = Vec::new();
        for issue in instructions.iter().flat_map(InsertionInstruction::validate) {
            warn!("Page {}: {}", page_number, issue);
            warnings.push(issue.to_string());
        }

        let mut results: Vec<Option<MatchResult>> = vec![None; instructions.len()];
        let mut resolved = Vec::new();
        let mut unresolved = Vec::new();
        for (slot, ins) in instructions.iter().enumerate() {
            match self
                .matcher
                .find(text, &ins.anchor_text, ins.bbox.as_ref(), page_height)
            {
                Some(m) => resolved.push((slot, m)),
                None => unresolved.push(slot),
            }
        }

        // Highest offset first; on the same offset the higher index goes
        // first so images sharing an anchor end up in ascending order.
        resolved.sort_by(|(a_slot, a), (b_slot, b)| {
            b.start.cmp(&a.start).then_with(|| {
                instructions[*b_slot]
                    .image_index
                    .cmp(&instructions[*a_slot].image_index)
            })
        });

        let mut out = text.to_string();
        for (slot, found) in resolved {
            let ins = &instructions[slot];
            let Some(current) = self.matcher.relocate(
                &out,
                &found,
                &ins.anchor_text,
                ins.bbox.as_ref(),
                page_height,
            ) else {
                warn!(
                    "Page {}: image {} lost its anchor after earlier insertions",
                    page_number, ins.image_index
                );
                results[slot] = Some(MatchResult::failed(
                    ins.image_index,
                    MatchStrategy::None,
                    REASON_RELOCATION_FAILED,
                ));
                continue;
            };

            let reference = self.image_reference(ins, page_number);
            match ins.operation {
                InsertOperation::InsertBefore => {
                    out.insert_str(current.start, &format!("\n{reference}\n\n"));
                }
                InsertOperation::InsertAfter | InsertOperation::Replace => {
                    out.insert_str(current.end, &format!("\n\n{reference}\n"));
                }
            }
            debug!(
                "Page {}: image {} {} anchor at {} ({})",
                page_number,
                ins.image_index,
                ins.operation,
                found.start,
                found.strategy.as_str()
            );

            let mut result = MatchResult::matched(ins.image_index, found.strategy, found.start);
            result.confidence_score = Some(tier_confidence(found.strategy));
            result.spatial_distance = found.spatial_distance;
            if !found.alternatives.is_empty() {
                result.alternative_anchors =
                    Some(found.alternatives.iter().map(|&p| p as i64).collect());
            }
            results[slot] = Some(result);
        }

        if !unresolved.is_empty() {
            out.push_str("\n\n");
            out.push_str(FALLBACK_HEADING);
            out.push_str("\n\n");
            for slot in &unresolved {
                let ins = &instructions[*slot];
                out.push_str(&self.image_reference(ins, page_number));
                out.push_str("\n\n");
                results[*slot] = Some(MatchResult::failed(
                    ins.image_index,
                    MatchStrategy::Fallback,
                    REASON_NOT_FOUND,
                ));
            }
        }

        let match_results: Vec<MatchResult> = results.into_iter().flatten().collect();
        let placed = match_results.iter().filter(|r| r.success).count();
        info!(
            "Page {}: placed {}/{} image(s), {} in fallback section",
            page_number,
            placed,
            match_results.len(),
            unresolved.len()
        );

        InsertionOutcome {
            text: out,
            match_results,
            warnings,
        }
    }
}
