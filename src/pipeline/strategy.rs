//! Extraction-strategy decision: how should this page's text be obtained?
//!
//! ## Rule order
//!
//! The decision is an ordered list of `predicate → decision` rules and the
//! first rule whose predicate holds wins. Order carries meaning: the CID-font
//! rule must shadow the rich-text rule (garbled glyph mappings produce long,
//! word-rich but meaningless text), and the OCR rules must run before the
//! hybrid ones.
//!
//! The decider is a total function: every [`PageMetrics`] value, including
//! the all-zero default, reaches a rule (the last one always applies).

use crate::config::StrategyThresholds;
use crate::metrics::{ExtractionStrategy, PageMetrics, StrategyDecision};
use std::collections::BTreeMap;
use tracing::debug;

/// Minimum text quality for trusting the text layer outright.
const DIRECT_TEXT_QUALITY_MIN: f64 = 0.6;
/// Text length under which a table-heavy page is table-only.
const TABLE_ONLY_TEXT_MAX: usize = 200;

/// Everything a rule needs, computed once per decision.
struct RuleInput<'a> {
    m: &'a PageMetrics,
    t: &'a StrategyThresholds,
    quality: f64,
    complexity: f64,
}

impl RuleInput<'_> {
    fn text_below_min(&self) -> bool {
        (self.m.text_length as f64) < self.t.text_length_min
    }

    fn has_images(&self) -> bool {
        self.m.image_count as f64 >= self.t.ocr_image_threshold
    }
}

struct Rule {
    name: &'static str,
    applies: fn(&RuleInput<'_>) -> bool,
    decide: fn(&RuleInput<'_>) -> (ExtractionStrategy, f64, String),
}

static RULES: &[Rule] = &[
    Rule {
        name: "cid_fonts",
        applies: |i| i.m.has_cid_fonts,
        decide: |_| {
            (
                ExtractionStrategy::Ocr,
                0.95,
                "CID-keyed fonts detected; text layer is likely garbled".into(),
            )
        },
    },
    Rule {
        name: "rich_text",
        applies: |i| {
            !i.text_below_min()
                && i.m.word_count as f64 >= i.t.word_count_min
                && i.quality >= DIRECT_TEXT_QUALITY_MIN
        },
        decide: |i| {
            (
                ExtractionStrategy::DirectText,
                (i.quality + 0.2).min(1.0),
                format!("text layer looks reliable (quality {:.2})", i.quality),
            )
        },
    },
    Rule {
        name: "image_without_text",
        applies: |i| i.has_images() && i.text_below_min(),
        decide: |i| {
            (
                ExtractionStrategy::Ocr,
                (0.7 + 0.1 * i.m.image_count as f64).min(0.95),
                format!(
                    "{} image(s) and only {} chars of text",
                    i.m.image_count, i.m.text_length
                ),
            )
        },
    },
    Rule {
        name: "complex_without_text",
        applies: |i| i.complexity >= i.t.ocr_complexity_threshold && i.text_below_min(),
        decide: |i| {
            (
                ExtractionStrategy::Ocr,
                (0.6 + 0.3 * i.complexity).min(0.9),
                format!(
                    "visually complex page (complexity {:.2}) with little text",
                    i.complexity
                ),
            )
        },
    },
    Rule {
        name: "table_dominant",
        applies: |i| {
            i.m.table_count as f64 >= i.t.table_dominant_threshold
                && i.m.text_length < TABLE_ONLY_TEXT_MAX
        },
        decide: |i| {
            (
                ExtractionStrategy::TableOnly,
                0.75,
                format!("{} tables dominate the page", i.m.table_count),
            )
        },
    },
    Rule {
        name: "low_quality_text",
        applies: |i| i.m.text_length > 0 && i.quality < i.t.hybrid_text_quality_threshold,
        decide: |i| {
            (
                ExtractionStrategy::Hybrid,
                0.65,
                format!("small amount of low-quality text (quality {:.2})", i.quality),
            )
        },
    },
    Rule {
        name: "text_with_visuals",
        applies: |i| {
            !i.text_below_min()
                && (i.has_images() || i.m.drawing_count as f64 >= i.t.ocr_drawing_threshold)
        },
        decide: |i| {
            (
                ExtractionStrategy::Hybrid,
                0.7,
                format!(
                    "text plus visual content ({} images, {} drawings)",
                    i.m.image_count, i.m.drawing_count
                ),
            )
        },
    },
    Rule {
        name: "some_text",
        applies: |i| i.m.text_length > 0,
        decide: |_| {
            (
                ExtractionStrategy::DirectText,
                0.5,
                "text present, no stronger signal".into(),
            )
        },
    },
    Rule {
        name: "no_text",
        applies: |_| true,
        decide: |_| (ExtractionStrategy::Ocr, 0.6, "no extractable text".into()),
    },
];

/// Chooses an [`ExtractionStrategy`] per page.
#[derive(Debug, Clone, Default)]
pub struct ExtractionStrategyDecider {
    thresholds: StrategyThresholds,
}

impl ExtractionStrategyDecider {
    pub fn new(thresholds: StrategyThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &StrategyThresholds {
        &self.thresholds
    }

    /// Decide how to extract the page described by `metrics`.
    pub fn decide(&self, metrics: &PageMetrics) -> StrategyDecision {
        let input = RuleInput {
            m: metrics,
            t: &self.thresholds,
            quality: metrics.text_quality_score(),
            complexity: metrics.complexity_score(),
        };

        // The final rule always applies, so `find` cannot come back empty;
        // the fallback mirrors that rule.
        let (name, (strategy, confidence, detail)) = RULES
            .iter()
            .find(|rule| (rule.applies)(&input))
            .map(|rule| (rule.name, (rule.decide)(&input)))
            .unwrap_or_else(|| {
                (
                    "no_text",
                    (ExtractionStrategy::Ocr, 0.6, "no extractable text".into()),
                )
            });

        debug!(
            "Page {}: rule '{}' → {} ({:.2})",
            metrics.page_number, name, strategy, confidence
        );

        StrategyDecision {
            strategy,
            confidence,
            reason: format!("{name}: {detail}"),
            metrics: snapshot(metrics, input.quality, input.complexity),
        }
    }
}

fn snapshot(m: &PageMetrics, quality: f64, complexity: f64) -> BTreeMap<String, f64> {
    [
        ("text_length", m.text_length as f64),
        ("word_count", m.word_count as f64),
        ("image_count", m.image_count as f64),
        ("table_count", m.table_count as f64),
        ("drawing_count", m.drawing_count as f64),
        ("curve_count", m.curve_count as f64),
        ("text_quality", quality),
        ("complexity", complexity),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decide(m: &PageMetrics) -> StrategyDecision {
        ExtractionStrategyDecider::default().decide(m)
    }

    fn prose_page(words: usize) -> PageMetrics {
        let text = vec!["document"; words].join(" ");
        PageMetrics {
            page_number: 1,
            text_length: text.chars().count(),
            word_count: words,
            text_blocks_count: 8,
            raw_text: text,
            ..Default::default()
        }
    }

    #[test]
    fn cid_fonts_override_everything() {
        let m = PageMetrics {
            has_cid_fonts: true,
            ..prose_page(300)
        };
        let d = decide(&m);
        assert_eq!(d.strategy, ExtractionStrategy::Ocr);
        assert_eq!(d.confidence, 0.95);
        assert!(d.reason.starts_with("cid_fonts"));
    }

    #[test]
    fn rich_text_goes_direct() {
        let d = decide(&prose_page(150));
        assert_eq!(d.strategy, ExtractionStrategy::DirectText);
        assert!(d.confidence > 0.9 && d.confidence <= 1.0);
        assert!(d.reason.starts_with("rich_text"));
    }

    #[test]
    fn images_without_text_go_to_ocr() {
        let m = PageMetrics {
            image_count: 3,
            text_length: 10,
            word_count: 2,
            raw_text: "Fig. 1 cap".into(),
            ..Default::default()
        };
        let d = decide(&m);
        assert_eq!(d.strategy, ExtractionStrategy::Ocr);
        assert!((d.confidence - 0.95).abs() < 1e-9);
    }

    #[test]
    fn complex_drawing_without_text_goes_to_ocr() {
        let m = PageMetrics {
            drawing_count: 400,
            curve_count: 60,
            text_length: 5,
            word_count: 1,
            raw_text: "axis".into(),
            ..Default::default()
        };
        let d = decide(&m);
        assert_eq!(d.strategy, ExtractionStrategy::Ocr);
        assert!(d.reason.starts_with("complex_without_text"));
        assert!(d.confidence <= 0.9);
    }

    #[test]
    fn tables_with_little_text_are_table_only() {
        let m = PageMetrics {
            table_count: 2,
            text_length: 120,
            word_count: 40,
            raw_text: "1 2 3 4 ".repeat(15),
            ..Default::default()
        };
        let d = decide(&m);
        assert_eq!(d.strategy, ExtractionStrategy::TableOnly);
        assert_eq!(d.confidence, 0.75);
    }

    #[test]
    fn sparse_low_quality_text_is_hybrid() {
        let m = PageMetrics {
            text_length: 20,
            word_count: 10,
            raw_text: "a b c d e f g h i j".into(),
            ..Default::default()
        };
        let d = decide(&m);
        assert_eq!(d.strategy, ExtractionStrategy::Hybrid);
        assert_eq!(d.confidence, 0.65);
    }

    #[test]
    fn moderate_text_with_many_drawings_is_hybrid() {
        // Enough text to clear the minimum, too few words to be "rich".
        let text = vec!["document"; 9].join(" ");
        let m = PageMetrics {
            text_length: text.chars().count(),
            word_count: 9,
            text_blocks_count: 10,
            drawing_count: 150,
            raw_text: text,
            ..Default::default()
        };
        let d = decide(&m);
        assert_eq!(d.strategy, ExtractionStrategy::Hybrid);
        assert_eq!(d.confidence, 0.7);
    }

    #[test]
    fn plain_short_text_defaults_to_direct() {
        let text = "Quarterly revenue summary";
        let m = PageMetrics {
            text_length: text.chars().count(),
            word_count: 3,
            text_blocks_count: 10,
            raw_text: text.into(),
            ..Default::default()
        };
        let d = decide(&m);
        assert_eq!(d.strategy, ExtractionStrategy::DirectText);
        assert_eq!(d.confidence, 0.5);
    }

    #[test]
    fn empty_page_falls_back_to_ocr() {
        let d = decide(&PageMetrics::default());
        assert_eq!(d.strategy, ExtractionStrategy::Ocr);
        assert_eq!(d.confidence, 0.6);
        assert!(d.reason.starts_with("no_text"));
    }

    #[test]
    fn decision_is_deterministic() {
        let m = prose_page(40);
        assert_eq!(decide(&m), decide(&m));
    }

    #[test]
    fn thresholds_change_the_outcome() {
        let m = PageMetrics {
            image_count: 1,
            text_length: 60,
            word_count: 8,
            raw_text: "caption ".repeat(8),
            text_blocks_count: 10,
            ..Default::default()
        };
        assert_ne!(decide(&m).reason.split(':').next(), Some("image_without_text"));

        let strict = StrategyThresholds {
            text_length_min: 100.0,
            ..Default::default()
        };
        let d = ExtractionStrategyDecider::new(strict).decide(&m);
        assert_eq!(d.strategy, ExtractionStrategy::Ocr);
        assert!(d.reason.starts_with("image_without_text"));
    }

    #[test]
    fn metrics_snapshot_included() {
        let d = decide(&prose_page(20));
        assert_eq!(d.metrics["word_count"], 20.0);
        assert!(d.metrics.contains_key("complexity"));
    }
}
