use serde::Serialize;
use tracing::debug;

use crate::core::fuzzy::normalize;
use crate::core::model::{Category, Document, Line};
use crate::error::{DocumentError, Result};
use crate::labeling::context::RegionContext;
use crate::labeling::ner::EntityRecognizer;
use crate::labeling::rules::{first_match, LineInput};
use crate::labeling::RegionLabeler;

/// Counts of what happened to the lines of one document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LabelStats {
    /// Lines labeled by a rule or by the NER fallback.
    pub matched: usize,
    /// Lines without text or without any matching rule.
    pub fallback: usize,
    /// Lines that already carried a category and were left alone.
    pub preexisting: usize,
}

impl LabelStats {
    pub fn total(&self) -> usize {
        self.matched + self.fallback + self.preexisting
    }
}

/// What `classify_line` did to a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    AlreadyLabeled,
    Matched(Category),
    Fallback,
}

/// Labels a single line in place.
///
/// A line that already has a category is left untouched. A line without
/// recognized text becomes `Text` without consulting any rule.
pub fn classify_line(
    line: &mut Line,
    ctx: &RegionContext,
    page_width: u32,
    recognizer: &dyn EntityRecognizer,
) -> Result<Outcome> {
    if line.is_labeled() {
        return Ok(Outcome::AlreadyLabeled);
    }
    let Some(text) = line.recognized_text() else {
        line.category = Some(Category::Text);
        return Ok(Outcome::Fallback);
    };

    let left = line.left().ok_or_else(|| DocumentError::InvalidValue {
        element: "TextLine",
        field: "Coords",
        value: String::new(),
    })?;
    let text = normalize(text.trim_start());
    let input = LineInput {
        text: &text,
        left,
        page_width,
        recognizer,
    };

    match first_match(&input, ctx) {
        Some((rule, category)) => {
            debug!(line = %line.id, rule, %category, "rule matched");
            line.category = Some(category);
            Ok(Outcome::Matched(category))
        }
        None => {
            line.category = Some(Category::Text);
            Ok(Outcome::Fallback)
        }
    }
}

/// The rule-table labeler, parameterized over its entity recognizer.
#[derive(Debug, Default)]
pub struct RuleEngine<R> {
    recognizer: R,
}

impl<R: EntityRecognizer> RuleEngine<R> {
    pub fn new(recognizer: R) -> Self {
        Self { recognizer }
    }

    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }
}

impl<R: EntityRecognizer> RegionLabeler for RuleEngine<R> {
    fn label_document(&self, document: &mut Document) -> Result<LabelStats> {
        let page_width = document.width;
        let mut stats = LabelStats::default();

        for region in &mut document.regions {
            let ctx = RegionContext::from_region(region);
            debug!(region = %region.id, ?ctx, "region context");
            for line in &mut region.lines {
                match classify_line(line, &ctx, page_width, &self.recognizer)? {
                    Outcome::AlreadyLabeled => stats.preexisting += 1,
                    Outcome::Matched(_) => stats.matched += 1,
                    Outcome::Fallback => stats.fallback += 1,
                }
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::Point;
    use crate::core::model::Region;
    use crate::labeling::ner::{EntityLabel, EntitySpan, NoEntities};
    use pretty_assertions::assert_eq;

    struct Everyone;

    impl EntityRecognizer for Everyone {
        fn classify_entities(&self, text: &str) -> Vec<EntitySpan> {
            vec![EntitySpan::new(EntityLabel::Person, text)]
        }
    }

    fn line_at(id: &str, x: i64, text: Option<&str>) -> Line {
        let points = vec![
            Point::new(x, 0),
            Point::new(x + 100, 0),
            Point::new(x + 100, 20),
            Point::new(x, 20),
        ];
        Line::new(id, points, text)
    }

    #[test]
    fn three_line_scenario() {
        let retired = RegionContext {
            retired: true,
            ..RegionContext::default()
        };
        let mut a = line_at("a", 10, Some("Vader Jansen"));
        let mut b = line_at("b", 10, None);
        let mut c = line_at("c", 10, Some("1876"));
        for line in [&mut a, &mut b, &mut c] {
            classify_line(line, &retired, 1000, &NoEntities).unwrap();
        }
        assert_eq!(a.category, Some(Category::Father));
        assert_eq!(b.category, Some(Category::Text));
        assert_eq!(c.category, Some(Category::Retirement));
    }

    #[test]
    fn labeled_lines_are_never_relabeled() {
        let mut line = line_at("a", 10, Some("Vader Jansen"));
        line.category = Some(Category::Name);
        let outcome = classify_line(&mut line, &RegionContext::default(), 1000, &NoEntities);
        assert_eq!(outcome.unwrap(), Outcome::AlreadyLabeled);
        assert_eq!(line.category, Some(Category::Name));
    }

    #[test]
    fn whitespace_text_falls_back_to_text() {
        let mut line = line_at("a", 10, Some("  "));
        let outcome = classify_line(&mut line, &RegionContext::default(), 1000, &Everyone);
        assert_eq!(outcome.unwrap(), Outcome::Fallback);
        assert_eq!(line.category, Some(Category::Text));
    }

    #[test]
    fn line_without_polygon_is_an_error() {
        let mut line = Line::new("a", vec![], Some("Vader Jansen"));
        let result = classify_line(&mut line, &RegionContext::default(), 1000, &NoEntities);
        assert!(matches!(result, Err(DocumentError::InvalidValue { .. })));
    }

    #[test]
    fn document_gets_one_category_per_line() {
        let mut doc = Document::new(
            1000,
            1500,
            vec![
                Region {
                    id: "r1".to_string(),
                    points: vec![],
                    lines: vec![
                        line_at("l1", 10, Some("Jan Pieter Jansen")),
                        line_at("l2", 10, Some("Geboren te Leiden")),
                    ],
                },
                Region {
                    id: "r2".to_string(),
                    points: vec![],
                    lines: vec![
                        line_at("l3", 10, Some("Kapitein der Infanterie")),
                        line_at("l4", 600, Some("ontslagen")),
                        line_at("l5", 10, None),
                    ],
                },
            ],
        );

        let stats = RuleEngine::new(Everyone).label_document(&mut doc).unwrap();
        let labels: Vec<_> = doc.lines().map(|line| line.category).collect();
        assert_eq!(
            labels,
            vec![
                Some(Category::Name),
                Some(Category::BirthPlace),
                Some(Category::Rank),
                Some(Category::Rank),
                Some(Category::Text),
            ]
        );
        assert_eq!(
            stats,
            LabelStats {
                matched: 4,
                fallback: 1,
                preexisting: 0,
            }
        );
        assert_eq!(stats.total(), doc.line_count());
    }
}
