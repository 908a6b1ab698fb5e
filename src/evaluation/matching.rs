use std::collections::BTreeMap;

use crate::core::geometry::Shape;
use crate::core::model::{Category, Document, Label};
use crate::evaluation::metrics::CategoryTally;

/// Minimum IoU for a true positive under Evaluation 1.
pub const IOU_THRESHOLD: f64 = 0.5;
/// Minimum intersection area for a true positive under Evaluation 2. This is
/// an absolute area in square pixels, not a ratio.
pub const COVERAGE_THRESHOLD: f64 = 0.9;

/// Per-category counts for one predicted / ground-truth document pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentScore {
    pub tallies: BTreeMap<Category, CategoryTally>,
    pub unlabeled_predicted: usize,
    pub unlabeled_ground_truth: usize,
}

impl DocumentScore {
    fn tally(&mut self, category: Category) -> &mut CategoryTally {
        self.tallies.entry(category).or_default()
    }
}

/// Matches every predicted line against every ground-truth line of the same
/// category.
///
/// Each overlapping same-category pair records an IoU observation and counts
/// toward Evaluation 1 when the IoU reaches [`IOU_THRESHOLD`]. Evaluation 2
/// counts a predicted line at most once, at the first ground truth whose
/// intersection reaches [`COVERAGE_THRESHOLD`]. Unlabeled lines on either
/// side are tallied separately and never match.
pub fn score_document(predicted: &Document, ground_truth: &Document) -> DocumentScore {
    let mut score = DocumentScore::default();

    let truth: Vec<(Shape, Category)> = ground_truth
        .lines()
        .filter_map(|line| match line.label() {
            Label::Category(category) => Some((Shape::from_points(&line.points), category)),
            Label::Unlabeled => {
                score.unlabeled_ground_truth += 1;
                None
            }
        })
        .collect();
    for (_, category) in &truth {
        score.tally(*category).ground_truth += 1;
    }

    for line in predicted.lines() {
        let Label::Category(category) = line.label() else {
            score.unlabeled_predicted += 1;
            continue;
        };
        let shape = Shape::from_points(&line.points);
        let tally = score.tally(category);
        tally.predicted += 1;

        let mut covered = false;
        for (truth_shape, truth_category) in &truth {
            if *truth_category != category {
                continue;
            }
            let intersection = shape.intersection_area(truth_shape);
            if intersection <= 0.0 {
                continue;
            }
            let iou = shape.iou_with_intersection(truth_shape, intersection);
            tally.ious.push(iou);
            if iou >= IOU_THRESHOLD {
                tally.tp_iou += 1;
            }
            if !covered && intersection >= COVERAGE_THRESHOLD {
                tally.tp_coverage += 1;
                covered = true;
            }
        }
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::Point;
    use crate::core::model::{Line, Region};
    use pretty_assertions::assert_eq;

    fn rect(x0: i64, y0: i64, w: i64, h: i64) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x0 + w, y0),
            Point::new(x0 + w, y0 + h),
            Point::new(x0, y0 + h),
        ]
    }

    fn doc(lines: Vec<(Vec<Point>, Option<Category>)>) -> Document {
        let lines = lines
            .into_iter()
            .enumerate()
            .map(|(idx, (points, category))| {
                let mut line = Line::new(format!("l{idx}"), points, Some("x"));
                line.category = category;
                line
            })
            .collect();
        Document::new(
            5000,
            5000,
            vec![Region {
                id: "r".to_string(),
                points: vec![],
                lines,
            }],
        )
    }

    #[test]
    fn identical_polygons_score_under_both_rules() {
        let pred = doc(vec![(rect(0, 0, 10, 10), Some(Category::Name))]);
        let gt = doc(vec![(rect(0, 0, 10, 10), Some(Category::Name))]);
        let score = score_document(&pred, &gt);
        let name = &score.tallies[&Category::Name];
        assert_eq!(name.ious.len(), 1);
        assert!((name.ious[0] - 1.0).abs() < 1e-6);
        assert_eq!((name.tp_iou, name.tp_coverage), (1, 1));
    }

    #[test]
    fn category_mismatch_blocks_matching() {
        let pred = doc(vec![(rect(0, 0, 10, 10), Some(Category::Name))]);
        let gt = doc(vec![(rect(0, 0, 10, 10), Some(Category::Rank))]);
        let score = score_document(&pred, &gt);
        let name = &score.tallies[&Category::Name];
        assert!(name.ious.is_empty());
        assert_eq!((name.tp_iou, name.tp_coverage), (0, 0));
        assert_eq!(score.tallies[&Category::Rank].ground_truth, 1);
    }

    #[test]
    fn coverage_rule_uses_absolute_area() {
        // 1000 x 1000 prediction touching a 1 x 1 ground truth.
        let pred = doc(vec![(rect(0, 0, 1000, 1000), Some(Category::Rank))]);
        let gt = doc(vec![(rect(999, 999, 1, 1), Some(Category::Rank))]);
        let score = score_document(&pred, &gt);
        let rank = &score.tallies[&Category::Rank];
        assert_eq!(rank.tp_coverage, 1);
        assert_eq!(rank.tp_iou, 0);
        assert!(rank.ious[0] < 1e-5);
    }

    #[test]
    fn iou_rule_counts_every_qualifying_truth() {
        let pred = doc(vec![(rect(0, 0, 10, 10), Some(Category::Text))]);
        let gt = doc(vec![
            (rect(0, 0, 10, 10), Some(Category::Text)),
            (rect(0, 0, 10, 9), Some(Category::Text)),
        ]);
        let score = score_document(&pred, &gt);
        let text = &score.tallies[&Category::Text];
        assert_eq!(text.tp_iou, 2);
        assert_eq!(text.tp_coverage, 1);
        assert_eq!(text.ground_truth, 2);
    }

    #[test]
    fn unlabeled_lines_never_score() {
        let pred = doc(vec![(rect(0, 0, 10, 10), None)]);
        let gt = doc(vec![(rect(0, 0, 10, 10), None)]);
        let score = score_document(&pred, &gt);
        assert!(score.tallies.is_empty());
        assert_eq!((score.unlabeled_predicted, score.unlabeled_ground_truth), (1, 1));
    }

    #[test]
    fn disjoint_polygons_record_nothing() {
        let pred = doc(vec![(rect(0, 0, 10, 10), Some(Category::Name))]);
        let gt = doc(vec![(rect(50, 50, 10, 10), Some(Category::Name))]);
        let score = score_document(&pred, &gt);
        assert!(score.tallies[&Category::Name].ious.is_empty());
    }
}
