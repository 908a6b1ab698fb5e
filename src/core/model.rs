use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::geometry::Point;

/// Semantic category of a text line in a register entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Name,
    Award,
    Father,
    Mother,
    #[serde(rename = "Birth Date")]
    BirthDate,
    #[serde(rename = "Birth Place")]
    BirthPlace,
    Religion,
    #[serde(rename = "Marriage Location")]
    MarriageLocation,
    Spouse,
    Children,
    Rank,
    Ship,
    Departure,
    Retirement,
    Repatriation,
    #[serde(rename = "Death Date")]
    DeathDate,
    #[serde(rename = "Death Place")]
    DeathPlace,
    Text,
}

impl Category {
    pub const ALL: [Category; 18] = [
        Category::Name,
        Category::Award,
        Category::Father,
        Category::Mother,
        Category::BirthDate,
        Category::BirthPlace,
        Category::Religion,
        Category::MarriageLocation,
        Category::Spouse,
        Category::Children,
        Category::Rank,
        Category::Ship,
        Category::Departure,
        Category::Retirement,
        Category::Repatriation,
        Category::DeathDate,
        Category::DeathPlace,
        Category::Text,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Name => "Name",
            Category::Award => "Award",
            Category::Father => "Father",
            Category::Mother => "Mother",
            Category::BirthDate => "Birth Date",
            Category::BirthPlace => "Birth Place",
            Category::Religion => "Religion",
            Category::MarriageLocation => "Marriage Location",
            Category::Spouse => "Spouse",
            Category::Children => "Children",
            Category::Rank => "Rank",
            Category::Ship => "Ship",
            Category::Departure => "Departure",
            Category::Retirement => "Retirement",
            Category::Repatriation => "Repatriation",
            Category::DeathDate => "Death Date",
            Category::DeathPlace => "Death Place",
            Category::Text => "Text",
        }
    }

    /// The marker appended to a line's `custom` attribute.
    pub fn marker(&self) -> String {
        format!("structure {{type:{};}}", self.as_str())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown category '{}'", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Category::ALL
            .iter()
            .copied()
            .find(|category| category.as_str() == trimmed)
            .ok_or_else(|| UnknownCategory(trimmed.to_string()))
    }
}

/// Label of a line as seen by the evaluator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Category(Category),
    Unlabeled,
}

impl From<Option<Category>> for Label {
    fn from(category: Option<Category>) -> Self {
        category.map(Label::Category).unwrap_or(Label::Unlabeled)
    }
}

static STRUCTURE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"structure\s*\{[^}]*?type:([^;}]*);?[^}]*\}").expect("valid marker pattern")
});

/// Splits a raw `custom` attribute into free-form metadata and the category
/// carried by its first structure marker that names a known category.
///
/// Markers naming anything else stay in the metadata untouched.
pub fn split_annotation(custom: &str) -> (String, Option<Category>) {
    for caps in STRUCTURE_MARKER.captures_iter(custom) {
        let Some(whole) = caps.get(0) else { continue };
        let Ok(category) = caps[1].parse::<Category>() else {
            continue;
        };
        let mut metadata = String::with_capacity(custom.len());
        metadata.push_str(custom[..whole.start()].trim_end());
        let rest = custom[whole.end()..].trim_start();
        if !metadata.is_empty() && !rest.is_empty() {
            metadata.push(' ');
        }
        metadata.push_str(rest);
        return (metadata, Some(category));
    }
    (custom.to_string(), None)
}

/// Joins metadata and category back into a `custom` attribute value.
pub fn join_annotation(metadata: &str, category: Option<Category>) -> String {
    match category {
        Some(category) if metadata.trim().is_empty() => category.marker(),
        Some(category) => format!("{} {}", metadata.trim_end(), category.marker()),
        None => metadata.to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub width: u32,
    pub height: u32,
    pub regions: Vec<Region>,
    /// The XML this document was read from, used to preserve unrelated
    /// structure on save.
    #[serde(skip)]
    pub(crate) source: Option<String>,
}

impl Document {
    pub fn new(width: u32, height: u32, regions: Vec<Region>) -> Self {
        Self {
            width,
            height,
            regions,
            source: None,
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &Line> {
        self.regions.iter().flat_map(|region| region.lines.iter())
    }

    pub fn lines_mut(&mut self) -> impl Iterator<Item = &mut Line> {
        self.regions.iter_mut().flat_map(|region| region.lines.iter_mut())
    }

    pub fn line_count(&self) -> usize {
        self.regions.iter().map(|region| region.lines.len()).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub points: Vec<Point>,
    pub lines: Vec<Line>,
}

impl Region {
    /// Recognized line texts joined with `", "`, skipping lines without text.
    pub fn text_content(&self) -> String {
        self.lines
            .iter()
            .filter_map(|line| line.recognized_text())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    pub id: String,
    /// Position of the `TextLine` element among all `TextLine`s of the document.
    pub ordinal: usize,
    pub points: Vec<Point>,
    pub text: Option<String>,
    pub custom: String,
    pub category: Option<Category>,
}

impl Line {
    pub fn new(id: impl Into<String>, points: Vec<Point>, text: Option<&str>) -> Self {
        Self {
            id: id.into(),
            ordinal: 0,
            points,
            text: text.map(str::to_string),
            custom: String::new(),
            category: None,
        }
    }

    /// The transcribed text, or `None` when HTR produced nothing usable.
    pub fn recognized_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }

    pub fn is_labeled(&self) -> bool {
        self.category.is_some()
    }

    /// Leftmost x coordinate of the line polygon.
    pub fn left(&self) -> Option<i64> {
        self.points.iter().map(|point| point.x).min()
    }

    pub fn label(&self) -> Label {
        self.category.into()
    }

    pub fn annotation(&self) -> String {
        join_annotation(&self.custom, self.category)
    }
}
