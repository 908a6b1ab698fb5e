use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::core::fuzzy::{normalize, Fuzzy};
use crate::core::model::Region;

/// Word stems of ranks and roles that make a region read as a service record.
const RANK_STEMS: &[&str] = &[
    "luitenant",
    "kapitein",
    "majoor",
    "kolonel",
    "generaal",
    "sergeant",
    "korporaal",
    "soldaat",
    "fuselier",
    "kanonnier",
    "adjudant",
    "officier",
    "bevorderd",
    "tamboer",
    "hopman",
    "kwartiermeester",
];

static DIED: LazyLock<Fuzzy> = LazyLock::new(|| Fuzzy::new("overleden", 2));
static RETIRED: LazyLock<Fuzzy> = LazyLock::new(|| Fuzzy::new("pensioen", 2));
static REPATRIATED: LazyLock<Fuzzy> = LazyLock::new(|| Fuzzy::new("gerepatrieerd", 2));
static STAFF: LazyLock<Fuzzy> = LazyLock::new(|| Fuzzy::new("Staf van den", 2));
static RANKS: LazyLock<Vec<Fuzzy>> =
    LazyLock::new(|| RANK_STEMS.iter().map(|stem| Fuzzy::new(stem, 1)).collect());

/// Region-level facts that disambiguate otherwise identical line patterns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionContext {
    pub died: bool,
    pub rank: bool,
    pub retired: bool,
    pub repatriated: bool,
}

impl RegionContext {
    pub fn from_region(region: &Region) -> Self {
        Self::from_text(&region.text_content())
    }

    /// Derives the flags from the concatenated text of a region.
    pub fn from_text(text: &str) -> Self {
        let text = normalize(text);
        // A staff designation outranks any rank word in the same region.
        let staff = STAFF.is_match(&text);
        Self {
            died: DIED.is_match(&text),
            rank: !staff && RANKS.iter().any(|stem| stem.is_word_match(&text)),
            retired: RETIRED.is_match(&text),
            repatriated: REPATRIATED.is_match(&text),
        }
    }
}
