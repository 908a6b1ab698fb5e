//! The ordered rule table of the line classifier.
//!
//! Rules are evaluated top to bottom and the first one that returns a
//! category wins. Context-gated rules return `None` when no flag applies so
//! that evaluation continues with the next rule.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::fuzzy::{word_matches_any, Fuzzy, Sequence, Step};
use crate::core::model::Category;
use crate::labeling::context::RegionContext;
use crate::labeling::ner::{EntityLabel, EntityRecognizer};

/// Everything a rule may look at besides the region context.
pub struct LineInput<'a> {
    /// NFC-normalized line text with leading whitespace removed.
    pub text: &'a str,
    /// Leftmost x coordinate of the line polygon.
    pub left: i64,
    pub page_width: u32,
    pub recognizer: &'a dyn EntityRecognizer,
}

impl LineInput<'_> {
    fn left_of(&self, fraction: u32) -> bool {
        self.left.saturating_mul(i64::from(fraction)) < i64::from(self.page_width)
    }
}

pub struct Rule {
    pub name: &'static str,
    pub apply: fn(&LineInput<'_>, &RegionContext) -> Option<Category>,
}

pub static RULES: [Rule; 21] = [
    Rule { name: "father", apply: father },
    Rule { name: "mother", apply: mother },
    Rule { name: "birth_date", apply: birth_date },
    Rule { name: "birth_place", apply: birth_place },
    Rule { name: "award", apply: award },
    Rule { name: "marriage_location", apply: marriage_location },
    Rule { name: "spouse", apply: spouse },
    Rule { name: "ship", apply: ship },
    Rule { name: "children", apply: children },
    Rule { name: "decision", apply: decision },
    Rule { name: "appointment", apply: appointment },
    Rule { name: "death_date", apply: death_date },
    Rule { name: "pension", apply: pension },
    Rule { name: "departure", apply: departure },
    Rule { name: "religion", apply: religion },
    Rule { name: "repatriation", apply: repatriation },
    Rule { name: "dated_event", apply: dated_event },
    Rule { name: "bare_year", apply: bare_year },
    Rule { name: "baron", apply: baron },
    Rule { name: "rank_context", apply: rank_context },
    Rule { name: "entities", apply: entities },
];

/// Runs the table and reports the winning rule together with its category.
pub fn first_match(input: &LineInput<'_>, ctx: &RegionContext) -> Option<(&'static str, Category)> {
    RULES
        .iter()
        .find_map(|rule| (rule.apply)(input, ctx).map(|category| (rule.name, category)))
}

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|err| panic!("invalid rule pattern {pattern}: {err}"))
}

const MONTHS: &[&str] = &[
    "januari",
    "februari",
    "maart",
    "april",
    "mei",
    "juni",
    "juli",
    "augustus",
    "september",
    "october",
    "oktober",
    "november",
    "december",
];

static FATHER: LazyLock<Sequence> = LazyLock::new(|| {
    Sequence::anchored(vec![
        Step::Fuzzy(Fuzzy::new("Vader", 1)),
        Step::Regex(regex(r"^[\s.,:;]+\p{Lu}")),
    ])
});
static MOTHER: LazyLock<Sequence> = LazyLock::new(|| {
    Sequence::anchored(vec![
        Step::Fuzzy(Fuzzy::new("Moeder", 1)),
        Step::Regex(regex(r"^[\s.,:;]+\p{Lu}")),
    ])
});
static BIRTH_DATE: LazyLock<Regex> = LazyLock::new(|| regex(r"^den\b.*?\b\d{4}\b"));
static BIRTH_PLACE: LazyLock<Sequence> = LazyLock::new(|| place_after("Geboren"));
static MARRIAGE_LOCATION: LazyLock<Sequence> = LazyLock::new(|| place_after("Gehuwd"));
static AWARDS: LazyLock<[Fuzzy; 3]> = LazyLock::new(|| {
    ["orde", "order", "ridder"].map(|word| Fuzzy::new(word, 1).whole_word())
});
static SPOUSE: LazyLock<Sequence> = LazyLock::new(|| {
    Sequence::anchored(vec![
        Step::Fuzzy(Fuzzy::new("met", 1)),
        Step::Regex(regex(r"^\s+\p{Lu}")),
    ])
});
static SHIP: LazyLock<Fuzzy> = LazyLock::new(|| Fuzzy::new("schip", 1));
static CHILDREN: LazyLock<Sequence> = LazyLock::new(|| {
    Sequence::anchored(vec![
        Step::Fuzzy(Fuzzy::new("Kinderen", 2)),
        Step::Regex(regex(r"^[\s.,:;]+\p{L}")),
    ])
});
static DECISION: LazyLock<Fuzzy> = LazyLock::new(|| Fuzzy::new("besl", 1));
static APPOINTMENT: LazyLock<Fuzzy> = LazyLock::new(|| Fuzzy::new("aangest", 1));
static DATE: LazyLock<Regex> = LazyLock::new(|| regex(r"\b(\d{1,2})\s+(\p{L}+)\.?\s+(\d{4})\b"));
static PENSION: LazyLock<Fuzzy> = LazyLock::new(|| Fuzzy::new("pensioen", 2));
static DEPARTURE: LazyLock<Sequence> = LazyLock::new(|| {
    Sequence::search(vec![
        Step::Regex(DATE.clone()),
        Step::Regex(regex(r"^[\s.,]+")),
        Step::Fuzzy(Fuzzy::new("uit", 2)),
        Step::Regex(regex(r"^\s+\p{Lu}")),
    ])
});
static RELIGION: LazyLock<Sequence> = LazyLock::new(|| {
    Sequence::anchored(vec![
        Step::Fuzzy(Fuzzy::new("Godsdienst", 3)),
        Step::Regex(regex(r"^[\s.,:;]+\p{L}")),
    ])
});
static REPATRIATED: LazyLock<Fuzzy> = LazyLock::new(|| Fuzzy::new("gerepatrieerd", 2));
static YEAR: LazyLock<Regex> = LazyLock::new(|| regex(r"\b1[1-9]\d{2}\b"));
static BARON: LazyLock<Fuzzy> = LazyLock::new(|| Fuzzy::new("Baron", 1).case_sensitive());
static NOT_A_NAME: LazyLock<[Fuzzy; 3]> = LazyLock::new(|| {
    [
        Fuzzy::new("staf", 1),
        Fuzzy::new("dienst", 1),
        Fuzzy::new("demissie", 2),
    ]
});

fn place_after(keyword: &str) -> Sequence {
    Sequence::anchored(vec![
        Step::Fuzzy(Fuzzy::new(keyword, 2)),
        Step::Regex(regex(r"^\s+")),
        Step::Fuzzy(Fuzzy::new("te", 1)),
        Step::Regex(regex(r"^\s+\p{L}")),
    ])
}

fn when(matched: bool, category: Category) -> Option<Category> {
    matched.then_some(category)
}

fn father(input: &LineInput<'_>, _: &RegionContext) -> Option<Category> {
    when(FATHER.is_match(input.text), Category::Father)
}

fn mother(input: &LineInput<'_>, _: &RegionContext) -> Option<Category> {
    when(MOTHER.is_match(input.text), Category::Mother)
}

fn birth_date(input: &LineInput<'_>, ctx: &RegionContext) -> Option<Category> {
    when(
        !ctx.died && input.left_of(3) && BIRTH_DATE.is_match(input.text),
        Category::BirthDate,
    )
}

fn birth_place(input: &LineInput<'_>, _: &RegionContext) -> Option<Category> {
    when(BIRTH_PLACE.is_match(input.text), Category::BirthPlace)
}

fn award(input: &LineInput<'_>, _: &RegionContext) -> Option<Category> {
    when(
        AWARDS.iter().any(|word| word.is_word_match(input.text)),
        Category::Award,
    )
}

fn marriage_location(input: &LineInput<'_>, _: &RegionContext) -> Option<Category> {
    when(MARRIAGE_LOCATION.is_match(input.text), Category::MarriageLocation)
}

fn spouse(input: &LineInput<'_>, _: &RegionContext) -> Option<Category> {
    when(
        SPOUSE.is_match(input.text) && !contains_word_part(input.text, "schip"),
        Category::Spouse,
    )
}

fn ship(input: &LineInput<'_>, _: &RegionContext) -> Option<Category> {
    when(
        SHIP.is_match(input.text) && !contains_word_part(input.text, "welk"),
        Category::Ship,
    )
}

fn children(input: &LineInput<'_>, _: &RegionContext) -> Option<Category> {
    when(CHILDREN.is_match(input.text), Category::Children)
}

fn decision(input: &LineInput<'_>, ctx: &RegionContext) -> Option<Category> {
    if !DECISION.is_word_match(input.text) {
        return None;
    }
    if ctx.retired {
        Some(Category::Retirement)
    } else if ctx.rank {
        Some(Category::Rank)
    } else if ctx.repatriated {
        Some(Category::Repatriation)
    } else {
        None
    }
}

fn appointment(input: &LineInput<'_>, ctx: &RegionContext) -> Option<Category> {
    when(ctx.rank && APPOINTMENT.is_word_match(input.text), Category::Rank)
}

fn death_date(input: &LineInput<'_>, ctx: &RegionContext) -> Option<Category> {
    when(ctx.died && DATE.is_match(input.text), Category::DeathDate)
}

fn pension(input: &LineInput<'_>, _: &RegionContext) -> Option<Category> {
    when(PENSION.is_match(input.text), Category::Retirement)
}

fn departure(input: &LineInput<'_>, _: &RegionContext) -> Option<Category> {
    when(DEPARTURE.is_match(input.text), Category::Departure)
}

fn religion(input: &LineInput<'_>, _: &RegionContext) -> Option<Category> {
    when(RELIGION.is_match(input.text), Category::Religion)
}

fn repatriation(input: &LineInput<'_>, _: &RegionContext) -> Option<Category> {
    when(REPATRIATED.is_match(input.text), Category::Repatriation)
}

/// A day, a Dutch month name within one edit and a year.
fn has_full_date(text: &str) -> bool {
    DATE.captures_iter(text)
        .any(|caps| word_matches_any(&caps[2], MONTHS, 1))
}

fn dated_event(input: &LineInput<'_>, ctx: &RegionContext) -> Option<Category> {
    if !has_full_date(input.text) {
        return None;
    }
    if ctx.rank {
        Some(Category::Rank)
    } else if ctx.retired {
        Some(Category::Retirement)
    } else if ctx.repatriated {
        Some(Category::Repatriation)
    } else {
        None
    }
}

fn bare_year(input: &LineInput<'_>, ctx: &RegionContext) -> Option<Category> {
    if !YEAR.is_match(input.text) {
        return None;
    }
    if ctx.repatriated {
        Some(Category::Repatriation)
    } else if ctx.retired {
        Some(Category::Retirement)
    } else {
        None
    }
}

fn baron(input: &LineInput<'_>, _: &RegionContext) -> Option<Category> {
    when(BARON.is_match(input.text), Category::Name)
}

fn rank_context(_: &LineInput<'_>, ctx: &RegionContext) -> Option<Category> {
    when(ctx.rank, Category::Rank)
}

fn entities(input: &LineInput<'_>, ctx: &RegionContext) -> Option<Category> {
    let spans = input.recognizer.classify_entities(input.text);
    let has = |label: EntityLabel| spans.iter().any(|span| span.label == label);

    if has(EntityLabel::Person)
        && input.left_of(5)
        && !NOT_A_NAME.iter().any(|word| word.is_word_match(input.text))
    {
        return Some(Category::Name);
    }
    when(ctx.died && has(EntityLabel::Gpe), Category::DeathPlace)
}

fn contains_word_part(text: &str, part: &str) -> bool {
    text.to_lowercase().contains(part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labeling::ner::{EntitySpan, NoEntities};
    use pretty_assertions::assert_eq;

    struct Fixed(Vec<EntitySpan>);

    impl EntityRecognizer for Fixed {
        fn classify_entities(&self, _text: &str) -> Vec<EntitySpan> {
            self.0.clone()
        }
    }

    fn input<'a>(text: &'a str, recognizer: &'a dyn EntityRecognizer) -> LineInput<'a> {
        LineInput {
            text,
            left: 100,
            page_width: 3000,
            recognizer,
        }
    }

    fn classify(text: &str, ctx: RegionContext) -> Option<Category> {
        first_match(&input(text, &NoEntities), &ctx).map(|(_, category)| category)
    }

    fn flags(died: bool, rank: bool, retired: bool, repatriated: bool) -> RegionContext {
        RegionContext {
            died,
            rank,
            retired,
            repatriated,
        }
    }

    #[test]
    fn table_has_unique_names() {
        let mut names: Vec<_> = RULES.iter().map(|rule| rule.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), RULES.len());
    }

    #[test]
    fn parents_need_a_capitalized_name() {
        let quiet = RegionContext::default();
        assert_eq!(classify("Vader Jansen", quiet), Some(Category::Father));
        assert_eq!(classify("Vadr: Pieter Bos", quiet), Some(Category::Father));
        assert_eq!(classify("Moeder Aaltje de Vries", quiet), Some(Category::Mother));
        assert_eq!(classify("vader onbekend", quiet), None);
    }

    #[test]
    fn birth_date_depends_on_position_and_death() {
        let text = "den 12 Maart 1841";
        let quiet = RegionContext::default();
        assert_eq!(classify(text, quiet), Some(Category::BirthDate));

        let far_right = LineInput {
            left: 2000,
            ..input(text, &NoEntities)
        };
        assert_eq!(birth_date(&far_right, &quiet), None);

        let died = flags(true, false, false, false);
        assert_eq!(birth_date(&input(text, &NoEntities), &died), None);
        assert_eq!(classify(text, died), Some(Category::DeathDate));
    }

    #[test]
    fn birth_date_prefix_is_case_sensitive() {
        let quiet = RegionContext::default();
        assert_eq!(birth_date(&input("Den 12 Maart 1841", &NoEntities), &quiet), None);
    }

    #[test]
    fn places_after_keyword_and_te() {
        let quiet = RegionContext::default();
        assert_eq!(classify("Geboren te Amsterdam", quiet), Some(Category::BirthPlace));
        assert_eq!(classify("Gebooren t Leiden", quiet), Some(Category::BirthPlace));
        assert_eq!(
            classify("Gehuwd te Batavia", quiet),
            Some(Category::MarriageLocation)
        );
    }

    #[test]
    fn award_words_match_whole_words() {
        let quiet = RegionContext::default();
        assert_eq!(
            classify("Ridder der Militaire Willemsorde 4e klasse", quiet),
            Some(Category::Award)
        );
        assert_eq!(classify("Militaire Willems Orde", quiet), Some(Category::Award));
        assert_eq!(classify("ordentelijk gedrag", quiet), None);
    }

    #[test]
    fn spouse_and_ship_exclude_each_other() {
        let quiet = RegionContext::default();
        assert_eq!(classify("met Johanna Smit", quiet), Some(Category::Spouse));
        assert_eq!(classify("met het schip Zeeland", quiet), Some(Category::Ship));
        assert_eq!(
            classify("met Zr Ms schip Zeeland", quiet),
            Some(Category::Ship)
        );
        assert_eq!(classify("welk schip vertrokken", quiet), None);
    }

    #[test]
    fn children_and_religion_prefixes() {
        let quiet = RegionContext::default();
        assert_eq!(classify("Kinderen: twee", quiet), Some(Category::Children));
        assert_eq!(classify("Godsdienst Roomsch", quiet), Some(Category::Religion));
        assert_eq!(classify("Godsdinst: Herv", quiet), Some(Category::Religion));
    }

    #[test]
    fn decision_follows_context_priority() {
        let text = "bij besluit van den Koning";
        assert_eq!(
            classify(text, flags(false, true, true, true)),
            Some(Category::Retirement)
        );
        assert_eq!(classify(text, flags(false, true, false, true)), Some(Category::Rank));
        assert_eq!(
            classify(text, flags(false, false, false, true)),
            Some(Category::Repatriation)
        );
        assert_eq!(decision(&input(text, &NoEntities), &RegionContext::default()), None);
    }

    #[test]
    fn appointment_requires_rank_context() {
        let text = "aangesteld als tamboer";
        let quiet = RegionContext::default();
        assert_eq!(appointment(&input(text, &NoEntities), &quiet), None);
        assert_eq!(
            appointment(&input(text, &NoEntities), &flags(false, true, false, false)),
            Some(Category::Rank)
        );
    }

    #[test]
    fn pension_and_repatriation_keywords() {
        let quiet = RegionContext::default();
        assert_eq!(
            classify("gepasporteerd met pensioen", quiet),
            Some(Category::Retirement)
        );
        assert_eq!(
            classify("gerepatrieerd naar Nederland", quiet),
            Some(Category::Repatriation)
        );
    }

    #[test]
    fn departure_is_a_date_followed_by_uit() {
        let quiet = RegionContext::default();
        assert_eq!(
            classify("3 Mei 1850, uit Padang", quiet),
            Some(Category::Departure)
        );
        assert_eq!(classify("3 Mei 1850 naar huis", quiet), None);
    }

    #[test]
    fn full_date_uses_context_and_falls_through_without_it() {
        let text = "14 Oktober 1852";
        assert_eq!(classify(text, flags(false, true, true, false)), Some(Category::Rank));
        assert_eq!(
            classify(text, flags(false, false, true, true)),
            Some(Category::Retirement)
        );
        assert_eq!(
            classify(text, flags(false, false, false, true)),
            Some(Category::Repatriation)
        );
        assert_eq!(classify(text, RegionContext::default()), None);
        assert!(has_full_date("2 Augusts 1849"));
        assert!(!has_full_date("2 Koeien 1849"));
    }

    #[test]
    fn bare_year_prefers_repatriation() {
        assert_eq!(
            classify("1876", flags(false, false, true, true)),
            Some(Category::Repatriation)
        );
        assert_eq!(
            classify("1876", flags(false, false, true, false)),
            Some(Category::Retirement)
        );
        assert_eq!(classify("1076", flags(false, false, true, false)), None);
    }

    #[test]
    fn baron_is_a_name() {
        assert_eq!(
            classify("Baron van Heeckeren", RegionContext::default()),
            Some(Category::Name)
        );
    }

    #[test]
    fn rank_context_catches_the_rest() {
        assert_eq!(
            classify("zie folio 3", flags(false, true, false, false)),
            Some(Category::Rank)
        );
    }

    #[test]
    fn person_entity_near_left_margin_is_a_name() {
        let person = Fixed(vec![EntitySpan::new(EntityLabel::Person, "Jan Jansen")]);
        let quiet = RegionContext::default();
        assert_eq!(entities(&input("Jan Jansen", &person), &quiet), Some(Category::Name));

        let indented = LineInput {
            left: 700,
            ..input("Jan Jansen", &person)
        };
        assert_eq!(entities(&indented, &quiet), None);
        assert_eq!(entities(&input("Jan Jansen dienst", &person), &quiet), None);
    }

    #[test]
    fn place_entity_in_death_region_is_death_place() {
        let place = Fixed(vec![EntitySpan::new(EntityLabel::Gpe, "Batavia")]);
        assert_eq!(
            entities(&input("Batavia", &place), &flags(true, false, false, false)),
            Some(Category::DeathPlace)
        );
        assert_eq!(entities(&input("Batavia", &place), &RegionContext::default()), None);
    }
}
