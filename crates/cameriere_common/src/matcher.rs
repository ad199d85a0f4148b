//! Menu matching: maps free-form utterance text to concrete menu entries,
//! size variants and quantities.
//!
//! Deterministic token-overlap scoring, zero LLM calls. Items are matched on
//! their name and declared synonyms; ties prefer a strict substring of the
//! utterance, then the earliest catalog position. Each recognized item span
//! resolves its own quantity independently, so "due caffè e un cornetto"
//! yields two lines, not one quantity applied to both.

use serde::{Deserialize, Serialize};

use crate::intent::UtteranceIntent;
use crate::menu::{Catalog, MenuItem};

/// Minimum share of an item's name tokens that must appear in the utterance.
const MIN_COVERAGE: f32 = 0.5;

/// How far (in words) a quantity may sit from the matched name span.
const QUANTITY_WINDOW: usize = 3;

/// Filler words ignored when scoring name overlap.
const STOPWORDS: &[&str] = &[
    "il", "lo", "la", "le", "gli", "un", "una", "uno", "di", "del", "della", "delle", "dei",
    "degli", "con", "per", "che", "non", "mi", "ti", "si", "ed", "al", "alla", "allo", "ai", "in",
    "su", "da", "ma", "se", "poi", "anche", "piu", "the", "of", "with", "and", "for", "to", "me",
    "my", "please", "grazie", "favore", "piacere", "bene", "ok", "va",
];

/// Size words grouped by meaning, so "large" binds the "grande" variant.
const SIZE_CLASSES: &[&[&str]] = &[
    &["piccolo", "piccola", "piccoli", "piccole", "small"],
    &["medio", "media", "medium", "regular", "normale"],
    &["grande", "grandi", "large", "big", "maxi"],
];

/// One utterance span resolved against the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedItem {
    pub item_id: String,
    pub name: String,
    /// `None` for items without size variants.
    pub variant: Option<String>,
    pub quantity: u32,
    /// The item has several variants and none was named: the default was
    /// assumed and should be surfaced for confirmation.
    pub ambiguous_variant: bool,
}

/// Lowercase and strip Italian accents, so "caffè" and "caffe" meet.
pub fn fold(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| match c {
            'à' | 'á' | 'â' => 'a',
            'è' | 'é' | 'ê' => 'e',
            'ì' | 'í' | 'î' => 'i',
            'ò' | 'ó' | 'ô' => 'o',
            'ù' | 'ú' | 'û' => 'u',
            'ç' => 'c',
            '\u{2019}' => '\'',
            _ => c,
        })
        .collect()
}

/// Fold, split on non-alphanumeric, drop tokens shorter than two chars.
pub fn tokenize(text: &str) -> Vec<String> {
    fold(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty() && s.len() >= 2)
        .map(String::from)
        .collect()
}

pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

struct Candidate<'a> {
    item: &'a MenuItem,
    catalog_pos: usize,
    score: u32,
    /// Word positions in the utterance consumed by this match.
    positions: Vec<usize>,
}

/// Resolve an utterance to ordered item candidates.
///
/// Questions never resolve: the caller must not mutate the order for them,
/// and returning nothing here keeps that invariant cheap to uphold.
pub fn resolve(utterance: &str, intent: UtteranceIntent, catalog: &Catalog) -> Vec<ResolvedItem> {
    if intent == UtteranceIntent::Question {
        return Vec::new();
    }

    let folded = fold(utterance);
    let words: Vec<String> = folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect();
    if words.is_empty() {
        return Vec::new();
    }

    let mut candidates: Vec<Candidate> = Vec::new();
    for (catalog_pos, item) in catalog.items().enumerate() {
        if let Some(candidate) = score_item(item, catalog_pos, &folded, &words) {
            candidates.push(candidate);
        }
    }

    // Highest score first; catalog order breaks ties.
    candidates.sort_by(|a, b| b.score.cmp(&a.score).then(a.catalog_pos.cmp(&b.catalog_pos)));

    // Greedy span assignment: a candidate whose matched words were all
    // already claimed by a stronger match is an alternative reading of the
    // same span, not a second item.
    let mut consumed = vec![false; words.len()];
    let mut resolved = Vec::new();
    for candidate in candidates {
        if candidate.positions.iter().all(|&p| consumed[p]) {
            continue;
        }
        for &p in &candidate.positions {
            consumed[p] = true;
        }

        let anchor = candidate.positions[0];
        let quantity = quantity_near(&words, anchor).unwrap_or(1);
        let (variant, ambiguous_variant) = resolve_variant(candidate.item, &words);

        resolved.push(ResolvedItem {
            item_id: candidate.item.id.clone(),
            name: candidate.item.name.clone(),
            variant,
            quantity,
            ambiguous_variant,
        });
    }

    resolved
}

/// Score one item against the utterance. An item matches through its name or
/// any declared synonym; the best-scoring alias wins.
fn score_item<'a>(
    item: &'a MenuItem,
    catalog_pos: usize,
    folded_utterance: &str,
    words: &[String],
) -> Option<Candidate<'a>> {
    let mut best: Option<(u32, Vec<usize>)> = None;

    let aliases = std::iter::once(item.name.as_str()).chain(item.synonyms.iter().map(|s| s.as_str()));
    for alias in aliases {
        let alias_folded = fold(alias);
        let mut alias_tokens: Vec<String> = tokenize(&alias_folded)
            .into_iter()
            .filter(|t| !is_stopword(t))
            .collect();
        if alias_tokens.is_empty() {
            alias_tokens = tokenize(&alias_folded);
        }
        if alias_tokens.is_empty() {
            continue;
        }

        let mut positions = Vec::new();
        let mut matched = 0usize;
        for token in &alias_tokens {
            let hit = words.iter().position(|w| token_eq(w, token));
            if let Some(p) = hit {
                matched += 1;
                positions.push(p);
            }
        }
        if matched == 0 {
            continue;
        }

        let coverage = matched as f32 / alias_tokens.len() as f32;
        if coverage < MIN_COVERAGE {
            continue;
        }

        let mut score = matched as u32 * 10 + (coverage * 20.0) as u32;
        if folded_utterance.contains(&alias_folded) {
            score += 25;
        }

        if best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
            best = Some((score, positions));
        }
    }

    best.map(|(score, positions)| Candidate {
        item,
        catalog_pos,
        score,
        positions,
    })
}

/// Nearest quantity word around the anchor: preceding positions win, then
/// following, both within [`QUANTITY_WINDOW`].
fn quantity_near(words: &[String], anchor: usize) -> Option<u32> {
    for d in 1..=QUANTITY_WINDOW {
        if let Some(pos) = anchor.checked_sub(d) {
            if let Some(q) = cardinal(&words[pos]) {
                return Some(q);
            }
        }
    }
    for d in 1..=QUANTITY_WINDOW {
        if let Some(word) = words.get(anchor + d) {
            if let Some(q) = cardinal(word) {
                return Some(q);
            }
        }
    }
    None
}

/// Loose token equality: exact, English plural ("coffees"/"coffee") or the
/// final-vowel swap of Italian plurals ("cappuccini"/"cappuccino").
fn token_eq(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    if a.strip_suffix('s') == Some(b) || b.strip_suffix('s') == Some(a) {
        return true;
    }
    if a.len() == b.len() && a.len() >= 4 && a.is_ascii() && b.is_ascii() {
        let (a_stem, a_end) = a.split_at(a.len() - 1);
        let (b_stem, b_end) = b.split_at(b.len() - 1);
        let vowel = |s: &str| matches!(s, "a" | "e" | "i" | "o");
        return a_stem == b_stem && vowel(a_end) && vowel(b_end);
    }
    false
}

/// Small cardinal words in either language, plus digit forms.
pub fn cardinal(word: &str) -> Option<u32> {
    let n = match word {
        "un" | "uno" | "una" | "one" => 1,
        "due" | "two" => 2,
        "tre" | "three" => 3,
        "quattro" | "four" => 4,
        "cinque" | "five" => 5,
        "sei" | "six" => 6,
        "sette" | "seven" => 7,
        "otto" | "eight" => 8,
        "nove" | "nine" => 9,
        "dieci" | "ten" => 10,
        _ => return word.parse::<u32>().ok().filter(|q| (1..=99).contains(q)),
    };
    Some(n)
}

/// Bind a size variant from qualifier words in the utterance. Items with
/// several variants and no qualifier fall back to the first-declared one,
/// flagged ambiguous.
fn resolve_variant(item: &MenuItem, words: &[String]) -> (Option<String>, bool) {
    if !item.has_sizes() {
        return (None, false);
    }

    // Literal label match first ("piccolo", "doppio", ...).
    for variant in &item.variants {
        let label_tokens = tokenize(&variant.label);
        if !label_tokens.is_empty() && label_tokens.iter().all(|t| words.contains(t)) {
            return (Some(variant.label.clone()), false);
        }
    }

    // Size-class equivalents ("large" binds "grande").
    for word in words {
        for variant in &item.variants {
            let label_tokens = tokenize(&variant.label);
            if label_tokens
                .iter()
                .any(|t| same_size_class(word, t))
            {
                return (Some(variant.label.clone()), false);
            }
        }
    }

    (Some(item.default_variant().label.clone()), true)
}

fn same_size_class(a: &str, b: &str) -> bool {
    SIZE_CLASSES
        .iter()
        .any(|class| class.contains(&a) && class.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::Catalog;

    fn fixture() -> Catalog {
        Catalog::from_json(
            r#"{
            "ristorante": "Mama's Trattoria",
            "allergeni_legend": {"1": "glutine", "7": "lattosio"},
            "sezioni": [
                {"nome": "Caffetteria", "voci": [
                    {"id": "espresso", "nome": "Caffè espresso", "prezzo": 1.2},
                    {"id": "cappuccino", "nome": "Cappuccino", "prezzo": 1.8, "allergeni": [7]}
                ]},
                {"nome": "Colazione", "voci": [
                    {"id": "yogurt-frutta", "nome": "Yogurt con frutta fresca (V)",
                     "sinonimi": ["yogurt"],
                     "taglie": [{"nome": "piccolo", "prezzo": 4.0}, {"nome": "grande", "prezzo": 6.5}]},
                    {"id": "cornetto", "nome": "Cornetto", "prezzo": 1.5,
                     "sinonimi": ["croissant", "brioche"]},
                    {"id": "pain-perdu", "nome": "Pain Perdu", "prezzo": 5.5}
                ]}
            ]
        }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_simple_match_defaults_to_quantity_one() {
        let catalog = fixture();
        let items = resolve("Vorrei un cappuccino", UtteranceIntent::Add, &catalog);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_id, "cappuccino");
        assert_eq!(items[0].quantity, 1);
        assert_eq!(items[0].variant, None);
        assert!(!items[0].ambiguous_variant);
    }

    #[test]
    fn test_size_qualifier_binds_the_right_variant() {
        let catalog = fixture();
        let items = resolve(
            "Perfetto, prendo uno yogurt grande con frutta",
            UtteranceIntent::Add,
            &catalog,
        );
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_id, "yogurt-frutta");
        assert_eq!(items[0].variant.as_deref(), Some("grande"));
        assert!(!items[0].ambiguous_variant);
    }

    #[test]
    fn test_english_size_word_maps_to_italian_label() {
        let catalog = fixture();
        let items = resolve(
            "I'll have the large yogurt with fruit",
            UtteranceIntent::Add,
            &catalog,
        );
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].variant.as_deref(), Some("grande"));
    }

    #[test]
    fn test_missing_size_falls_back_to_default_and_flags_it() {
        let catalog = fixture();
        let items = resolve("Prendo uno yogurt con frutta", UtteranceIntent::Add, &catalog);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].variant.as_deref(), Some("piccolo"));
        assert!(items[0].ambiguous_variant);
    }

    #[test]
    fn test_each_item_span_gets_its_own_quantity() {
        let catalog = fixture();
        let mut items = resolve("due caffè e un cornetto", UtteranceIntent::Add, &catalog);
        items.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].item_id, "cornetto");
        assert_eq!(items[0].quantity, 1);
        assert_eq!(items[1].item_id, "espresso");
        assert_eq!(items[1].quantity, 2);
    }

    #[test]
    fn test_digit_quantity_and_plural_form() {
        let catalog = fixture();
        let items = resolve("2 cappuccini per favore", UtteranceIntent::Add, &catalog);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_id, "cappuccino");
        assert_eq!(items[0].quantity, 2);
    }

    #[test]
    fn test_synonym_matches() {
        let catalog = fixture();
        let items = resolve("un croissant per favore", UtteranceIntent::Add, &catalog);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_id, "cornetto");
    }

    #[test]
    fn test_ambiguous_name_prefers_catalog_order() {
        let catalog = fixture();
        // "caffè" alone overlaps only "Caffè espresso"; earliest listed wins
        // over any later coffee-ish entry.
        let items = resolve("un caffè per me", UtteranceIntent::Add, &catalog);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_id, "espresso");
    }

    #[test]
    fn test_question_never_resolves() {
        let catalog = fixture();
        let items = resolve(
            "Quanto costa il cappuccino?",
            UtteranceIntent::Question,
            &catalog,
        );
        assert!(items.is_empty());
    }

    #[test]
    fn test_no_match_is_an_empty_list() {
        let catalog = fixture();
        let items = resolve("una carbonara", UtteranceIntent::Add, &catalog);
        assert!(items.is_empty());
    }

    #[test]
    fn test_accented_and_plain_spelling_match() {
        let catalog = fixture();
        let items = resolve("un caffe espresso", UtteranceIntent::Add, &catalog);
        assert_eq!(items[0].item_id, "espresso");
    }
}
