//! Lexical intent classification for customer utterances.
//!
//! Deterministic keyword rules, not the LLM: the small local models this
//! system runs against are unreliable at structured intent output, so
//! ordering intent is detected here and the generation backend only writes
//! the waiter's reply.
//!
//! Keyword sets are bilingual (Italian first, English equivalents) the same
//! way the rest of the conversational surface accepts both locales.

use serde::{Deserialize, Serialize};

use crate::matcher::{cardinal, fold};

/// What a single customer utterance is trying to do to the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtteranceIntent {
    /// The customer wants something added to the order.
    Add,
    /// The customer wants an item taken off the order.
    Remove,
    /// The customer wants to swap an ordered item or variant.
    Modify,
    /// A question about the menu (price, ingredients, recommendations).
    Question,
    /// Chatter with no order consequence.
    Neutral,
}

impl std::fmt::Display for UtteranceIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Modify => "modify",
            Self::Question => "question",
            Self::Neutral => "neutral",
        };
        write!(f, "{s}")
    }
}

/// Question markers. Checked first: a question about a dish must never turn
/// into an order for it, even when an ordering verb appears earlier in the
/// same utterance.
const QUESTION_MARKERS: &[&str] = &[
    "quanto costa",
    "quanto costano",
    "quanto viene",
    "cos'e",
    "cos e",
    "cosa e",
    "che cos",
    "cosa contiene",
    "cosa c'e dentro",
    "che significa",
    "cosa significa",
    "come e fatto",
    "com'e",
    "che differenza",
    "mi puoi dire",
    "mi sa dire",
    "cosa mi consigli",
    "cosa consigli",
    "consigliami",
    "cosa mi suggerisci",
    "how much",
    "what is",
    "what's",
    "whats",
    "what does",
    "what do you recommend",
    "can you tell me",
    "any recommendations",
    "what would you suggest",
];

const MODIFY_MARKERS: &[&str] = &[
    "invece di",
    "invece del",
    "invece della",
    "al posto di",
    "al posto del",
    "al posto della",
    "cambia",
    "cambiami",
    "sostituisci",
    "instead of",
    "swap",
    "change the",
    "replace the",
];

const REMOVE_MARKERS: &[&str] = &[
    "togli",
    "togliere",
    "rimuovi",
    "rimuovere",
    "leva",
    "levami",
    "cancella",
    "annulla il",
    "annulla la",
    "niente piu",
    "non voglio piu",
    "remove",
    "take off",
    "drop the",
    "cancel the",
    "forget the",
];

const ADD_MARKERS: &[&str] = &[
    "prendo",
    "prendiamo",
    "vorrei",
    "vorremmo",
    "ordino",
    "ordiniamo",
    "portami",
    "mi porta",
    "mi porti",
    "ci porti",
    "dammi",
    "voglio",
    "aggiungi",
    "anche un",
    "anche una",
    "anche uno",
    "e poi",
    "per me",
    "i'll have",
    "i will have",
    "ill have",
    "i'd like",
    "i would like",
    "i'll take",
    "i'll get",
    "we'll have",
    "give me",
    "get me",
    "bring me",
    "i want",
    "can i get",
    "could i get",
    "and then",
    "also a",
    "also an",
    "add ",
];

/// Articles that carry weak ordering evidence when no explicit keyword is
/// present ("un cappuccino, grazie").
const INDEFINITE_ARTICLES: &[&str] = &["un", "una", "uno", "a", "an"];

/// Words that never count as the noun phrase after an article.
const ARTICLE_STOPWORDS: &[&str] = &[
    "po", "attimo", "momento", "secondo", "altra", "altro", "favore", "piacere", "bit", "moment",
    "second", "little", "lot", "few",
];

/// Classify one customer utterance.
///
/// Tie-break rule: question markers win over any co-occurring order keyword,
/// so "vorrei sapere quanto costa il risotto" stays a question.
pub fn classify(utterance: &str) -> UtteranceIntent {
    let u = fold(utterance);

    if contains_marker(&u, QUESTION_MARKERS) {
        return UtteranceIntent::Question;
    }
    if contains_marker(&u, MODIFY_MARKERS) {
        return UtteranceIntent::Modify;
    }
    if contains_marker(&u, REMOVE_MARKERS) {
        return UtteranceIntent::Remove;
    }
    if contains_marker(&u, ADD_MARKERS) {
        return UtteranceIntent::Add;
    }

    UtteranceIntent::Neutral
}

/// Weak ADD evidence: an indefinite article or a count word immediately
/// before a noun-ish word ("un cappuccino, grazie" / "due cappuccini"), with
/// no explicit keyword anywhere. The caller must only act on this when the
/// menu matcher also finds a concrete item.
pub fn weak_add_evidence(utterance: &str) -> bool {
    if classify(utterance) != UtteranceIntent::Neutral {
        return false;
    }
    let u = fold(utterance);
    let words: Vec<&str> = u
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .collect();

    words.windows(2).any(|pair| {
        (INDEFINITE_ARTICLES.contains(&pair[0]) || cardinal(pair[0]).is_some())
            && pair[1].len() >= 3
            && !ARTICLE_STOPWORDS.contains(&pair[1])
    })
}

/// Match markers against the folded utterance. Multi-word markers use
/// substring containment; single words must match a whole word so "prendo"
/// never fires inside an unrelated token.
fn contains_marker(folded: &str, markers: &[&str]) -> bool {
    markers.iter().any(|marker| {
        if marker.contains(' ') || marker.contains('\'') {
            folded.contains(marker)
        } else {
            folded
                .split(|c: char| !c.is_alphanumeric())
                .any(|w| w == *marker)
        }
    })
}
