//! Customer dietary preferences: lexical detection and formatting.
//!
//! Preferences are detected from the customer's own words and remembered on
//! the order for the whole session, so the waiter prompt can filter
//! suggestions without asking twice.

use serde::{Deserialize, Serialize};

use crate::matcher::fold;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpicePref {
    Yes,
    No,
}

/// Preference flags owned by the order, cleared on reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerPreferences {
    pub vegetarian: bool,
    pub vegan: bool,
    /// Allergy/intolerance names as the customer stated them.
    pub allergies: Vec<String>,
    pub spice: Option<SpicePref>,
    /// Budget ceiling in EUR, when the customer mentions one.
    pub budget: Option<f64>,
    pub notes: String,
}

/// One detected preference signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceSignal {
    Vegetarian,
    Vegan,
    Allergy(String),
    Spice(SpicePref),
    Budget(f64),
}

impl std::fmt::Display for PreferenceSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vegetarian => write!(f, "vegetariano"),
            Self::Vegan => write!(f, "vegano"),
            Self::Allergy(a) => write!(f, "allergia: {a}"),
            Self::Spice(SpicePref::Yes) => write!(f, "piccante: sì"),
            Self::Spice(SpicePref::No) => write!(f, "piccante: no"),
            Self::Budget(b) => write!(f, "budget: €{b:.2}"),
        }
    }
}

impl CustomerPreferences {
    pub fn has_restrictions(&self) -> bool {
        self.vegetarian || self.vegan || !self.allergies.is_empty()
    }

    /// One-line summary for the waiter prompt and order footers.
    pub fn format_for_waiter(&self) -> String {
        let mut parts = Vec::new();
        if self.vegetarian {
            parts.push("vegetariano".to_string());
        }
        if self.vegan {
            parts.push("vegano".to_string());
        }
        if !self.allergies.is_empty() {
            parts.push(format!("intolleranze: {}", self.allergies.join(", ")));
        }
        match self.spice {
            Some(SpicePref::Yes) => parts.push("gradisce piccante".to_string()),
            Some(SpicePref::No) => parts.push("niente piccante".to_string()),
            None => {}
        }
        if let Some(budget) = self.budget {
            parts.push(format!("budget €{budget:.2}"));
        }
        if !self.notes.is_empty() {
            parts.push(format!("note: {}", self.notes));
        }
        if parts.is_empty() {
            "nessuna preferenza specifica".to_string()
        } else {
            parts.join(" | ")
        }
    }

    /// Fold a detected signal into the stored flags. Duplicate allergies are
    /// kept unique.
    pub fn absorb(&mut self, signal: &PreferenceSignal) {
        match signal {
            PreferenceSignal::Vegetarian => self.vegetarian = true,
            PreferenceSignal::Vegan => self.vegan = true,
            PreferenceSignal::Allergy(a) => {
                if !self.allergies.iter().any(|x| fold(x) == fold(a)) {
                    self.allergies.push(a.clone());
                }
            }
            PreferenceSignal::Spice(p) => self.spice = Some(*p),
            PreferenceSignal::Budget(b) => self.budget = Some(*b),
        }
    }
}

/// Allergen words recognized next to an allergy/intolerance mention.
const ALLERGEN_WORDS: &[&str] = &[
    "glutine", "lattosio", "uova", "solfiti", "noci", "arachidi", "pesce", "crostacei", "soia",
    "sesamo", "gluten", "lactose", "eggs", "nuts", "peanuts", "shellfish", "soy",
];

/// Words announcing that allergen names are about to follow.
const ALLERGY_CONTEXT: &[&str] = &[
    "allergi", "intolleran", "celiac", "allergic", "intolerant", "senza",
];

const BUDGET_MARKERS: &[&str] = &["massimo", "budget", "entro", "max", "under", "spendere"];

/// Detect preference signals in one utterance. Purely lexical, like the rest
/// of the extraction path.
pub fn detect(utterance: &str) -> Vec<PreferenceSignal> {
    let u = fold(utterance);
    let words: Vec<&str> = u
        .split(|c: char| !c.is_alphanumeric() && c != ',' && c != '.')
        .filter(|w| !w.is_empty())
        .collect();
    let mut signals = Vec::new();

    if u.contains("vegetarian") {
        signals.push(PreferenceSignal::Vegetarian);
    }
    if u.contains("vegan") {
        signals.push(PreferenceSignal::Vegan);
    }

    if ALLERGY_CONTEXT.iter().any(|c| u.contains(c)) {
        for allergen in ALLERGEN_WORDS {
            if u.contains(allergen) {
                signals.push(PreferenceSignal::Allergy((*allergen).to_string()));
            }
        }
    }

    if u.contains("piccante") || u.contains("spicy") {
        let negated = ["non ", "senza ", "niente ", "not ", "no "]
            .iter()
            .any(|n| u.contains(n));
        signals.push(PreferenceSignal::Spice(if negated {
            SpicePref::No
        } else {
            SpicePref::Yes
        }));
    }

    // "massimo 20 euro", "stay under 30": a number within reach of a marker.
    'budget: for (i, word) in words.iter().enumerate() {
        if BUDGET_MARKERS.iter().any(|m| word.starts_with(m)) {
            for next in words.iter().skip(i + 1).take(3) {
                let cleaned: String = next.chars().filter(|c| c.is_ascii_digit()).collect();
                if let Ok(amount) = cleaned.parse::<f64>() {
                    if amount > 0.0 {
                        signals.push(PreferenceSignal::Budget(amount));
                        break 'budget;
                    }
                }
            }
        }
    }

    signals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_vegetarian_and_vegan() {
        assert_eq!(detect("Sono vegetariano"), vec![PreferenceSignal::Vegetarian]);
        let signals = detect("siamo vegani");
        assert!(signals.contains(&PreferenceSignal::Vegan));
    }

    #[test]
    fn test_detect_allergy_needs_context() {
        let signals = detect("Sono allergico al glutine");
        assert_eq!(signals, vec![PreferenceSignal::Allergy("glutine".to_string())]);
        // Mentioning an allergen without allergy context is not a restriction.
        assert!(detect("il pane ha glutine?").is_empty());
    }

    #[test]
    fn test_detect_spice_negation() {
        assert_eq!(
            detect("niente piccante per favore"),
            vec![PreferenceSignal::Spice(SpicePref::No)]
        );
        assert_eq!(
            detect("mi piace piccante"),
            vec![PreferenceSignal::Spice(SpicePref::Yes)]
        );
    }

    #[test]
    fn test_detect_budget() {
        assert_eq!(
            detect("vorrei spendere massimo 25 euro"),
            vec![PreferenceSignal::Budget(25.0)]
        );
    }

    #[test]
    fn test_absorb_deduplicates_allergies() {
        let mut prefs = CustomerPreferences::default();
        prefs.absorb(&PreferenceSignal::Allergy("glutine".to_string()));
        prefs.absorb(&PreferenceSignal::Allergy("Glutine".to_string()));
        assert_eq!(prefs.allergies.len(), 1);
        assert!(prefs.has_restrictions());
    }

    #[test]
    fn test_format_for_waiter() {
        let mut prefs = CustomerPreferences::default();
        assert_eq!(prefs.format_for_waiter(), "nessuna preferenza specifica");
        prefs.absorb(&PreferenceSignal::Vegetarian);
        prefs.absorb(&PreferenceSignal::Allergy("lattosio".to_string()));
        let line = prefs.format_for_waiter();
        assert!(line.contains("vegetariano"));
        assert!(line.contains("intolleranze: lattosio"));
    }
}
