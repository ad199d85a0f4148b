//! Menu catalog: loading, normalization and search.
//!
//! Accepts two menu description shapes on disk and normalizes both into a
//! single canonical catalog at load time:
//!
//! - legacy: flat `categorie` map, one price per item
//! - current: `sezioni`/`voci` lists, items may carry `taglie` size variants
//!   and numeric allergen codes resolved through `allergeni_legend`
//!
//! The schema distinction is not carried past the loader. The catalog is
//! built once at startup, read only afterwards; `reload` replaces it
//! wholesale.

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::error::WaiterError;
use crate::matcher::{fold, tokenize};

/// Label given to the single price of an item without declared sizes.
pub const DEFAULT_VARIANT_LABEL: &str = "normale";

/// One size/price entry of a menu item. Single-price items get exactly one
/// entry labeled [`DEFAULT_VARIANT_LABEL`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceVariant {
    pub label: String,
    pub price: f64,
}

/// A single dish or drink. Immutable after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    /// Unique across the whole catalog regardless of section.
    pub id: String,
    pub name: String,
    pub description: String,
    pub section: String,
    /// First entry is the default variant.
    pub variants: Vec<PriceVariant>,
    /// Allergen names, already resolved through the legend.
    pub allergens: Vec<String>,
    pub vegetarian: bool,
    pub vegan: bool,
    /// Free-text persuasive note shown in suggestions.
    pub note: String,
    pub synonyms: Vec<String>,
}

impl MenuItem {
    pub fn default_variant(&self) -> &PriceVariant {
        &self.variants[0]
    }

    /// True when the item declares real size variants.
    pub fn has_sizes(&self) -> bool {
        self.variants.len() > 1
    }

    /// Case-insensitive variant lookup by label.
    pub fn variant(&self, label: &str) -> Option<&PriceVariant> {
        let wanted = fold(label);
        self.variants.iter().find(|v| fold(&v.label) == wanted)
    }

    /// Cheapest price across variants, used by the max-price filter.
    pub fn min_price(&self) -> f64 {
        self.variants
            .iter()
            .map(|v| v.price)
            .fold(f64::INFINITY, f64::min)
    }
}

/// One named menu section, in display order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub items: Vec<MenuItem>,
}

/// Filters for [`Catalog::search`].
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub vegetarian: bool,
    pub vegan: bool,
    pub max_price: Option<f64>,
    /// Allergen names to exclude, case-insensitive.
    pub exclude_allergens: Vec<String>,
    pub section: Option<String>,
}

/// The normalized menu. Read-only after construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub restaurant: String,
    sections: Vec<Section>,
    /// Numeric allergen code -> name, kept for display.
    legend: BTreeMap<String, String>,
}

impl Catalog {
    /// Load and normalize a menu description file (either schema).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WaiterError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&raw)?;
        info!(
            "Loaded menu '{}' from {}: {} sections, {} items",
            catalog.restaurant,
            path.display(),
            catalog.sections.len(),
            catalog.len()
        );
        Ok(catalog)
    }

    /// Parse a menu description from JSON text (either schema).
    pub fn from_json(raw: &str) -> Result<Self, WaiterError> {
        let file: RawMenuFile = serde_json::from_str(raw)
            .map_err(|e| WaiterError::MalformedMenu(format!("invalid JSON: {e}")))?;

        let legend = file.allergeni_legend;
        let restaurant = file
            .ristorante
            .unwrap_or_else(|| "Ristorante".to_string());

        let raw_sections: Vec<(String, Vec<RawItem>)> = if !file.sezioni.is_empty() {
            file.sezioni
                .into_iter()
                .map(|s| (s.nome, s.voci))
                .collect()
        } else if !file.categorie.is_empty() {
            file.categorie
        } else {
            return Err(WaiterError::MalformedMenu(
                "menu has neither 'sezioni' nor 'categorie'".to_string(),
            ));
        };

        let mut seen_ids = std::collections::BTreeSet::new();
        let mut sections = Vec::with_capacity(raw_sections.len());

        for (section_name, voci) in raw_sections {
            let mut items = Vec::with_capacity(voci.len());
            for voce in voci {
                let item = normalize_item(voce, &section_name, &legend)?;
                if !seen_ids.insert(item.id.clone()) {
                    return Err(WaiterError::MalformedMenu(format!(
                        "duplicate item id '{}'",
                        item.id
                    )));
                }
                items.push(item);
            }
            sections.push(Section {
                name: section_name,
                items,
            });
        }

        Ok(Catalog {
            restaurant,
            sections,
            legend,
        })
    }

    /// Replace the catalog wholesale from a menu file. Never leaves the
    /// catalog partially mutated: on error the old contents stay.
    pub fn reload(&mut self, path: impl AsRef<Path>) -> Result<(), WaiterError> {
        *self = Self::load(path)?;
        Ok(())
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// All items in catalog (display) order.
    pub fn items(&self) -> impl Iterator<Item = &MenuItem> {
        self.sections.iter().flat_map(|s| s.items.iter())
    }

    pub fn len(&self) -> usize {
        self.sections.iter().map(|s| s.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &str) -> Option<&MenuItem> {
        self.items().find(|i| i.id == id)
    }

    /// Resolve numeric allergen codes through the legend.
    pub fn allergen_names(&self, codes: &[u32]) -> Vec<String> {
        codes
            .iter()
            .map(|c| {
                self.legend
                    .get(&c.to_string())
                    .cloned()
                    .unwrap_or_else(|| format!("Allergene {c}"))
            })
            .collect()
    }

    /// Case-insensitive substring and token-overlap search across item names
    /// and descriptions. Ranked candidates; no match is an empty list.
    pub fn find_by_text(&self, fragment: &str) -> Vec<&MenuItem> {
        let frag = fold(fragment.trim());
        if frag.is_empty() {
            return Vec::new();
        }
        let frag_tokens = tokenize(&frag);

        let mut scored: Vec<(u32, usize, &MenuItem)> = Vec::new();
        for (idx, item) in self.items().enumerate() {
            let name = fold(&item.name);
            let mut score = 0u32;
            if name == frag {
                score += 100;
            }
            if name.contains(&frag) || frag.contains(&name) {
                score += 40;
            }
            let name_tokens = tokenize(&name);
            let synonym_tokens: Vec<String> =
                item.synonyms.iter().flat_map(|s| tokenize(&fold(s))).collect();
            for t in &frag_tokens {
                if name_tokens.contains(t) || synonym_tokens.contains(t) {
                    score += 10;
                } else if tokenize(&fold(&item.description)).contains(t) {
                    score += 2;
                }
            }
            if score > 0 {
                scored.push((score, idx, item));
            }
        }

        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.into_iter().map(|(_, _, item)| item).collect()
    }

    /// Filtered search in catalog order. An empty query matches everything
    /// that passes the filters.
    pub fn search(&self, query: &str, filters: &SearchFilters) -> Vec<&MenuItem> {
        let q = fold(query.trim());
        self.items()
            .filter(|item| {
                if filters.vegetarian && !item.vegetarian {
                    return false;
                }
                if filters.vegan && !item.vegan {
                    return false;
                }
                if let Some(max) = filters.max_price {
                    if item.min_price() > max {
                        return false;
                    }
                }
                if let Some(section) = &filters.section {
                    if fold(&item.section) != fold(section) {
                        return false;
                    }
                }
                for excluded in &filters.exclude_allergens {
                    let ex = fold(excluded);
                    if item.allergens.iter().any(|a| fold(a) == ex) {
                        return false;
                    }
                }
                if q.is_empty() {
                    return true;
                }
                fold(&item.name).contains(&q) || fold(&item.description).contains(&q)
            })
            .collect()
    }

    /// Compact menu text for the waiter's system prompt.
    pub fn format_for_llm(&self) -> String {
        let mut text = format!("MENU - {}\n", self.restaurant);
        for section in &self.sections {
            text.push_str(&format!("\n{}:\n", section.name.to_uppercase()));
            for item in &section.items {
                if item.has_sizes() {
                    let sizes = item
                        .variants
                        .iter()
                        .map(|v| format!("{}: €{:.2}", v.label, v.price))
                        .collect::<Vec<_>>()
                        .join(" | ");
                    text.push_str(&format!("- {}: {}", item.name, sizes));
                } else {
                    text.push_str(&format!(
                        "- {} (€{:.2})",
                        item.name,
                        item.default_variant().price
                    ));
                }
                if !item.description.is_empty() {
                    text.push_str(&format!(": {}", item.description));
                }
                let mut tags = Vec::new();
                if item.vegetarian {
                    tags.push("VEGETARIANO");
                }
                if item.vegan {
                    tags.push("VEGANO");
                }
                if !tags.is_empty() {
                    text.push_str(&format!(" [{}]", tags.join(", ")));
                }
                if !item.allergens.is_empty() {
                    text.push_str(&format!(" | Allergeni: {}", item.allergens.join(", ")));
                }
                text.push('\n');
            }
        }
        text
    }
}

// ---------------------------------------------------------------------------
// Raw on-disk shapes, normalized away at load time.
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawMenuFile {
    #[serde(default)]
    ristorante: Option<String>,
    #[serde(default)]
    allergeni_legend: BTreeMap<String, String>,
    /// Current schema.
    #[serde(default)]
    sezioni: Vec<RawSection>,
    /// Legacy schema; document order preserved.
    #[serde(default, deserialize_with = "ordered_categories")]
    categorie: Vec<(String, Vec<RawItem>)>,
}

#[derive(Deserialize)]
struct RawSection {
    nome: String,
    #[serde(default)]
    voci: Vec<RawItem>,
}

#[derive(Deserialize)]
struct RawItem {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    nome: Option<String>,
    #[serde(default)]
    prezzo: Option<f64>,
    #[serde(default)]
    taglie: Vec<RawVariant>,
    #[serde(default)]
    descrizione: String,
    #[serde(default)]
    allergeni: Vec<RawAllergen>,
    #[serde(default)]
    vegetariano: bool,
    #[serde(default)]
    vegano: bool,
    #[serde(default)]
    suggerimenti: String,
    #[serde(default)]
    sinonimi: Vec<String>,
}

#[derive(Deserialize)]
struct RawVariant {
    nome: String,
    prezzo: f64,
}

/// Legacy menus list allergens by name, current ones by numeric code.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawAllergen {
    Code(u32),
    Name(String),
}

fn normalize_item(
    voce: RawItem,
    section: &str,
    legend: &BTreeMap<String, String>,
) -> Result<MenuItem, WaiterError> {
    let name = match voce.nome {
        Some(n) if !n.trim().is_empty() => n,
        _ => {
            return Err(WaiterError::MalformedMenu(format!(
                "item without a name in section '{section}'"
            )))
        }
    };

    let variants: Vec<PriceVariant> = if !voce.taglie.is_empty() {
        voce.taglie
            .into_iter()
            .map(|t| PriceVariant {
                label: t.nome,
                price: t.prezzo,
            })
            .collect()
    } else if let Some(prezzo) = voce.prezzo {
        vec![PriceVariant {
            label: DEFAULT_VARIANT_LABEL.to_string(),
            price: prezzo,
        }]
    } else {
        return Err(WaiterError::MalformedMenu(format!(
            "item '{name}' has no price and no size variants"
        )));
    };

    let allergens = voce
        .allergeni
        .into_iter()
        .map(|a| match a {
            RawAllergen::Code(c) => legend
                .get(&c.to_string())
                .cloned()
                .unwrap_or_else(|| format!("Allergene {c}")),
            RawAllergen::Name(n) => n,
        })
        .collect();

    Ok(MenuItem {
        id: voce.id.unwrap_or_else(|| name.clone()),
        vegetarian: name.contains("(V)") || voce.vegetariano,
        vegan: name.contains("(VG)") || voce.vegano,
        name,
        description: voce.descrizione,
        section: section.to_string(),
        variants,
        allergens,
        note: voce.suggerimenti,
        synonyms: voce.sinonimi,
    })
}

/// Deserialize a JSON object into a Vec of pairs, preserving document order.
fn ordered_categories<'de, D>(de: D) -> Result<Vec<(String, Vec<RawItem>)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedMap;

    impl<'de> Visitor<'de> for OrderedMap {
        type Value = Vec<(String, Vec<RawItem>)>;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("a map of category name to item list")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut out = Vec::new();
            while let Some(entry) = map.next_entry()? {
                out.push(entry);
            }
            Ok(out)
        }
    }

    de.deserialize_map(OrderedMap)
}
