//! Terminal rendering: welcome banner, menu, waiter replies, extraction
//! notes.

use owo_colors::OwoColorize;

use cameriere_common::menu::Catalog;

use crate::orchestrator::ExtractionEvent;

/// Full menu, formatted for the terminal. Also used as the structured reply
/// to the `menu` command.
pub fn format_menu(catalog: &Catalog) -> String {
    let mut out = format!("MENU - {}\n", catalog.restaurant);
    out.push_str(&"=".repeat(50));
    out.push('\n');

    for section in catalog.sections() {
        out.push_str(&format!("\n{}\n", section.name.to_uppercase()));
        out.push_str(&"-".repeat(40));
        out.push('\n');
        for item in &section.items {
            if item.has_sizes() {
                out.push_str(&format!("{}\n", item.name));
                for variant in &item.variants {
                    out.push_str(&format!("  • {}: €{:.2}\n", variant.label, variant.price));
                }
            } else {
                out.push_str(&format!(
                    "{} - €{:.2}\n",
                    item.name,
                    item.default_variant().price
                ));
            }
            if !item.description.is_empty() {
                out.push_str(&format!("  {}\n", item.description));
            }
            let mut tags = Vec::new();
            if item.vegetarian {
                tags.push("VEGETARIANO");
            }
            if item.vegan {
                tags.push("VEGANO");
            }
            if !tags.is_empty() {
                out.push_str(&format!("  [{}]\n", tags.join(", ")));
            }
            if !item.allergens.is_empty() {
                out.push_str(&format!("  Allergeni: {}\n", item.allergens.join(", ")));
            }
        }
    }

    out
}

pub fn print_welcome(restaurant: &str) {
    println!("{}", "=".repeat(60));
    println!("  CAMERIERE VIRTUALE - {restaurant}");
    println!("{}", "=".repeat(60));
    println!();
    println!("Parla con me come faresti con un vero cameriere!");
    println!();
    println!("Comandi speciali:");
    println!("  • 'menu'     - Visualizza il menu completo");
    println!("  • 'ordine'   - Visualizza il tuo ordine corrente");
    println!("  • 'conferma' - Conferma l'ordine");
    println!("  • 'reset'    - Ricomincia l'ordine da capo");
    println!("  • 'esci'     - Termina la conversazione");
    println!("{}", "=".repeat(60));
    println!();
}

pub fn print_waiter(reply: &str) {
    println!("\n{} {}\n", "Cameriere:".green().bold(), reply);
}

pub fn print_prompt() {
    use std::io::Write;
    print!("{} ", "Tu:".cyan().bold());
    let _ = std::io::stdout().flush();
}

/// One-line notes about what the extraction engine did this turn. Shown only
/// with `--debug-extraction`.
pub fn print_extraction(events: &[ExtractionEvent]) {
    for event in events {
        let line = match event {
            ExtractionEvent::Classified { intent } => format!("intento: {intent}"),
            ExtractionEvent::Added {
                name,
                variant,
                quantity,
            } => match variant {
                Some(v) => format!("aggiunto: {name} ({v}) x{quantity}"),
                None => format!("aggiunto: {name} x{quantity}"),
            },
            ExtractionEvent::AssumedVariant { name, variant } => {
                format!("taglia non specificata per {name}, assunta '{variant}'")
            }
            ExtractionEvent::Removed { name } => format!("rimosso: {name}"),
            ExtractionEvent::NotRemoved { fragment, .. } => {
                format!("niente da rimuovere per: {fragment}")
            }
            ExtractionEvent::NothingMatched { suggestions } => {
                if suggestions.is_empty() {
                    "nessun piatto riconosciuto".to_string()
                } else {
                    format!("nessun piatto riconosciuto (forse: {})", suggestions.join(", "))
                }
            }
            ExtractionEvent::PreferenceNoted { detail } => format!("preferenza: {detail}"),
        };
        println!("  {} {}", "›".dimmed(), line.dimmed());
    }
}
