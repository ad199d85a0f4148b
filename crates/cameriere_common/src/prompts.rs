//! System prompt assembly for the waiter persona.
//!
//! The prompt carries the full menu, the customer's known preferences and
//! the current order, so the generation backend can answer menu questions
//! and confirm additions without any tool access.

use crate::menu::Catalog;
use crate::order::Order;

/// Reply used when the generation backend fails mid-turn. The order
/// extraction has already run at that point, so nothing is lost.
pub const FALLBACK_REPLY: &str =
    "Mi scuso, ho avuto un problema tecnico. Può ripetere per favore?";

/// Build the waiter system prompt for the current session state.
pub fn waiter_system_prompt(catalog: &Catalog, order: &Order) -> String {
    let menu_text = catalog.format_for_llm();
    let preferences = order.preferences.format_for_waiter();
    let order_block = if order.is_empty() {
        String::new()
    } else {
        format!("\nORDINE CORRENTE:\n{}\n", order.summary())
    };

    format!(
        r#"Sei un cameriere esperto e cordiale del ristorante "{restaurant}".

PERSONALITA':
- Amichevole, professionale e attento
- Conosci perfettamente il menu
- Dai suggerimenti personalizzati basati sulle preferenze
- Sei proattivo nel proporre abbinamenti
- Gestisci allergie e intolleranze con massima cura
- Rispondi SEMPRE in italiano

{menu_text}
PREFERENZE CLIENTE ATTUALI: {preferences}
{order_block}
REGOLE:
1. Quando il cliente ordina, conferma sempre l'aggiunta
2. Se chiede consigli, proponi 2-3 opzioni con spiegazioni
3. Ricorda sempre allergie e preferenze
4. Non inventare piatti non nel menu
5. Se qualcosa non è disponibile, proponi alternative
6. Proponi abbinamenti (vino, contorni, dolci)
7. Per domande sui piatti, spiega ingredienti e preparazione

FORMATO:
- Risposte conversazionali, calde e accoglienti
- Quando confermi un ordine, elenca cosa è stato aggiunto"#,
        restaurant = catalog.restaurant,
    )
}

/// Note appended to the system prompt when the extraction engine just
/// changed the order, so the reply confirms what actually happened instead
/// of guessing.
pub fn extraction_note(added: &[String], removed: &[String]) -> Option<String> {
    if added.is_empty() && removed.is_empty() {
        return None;
    }
    let mut parts = Vec::new();
    if !added.is_empty() {
        parts.push(format!(
            "Hai appena aggiunto all'ordine: {}. Confermalo al cliente.",
            added.join(", ")
        ));
    }
    if !removed.is_empty() {
        parts.push(format!(
            "Hai appena tolto dall'ordine: {}. Confermalo al cliente.",
            removed.join(", ")
        ));
    }
    Some(format!("\n\n[SISTEMA: {}]", parts.join(" ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::Catalog;

    #[test]
    fn test_prompt_carries_menu_and_preferences() {
        let catalog = Catalog::from_json(
            r#"{"ristorante": "Da Mario", "sezioni": [
                {"nome": "Caffetteria", "voci": [{"id": "espresso", "nome": "Caffè espresso", "prezzo": 1.2}]}
            ]}"#,
        )
        .unwrap();
        let order = Order::new();

        let prompt = waiter_system_prompt(&catalog, &order);
        assert!(prompt.contains("Da Mario"));
        assert!(prompt.contains("Caffè espresso"));
        assert!(prompt.contains("nessuna preferenza specifica"));
        assert!(!prompt.contains("ORDINE CORRENTE"));
    }

    #[test]
    fn test_extraction_note() {
        assert!(extraction_note(&[], &[]).is_none());
        let note = extraction_note(&["Cappuccino".to_string()], &[]).unwrap();
        assert!(note.contains("Cappuccino"));
    }
}
