//! End-to-end session tests over the scripted generation backend: a whole
//! turn through intent classification, menu matching and the order ledger,
//! without any network.

use std::sync::Arc;

use cameriere::llm_client::{LlmBackend, ScriptedBackend, ScriptedStep};
use cameriere::orchestrator::{ExtractionEvent, ReplySource, Session};

use cameriere_common::config::{LlmConfig, ProviderKind};
use cameriere_common::menu::Catalog;
use cameriere_common::prompts;
use cameriere_common::transcript::Role;

const MENU: &str = r#"{
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
            {"id": "cornetto", "nome": "Cornetto", "prezzo": 1.5, "sinonimi": ["croissant"]},
            {"id": "pain-perdu", "nome": "Pain Perdu", "prezzo": 5.5, "allergeni": [1, 7]}
        ]},
        {"nome": "Bistrot", "voci": [
            {"id": "risotto", "nome": "Risotto ai funghi", "prezzo": 12.5}
        ]}
    ]
}"#;

fn scripted_session(steps: Vec<ScriptedStep>) -> Session {
    let catalog = Arc::new(Catalog::from_json(MENU).expect("fixture menu parses"));
    let config = LlmConfig {
        provider: ProviderKind::Scripted,
        ..Default::default()
    };
    Session::new(
        catalog,
        LlmBackend::Scripted(ScriptedBackend::new(steps)),
        config,
    )
}

fn reply(text: &str) -> ScriptedStep {
    ScriptedStep::Reply(text.to_string())
}

#[tokio::test]
async fn test_ordering_turn_updates_order_and_records_history() {
    let mut session = scripted_session(vec![reply("Ottima scelta! Un cappuccino in arrivo.")]);

    let result = session.handle_turn("Vorrei un cappuccino").await;

    assert_eq!(result.source, ReplySource::Generated);
    assert_eq!(result.reply, "Ottima scelta! Un cappuccino in arrivo.");
    assert_eq!(result.order.lines.len(), 1);
    assert_eq!(result.order.lines[0].item_id, "cappuccino");
    assert_eq!(result.order.total, 1.8);

    let history = session.export_history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::Customer);
    assert_eq!(history[0].text, "Vorrei un cappuccino");
    assert_eq!(history[1].role, Role::Waiter);
}

#[tokio::test]
async fn test_question_about_a_dish_never_becomes_an_order() {
    let mut session = scripted_session(vec![reply("Il risotto costa €12.50.")]);

    let result = session.handle_turn("Quanto costa il risotto?").await;

    assert!(result.order.lines.is_empty());
    assert!(result
        .extraction
        .iter()
        .any(|e| matches!(e, ExtractionEvent::Classified { intent } if intent.to_string() == "question")));
}

#[tokio::test]
async fn test_info_questions_then_orders() {
    // The original regression scenario: informational questions must leave
    // the order alone, explicit orders must land.
    let mut session = scripted_session(vec![
        reply("r1"),
        reply("r2"),
        reply("r3"),
        reply("r4"),
        reply("r5"),
    ]);

    session.handle_turn("Cos'è il Pain Perdu?").await;
    session.handle_turn("Quanto costa il cappuccino?").await;
    session
        .handle_turn("Mi puoi dire cosa contiene lo yogurt?")
        .await;
    assert!(session.order().is_empty());

    session.handle_turn("Vorrei un cappuccino").await;
    let result = session.handle_turn("Prendo il Pain Perdu").await;
    assert_eq!(result.order.lines.len(), 2);
}

#[tokio::test]
async fn test_generation_failure_keeps_extraction_but_records_no_turn() {
    let mut session = scripted_session(vec![ScriptedStep::Fail("provider down".to_string())]);

    let result = session.handle_turn("Vorrei un cappuccino").await;

    // Extraction is independent of the provider: the order still updated.
    assert_eq!(result.source, ReplySource::Fallback);
    assert_eq!(result.reply, prompts::FALLBACK_REPLY);
    assert_eq!(result.order.lines.len(), 1);

    // But the failed turn is not recorded: no partial conversation.
    assert!(session.export_history().is_empty());
}

#[tokio::test]
async fn test_generation_failure_leaves_ledger_untouched_by_the_call() {
    let mut session = scripted_session(vec![
        reply("Un cappuccino in arrivo."),
        ScriptedStep::Fail("timeout".to_string()),
    ]);

    session.handle_turn("Vorrei un cappuccino").await;
    let before = session.order().clone();
    let history_len = session.export_history().len();

    // Neutral chatter: extraction does nothing, generation fails.
    let result = session.handle_turn("Che bel posto!").await;

    assert_eq!(result.source, ReplySource::Fallback);
    assert_eq!(session.order(), &before);
    assert_eq!(session.export_history().len(), history_len);
}

#[tokio::test]
async fn test_special_commands_bypass_the_generation_backend() {
    // The script holds a single failure step; if any command consumed a
    // generation call, the following real turn could not fail with it.
    let mut session = scripted_session(vec![ScriptedStep::Fail("must survive".to_string())]);

    let menu_reply = session.handle_turn("menu").await;
    assert_eq!(menu_reply.source, ReplySource::Command);
    assert!(menu_reply.reply.contains("Cappuccino"));

    let order_reply = session.handle_turn("ordine").await;
    assert_eq!(order_reply.source, ReplySource::Command);
    assert_eq!(order_reply.reply, "Nessun ordine ancora.");

    // Commands recorded no history and consumed no script step.
    assert!(session.export_history().is_empty());
    let result = session.handle_turn("Che bel posto!").await;
    assert_eq!(result.source, ReplySource::Fallback);
}

#[tokio::test]
async fn test_reset_clears_order_but_not_history() {
    let mut session = scripted_session(vec![reply("Subito!")]);

    session.handle_turn("Prendo un risotto").await;
    assert!(!session.order().is_empty());
    assert_eq!(session.export_history().len(), 2);

    let result = session.handle_turn("reset").await;
    assert!(result.order.lines.is_empty());
    assert_eq!(result.order.total, 0.0);
    assert_eq!(session.export_history().len(), 2);
}

#[tokio::test]
async fn test_two_items_with_independent_quantities() {
    let mut session = scripted_session(vec![reply("Arrivano!")]);

    let result = session.handle_turn("due caffè e un cornetto").await;

    let mut lines = result.order.lines.clone();
    lines.sort_by(|a, b| a.item_id.cmp(&b.item_id));
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].item_id, "cornetto");
    assert_eq!(lines[0].quantity, 1);
    assert_eq!(lines[1].item_id, "espresso");
    assert_eq!(lines[1].quantity, 2);
}

#[tokio::test]
async fn test_size_qualifier_binds_variant_end_to_end() {
    let mut session = scripted_session(vec![reply("Ottimo!")]);

    let result = session
        .handle_turn("Perfetto, prendo uno yogurt grande con frutta")
        .await;

    assert_eq!(result.order.lines.len(), 1);
    assert_eq!(result.order.lines[0].variant.as_deref(), Some("grande"));
    assert_eq!(result.order.lines[0].unit_price, 6.5);
    assert!(!result
        .extraction
        .iter()
        .any(|e| matches!(e, ExtractionEvent::AssumedVariant { .. })));
}

#[tokio::test]
async fn test_missing_size_is_flagged_for_confirmation() {
    let mut session = scripted_session(vec![reply("Ottimo!")]);

    let result = session.handle_turn("Prendo uno yogurt").await;

    assert_eq!(result.order.lines[0].variant.as_deref(), Some("piccolo"));
    assert!(result
        .extraction
        .iter()
        .any(|e| matches!(e, ExtractionEvent::AssumedVariant { .. })));
}

#[tokio::test]
async fn test_weak_article_adds_only_with_a_menu_match() {
    let mut session = scripted_session(vec![reply("Subito!"), reply("Certo.")]);

    // No keyword, but an article plus a real dish: weak evidence acts.
    let result = session.handle_turn("Un cappuccino, grazie").await;
    assert_eq!(result.order.lines.len(), 1);

    // Article plus a non-dish: nothing happens.
    let result = session.handle_turn("Un attimo per favore").await;
    assert_eq!(result.order.lines.len(), 1);
}

#[tokio::test]
async fn test_remove_turn_and_not_found_outcome() {
    let mut session = scripted_session(vec![reply("Aggiunti!"), reply("Tolto."), reply("Mi spiace.")]);

    session.handle_turn("Prendo un risotto e un cappuccino").await;

    let result = session.handle_turn("Togli il risotto").await;
    assert!(result
        .extraction
        .iter()
        .any(|e| matches!(e, ExtractionEvent::Removed { name } if name.contains("Risotto"))));
    assert_eq!(result.order.lines.len(), 1);
    assert_eq!(result.order.lines[0].item_id, "cappuccino");

    // Removing something not on the order reports the miss, never errors.
    let result = session.handle_turn("Togli la pizza").await;
    assert!(result
        .extraction
        .iter()
        .any(|e| matches!(e, ExtractionEvent::NotRemoved { .. })));
    assert_eq!(result.order.lines.len(), 1);
}

#[tokio::test]
async fn test_modify_replaces_the_old_line() {
    let mut session = scripted_session(vec![reply("Certo!"), reply("Fatto.")]);

    session.handle_turn("Vorrei un cappuccino").await;
    let result = session
        .handle_turn("Invece del cappuccino prendo un caffè espresso")
        .await;

    assert_eq!(result.order.lines.len(), 1);
    assert_eq!(result.order.lines[0].item_id, "espresso");
}

#[tokio::test]
async fn test_confirm_command() {
    let mut session = scripted_session(vec![reply("Subito!")]);

    let result = session.handle_turn("conferma").await;
    assert!(result.reply.contains("Non hai ancora ordinato"));

    session.handle_turn("Prendo un risotto").await;
    let result = session.handle_turn("conferma").await;
    assert_eq!(result.source, ReplySource::Command);
    assert!(result.reply.contains("Ordine confermato"));
    assert!(result.reply.contains("Risotto ai funghi"));
}

#[tokio::test]
async fn test_exported_transcript_is_ordered_json() {
    let mut session = scripted_session(vec![reply("Benvenuto!"), reply("Subito!")]);

    session.handle_turn("Buonasera").await;
    session.handle_turn("Vorrei un cappuccino").await;

    let json = session.export_history_json().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    let turns = parsed.as_array().unwrap();
    assert_eq!(turns.len(), 4);
    assert_eq!(turns[0]["role"], "customer");
    assert_eq!(turns[0]["text"], "Buonasera");
    assert_eq!(turns[1]["role"], "waiter");
    assert_eq!(turns[3]["role"], "waiter");
    assert!(turns[0]["timestamp"].is_string());
}

#[tokio::test]
async fn test_adding_twice_merges_the_line() {
    let mut session = scripted_session(vec![reply("Uno!"), reply("Due!")]);

    session.handle_turn("Vorrei un cappuccino").await;
    let result = session.handle_turn("E poi anche un cappuccino").await;

    assert_eq!(result.order.lines.len(), 1);
    assert_eq!(result.order.lines[0].quantity, 2);
    assert_eq!(result.order.total, 3.6);
}

#[tokio::test]
async fn test_preferences_are_noted_and_survive_turns() {
    let mut session = scripted_session(vec![reply("Capito."), reply("Certo.")]);

    let result = session.handle_turn("Sono vegetariano e allergico al glutine").await;
    assert!(result
        .extraction
        .iter()
        .any(|e| matches!(e, ExtractionEvent::PreferenceNoted { .. })));
    assert!(result.order.preferences.vegetarian);
    assert!(result.order.preferences.allergies.contains(&"glutine".to_string()));

    // Still known on the next turn.
    let result = session.handle_turn("Vorrei un cappuccino").await;
    assert!(result.order.preferences.vegetarian);
}
