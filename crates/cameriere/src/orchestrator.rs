//! Conversation orchestrator: one session, strictly one turn at a time.
//!
//! Each turn runs two independent tracks over the same user text: the
//! deterministic extraction engine (classify, match, mutate the ledger) and
//! the generation call that writes the waiter's reply. Extraction never
//! waits on the network, and a provider failure can neither lose order state
//! nor record a half-finished conversation turn.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use cameriere_common::config::LlmConfig;
use cameriere_common::intent::{self, UtteranceIntent};
use cameriere_common::llm::ChatMessage;
use cameriere_common::matcher;
use cameriere_common::menu::Catalog;
use cameriere_common::order::{ModifyOutcome, Order, OrderSnapshot, RemoveOutcome};
use cameriere_common::preferences;
use cameriere_common::prompts;
use cameriere_common::transcript::{ConversationHistory, ConversationTurn, Role};
use cameriere_common::WaiterError;

use crate::display;
use crate::llm_client::LlmBackend;

/// Commands intercepted before the generation backend ever sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialCommand {
    Menu,
    Order,
    Reset,
    Confirm,
    Quit,
}

impl SpecialCommand {
    /// Exact-match parse in either locale.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "menu" => Some(Self::Menu),
            "ordine" | "order" => Some(Self::Order),
            "reset" | "ricomincia" => Some(Self::Reset),
            "conferma" | "confermo" | "confirm" => Some(Self::Confirm),
            "esci" | "quit" | "exit" | "bye" | "arrivederci" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Where the reply text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    /// Written by the generation backend.
    Generated,
    /// Backend failed; the apology line was substituted.
    Fallback,
    /// Structured response to a special command.
    Command,
}

/// What the extraction engine decided for one turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionEvent {
    Classified {
        intent: UtteranceIntent,
    },
    Added {
        name: String,
        variant: Option<String>,
        quantity: u32,
    },
    /// A sized item was ordered without naming the size; the default was
    /// assumed and should be confirmed with the customer.
    AssumedVariant {
        name: String,
        variant: String,
    },
    Removed {
        name: String,
    },
    /// Nothing on the order matched a remove request.
    NotRemoved {
        fragment: String,
        suggestions: Vec<String>,
    },
    /// Ordering intent, but no menu entry matched.
    NothingMatched {
        suggestions: Vec<String>,
    },
    PreferenceNoted {
        detail: String,
    },
}

/// Result of one conversation turn.
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub reply: String,
    pub source: ReplySource,
    pub order: OrderSnapshot,
    pub extraction: Vec<ExtractionEvent>,
    pub quit: bool,
}

/// One customer conversation. Owns the order and the transcript; shares the
/// read-only catalog. No global state anywhere, so independent sessions
/// cannot observe each other.
pub struct Session {
    catalog: Arc<Catalog>,
    backend: LlmBackend,
    config: LlmConfig,
    order: Order,
    history: ConversationHistory,
}

impl Session {
    pub fn new(catalog: Arc<Catalog>, backend: LlmBackend, config: LlmConfig) -> Self {
        Self {
            catalog,
            backend,
            config,
            order: Order::new(),
            history: ConversationHistory::new(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn order(&self) -> &Order {
        &self.order
    }

    /// Full append-only conversation history.
    pub fn export_history(&self) -> &[ConversationTurn] {
        self.history.turns()
    }

    /// Ordered JSON array of `{role, text, timestamp}`.
    pub fn export_history_json(&self) -> Result<String, WaiterError> {
        self.history.to_json()
    }

    /// Opening line of the session, phrased as a first customer turn the way
    /// a host would brief a waiter.
    pub async fn greet(&mut self) -> TurnResult {
        self.handle_turn("Salve, sono appena arrivato al ristorante.").await
    }

    /// Process one customer turn.
    ///
    /// Extraction runs before the generation call and mutates the ledger on
    /// its own; the call's outcome only decides the reply text and whether
    /// the two conversation turns get recorded. A failed or timed-out call
    /// therefore leaves the ledger exactly as extraction left it and appends
    /// no partial turn.
    pub async fn handle_turn(&mut self, user_text: &str) -> TurnResult {
        let trimmed = user_text.trim();

        if let Some(command) = SpecialCommand::parse(trimmed) {
            return self.command_response(command);
        }

        let extraction = self.run_extraction(trimmed);

        let added: Vec<String> = extraction
            .iter()
            .filter_map(|e| match e {
                ExtractionEvent::Added { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect();
        let removed: Vec<String> = extraction
            .iter()
            .filter_map(|e| match e {
                ExtractionEvent::Removed { name } => Some(name.clone()),
                _ => None,
            })
            .collect();

        let mut system = prompts::waiter_system_prompt(&self.catalog, &self.order);
        if let Some(note) = prompts::extraction_note(&added, &removed) {
            system.push_str(&note);
        }

        let mut messages = vec![ChatMessage::system(system)];
        for turn in self.history.recent(self.config.history_window) {
            messages.push(match turn.role {
                Role::Customer => ChatMessage::user(turn.text.as_str()),
                Role::Waiter => ChatMessage::assistant(turn.text.as_str()),
            });
        }
        messages.push(ChatMessage::user(trimmed));

        match self
            .backend
            .generate(&messages, self.config.max_tokens, self.config.temperature)
            .await
        {
            Ok(reply) => {
                self.history.push(ConversationTurn::customer(trimmed));
                self.history.push(ConversationTurn::waiter(reply.clone()));
                TurnResult {
                    reply,
                    source: ReplySource::Generated,
                    order: self.order.snapshot(),
                    extraction,
                    quit: false,
                }
            }
            Err(e) => {
                warn!("Generation failed, serving fallback reply: {e}");
                TurnResult {
                    reply: prompts::FALLBACK_REPLY.to_string(),
                    source: ReplySource::Fallback,
                    order: self.order.snapshot(),
                    extraction,
                    quit: false,
                }
            }
        }
    }

    /// The deterministic half of the turn: preferences, intent, matching,
    /// ledger mutation. Question and neutral turns never touch the order.
    fn run_extraction(&mut self, user_text: &str) -> Vec<ExtractionEvent> {
        let mut events = Vec::new();

        for signal in preferences::detect(user_text) {
            self.order.preferences.absorb(&signal);
            events.push(ExtractionEvent::PreferenceNoted {
                detail: signal.to_string(),
            });
        }

        let intent = intent::classify(user_text);
        events.push(ExtractionEvent::Classified { intent });

        match intent {
            UtteranceIntent::Question => {}
            UtteranceIntent::Add => self.apply_add(user_text, intent, true, &mut events),
            UtteranceIntent::Neutral => {
                // An indefinite article alone is only acted on when the
                // matcher finds a concrete menu entry.
                if intent::weak_add_evidence(user_text) {
                    self.apply_add(user_text, intent, false, &mut events);
                }
            }
            UtteranceIntent::Remove => self.apply_remove(user_text, &mut events),
            UtteranceIntent::Modify => self.apply_modify(user_text, &mut events),
        }

        events
    }

    fn apply_add(
        &mut self,
        user_text: &str,
        intent: UtteranceIntent,
        report_misses: bool,
        events: &mut Vec<ExtractionEvent>,
    ) {
        let resolved = matcher::resolve(user_text, intent, &self.catalog);
        if resolved.is_empty() {
            if report_misses {
                events.push(ExtractionEvent::NothingMatched {
                    suggestions: self.menu_suggestions(user_text),
                });
            }
            return;
        }

        for candidate in resolved {
            let Some(item) = self.catalog.get(&candidate.item_id) else {
                continue;
            };
            match self
                .order
                .add(item, candidate.variant.as_deref(), candidate.quantity)
            {
                Ok(_) => {
                    events.push(ExtractionEvent::Added {
                        name: item.name.clone(),
                        variant: candidate.variant.clone(),
                        quantity: candidate.quantity,
                    });
                    if candidate.ambiguous_variant {
                        if let Some(variant) = candidate.variant {
                            events.push(ExtractionEvent::AssumedVariant {
                                name: item.name.clone(),
                                variant,
                            });
                        }
                    }
                }
                Err(e) => warn!("Skipping unaddable candidate '{}': {e}", candidate.name),
            }
        }
    }

    fn apply_remove(&mut self, user_text: &str, events: &mut Vec<ExtractionEvent>) {
        match self.order.remove(user_text) {
            RemoveOutcome::Removed(line) => events.push(ExtractionEvent::Removed {
                name: line.display_name(),
            }),
            RemoveOutcome::NotFound => events.push(ExtractionEvent::NotRemoved {
                fragment: user_text.to_string(),
                suggestions: self
                    .order
                    .lines()
                    .iter()
                    .map(|l| l.display_name())
                    .collect(),
            }),
        }
    }

    /// Modify splits the matched items into the one already on the order
    /// (the line being replaced) and the new request. When the old line
    /// cannot be identified, the new item is still added: the customer
    /// clearly wants it, and the miss is reported for clarification.
    fn apply_modify(&mut self, user_text: &str, events: &mut Vec<ExtractionEvent>) {
        let resolved = matcher::resolve(user_text, UtteranceIntent::Modify, &self.catalog);
        let (existing, fresh): (Vec<_>, Vec<_>) = resolved.into_iter().partition(|r| {
            self.order
                .lines()
                .iter()
                .any(|line| line.item_id == r.item_id)
        });

        if let Some(new_item) = fresh.first() {
            let Some(item) = self.catalog.get(&new_item.item_id) else {
                return;
            };
            let old_fragment = existing
                .first()
                .map(|r| r.name.clone())
                .unwrap_or_else(|| user_text.to_string());

            match self.order.modify(
                &old_fragment,
                item,
                new_item.variant.as_deref(),
                new_item.quantity,
            ) {
                Ok(ModifyOutcome::Replaced { removed }) => {
                    events.push(ExtractionEvent::Removed {
                        name: removed.display_name(),
                    });
                    events.push(ExtractionEvent::Added {
                        name: item.name.clone(),
                        variant: new_item.variant.clone(),
                        quantity: new_item.quantity,
                    });
                }
                Ok(ModifyOutcome::NotFound) => {
                    events.push(ExtractionEvent::NotRemoved {
                        fragment: old_fragment,
                        suggestions: self
                            .order
                            .lines()
                            .iter()
                            .map(|l| l.display_name())
                            .collect(),
                    });
                    match self
                        .order
                        .add(item, new_item.variant.as_deref(), new_item.quantity)
                    {
                        Ok(_) => events.push(ExtractionEvent::Added {
                            name: item.name.clone(),
                            variant: new_item.variant.clone(),
                            quantity: new_item.quantity,
                        }),
                        Err(e) => warn!("Modify fallback add failed: {e}"),
                    }
                }
                Err(e) => warn!("Modify failed, ledger rolled back: {e}"),
            }
        } else if existing.len() == 1 {
            // Only an ordered item was mentioned: a variant or quantity
            // change of that line.
            let target = &existing[0];
            let Some(item) = self.catalog.get(&target.item_id) else {
                return;
            };
            match self.order.modify(
                &target.name,
                item,
                target.variant.as_deref(),
                target.quantity,
            ) {
                Ok(ModifyOutcome::Replaced { removed }) => {
                    events.push(ExtractionEvent::Removed {
                        name: removed.display_name(),
                    });
                    events.push(ExtractionEvent::Added {
                        name: item.name.clone(),
                        variant: target.variant.clone(),
                        quantity: target.quantity,
                    });
                }
                Ok(ModifyOutcome::NotFound) => {}
                Err(e) => warn!("Modify failed, ledger rolled back: {e}"),
            }
        } else {
            events.push(ExtractionEvent::NothingMatched {
                suggestions: self.menu_suggestions(user_text),
            });
        }
    }

    /// Closest menu entries for "did you mean" wording.
    fn menu_suggestions(&self, fragment: &str) -> Vec<String> {
        self.catalog
            .find_by_text(fragment)
            .into_iter()
            .take(3)
            .map(|item| item.name.clone())
            .collect()
    }

    /// Structured response to a special command; no generation call, no
    /// conversation turn recorded.
    fn command_response(&mut self, command: SpecialCommand) -> TurnResult {
        let mut quit = false;
        let reply = match command {
            SpecialCommand::Menu => display::format_menu(&self.catalog),
            SpecialCommand::Order => self.order.summary(),
            SpecialCommand::Reset => {
                self.order.reset();
                "Ordine azzerato. Ricominciamo!".to_string()
            }
            SpecialCommand::Confirm => {
                if self.order.is_empty() {
                    "Non hai ancora ordinato nulla!".to_string()
                } else {
                    self.order.confirm();
                    format!(
                        "Ordine confermato!\n\n{}\n\nGrazie per aver ordinato!",
                        self.order.summary()
                    )
                }
            }
            SpecialCommand::Quit => {
                quit = true;
                if self.order.is_empty() {
                    "Grazie della visita! Torna presto!".to_string()
                } else {
                    format!(
                        "{}\n\nGrazie per la tua ordinazione! A presto!",
                        self.order.summary()
                    )
                }
            }
        };

        TurnResult {
            reply,
            source: ReplySource::Command,
            order: self.order.snapshot(),
            extraction: Vec::new(),
            quit,
        }
    }
}
