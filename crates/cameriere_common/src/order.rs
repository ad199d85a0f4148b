//! Running order ledger: lines, derived total, atomic mutations.
//!
//! The order is owned by exactly one conversation session and mutated only
//! through the operations here. The total is always recomputed from the
//! lines, so no mutation path can leave it stale. "Not found" conditions are
//! ordinary outcomes, never errors; errors are reserved for invariant
//! violations that indicate a bug in the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WaiterError;
use crate::matcher::{fold, is_stopword, tokenize};
use crate::menu::MenuItem;
use crate::preferences::CustomerPreferences;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Still being composed.
    Draft,
    /// Confirmed by the customer.
    Confirmed,
    /// Handed over to the kitchen.
    Sent,
}

impl Default for OrderStatus {
    fn default() -> Self {
        Self::Draft
    }
}

/// One line of the order. The unit price is a snapshot taken at add time, so
/// a later menu reload never retroactively changes what was ordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: String,
    pub name: String,
    /// Selected size label; `None` for single-price items.
    pub variant: Option<String>,
    /// Always >= 1; a line at zero is removed, never kept.
    pub quantity: u32,
    pub unit_price: f64,
    pub note: String,
}

impl OrderLine {
    pub fn line_total(&self) -> f64 {
        self.unit_price * self.quantity as f64
    }

    /// Display name including the size, e.g. "Yogurt con frutta (grande)".
    pub fn display_name(&self) -> String {
        match &self.variant {
            Some(v) => format!("{} ({})", self.name, v),
            None => self.name.clone(),
        }
    }
}

/// Outcome of a remove: never an error, even on an empty order.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoveOutcome {
    Removed(OrderLine),
    NotFound,
}

/// Outcome of a modify (atomic remove-then-add).
#[derive(Debug, Clone, PartialEq)]
pub enum ModifyOutcome {
    Replaced { removed: OrderLine },
    NotFound,
}

/// The customer's running order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    lines: Vec<OrderLine>,
    pub status: OrderStatus,
    pub preferences: CustomerPreferences,
    pub created_at: DateTime<Utc>,
}

impl Default for Order {
    fn default() -> Self {
        Self::new()
    }
}

impl Order {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            status: OrderStatus::Draft,
            preferences: CustomerPreferences::default(),
            created_at: Utc::now(),
        }
    }

    /// Lines in insertion (display) order.
    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of pieces across all lines.
    pub fn num_items(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Recomputed on demand from the lines; never cached.
    pub fn total(&self) -> f64 {
        self.lines.iter().map(|l| l.line_total()).sum()
    }

    /// Add an item, merging into an existing line with the same item and
    /// variant instead of duplicating it. Returns the affected line.
    pub fn add(
        &mut self,
        item: &MenuItem,
        variant: Option<&str>,
        quantity: u32,
    ) -> Result<&OrderLine, WaiterError> {
        let idx = self.add_index(item, variant, quantity)?;
        Ok(&self.lines[idx])
    }

    fn add_index(
        &mut self,
        item: &MenuItem,
        variant: Option<&str>,
        quantity: u32,
    ) -> Result<usize, WaiterError> {
        if quantity == 0 {
            return Err(WaiterError::LedgerInvariant(format!(
                "attempted to add '{}' with quantity 0",
                item.name
            )));
        }

        let unit_price = match variant {
            Some(label) => {
                item.variant(label)
                    .ok_or_else(|| {
                        WaiterError::LedgerInvariant(format!(
                            "item '{}' has no variant '{label}'",
                            item.name
                        ))
                    })?
                    .price
            }
            None => item.default_variant().price,
        };

        let same_variant = |line: &OrderLine| match (&line.variant, variant) {
            (Some(a), Some(b)) => fold(a) == fold(b),
            (None, None) => true,
            _ => false,
        };

        if let Some(idx) = self
            .lines
            .iter()
            .position(|l| l.item_id == item.id && same_variant(l))
        {
            self.lines[idx].quantity += quantity;
            return Ok(idx);
        }

        self.lines.push(OrderLine {
            item_id: item.id.clone(),
            name: item.name.clone(),
            variant: variant.map(String::from),
            quantity,
            unit_price,
            note: String::new(),
        });
        Ok(self.lines.len() - 1)
    }

    /// Remove the line best matching the fragment. Matches against the
    /// current order contents only, not the full catalog; a miss is a
    /// reported outcome, not an error, and the turn goes on.
    pub fn remove(&mut self, fragment: &str) -> RemoveOutcome {
        match self.best_line_match(fragment) {
            Some(idx) => RemoveOutcome::Removed(self.lines.remove(idx)),
            None => RemoveOutcome::NotFound,
        }
    }

    /// Atomic remove-then-add. When the add half fails, the removed line is
    /// reinstated at its original position, so the ledger never loses the
    /// original line to a half-applied modify.
    pub fn modify(
        &mut self,
        old_fragment: &str,
        item: &MenuItem,
        variant: Option<&str>,
        quantity: u32,
    ) -> Result<ModifyOutcome, WaiterError> {
        let Some(idx) = self.best_line_match(old_fragment) else {
            return Ok(ModifyOutcome::NotFound);
        };
        let removed = self.lines.remove(idx);

        match self.add_index(item, variant, quantity) {
            Ok(_) => Ok(ModifyOutcome::Replaced { removed }),
            Err(e) => {
                let at = idx.min(self.lines.len());
                self.lines.insert(at, removed);
                Err(e)
            }
        }
    }

    /// Clear lines, preferences and status. Conversation history is owned by
    /// the session, not the order, and is deliberately left alone.
    pub fn reset(&mut self) {
        self.lines.clear();
        self.preferences = CustomerPreferences::default();
        self.status = OrderStatus::Draft;
    }

    pub fn confirm(&mut self) {
        self.status = OrderStatus::Confirmed;
    }

    pub fn send_to_kitchen(&mut self) {
        self.status = OrderStatus::Sent;
    }

    /// Customer-facing summary.
    pub fn summary(&self) -> String {
        if self.lines.is_empty() {
            return "Nessun ordine ancora.".to_string();
        }

        let mut lines = vec!["Il tuo ordine:".to_string()];
        for line in &self.lines {
            let mut name = line.display_name();
            if !line.note.is_empty() {
                name.push_str(&format!(" - {}", line.note));
            }
            lines.push(format!(
                "- {} x{} — €{:.2}",
                name,
                line.quantity,
                line.line_total()
            ));
        }
        lines.push(format!("\nTotale: €{:.2}", self.total()));

        if self.preferences.has_restrictions() {
            lines.push(format!("Preferenze: {}", self.preferences.format_for_waiter()));
        }

        lines.join("\n")
    }

    /// Kitchen-facing summary: restrictions first, then the lines.
    pub fn kitchen_summary(&self) -> String {
        let mut lines = vec![format!("ORDINE - {}", self.created_at.format("%H:%M"))];

        if self.preferences.has_restrictions() {
            lines.push(format!("ATTENZIONE: {}", self.preferences.format_for_waiter()));
            lines.push(String::new());
        }

        for line in &self.lines {
            let mut text = format!("{}x {}", line.quantity, line.display_name());
            if !line.note.is_empty() {
                text.push_str(&format!(" [{}]", line.note));
            }
            lines.push(text);
        }

        lines.push(format!("\nTOTALE: €{:.2}", self.total()));
        lines.join("\n")
    }

    /// Serializable view of the current state, handed to the UI every turn.
    pub fn snapshot(&self) -> OrderSnapshot {
        OrderSnapshot {
            lines: self.lines.clone(),
            total: self.total(),
            status: self.status,
            preferences: self.preferences.clone(),
        }
    }

    /// Best line for a free-text fragment: token overlap against the line
    /// name, filler and command words ignored.
    fn best_line_match(&self, fragment: &str) -> Option<usize> {
        let frag_tokens: Vec<String> = tokenize(fragment)
            .into_iter()
            .filter(|t| !is_stopword(t))
            .collect();
        if frag_tokens.is_empty() {
            return None;
        }

        let mut best: Option<(usize, usize)> = None; // (overlap, idx)
        for (idx, line) in self.lines.iter().enumerate() {
            let name_tokens = tokenize(&line.name);
            let overlap = frag_tokens
                .iter()
                .filter(|t| name_tokens.contains(t))
                .count();
            if overlap == 0 {
                continue;
            }
            if best.map(|(o, _)| overlap > o).unwrap_or(true) {
                best = Some((overlap, idx));
            }
        }
        best.map(|(_, idx)| idx)
    }
}

/// Serializable view of the order returned from every turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub lines: Vec<OrderLine>,
    pub total: f64,
    pub status: OrderStatus,
    pub preferences: CustomerPreferences,
}
