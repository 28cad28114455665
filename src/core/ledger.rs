// Lot ledger: open cost-basis entries per symbol

use std::collections::HashMap;

/// Tracks the buy price of every open lot, per symbol, in open order.
///
/// A sell consumes the most recently opened lot (tail of the sequence), so
/// the realized cost basis is always the newest entry, not the oldest. A
/// symbol whose last lot closes is removed from the map entirely.
///
/// The ledger is a pure data structure: it does no locking of its own, and it
/// does not enforce the per-symbol lot cap. Mutating callers hold the trade
/// executor's lock.
#[derive(Debug, Default)]
pub struct LotLedger {
    lots: HashMap<String, Vec<f64>>,
}

impl LotLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly opened lot at the given buy price.
    pub fn open(&mut self, symbol: &str, buy_price: f64) {
        self.lots.entry(symbol.to_string()).or_default().push(buy_price);
    }

    /// Close the most recently opened lot and return its buy price.
    ///
    /// Returns `None` without mutating anything when the symbol has no open
    /// lots.
    pub fn close_last(&mut self, symbol: &str) -> Option<f64> {
        let lots = self.lots.get_mut(symbol)?;
        let buy_price = lots.pop();
        if lots.is_empty() {
            self.lots.remove(symbol);
        }
        buy_price
    }

    /// Number of open lots for a symbol, 0 if the symbol is absent.
    pub fn count(&self, symbol: &str) -> usize {
        self.lots.get(symbol).map(Vec::len).unwrap_or(0)
    }

    /// Buy price of the most recently opened lot.
    pub fn last_buy_price(&self, symbol: &str) -> Option<f64> {
        self.lots.get(symbol).and_then(|lots| lots.last().copied())
    }

    /// All open lot prices for a symbol, oldest first.
    pub fn lots(&self, symbol: &str) -> &[f64] {
        self.lots.get(symbol).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Symbols that currently have at least one open lot.
    pub fn symbols(&self) -> Vec<String> {
        self.lots.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }
}
