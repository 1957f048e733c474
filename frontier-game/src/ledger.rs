//! Capacity-bounded resource quantities.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::ResourceId;

/// Mapping of resource id to a quantity in `[0, cap]`.
///
/// The cap is not stored: it is derived from building levels and passed in
/// at every write so the ledger can never disagree with the current
/// storehouse level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceLedger {
    amounts: BTreeMap<ResourceId, f64>,
}

impl ResourceLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Quantity held, zero when absent.
    #[must_use]
    pub fn get(&self, id: &str) -> f64 {
        self.amounts.get(id).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn has(&self, id: &str, amount: f64) -> bool {
        self.get(id) >= amount
    }

    /// Remaining space before `cap`.
    #[must_use]
    pub fn room(&self, id: &str, cap: f64) -> f64 {
        (cap - self.get(id)).max(0.0)
    }

    #[must_use]
    pub fn has_room(&self, id: &str, cap: f64) -> bool {
        self.room(id, cap) > 0.0
    }

    /// Credit up to `amount`, clamped at `cap`. Returns what was actually added.
    pub fn add(&mut self, id: &str, amount: f64, cap: f64) -> f64 {
        if amount.is_nan() || amount <= 0.0 {
            return 0.0;
        }
        let current = self.get(id);
        let next = (current + amount).min(cap).max(current);
        let added = next - current;
        if added > 0.0 {
            self.write(id, next);
        }
        added
    }

    /// Debit up to `amount`, clamped at zero. Returns what was actually removed.
    pub fn remove(&mut self, id: &str, amount: f64) -> f64 {
        if amount.is_nan() || amount <= 0.0 {
            return 0.0;
        }
        let current = self.get(id);
        let next = (current - amount).max(0.0);
        self.write(id, next);
        current - next
    }

    /// Overwrite a quantity, clamped to `[0, cap]`.
    pub fn set(&mut self, id: &str, amount: f64, cap: f64) {
        let value = if amount.is_nan() { 0.0 } else { amount.clamp(0.0, cap.max(0.0)) };
        self.write(id, value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceId, f64)> {
        self.amounts.iter().map(|(id, amount)| (id, *amount))
    }

    fn write(&mut self, id: &str, value: f64) {
        if let Some(slot) = self.amounts.get_mut(id) {
            *slot = value;
        } else {
            self.amounts.insert(ResourceId::new(id), value);
        }
    }
}
