//! Generation tickets
//!
//! Every target key holds a generation number. Work started for a key carries
//! a ticket with the generation it saw; redefining the focus box or losing a
//! track invalidates the key, and results carrying an older ticket are
//! discarded when they arrive. Numbers come from one monotonic counter, so an
//! invalidated generation is never handed out again.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::TargetKey;

/// Proof of the generation a piece of work was started under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub key: TargetKey,
    pub generation: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Generations {
    counter: u64,
    current: HashMap<TargetKey, u64>,
}

impl Generations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticket for the key's current generation, starting one if needed
    pub fn ticket(&mut self, key: TargetKey) -> Ticket {
        let counter = &mut self.counter;
        let generation = *self.current.entry(key).or_insert_with(|| {
            *counter += 1;
            *counter
        });
        Ticket { key, generation }
    }

    /// Whether results under `ticket` may still be applied
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.current.get(&ticket.key) == Some(&ticket.generation)
    }

    /// Retire the key's generation; outstanding tickets become stale
    pub fn invalidate(&mut self, key: &TargetKey) {
        self.current.remove(key);
    }

    /// Retire every generation (session stop)
    pub fn invalidate_all(&mut self) {
        self.current.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_stable_until_invalidated() {
        let mut generations = Generations::new();
        let a = generations.ticket(TargetKey::FocusBox);
        let b = generations.ticket(TargetKey::FocusBox);
        assert_eq!(a, b);
        assert!(generations.is_current(&a));

        generations.invalidate(&TargetKey::FocusBox);
        assert!(!generations.is_current(&a));

        let c = generations.ticket(TargetKey::FocusBox);
        assert_ne!(a.generation, c.generation);
        assert!(generations.is_current(&c));
        assert!(!generations.is_current(&a));
    }

    #[test]
    fn test_keys_independent() {
        let mut generations = Generations::new();
        let focus = generations.ticket(TargetKey::FocusBox);
        let track = generations.ticket(TargetKey::Track(3));

        generations.invalidate(&TargetKey::Track(3));
        assert!(generations.is_current(&focus));
        assert!(!generations.is_current(&track));

        // Unknown key
        generations.invalidate(&TargetKey::Track(99));

        generations.invalidate_all();
        assert!(!generations.is_current(&focus));
    }
}
