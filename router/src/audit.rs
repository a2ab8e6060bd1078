//! Fixed-capacity audit ring. A ring buffer trims the oldest entry on
//! overflow in O(1), avoiding the O(N) shift-and-append a plain `Vec` cap
//! would need.

use std::collections::VecDeque;

use thane_core::RoutingDecision;
use uuid::Uuid;

pub const DEFAULT_MAX_AUDIT: usize = 1000;

#[derive(Debug)]
pub struct AuditLog {
    capacity: usize,
    entries: VecDeque<RoutingDecision>,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Appends a decision, evicting the oldest entry if at capacity.
    pub fn push(&mut self, decision: RoutingDecision) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(decision);
    }

    /// Locates a decision by id, scanning from newest to oldest.
    pub fn find_mut(&mut self, request_id: Uuid) -> Option<&mut RoutingDecision> {
        self.entries
            .iter_mut()
            .rev()
            .find(|d| d.request_id == request_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoutingDecision> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;
    use thane_core::{Complexity, Priority};

    fn decision(id: Uuid) -> RoutingDecision {
        RoutingDecision {
            request_id: id,
            timestamp: Utc::now(),
            query: "q".to_string(),
            context_size: 0,
            needs_tools: false,
            tool_count: 0,
            priority: Priority::Interactive,
            hints: HashMap::new(),
            complexity: Complexity::Simple,
            intent: "general".to_string(),
            rules_evaluated: vec![],
            rules_matched: vec![],
            scores: HashMap::new(),
            chosen_model: "m".to_string(),
            reasoning: "r".to_string(),
            latency_ms: None,
            tokens_used: None,
            success: None,
        }
    }

    #[test]
    fn evicts_oldest_on_overflow() {
        let mut log = AuditLog::new(2);
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let c = Uuid::now_v7();
        log.push(decision(a));
        log.push(decision(b));
        log.push(decision(c));

        assert_eq!(log.len(), 2);
        assert!(log.find_mut(a).is_none());
        assert!(log.find_mut(b).is_some());
        assert!(log.find_mut(c).is_some());
    }

    #[test]
    fn find_mut_scans_newest_first() {
        let mut log = AuditLog::new(10);
        let id = Uuid::now_v7();
        log.push(decision(id));
        log.push(decision(id));
        // Both share an id; find_mut must return *a* match, and mutating it
        // must not panic or touch the wrong slot.
        let found = log.find_mut(id).unwrap();
        found.success = Some(true);
    }
}
