//! Admission control: at most one turn in flight per conversation.
use std::collections::HashSet;
use std::sync::Mutex;

/// Keyed mutual exclusion over conversation ids. State is in-memory only;
/// an in-flight turn can't survive a restart, so neither does the busy set.
#[derive(Debug, Default)]
pub struct ConversationRegistry {
    busy: Mutex<HashSet<String>>,
}

impl ConversationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the conversation busy. Returns false without side effects when
    /// a turn is already registered for it. The lock is held only for this
    /// check-and-set, never across a turn.
    pub fn try_acquire(&self, conversation_id: &str) -> bool {
        self.busy
            .lock()
            .expect("Unable to lock conversation registry")
            .insert(conversation_id.to_string())
    }

    /// Clear the busy marker. Idempotent: releasing an id that was never
    /// acquired is a no-op.
    pub fn release(&self, conversation_id: &str) {
        self.busy
            .lock()
            .expect("Unable to lock conversation registry")
            .remove(conversation_id);
    }

    pub fn is_busy(&self, conversation_id: &str) -> bool {
        self.busy
            .lock()
            .expect("Unable to lock conversation registry")
            .contains(conversation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_acquire_then_conflict() {
        let registry = ConversationRegistry::new();
        assert!(registry.try_acquire("c1"));
        assert!(!registry.try_acquire("c1"));
        assert!(registry.is_busy("c1"));
    }

    #[test]
    fn test_release_makes_conversation_available_again() {
        let registry = ConversationRegistry::new();
        assert!(registry.try_acquire("c1"));
        registry.release("c1");
        assert!(!registry.is_busy("c1"));
        assert!(registry.try_acquire("c1"));
    }

    #[test]
    fn test_release_is_idempotent() {
        let registry = ConversationRegistry::new();
        registry.release("never-acquired");
        assert!(registry.try_acquire("never-acquired"));
        registry.release("never-acquired");
        registry.release("never-acquired");
        assert!(registry.try_acquire("never-acquired"));
    }

    #[test]
    fn test_distinct_conversations_are_independent() {
        let registry = ConversationRegistry::new();
        assert!(registry.try_acquire("c1"));
        assert!(registry.try_acquire("c2"));
        registry.release("c1");
        assert!(!registry.is_busy("c1"));
        assert!(registry.is_busy("c2"));
    }

    #[test]
    fn test_concurrent_acquire_admits_exactly_one() {
        let registry = Arc::new(ConversationRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.try_acquire("contested"))
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|admitted| *admitted)
            .count();
        assert_eq!(admitted, 1);
    }
}
