use std::collections::HashMap;
use std::sync::Arc;

use leadflow_core::ConversationState;
use tokio::sync::Mutex;

/// In-memory conversation store: one lazily created entry per conversation
/// identifier, alive until an explicit reset or process exit.
///
/// Each entry carries its own mutex. The orchestrator holds an entry's
/// lock for the whole turn, so two concurrent messages for the same
/// identifier are serialized (preserving the grows-by-exactly-one
/// invariant on `asked_questions`) while different identifiers proceed in
/// parallel. The outer map lock is only held for entry lookup, never
/// across a turn.
#[derive(Clone, Default)]
pub struct ConversationStore {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<ConversationState>>>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry for `convo_id`, creating an empty state on first
    /// sight. An unknown identifier is not an error.
    pub async fn entry(&self, convo_id: &str) -> Arc<Mutex<ConversationState>> {
        let mut map = self.inner.lock().await;
        map.entry(convo_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ConversationState::new())))
            .clone()
    }

    /// Clears the conversation back to its initial empty state. Returns
    /// false when the identifier was never seen.
    pub async fn reset(&self, convo_id: &str) -> bool {
        let entry = {
            let map = self.inner.lock().await;
            map.get(convo_id).cloned()
        };
        match entry {
            Some(entry) => {
                entry.lock().await.reset();
                true
            }
            None => false,
        }
    }

    /// Point-in-time copy of one conversation, for inspection endpoints.
    pub async fn snapshot(&self, convo_id: &str) -> Option<ConversationState> {
        let entry = {
            let map = self.inner.lock().await;
            map.get(convo_id).cloned()
        };
        match entry {
            Some(entry) => Some(entry.lock().await.clone()),
            None => None,
        }
    }

    /// Point-in-time copies of every conversation.
    pub async fn snapshot_all(&self) -> Vec<(String, ConversationState)> {
        let entries: Vec<(String, Arc<Mutex<ConversationState>>)> = {
            let map = self.inner.lock().await;
            map.iter().map(|(id, entry)| (id.clone(), entry.clone())).collect()
        };

        let mut snapshots = Vec::with_capacity(entries.len());
        for (id, entry) in entries {
            snapshots.push((id, entry.lock().await.clone()));
        }
        snapshots
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use leadflow_core::Field;

    use super::ConversationStore;

    #[tokio::test]
    async fn entry_is_created_lazily_and_reused() {
        let store = ConversationStore::new();
        assert!(store.is_empty().await);

        let entry = store.entry("convo-1").await;
        entry.lock().await.set_field(Field::ContactName, "Juan");

        let same = store.entry("convo-1").await;
        assert_eq!(same.lock().await.field(Field::ContactName), Some("Juan"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn identifiers_are_isolated() {
        let store = ConversationStore::new();
        store.entry("a").await.lock().await.set_field(Field::ContactName, "Ana");
        store.entry("b").await.lock().await.set_field(Field::ContactName, "Bruno");

        let a = store.snapshot("a").await.expect("a should exist");
        let b = store.snapshot("b").await.expect("b should exist");
        assert_eq!(a.field(Field::ContactName), Some("Ana"));
        assert_eq!(b.field(Field::ContactName), Some("Bruno"));
    }

    #[tokio::test]
    async fn reset_clears_state_but_keeps_the_entry() {
        let store = ConversationStore::new();
        store.entry("convo-1").await.lock().await.set_field(Field::Email, "x@y.com");

        assert!(store.reset("convo-1").await);
        let snapshot = store.snapshot("convo-1").await.expect("entry should survive reset");
        assert!(snapshot.fields.is_empty());
        assert!(snapshot.asked_questions.is_empty());
    }

    #[tokio::test]
    async fn reset_of_unknown_identifier_reports_false() {
        let store = ConversationStore::new();
        assert!(!store.reset("never-seen").await);
    }

    #[tokio::test]
    async fn snapshot_all_lists_every_conversation() {
        let store = ConversationStore::new();
        store.entry("a").await;
        store.entry("b").await;
        store.entry("c").await;

        let mut ids: Vec<String> =
            store.snapshot_all().await.into_iter().map(|(id, _)| id).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
