//! Recording finished exchanges into threads

use std::sync::Arc;

use uuid::Uuid;

use crate::storage::{StoreResult, ThreadStore};
use crate::types::{Arguments, ContinuationOffer, ConversationTurn};

/// What happened when an assistant turn was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Turns in the thread up to and including the current user turn
    pub turns_through_user: usize,
    pub recorded: bool,
}

/// Writes turns for calls that produced a final answer
pub struct ConversationRecorder {
    threads: Arc<dyn ThreadStore>,
    max_turns: u32,
}

impl ConversationRecorder {
    pub fn new(threads: Arc<dyn ThreadStore>, max_turns: u32) -> Self {
        Self { threads, max_turns }
    }

    /// Start a thread for a call that had no continuation id
    ///
    /// The visible arguments become the thread's initial context and the
    /// caller's prompt becomes its first user turn.
    pub async fn start_thread(
        &self,
        tool_name: &str,
        arguments: &Arguments,
        session_fingerprint: Option<&str>,
    ) -> StoreResult<Uuid> {
        let id = self
            .threads
            .create_thread(tool_name, arguments.visible(), session_fingerprint.map(str::to_string))
            .await?;
        let turn = ConversationTurn::user(arguments.original_user_text().unwrap_or_default())
            .with_files(arguments.files())
            .with_images(arguments.images())
            .with_tool(tool_name);
        self.threads.add_turn(&id.to_string(), turn).await?;
        Ok(id)
    }

    /// Append the assistant turn for this call
    pub async fn record_assistant(&self, thread_id: &str, turn: ConversationTurn) -> StoreResult<RecordOutcome> {
        let turns_through_user = self
            .threads
            .get_thread(thread_id)
            .await?
            .map(|t| t.turns.len())
            .unwrap_or(0);
        let recorded = self.threads.add_turn(thread_id, turn).await?;
        Ok(RecordOutcome {
            turns_through_user,
            recorded,
        })
    }

    /// Offer to continue, or `None` once the thread has no turns left
    pub fn continuation_offer(&self, thread_id: &str, outcome: RecordOutcome) -> Option<ContinuationOffer> {
        let used = u32::try_from(outcome.turns_through_user).unwrap_or(u32::MAX);
        let remaining_turns = self.max_turns.saturating_sub(used);
        if remaining_turns == 0 || !outcome.recorded {
            return None;
        }
        Some(ContinuationOffer {
            continuation_id: thread_id.to_string(),
            note: format!(
                "Pass continuation_id to continue this conversation ({} exchange(s) remaining)",
                remaining_turns
            ),
            remaining_turns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryThreadStore;
    use crate::types::TurnRole;
    use serde_json::json;
    use std::time::Duration;

    fn recorder(max_turns: u32) -> (Arc<MemoryThreadStore>, ConversationRecorder) {
        let store = Arc::new(MemoryThreadStore::new(Duration::from_secs(3600), max_turns));
        (store.clone(), ConversationRecorder::new(store, max_turns))
    }

    #[tokio::test]
    async fn new_thread_offers_all_but_one_turn() {
        let (store, recorder) = recorder(20);
        let args = Arguments::from_value(json!({"prompt": "hi", "_correlation_id": "abc"})).unwrap();

        let id = recorder.start_thread("chat", &args, Some("fp")).await.unwrap().to_string();
        let outcome = recorder
            .record_assistant(&id, ConversationTurn::assistant("hello").with_model("gemini", "flash"))
            .await
            .unwrap();
        assert_eq!(outcome.turns_through_user, 1);
        let offer = recorder.continuation_offer(&id, outcome).unwrap();
        assert_eq!(offer.remaining_turns, 19);

        let thread = store.get_thread(&id).await.unwrap().unwrap();
        assert_eq!(thread.turns[0].role, TurnRole::User);
        assert_eq!(thread.turns[0].content, "hi");
        assert_eq!(thread.turns[1].role, TurnRole::Assistant);
        assert!(thread.initial_context.contains_key("prompt"));
        assert!(!thread.initial_context.contains_key("_correlation_id"));
        assert_eq!(thread.session_fingerprint.as_deref(), Some("fp"));
    }

    #[tokio::test]
    async fn no_offer_at_ceiling() {
        let (_store, recorder) = recorder(2);
        let args = Arguments::from_value(json!({"prompt": "hi"})).unwrap();
        let id = recorder.start_thread("chat", &args, None).await.unwrap().to_string();
        let first = recorder
            .record_assistant(&id, ConversationTurn::assistant("a"))
            .await
            .unwrap();
        assert_eq!(recorder.continuation_offer(&id, first).unwrap().remaining_turns, 1);

        let second = recorder
            .record_assistant(&id, ConversationTurn::assistant("b"))
            .await
            .unwrap();
        assert!(!second.recorded);
        assert!(recorder.continuation_offer(&id, second).is_none());
    }
}
