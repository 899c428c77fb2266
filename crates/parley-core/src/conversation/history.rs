//! Rendering prior turns for the next call

use serde_json::{json, Value};

use crate::budget::estimate_tokens;
use crate::types::{ConversationTurn, ThreadContext};

pub const HISTORY_START: &str = "=== CONVERSATION HISTORY ===";
pub const HISTORY_END: &str = "=== END CONVERSATION HISTORY ===";
pub const NEW_INPUT_MARKER: &str = "=== NEW USER INPUT ===";

/// Turns that fit a history budget
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistorySelection<'a> {
    /// Oldest first
    pub turns: Vec<(usize, &'a ConversationTurn)>,
    pub omitted: usize,
}

/// Pick turns newest-first until the budget runs out, then restore order
pub fn select_turns(thread: &ThreadContext, budget_tokens: u64) -> HistorySelection<'_> {
    let mut used = 0u64;
    let mut picked = Vec::new();
    for (index, turn) in thread.turns.iter().enumerate().rev() {
        let cost = estimate_tokens(&render_turn(index + 1, turn));
        if used + cost > budget_tokens {
            break;
        }
        used += cost;
        picked.push((index, turn));
    }
    picked.reverse();
    HistorySelection {
        omitted: thread.turns.len() - picked.len(),
        turns: picked,
    }
}

/// Rendered history and the tokens it costs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbeddedHistory {
    pub text: String,
    pub tokens: u64,
    pub turns_included: usize,
}

/// Render history as prompt text
///
/// Empty threads render as an empty string so callers can skip framing.
pub fn build_embedded_history(thread: &ThreadContext, budget_tokens: u64, max_turns: u32) -> EmbeddedHistory {
    if thread.turns.is_empty() {
        return EmbeddedHistory::default();
    }

    let selection = select_turns(thread, budget_tokens);
    let mut text = String::new();
    text.push_str(HISTORY_START);
    text.push('\n');
    text.push_str(&format!("Thread: {}\n", thread.id));
    text.push_str(&format!("Started by: {}\n", thread.originating_tool));
    text.push_str(&format!("Turns so far: {} of {}\n", thread.turns.len(), max_turns));

    let files = thread.referenced_files();
    if !files.is_empty() {
        text.push_str("\nFiles referenced in this conversation (newest first):\n");
        for file in &files {
            text.push_str(&format!("- {}\n", file));
        }
    }

    if selection.omitted > 0 {
        text.push_str(&format!(
            "\n[{} earlier turn(s) omitted to fit the context budget]\n",
            selection.omitted
        ));
    }

    for (index, turn) in &selection.turns {
        text.push('\n');
        text.push_str(&render_turn(index + 1, turn));
    }
    text.push('\n');
    text.push_str(HISTORY_END);
    text.push('\n');

    EmbeddedHistory {
        tokens: estimate_tokens(&text),
        turns_included: selection.turns.len(),
        text,
    }
}

/// History as a role/content message array
pub fn build_message_history(thread: &ThreadContext, budget_tokens: u64) -> Vec<Value> {
    select_turns(thread, budget_tokens)
        .turns
        .into_iter()
        .map(|(_, turn)| {
            let mut message = json!({
                "role": turn.role.to_string(),
                "content": turn.content,
            });
            if !turn.files.is_empty() {
                message["files"] = json!(turn.files);
            }
            if let Some(tool) = &turn.tool_name {
                message["tool_name"] = json!(tool);
            }
            if let Some(model) = &turn.model_name {
                message["model_name"] = json!(model);
            }
            message
        })
        .collect()
}

/// Prompt with history in front of the caller's new input
pub fn embed_prompt(history: &EmbeddedHistory, prompt: &str) -> String {
    if history.text.is_empty() {
        return prompt.to_string();
    }
    format!("{}\n{}\n{}", history.text, NEW_INPUT_MARKER, prompt)
}

fn render_turn(number: usize, turn: &ConversationTurn) -> String {
    let mut header = format!("--- Turn {} ({}", number, turn.role);
    if let Some(tool) = &turn.tool_name {
        header.push_str(&format!(" via {}", tool));
    }
    if let Some(model) = &turn.model_name {
        header.push_str(&format!(", model {}", model));
    }
    header.push_str(") ---\n");

    if !turn.files.is_empty() {
        header.push_str(&format!("Files: {}\n", turn.files.join(", ")));
    }
    header.push_str(&turn.content);
    header.push('\n');
    header
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::Map;
    use uuid::Uuid;

    fn thread(turns: Vec<ConversationTurn>) -> ThreadContext {
        let now = Utc::now();
        ThreadContext {
            id: Uuid::new_v4(),
            originating_tool: "chat".into(),
            turns,
            initial_context: Map::new(),
            session_fingerprint: None,
            created_at: now,
            expires_at: now + Duration::hours(3),
        }
    }

    fn sample() -> ThreadContext {
        thread(vec![
            ConversationTurn::user("first question").with_files(vec!["a.rs".into()]).with_tool("chat"),
            ConversationTurn::assistant("first answer").with_tool("chat").with_model("gemini", "flash"),
            ConversationTurn::user("second question").with_files(vec!["b.rs".into(), "a.rs".into()]),
            ConversationTurn::assistant("second answer").with_model("gemini", "pro"),
        ])
    }

    #[test]
    fn renders_oldest_first_with_files() {
        let history = build_embedded_history(&sample(), 10_000, 20);
        assert!(history.text.starts_with(HISTORY_START));
        assert!(history.text.contains("- b.rs\n- a.rs\n"));
        let first = history.text.find("first question").unwrap();
        let second = history.text.find("second answer").unwrap();
        assert!(first < second);
        assert_eq!(history.turns_included, 4);
        assert!(history.tokens > 0);
    }

    #[test]
    fn budget_keeps_newest_turns() {
        let t = sample();
        let newest_cost = estimate_tokens(&render_turn(4, &t.turns[3]));
        let selection = select_turns(&t, newest_cost);
        assert_eq!(selection.turns.len(), 1);
        assert_eq!(selection.turns[0].1.content, "second answer");
        assert_eq!(selection.omitted, 3);

        let history = build_embedded_history(&t, newest_cost, 20);
        assert!(history.text.contains("3 earlier turn(s) omitted"));
        assert!(!history.text.contains("first question"));
    }

    #[test]
    fn empty_thread_leaves_prompt_alone() {
        let history = build_embedded_history(&thread(vec![]), 10_000, 20);
        assert_eq!(history.tokens, 0);
        assert_eq!(embed_prompt(&history, "hi"), "hi");
    }

    #[test]
    fn embedded_prompt_marks_new_input() {
        let history = build_embedded_history(&sample(), 10_000, 20);
        let prompt = embed_prompt(&history, "third question");
        assert!(prompt.ends_with(&format!("{}\nthird question", NEW_INPUT_MARKER)));
    }

    #[test]
    fn message_history_roles() {
        let messages = build_message_history(&sample(), 10_000);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["model_name"], "flash");
        assert_eq!(messages[2]["files"][0], "b.rs");
    }
}
