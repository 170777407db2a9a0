//! Conversation history and windowed pruning.

use std::collections::HashSet;

use crate::types::{ContentBlock, Message, Role};

/// Messages kept when no window is configured.
pub const DEFAULT_MESSAGE_WINDOW: usize = 10;

/// Owned, ordered conversation history.
#[derive(Debug, Clone, Default)]
pub struct History {
    messages: Vec<Message>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user message.
    pub fn add_user_message(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    /// Add a raw message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Get all messages.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Drop everything after the first `len` messages.
    pub fn truncate(&mut self, len: usize) {
        self.messages.truncate(len);
    }

    /// Clear all messages.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Keep the last `window` messages, then drop orphaned tool pairings.
    pub fn prune(&mut self, window: usize) {
        let messages = std::mem::take(&mut self.messages);
        self.messages = prune_messages(messages, window);
    }

    /// Remove tool-use blocks that will never receive a result.
    ///
    /// An assistant message left with nothing to say is removed as well.
    pub fn discard_tool_uses(&mut self, ids: &HashSet<String>) {
        if ids.is_empty() {
            return;
        }
        for message in &mut self.messages {
            message.remove_tool_uses(ids);
        }
        self.messages
            .retain(|m| !(m.role == Role::Assistant && m.is_contentless()));
    }
}

/// Window `messages` to the last `window` entries and restore tool pairing.
///
/// Within the window, a tool-use block survives only if some retained
/// message answers it, and a tool-result block survives only if the call
/// it answers is retained. Assistant messages left without text or tool
/// calls are dropped. Other messages are dropped only when every block
/// they carried was a removed tool pairing. Histories already inside the
/// window are returned unchanged.
pub fn prune_messages(mut messages: Vec<Message>, window: usize) -> Vec<Message> {
    if messages.len() <= window {
        return messages;
    }

    let retained = messages.split_off(messages.len() - window);

    let mut tool_use_ids = HashSet::new();
    let mut tool_result_ids = HashSet::new();
    for block in retained.iter().flat_map(|m| m.content.iter()) {
        match block {
            ContentBlock::ToolUse { id, .. } => {
                tool_use_ids.insert(id.clone());
            }
            ContentBlock::ToolResult { tool_use_id, .. } => {
                tool_result_ids.insert(tool_use_id.clone());
            }
            ContentBlock::Text { .. } => {}
        }
    }

    retained
        .into_iter()
        .filter_map(|mut message| {
            let had_text = message
                .content
                .iter()
                .any(|b| matches!(b, ContentBlock::Text { .. }));

            message.content.retain(|block| match block {
                ContentBlock::ToolUse { id, .. } => tool_result_ids.contains(id),
                ContentBlock::ToolResult { tool_use_id, .. } => tool_use_ids.contains(tool_use_id),
                ContentBlock::Text { .. } => true,
            });

            let keep = if message.role == Role::Assistant {
                !message.is_contentless()
            } else {
                !message.content.is_empty() || had_text
            };
            keep.then_some(message)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn call(id: &str) -> Message {
        Message::new(
            Role::Assistant,
            vec![ContentBlock::tool_use(id, "fs__read", json!({}))],
        )
    }

    fn result(id: &str) -> Message {
        Message::tool_result(id, json!("ok"), "ok", false)
    }

    fn texts(messages: &[Message]) -> Vec<String> {
        messages.iter().map(Message::text).collect()
    }

    #[test]
    fn within_window_is_unchanged() {
        let messages = vec![Message::user("a"), call("1"), result("1")];
        let pruned = prune_messages(messages.clone(), 10);
        assert_eq!(pruned, messages);
        assert_eq!(prune_messages(messages.clone(), 3), messages);
    }

    #[test]
    fn keeps_last_window_messages() {
        let messages: Vec<Message> = (0..5).map(|i| Message::user(i.to_string())).collect();
        let pruned = prune_messages(messages, 2);
        assert_eq!(texts(&pruned), vec!["3", "4"]);
    }

    #[test]
    fn orphaned_result_is_dropped_with_its_message() {
        let messages = vec![Message::user("A"), call("1"), result("1"), Message::user("B")];
        let pruned = prune_messages(messages, 2);
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].text(), "B");
    }

    #[test]
    fn orphaned_call_empties_assistant_message() {
        let messages = vec![Message::user("A"), Message::user("B"), call("1")];
        let pruned = prune_messages(messages, 2);
        assert_eq!(texts(&pruned), vec!["B"]);
    }

    #[test]
    fn assistant_text_survives_when_call_is_orphaned() {
        let mut assistant = call("1");
        assistant.content.insert(0, ContentBlock::text("checking"));
        let messages = vec![Message::user("A"), Message::user("B"), assistant];
        let pruned = prune_messages(messages, 2);
        assert_eq!(pruned.len(), 2);
        assert_eq!(pruned[1].text(), "checking");
        assert!(pruned[1].tool_calls().is_empty());
    }

    #[test]
    fn complete_pairs_survive() {
        let messages = vec![Message::user("A"), Message::user("B"), call("1"), result("1")];
        let pruned = prune_messages(messages, 3);
        assert_eq!(pruned.len(), 3);
        assert_eq!(pruned[1].tool_calls()[0].id, "1");
        assert_eq!(pruned[2].tool_response_id(), Some("1"));
    }

    #[test]
    fn user_message_with_empty_text_is_kept() {
        let messages = vec![Message::user("A"), Message::user(""), Message::user("C")];
        let pruned = prune_messages(messages, 2);
        assert_eq!(pruned.len(), 2);
    }

    #[test]
    fn pruning_twice_is_stable() {
        let messages = vec![Message::user("A"), call("1"), result("1"), Message::user("B")];
        let once = prune_messages(messages, 3);
        let twice = prune_messages(once.clone(), 3);
        assert_eq!(once, twice);
    }

    #[test]
    fn history_prune_and_truncate() {
        let mut history = History::new();
        for i in 0..4 {
            history.add_user_message(i.to_string());
        }
        history.prune(3);
        assert_eq!(history.len(), 3);
        history.truncate(1);
        assert_eq!(texts(history.messages()), vec!["1"]);
    }

    #[test]
    fn discard_tool_uses_removes_dangling_calls() {
        let mut history = History::new();
        history.add_user_message("A");
        history.push(call("1"));
        history.discard_tool_uses(&HashSet::from(["1".to_string()]));
        assert_eq!(history.len(), 1);
        assert_eq!(history.messages()[0].text(), "A");
    }
}
