use staffchat_core::ChatTurn;

/// Per-message framing overhead in the chat format.
const TURN_OVERHEAD_TOKENS: usize = 3;

/// Rough token count: four characters per token plus framing.
pub fn estimate_tokens(turn: &ChatTurn) -> usize {
    TURN_OVERHEAD_TOKENS + turn.content.chars().count().div_ceil(4)
}

/// Drops the oldest turns until the estimate fits `max_tokens`. The newest turn always survives.
pub fn truncate_history(history: &[ChatTurn], max_tokens: usize) -> Vec<ChatTurn> {
    let mut total: usize = history.iter().map(estimate_tokens).sum();
    let mut start = 0;

    while total > max_tokens && history.len() - start > 1 {
        total -= estimate_tokens(&history[start]);
        start += 1;
    }

    history[start..].to_vec()
}

/// System prompt, then prior turns, then the question as the final user turn.
pub fn build_messages(system_prompt: &str, history: &[ChatTurn], question: &str) -> Vec<ChatTurn> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatTurn::system(system_prompt));
    messages.extend(history.iter().cloned());
    messages.push(ChatTurn::user(question));
    messages
}

#[cfg(test)]
mod tests {
    use staffchat_core::{ChatTurn, Role};

    use super::{build_messages, estimate_tokens, truncate_history};

    #[test]
    fn estimate_rounds_characters_up() {
        assert_eq!(estimate_tokens(&ChatTurn::user("")), 3);
        assert_eq!(estimate_tokens(&ChatTurn::user("abcd")), 4);
        assert_eq!(estimate_tokens(&ChatTurn::user("abcde")), 5);
    }

    #[test]
    fn truncation_drops_oldest_turns_first() {
        let history = vec![
            ChatTurn::user("a".repeat(40)),
            ChatTurn::assistant("b".repeat(40)),
            ChatTurn::user("c".repeat(40)),
        ];

        let kept = truncate_history(&history, 26);

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].role, Role::Assistant);
        assert!(kept[1].content.starts_with('c'));
    }

    #[test]
    fn truncation_keeps_at_least_the_newest_turn() {
        let history = vec![ChatTurn::user("x".repeat(400)), ChatTurn::user("y".repeat(400))];

        let kept = truncate_history(&history, 1);

        assert_eq!(kept.len(), 1);
        assert!(kept[0].content.starts_with('y'));
        assert!(truncate_history(&[], 1).is_empty());
    }

    #[test]
    fn messages_wrap_history_with_system_prompt_and_question() {
        let history = vec![ChatTurn::user("earlier"), ChatTurn::assistant("answer")];

        let messages = build_messages("be precise", &history, "who logged in today?");

        let roles: Vec<Role> = messages.iter().map(|turn| turn.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(messages[3].content, "who logged in today?");
    }
}
