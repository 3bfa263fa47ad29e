use chat_relay_shared::{ChatMessage, MessageRole};

use crate::error::RelayError;

pub const SYSTEM_PROMPT: &str =
    "Ты полезный ассистент. Будь живым, отвечай по-русски и не веди себя как робот.";

/// Builds the message list sent to the provider.
///
/// A non-empty `history` is forwarded exactly as the client sent it; the
/// client owns ordering and roles. Otherwise a fresh system + user pair is
/// produced from `text`. Blank `text` is rejected in both cases.
pub fn build_messages(
    text: &str,
    history: Option<Vec<ChatMessage>>,
) -> Result<Vec<ChatMessage>, RelayError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(RelayError::empty_text());
    }

    match history {
        Some(history) if !history.is_empty() => Ok(history),
        _ => Ok(vec![
            ChatMessage::new(MessageRole::System, SYSTEM_PROMPT),
            ChatMessage::new(MessageRole::User, text),
        ]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, role: MessageRole, content: &str) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            role,
            content: content.to_string(),
            streaming: None,
            error: None,
            created_at: 1,
        }
    }

    #[test]
    fn blank_text_is_rejected() {
        for text in ["", "   ", "\n\t "] {
            assert_eq!(build_messages(text, None), Err(RelayError::empty_text()));
        }
    }

    #[test]
    fn blank_text_is_rejected_even_with_history() {
        let history = vec![message("1", MessageRole::User, "a")];
        assert!(build_messages(" ", Some(history)).is_err());
    }

    #[test]
    fn synthesizes_system_and_user_pair() {
        let messages = build_messages("  Привет  ", None).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[0].content, SYSTEM_PROMPT);
        assert_eq!(messages[1].role, MessageRole::User);
        assert_eq!(messages[1].content, "Привет");
    }

    #[test]
    fn empty_history_is_treated_as_absent() {
        let messages = build_messages("x", Some(Vec::new())).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "x");
    }

    #[test]
    fn history_is_forwarded_verbatim() {
        let history = vec![
            message("1", MessageRole::Assistant, "earlier answer"),
            message("2", MessageRole::User, "a"),
            message("3", MessageRole::User, "b"),
        ];
        let messages = build_messages("x", Some(history.clone())).unwrap();
        assert_eq!(messages, history);
    }
}
