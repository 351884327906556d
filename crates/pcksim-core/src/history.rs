use std::time::Duration;

use pcksim_provider::LlmMessage;
use pcksim_schema::{Message, Role};

/// Sent when the model history is empty but an instruction exists.
pub const SESSION_START_TRIGGER: &str =
    "[The tutoring session is starting. The students should greet and present their geometry question.]";

/// Ordered, append-only conversation log.
#[derive(Debug, Clone, Default)]
pub struct History {
    messages: Vec<Message>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append in order, sleeping `pacing` between messages when non-zero.
    pub async fn append_batch<I>(&mut self, messages: I, pacing: Duration)
    where
        I: IntoIterator<Item = Message>,
    {
        for (idx, message) in messages.into_iter().enumerate() {
            if idx > 0 && !pacing.is_zero() {
                tokio::time::sleep(pacing).await;
            }
            self.messages.push(message);
        }
    }

    /// Remove the most recent message. No-op on an empty history.
    pub fn undo_last(&mut self) -> Option<Message> {
        self.messages.pop()
    }

    /// Drop everything after the first `len` messages.
    pub fn truncate(&mut self, len: usize) {
        self.messages.truncate(len);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Serialize for a chat-style model call.
    ///
    /// `instruction` and any system messages are folded into the first
    /// user-role entry instead of being sent as their own turn.
    pub fn to_model_format(&self, instruction: Option<&str>) -> Vec<LlmMessage> {
        let mut pending: Vec<&str> = instruction.into_iter().collect();
        let mut contents: Vec<LlmMessage> = Vec::with_capacity(self.messages.len() + 1);
        let mut folded = false;

        for message in &self.messages {
            match message.role() {
                Role::System => pending.push(message.text()),
                Role::Teacher => {
                    let text = if !folded && !pending.is_empty() {
                        folded = true;
                        format!("{}\n\n{}", pending.join("\n\n"), message.text())
                    } else {
                        message.text().to_string()
                    };
                    let mut entry = LlmMessage::user(text);
                    if let Some(png) = message.image() {
                        entry = entry.with_png(png);
                    }
                    contents.push(entry);
                }
                Role::Student => contents.push(LlmMessage::assistant(format!(
                    "{}: {}",
                    message.speaker_id(),
                    message.text()
                ))),
            }
        }

        if !folded && !pending.is_empty() {
            let prefix = pending.join("\n\n");
            if contents.is_empty() {
                contents.push(LlmMessage::user(format!(
                    "{prefix}\n\n{SESSION_START_TRIGGER}"
                )));
            } else {
                contents.insert(0, LlmMessage::user(prefix));
            }
        }

        contents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_on_empty_history_is_noop() {
        let mut history = History::new();
        assert!(history.undo_last().is_none());
        assert!(history.is_empty());
    }

    #[test]
    fn undo_removes_only_last() {
        let mut history = History::new();
        history.append(Message::teacher("a"));
        history.append(Message::student("Sheila", "b"));
        let removed = history.undo_last().unwrap();
        assert_eq!(removed.text(), "b");
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn instruction_folds_into_first_user_entry() {
        let mut history = History::new();
        history.append(Message::teacher("שלום"));
        history.append(Message::student("Sheila", "היי"));
        history.append(Message::teacher("מה זה מעויין?"));

        let contents = history.to_model_format(Some("INSTRUCTIONS"));
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0].role, "user");
        assert_eq!(contents[0].text(), "INSTRUCTIONS\n\nשלום");
        assert_eq!(contents[1].role, "assistant");
        assert_eq!(contents[1].text(), "Sheila: היי");
        assert_eq!(contents[2].text(), "מה זה מעויין?");
    }

    #[test]
    fn empty_history_with_instruction_gets_trigger() {
        let contents = History::new().to_model_format(Some("INSTRUCTIONS"));
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].role, "user");
        assert!(contents[0].text().starts_with("INSTRUCTIONS\n\n"));
        assert!(contents[0].text().ends_with(SESSION_START_TRIGGER));
    }

    #[test]
    fn empty_history_without_instruction_is_empty() {
        assert!(History::new().to_model_format(None).is_empty());
    }

    #[test]
    fn leading_student_messages_get_instruction_entry_in_front() {
        let mut history = History::new();
        history.append(Message::student("Casey", "מורה, יש לי שאלה"));
        let contents = history.to_model_format(Some("INSTRUCTIONS"));
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0].role, "user");
        assert_eq!(contents[0].text(), "INSTRUCTIONS");
        assert_eq!(contents[1].role, "assistant");
    }

    #[test]
    fn system_messages_join_the_instruction_prefix() {
        let mut history = History::new();
        history.append(Message::system("extra rule"));
        history.append(Message::teacher("hi"));
        let contents = history.to_model_format(Some("BASE"));
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].text(), "BASE\n\nextra rule\n\nhi");
    }

    #[test]
    fn teacher_image_becomes_inline_part() {
        let mut history = History::new();
        history.append(Message::teacher("see").with_image(vec![1, 2, 3]));
        let contents = history.to_model_format(None);
        assert!(contents[0].has_image());
    }

    #[tokio::test(start_paused = true)]
    async fn append_batch_keeps_order_with_pacing() {
        let mut history = History::new();
        let start = tokio::time::Instant::now();
        history
            .append_batch(
                vec![
                    Message::student("Sheila", "1"),
                    Message::student("Casey", "2"),
                    Message::student("Rishi", "3"),
                ],
                Duration::from_millis(500),
            )
            .await;
        let names: Vec<_> = history.iter().map(|m| m.speaker_id().to_string()).collect();
        assert_eq!(names, vec!["Sheila", "Casey", "Rishi"]);
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }
}
