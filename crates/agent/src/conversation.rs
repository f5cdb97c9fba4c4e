//! The conversation buffer, an ordered, deduplicated message log with a
//! token budget.
//!
//! System instructions live beside the log, not in it: they are prepended
//! when messages are read and are never evicted.

use codewright_core::error::ConversationError;
use codewright_core::message::{Message, Role};
use std::collections::VecDeque;
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry {
    message: Message,
    /// Phase that owns this entry, if any
    scope: Option<String>,
}

#[derive(Debug, Default)]
pub struct ConversationBuffer {
    entries: VecDeque<Entry>,
    system_instructions: Option<String>,
    /// Scope applied to newly added entries
    scope: Option<String>,
}

impl ConversationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.system_instructions = Some(instructions.into());
        self
    }

    pub fn set_system_instructions(&mut self, instructions: Option<String>) {
        self.system_instructions = instructions;
    }

    pub fn system_instructions(&self) -> Option<&str> {
        self.system_instructions.as_deref()
    }

    /// Append a message. Returns `false` when an entry with the same role
    /// and trimmed content already exists.
    pub fn add_message(
        &mut self,
        role: Role,
        content: impl Into<String>,
    ) -> Result<bool, ConversationError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(ConversationError::EmptyContent);
        }
        if self
            .entries
            .iter()
            .any(|e| e.message.is_duplicate_of(role, &content))
        {
            debug!(role = %role, "Skipping duplicate message");
            return Ok(false);
        }
        self.entries.push_back(Entry {
            message: Message::new(role, content),
            scope: self.scope.clone(),
        });
        Ok(true)
    }

    /// [`add_message`](Self::add_message) with the role given by name.
    pub fn add_message_as(
        &mut self,
        role: &str,
        content: impl Into<String>,
    ) -> Result<bool, ConversationError> {
        let role: Role = role.parse()?;
        self.add_message(role, content)
    }

    /// All messages in order, system instructions first.
    pub fn get_messages(&self) -> Vec<Message> {
        let mut out = Vec::with_capacity(self.entries.len() + 1);
        if let Some(sys) = &self.system_instructions {
            out.push(Message::system(sys.clone()));
        }
        out.extend(self.entries.iter().map(|e| e.message.clone()));
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rough token estimate: one token per four characters, rounded up.
    pub fn estimate_token_count(text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }

    fn system_tokens(&self) -> usize {
        self.system_instructions
            .as_deref()
            .map_or(0, Self::estimate_token_count)
    }

    fn conversation_tokens(&self) -> usize {
        self.entries
            .iter()
            .map(|e| Self::estimate_token_count(&e.message.content))
            .sum()
    }

    /// Estimated tokens across system instructions and every message.
    pub fn total_token_count(&self) -> usize {
        self.system_tokens() + self.conversation_tokens()
    }

    /// Evict the oldest messages until the conversation fits in
    /// `max_tokens` minus the system instructions. Returns whether anything
    /// was evicted.
    pub fn cleanup_context(&mut self, max_tokens: usize) -> bool {
        let budget = max_tokens.saturating_sub(self.system_tokens());
        let mut tokens = self.conversation_tokens();
        let mut evicted = 0usize;

        while tokens > budget {
            let Some(entry) = self.entries.pop_front() else {
                break;
            };
            tokens -= Self::estimate_token_count(&entry.message.content);
            evicted += 1;
        }

        if evicted > 0 {
            debug!(evicted, remaining = tokens, budget, "Evicted old messages");
        }
        evicted > 0
    }

    /// Empty the log and drop the system instructions.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.system_instructions = None;
        self.scope = None;
    }

    /// Tag subsequently added messages with `scope`.
    pub fn set_scope(&mut self, scope: Option<String>) {
        self.scope = scope;
    }

    /// Remove every message tagged with `scope`. Returns how many went.
    pub fn evict_scope(&mut self, scope: &str) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|e| e.scope.as_deref() != Some(scope));
        before - self.entries.len()
    }
}
