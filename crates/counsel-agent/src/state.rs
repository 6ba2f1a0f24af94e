//! Conversation state threaded through one graph run

use counsel_core::{Turn, TurnRole, FINISH};
use counsel_llm::{merge_consecutive_roles, LlmMessage, Role};
use serde::{Deserialize, Serialize};
use std::fmt;

const HISTORY_PREAMBLE: &str = "Conversation so far:";

/// A validated routing decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    Worker(String),
    Finish,
}

impl Route {
    /// Map a choice onto a route if it is one of `options`.
    pub fn from_choice(choice: &str, options: &[String]) -> Option<Self> {
        if !options.iter().any(|o| o == choice) {
            return None;
        }
        Some(if choice == FINISH { Self::Finish } else { Self::Worker(choice.to_string()) })
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Worker(name) => f.write_str(name),
            Self::Finish => f.write_str(FINISH),
        }
    }
}

/// What a node hands back to the graph. Workers fill `messages`, the
/// supervisor fills `next`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub messages: Vec<Turn>,
    pub next: Option<Route>,
}

impl StateUpdate {
    pub fn message(turn: Turn) -> Self {
        Self { messages: vec![turn], next: None }
    }

    pub fn route(route: Route) -> Self {
        Self { messages: Vec::new(), next: Some(route) }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    /// Turns produced in this run. Append-only.
    pub messages: Vec<Turn>,
    /// Turns loaded from session memory. Read-only during a run.
    pub chat_history: Vec<Turn>,
    pub next: Option<Route>,
}

impl ConversationState {
    pub fn new(query: impl Into<String>, chat_history: Vec<Turn>) -> Self {
        Self {
            messages: vec![Turn::human(query)],
            chat_history,
            next: None,
        }
    }

    /// Merge an update: messages append, `next` replaces when present.
    pub fn apply(&mut self, update: StateUpdate) {
        self.messages.extend(update.messages);
        if update.next.is_some() {
            self.next = update.next;
        }
    }

    /// The query that opened this run.
    pub fn query(&self) -> &str {
        self.messages.first().map(|t| t.content.as_str()).unwrap_or_default()
    }

    /// Most recent turn written by a worker.
    pub fn last_worker_turn(&self) -> Option<&Turn> {
        self.messages.iter().rev().find(|t| t.name.is_some())
    }

    /// History followed by this run's turns, as model messages.
    ///
    /// Worker turns are prefixed with the worker's name so the model can tell
    /// contributors apart. Consecutive same-role turns are merged, and the
    /// sequence always opens with a user message.
    pub fn to_llm_messages(&self) -> Vec<LlmMessage> {
        let mut messages: Vec<LlmMessage> = self
            .chat_history
            .iter()
            .chain(self.messages.iter())
            .map(turn_to_message)
            .collect();
        if messages.first().map(|m| m.role == Role::Assistant).unwrap_or(false) {
            messages.insert(0, LlmMessage::user(HISTORY_PREAMBLE));
        }
        merge_consecutive_roles(&messages)
    }
}

fn turn_to_message(turn: &Turn) -> LlmMessage {
    let content = match &turn.name {
        Some(name) => format!("[{}]: {}", name, turn.content),
        None => turn.content.clone(),
    };
    match turn.role {
        TurnRole::Ai => LlmMessage::assistant(content),
        TurnRole::Human | TurnRole::System => LlmMessage::user(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_appends_messages_and_replaces_next() {
        let mut state = ConversationState::new("q", Vec::new());
        state.apply(StateUpdate::route(Route::Worker("research_agent".into())));
        state.apply(StateUpdate::message(Turn::from_worker("research_agent", "found")));
        state.apply(StateUpdate::route(Route::Finish));

        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.next, Some(Route::Finish));
        assert_eq!(state.last_worker_turn().map(|t| t.content.as_str()), Some("found"));
    }

    #[test]
    fn worker_turns_merge_into_one_user_message() {
        let mut state = ConversationState::new("q", vec![Turn::human("earlier"), Turn::ai("answer")]);
        state.apply(StateUpdate::message(Turn::from_worker("research_agent", "notes")));

        let messages = state.to_llm_messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[2].text(), "q\n\n[research_agent]: notes");
    }

    #[test]
    fn remembered_answer_gets_user_preamble() {
        let state = ConversationState::new("q", vec![Turn::ai("answer").with_name("research_agent")]);
        let messages = state.to_llm_messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].text(), HISTORY_PREAMBLE);
        assert_eq!(messages[1].text(), "[research_agent]: answer");
    }

    #[test]
    fn route_from_choice_checks_membership() {
        let options = vec!["a".to_string(), FINISH.to_string()];
        assert_eq!(Route::from_choice("a", &options), Some(Route::Worker("a".into())));
        assert_eq!(Route::from_choice("FINISH", &options), Some(Route::Finish));
        assert_eq!(Route::from_choice("b", &options), None);
    }
}
