//! crates/paraphrase_bot_core/src/session.rs
//!
//! The conversational state machine. Transitions are pure: `on_event`
//! mutates the session view and returns a directive for the caller to carry
//! out. The advance into `AwaitingAction` is committed separately via
//! [`complete_generation`], so a denied or failed batch leaves the machine
//! exactly where it was.

use crate::domain::{BatchSize, SessionPhase, UserSession};

/// An event the state machine reacts to. The start command is not an event
/// here: it resets the stored session wholesale before the machine is ever
/// consulted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// An inbound text message to paraphrase.
    Text(String),
    /// The user picked a batch size.
    CountSelected(BatchSize),
    /// "Add More": repeat the last batch for the same text.
    AddMore,
    /// "New Message": discard the pending text and start over.
    NewMessage,
}

/// What the caller should do next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    /// Ask the user how many paraphrases they want.
    AskCount,
    /// Run the generation pipeline for `count` paraphrases of `text`.
    Generate { text: String, count: BatchSize },
    /// Prompt the user to send a message.
    PromptForText,
}

pub fn on_event(session: &mut UserSession, event: SessionEvent) -> Directive {
    match event {
        SessionEvent::Text(content) => {
            // A new text starts a fresh cycle from any phase, so there is
            // never more than one pending message.
            session.phase = SessionPhase::AwaitingCount;
            session.pending_text = Some(content);
            Directive::AskCount
        }
        SessionEvent::CountSelected(count) => match (session.phase, session.pending_text.clone()) {
            (SessionPhase::AwaitingCount, Some(text)) => {
                session.last_selected_count = Some(count);
                Directive::Generate { text, count }
            }
            // Stale button press, e.g. after a restart dropped the session.
            _ => Directive::PromptForText,
        },
        SessionEvent::AddMore => {
            match (session.phase, &session.pending_text, session.last_selected_count) {
                (SessionPhase::AwaitingAction, Some(text), Some(count)) => Directive::Generate {
                    text: text.clone(),
                    count,
                },
                _ => Directive::PromptForText,
            }
        }
        SessionEvent::NewMessage => {
            *session = UserSession::default();
            Directive::PromptForText
        }
    }
}

/// Commits the advance into `AwaitingAction` after a batch actually
/// delivered output.
pub fn complete_generation(session: &mut UserSession) {
    session.phase = SessionPhase::AwaitingAction;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_round_trip_clears_the_pending_text() {
        let mut session = UserSession::default();

        let d = on_event(&mut session, SessionEvent::Text("hello world".into()));
        assert_eq!(d, Directive::AskCount);
        assert_eq!(session.phase, SessionPhase::AwaitingCount);

        let d = on_event(&mut session, SessionEvent::CountSelected(BatchSize::Two));
        assert_eq!(
            d,
            Directive::Generate {
                text: "hello world".into(),
                count: BatchSize::Two
            }
        );
        complete_generation(&mut session);
        assert_eq!(session.phase, SessionPhase::AwaitingAction);

        // "Add More" repeats with the remembered count and text.
        let d = on_event(&mut session, SessionEvent::AddMore);
        assert_eq!(
            d,
            Directive::Generate {
                text: "hello world".into(),
                count: BatchSize::Two
            }
        );
        complete_generation(&mut session);

        let d = on_event(&mut session, SessionEvent::NewMessage);
        assert_eq!(d, Directive::PromptForText);
        assert_eq!(session.phase, SessionPhase::Idle);
        assert_eq!(session.pending_text, None);
    }

    #[test]
    fn denial_leaves_the_machine_in_place() {
        let mut session = UserSession::default();
        on_event(&mut session, SessionEvent::Text("msg".into()));
        let d = on_event(&mut session, SessionEvent::CountSelected(BatchSize::Four));
        assert!(matches!(d, Directive::Generate { .. }));

        // The caller never committed the batch: still awaiting a count, with
        // the selection remembered.
        assert_eq!(session.phase, SessionPhase::AwaitingCount);
        assert_eq!(session.last_selected_count, Some(BatchSize::Four));
        assert_eq!(session.pending_text.as_deref(), Some("msg"));
    }

    #[test]
    fn new_text_while_awaiting_action_starts_a_fresh_cycle() {
        let mut session = UserSession::default();
        on_event(&mut session, SessionEvent::Text("first".into()));
        on_event(&mut session, SessionEvent::CountSelected(BatchSize::Two));
        complete_generation(&mut session);

        let d = on_event(&mut session, SessionEvent::Text("second".into()));
        assert_eq!(d, Directive::AskCount);
        assert_eq!(session.phase, SessionPhase::AwaitingCount);
        assert_eq!(session.pending_text.as_deref(), Some("second"));
    }

    #[test]
    fn stale_buttons_fall_back_to_a_prompt() {
        let mut session = UserSession::default();
        assert_eq!(
            on_event(&mut session, SessionEvent::AddMore),
            Directive::PromptForText
        );
        assert_eq!(
            on_event(&mut session, SessionEvent::CountSelected(BatchSize::Two)),
            Directive::PromptForText
        );
        assert_eq!(session.phase, SessionPhase::Idle);
    }
}
