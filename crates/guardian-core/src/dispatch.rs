//! Notification dispatch to the presentation layer.
//!
//! The dispatcher is a thin seam between the engine and whatever UI is
//! active. It owns no moderation state. Registration is replace-not-stack:
//! there is exactly one active observer at a time, process-wide, and
//! registering a new one silently replaces the previous. A conversation view
//! registers itself while open for local bookkeeping continuity; when none is
//! registered, prompts are dropped with a log line rather than queued.

use guardian_ledger::ReceiverResponse;
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

/// Context for the three-choice sender prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct SenderPrompt {
    /// The interaction awaiting the sender's decision.
    pub interaction_id: Uuid,
    /// The withheld message text.
    pub message: String,
    /// The slice of text the detector matched.
    pub matched_span: String,
    /// Category-derived guidance to show alongside the choices.
    pub suggestion: String,
}

/// Context for the three-choice receiver prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverPrompt {
    /// The interaction the prompt correlates to.
    pub interaction_id: Uuid,
    /// The flagged message as delivered.
    pub message: String,
}

/// Informational outcome raised after an interaction resolves.
#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeNotice {
    /// Strikes were recorded; conversation continues.
    InteractionRecorded {
        /// Fractional strikes this interaction added.
        strikes_added: f64,
        /// Strike total as known to the notifying device.
        total: f64,
        /// The receiver's judgment.
        receiver_response: ReceiverResponse,
    },
    /// The receiver chose to leave the conversation.
    ConversationExit,
    /// The sender's strike total reached the limit; a corrective
    /// consequence is due. Takes precedence over the plain exit notice.
    LimitReached {
        /// Strike total at the time the limit was crossed.
        total: f64,
    },
}

/// Presentation-layer callbacks the engine drives.
///
/// Implementations render prompts and submit the chosen responses back into
/// the engine; they must not block.
pub trait ModerationObserver: Send + Sync {
    /// Present the sender's three choices for a freshly flagged message.
    fn prompt_sender(&self, prompt: &SenderPrompt);

    /// Present the receiver's three choices for a delivered flagged message.
    fn prompt_receiver(&self, prompt: &ReceiverPrompt);

    /// Show an informational outcome (strikes recorded, exit, limit).
    fn show_outcome(&self, notice: &OutcomeNotice);
}

/// Routes prompts to the single active observer.
#[derive(Default)]
pub struct Dispatcher {
    observer: Mutex<Option<Arc<dyn ModerationObserver>>>,
}

impl Dispatcher {
    /// New dispatcher with no observer registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer, silently replacing any previous one.
    pub fn register(&self, observer: Arc<dyn ModerationObserver>) {
        let mut slot = self.observer.lock().expect("observer lock poisoned");
        if slot.is_some() {
            debug!("replacing active moderation observer");
        }
        *slot = Some(observer);
    }

    /// Remove the active observer, if any.
    pub fn clear(&self) {
        *self.observer.lock().expect("observer lock poisoned") = None;
    }

    /// True if an observer is currently registered.
    pub fn has_observer(&self) -> bool {
        self.observer.lock().expect("observer lock poisoned").is_some()
    }

    pub(crate) fn prompt_sender(&self, prompt: &SenderPrompt) {
        match self.current() {
            Some(observer) => observer.prompt_sender(prompt),
            None => debug!(id = %prompt.interaction_id, "no observer for sender prompt"),
        }
    }

    pub(crate) fn prompt_receiver(&self, prompt: &ReceiverPrompt) {
        match self.current() {
            Some(observer) => observer.prompt_receiver(prompt),
            None => debug!(id = %prompt.interaction_id, "no observer for receiver prompt"),
        }
    }

    pub(crate) fn show_outcome(&self, notice: &OutcomeNotice) {
        match self.current() {
            Some(observer) => observer.show_outcome(notice),
            None => debug!(?notice, "no observer for outcome notice"),
        }
    }

    fn current(&self) -> Option<Arc<dyn ModerationObserver>> {
        self.observer.lock().expect("observer lock poisoned").clone()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("has_observer", &self.has_observer())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingObserver {
        sender_prompts: AtomicUsize,
        receiver_prompts: AtomicUsize,
    }

    impl ModerationObserver for CountingObserver {
        fn prompt_sender(&self, _: &SenderPrompt) {
            self.sender_prompts.fetch_add(1, Ordering::SeqCst);
        }
        fn prompt_receiver(&self, _: &ReceiverPrompt) {
            self.receiver_prompts.fetch_add(1, Ordering::SeqCst);
        }
        fn show_outcome(&self, _: &OutcomeNotice) {}
    }

    fn prompt() -> ReceiverPrompt {
        ReceiverPrompt {
            interaction_id: Uuid::new_v4(),
            message: "text".to_string(),
        }
    }

    #[test]
    fn no_observer_is_a_quiet_noop() {
        let dispatcher = Dispatcher::new();
        assert!(!dispatcher.has_observer());
        dispatcher.prompt_receiver(&prompt());
    }

    #[test]
    fn register_replaces_not_stacks() {
        let dispatcher = Dispatcher::new();
        let first = Arc::new(CountingObserver::default());
        let second = Arc::new(CountingObserver::default());

        dispatcher.register(first.clone());
        dispatcher.register(second.clone());
        dispatcher.prompt_receiver(&prompt());

        // Only the most recent registration sees the prompt.
        assert_eq!(first.receiver_prompts.load(Ordering::SeqCst), 0);
        assert_eq!(second.receiver_prompts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_removes_the_observer() {
        let dispatcher = Dispatcher::new();
        let observer = Arc::new(CountingObserver::default());
        dispatcher.register(observer.clone());
        dispatcher.clear();
        dispatcher.prompt_receiver(&prompt());
        assert_eq!(observer.receiver_prompts.load(Ordering::SeqCst), 0);
    }
}
