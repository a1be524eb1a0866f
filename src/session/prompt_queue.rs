//! Ordered interactive prompts with priority interrupts.
//!
//! At most one prompt is live (shown and waiting for a line). Others wait in
//! one of two tiers: priority prompts ahead of normal ones, FIFO within each
//! tier. A priority prompt arriving while a normal prompt is live preempts
//! it: the live prompt goes back to the front of the normal tier and is shown
//! again once the priority prompts are answered.
//!
//! The queue is plain data. Callers keep it behind a synchronous mutex and
//! never hold the lock across an await.

use std::collections::VecDeque;

use tokio::sync::oneshot;
use tracing::debug;

/// A question waiting for one line of input.
#[derive(Debug)]
pub struct PendingPrompt {
    /// Text shown to the operator.
    pub question: String,
    /// Whether the prompt may interrupt a normal one.
    pub priority: bool,
    responder: oneshot::Sender<String>,
}

/// Two-tier prompt queue plus the live slot.
#[derive(Debug, Default)]
pub struct PromptQueue {
    current: Option<PendingPrompt>,
    priority: VecDeque<PendingPrompt>,
    normal: VecDeque<PendingPrompt>,
    closed: bool,
}

impl PromptQueue {
    /// Empty, open queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue `question`.
    ///
    /// Returns the receiver for the answer and, when the live prompt
    /// changed as a result, the question that must now be shown. After
    /// [`PromptQueue::close`] the receiver resolves to an error at once.
    pub fn ask(
        &mut self,
        question: impl Into<String>,
        priority: bool,
    ) -> (oneshot::Receiver<String>, Option<String>) {
        let (responder, receiver) = oneshot::channel();
        if self.closed {
            return (receiver, None);
        }

        let prompt = PendingPrompt {
            question: question.into(),
            priority,
            responder,
        };

        let shown = match self.current.take() {
            None => Some(self.make_current(prompt)),
            Some(live) if priority && !live.priority => {
                debug!(preempted = %live.question, "priority prompt preempts live prompt");
                self.normal.push_front(PendingPrompt {
                    priority: false,
                    ..live
                });
                Some(self.make_current(prompt))
            }
            Some(live) => {
                self.current = Some(live);
                if priority {
                    self.priority.push_back(prompt);
                } else {
                    self.normal.push_back(prompt);
                }
                None
            }
        };
        (receiver, shown)
    }

    /// Answer the live prompt with `line` and promote the next one.
    ///
    /// Returns `None` when no prompt was live (the line is unclaimed).
    /// Otherwise returns `Some(next)`, where `next` is the question now
    /// live, if any.
    pub fn answer(&mut self, line: impl Into<String>) -> Option<Option<String>> {
        let live = self.current.take()?;
        if live.responder.send(line.into()).is_err() {
            debug!(question = %live.question, "prompt answered after its asker went away");
        }
        Some(self.promote())
    }

    /// Question of the live prompt.
    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.current.as_ref().map(|p| p.question.as_str())
    }

    /// Whether the live prompt is a priority prompt.
    #[must_use]
    pub fn current_is_priority(&self) -> bool {
        self.current.as_ref().is_some_and(|p| p.priority)
    }

    /// Number of prompts waiting behind the live one.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.priority.len() + self.normal.len()
    }

    /// Drop every prompt and refuse new ones. Outstanding receivers resolve
    /// to an error.
    pub fn close(&mut self) {
        self.closed = true;
        self.current = None;
        self.priority.clear();
        self.normal.clear();
    }

    /// Whether [`PromptQueue::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn make_current(&mut self, prompt: PendingPrompt) -> String {
        let question = prompt.question.clone();
        self.current = Some(prompt);
        question
    }

    fn promote(&mut self) -> Option<String> {
        while let Some(next) = self.priority.pop_front().or_else(|| self.normal.pop_front()) {
            if next.responder.is_closed() {
                continue;
            }
            return Some(self.make_current(next));
        }
        None
    }
}
