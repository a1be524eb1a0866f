//! Line-oriented questions to the operator.
//!
//! [`Prompter`] wraps a [`PromptQueue`] and the [`Presenter`]. Input lines are
//! fed in with [`Prompter::answer_line`] by whoever reads the terminal; askers
//! await their answer. Tool approvals are asked at priority so they
//! interrupt the regular input prompt.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use super::presenter::Presenter;
use super::prompt_queue::PromptQueue;
use crate::tools::{ApprovalRequest, Approver, BoxFuture};

/// Shared handle for asking questions. Cheap to clone.
#[derive(Clone)]
pub struct Prompter {
    queue: Arc<Mutex<PromptQueue>>,
    presenter: Arc<dyn Presenter>,
}

impl Prompter {
    /// Prompter showing questions through `presenter`.
    #[must_use]
    pub fn new(presenter: Arc<dyn Presenter>) -> Self {
        Self {
            queue: Arc::new(Mutex::new(PromptQueue::new())),
            presenter,
        }
    }

    /// Ask `question` and wait for the line that answers it.
    ///
    /// Returns `None` when the prompter is closed before an answer arrives.
    pub async fn ask(&self, question: &str, priority: bool) -> Option<String> {
        let (receiver, shown) = self.queue().ask(question, priority);
        if let Some(shown) = shown {
            self.presenter.prompt(&shown);
        }
        receiver.await.ok()
    }

    /// Ask a yes/no question.
    ///
    /// Answers starting with `y` or `Y` are yes; an empty answer takes
    /// `default_yes`; anything else, or a closed prompter, is no.
    pub async fn yes_no(&self, question: &str, default_yes: bool, priority: bool) -> bool {
        let suffix = if default_yes { "[Y/n]" } else { "[y/N]" };
        let Some(answer) = self.ask(&format!("{question} {suffix}"), priority).await else {
            return false;
        };
        let answer = answer.trim();
        if answer.is_empty() {
            default_yes
        } else {
            answer.starts_with(['y', 'Y'])
        }
    }

    /// Deliver one input line to the live prompt.
    ///
    /// Returns `false` when no prompt was waiting; the line is discarded.
    pub fn answer_line(&self, line: &str) -> bool {
        let outcome = self.queue().answer(line);
        match outcome {
            None => {
                debug!("input line with no live prompt discarded");
                false
            }
            Some(next) => {
                if let Some(next) = next {
                    self.presenter.prompt(&next);
                }
                true
            }
        }
    }

    /// Question currently waiting for input.
    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.queue().current().map(str::to_owned)
    }

    /// Abandon every outstanding question; pending `ask` calls return `None`.
    pub fn close(&self) {
        self.queue().close();
    }

    fn queue(&self) -> MutexGuard<'_, PromptQueue> {
        match self.queue.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Approver for Prompter {
    fn approve(&self, request: ApprovalRequest) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            if let Some(preview) = request.preview.as_deref() {
                self.presenter.preview(preview);
            }
            self.yes_no(&request.prompt, request.default_yes, true).await
        })
    }
}
