//! Interactive session layer.
//!
//! - `router`: feeds connection events to the reassembler, presenter and
//!   tool dispatcher.
//! - `prompt_queue` / `prompter`: ordered operator questions with priority
//!   interrupts.
//! - `presenter`: the display surface.

pub mod presenter;
pub mod prompt_queue;
pub mod prompter;
pub mod router;

pub use presenter::{ConsolePresenter, Presenter};
pub use prompter::Prompter;
pub use router::{InboundEvent, SessionOutbox, SessionRouter};
