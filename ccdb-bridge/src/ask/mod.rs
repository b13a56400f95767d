//! The interactive-question flow: answer routing, UI rendering and the
//! collection loop that turns clicks into the next prompt.

pub mod bus;
pub mod collector;
pub mod views;

pub use bus::AnswerBus;
pub use collector::{ASK_ANSWER_TIMEOUT, collect_ask_answers};
pub use views::{AskComponent, AskViewRegistry, ask_components};
