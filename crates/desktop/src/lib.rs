//! `caravan-desktop`
//!
//! Application shell over the store: shared [`AppState`], typed
//! [`AppCommand`]s with a single dispatcher, and the command-line front end.

pub mod cli;
pub mod commands;
pub mod state;

pub use commands::{AppCommand, CommandOutcome, dispatch, user_message};
pub use state::AppState;
