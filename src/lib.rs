//! whosaid - "Who said it?" party quiz generator
//!
//! Cleans exported chat history, selects distinctive messages by their
//! distance from the mean sentence embedding, and votes plausible look-alike
//! authors for each one from its nearest neighbours. A small persisted game
//! state lets a host and players run the quiz.

pub mod candidates;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod filtering;
pub mod messages;
pub mod pipeline;
pub mod quiz;
pub mod session;
pub mod storage;

pub use error::{Result, WhosaidError};
