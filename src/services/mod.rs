//! Operations behind the HTTP handlers.
//!
//! Each function reads from a [`QuizStore`](crate::store::QuizStore), runs the
//! engine, and writes back. Callers pass `now` so tests control the clock.

pub mod attempt;
pub mod quizzes;
pub mod reports;
