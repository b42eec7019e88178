pub mod core;
pub mod halls;
pub mod seating;
pub mod setup;
pub mod students;
