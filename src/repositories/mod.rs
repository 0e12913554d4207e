pub(crate) mod health;
pub(crate) mod modules;
pub(crate) mod questions;
pub(crate) mod quizzes;
pub(crate) mod results;
pub(crate) mod users;
