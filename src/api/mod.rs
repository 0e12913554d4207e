pub(crate) mod auth;
pub(crate) mod errors;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod modules;
pub(crate) mod pagination;
pub(crate) mod questions;
pub(crate) mod quizzes;
pub(crate) mod response;
pub(crate) mod results;
pub(crate) mod router;
pub(crate) mod users;
pub(crate) mod validation;
