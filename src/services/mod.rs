pub(crate) mod account_security;
pub(crate) mod accounts;
pub(crate) mod grading;
pub(crate) mod notifier;
pub(crate) mod quiz_lifecycle;
