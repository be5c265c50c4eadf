pub mod auth;
pub mod conversation;
pub mod error;
pub mod extraction;
pub mod history;
pub mod progression;
pub mod questionnaire;
