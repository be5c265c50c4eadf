pub mod assessment;
pub mod conversation;
pub mod health;
pub mod questionnaires;
