pub mod assessment;
pub mod health;
pub mod questionnaire;
pub mod token;
