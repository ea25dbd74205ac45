pub mod cache;
pub mod dashboard;
pub mod fetcher;
pub mod health;
pub mod measurements;
pub mod open_meteo;
pub mod orchestrator;
pub mod recommendation;
pub mod validator;
