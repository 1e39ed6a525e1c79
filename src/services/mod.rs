// Services module - collaborators around the conversion pass

pub mod history;

// Metadata providers
pub mod tmdb;
