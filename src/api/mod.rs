// API module for the game-backlog HTTP server
// Serves the browser UI: filter vocabulary, search/browse pages, submissions

pub mod handlers;
pub mod models;
pub mod routes;
pub mod server;

pub use server::ApiServer;
