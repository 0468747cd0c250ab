//! GitHub-backed implementations of the engine's collaborator traits.

mod api;
mod web;

pub use api::OctocrabGithub;
pub use web::WebClient;
