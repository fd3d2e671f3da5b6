pub mod agent;
pub mod clubs;
pub mod middleware;
pub mod protocol;
pub mod relay;
pub mod rest;
pub mod state;

// Re-export the router so the binary and the integration tests build the
// same application.
pub use rest::{router, ApiDoc};
pub use state::AppState;
