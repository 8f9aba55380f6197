pub mod auth;
pub mod envelope;
pub mod leads;
pub mod middleware;
pub mod sessions;
pub mod state;

// Re-export the pieces the binary needs to build the router.
pub use leads::ApiDoc;
pub use middleware::require_auth;
