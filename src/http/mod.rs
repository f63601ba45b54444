//! HTTP and WebSocket server
//!
//! - GET /ws - Signaling socket (one session per connection)
//! - GET /sessions/:id/status - Query session status
//! - POST /recordings/combine - Run the Combine Pipeline
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
