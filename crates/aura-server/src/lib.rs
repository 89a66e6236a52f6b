//! `aura-server` – The WebSocket front door.
//!
//! Accepts long-lived WebSocket connections (default port `8080`) and runs
//! one session task per client. Each session:
//!
//! 1. **Decodes** every inbound text frame as a JSON envelope
//!    `{"messageType": ..., "behavior": {...}}`.
//! 2. **Routes** it to the shared [`KnowledgeStore`]:
//!    - `"feedback"` → [`KnowledgeStore::apply_feedback`], replies
//!      `"Feedback processed successfully"`.
//!    - `"retrieve"` → [`KnowledgeStore::snapshot`], replies with the
//!      pretty-printed score table.
//!    - anything else → `"Unknown message type"`.
//! 3. **Survives** malformed messages by replying with an error string; only
//!    a transport failure or a client close ends the session.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use aura_memory::KnowledgeStore;
//! use aura_server::FeedbackServer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(KnowledgeStore::new());
//!     let (_tx, shutdown) = tokio::sync::watch::channel(false);
//!     FeedbackServer::new(Arc::clone(&store))
//!         .run(shutdown)
//!         .await
//!         .expect("feedback server failed");
//! }
//! ```
//!
//! [`KnowledgeStore`]: aura_memory::KnowledgeStore
//! [`KnowledgeStore::apply_feedback`]: aura_memory::KnowledgeStore::apply_feedback
//! [`KnowledgeStore::snapshot`]: aura_memory::KnowledgeStore::snapshot

pub mod server;
pub mod session;

pub use server::{BoundServer, FeedbackServer, DEFAULT_PORT};
pub use session::{handle_message, run_session};
