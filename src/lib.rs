//! roomchat — room chat session core, token issuing and a websocket relay.
//!
//! ARCHITECTURE
//! ============
//! The client side is a pair of session managers behind one trait
//! ([`session::ChatSession`]): a live manager that drives a real room
//! transport, and a mock simulator that fakes a lively room with timers and
//! random draws. The server side issues room access tokens and relays data
//! messages between the members of a room. An optional in-process assistant
//! ([`agent`]) sits in configured rooms and answers `@agent` mentions
//! through an LLM ([`llm`]).

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod provider;
pub mod routes;
pub mod services;
pub mod session;
pub mod state;
pub mod token;
pub mod transport;
pub mod types;
