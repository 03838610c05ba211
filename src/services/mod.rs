//! Domain services used by the websocket relay route.
//!
//! ARCHITECTURE
//! ============
//! Service modules own room membership and fan-out so route handlers can
//! stay focused on protocol translation and token checks.

pub mod room;
