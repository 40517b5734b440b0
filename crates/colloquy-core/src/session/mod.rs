//! Session store — one directory per session, one file per logged message.
//!
//! # Disk format
//!
//! Each session lives under `<sessions>/<started_at>/` where `started_at` is
//! a `YYYYMMDD_HHMMSS` stamp. Every logged message is one whole file, written
//! then closed before the next is created, so a crash mid-turn leaves a
//! valid resumable prefix:
//!
//! - `{stamp}.{seq:04}.user.md` / `.system.md` / `.assistant.md` — plain text
//! - `{stamp}.{seq:04}.tool.md` — call id, name, args (JSON-escaped), status,
//!   then the result text
//! - `{stamp}.{seq:04}.note.md` — compaction note text
//! - `{stamp}.sum.md` — on-demand summary, not part of the replayed log

pub mod history;
pub mod store;

pub use history::{history_listing, list_sessions, session_id_at};
pub use store::Session;
