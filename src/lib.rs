//! # groundbench
//!
//! A local lexical retrieval index with a benchmark harness for checking
//! that answers can be grounded in a curated corpus.
//!
//! The retrieval logic lives in `groundbench-core`; this crate owns
//! everything that touches the outside world: configuration, scanning,
//! index files, report files, and terminal output.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  [[sources]]│──▶│ IndexBuilder │──▶│ records.jsonl│
//! │  [[links]]  │   │  (core)      │   │ meta.json    │
//! └─────────────┘   └──────────────┘   └──────┬───────┘
//!                                             │
//!                      ┌──────────────────────┤
//!                      ▼                      ▼
//!                 ┌──────────┐          ┌──────────┐
//!                 │ gb query │          │ gb bench │──▶ JSON + Markdown
//!                 └──────────┘          └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`connector_fs`] | Filesystem and link sources |
//! | [`ingest`] | `gb build` |
//! | [`index_store`] | Index persistence |
//! | [`search`] | `gb query` |
//! | [`render`] | Text, JSON and Markdown result adapters |
//! | [`bench`] | `gb bench` and report writing |
//! | [`bank`] | Question bank conversion |
//! | [`stats`] | `gb stats` |
//! | [`progress`] | stderr progress reporting |
//! | [`logging`] | `tracing` subscriber setup |

pub mod bank;
pub mod bench;
pub mod config;
pub mod connector_fs;
pub mod index_store;
pub mod ingest;
pub mod logging;
pub mod progress;
pub mod render;
pub mod search;
pub mod stats;
