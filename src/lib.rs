//! # Docs Coordinator
//!
//! Fetch, cache, merge and analyze the collaboration trail of a shared
//! document (comments, replies, revisions, metadata) and produce a
//! [`CoordinationSnapshot`](models::CoordinationSnapshot): open questions,
//! recent decisions, suggested next steps, contributors, and a record of
//! which inputs could be gathered.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌─────────────┐
//! │  DocsApi     │──▶│  DocsClient  │──▶│ Coordinator │──▶ Snapshot
//! │ Drive / Docs │   │ cache+retry  │   │             │
//! └──────────────┘   └──────────────┘   └──────┬──────┘
//!                                              │
//!                    ┌──────────────┐   ┌──────▼──────┐
//!                    │  ChatModel   │◀──│  Analyzer   │
//!                    │  (OpenAI)    │   │  prompts    │
//!                    └──────────────┘   └─────────────┘
//! ```
//!
//! Partial failures are data: each fetch and the analysis report their own
//! errors, and the snapshot lists them in `data_completeness`.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`cache`] | In-memory TTL cache |
//! | [`retry`] | Exponential backoff for transient faults |
//! | [`models`] | Core data types |
//! | [`credentials`] | Bearer-token providers |
//! | [`docs_api`] | Raw document API access |
//! | [`client`] | Cached, retrying fetches |
//! | [`prompts`] | Analysis prompt rendering |
//! | [`llm`] | Structured-output chat completion |
//! | [`analyzer`] | Single-call coordination analysis |
//! | [`coordinator`] | Snapshot orchestration |
//! | [`formatter`] | Markdown report |
//! | [`server`] | HTTP API |

pub mod analyzer;
pub mod cache;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod docs_api;
pub mod formatter;
pub mod llm;
pub mod models;
pub mod prompts;
pub mod retry;
pub mod server;
