//! # docsage
//!
//! A small retrieval-augmented generation backend.
//!
//! Documents (PDF, DOCX, plain text, Markdown) are uploaded, reduced to plain
//! text, embedded through a remote embedding API and stored in SQLite. A
//! question is embedded the same way, compared against every stored vector by
//! cosine similarity, and the best matches are handed to a generative model
//! as context for the answer.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌───────────┐   ┌──────────┐
//! │  Upload  │──▶│  Extract  │──▶│   Embed   │──▶│  SQLite  │
//! └──────────┘   └───────────┘   └───────────┘   └────┬─────┘
//!                                                     │
//! ┌──────────┐   ┌───────────┐   ┌───────────┐        │
//! │  Answer  │◀──│ Generate  │◀──│   Rank    │◀───────┘
//! └──────────┘   └───────────┘   └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docsage init                          # create database
//! docsage ingest ./handbook.pdf         # extract, embed, store
//! docsage query "What is the refund policy?"
//! docsage serve                         # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`error`] | Validation / upstream / storage error taxonomy |
//! | [`models`] | Core data types |
//! | [`similarity`] | Cosine similarity |
//! | [`rank`] | Top-K retrieval |
//! | [`store`] | Document store trait with SQLite and in-memory backends |
//! | [`extract`] | Text extraction keyed on file extension |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`generation`] | Text generation provider abstraction |
//! | [`rag`] | Upload and query orchestration |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod migrate;
pub mod models;
pub mod rag;
pub mod rank;
pub mod server;
pub mod similarity;
pub mod store;
