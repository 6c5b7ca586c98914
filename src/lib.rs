//! # passage-qa
//!
//! Extractive question answering over a local document corpus with hybrid
//! (keyword + semantic) retrieval.
//!
//! passage-qa ingests PDF documents into SQLite (chunked on paragraph
//! boundaries with page tracking, indexed in FTS5, embedded into a vector
//! table) and answers natural-language questions by fusing lexical and
//! semantic relevance signals, extracting the most query-relevant snippets
//! from the top passages, and attaching citations. When confidence is too
//! low it abstains rather than guessing. No generative model is involved:
//! answers are built only from retrieved text.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────┐
//! │ sources  │──▶│  Ingestion    │──▶│  SQLite    │
//! │ (PDFs)   │   │ Chunk+Embed  │   │ FTS5+Vec  │
//! └──────────┘   └──────────────┘   └────┬──────┘
//!                                        │
//!                  question ──▶ lexical ─┤─ vector
//!                                   │    │    │
//!                                   ▼    ▼    ▼
//!                               fusion (min-max + alpha)
//!                                        │
//!                                        ▼
//!                               answer + citations
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pqa init                      # create database
//! pqa ingest                    # chunk, index, and embed the corpus
//! pqa ask "What protection is required in zone 4?"
//! pqa serve                     # start the HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`chunker`] | Paragraph-boundary chunking with page tracking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Typed chunk/source metadata lookups |
//! | [`search`] | Lexical, vector, and hybrid search |
//! | [`answer`] | Confidence gate, snippets, citations |
//! | [`service`] | Per-question orchestration |
//! | [`ingest`] | PDF ingestion pipeline |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod answer;
pub mod chunker;
pub mod config;
pub mod db;
pub mod embedding;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod search;
pub mod server;
pub mod service;
pub mod store;
