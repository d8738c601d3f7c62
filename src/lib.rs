//! # photo-lens
//!
//! A Rust web service for uploading photos and retrieving them later with
//! natural-language or voice queries. Each upload is annotated by a vision
//! model (object labels, recognized people, OCR text), embedded as a text
//! vector, and stored in a vector index. Queries run through a staged
//! ranking pipeline that layers exact entity matching, vector similarity,
//! vision re-analysis, and keyword/OCR fallbacks.
//!
//! ## Architecture
//!
//! The ranking pipeline is an ordered sequence of stages with a
//! short-circuit: later stages run only while the accumulated result
//! count is below `min_desired_results`, because they are strictly more
//! expensive or less precise.
//!
//! ```text
//!                      ┌──────────────┐
//!                      │  User Query   │
//!                      └──────┬────────┘
//!                             ▼
//!              ┌───────────────────────────────┐
//!              │ 1. Exact/partial entity match  │  highest precision
//!              └──────────────┬────────────────┘
//!                             ▼
//!              ┌───────────────────────────────┐
//!              │ 2. Entity-category match       │  "famous person" queries
//!              └──────────────┬────────────────┘
//!                             │  enough results? ── yes ──▶ stop
//!                             ▼
//!              ┌───────────────────────────────┐
//!              │ 3. Semantic match              │  embedding similarity
//!              │    (skipped for name queries)  │  or vision re-analysis
//!              └──────────────┬────────────────┘
//!                             ▼
//!              ┌───────────────────────────────┐
//!              │ 4. Keyword fallback (labels)   │
//!              └──────────────┬────────────────┘
//!                             ▼
//!              ┌───────────────────────────────┐
//!              │ 5. OCR text fallback           │  text-shaped queries only
//!              └──────────────┬────────────────┘
//!                             ▼
//!              ┌───────────────────────────────┐
//!              │ Dedup + sort + top-K           │
//!              └───────────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, external services, and ranking thresholds
//! - [`models`] - Shared data types: `ImageRecord`, `AnnotationResult`, `MatchCandidate`, request/response types
//! - [`error`] - HTTP error mapping for the axum handlers
//! - [`features`] - Normalizes raw annotations into the canonical searchable record shape
//! - [`embed`] - Text embedding backends (HTTP providers + deterministic hash fallback) with a first-success chain
//! - [`index`] - Vector index adapters: Qdrant over REST, plus an in-memory backend
//! - [`vision`] - Vision service clients: image annotation and per-candidate relevance scoring
//! - [`search`] - The staged match-and-rank pipeline and the result formatter
//! - [`api`] - Axum HTTP handlers for upload, search, image serving, and health
//! - [`state`] - Shared application state holding the index, clients, and config

pub mod api;
pub mod config;
pub mod embed;
pub mod error;
pub mod features;
pub mod index;
pub mod models;
pub mod search;
pub mod state;
pub mod vision;
