//! # analyze-image
//!
//! Audits one web image. Given the encoded bytes and, optionally, how a
//! browser lays the image out, it reports what the image is, what it could be
//! (smaller re-encodings, a right-sized copy, modern-format alternates) and
//! which best practices it breaks.
//!
//! ```text
//! bytes + browser data
//!   → ContentType                         stats.{format,mimeType,fileSize,width,height,animated}
//!   → DisplayStats, Optimize, Reformat    stats.display*, transforms.{optimized,webpEncoded,avifEncoded}
//!   → offenders, Resize                   offenders.*, transforms.resized
//!   → ScaledDown                          offenders.imageScaledDown
//!   → Report (JSON)
//! ```
//!
//! # Architecture: Dependency-Driven Modules
//!
//! Every analysis step is a [`pipeline::Module`] that declares the envelope
//! keys it reads. The runner never hard-codes an order: each round it asks the
//! [`pipeline::resolve`] step which pending modules have their inputs, runs
//! those in parallel against a frozen snapshot of the envelope and merges the
//! fragments they return. A module never sees a partially merged round.
//!
//! A module that fails is logged and dropped. The keys it would have written
//! stay absent, so modules depending on them are never scheduled and the rest
//! of the report still gets produced. Only a failure to identify the image at
//! all aborts the run.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`analyze`] | Public entry point: input validation, running, report shaping |
//! | [`envelope`] | The result document (`stats`, `transforms`, `offenders`) and its keys |
//! | [`pipeline`] | Module trait, catalogue, dependency resolver and round runner |
//! | [`modules`] | The ten catalogue members |
//! | [`imaging`] | Codec adapter: format sniffing, identify, re-encode, resize; display math |
//! | [`config`] | `Options`: stock defaults, `config.toml` merging, validation |
//! | [`types`] | Browser layout data supplied by the caller |
//! | [`output`] | CLI text summary of a report |
//!
//! # Design Decisions
//!
//! ## Snapshots Instead of Shared Mutable State
//!
//! Modules get `&Envelope`, never `&mut`. Two modules of one round can
//! therefore run on different threads without locks, and the merge step is
//! the single place that checks no key is ever written twice.
//!
//! ## Pure-Rust Codecs
//!
//! [`imaging::RustBackend`] uses the `image` crate family, `oxipng` and
//! `avif-parse`. Lossy WebP goes through `webp`, since `image` only ships a
//! lossless WebP encoder. The backend sits behind [`imaging::ImageBackend`],
//! so the whole pipeline is tested against a recording mock.

pub mod analyze;
pub mod config;
pub mod envelope;
pub mod imaging;
pub mod modules;
pub mod output;
pub mod pipeline;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use analyze::{AnalyzeError, ImageInput, Report, analyze};
pub use config::Options;
pub use imaging::RustBackend;
pub use types::BrowserData;
