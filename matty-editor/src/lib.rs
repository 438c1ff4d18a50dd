//! # Matty Editor
//!
//! The editing façade for Matty designs and the `matty` command line.
//!
//! ## Architecture
//!
//! ```text
//! intents ──► Editor ──► Document ops ──► History ──► Renderer ──► Surface
//!               │                                       ▲
//!               ├── decode futures (FuturesUnordered) ──┘
//!               └── DesignRepository (DesignStore | HttpDesignClient)
//! ```
//!
//! - [`Editor`] owns the live document, undo/redo history, the preview
//!   surface and in-flight image decodes.
//! - [`HttpDesignClient`] talks to `matty-server` over its REST API.
//! - [`cli`] wires both into the `matty` binary.
//!
//! ## Usage
//!
//! ```bash
//! matty export poster.json -o poster.png
//! matty save poster.json --server http://127.0.0.1:9474 --owner alice
//! matty fetch <id> --owner alice -o poster.png
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod client;
pub mod controller;
pub mod error;

pub use cli::{run, CliArgs, Command};
pub use client::{ClientError, HttpDesignClient, OWNER_HEADER};
pub use controller::{DecodeEvent, Editor, EditorConfig, ExportedImage, Shape};
pub use error::{EditorError, EditorResult};
