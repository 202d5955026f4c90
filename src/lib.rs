#![forbid(unsafe_code)]
//! Localization ledger for Rust.
//!
//! Merges Apple `.strings` files, Android `strings.xml` resources and reference translations
//! into one [`Ledger`], stores it as a diff-friendly table and exports it back to the platform
//! files with their whitespace and comments intact.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::{collections::HashMap, path::Path};
//! use locledger::{ExportOptions, Ledger, Platform, TableOptions, project};
//!
//! let folders = HashMap::from([("fr.lproj".to_string(), "fr".to_string())]);
//! let mut ledger = Ledger::new();
//! project::import_strings_project(&mut ledger, Path::new("App"), &folders)?;
//! ledger.save(Path::new("ledger.csv"), &TableOptions::default())?;
//!
//! let report = ledger.export_platform_files(
//!     Platform::Apple,
//!     Path::new("App"),
//!     &folders,
//!     &ExportOptions::default(),
//! );
//! assert!(report.failures.is_empty());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Environments
//!
//! - **`Xcode`**: keys of Apple `.strings` files
//! - **`Android`**: keys of Android `strings.xml` resources
//! - **`RefLoc`**: reference translations, stored as placeholder-rewrite mappings

pub mod error;
pub mod formats;
pub mod ledger;
pub mod mapping;
pub mod options;
pub mod placeholder;
pub mod project;
pub mod provenance;
pub mod reference;
pub mod traits;
pub mod types;

// Re-export most used types for easy consumption
pub use crate::{
    error::Error,
    formats::{FormatType, LocatedFile},
    ledger::{ExportReport, Ledger, MergeStyle, Platform, PlatformFiles, RenderedFiles},
    mapping::{KeyMapping, MappingComponent, ValueTransformer},
    options::{ExportOptions, StringsEncoding, TableOptions},
    reference::{RefLocFile, RemoteKeySource},
    types::{LineKey, LineValue, TaggedString},
};
