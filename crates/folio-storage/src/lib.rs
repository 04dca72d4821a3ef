//! Source discovery, output sinks and asset watching for Folio.
//!
//! This crate provides the I/O seams of the page compiler:
//!
//! - [`Source`] discovers raw page documents ([`RawDocument`])
//! - [`Sink`] receives finished pages ([`OutputDocument`])
//! - [`watch_paths`] reports debounced file-system changes in supporting
//!   directories (layouts, fragments, data, ...)
//!
//! Filesystem implementations are [`FsSource`] and [`FsSink`]. In-memory
//! [`MemorySource`] and [`MemorySink`] are available behind the `mock`
//! feature for tests.
//!
//! # Example
//!
//! ```ignore
//! use std::path::PathBuf;
//! use folio_storage::{FsSource, Source};
//!
//! let source = FsSource::new(PathBuf::from("src/pages"));
//! for doc in source.scan()? {
//!     println!("{}", doc.relative.display());
//! }
//! ```

mod debouncer;
mod document;
mod error;
mod event;
mod fs;
#[cfg(feature = "mock")]
mod mock;
mod source;
mod watch;

pub use document::{OutputDocument, RawDocument, SourceEvent};
pub use error::{StorageError, StorageErrorKind, StorageOp};
pub use event::{WatchEvent, WatchEventKind, WatchEventReceiver, WatchHandle};
pub use fs::{FsSink, FsSource, glob_entries};
#[cfg(feature = "mock")]
pub use mock::{MemorySink, MemorySource};
pub use source::{Sink, Source};
pub use watch::watch_paths;
