//! Services module - import plumbing and the engine command interface.
//!
//! Nothing in here touches view state. Services run on producer threads or
//! import workers and report back through channels and observer traits, so
//! they can be tested without a consumer loop.
//!
//! # Components
//!
//! - [`DeferredQueue`]: FIFO with a wake hook that keeps retrying until a
//!   consumer exists. Used for both import streams.
//!
//! - [`ImportCoordinator`]: Owns the file and link queues and processes each
//!   drained item in arrival order:
//!   - File imports are copied into the mods directory under a free
//!     `name (n).ext` name ([`destination`])
//!   - Link imports are parsed by [`LinkParser`] and handed to the
//!     [`ArchivePipeline`]
//!   - Each completed item asks the engine to reload
//!
//! - [`ArchivePipeline`]: Downloads to a single scratch file, sniffs the
//!   container (7z, RAR, ZIP) and extracts entries with the mod extension.
//!
//! - [`Engine`] / [`EngineHost`]: Fire-and-forget command trait for the mod
//!   engine and the background thread it runs on. [`CatalogBackend`] is the
//!   directory-listing engine used by the binary.
//!
//! # Usage Example
//!
//! ```ignore
//! use bmodloader::services::ImportCoordinator;
//!
//! let coordinator = ImportCoordinator::new(config, downloader, engine, observer, metrics);
//! let submitter = coordinator.submitter();
//!
//! // From any thread, even before the consumer loop exists
//! submitter.submit_file("C:/Downloads/cool.bmod");
//! submitter.submit_url("bmodloader://mod,12345,67890");
//! ```

pub mod archive;
pub mod deferred_queue;
pub mod destination;
pub mod engine;
pub mod import;

pub use archive::{ArchiveError, ArchiveFormat, ArchiveOutcome, ArchivePipeline, Downloader, HttpDownloader};
pub use deferred_queue::{DeferredQueue, Drain, WakeError};
pub use engine::{CatalogBackend, Engine, EngineBackend, EngineClient, EngineCommand, EngineError, EngineHost};
pub use import::{
    ImportCoordinator, ImportError, ImportLink, ImportObserver, ImportProgress, ImportSubmitter, LinkParser,
};
