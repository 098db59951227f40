//! A client for [archive.today](https://archive.today): snapshot URLs and
//! list the snapshots it already has of them.
//!
//! ```no_run
//! # async fn run() -> archive_today::error::Result<()> {
//! use archive_today::{ArchiveToday, RandomUserAgent, ReqwestTransport, SnapshotOptions};
//!
//! let transport = ReqwestTransport::new(false /*verbose*/)?;
//! let archive = ArchiveToday::new(&transport, &RandomUserAgent);
//! let snapshot = archive
//!     .snapshot(&SnapshotOptions::new("https://example.com/"))
//!     .await?;
//! println!("{}", snapshot.url);
//! # Ok(())
//! # }
//! ```

#![warn(
    clippy::all,
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_import_braces,
    unused_qualifications
)]

pub mod archive;
pub mod config;
pub mod error;
pub mod http;
pub mod parse;
pub mod user_agent;

pub use crate::{
    archive::{
        ArchiveToday, Memento, RenewPolicy, Snapshot, SnapshotOptions, TimemapOptions,
        WipPollPolicy,
    },
    http::{HttpTransport, ReqwestTransport},
    user_agent::{FixedUserAgent, RandomUserAgent, UserAgentProvider},
};
