//! dbnet-io - DB-Net/IP client for AMiT programmable controllers
//!
//! This library speaks the controllers' proprietary UDP protocol: encrypted,
//! checksummed telegrams addressing named process variables by numeric index
//! (WID). It covers the full client lifecycle:
//!
//! - session handshake and key re-synchronization over a lossy link
//! - enumeration of the controller's variable catalog
//! - batch polling of typed values, with the disconnected-probe filter
//! - confirmed single-variable writes
//!
//! The [`client::DbNetClient`] facade is the usual entry point; the layers
//! underneath (transport, protocol codec, session, catalog, poller, writer)
//! are public for hosts that need finer control.

pub mod catalog;
pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod poller;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod writer;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogLoad, Variable};
pub use client::{CatalogReport, DbNetClient};
pub use config::Config;
pub use error::{Error, Result};
pub use poller::{UnavailableReason, ValueOutcome};
pub use protocol::{Value, VarType};
pub use session::{Session, SessionState};
