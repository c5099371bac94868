//! Client facade: one controller, one session, one catalog snapshot
//!
//! `DbNetClient` is what hosts hold. It serializes all exchanges through an
//! internal mutex (the wire format allows one outstanding request) and
//! publishes the catalog as an atomically swapped snapshot, so readers never
//! need a lock and never see a half-built table.

use crate::catalog::{self, Catalog};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::poller::{self, ValueOutcome};
use crate::protocol::Value;
use crate::session::{Session, SessionState};
use crate::transport::{Transport, UdpTransport};
use crate::writer;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Summary of a catalog (re)load, for host-side reporting
#[derive(Debug, Clone)]
pub struct CatalogReport {
    /// Variables in the new snapshot
    pub variables: usize,
    /// Enumeration indexes lost to communication failures
    pub gaps: Vec<u32>,
    /// Names the controller reported for more than one WID
    pub name_collisions: Vec<String>,
}

/// Client for one DB-Net/IP controller
pub struct DbNetClient {
    session: Mutex<Session>,
    catalog: ArcSwap<Catalog>,
    pacing: Duration,
}

impl DbNetClient {
    /// Connect over UDP and handshake with the controller
    pub fn connect(config: &Config) -> Result<DbNetClient> {
        config.validate()?;
        let transport = UdpTransport::connect(&config.connection.host, config.connection.port)?;
        Self::with_transport(Box::new(transport), config)
    }

    /// Connect over a caller-supplied transport (tests, alternative links)
    pub fn with_transport(transport: Box<dyn Transport>, config: &Config) -> Result<DbNetClient> {
        let session = Session::open(transport, config)?;
        Ok(DbNetClient {
            session: Mutex::new(session),
            catalog: ArcSwap::from_pointee(Catalog::empty()),
            pacing: config.timing.read_pacing(),
        })
    }

    /// Current catalog snapshot
    ///
    /// The snapshot stays valid for as long as the `Arc` is held, even across
    /// a concurrent reload.
    pub fn catalog(&self) -> Arc<Catalog> {
        self.catalog.load_full()
    }

    /// Enumerate the controller's variable table and publish the snapshot
    ///
    /// The swap is atomic: concurrent readers observe either the previous or
    /// the new catalog in full.
    pub fn load_catalog(&self) -> Result<CatalogReport> {
        let load = {
            let mut session = self.session.lock();
            catalog::load_catalog(&mut session, self.pacing)?
        };
        let report = CatalogReport {
            variables: load.catalog.len(),
            gaps: load.gaps,
            name_collisions: load.name_collisions,
        };
        self.catalog.store(Arc::new(load.catalog));
        Ok(report)
    }

    /// Re-enumerate after a controller program change
    pub fn reload_catalog(&self) -> Result<CatalogReport> {
        self.load_catalog()
    }

    /// Sweep the given WIDs once
    pub fn poll(&self, wids: &[u16]) -> Vec<(u16, ValueOutcome)> {
        let catalog = self.catalog.load_full();
        let mut session = self.session.lock();
        poller::poll(&mut session, &catalog, wids, self.pacing)
    }

    /// Read a single variable by its catalog name
    pub fn read_by_name(&self, name: &str) -> Result<Value> {
        let catalog = self.catalog.load_full();
        let var = catalog
            .by_name(name)
            .ok_or_else(|| Error::InvalidParameter(format!("unknown variable: {}", name)))?;
        let mut session = self.session.lock();
        poller::read_variable(&mut session, var)
    }

    /// Write a value to a catalog variable, waiting for the acknowledgement
    pub fn write(&self, wid: u16, value: Value) -> Result<()> {
        let catalog = self.catalog.load_full();
        let mut session = self.session.lock();
        writer::write_value(&mut session, &catalog, wid, value)
    }

    /// Write by catalog name
    pub fn write_by_name(&self, name: &str, value: Value) -> Result<()> {
        let wid = self
            .catalog
            .load_full()
            .wid_for_name(name)
            .ok_or_else(|| Error::InvalidParameter(format!("unknown variable: {}", name)))?;
        self.write(wid, value)
    }

    /// Current session lifecycle state
    pub fn session_state(&self) -> SessionState {
        self.session.lock().state()
    }

    /// Tear the session down; subsequent operations fail with `NotConnected`
    pub fn close(&self) {
        self.session.lock().close();
    }
}
