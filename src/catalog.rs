//! Variable catalog model and enumeration loader
//!
//! Controllers expose their variable table through a reserved memory window;
//! the loader walks it entry by entry until the table stops yielding. The
//! resulting `Catalog` is immutable: reloads build a fresh one and the
//! client swaps the shared snapshot wholesale, so readers never observe a
//! half-built table.

use crate::classify;
use crate::error::{Error, Result};
use crate::protocol::frame::build_read_memory;
use crate::protocol::VarType;
use crate::session::Session;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Base address of the variable-table memory window
pub const CATALOG_BASE_ADDR: u32 = 0xFFFD_0000;
/// Bytes requested per table entry
pub const CATALOG_ENTRY_LEN: u16 = 26;
/// Hard bound on enumeration, in case a station never stops answering
pub const MAX_CATALOG_ENTRIES: u32 = 1500;
/// Consecutive unproductive indexes that end the enumeration
pub const MAX_CONSECUTIVE_MISSES: u32 = 10;
/// Accepted WID window; entries outside it are table noise
pub const WID_MIN: u16 = 4000;
pub const WID_MAX: u16 = 6000;

/// One catalog entry, immutable once read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// Controller-assigned variable index
    pub wid: u16,
    /// Program-assigned name (latin-1 on the wire)
    pub name: String,
    /// Declared wire type
    pub var_type: VarType,
    /// Writability per the name heuristic; hosts may override
    pub writable: bool,
}

impl Variable {
    pub fn new(wid: u16, name: &str, var_type: VarType) -> Variable {
        Variable {
            wid,
            name: name.to_string(),
            var_type,
            writable: !classify::is_readonly_name(name),
        }
    }

    /// Simple-typed variables can be polled and written
    pub fn is_readable(&self) -> bool {
        self.var_type.is_simple()
    }
}

/// The enumerated variable table of one controller
#[derive(Debug, Default)]
pub struct Catalog {
    by_wid: BTreeMap<u16, Variable>,
    by_name: HashMap<String, u16>,
}

impl Catalog {
    /// Catalog with no entries
    pub fn empty() -> Catalog {
        Catalog::default()
    }

    /// Build a catalog from descriptors; duplicate names resolve last-wins
    pub fn from_variables<I: IntoIterator<Item = Variable>>(vars: I) -> Catalog {
        Self::build(vars).0
    }

    /// Build a catalog, reporting the names that collided
    pub fn build<I: IntoIterator<Item = Variable>>(vars: I) -> (Catalog, Vec<String>) {
        let mut catalog = Catalog::default();
        let mut collisions = Vec::new();
        for var in vars {
            if let Some(&prev_wid) = catalog.by_name.get(&var.name) {
                if prev_wid != var.wid {
                    collisions.push(var.name.clone());
                }
            }
            catalog.by_name.insert(var.name.clone(), var.wid);
            catalog.by_wid.insert(var.wid, var);
        }
        (catalog, collisions)
    }

    pub fn get(&self, wid: u16) -> Option<&Variable> {
        self.by_wid.get(&wid)
    }

    pub fn contains(&self, wid: u16) -> bool {
        self.by_wid.contains_key(&wid)
    }

    /// Resolve a variable by its program name
    pub fn by_name(&self, name: &str) -> Option<&Variable> {
        self.by_name.get(name).and_then(|wid| self.by_wid.get(wid))
    }

    pub fn wid_for_name(&self, name: &str) -> Option<u16> {
        self.by_name.get(name).copied()
    }

    /// Entries in ascending WID order
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.by_wid.values()
    }

    /// WIDs of all simple-typed entries, ascending
    pub fn readable_wids(&self) -> Vec<u16> {
        self.by_wid
            .values()
            .filter(|v| v.is_readable())
            .map(|v| v.wid)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_wid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_wid.is_empty()
    }
}

/// Result of one enumeration pass
#[derive(Debug)]
pub struct CatalogLoad {
    /// The (possibly partial) catalog
    pub catalog: Catalog,
    /// Enumeration indexes lost to communication failures
    pub gaps: Vec<u32>,
    /// Names reported for more than one WID (last read wins in the catalog)
    pub name_collisions: Vec<String>,
}

/// Parse one variable-table entry; `None` for empty or unnamed slots
fn parse_entry(data: &[u8]) -> Option<Variable> {
    if data.len() < 22 {
        return None;
    }
    let type_code = data[2];
    let wid = u16::from_le_bytes([data[8], data[9]]);

    // Name field: latin-1, NUL-padded
    let name: String = data[12..data.len().min(24)]
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect();

    // Names are latin-1; accented letters count as a valid start
    let starts_alpha = name.chars().next().map(|c| c.is_alphabetic());
    if starts_alpha != Some(true) || !(WID_MIN..=WID_MAX).contains(&wid) {
        return None;
    }

    // Unrecognized tags park as Structure: listed, not polled
    let var_type = VarType::from_wire(type_code).unwrap_or(VarType::Structure);
    Some(Variable::new(wid, &name, var_type))
}

/// Enumerate the controller's variable table
///
/// Per-index communication failures are recorded as gaps and skipped; the
/// pass only aborts outright when the session itself is gone. `pacing`
/// spreads requests out so a scan never monopolizes the station.
pub fn load_catalog(session: &mut Session, pacing: Duration) -> Result<CatalogLoad> {
    let mut variables: Vec<Variable> = Vec::new();
    let mut gaps = Vec::new();
    let mut misses = 0u32;
    let mut index = 0u32;

    log::info!(
        "enumerating variable table of station {}",
        session.station_addr()
    );

    while misses < MAX_CONSECUTIVE_MISSES && index < MAX_CATALOG_ENTRIES {
        let telegram = build_read_memory(
            session.station_addr(),
            session.client_addr(),
            CATALOG_BASE_ADDR + index,
            CATALOG_ENTRY_LEN,
        );

        match session.request(&telegram) {
            Ok(reply) => match parse_entry(&reply.data) {
                Some(var) => {
                    variables.push(var);
                    misses = 0;
                    if variables.len() % 100 == 0 {
                        log::debug!("{} variables so far", variables.len());
                    }
                }
                None => misses += 1,
            },
            Err(Error::NotConnected) => return Err(Error::NotConnected),
            Err(e) => {
                log::debug!("table read at index {} failed: {}", index, e);
                gaps.push(index);
                misses += 1;
            }
        }

        index += 1;
        if !pacing.is_zero() {
            std::thread::sleep(pacing);
        }
    }

    log::info!(
        "table enumeration done: {} variables, {} gaps",
        variables.len(),
        gaps.len()
    );

    let (catalog, name_collisions) = Catalog::build(variables);
    if !name_collisions.is_empty() {
        log::warn!(
            "duplicate variable names in table: {}",
            name_collisions.join(", ")
        );
    }

    Ok(CatalogLoad {
        catalog,
        gaps,
        name_collisions,
    })
}
