//! Batch value polling with the disconnected-sensor filter
//!
//! A poll is one best-effort sweep over a set of WIDs: every requested WID
//! gets an outcome, and no single failure aborts the batch. Scheduling the
//! sweeps is the host's business; this module only guarantees that one call
//! is bounded by the session timeouts.

use crate::catalog::{Catalog, Variable};
use crate::error::Result;
use crate::protocol::frame::build_read_reg;
use crate::protocol::Value;
use crate::session::Session;
use std::time::Duration;

/// Float reading a controller reports for a disconnected temperature probe
pub const DISCONNECTED_SENTINEL: f32 = 146.19;
/// Band around the sentinel treated as "no reading"
pub const SENTINEL_TOLERANCE: f32 = 0.05;

/// Why a WID produced no value this sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    /// Not present in the current catalog; no request was made
    NotInCatalog,
    /// Catalog lists a composite type the register interface cannot read
    NotReadable,
    /// Exchange failed after the session's retry budget
    CommError,
    /// Structurally valid float matching the disconnected-probe sentinel
    SensorDisconnected,
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UnavailableReason::NotInCatalog => "not in catalog",
            UnavailableReason::NotReadable => "not a readable type",
            UnavailableReason::CommError => "communication error",
            UnavailableReason::SensorDisconnected => "sensor disconnected",
        };
        f.write_str(s)
    }
}

/// Outcome of polling one WID
#[derive(Debug, Clone, PartialEq)]
pub enum ValueOutcome {
    /// Decoded reading
    Value(Value),
    /// No reading, with the reason
    Unavailable(UnavailableReason),
}

/// Read one variable's current value
pub fn read_variable(session: &mut Session, var: &Variable) -> Result<Value> {
    let telegram = build_read_reg(
        session.station_addr(),
        session.client_addr(),
        var.var_type,
        var.wid,
    );
    let reply = session.request(&telegram)?;
    Value::decode(var.var_type, &reply.data)
}

/// Classify a decoded value, applying the sentinel band to floats
fn screen(value: Value) -> ValueOutcome {
    if let Value::Float(v) = value {
        if (v - DISCONNECTED_SENTINEL).abs() <= SENTINEL_TOLERANCE {
            return ValueOutcome::Unavailable(UnavailableReason::SensorDisconnected);
        }
    }
    ValueOutcome::Value(value)
}

/// Sweep the requested WIDs once, yielding an outcome per WID
///
/// WIDs missing from the catalog are answered locally; everything else costs
/// one exchange, spaced by `pacing` so a sweep never monopolizes the station.
pub fn poll(
    session: &mut Session,
    catalog: &Catalog,
    wids: &[u16],
    pacing: Duration,
) -> Vec<(u16, ValueOutcome)> {
    let mut outcomes = Vec::with_capacity(wids.len());

    for &wid in wids {
        let var = match catalog.get(wid) {
            Some(var) => var,
            None => {
                log::debug!("wid {} not in catalog, skipping read", wid);
                outcomes.push((wid, ValueOutcome::Unavailable(UnavailableReason::NotInCatalog)));
                continue;
            }
        };

        if !var.is_readable() {
            outcomes.push((wid, ValueOutcome::Unavailable(UnavailableReason::NotReadable)));
            continue;
        }

        let outcome = match read_variable(session, var) {
            Ok(value) => screen(value),
            Err(e) => {
                log::warn!("read of {} (wid {}) failed: {}", var.name, wid, e);
                ValueOutcome::Unavailable(UnavailableReason::CommError)
            }
        };
        outcomes.push((wid, outcome));

        if !pacing.is_zero() {
            std::thread::sleep(pacing);
        }
    }

    outcomes
}
