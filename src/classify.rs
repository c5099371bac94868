//! Name-pattern classification for catalog variables
//!
//! Controller programs follow house naming conventions for process variables
//! (Czech-language prefixes on the installations this was built against).
//! The protocol core never consults these; they are pure helpers for hosts
//! that want to group a catalog or guess writability before exposing it.

/// Coarse variable role derived from its catalog name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// Measured temperature
    Temperature,
    /// Operator-adjustable setpoint
    Setpoint,
    /// Status/fault/alarm word
    State,
    /// Mode or enable control
    Control,
    /// No recognized prefix
    Other,
}

const TEMPERATURE_PREFIXES: &[&str] = &[
    "TE", "Teoko", "Trek", "TTUV", "TPRIV", "TVENK", "pokoj", "koupl",
];
const SETPOINT_PREFIXES: &[&str] = &[
    "Zad", "Komf", "Utl", "komf", "utl", "ZADANA", "Hmax", "Hmin",
];
const STATE_PREFIXES: &[&str] = &[
    "Stav", "Por", "ALARM", "status", "Rez", "RV", "Zap", "HAVARIE",
];
const CONTROL_PREFIXES: &[&str] = &["AUT", "RUC", "Povol", "Blok", "zapni", "Cir", "Rek"];

/// Prefixes of variables the controller computes itself; writing them is
/// either refused or immediately overwritten by the program
const READONLY_PREFIXES: &[&str] = &[
    "TE", "TEPROST", "TEVEN", "TTUV", "Trek", "pokoj", "Por", "ALARM", "Stav", "status", "CO2_",
    "koupl", "Teoko",
];

fn starts_with_any(name: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| name.starts_with(p))
}

/// Classify a variable by its catalog name
///
/// Setpoint prefixes win over the greedy temperature ones ("Zad..." setpoints
/// routinely target temperature circuits).
pub fn classify(name: &str) -> VariableKind {
    if starts_with_any(name, SETPOINT_PREFIXES) {
        VariableKind::Setpoint
    } else if starts_with_any(name, STATE_PREFIXES) {
        VariableKind::State
    } else if starts_with_any(name, CONTROL_PREFIXES) {
        VariableKind::Control
    } else if starts_with_any(name, TEMPERATURE_PREFIXES) {
        VariableKind::Temperature
    } else {
        VariableKind::Other
    }
}

/// Heuristic: measured values and fault words are read-only
pub fn is_readonly_name(name: &str) -> bool {
    starts_with_any(name, READONLY_PREFIXES)
}
