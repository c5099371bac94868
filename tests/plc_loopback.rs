//! End-to-end scenarios against a scripted fake station
//!
//! The fake station enforces the session-key choreography the real hardware
//! uses: a request under the wrong key draws a key-sync frame, every reply
//! rotates the key, and the next request must arrive under the rotated key.

use dbnet_io::catalog::CATALOG_BASE_ADDR;
use dbnet_io::poller::{UnavailableReason, ValueOutcome, DISCONNECTED_SENTINEL};
use dbnet_io::protocol::frame::{
    telegram_checksum, MSG_TYPE_KEY_SYNC, ACK_SD, TELEGRAM_ED, TELEGRAM_SD,
};
use dbnet_io::protocol::{decode_frame, encode_frame, Value};
use dbnet_io::transport::MockTransport;
use dbnet_io::{Config, DbNetClient, Error};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Scripted controller state shared with the test body
struct FakeStation {
    /// Key the station expects the next request under
    key: u32,
    /// Register values by WID
    values: HashMap<u16, Vec<u8>>,
    /// Variable-table entries by enumeration index
    entries: HashMap<u32, Vec<u8>>,
    /// WIDs whose writes are refused, with the nack status
    nack_wids: HashMap<u16, u8>,
    /// Observed writes: (wid, var_type tag, value bytes)
    writes: Vec<(u16, u8, Vec<u8>)>,
    /// Key syncs issued
    syncs: u32,
}

impl FakeStation {
    fn rotate_key(&mut self) -> u32 {
        self.key = self.key.wrapping_mul(31).wrapping_add(17);
        self.key
    }

    fn handle(&mut self, req: &[u8]) -> Vec<u8> {
        let presented = u32::from_le_bytes([req[6], req[7], req[8], req[9]]);
        if presented != self.key {
            // Push the expected key; the client re-sends under it
            self.syncs += 1;
            let mut msg = vec![0u8; 15];
            msg[4..6].copy_from_slice(&MSG_TYPE_KEY_SYNC.to_le_bytes());
            msg[6..10].copy_from_slice(&self.key.to_le_bytes());
            return msg;
        }

        let decoded = decode_frame(req).unwrap();
        let t = decoded.telegram;
        let len = t[1] as usize;
        let next_key = self.rotate_key();

        match t[7] {
            // Write register: record and acknowledge (or refuse)
            0x02 => {
                let wid = u16::from_le_bytes([t[9], t[10]]);
                let var_type = t[8];
                let value = t[11..4 + len].to_vec();
                if let Some(&status) = self.nack_wids.get(&wid) {
                    let ack = vec![ACK_SD, 0x1F, 0x04, status, 0x00, TELEGRAM_ED];
                    return encode_frame(&ack, decoded.transaction_id, next_key, 0);
                }
                self.writes.push((wid, var_type, value.clone()));
                self.values.insert(wid, value);
                let ack = vec![ACK_SD, 0x1F, 0x04, 0x08, 0x00, TELEGRAM_ED];
                encode_frame(&ack, decoded.transaction_id, next_key, 0)
            }
            // Table enumeration
            0x03 => {
                let address = u32::from_le_bytes([t[8], t[9], t[10], t[11]]);
                let data = self
                    .entries
                    .get(&(address - CATALOG_BASE_ADDR))
                    .cloned()
                    .unwrap_or_default();
                encode_frame(
                    &data_reply(&data),
                    decoded.transaction_id,
                    next_key,
                    0,
                )
            }
            // Register read
            _ => {
                let wid = u16::from_le_bytes([t[9], t[10]]);
                let data = self.values.get(&wid).cloned().unwrap_or(vec![0, 0]);
                encode_frame(
                    &data_reply(&data),
                    decoded.transaction_id,
                    next_key,
                    0,
                )
            }
        }
    }
}

fn data_reply(data: &[u8]) -> Vec<u8> {
    let mut span = vec![0x1F, 0x04, 0x00, 0x01];
    span.extend_from_slice(data);
    let fcs = telegram_checksum(&span);
    let mut t = vec![TELEGRAM_SD, span.len() as u8, span.len() as u8, TELEGRAM_SD];
    t.extend_from_slice(&span);
    t.push(fcs);
    t.push(TELEGRAM_ED);
    t
}

fn table_entry(wid: u16, type_code: u8, name: &str) -> Vec<u8> {
    let mut d = vec![0u8; 26];
    d[2] = type_code;
    d[8..10].copy_from_slice(&wid.to_le_bytes());
    for (i, b) in name.bytes().take(12).enumerate() {
        d[12 + i] = b;
    }
    d
}

/// Client wired to a fake station with a small variable table
fn rig() -> (DbNetClient, Arc<Mutex<FakeStation>>) {
    let mut entries = HashMap::new();
    entries.insert(0, table_entry(4723, 2, "Zad_UT1"));
    entries.insert(1, table_entry(4500, 0, "ZapFve"));
    entries.insert(2, table_entry(4600, 1, "RezimProvozu"));
    entries.insert(3, table_entry(4724, 2, "TEVEN1"));

    let mut values = HashMap::new();
    values.insert(4723u16, DISCONNECTED_SENTINEL.to_le_bytes().to_vec());
    values.insert(4724u16, 21.5f32.to_le_bytes().to_vec());
    values.insert(4500u16, vec![0x01, 0x00]);
    values.insert(4600u16, 100_000i32.to_le_bytes().to_vec());

    let station = Arc::new(Mutex::new(FakeStation {
        key: 0x5EED,
        values,
        entries,
        nack_wids: HashMap::new(),
        writes: Vec::new(),
        syncs: 0,
    }));

    let transport = MockTransport::new();
    let station_for_responder = Arc::clone(&station);
    transport.set_responder(Box::new(move |req: &[u8]| {
        vec![station_for_responder.lock().unwrap().handle(req)]
    }));

    let mut config = Config::for_host("station-under-test");
    config.timing.read_pacing_ms = 0;

    let client = DbNetClient::with_transport(Box::new(transport), &config).unwrap();
    (client, station)
}

#[test]
fn handshake_syncs_key_then_enumerates_catalog() {
    let (client, station) = rig();

    // The opening probe went out under key 0 and was redirected exactly once
    assert_eq!(station.lock().unwrap().syncs, 1);

    let report = client.load_catalog().unwrap();
    assert_eq!(report.variables, 4);
    assert!(report.gaps.is_empty());
    assert!(report.name_collisions.is_empty());

    let catalog = client.catalog();
    let var = catalog.by_name("Zad_UT1").unwrap();
    assert_eq!(var.wid, 4723);
    assert!(var.writable);
    // Measured temperature is read-only per the name heuristic
    assert!(!catalog.by_name("TEVEN1").unwrap().writable);

    // Dozens of exchanges later the key is still in lockstep: no more syncs
    assert_eq!(station.lock().unwrap().syncs, 1);
}

#[test]
fn poll_screens_sentinel_and_skips_unknown_wids() {
    let (client, _station) = rig();
    client.load_catalog().unwrap();

    let outcomes = client.poll(&[4723, 4724, 4600, 101]);
    assert_eq!(
        outcomes,
        vec![
            (
                4723,
                ValueOutcome::Unavailable(UnavailableReason::SensorDisconnected)
            ),
            (4724, ValueOutcome::Value(Value::Float(21.5))),
            (4600, ValueOutcome::Value(Value::Int32(100_000))),
            (101, ValueOutcome::Unavailable(UnavailableReason::NotInCatalog)),
        ]
    );
}

#[test]
fn write_bool_is_confirmed_and_carried_as_int16() {
    let (client, station) = rig();
    client.load_catalog().unwrap();

    client.write(4500, Value::Bool(true)).unwrap();

    {
        let station = station.lock().unwrap();
        assert_eq!(station.writes.len(), 1);
        let (wid, var_type, bytes) = &station.writes[0];
        assert_eq!(*wid, 4500);
        assert_eq!(*var_type, 0); // Int16 carrier
        assert_eq!(bytes, &vec![0x01, 0x00]);
    }

    // The slot now reads back as on
    let value = client.read_by_name("ZapFve").unwrap();
    assert_eq!(value, Value::Int16(1));
}

#[test]
fn refused_write_surfaces_nack_status() {
    let (client, station) = rig();
    client.load_catalog().unwrap();

    station.lock().unwrap().nack_wids.insert(4600, 0x03);
    let err = client.write(4600, Value::Int32(5)).unwrap_err();
    assert!(matches!(err, Error::WriteNack(0x03)));

    // Nothing was recorded station-side
    assert!(station.lock().unwrap().writes.is_empty());
}

#[test]
fn type_mismatch_never_reaches_the_wire() {
    let (client, station) = rig();
    client.load_catalog().unwrap();

    // Any exchange rotates the station key, so an unchanged key proves the
    // rejected write produced zero traffic
    let key_before = station.lock().unwrap().key;
    let err = client.write(4500, Value::Float(1.5)).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch(_)));
    assert!(station.lock().unwrap().writes.is_empty());
    assert_eq!(station.lock().unwrap().key, key_before);
}
