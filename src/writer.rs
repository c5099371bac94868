//! Confirmed single-variable writes
//!
//! Validation happens entirely before any traffic: a value that cannot be
//! represented in the target slot is rejected locally. A write only returns
//! success once the station's acknowledgement telegram is decoded.

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::protocol::frame::build_write_reg;
use crate::protocol::Value;
use crate::session::Session;

/// Write `value` to the catalog variable `wid` and await the acknowledgement
///
/// Status 0x00 and 0x08 both acknowledge a register write; anything else is
/// surfaced as `WriteNack`.
pub fn write_value(
    session: &mut Session,
    catalog: &Catalog,
    wid: u16,
    value: Value,
) -> Result<()> {
    let var = catalog.get(wid).ok_or(Error::UnknownWid(wid))?;

    if !var.var_type.is_simple() {
        return Err(Error::TypeMismatch(format!(
            "{} is a {} slot, not writable over the register interface",
            var.name,
            var.var_type.type_name()
        )));
    }
    if !var.writable {
        return Err(Error::InvalidParameter(format!(
            "{} is read-only",
            var.name
        )));
    }

    let coerced = value.coerce(var.var_type)?;
    let telegram = build_write_reg(
        session.station_addr(),
        session.client_addr(),
        var.var_type,
        wid,
        &coerced.encode(),
    );

    let reply = session.request(&telegram)?;
    match reply.status {
        0x00 | 0x08 => {
            log::debug!("wrote {} to {} (wid {})", coerced, var.name, wid);
            Ok(())
        }
        status => Err(Error::WriteNack(status)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Variable;
    use crate::config::Config;
    use crate::protocol::frame::{ACK_SD, TELEGRAM_ED};
    use crate::protocol::{decode_frame, encode_frame, VarType};
    use crate::transport::MockTransport;

    /// Fake station acknowledging every write with the given status nibble
    fn ack_responder(status: u8) -> Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send> {
        Box::new(move |req: &[u8]| {
            let decoded = decode_frame(req).unwrap();
            let ack = vec![ACK_SD, 0x1F, 0x04, status, 0x00, TELEGRAM_ED];
            vec![encode_frame(&ack, decoded.transaction_id, decoded.key, 0)]
        })
    }

    fn quick_session(transport: MockTransport) -> Session {
        let mut config = Config::for_host("test");
        config.timing.request_retries = 0;
        Session::open(Box::new(transport), &config).unwrap()
    }

    fn test_catalog() -> Catalog {
        Catalog::from_variables(vec![
            Variable::new(4500, "ZapFve", VarType::Int16),
            Variable::new(4723, "Zad_UT1", VarType::Float),
            Variable::new(4010, "TEVEN1", VarType::Float),
        ])
    }

    #[test]
    fn test_write_bool_encodes_int16_carrier() {
        let transport = MockTransport::new();
        transport.set_responder(ack_responder(0x08));

        let mut session = quick_session(transport.clone());
        write_value(&mut session, &test_catalog(), 4500, Value::Bool(true)).unwrap();

        // Inspect the write telegram that actually went out
        let sent = transport.sent();
        let decoded = decode_frame(sent.last().unwrap()).unwrap();
        let t = &decoded.telegram;
        assert_eq!(t[6], crate::protocol::frame::FCB_WRITE);
        assert_eq!(t[8], VarType::Int16 as u8);
        assert_eq!(&t[9..11], &4500u16.to_le_bytes());
        assert_eq!(&t[11..13], &[0x01, 0x00]);
    }

    #[test]
    fn test_write_unknown_wid_makes_no_request() {
        let transport = MockTransport::new();
        transport.set_responder(ack_responder(0x00));

        let mut session = quick_session(transport.clone());
        let sent_after_open = transport.sent_count();

        let err = write_value(&mut session, &test_catalog(), 101, Value::Bool(true)).unwrap_err();
        assert!(matches!(err, Error::UnknownWid(101)));
        assert_eq!(transport.sent_count(), sent_after_open);
    }

    #[test]
    fn test_write_type_mismatch_makes_no_request() {
        let transport = MockTransport::new();
        transport.set_responder(ack_responder(0x00));

        let mut session = quick_session(transport.clone());
        let sent_after_open = transport.sent_count();

        // Fractional float into a boolean-carrying Int slot
        let err =
            write_value(&mut session, &test_catalog(), 4500, Value::Float(1.5)).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch(_)));
        assert_eq!(transport.sent_count(), sent_after_open);
    }

    #[test]
    fn test_write_readonly_rejected_locally() {
        let transport = MockTransport::new();
        transport.set_responder(ack_responder(0x00));

        let mut session = quick_session(transport.clone());
        let sent_after_open = transport.sent_count();

        let err =
            write_value(&mut session, &test_catalog(), 4010, Value::Float(5.0)).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
        assert_eq!(transport.sent_count(), sent_after_open);
    }

    #[test]
    fn test_write_nack_surfaces_status() {
        let transport = MockTransport::new();
        transport.set_responder(ack_responder(0x03));

        let mut session = quick_session(transport.clone());
        let err =
            write_value(&mut session, &test_catalog(), 4500, Value::Int16(1)).unwrap_err();
        assert!(matches!(err, Error::WriteNack(0x03)));
    }
}
