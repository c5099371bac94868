//! DB-Net/IP wire protocol: cipher, frames, telegrams, typed values
//!
//! Everything in this module is a pure transformation over byte slices; no
//! network or session state. The session layer owns the rolling key and
//! transaction counter and feeds them in per exchange.

pub mod cipher;
pub mod frame;
pub mod value;

pub use frame::{decode_frame, encode_frame, parse_reply, DecodedFrame, Reply};
pub use value::{Value, VarType};
