#![allow(clippy::unusual_byte_groupings)]
use super::{GTP_HEADER_LEN, GTP_MESSAGE_TYPE_GPDU};

// version=1, PT=1, R, E=0, S=0, PN=0.  No optional fields or extension headers.
const GTP_FLAGS_PLAIN: u8 = 0b001_1_0_0_0_0;

#[derive(Debug, PartialEq, Eq)]
pub enum GpduDrop {
    TooShort,
    UnhandledHeader,
    BadLength,
}

/// Split a G-PDU into its TEID and payload.  Only the plain 8 byte header is accepted.
pub fn decode_gpdu(buf: &[u8]) -> Result<(u32, &[u8]), GpduDrop> {
    if buf.len() < GTP_HEADER_LEN {
        return Err(GpduDrop::TooShort);
    }
    if buf[0] != GTP_FLAGS_PLAIN || buf[1] != GTP_MESSAGE_TYPE_GPDU {
        return Err(GpduDrop::UnhandledHeader);
    }
    let payload_len = u16::from_be_bytes([buf[2], buf[3]]) as usize;
    let teid = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let Some(payload) = buf.get(GTP_HEADER_LEN..GTP_HEADER_LEN + payload_len) else {
        return Err(GpduDrop::BadLength);
    };
    Ok((teid, payload))
}

/// Wrap a payload in a G-PDU for the given TEID.  None if it is too big for the length field.
pub fn encode_gpdu(teid: u32, payload: &[u8]) -> Option<Vec<u8>> {
    let payload_len = u16::try_from(payload.len()).ok()?.to_be_bytes();
    let teid = teid.to_be_bytes();

    // ---- GTP header, TS29.281, 5.1 ----
    let mut pdu = Vec::with_capacity(GTP_HEADER_LEN + payload.len());
    pdu.extend_from_slice(&[
        GTP_FLAGS_PLAIN,
        GTP_MESSAGE_TYPE_GPDU,
        payload_len[0],
        payload_len[1],
        teid[0],
        teid[1],
        teid[2],
        teid[3],
    ]);
    pdu.extend_from_slice(payload);
    Some(pdu)
}
