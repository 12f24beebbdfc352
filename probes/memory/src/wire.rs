//! SNMPv2c GetRequest encoding and Response decoding.
//!
//! Requests are BER-encoded here; replies are parsed with the `snmp` crate's
//! reader.

use snmp::{asn1, AsnReader, SnmpError, SnmpMessageType, SnmpPdu, Value};

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_NULL: u8 = 0x05;
const TAG_OID: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_GET_REQUEST: u8 = 0xa0;

pub(crate) const TAG_NO_SUCH_OBJECT: u8 = 0x80;
pub(crate) const TAG_NO_SUCH_INSTANCE: u8 = 0x81;
pub(crate) const TAG_END_OF_MIB_VIEW: u8 = 0x82;

/// Message version field for SNMPv2c.
pub const VERSION_2C: i64 = 1;

/// Outcome of decoding one datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Answer to an earlier request; keep waiting.
    Stale,
    /// One integer per requested identifier, in request order.
    Counters(Vec<i64>),
}

/// Encode a GetRequest for `oids` with NULL values.
#[must_use]
pub fn encode_get_request(community: &[u8], request_id: i32, oids: &[Vec<u32>]) -> Vec<u8> {
    encode_message(
        TAG_GET_REQUEST,
        community,
        request_id,
        0,
        oids.iter().map(|oid| (oid.as_slice(), encode_null())),
    )
}

fn encode_message<'a>(
    pdu_tag: u8,
    community: &[u8],
    request_id: i32,
    error_status: i64,
    varbinds: impl Iterator<Item = (&'a [u32], Vec<u8>)>,
) -> Vec<u8> {
    let mut list = Vec::new();
    for (oid, value) in varbinds {
        let mut varbind = encode_oid(oid);
        varbind.extend(value);
        list.extend(tlv(TAG_SEQUENCE, &varbind));
    }

    let mut pdu = encode_integer(i64::from(request_id));
    pdu.extend(encode_integer(error_status));
    pdu.extend(encode_integer(0)); // error-index
    pdu.extend(tlv(TAG_SEQUENCE, &list));

    let mut message = encode_integer(VERSION_2C);
    message.extend(tlv(TAG_OCTET_STRING, community));
    message.extend(tlv(pdu_tag, &pdu));
    tlv(TAG_SEQUENCE, &message)
}

fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 4);
    out.push(tag);
    encode_length(content.len(), &mut out);
    out.extend_from_slice(content);
    out
}

fn encode_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
}

fn encode_integer(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    // Shortest two's complement form: drop bytes that only repeat the sign bit
    let mut start = 0;
    while start < bytes.len() - 1 {
        let (current, next) = (bytes[start], bytes[start + 1]);
        let redundant = (current == 0x00 && next & 0x80 == 0) || (current == 0xff && next & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    tlv(TAG_INTEGER, &bytes[start..])
}

fn encode_null() -> Vec<u8> {
    vec![TAG_NULL, 0x00]
}

fn encode_oid(oid: &[u32]) -> Vec<u8> {
    let mut content = Vec::new();
    let (first, rest) = match oid {
        [a, b, rest @ ..] => (a * 40 + b, rest),
        [a] => (a * 40, &[][..]),
        [] => (0, &[][..]),
    };
    encode_subidentifier(first, &mut content);
    for sub in rest {
        encode_subidentifier(*sub, &mut content);
    }
    tlv(TAG_OID, &content)
}

/// Base-128, most significant group first, continuation bit on all but the last.
fn encode_subidentifier(value: u32, out: &mut Vec<u8>) {
    let mut groups = [0u8; 5];
    let mut count = 0;
    let mut rest = value;
    loop {
        groups[count] = (rest & 0x7f) as u8;
        count += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }
    for i in (0..count).rev() {
        out.push(if i == 0 { groups[i] } else { groups[i] | 0x80 });
    }
}

/// Decode a datagram received in answer to `request_id`.
///
/// # Errors
///
/// Returns a description of the problem if the datagram is malformed, is
/// not a Response, carries a different community, reports an agent error,
/// or holds anything but one integer per requested identifier.
pub fn decode_response(
    bytes: &[u8],
    community: &[u8],
    request_id: i32,
    expected: usize,
) -> Result<Reply, String> {
    let pdu = SnmpPdu::from_bytes(bytes).map_err(malformed)?;

    if pdu.message_type != SnmpMessageType::Response {
        return Err(format!("unexpected {:?} message", pdu.message_type));
    }
    if pdu.req_id != request_id {
        return Ok(Reply::Stale);
    }

    let envelope = Envelope::read(bytes).map_err(malformed)?;
    if envelope.community != community {
        return Err("response carried a different community".to_owned());
    }
    if pdu.error_status != 0 {
        return Err(format!(
            "agent returned error-status {} at index {}",
            pdu.error_status, pdu.error_index
        ));
    }

    // The varbind iterator stops at the first value it cannot represent
    let values = pdu
        .varbinds
        .map(|(_, value)| counter_value(&value))
        .collect::<Result<Vec<_>, _>>()?;

    if values.len() < expected {
        if let Some(exception) = exception_at(envelope.varbinds, values.len()) {
            return Err(format!(
                "agent returned {} for identifier {} of {}",
                exception,
                values.len() + 1,
                expected
            ));
        }
    }
    if values.len() != expected {
        return Err(format!("expected {} values, got {}", expected, values.len()));
    }
    Ok(Reply::Counters(values))
}

fn malformed(err: SnmpError) -> String {
    format!("malformed response ({:?})", err)
}

/// Message fields `SnmpPdu` keeps to itself.
struct Envelope<'a> {
    community: &'a [u8],
    varbinds: &'a [u8],
}

impl<'a> Envelope<'a> {
    fn read(bytes: &'a [u8]) -> Result<Self, SnmpError> {
        let sequence = AsnReader::from_bytes(bytes).read_raw(asn1::TYPE_SEQUENCE)?;
        let mut message = AsnReader::from_bytes(sequence);
        message.read_asn_integer()?; // version
        let community = message.read_asn_octetstring()?;

        let pdu_tag = message.peek_byte()?;
        let mut pdu = AsnReader::from_bytes(message.read_raw(pdu_tag)?);
        // request-id, error-status, error-index
        for _ in 0..3 {
            pdu.read_asn_integer()?;
        }
        let varbinds = pdu.read_raw(asn1::TYPE_SEQUENCE)?;

        Ok(Self { community, varbinds })
    }
}

/// Name of the exception carried by varbind `index`, if it carries one.
fn exception_at(varbinds: &[u8], index: usize) -> Option<&'static str> {
    let Some(Value::Sequence(mut varbind)) = AsnReader::from_bytes(varbinds).nth(index) else {
        return None;
    };
    varbind.read_asn_objectidentifier().ok()?;
    match varbind.peek_byte().ok()? {
        TAG_NO_SUCH_OBJECT => Some("noSuchObject"),
        TAG_NO_SUCH_INSTANCE => Some("noSuchInstance"),
        TAG_END_OF_MIB_VIEW => Some("endOfMibView"),
        _ => None,
    }
}

/// Integer carried by a varbind, or why there is none.
fn counter_value(value: &Value<'_>) -> Result<i64, String> {
    match value {
        Value::Integer(n) => Ok(*n),
        Value::Counter32(n) | Value::Unsigned32(n) => Ok(i64::from(*n)),
        Value::Counter64(n) => i64::try_from(*n).map_err(|_| format!("counter {} out of range", n)),
        other => Err(format!("value is not an integer ({:?})", other)),
    }
}

/// Value an agent puts in a test response.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub(crate) enum Answer {
    Integer(i64),
    Exception(u8),
}

/// Encode a Response the way an agent would.
#[cfg(test)]
pub(crate) fn encode_response(
    community: &[u8],
    request_id: i32,
    error_status: i64,
    values: &[(Vec<u32>, Answer)],
) -> Vec<u8> {
    const TAG_RESPONSE: u8 = 0xa2;

    encode_message(
        TAG_RESPONSE,
        community,
        request_id,
        error_status,
        values.iter().map(|(oid, answer)| {
            let encoded = match answer {
                Answer::Integer(n) => encode_integer(*n),
                Answer::Exception(tag) => vec![*tag, 0x00],
            };
            (oid.as_slice(), encoded)
        }),
    )
}
