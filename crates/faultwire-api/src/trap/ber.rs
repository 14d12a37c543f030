//! Minimal BER reader for SNMP trap datagrams.
//!
//! Understands exactly what a trap receiver needs: the message header,
//! v1 Trap-PDU / v2c SNMPv2-Trap-PDU / InformRequest-PDU, and the varbind
//! list with the common value types. Anything else is a decode error.

use std::fmt;

use crate::error::Error;

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_NULL: u8 = 0x05;
const TAG_OID: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_IP_ADDRESS: u8 = 0x40;
const TAG_COUNTER32: u8 = 0x41;
const TAG_GAUGE32: u8 = 0x42;
const TAG_TIMETICKS: u8 = 0x43;
const TAG_COUNTER64: u8 = 0x46;

const PDU_TRAP_V1: u8 = 0xA4;
const PDU_INFORM: u8 = 0xA6;
const PDU_TRAP_V2: u8 = 0xA7;

/// `snmpTrapOID.0`
pub const SNMP_TRAP_OID: &str = "1.3.6.1.6.3.1.1.4.1.0";
/// `sysUpTime.0`
pub const SYS_UPTIME_OID: &str = "1.3.6.1.2.1.1.3.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnmpVersion {
    V1,
    V2c,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduKind {
    TrapV1,
    TrapV2,
    Inform,
}

/// Decoded varbind value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarValue {
    Integer(i64),
    OctetString(Vec<u8>),
    Null,
    ObjectId(String),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Counter64(u64),
    /// Context-specific exceptions and anything else we do not interpret.
    Other { tag: u8, data: Vec<u8> },
}

impl VarValue {
    /// Numeric view, for integer-like types and numeric strings.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Counter32(v) | Self::Gauge32(v) | Self::TimeTicks(v) => Some(i64::from(*v)),
            Self::Counter64(v) => i64::try_from(*v).ok(),
            Self::OctetString(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for VarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::OctetString(bytes) => f.write_str(&String::from_utf8_lossy(bytes)),
            Self::Null => Ok(()),
            Self::ObjectId(oid) => f.write_str(oid),
            Self::IpAddress([a, b, c, d]) => write!(f, "{a}.{b}.{c}.{d}"),
            Self::Counter32(v) | Self::Gauge32(v) | Self::TimeTicks(v) => write!(f, "{v}"),
            Self::Counter64(v) => write!(f, "{v}"),
            Self::Other { tag, data } => write!(f, "<tag 0x{tag:02x}, {} bytes>", data.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarBind {
    pub oid: String,
    pub value: VarValue,
}

/// One decoded trap or inform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrapPdu {
    pub version: SnmpVersion,
    pub community: String,
    pub kind: PduKind,
    /// v1 only.
    pub enterprise: Option<String>,
    /// v1 only.
    pub generic_trap: Option<i64>,
    /// v1 only.
    pub specific_trap: Option<i64>,
    pub varbinds: Vec<VarBind>,
}

impl TrapPdu {
    /// Trap identity: `snmpTrapOID.0` for v2c, RFC 3584 translation for v1.
    pub fn trap_oid(&self) -> Option<String> {
        match self.kind {
            PduKind::TrapV1 => {
                match self.generic_trap? {
                    generic @ 0..=5 => Some(format!("1.3.6.1.6.3.1.1.5.{}", generic + 1)),
                    6 => Some(format!(
                        "{}.0.{}",
                        self.enterprise.as_deref()?,
                        self.specific_trap?
                    )),
                    _ => None,
                }
            }
            PduKind::TrapV2 | PduKind::Inform => self.varbinds.iter().find_map(|vb| match &vb.value {
                VarValue::ObjectId(oid) if vb.oid == SNMP_TRAP_OID => Some(oid.clone()),
                _ => None,
            }),
        }
    }
}

/// Decode one UDP payload into a [`TrapPdu`].
pub fn decode_trap(datagram: &[u8]) -> Result<TrapPdu, Error> {
    let mut top = Reader::new(datagram);
    let mut message = top.expect(TAG_SEQUENCE, "message")?;

    let version = match decode_integer(message.expect(TAG_INTEGER, "version")?)? {
        0 => SnmpVersion::V1,
        1 => SnmpVersion::V2c,
        other => return Err(Error::decode(0, format!("unsupported SNMP version {other}"))),
    };
    let community =
        String::from_utf8_lossy(message.expect(TAG_OCTET_STRING, "community")?.rest()).into_owned();

    let pdu_offset = message.offset();
    let (tag, mut pdu) = message.read_tlv()?;
    let kind = match tag {
        PDU_TRAP_V1 => PduKind::TrapV1,
        PDU_TRAP_V2 => PduKind::TrapV2,
        PDU_INFORM => PduKind::Inform,
        other => {
            return Err(Error::decode(
                pdu_offset,
                format!("PDU type 0x{other:02x} is not a trap"),
            ));
        }
    };

    let mut trap = TrapPdu {
        version,
        community,
        kind,
        enterprise: None,
        generic_trap: None,
        specific_trap: None,
        varbinds: Vec::new(),
    };

    let mut list = if kind == PduKind::TrapV1 {
        trap.enterprise = Some(decode_oid(pdu.expect(TAG_OID, "enterprise")?)?);
        pdu.expect(TAG_IP_ADDRESS, "agent-addr")?;
        trap.generic_trap = Some(decode_integer(pdu.expect(TAG_INTEGER, "generic-trap")?)?);
        trap.specific_trap = Some(decode_integer(pdu.expect(TAG_INTEGER, "specific-trap")?)?);
        pdu.expect(TAG_TIMETICKS, "time-stamp")?;
        pdu.expect(TAG_SEQUENCE, "variable-bindings")?
    } else {
        pdu.expect(TAG_INTEGER, "request-id")?;
        pdu.expect(TAG_INTEGER, "error-status")?;
        pdu.expect(TAG_INTEGER, "error-index")?;
        pdu.expect(TAG_SEQUENCE, "variable-bindings")?
    };

    while !list.is_empty() {
        let mut varbind = list.expect(TAG_SEQUENCE, "varbind")?;
        let oid = decode_oid(varbind.expect(TAG_OID, "varbind name")?)?;
        let (tag, value) = varbind.read_tlv()?;
        trap.varbinds.push(VarBind {
            oid,
            value: decode_value(tag, value)?,
        });
    }

    Ok(trap)
}

// ── TLV reader ───────────────────────────────────────────────────────

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            base: 0,
        }
    }

    fn offset(&self) -> usize {
        self.base + self.pos
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn rest(&self) -> &'a [u8] {
        self.data.get(self.pos..).unwrap_or_default()
    }

    fn read_tlv(&mut self) -> Result<(u8, Reader<'a>), Error> {
        let offset = self.offset();
        let mut pos = self.pos;

        let tag = *self
            .data
            .get(pos)
            .ok_or_else(|| Error::decode(offset, "truncated tag"))?;
        pos += 1;

        let first = *self
            .data
            .get(pos)
            .ok_or_else(|| Error::decode(offset, "truncated length"))?;
        pos += 1;

        let len = if first & 0x80 == 0 {
            usize::from(first)
        } else {
            let width = usize::from(first & 0x7f);
            if width == 0 || width > 4 {
                return Err(Error::decode(offset, "unsupported length encoding"));
            }
            let bytes = self
                .data
                .get(pos..pos + width)
                .ok_or_else(|| Error::decode(offset, "truncated long length"))?;
            pos += width;
            bytes.iter().fold(0_usize, |acc, b| (acc << 8) | usize::from(*b))
        };

        let end = pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| Error::decode(offset, "length runs past the end of the datagram"))?;

        let content = Reader {
            data: self.data.get(pos..end).unwrap_or_default(),
            pos: 0,
            base: self.base + pos,
        };
        self.pos = end;
        Ok((tag, content))
    }

    fn expect(&mut self, tag: u8, what: &str) -> Result<Reader<'a>, Error> {
        let offset = self.offset();
        let (found, content) = self.read_tlv()?;
        if found != tag {
            return Err(Error::decode(
                offset,
                format!("expected {what} (tag 0x{tag:02x}), found tag 0x{found:02x}"),
            ));
        }
        Ok(content)
    }
}

// ── Primitive decoders ───────────────────────────────────────────────

fn decode_integer(reader: Reader<'_>) -> Result<i64, Error> {
    let bytes = reader.rest();
    let Some(first) = bytes.first() else {
        return Err(Error::decode(reader.base, "empty INTEGER"));
    };
    if bytes.len() > 8 {
        return Err(Error::decode(reader.base, "INTEGER wider than 64 bits"));
    }
    let seed: i64 = if first & 0x80 == 0 { 0 } else { -1 };
    Ok(bytes
        .iter()
        .fold(seed, |acc, b| acc.wrapping_shl(8) | i64::from(*b)))
}

fn decode_unsigned(reader: &Reader<'_>) -> Result<u64, Error> {
    let bytes = reader.rest();
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let significant = bytes.get(start..).unwrap_or_default();
    if significant.len() > 8 {
        return Err(Error::decode(reader.base, "unsigned value wider than 64 bits"));
    }
    Ok(significant
        .iter()
        .fold(0_u64, |acc, b| (acc << 8) | u64::from(*b)))
}

fn decode_unsigned32(reader: &Reader<'_>) -> Result<u32, Error> {
    u32::try_from(decode_unsigned(reader)?)
        .map_err(|_| Error::decode(reader.base, "32-bit counter out of range"))
}

fn decode_oid(reader: Reader<'_>) -> Result<String, Error> {
    let bytes = reader.rest();
    if bytes.is_empty() {
        return Err(Error::decode(reader.base, "empty OBJECT IDENTIFIER"));
    }

    let mut arcs: Vec<u64> = Vec::with_capacity(bytes.len() + 1);
    let mut acc: u64 = 0;
    let mut pending = false;
    for b in bytes {
        if acc > (u64::MAX >> 7) {
            return Err(Error::decode(reader.base, "OID sub-identifier overflow"));
        }
        acc = (acc << 7) | u64::from(b & 0x7f);
        pending = b & 0x80 != 0;
        if !pending {
            if arcs.is_empty() {
                let (first, second) = match acc {
                    0..40 => (0, acc),
                    40..80 => (1, acc - 40),
                    _ => (2, acc - 80),
                };
                arcs.push(first);
                arcs.push(second);
            } else {
                arcs.push(acc);
            }
            acc = 0;
        }
    }
    if pending {
        return Err(Error::decode(reader.base, "truncated OID sub-identifier"));
    }

    Ok(arcs
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join("."))
}

fn decode_value(tag: u8, reader: Reader<'_>) -> Result<VarValue, Error> {
    let value = match tag {
        TAG_INTEGER => VarValue::Integer(decode_integer(reader)?),
        TAG_OCTET_STRING => VarValue::OctetString(reader.rest().to_vec()),
        TAG_NULL => VarValue::Null,
        TAG_OID => VarValue::ObjectId(decode_oid(reader)?),
        TAG_IP_ADDRESS => {
            let octets: [u8; 4] = reader
                .rest()
                .try_into()
                .map_err(|_| Error::decode(reader.base, "IpAddress must be 4 bytes"))?;
            VarValue::IpAddress(octets)
        }
        TAG_COUNTER32 => VarValue::Counter32(decode_unsigned32(&reader)?),
        TAG_GAUGE32 => VarValue::Gauge32(decode_unsigned32(&reader)?),
        TAG_TIMETICKS => VarValue::TimeTicks(decode_unsigned32(&reader)?),
        TAG_COUNTER64 => VarValue::Counter64(decode_unsigned(&reader)?),
        other => VarValue::Other {
            tag: other,
            data: reader.rest().to_vec(),
        },
    };
    Ok(value)
}

#[cfg(test)]
pub(crate) mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    // ── Test encoder ─────────────────────────────────────────────────

    pub(crate) fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
        let mut out = vec![tag];
        let len = content.len();
        if len < 0x80 {
            out.push(u8::try_from(len).unwrap());
        } else if len <= 0xff {
            out.push(0x81);
            out.push(u8::try_from(len).unwrap());
        } else {
            out.push(0x82);
            out.extend_from_slice(&u16::try_from(len).unwrap().to_be_bytes());
        }
        out.extend_from_slice(content);
        out
    }

    pub(crate) fn int(value: i64) -> Vec<u8> {
        let bytes = value.to_be_bytes();
        let mut start = 0;
        while start < 7 {
            let redundant_zero = bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0;
            let redundant_ones = bytes[start] == 0xff && bytes[start + 1] & 0x80 != 0;
            if !(redundant_zero || redundant_ones) {
                break;
            }
            start += 1;
        }
        tlv(TAG_INTEGER, &bytes[start..])
    }

    pub(crate) fn oid(dotted: &str) -> Vec<u8> {
        let arcs: Vec<u64> = dotted.split('.').map(|a| a.parse().unwrap()).collect();
        let mut content = base128(arcs[0] * 40 + arcs[1]);
        for arc in &arcs[2..] {
            content.extend(base128(*arc));
        }
        tlv(TAG_OID, &content)
    }

    fn base128(mut value: u64) -> Vec<u8> {
        let mut out = vec![u8::try_from(value & 0x7f).unwrap()];
        value >>= 7;
        while value > 0 {
            out.push(u8::try_from(value & 0x7f).unwrap() | 0x80);
            value >>= 7;
        }
        out.reverse();
        out
    }

    pub(crate) fn octets(text: &str) -> Vec<u8> {
        tlv(TAG_OCTET_STRING, text.as_bytes())
    }

    pub(crate) fn varbind(name: &str, value: Vec<u8>) -> Vec<u8> {
        let mut content = oid(name);
        content.extend(value);
        tlv(TAG_SEQUENCE, &content)
    }

    pub(crate) fn v2_trap(community: &str, varbinds: &[Vec<u8>]) -> Vec<u8> {
        let mut pdu = int(4242);
        pdu.extend(int(0));
        pdu.extend(int(0));
        pdu.extend(tlv(TAG_SEQUENCE, &varbinds.concat()));

        let mut message = int(1);
        message.extend(octets(community));
        message.extend(tlv(PDU_TRAP_V2, &pdu));
        tlv(TAG_SEQUENCE, &message)
    }

    // ── Tests ────────────────────────────────────────────────────────

    #[test]
    fn decodes_v2c_trap_with_common_types() {
        let datagram = v2_trap(
            "public",
            &[
                varbind(SYS_UPTIME_OID, tlv(TAG_TIMETICKS, &[0x01, 0x00])),
                varbind(SNMP_TRAP_OID, oid("1.3.6.1.4.1.56789.2.1")),
                varbind("1.3.6.1.4.1.56789.1.1.1", octets("ALM-77")),
                varbind("1.3.6.1.4.1.56789.1.1.4", int(1)),
                varbind("1.3.6.1.4.1.56789.1.1.10", tlv(TAG_IP_ADDRESS, &[10, 0, 0, 1])),
                varbind("1.3.6.1.4.1.56789.1.1.11", tlv(TAG_NULL, &[])),
            ],
        );

        let trap = decode_trap(&datagram).unwrap();
        assert_eq!(trap.version, SnmpVersion::V2c);
        assert_eq!(trap.community, "public");
        assert_eq!(trap.kind, PduKind::TrapV2);
        assert_eq!(trap.varbinds.len(), 6);
        assert_eq!(trap.varbinds[0].value, VarValue::TimeTicks(256));
        assert_eq!(trap.trap_oid().as_deref(), Some("1.3.6.1.4.1.56789.2.1"));
        assert_eq!(trap.varbinds[2].oid, "1.3.6.1.4.1.56789.1.1.1");
        assert_eq!(trap.varbinds[2].value.to_string(), "ALM-77");
        assert_eq!(trap.varbinds[3].value.as_i64(), Some(1));
        assert_eq!(trap.varbinds[4].value.to_string(), "10.0.0.1");
        assert_eq!(trap.varbinds[5].value, VarValue::Null);
    }

    #[test]
    fn decodes_v1_trap_header() {
        let mut pdu = oid("1.3.6.1.4.1.56789");
        pdu.extend(tlv(TAG_IP_ADDRESS, &[192, 168, 1, 20]));
        pdu.extend(int(6));
        pdu.extend(int(17));
        pdu.extend(tlv(TAG_TIMETICKS, &[0x10]));
        pdu.extend(tlv(
            TAG_SEQUENCE,
            &varbind("1.3.6.1.4.1.56789.1.1.1", octets("X1")),
        ));

        let mut message = int(0);
        message.extend(octets("private"));
        message.extend(tlv(PDU_TRAP_V1, &pdu));
        let datagram = tlv(TAG_SEQUENCE, &message);

        let trap = decode_trap(&datagram).unwrap();
        assert_eq!(trap.version, SnmpVersion::V1);
        assert_eq!(trap.kind, PduKind::TrapV1);
        assert_eq!(trap.enterprise.as_deref(), Some("1.3.6.1.4.1.56789"));
        assert_eq!(trap.trap_oid().as_deref(), Some("1.3.6.1.4.1.56789.0.17"));
        assert_eq!(trap.varbinds.len(), 1);
    }

    #[test]
    fn v1_generic_trap_translation() {
        let mut trap = TrapPdu {
            version: SnmpVersion::V1,
            community: "public".into(),
            kind: PduKind::TrapV1,
            enterprise: Some("1.3.6.1.4.1.56789".into()),
            generic_trap: Some(2),
            specific_trap: Some(0),
            varbinds: Vec::new(),
        };
        assert_eq!(trap.trap_oid().as_deref(), Some("1.3.6.1.6.3.1.1.5.3"));

        for generic in [7, -1, i64::MAX, i64::MIN] {
            trap.generic_trap = Some(generic);
            assert_eq!(trap.trap_oid(), None, "generic-trap {generic}");
        }
    }

    #[test]
    fn negative_and_large_integers() {
        let datagram = v2_trap(
            "c",
            &[
                varbind("1.3.6.1.4.1.1.1", int(-2)),
                varbind("1.3.6.1.4.1.1.2", int(300_000)),
                varbind(
                    "1.3.6.1.4.1.1.3",
                    tlv(TAG_COUNTER64, &[0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]),
                ),
            ],
        );
        let trap = decode_trap(&datagram).unwrap();
        assert_eq!(trap.varbinds[0].value, VarValue::Integer(-2));
        assert_eq!(trap.varbinds[1].value, VarValue::Integer(300_000));
        assert_eq!(trap.varbinds[2].value, VarValue::Counter64(u64::MAX));
    }

    #[test]
    fn large_oid_arcs_round_trip() {
        let datagram = v2_trap("c", &[varbind("1.3.6.1.4.1.2011.2.15.2.4.3.3.1", int(0))]);
        let trap = decode_trap(&datagram).unwrap();
        assert_eq!(trap.varbinds[0].oid, "1.3.6.1.4.1.2011.2.15.2.4.3.3.1");
    }

    #[test]
    fn long_form_length_is_supported() {
        let description = "x".repeat(300);
        let datagram = v2_trap("c", &[varbind("1.3.6.1.4.1.1.1", octets(&description))]);
        let trap = decode_trap(&datagram).unwrap();
        assert_eq!(trap.varbinds[0].value.to_string(), description);
    }

    #[test]
    fn truncated_datagram_is_an_error() {
        let datagram = v2_trap("public", &[varbind("1.3.6.1.4.1.1.1", octets("abc"))]);
        for cut in [1, 5, datagram.len() - 1] {
            let err = decode_trap(&datagram[..cut]).unwrap_err();
            assert!(matches!(err, Error::Decode { .. }), "cut {cut}: {err:?}");
        }
    }

    #[test]
    fn non_trap_pdu_is_rejected() {
        let mut message = int(1);
        message.extend(octets("public"));
        message.extend(tlv(0xA0, &[]));
        let err = decode_trap(&tlv(TAG_SEQUENCE, &message)).unwrap_err();
        assert!(err.to_string().contains("not a trap"), "{err}");
    }

    #[test]
    fn snmpv3_is_rejected() {
        let mut message = int(3);
        message.extend(octets("x"));
        let err = decode_trap(&tlv(TAG_SEQUENCE, &message)).unwrap_err();
        assert!(err.to_string().contains("unsupported SNMP version 3"), "{err}");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode_trap(b"hello world").is_err());
        assert!(decode_trap(&[]).is_err());
    }
}
