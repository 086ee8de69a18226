/*!
All deserialization routines for the OpenFlow message primitives

The header uses a special deserialization because its size is known.
Use the trait `Deserialize` for any other deserialization implementation.
*/

use crate::openflow::error::{Error, Result};
use crate::openflow::messages::*;

use byteorder::{ByteOrder, NetworkEndian};

impl OfpHeader {
    /// Deserializes an OpenFlow header
    pub fn deserialize(bytes: &[u8; 8]) -> OfpHeader {
        OfpHeader {
            version: bytes[0],
            typ: bytes[1],
            length: NetworkEndian::read_u16(&bytes[2..4]),
            xid: NetworkEndian::read_u32(&bytes[4..]),
        }
    }

    /// Deserializes the header at the start of a complete message
    pub fn of_message(msg: &[u8]) -> Result<OfpHeader> {
        if msg.len() < OfpHeader::header_length() {
            return Err(Error::BadRequest(OfpBadRequestCode::BadLen, msg.to_vec()));
        }
        let mut bytes = [0; 8];
        bytes.copy_from_slice(&msg[..8]);
        Ok(OfpHeader::deserialize(&bytes))
    }

    /// Returns the body length in byte
    pub fn body_length(&self) -> usize {
        (self.length as usize).saturating_sub(OfpHeader::header_length())
    }
}

/// To be implemented by all OpenFlow message parts that are received.
pub trait Deserialize {
    /// The type to deserialize
    type R;

    /// Deserialize the bytes buffer
    /// Fails on providing a too small or too large buffer
    fn deserialize(bytes: Vec<u8>) -> Result<Self::R> {
        if Self::min_length() > bytes.len() || Self::max_length() < bytes.len() {
            return Err(Error::BadRequest(OfpBadRequestCode::BadLen, bytes));
        }
        Self::deserialize_len_ok(bytes)
    }

    /// Deserializes the byte buffer (network byte order)
    /// Implementers can rely on the bytes buffer's size to be greater or equal Self::min_length()
    fn deserialize_len_ok(bytes: Vec<u8>) -> Result<Self::R>;

    /// The minimum length of the message part in bytes
    fn min_length() -> usize;

    /// The maximum length of the message part in bytes
    /// May not return a value greater than 0xFFF7
    /// If Self::R is fixed size, you probably have to
    /// override this implementation.
    fn max_length() -> usize {
        0xffff - OfpHeader::header_length()
    }
}

/// Splits `bytes` into consecutive fixed-size records.
/// Fails if a partial record remains.
fn fixed_records<T, F>(bytes: &[u8], len: usize, parse: F) -> Result<Vec<T>>
where
    F: Fn(&[u8]) -> Result<T>,
{
    if bytes.len() % len != 0 {
        return Err(Error::BadRequest(OfpBadRequestCode::BadLen, bytes.to_vec()));
    }
    bytes.chunks(len).map(parse).collect()
}

impl OfpMatch {
    /// Deserializes the 40-byte wire image at the start of `bytes`
    pub fn read(bytes: &[u8]) -> Result<OfpMatch> {
        if bytes.len() < OfpMatch::LEN {
            return Err(Error::BadRequest(OfpBadRequestCode::BadLen, bytes.to_vec()));
        }
        let mut dl_src = [0; 6];
        let mut dl_dst = [0; 6];
        dl_src.copy_from_slice(&bytes[6..12]);
        dl_dst.copy_from_slice(&bytes[12..18]);
        Ok(OfpMatch {
            wildcards: Wildcards::from_bits(NetworkEndian::read_u32(&bytes[0..4])),
            in_port: NetworkEndian::read_u16(&bytes[4..6]),
            dl_src,
            dl_dst,
            dl_vlan: NetworkEndian::read_u16(&bytes[18..20]),
            dl_vlan_pcp: bytes[20],
            dl_type: NetworkEndian::read_u16(&bytes[22..24]),
            nw_tos: bytes[24],
            nw_proto: bytes[25],
            nw_src: NetworkEndian::read_u32(&bytes[28..32]),
            nw_dst: NetworkEndian::read_u32(&bytes[32..36]),
            tp_src: NetworkEndian::read_u16(&bytes[36..38]),
            tp_dst: NetworkEndian::read_u16(&bytes[38..40]),
        })
    }
}

impl OfpAction {
    /// Deserializes a list of actions, each announcing its own length.
    pub fn read_list(bytes: &[u8]) -> Result<Vec<OfpAction>> {
        let mut actions = vec![];
        let mut rest = bytes;
        while !rest.is_empty() {
            if rest.len() < 8 {
                return Err(Error::BadRequest(OfpBadRequestCode::BadLen, rest.to_vec()));
            }
            let len = NetworkEndian::read_u16(&rest[2..4]) as usize;
            if len < 8 || len % 8 != 0 || len > rest.len() {
                return Err(Error::BadRequest(OfpBadRequestCode::BadLen, rest.to_vec()));
            }
            actions.push(OfpAction::read(&rest[..len]));
            rest = &rest[len..];
        }
        Ok(actions)
    }

    /// `bytes` holds exactly one action of at least 8 byte.
    fn read(bytes: &[u8]) -> OfpAction {
        let typ = NetworkEndian::read_u16(&bytes[0..2]);
        let len = bytes.len();
        let u16_at = |pos: usize| NetworkEndian::read_u16(&bytes[pos..pos + 2]);
        let u32_at = |pos: usize| NetworkEndian::read_u32(&bytes[pos..pos + 4]);
        let addr_at_4 = || {
            let mut addr = [0; 6];
            addr.copy_from_slice(&bytes[4..10]);
            addr
        };
        match (typ, len) {
            (OFPAT_OUTPUT, 8) => OfpAction::Output {
                port: u16_at(4),
                max_len: u16_at(6),
            },
            (OFPAT_SET_VLAN_VID, 8) => OfpAction::SetVlanVid(u16_at(4)),
            (OFPAT_SET_VLAN_PCP, 8) => OfpAction::SetVlanPcp(bytes[4]),
            (OFPAT_STRIP_VLAN, 8) => OfpAction::StripVlan,
            (OFPAT_SET_DL_SRC, 16) => OfpAction::SetDlSrc(addr_at_4()),
            (OFPAT_SET_DL_DST, 16) => OfpAction::SetDlDst(addr_at_4()),
            (OFPAT_SET_NW_SRC, 8) => OfpAction::SetNwSrc(u32_at(4)),
            (OFPAT_SET_NW_DST, 8) => OfpAction::SetNwDst(u32_at(4)),
            (OFPAT_SET_NW_TOS, 8) => OfpAction::SetNwTos(bytes[4]),
            (OFPAT_SET_TP_SRC, 8) => OfpAction::SetTpSrc(u16_at(4)),
            (OFPAT_SET_TP_DST, 8) => OfpAction::SetTpDst(u16_at(4)),
            (OFPAT_VENDOR, 16) if u32_at(4) == NX_VENDOR_ID => match u16_at(8) {
                NXAST_RESUBMIT => OfpAction::Resubmit(u16_at(10)),
                NXAST_SET_TUNNEL => OfpAction::SetTunnel(u32_at(12)),
                _ => OfpAction::Unknown {
                    typ,
                    len: len as u16,
                },
            },
            _ => OfpAction::Unknown {
                typ,
                len: len as u16,
            },
        }
    }
}

impl Deserialize for OfpEchoReply {
    type R = OfpEchoReply;

    fn deserialize_len_ok(bytes: Vec<u8>) -> Result<Self::R> {
        Ok(OfpEchoReply { arbitrary: bytes })
    }

    fn min_length() -> usize {
        0
    }
}

impl OfpPhyPort {
    const LEN: usize = 48;

    fn read(bytes: &[u8]) -> Result<OfpPhyPort> {
        let mut hw_addr = [0; 6];
        let mut name = [0; OFP_MAX_PORT_NAME_LEN];
        hw_addr.copy_from_slice(&bytes[2..8]);
        name.copy_from_slice(&bytes[8..24]);
        Ok(OfpPhyPort {
            port_no: NetworkEndian::read_u16(&bytes[0..2]),
            hw_addr,
            name,
            config: NetworkEndian::read_u32(&bytes[24..28]),
            state: NetworkEndian::read_u32(&bytes[28..32]),
            curr: NetworkEndian::read_u32(&bytes[32..36]),
            advertised: NetworkEndian::read_u32(&bytes[36..40]),
            supported: NetworkEndian::read_u32(&bytes[40..44]),
            peer: NetworkEndian::read_u32(&bytes[44..48]),
        })
    }
}

impl Deserialize for OfpSwitchFeatures {
    type R = OfpSwitchFeatures;

    fn deserialize_len_ok(bytes: Vec<u8>) -> Result<Self::R> {
        let ports = fixed_records(&bytes[24..], OfpPhyPort::LEN, OfpPhyPort::read)?;
        Ok(OfpSwitchFeatures {
            datapath_id: NetworkEndian::read_u64(&bytes[0..8]),
            n_buffers: NetworkEndian::read_u32(&bytes[8..12]),
            n_tables: bytes[12],
            capabilities: NetworkEndian::read_u32(&bytes[16..20]),
            actions: NetworkEndian::read_u32(&bytes[20..24]),
            ports,
        })
    }

    fn min_length() -> usize {
        24
    }
}

impl Deserialize for OfpSwitchConfig {
    type R = OfpSwitchConfig;

    fn deserialize_len_ok(bytes: Vec<u8>) -> Result<Self::R> {
        Ok(OfpSwitchConfig {
            flags: NetworkEndian::read_u16(&bytes[0..2]),
            miss_send_len: NetworkEndian::read_u16(&bytes[2..4]),
        })
    }

    fn min_length() -> usize {
        4
    }

    fn max_length() -> usize {
        4
    }
}

impl Deserialize for OfpErrorMsg {
    type R = OfpErrorMsg;

    fn deserialize_len_ok(bytes: Vec<u8>) -> Result<Self::R> {
        let typ = NetworkEndian::read_u16(&bytes[0..2]);
        let code = NetworkEndian::read_u16(&bytes[2..4]);
        Ok(OfpErrorMsg {
            typ,
            code,
            data: bytes[4..].to_vec(),
        })
    }

    fn min_length() -> usize {
        4
    }
}

impl Deserialize for OfpStatsReply {
    type R = OfpStatsReply;

    fn deserialize_len_ok(bytes: Vec<u8>) -> Result<Self::R> {
        Ok(OfpStatsReply {
            typ: NetworkEndian::read_u16(&bytes[0..2]),
            flags: NetworkEndian::read_u16(&bytes[2..4]),
            body: bytes[OFP_STATS_HEADER_LEN..].to_vec(),
        })
    }

    fn min_length() -> usize {
        OFP_STATS_HEADER_LEN
    }
}

impl Deserialize for OfpDescStats {
    type R = OfpDescStats;

    fn deserialize_len_ok(bytes: Vec<u8>) -> Result<Self::R> {
        let serial_start = 3 * DESC_STR_LEN;
        let dp_start = serial_start + SERIAL_NUM_LEN;
        Ok(OfpDescStats {
            mfr_desc: c_string(&bytes[0..DESC_STR_LEN]),
            hw_desc: c_string(&bytes[DESC_STR_LEN..2 * DESC_STR_LEN]),
            sw_desc: c_string(&bytes[2 * DESC_STR_LEN..serial_start]),
            serial_num: c_string(&bytes[serial_start..dp_start]),
            dp_desc: c_string(&bytes[dp_start..dp_start + DESC_STR_LEN]),
        })
    }

    fn min_length() -> usize {
        4 * DESC_STR_LEN + SERIAL_NUM_LEN
    }

    fn max_length() -> usize {
        4 * DESC_STR_LEN + SERIAL_NUM_LEN
    }
}

impl Deserialize for OfpAggregateStats {
    type R = OfpAggregateStats;

    fn deserialize_len_ok(bytes: Vec<u8>) -> Result<Self::R> {
        Ok(OfpAggregateStats {
            packet_count: NetworkEndian::read_u64(&bytes[0..8]),
            byte_count: NetworkEndian::read_u64(&bytes[8..16]),
            flow_count: NetworkEndian::read_u32(&bytes[16..20]),
        })
    }

    fn min_length() -> usize {
        24
    }

    fn max_length() -> usize {
        24
    }
}

impl OfpFlowStats {
    const FIXED_LEN: usize = 88;

    /// Deserializes every flow entry of a flow stats reply body
    pub fn read_all(bytes: &[u8]) -> Result<Vec<OfpFlowStats>> {
        let mut flows = vec![];
        let mut rest = bytes;
        while !rest.is_empty() {
            if rest.len() < OfpFlowStats::FIXED_LEN {
                return Err(Error::BadRequest(OfpBadRequestCode::BadLen, rest.to_vec()));
            }
            let len = NetworkEndian::read_u16(&rest[0..2]) as usize;
            if len < OfpFlowStats::FIXED_LEN || len > rest.len() {
                return Err(Error::BadRequest(OfpBadRequestCode::BadLen, rest.to_vec()));
            }
            let entry = &rest[..len];
            flows.push(OfpFlowStats {
                table_id: entry[2],
                match_field: OfpMatch::read(&entry[4..44])?,
                duration_sec: NetworkEndian::read_u32(&entry[44..48]),
                duration_nsec: NetworkEndian::read_u32(&entry[48..52]),
                priority: NetworkEndian::read_u16(&entry[52..54]),
                idle_timeout: NetworkEndian::read_u16(&entry[54..56]),
                hard_timeout: NetworkEndian::read_u16(&entry[56..58]),
                cookie: NetworkEndian::read_u64(&entry[64..72]),
                packet_count: NetworkEndian::read_u64(&entry[72..80]),
                byte_count: NetworkEndian::read_u64(&entry[80..88]),
                actions: OfpAction::read_list(&entry[OfpFlowStats::FIXED_LEN..])?,
            });
            rest = &rest[len..];
        }
        Ok(flows)
    }
}

impl OfpTableStats {
    const LEN: usize = 64;

    /// Deserializes every table entry of a table stats reply body
    pub fn read_all(bytes: &[u8]) -> Result<Vec<OfpTableStats>> {
        fixed_records(bytes, OfpTableStats::LEN, |entry| {
            Ok(OfpTableStats {
                table_id: entry[0],
                name: c_string(&entry[4..4 + OFP_MAX_TABLE_NAME_LEN]),
                wildcards: NetworkEndian::read_u32(&entry[36..40]),
                max_entries: NetworkEndian::read_u32(&entry[40..44]),
                active_count: NetworkEndian::read_u32(&entry[44..48]),
                lookup_count: NetworkEndian::read_u64(&entry[48..56]),
                matched_count: NetworkEndian::read_u64(&entry[56..64]),
            })
        })
    }
}

impl OfpPortStats {
    const LEN: usize = 104;

    /// Deserializes every port entry of a port stats reply body
    pub fn read_all(bytes: &[u8]) -> Result<Vec<OfpPortStats>> {
        fixed_records(bytes, OfpPortStats::LEN, |entry| {
            let mut counters = [0u64; 12];
            NetworkEndian::read_u64_into(&entry[8..], &mut counters);
            Ok(OfpPortStats {
                port_no: NetworkEndian::read_u16(&entry[0..2]),
                rx_packets: counters[0],
                tx_packets: counters[1],
                rx_bytes: counters[2],
                tx_bytes: counters[3],
                rx_dropped: counters[4],
                tx_dropped: counters[5],
                rx_errors: counters[6],
                tx_errors: counters[7],
                rx_frame_err: counters[8],
                rx_over_err: counters[9],
                rx_crc_err: counters[10],
                collisions: counters[11],
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openflow::messages::serialize::OfpPacket;

    #[test]
    fn header_deserialization() {
        let expected = OfpHeader {
            version: 1,
            typ: 17,
            length: 0x5234,
            xid: 0x12345678,
        };
        let bytes = [1, 17, 0x52, 0x34, 0x12, 0x34, 0x56, 0x78];
        assert_eq!(expected, OfpHeader::deserialize(&bytes));
        assert_eq!(expected, OfpHeader::of_message(&bytes).unwrap());
        assert!(OfpHeader::of_message(&bytes[..7]).is_err());
    }

    #[test]
    fn min_lengths() {
        assert_eq!(0, OfpEchoReply::min_length());
        assert_eq!(24, OfpSwitchFeatures::min_length());
        assert_eq!(4, OfpErrorMsg::min_length());
        assert_eq!(1056, OfpDescStats::min_length());
    }

    #[test]
    fn max_lengths() {
        assert_eq!(0xFFF7, OfpEchoReply::max_length());
        assert_eq!(0xFFF7, OfpSwitchFeatures::max_length());
        assert_eq!(4, OfpSwitchConfig::max_length());
    }

    #[test]
    fn match_serialization_is_reversible() {
        let mut expected = OfpMatch::new();
        expected.wildcards = Wildcards::exact();
        expected.dl_src = [1, 2, 3, 4, 5, 6];
        expected.dl_vlan = 0x0123;
        expected.dl_type = 0x0800;
        expected.nw_proto = 17;
        expected.nw_dst = 0xc0a8_0001;
        expected.tp_src = 67;
        let mut ser = vec![];
        expected.serialize(&mut ser).unwrap();
        assert_eq!(expected, OfpMatch::read(&ser).unwrap());
    }

    #[test]
    fn action_list() {
        let expected = vec![
            OfpAction::SetDlDst([6, 5, 4, 3, 2, 1]),
            OfpAction::Resubmit(3),
            OfpAction::Output {
                port: 1,
                max_len: 0,
            },
        ];
        let mut ser = vec![];
        for action in &expected {
            action.serialize(&mut ser).unwrap();
        }
        assert_eq!(expected, OfpAction::read_list(&ser).unwrap());
    }

    #[test]
    fn action_list_with_bad_length() {
        let bytes = [0, 0, 0, 12, 0, 1, 0, 0];
        assert!(OfpAction::read_list(&bytes).is_err());
        let bytes = [0, 0, 0, 8, 0, 1];
        assert!(OfpAction::read_list(&bytes).is_err());
    }

    #[test]
    fn unknown_action_is_kept() {
        let bytes = [0, 0x0b, 0, 8, 0, 0, 0, 0];
        let expected = vec![OfpAction::Unknown { typ: 11, len: 8 }];
        assert_eq!(expected, OfpAction::read_list(&bytes).unwrap());
    }

    #[test]
    fn features_with_ports() {
        let mut bytes = vec![0; 24 + 48];
        bytes[7] = 0x2a;
        bytes[12] = 2;
        bytes[24 + 1] = 3;
        bytes[24 + 8..24 + 12].copy_from_slice(b"eth3");
        let testee = OfpSwitchFeatures::deserialize(bytes).unwrap();
        assert_eq!(0x2a, testee.datapath_id());
        assert_eq!(2, testee.n_tables());
        assert_eq!(1, testee.ports().len());
        assert_eq!(3, testee.ports()[0].port_no());
        assert_eq!("eth3", testee.ports()[0].name());
    }

    #[test]
    fn features_with_partial_port() {
        assert!(OfpSwitchFeatures::deserialize(vec![0; 24 + 47]).is_err());
    }

    #[test]
    fn stats_reply_more() {
        let testee = OfpStatsReply::deserialize(vec![0, 1, 0, 1, 9]).unwrap();
        assert_eq!(1, testee.typ());
        assert!(testee.more());
        assert_eq!(&[9], testee.body());
        assert!(OfpStatsReply::deserialize(vec![0, 1, 0]).is_err());
    }

    #[test]
    fn flow_stats_entries() {
        let mut entry = vec![0; 88];
        entry[1] = 96;
        entry[2] = 1;
        entry[4..8].copy_from_slice(&[0x00, 0x3f, 0xff, 0xff]);
        entry[53] = 7;
        entry[79] = 5;
        let mut action = vec![];
        OfpAction::StripVlan.serialize(&mut action).unwrap();
        entry.extend_from_slice(&action);
        let mut bytes = entry.clone();
        bytes.extend_from_slice(&entry);
        let testee = OfpFlowStats::read_all(&bytes).unwrap();
        assert_eq!(2, testee.len());
        assert_eq!(1, testee[1].table_id);
        assert_eq!(7, testee[1].priority);
        assert_eq!(5, testee[1].packet_count);
        assert_eq!(Wildcards::all(), testee[0].match_field.wildcards);
        assert_eq!(vec![OfpAction::StripVlan], testee[0].actions);
    }

    #[test]
    fn port_stats_entries() {
        let mut bytes = vec![0; 104];
        bytes[1] = 2;
        bytes[15] = 10;
        bytes[103] = 1;
        let testee = OfpPortStats::read_all(&bytes).unwrap();
        assert_eq!(2, testee[0].port_no);
        assert_eq!(10, testee[0].rx_packets);
        assert_eq!(1, testee[0].collisions);
        assert!(OfpPortStats::read_all(&bytes[..100]).is_err());
    }

    #[test]
    fn echo_reply_of_request() {
        let request = OfpEchoRequest::new(vec![1, 2, 3]);
        let mut ser = vec![];
        request.serialize_body(&mut ser).unwrap();
        assert_eq!(&[1, 2, 3], OfpEchoReply::deserialize(ser).unwrap().arbitrary());
    }
}
