/*!
The datapath flow key and its conversion from and to a `Flow`.
*/

use crate::flow::Flow;
use crate::hash::hash_words;
use crate::openflow::messages::OFP_VLAN_NONE;
use crate::packets::{
    vlan_tci_to_pcp, vlan_tci_to_vid, EthAddr, VLAN_PCP_MASK, VLAN_PCP_SHIFT, VLAN_VID_MASK,
};

use byteorder::{ByteOrder, NetworkEndian};

use std::hash::{Hash, Hasher};

/// The CFI bit, always set in a TCI that carries an 802.1Q header
pub const ODP_TCI_PRESENT: u16 = 0x1000;

/// Length of the wire image in byte
pub const FLOW_KEY_LEN: usize = 32;
const FLOW_KEY_WORDS: usize = FLOW_KEY_LEN / 4;

// The word hash needs a whole number of words.
const _: [(); 0] = [(); FLOW_KEY_LEN % 4];

/// The exact-match key the datapath uses for flow lookup
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowKey {
    pub nw_src: u32,
    pub nw_dst: u32,
    pub in_port: u16,
    /// All zeros if the 802.1Q header is absent,
    /// `ODP_TCI_PRESENT` set if it is present.
    pub dl_tci: u16,
    pub dl_type: u16,
    pub tp_src: u16,
    pub tp_dst: u16,
    pub dl_src: EthAddr,
    pub dl_dst: EthAddr,
    pub nw_proto: u8,
    pub nw_tos: u8,
}

impl FlowKey {
    pub fn from_flow(flow: &Flow) -> FlowKey {
        let dl_tci = if flow.dl_vlan == OFP_VLAN_NONE {
            0
        }
        else {
            let vid = flow.dl_vlan & VLAN_VID_MASK;
            let pcp = (u16::from(flow.dl_vlan_pcp) << VLAN_PCP_SHIFT) & VLAN_PCP_MASK;
            vid | pcp | ODP_TCI_PRESENT
        };
        FlowKey {
            nw_src: flow.nw_src,
            nw_dst: flow.nw_dst,
            in_port: flow.in_port,
            dl_tci,
            dl_type: flow.dl_type,
            tp_src: flow.tp_src,
            tp_dst: flow.tp_dst,
            dl_src: flow.dl_src,
            dl_dst: flow.dl_dst,
            nw_proto: flow.nw_proto,
            nw_tos: flow.nw_tos,
        }
    }

    /// The inverse of `from_flow` on every field the key carries.
    /// The tunnel id is not part of the key and comes back as zero.
    pub fn to_flow(&self) -> Flow {
        let (dl_vlan, dl_vlan_pcp) = if self.dl_tci != 0 {
            (vlan_tci_to_vid(self.dl_tci), vlan_tci_to_pcp(self.dl_tci))
        }
        else {
            (OFP_VLAN_NONE, 0)
        };
        Flow {
            tun_id: 0,
            nw_src: self.nw_src,
            nw_dst: self.nw_dst,
            in_port: self.in_port,
            dl_vlan,
            dl_vlan_pcp,
            dl_type: self.dl_type,
            tp_src: self.tp_src,
            tp_dst: self.tp_dst,
            dl_src: self.dl_src,
            dl_dst: self.dl_dst,
            nw_proto: self.nw_proto,
            nw_tos: self.nw_tos,
        }
    }

    pub fn to_bytes(&self) -> [u8; FLOW_KEY_LEN] {
        let mut buf = [0; FLOW_KEY_LEN];
        NetworkEndian::write_u32(&mut buf[0..4], self.nw_src);
        NetworkEndian::write_u32(&mut buf[4..8], self.nw_dst);
        NetworkEndian::write_u16(&mut buf[8..10], self.in_port);
        NetworkEndian::write_u16(&mut buf[10..12], self.dl_tci);
        NetworkEndian::write_u16(&mut buf[12..14], self.dl_type);
        NetworkEndian::write_u16(&mut buf[14..16], self.tp_src);
        NetworkEndian::write_u16(&mut buf[16..18], self.tp_dst);
        buf[18..24].copy_from_slice(&self.dl_src);
        buf[24..30].copy_from_slice(&self.dl_dst);
        buf[30] = self.nw_proto;
        buf[31] = self.nw_tos;
        buf
    }

    pub fn from_bytes(bytes: &[u8; FLOW_KEY_LEN]) -> FlowKey {
        let mut dl_src = [0; 6];
        let mut dl_dst = [0; 6];
        dl_src.copy_from_slice(&bytes[18..24]);
        dl_dst.copy_from_slice(&bytes[24..30]);
        FlowKey {
            nw_src: NetworkEndian::read_u32(&bytes[0..4]),
            nw_dst: NetworkEndian::read_u32(&bytes[4..8]),
            in_port: NetworkEndian::read_u16(&bytes[8..10]),
            dl_tci: NetworkEndian::read_u16(&bytes[10..12]),
            dl_type: NetworkEndian::read_u16(&bytes[12..14]),
            tp_src: NetworkEndian::read_u16(&bytes[14..16]),
            tp_dst: NetworkEndian::read_u16(&bytes[16..18]),
            dl_src,
            dl_dst,
            nw_proto: bytes[30],
            nw_tos: bytes[31],
        }
    }

    fn words(&self) -> [u32; FLOW_KEY_WORDS] {
        let bytes = self.to_bytes();
        let mut words = [0; FLOW_KEY_WORDS];
        NetworkEndian::read_u32_into(&bytes, &mut words);
        words
    }

    /// Byte-image equality
    pub fn equal(&self, other: &FlowKey) -> bool {
        self.to_bytes() == other.to_bytes()
    }

    /// Hashes the byte image, salted with `basis`
    pub fn hash(&self, basis: u32) -> u32 {
        hash_words(&self.words(), basis)
    }
}

impl PartialEq for FlowKey {
    fn eq(&self, other: &FlowKey) -> bool {
        self.equal(other)
    }
}

impl Eq for FlowKey {}

impl Hash for FlowKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(&self.to_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn tcp_flow() -> Flow {
        Flow {
            nw_src: 0xc000_0201,
            nw_dst: 0xc000_020a,
            in_port: 7,
            dl_vlan: 42,
            dl_vlan_pcp: 3,
            dl_type: 0x0800,
            tp_src: 49152,
            tp_dst: 443,
            dl_src: [0x00, 0x16, 0x3e, 0x00, 0x00, 0x01],
            dl_dst: [0x00, 0x16, 0x3e, 0x00, 0x00, 0x02],
            nw_proto: 6,
            nw_tos: 0x28,
            ..Flow::default()
        }
    }

    #[test]
    fn tagged_tci() {
        let testee = FlowKey::from_flow(&tcp_flow());
        assert_eq!(42 | (3 << 13) | ODP_TCI_PRESENT, testee.dl_tci);
    }

    #[test]
    fn untagged_tci() {
        let testee = FlowKey::from_flow(&Flow::default());
        assert_eq!(0, testee.dl_tci);
        assert_eq!(OFP_VLAN_NONE, testee.to_flow().dl_vlan);
    }

    #[test]
    fn vid_zero_keeps_tag() {
        let flow = Flow {
            dl_vlan: 0,
            ..Flow::default()
        };
        let testee = FlowKey::from_flow(&flow);
        assert_eq!(ODP_TCI_PRESENT, testee.dl_tci);
        assert_eq!(0, testee.to_flow().dl_vlan);
    }

    #[test]
    fn flow_round_trip() {
        let expected = tcp_flow();
        assert_eq!(expected, FlowKey::from_flow(&expected).to_flow());
        let untagged = Flow {
            dl_type: 0x0806,
            nw_proto: 1,
            ..Flow::default()
        };
        assert_eq!(untagged, FlowKey::from_flow(&untagged).to_flow());
    }

    #[test]
    fn wire_layout() {
        let bytes = FlowKey::from_flow(&tcp_flow()).to_bytes();
        assert_eq!([0xc0, 0x00, 0x02, 0x01], bytes[0..4]);
        assert_eq!([0x00, 0x07], bytes[8..10]);
        assert_eq!([0x70, 0x2a], bytes[10..12]);
        assert_eq!([0x01, 0xbb], bytes[16..18]);
        assert_eq!(6, bytes[30]);
        assert_eq!(FlowKey::from_flow(&tcp_flow()), FlowKey::from_bytes(&bytes));
    }

    #[test]
    fn equal_keys_hash_equal() {
        let a = FlowKey::from_flow(&tcp_flow());
        let b = FlowKey::from_bytes(&a.to_bytes());
        assert!(a.equal(&b));
        for basis in &[0, 1, 0xdead_beef] {
            assert_eq!(a.hash(*basis), b.hash(*basis));
        }
    }

    #[test]
    fn any_byte_differs() {
        let a = FlowKey::from_flow(&tcp_flow());
        let mut b = a;
        b.nw_tos ^= 0x04;
        assert!(!a.equal(&b));
        assert_ne!(a.hash(0), b.hash(0));
    }

    #[test]
    fn usable_as_map_key() {
        let mut testee = HashMap::new();
        testee.insert(FlowKey::from_flow(&tcp_flow()), 1);
        let same = FlowKey::from_bytes(&FlowKey::from_flow(&tcp_flow()).to_bytes());
        assert_eq!(Some(&1), testee.get(&same));
    }
}
