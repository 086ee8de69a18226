/*!
The flow: the header fields that identify one traffic class,
independent of the OpenFlow or datapath encoding.

All multi-byte fields are kept as host integers. The codecs take care of
network byte order.
*/

use crate::openflow::messages::{OfpMatch, Wildcards, OFP_VLAN_NONE};
use crate::packets::EthAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Flow {
    /// Encapsulating tunnel ID.
    pub tun_id: u32,
    /// IP source address.
    pub nw_src: u32,
    /// IP destination address.
    pub nw_dst: u32,
    /// Input switch port.
    pub in_port: u16,
    /// Input VLAN id, `OFP_VLAN_NONE` if the frame is untagged.
    pub dl_vlan: u16,
    /// Input VLAN priority.
    pub dl_vlan_pcp: u8,
    /// Ethernet frame type.
    pub dl_type: u16,
    /// TCP/UDP source port or ICMP type.
    pub tp_src: u16,
    /// TCP/UDP destination port or ICMP code.
    pub tp_dst: u16,
    pub dl_src: EthAddr,
    pub dl_dst: EthAddr,
    /// IP protocol or low 8 bits of ARP opcode.
    pub nw_proto: u8,
    /// IP ToS (DSCP field, 6 bits).
    pub nw_tos: u8,
}

impl Default for Flow {
    fn default() -> Self {
        Flow {
            tun_id: 0,
            nw_src: 0,
            nw_dst: 0,
            in_port: 0,
            dl_vlan: OFP_VLAN_NONE,
            dl_vlan_pcp: 0,
            dl_type: 0,
            tp_src: 0,
            tp_dst: 0,
            dl_src: [0; 6],
            dl_dst: [0; 6],
            nw_proto: 0,
            nw_tos: 0,
        }
    }
}

impl Flow {
    /// Takes the field values of an OpenFlow match, ignoring its wildcards.
    /// With `tun_id_from_cookie` the tunnel id is the upper half of `cookie`.
    pub fn from_match(m: &OfpMatch, tun_id_from_cookie: bool, cookie: u64) -> Flow {
        let tun_id = if tun_id_from_cookie && !m.wildcards.tun_id {
            (cookie >> 32) as u32
        }
        else {
            0
        };
        Flow {
            tun_id,
            nw_src: m.nw_src,
            nw_dst: m.nw_dst,
            in_port: m.in_port,
            dl_vlan: m.dl_vlan,
            dl_vlan_pcp: m.dl_vlan_pcp,
            dl_type: m.dl_type,
            tp_src: m.tp_src,
            tp_dst: m.tp_dst,
            dl_src: m.dl_src,
            dl_dst: m.dl_dst,
            nw_proto: m.nw_proto,
            nw_tos: m.nw_tos,
        }
    }

    /// Builds a match that matches exactly this flow.
    pub fn to_match(&self) -> OfpMatch {
        OfpMatch {
            wildcards: Wildcards::exact(),
            in_port: self.in_port,
            dl_src: self.dl_src,
            dl_dst: self.dl_dst,
            dl_vlan: self.dl_vlan,
            dl_vlan_pcp: self.dl_vlan_pcp,
            dl_type: self.dl_type,
            nw_tos: self.nw_tos,
            nw_proto: self.nw_proto,
            nw_src: self.nw_src,
            nw_dst: self.nw_dst,
            tp_src: self.tp_src,
            tp_dst: self.tp_dst,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_untagged() {
        assert_eq!(OFP_VLAN_NONE, Flow::default().dl_vlan);
    }

    #[test]
    fn match_round_trip() {
        let expected = Flow {
            nw_src: 0x0a00_0001,
            nw_dst: 0x0a00_0002,
            in_port: 3,
            dl_vlan: 10,
            dl_vlan_pcp: 5,
            dl_type: 0x0800,
            tp_src: 1234,
            tp_dst: 80,
            dl_src: [0, 1, 2, 3, 4, 5],
            dl_dst: [6, 7, 8, 9, 10, 11],
            nw_proto: 6,
            nw_tos: 0x10,
            ..Flow::default()
        };
        let testee = Flow::from_match(&expected.to_match(), false, 0);
        assert_eq!(expected, testee);
    }

    #[test]
    fn tunnel_id_from_cookie() {
        let m = Flow::default().to_match();
        assert_eq!(0x1234, Flow::from_match(&m, true, 0x1234_0000_0000).tun_id);
        assert_eq!(0, Flow::from_match(&m, false, 0x1234_0000_0000).tun_id);
    }
}
