/*!
Packet-level constants and small helpers shared by the datapath and
OpenFlow codecs.
*/

use std::fmt;

pub const ETH_ADDR_LEN: usize = 6;

/// An Ethernet MAC address in wire order
pub type EthAddr = [u8; ETH_ADDR_LEN];

pub const ETH_TYPE_IP: u16 = 0x0800;
pub const ETH_TYPE_ARP: u16 = 0x0806;

pub const VLAN_VID_MASK: u16 = 0x0fff;
pub const VLAN_PCP_MASK: u16 = 0xe000;
pub const VLAN_PCP_SHIFT: u16 = 13;

/// The six significant (DSCP) bits of the IP ToS byte.
pub const IP_DSCP_MASK: u8 = 0xfc;

/// The IP protocols that get a name in flow specifications
#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy)]
pub enum IpProtocol {
    /// Internet Control Message Protocol
    Icmp = 1,
    /// Transmission Control Protocol
    Tcp = 6,
    /// User Datagram Protocol
    Udp = 17,
}

impl IpProtocol {
    /// Maps a raw protocol number to a named protocol, if there is one.
    pub fn from_u8(proto: u8) -> Option<IpProtocol> {
        match proto {
            1 => Some(IpProtocol::Icmp),
            6 => Some(IpProtocol::Tcp),
            17 => Some(IpProtocol::Udp),
            _ => None,
        }
    }
}

pub fn vlan_tci_to_vid(tci: u16) -> u16 {
    tci & VLAN_VID_MASK
}

pub fn vlan_tci_to_pcp(tci: u16) -> u8 {
    (tci >> VLAN_PCP_SHIFT) as u8
}

/// Displays an `EthAddr` in the usual colon-separated hex form.
pub struct Mac<'a>(pub &'a EthAddr);

impl<'a> fmt::Display for Mac<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let m = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_display() {
        let mac = [0x00, 0x1b, 0x21, 0xaa, 0x0f, 0xff];
        assert_eq!("00:1b:21:aa:0f:ff", Mac(&mac).to_string());
    }

    #[test]
    fn tci_fields() {
        assert_eq!(10, vlan_tci_to_vid(0x700a | 0x1000));
        assert_eq!(3, vlan_tci_to_pcp(0x700a));
    }

    #[test]
    fn named_protocols() {
        assert_eq!(Some(IpProtocol::Udp), IpProtocol::from_u8(17));
        assert_eq!(None, IpProtocol::from_u8(47));
    }
}
