/*!
The OpenFlow 1.0 message primitives needed to program and query a switch

This is based on the openflow.h from OpenFlow Switch Specification 1.0.0
plus the Nicira vendor extensions the switch understands.
The type names are changed to align with the Rust conventions.
*/

pub mod deserialize;
pub mod serialize;

use crate::packets::{EthAddr, IpProtocol, ETH_TYPE_ARP, ETH_TYPE_IP, IP_DSCP_MASK};

use std::fmt;

/* Copyright (c) 2008 The Board of Trustees of The Leland Stanford Junior University
 *
 * We are making the OpenFlow specification and associated documentation
 * (Software) available for public use and benefit with the expectation
 * that others will use, modify and enhance the Software and contribute
 * those enhancements back to the community. However, since we would
 * like to make the Software available for broadest use, with as few
 * restrictions as possible permission is hereby granted, free of
 * charge, to any person obtaining a copy of this Software to deal in
 * the Software under the copyrights without restriction, including
 * without limitation the rights to use, copy, modify, merge, publish,
 * distribute, sublicense, and/or sell copies of the Software, and to
 * permit persons to whom the Software is furnished to do so, subject to
 * the following conditions:
 *
 * The above copyright notice and this permission notice shall be
 * included in all copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
 * EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
 * MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
 * NONINFRINGEMENT.  IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS
 * BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN
 * ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
 * CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 *
 * The name and trademarks of copyright holder(s) may NOT be used in
 * advertising or publicity pertaining to the Software or any
 * derivatives without specific, written prior permission.
 */

/// Version number:
/// Non-experimental versions released: 0x01
/// Experimental versions released: 0x81 -- 0x99
pub const OFP_VERSION: u8 = 0x01;

pub const OFP_TCP_PORT: u16 = 6633;
pub const OFP_SSL_PORT: u16 = 6633;

/// Maximum number of physical switch ports.
pub const OFPP_MAX: u16 = 0xff00;
/// Send the packet out the input port. This virtual port must be
/// explicitly used in order to send back out of the input port.
pub const OFPP_IN_PORT: u16 = 0xfff8;
/// Perform actions in flow table.
/// NB: This can only be the destination port for packet-out messages.
pub const OFPP_TABLE: u16 = 0xfff9;
/// Process with normal L2/L3 switching.
pub const OFPP_NORMAL: u16 = 0xfffa;
/// All physical ports except input port and those disabled by STP.
pub const OFPP_FLOOD: u16 = 0xfffb;
/// All physical ports except input port.
pub const OFPP_ALL: u16 = 0xfffc;
/// Send to controller.
pub const OFPP_CONTROLLER: u16 = 0xfffd;
/// Local openflow "port".
pub const OFPP_LOCAL: u16 = 0xfffe;
/// Not associated with a physical port.
pub const OFPP_NONE: u16 = 0xffff;

/// The symbolic names of the reserved ports
pub const PORT_NAMES: [(&str, u16); 8] = [
    ("IN_PORT", OFPP_IN_PORT),
    ("TABLE", OFPP_TABLE),
    ("NORMAL", OFPP_NORMAL),
    ("FLOOD", OFPP_FLOOD),
    ("ALL", OFPP_ALL),
    ("CONTROLLER", OFPP_CONTROLLER),
    ("LOCAL", OFPP_LOCAL),
    ("NONE", OFPP_NONE),
];

/// The VLAN id of an untagged frame.
pub const OFP_VLAN_NONE: u16 = 0xffff;

/// Value used in `idle_timeout` and `hard_timeout` to indicate that the entry is permanent.
pub const OFP_FLOW_PERMANENT: u16 = 0;

/// By default, choose a priority in the middle.
pub const OFP_DEFAULT_PRIORITY: u16 = 0x8000;

/// A reserved buffer ID to express that no buffer is assigned
pub const OFP_NO_BUFFER: u32 = 0xffff_ffff;

/// A message's type, the most fundamental to
/// distinguish information between messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfpType {
    /* Immutable messages. */
    /// Symmetric message
    Hello = 0,
    /// Symmetric message
    Error = 1,
    /// Symmetric message
    EchoRequest = 2,
    /// Symmetric message
    EchoReply = 3,
    /// Symmetric message
    Vendor = 4,

    /* Switch configuration messages. */
    /// Controller/switch message
    FeaturesRequest = 5,
    /// Controller/switch message
    FeaturesReply = 6,
    /// Controller/switch message
    GetConfigRequest = 7,
    /// Controller/switch message
    GetConfigReply = 8,
    /// Controller/switch message
    SetConfig = 9,

    /* Asynchronous messages. */
    /// Async message
    PacketIn = 10,
    /// Async message
    FlowRemoved = 11,
    /// Async message
    PortStatus = 12,

    /* Controller command messages. */
    /// Controller/switch message
    PacketOut = 13,
    /// Controller/switch message
    FlowMod = 14,
    /// Controller/switch message
    PortMod = 15,

    /* Statistics messages. */
    /// Controller/switch message
    StatsRequest = 16,
    /// Controller/switch message
    StatsReply = 17,

    /* Barrier messages. */
    /// Controller/switch message
    BarrierRequest = 18,
    /// Controller/switch message
    BarrierReply = 19,
}

impl OfpType {
    pub fn from_u8(typ: u8) -> Option<OfpType> {
        let t = match typ {
            0 => OfpType::Hello,
            1 => OfpType::Error,
            2 => OfpType::EchoRequest,
            3 => OfpType::EchoReply,
            4 => OfpType::Vendor,
            5 => OfpType::FeaturesRequest,
            6 => OfpType::FeaturesReply,
            7 => OfpType::GetConfigRequest,
            8 => OfpType::GetConfigReply,
            9 => OfpType::SetConfig,
            10 => OfpType::PacketIn,
            11 => OfpType::FlowRemoved,
            12 => OfpType::PortStatus,
            13 => OfpType::PacketOut,
            14 => OfpType::FlowMod,
            15 => OfpType::PortMod,
            16 => OfpType::StatsRequest,
            17 => OfpType::StatsReply,
            18 => OfpType::BarrierRequest,
            19 => OfpType::BarrierReply,
            _ => return None,
        };
        Some(t)
    }
}

/// Header on all OpenFlow packets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OfpHeader {
    /// OFP_VERSION.
    version: u8,
    /// This packet's OfpType.
    typ: u8,
    /// This packet's length including this OfpHeader.
    length: u16,
    /// Transaction id associated with this packet.
    /// Replies use the same id as was in the request
    /// to facilitate pairing.
    xid: u32,
}

/* Some getters */

impl OfpHeader {
    /// Gets the packet's OpenFlow version
    pub fn version(&self) -> u8 {
        self.version
    }
    /// Gets this packet's `OfpType`'s numerical respresentation.
    pub fn typ(&self) -> u8 {
        self.typ
    }
    /// Gets the packet's length including the header
    pub fn length(&self) -> u16 {
        self.length
    }
    /// Gets the packet's transaction id
    pub fn xid(&self) -> u32 {
        self.xid
    }
}

/* ## ------------------------------- ## */
/* ## OpenFlow 1.0 flow match fields. ## */
/* ## ------------------------------- ## */

/// Switch input port.
pub const OFPFW_IN_PORT: u32 = 1 << 0;
/// VLAN id.
pub const OFPFW_DL_VLAN: u32 = 1 << 1;
/// Ethernet source address.
pub const OFPFW_DL_SRC: u32 = 1 << 2;
/// Ethernet destination address.
pub const OFPFW_DL_DST: u32 = 1 << 3;
/// Ethernet frame type.
pub const OFPFW_DL_TYPE: u32 = 1 << 4;
/// IP protocol.
pub const OFPFW_NW_PROTO: u32 = 1 << 5;
/// TCP/UDP source port.
pub const OFPFW_TP_SRC: u32 = 1 << 6;
/// TCP/UDP destination port.
pub const OFPFW_TP_DST: u32 = 1 << 7;

/// IP source address wildcard bit count. 0 is exact match, 1 ignores the
/// LSB, 2 ignores the 2 least-significant bits, ..., 32 and higher
/// wildcard the entire field.
pub const OFPFW_NW_SRC_SHIFT: u32 = 8;
pub const OFPFW_NW_SRC_BITS: u32 = 6;
pub const OFPFW_NW_SRC_MASK: u32 = ((1 << OFPFW_NW_SRC_BITS) - 1) << OFPFW_NW_SRC_SHIFT;
pub const OFPFW_NW_SRC_ALL: u32 = 32 << OFPFW_NW_SRC_SHIFT;

/// IP destination address wildcard bit count. Same format as source.
pub const OFPFW_NW_DST_SHIFT: u32 = 14;
pub const OFPFW_NW_DST_BITS: u32 = 6;
pub const OFPFW_NW_DST_MASK: u32 = ((1 << OFPFW_NW_DST_BITS) - 1) << OFPFW_NW_DST_SHIFT;
pub const OFPFW_NW_DST_ALL: u32 = 32 << OFPFW_NW_DST_SHIFT;

/// VLAN priority.
pub const OFPFW_DL_VLAN_PCP: u32 = 1 << 20;
/// IP ToS (DSCP field, 6 bits).
pub const OFPFW_NW_TOS: u32 = 1 << 21;

/// Wildcard all fields.
pub const OFPFW_ALL: u32 = (1 << 22) - 1;

/// Nicira extension: wildcard the tunnel id.
pub const NXFW_TUN_ID: u32 = 1 << 22;

/// All wildcard bits this side understands.
pub const OVSFW_ALL: u32 = OFPFW_ALL | NXFW_TUN_ID;

/// The ICMP type shares the transport source port field.
pub const OFPFW_ICMP_TYPE: u32 = OFPFW_TP_SRC;
/// The ICMP code shares the transport destination port field.
pub const OFPFW_ICMP_CODE: u32 = OFPFW_TP_DST;

const NW_BITS_MAX: u8 = (1 << OFPFW_NW_SRC_BITS) - 1;

/// Returns a mask with a 1 in each address bit that must match
/// for the given wildcard bit count.
pub fn nw_bits_to_mask(bits: u8) -> u32 {
    if bits < 32 {
        !((1u32 << bits) - 1)
    }
    else {
        0
    }
}

/// The wildcard word of an `OfpMatch`, unpacked.
///
/// The address wildcards are counts of ignored low-order bits (0..=63,
/// where 32 and above ignore the whole address), not prefix lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wildcards {
    pub in_port: bool,
    pub dl_vlan: bool,
    pub dl_src: bool,
    pub dl_dst: bool,
    pub dl_type: bool,
    pub nw_proto: bool,
    pub tp_src: bool,
    pub tp_dst: bool,
    pub nw_src_bits: u8,
    pub nw_dst_bits: u8,
    pub dl_vlan_pcp: bool,
    pub nw_tos: bool,
    pub tun_id: bool,
}

impl Wildcards {
    /// Every OpenFlow field wildcarded, the tunnel id matched
    pub fn all() -> Wildcards {
        Wildcards::from_bits(OFPFW_ALL)
    }

    /// Nothing wildcarded
    pub fn exact() -> Wildcards {
        Wildcards::from_bits(0)
    }

    /// Unpacks a wire wildcard word. Unknown bits are dropped.
    pub fn from_bits(bits: u32) -> Wildcards {
        Wildcards {
            in_port: bits & OFPFW_IN_PORT != 0,
            dl_vlan: bits & OFPFW_DL_VLAN != 0,
            dl_src: bits & OFPFW_DL_SRC != 0,
            dl_dst: bits & OFPFW_DL_DST != 0,
            dl_type: bits & OFPFW_DL_TYPE != 0,
            nw_proto: bits & OFPFW_NW_PROTO != 0,
            tp_src: bits & OFPFW_TP_SRC != 0,
            tp_dst: bits & OFPFW_TP_DST != 0,
            nw_src_bits: ((bits & OFPFW_NW_SRC_MASK) >> OFPFW_NW_SRC_SHIFT) as u8,
            nw_dst_bits: ((bits & OFPFW_NW_DST_MASK) >> OFPFW_NW_DST_SHIFT) as u8,
            dl_vlan_pcp: bits & OFPFW_DL_VLAN_PCP != 0,
            nw_tos: bits & OFPFW_NW_TOS != 0,
            tun_id: bits & NXFW_TUN_ID != 0,
        }
    }

    /// Packs into the wire wildcard word.
    pub fn bits(&self) -> u32 {
        let flag = |set: bool, bit: u32| if set { bit } else { 0 };
        flag(self.in_port, OFPFW_IN_PORT)
            | flag(self.dl_vlan, OFPFW_DL_VLAN)
            | flag(self.dl_src, OFPFW_DL_SRC)
            | flag(self.dl_dst, OFPFW_DL_DST)
            | flag(self.dl_type, OFPFW_DL_TYPE)
            | flag(self.nw_proto, OFPFW_NW_PROTO)
            | flag(self.tp_src, OFPFW_TP_SRC)
            | flag(self.tp_dst, OFPFW_TP_DST)
            | (u32::from(self.nw_src_bits.min(NW_BITS_MAX)) << OFPFW_NW_SRC_SHIFT)
            | (u32::from(self.nw_dst_bits.min(NW_BITS_MAX)) << OFPFW_NW_DST_SHIFT)
            | flag(self.dl_vlan_pcp, OFPFW_DL_VLAN_PCP)
            | flag(self.nw_tos, OFPFW_NW_TOS)
            | flag(self.tun_id, NXFW_TUN_ID)
    }

    /// Wildcards the whole source address.
    pub fn set_nw_src_all(&mut self) {
        self.nw_src_bits = NW_BITS_MAX;
    }

    /// Wildcards the whole destination address.
    pub fn set_nw_dst_all(&mut self) {
        self.nw_dst_bits = NW_BITS_MAX;
    }

    pub fn nw_src_mask(&self) -> u32 {
        nw_bits_to_mask(self.nw_src_bits)
    }

    pub fn nw_dst_mask(&self) -> u32 {
        nw_bits_to_mask(self.nw_dst_bits)
    }

    fn set_nw(&mut self, wild: bool) {
        let bits = if wild { NW_BITS_MAX } else { 0 };
        self.nw_src_bits = bits;
        self.nw_dst_bits = bits;
        self.nw_proto = wild;
        self.nw_tos = wild;
    }

    fn set_tp(&mut self, wild: bool) {
        self.tp_src = wild;
        self.tp_dst = wild;
    }
}

/// Fields to match against flows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfpMatch {
    /// Wildcard fields.
    pub wildcards: Wildcards,
    /// Input switch port.
    pub in_port: u16,
    /// Ethernet source address.
    pub dl_src: EthAddr,
    /// Ethernet destination address.
    pub dl_dst: EthAddr,
    /// Input VLAN id.
    pub dl_vlan: u16,
    /// Input VLAN priority.
    pub dl_vlan_pcp: u8,
    /// Ethernet frame type.
    pub dl_type: u16,
    /// IP ToS (actually DSCP field, 6 bits).
    pub nw_tos: u8,
    /// IP protocol or lower 8 bits of ARP opcode.
    pub nw_proto: u8,
    /// IP source address.
    pub nw_src: u32,
    /// IP destination address.
    pub nw_dst: u32,
    /// TCP/UDP source port or ICMP type.
    pub tp_src: u16,
    /// TCP/UDP destination port or ICMP code.
    pub tp_dst: u16,
}

impl Default for OfpMatch {
    fn default() -> Self {
        OfpMatch::new()
    }
}

impl OfpMatch {
    /// Length of the wire image in byte
    pub const LEN: usize = 40;

    /// Constructs a match that matches everything.
    pub fn new() -> OfpMatch {
        OfpMatch {
            wildcards: Wildcards::all(),
            in_port: 0,
            dl_src: [0; 6],
            dl_dst: [0; 6],
            dl_vlan: 0,
            dl_vlan_pcp: 0,
            dl_type: 0,
            nw_tos: 0,
            nw_proto: 0,
            nw_src: 0,
            nw_dst: 0,
            tp_src: 0,
            tp_dst: 0,
        }
    }

    /// Brings the match into normal form: fields that cannot be matched
    /// given the other fields' values are wildcarded or exact-matched as
    /// zero, and wildcarded fields hold zero.
    pub fn normalize(&mut self) {
        let wc = &mut self.wildcards;
        if wc.dl_type {
            // no network or transport fields without a known frame type
            self.dl_type = 0;
            wc.set_nw(true);
            wc.set_tp(true);
            self.nw_src = 0;
            self.nw_dst = 0;
            self.nw_proto = 0;
            self.nw_tos = 0;
            self.tp_src = 0;
            self.tp_dst = 0;
        }
        else if self.dl_type == ETH_TYPE_IP {
            if wc.nw_proto {
                self.nw_proto = 0;
                wc.set_tp(true);
                self.tp_src = 0;
                self.tp_dst = 0;
            }
            else if IpProtocol::from_u8(self.nw_proto).is_some() {
                if wc.tp_src {
                    self.tp_src = 0;
                }
                if wc.tp_dst {
                    self.tp_dst = 0;
                }
            }
            else {
                // transport fields are always extracted as zeros
                wc.set_tp(false);
                self.tp_src = 0;
                self.tp_dst = 0;
            }
            self.nw_src &= wc.nw_src_mask();
            self.nw_dst &= wc.nw_dst_mask();
            if wc.nw_tos {
                self.nw_tos = 0;
            }
            else {
                self.nw_tos &= IP_DSCP_MASK;
            }
        }
        else if self.dl_type == ETH_TYPE_ARP {
            if wc.nw_proto {
                self.nw_proto = 0;
            }
            self.nw_src &= wc.nw_src_mask();
            self.nw_dst &= wc.nw_dst_mask();
            self.tp_src = 0;
            self.tp_dst = 0;
            self.nw_tos = 0;
        }
        else {
            // network and transport fields are always extracted as zeros
            wc.set_nw(false);
            wc.set_tp(false);
            self.nw_src = 0;
            self.nw_dst = 0;
            self.nw_proto = 0;
            self.nw_tos = 0;
            self.tp_src = 0;
            self.tp_dst = 0;
        }
        if wc.dl_src {
            self.dl_src = [0; 6];
        }
        if wc.dl_dst {
            self.dl_dst = [0; 6];
        }
    }

    /// Returns a normalized copy.
    pub fn normalized(&self) -> OfpMatch {
        let mut m = *self;
        m.normalize();
        m
    }
}

/* ## ------------------- ## */
/* ## OpenFlow 1.0 ports. ## */
/* ## ------------------- ## */

pub const OFP_MAX_PORT_NAME_LEN: usize = 16;

/// Description of a physical port
#[derive(Debug, Clone, PartialEq)]
pub struct OfpPhyPort {
    port_no: u16,
    hw_addr: EthAddr,
    /// Null-terminated
    name: [u8; OFP_MAX_PORT_NAME_LEN],
    /// Bitmap of OFPPC_* flags.
    config: u32,
    /// Bitmap of OFPPS_* flags.
    state: u32,

    /* Bitmaps of OFPPF_* that describe features.  All bits zeroed if
     * unsupported or unavailable. */
    /// Current features.
    curr: u32,
    /// Features being advertised by the port.
    advertised: u32,
    /// Features supported by the port.
    supported: u32,
    /// Features advertised by peer.
    peer: u32,
}

/// Port is administratively down.
pub const OFPPC_PORT_DOWN: u32 = 1 << 0;
/// Do not include this port when flooding.
pub const OFPPC_NO_FLOOD: u32 = 1 << 4;
/// No physical link present.
pub const OFPPS_LINK_DOWN: u32 = 1 << 0;

impl OfpPhyPort {
    pub fn port_no(&self) -> u16 {
        self.port_no
    }
    pub fn hw_addr(&self) -> &EthAddr {
        &self.hw_addr
    }
    /// Gets the port name up to its terminating null byte
    pub fn name(&self) -> String {
        c_string(&self.name)
    }
    pub fn config(&self) -> u32 {
        self.config
    }
    pub fn state(&self) -> u32 {
        self.state
    }
    pub fn curr(&self) -> u32 {
        self.curr
    }
}

/// Decodes a fixed-size, null-padded string field.
pub fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Switch features.
#[derive(Debug, PartialEq)]
pub struct OfpSwitchFeatures {
    /// Datapath unique ID. The lower 48-bits are for
    /// a MAC address, while the upper 16-bits are
    /// implementer-defined.
    datapath_id: u64,
    /// Max packets buffered at once.
    n_buffers: u32,
    /// Number of tables supported by datapath.
    n_tables: u8,

    /* Features. */
    /// Bitmap of support OfpCapabilities.
    capabilities: u32,
    /// Bitmap of supported OfpActionType.
    actions: u32,

    /// Port definitions. The number of ports is inferred from the
    /// length field in the header.
    ports: Vec<OfpPhyPort>,
}

impl OfpSwitchFeatures {
    /// Gets the datapath unique ID
    pub fn datapath_id(&self) -> u64 {
        self.datapath_id
    }
    pub fn n_buffers(&self) -> u32 {
        self.n_buffers
    }
    pub fn n_tables(&self) -> u8 {
        self.n_tables
    }
    pub fn capabilities(&self) -> u32 {
        self.capabilities
    }
    pub fn actions(&self) -> u32 {
        self.actions
    }
    pub fn ports(&self) -> &[OfpPhyPort] {
        &self.ports
    }
}

/// Switch configuration.
#[derive(Debug, PartialEq)]
pub struct OfpSwitchConfig {
    /// OFPC_* flags.
    flags: u16,
    /// Max bytes of new flow that datapath should send to the controller.
    miss_send_len: u16,
}

impl OfpSwitchConfig {
    pub fn flags(&self) -> u16 {
        self.flags
    }
    pub fn miss_send_len(&self) -> u16 {
        self.miss_send_len
    }
}

/// An OpenFlow Echo Request
#[derive(Debug)]
pub struct OfpEchoRequest {
    arbitrary: Vec<u8>,
}

impl OfpEchoRequest {
    /// Gets the message's content
    pub fn arbitrary(&self) -> &[u8] {
        &self.arbitrary
    }
}

/// An OpenFlow Echo Reply
#[derive(Debug)]
pub struct OfpEchoReply {
    arbitrary: Vec<u8>,
}

impl OfpEchoReply {
    /// Gets the message's content
    pub fn arbitrary(&self) -> &[u8] {
        &self.arbitrary
    }
}

/* ## ----------------- ## */
/* ## OpenFlow Actions. ## */
/* ## ----------------- ## */

/// Output to switch port.
pub const OFPAT_OUTPUT: u16 = 0;
/// Set the 802.1q VLAN id.
pub const OFPAT_SET_VLAN_VID: u16 = 1;
/// Set the 802.1q priority.
pub const OFPAT_SET_VLAN_PCP: u16 = 2;
/// Strip the 802.1q header.
pub const OFPAT_STRIP_VLAN: u16 = 3;
/// Ethernet source address.
pub const OFPAT_SET_DL_SRC: u16 = 4;
/// Ethernet destination address.
pub const OFPAT_SET_DL_DST: u16 = 5;
/// IP source address.
pub const OFPAT_SET_NW_SRC: u16 = 6;
/// IP destination address.
pub const OFPAT_SET_NW_DST: u16 = 7;
/// IP ToS (DSCP field, 6 bits).
pub const OFPAT_SET_NW_TOS: u16 = 8;
/// TCP/UDP source port.
pub const OFPAT_SET_TP_SRC: u16 = 9;
/// TCP/UDP destination port.
pub const OFPAT_SET_TP_DST: u16 = 10;
pub const OFPAT_VENDOR: u16 = 0xffff;

/// The vendor id of all Nicira extensions.
pub const NX_VENDOR_ID: u32 = 0x0000_2320;
/// Searches the flow table again, using a flow that is slightly modified
/// from the original lookup: the input port is replaced.
pub const NXAST_RESUBMIT: u16 = 1;
/// Sets the encapsulating tunnel ID.
pub const NXAST_SET_TUNNEL: u16 = 2;

/// One OpenFlow action.
///
/// Every action starts with its type and length on the wire.
/// The length includes the header and any padding used to make
/// the action 64-bit aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfpAction {
    /// Sends packets out `port`. When the port is the controller,
    /// `max_len` is the maximum number of bytes to send.
    Output { port: u16, max_len: u16 },
    SetVlanVid(u16),
    SetVlanPcp(u8),
    StripVlan,
    SetDlSrc(EthAddr),
    SetDlDst(EthAddr),
    SetNwSrc(u32),
    SetNwDst(u32),
    SetNwTos(u8),
    SetTpSrc(u16),
    SetTpDst(u16),
    /// Nicira: resubmit with a different input port
    Resubmit(u16),
    /// Nicira: set the tunnel id
    SetTunnel(u32),
    /// An action this side cannot interpret
    Unknown { typ: u16, len: u16 },
}

impl OfpAction {
    /// The action type on the wire
    pub fn typ(&self) -> u16 {
        match *self {
            OfpAction::Output { .. } => OFPAT_OUTPUT,
            OfpAction::SetVlanVid(_) => OFPAT_SET_VLAN_VID,
            OfpAction::SetVlanPcp(_) => OFPAT_SET_VLAN_PCP,
            OfpAction::StripVlan => OFPAT_STRIP_VLAN,
            OfpAction::SetDlSrc(_) => OFPAT_SET_DL_SRC,
            OfpAction::SetDlDst(_) => OFPAT_SET_DL_DST,
            OfpAction::SetNwSrc(_) => OFPAT_SET_NW_SRC,
            OfpAction::SetNwDst(_) => OFPAT_SET_NW_DST,
            OfpAction::SetNwTos(_) => OFPAT_SET_NW_TOS,
            OfpAction::SetTpSrc(_) => OFPAT_SET_TP_SRC,
            OfpAction::SetTpDst(_) => OFPAT_SET_TP_DST,
            OfpAction::Resubmit(_) | OfpAction::SetTunnel(_) => OFPAT_VENDOR,
            OfpAction::Unknown { typ, .. } => typ,
        }
    }

    /// The action length on the wire
    pub fn len(&self) -> usize {
        match *self {
            OfpAction::SetDlSrc(_)
            | OfpAction::SetDlDst(_)
            | OfpAction::Resubmit(_)
            | OfpAction::SetTunnel(_) => 16,
            OfpAction::Unknown { len, .. } => len as usize,
            _ => 8,
        }
    }
}

/* ## --------------------------- ## */
/* ## OpenFlow Flow Modification. ## */
/* ## --------------------------- ## */

/// The command that is embedded in a flow mod message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfpFlowModCommand {
    /// New flow.
    Add = 0,
    /// Modify all matching flows.
    Modify = 1,
    /// Modify entry strictly matching wildcards.
    ModifyStrict = 2,
    /// Delete all matching flows.
    Delete = 3,
    /// Delete entry strictly matching wildcards and priority.
    DeleteStrict = 4,
}

/// Flow setup and teardown (controller -> datapath).
#[derive(Debug, Clone)]
pub struct OfpFlowMod {
    /// Fields to match.
    match_field: OfpMatch,
    /// Opaque controller-issued identifier.
    cookie: u64,
    /// One of OfpFlowModCommand. With the Nicira table id extension
    /// enabled, the upper byte carries the table to put the flow in.
    command: u16,
    /// Idle time before discarding (seconds).
    idle_timeout: u16,
    /// Max time before discarding (seconds).
    hard_timeout: u16,
    /// Priority level of flow entry.
    priority: u16,
    /// Buffered packet to apply to, or OFP_NO_BUFFER.
    /// Not meaningful for OfpFlowModCommand::Delete*.
    buffer_id: u32,
    /// For OfpFlowModCommand::Delete* commands, require
    /// matching entries to include this as an
    /// output port.  A value of OFPP_NONE
    /// indicates no restriction.
    out_port: u16,
    /// One of OFPFF_*.
    flags: u16,
    /// The action length is inferred from the length field in the header.
    actions: Vec<OfpAction>,
}

/* ## ------------------------ ## */
/* ## OpenFlow 1.0 statistics. ## */
/* ## ------------------------ ## */

/// The kind of statistics in a stats request or reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfpStatsType {
    /// Description of this OpenFlow switch.
    Desc = 0,
    /// Individual flow statistics.
    Flow = 1,
    /// Aggregate flow statistics.
    Aggregate = 2,
    /// Flow table statistics.
    Table = 3,
    /// Physical port statistics.
    Port = 4,
    /// Vendor extension.
    Vendor = 0xffff,
}

impl OfpStatsType {
    pub fn from_u16(typ: u16) -> Option<OfpStatsType> {
        let t = match typ {
            0 => OfpStatsType::Desc,
            1 => OfpStatsType::Flow,
            2 => OfpStatsType::Aggregate,
            3 => OfpStatsType::Table,
            4 => OfpStatsType::Port,
            0xffff => OfpStatsType::Vendor,
            _ => return None,
        };
        Some(t)
    }
}

/// More replies to follow.
pub const OFPSF_REPLY_MORE: u16 = 1 << 0;

/// Length of the type and flags that start every stats request and reply body
pub const OFP_STATS_HEADER_LEN: usize = 4;

/// Body of a flow or aggregate stats request
#[derive(Debug, Clone, PartialEq)]
pub struct OfpFlowStatsRequest {
    /// Fields to match.
    pub match_field: OfpMatch,
    /// ID of table to read (from ofp_table_stats), 0xff for all tables.
    pub table_id: u8,
    /// Require matching entries to include this as an output port.
    /// A value of OFPP_NONE indicates no restriction.
    pub out_port: u16,
}

/// A statistics request (controller -> switch)
#[derive(Debug, Clone, PartialEq)]
pub enum OfpStatsRequest {
    Desc,
    Flow(OfpFlowStatsRequest),
    Aggregate(OfpFlowStatsRequest),
    Table,
    /// Port statistics for one port, or all ports with OFPP_NONE
    Port(u16),
}

impl OfpStatsRequest {
    pub fn stats_type(&self) -> OfpStatsType {
        match *self {
            OfpStatsRequest::Desc => OfpStatsType::Desc,
            OfpStatsRequest::Flow(_) => OfpStatsType::Flow,
            OfpStatsRequest::Aggregate(_) => OfpStatsType::Aggregate,
            OfpStatsRequest::Table => OfpStatsType::Table,
            OfpStatsRequest::Port(_) => OfpStatsType::Port,
        }
    }
}

/// A statistics reply (switch -> controller).
/// The body is decoded on demand according to the stats type.
#[derive(Debug, PartialEq)]
pub struct OfpStatsReply {
    typ: u16,
    flags: u16,
    body: Vec<u8>,
}

impl OfpStatsReply {
    /// Gets the raw stats type
    pub fn typ(&self) -> u16 {
        self.typ
    }
    pub fn flags(&self) -> u16 {
        self.flags
    }
    /// Checks for the "more replies follow" flag
    pub fn more(&self) -> bool {
        self.flags & OFPSF_REPLY_MORE != 0
    }
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

pub const DESC_STR_LEN: usize = 256;
pub const SERIAL_NUM_LEN: usize = 32;

/// Body of reply to an OfpStatsType::Desc request.
/// Each entry is a null-terminated ASCII string.
#[derive(Debug, PartialEq)]
pub struct OfpDescStats {
    /// Manufacturer description.
    pub mfr_desc: String,
    /// Hardware description.
    pub hw_desc: String,
    /// Software description.
    pub sw_desc: String,
    /// Serial number.
    pub serial_num: String,
    /// Human readable description of datapath.
    pub dp_desc: String,
}

/// One entry of the body of reply to an OfpStatsType::Flow request.
#[derive(Debug, Clone, PartialEq)]
pub struct OfpFlowStats {
    /// ID of table flow came from.
    pub table_id: u8,
    /// Description of fields.
    pub match_field: OfpMatch,
    /// Time flow has been alive in seconds.
    pub duration_sec: u32,
    /// Time flow has been alive in nanoseconds beyond duration_sec.
    pub duration_nsec: u32,
    /// Priority of the entry. Only meaningful
    /// when this is not an exact-match entry.
    pub priority: u16,
    /// Number of seconds idle before expiration.
    pub idle_timeout: u16,
    /// Number of seconds before expiration.
    pub hard_timeout: u16,
    /// Opaque controller-issued identifier.
    pub cookie: u64,
    /// Number of packets in flow.
    pub packet_count: u64,
    /// Number of bytes in flow.
    pub byte_count: u64,
    pub actions: Vec<OfpAction>,
}

/// Body of reply to an OfpStatsType::Aggregate request.
#[derive(Debug, PartialEq)]
pub struct OfpAggregateStats {
    /// Number of packets in flows.
    pub packet_count: u64,
    /// Number of bytes in flows.
    pub byte_count: u64,
    /// Number of flows.
    pub flow_count: u32,
}

pub const OFP_MAX_TABLE_NAME_LEN: usize = 32;

/// One entry of the body of reply to an OfpStatsType::Table request.
#[derive(Debug, PartialEq)]
pub struct OfpTableStats {
    /// Identifier of table. Lower numbered tables are consulted first.
    pub table_id: u8,
    pub name: String,
    /// Bitmap of OFPFW_* wildcards that are supported by the table.
    pub wildcards: u32,
    /// Max number of entries supported.
    pub max_entries: u32,
    /// Number of active entries.
    pub active_count: u32,
    /// Number of packets looked up in table.
    pub lookup_count: u64,
    /// Number of packets that hit table.
    pub matched_count: u64,
}

/// One entry of the body of reply to an OfpStatsType::Port request.
/// If a counter is unsupported, it is set to all ones.
#[derive(Debug, PartialEq)]
pub struct OfpPortStats {
    pub port_no: u16,
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub rx_frame_err: u64,
    pub rx_over_err: u64,
    pub rx_crc_err: u64,
    pub collisions: u64,
}

/* ## ------------------------- ## */
/* ## Nicira vendor extensions. ## */
/* ## ------------------------- ## */

/// Nicira vendor message subtypes that carry one on/off switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NxtSubtype {
    /// Use the upper 32 bits of the flow cookie as the tunnel id.
    TunIdFromCookie = 9,
    /// Use the upper 8 bits of the flow mod command as the table id.
    FlowModTableId = 15,
}

/// A Nicira vendor message that turns an extension on or off
#[derive(Debug, Clone, PartialEq)]
pub struct NxtSetFlag {
    subtype: NxtSubtype,
    set: bool,
}

/* ## --------------- ## */
/* ## OpenFlow errors. ## */
/* ## --------------- ## */

/// Values for 'type' in `OfpErrorMsg`. These values are immutable: they will
/// not change in future versions of the protocol (although new values may be added).
#[derive(Debug)]
pub enum OfpErrorType {
    /// Hello protocol failed.
    HelloFailed = 0,
    /// Request was not understood.
    BadRequest = 1,
    /// Error in action description.
    BadAction = 2,
    /// Problem modifying flow entry.
    FlowModFailed = 3,
    /// Port mod request failed.
    PortModFailed = 4,
    /// Queue operation failed.
    QueueOpFailed = 5,
}

/// `OfpErrorMsg` 'code' values for `OfpErrorType::BadRequest`.
///
/// 'data' contains at least the first 64 bytes of the failed request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OfpBadRequestCode {
    /// ofp_header.version not supported.
    BadVersion = 0,
    /// ofp_header.type not supported.
    BadType = 1,
    /// ofp_stats_request.type not supported.
    BadStat = 2,
    /// Wrong request length for type.
    BadLen = 6,
}

/// Error message (datapath -> controller).
#[derive(Debug)]
pub struct OfpErrorMsg {
    typ: u16,
    code: u16,
    /// Variable-length data. Interpreted based on the type and code. No padding.
    data: Vec<u8>,
}

impl OfpErrorMsg {
    pub fn typ(&self) -> u16 {
        self.typ
    }
    pub fn code(&self) -> u16 {
        self.code
    }
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Display for OfpErrorMsg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let typ = match self.typ {
            0 => OfpErrorType::HelloFailed,
            1 => OfpErrorType::BadRequest,
            2 => OfpErrorType::BadAction,
            3 => OfpErrorType::FlowModFailed,
            4 => OfpErrorType::PortModFailed,
            5 => OfpErrorType::QueueOpFailed,
            _ => return write!(f, "OpenFlow Error: type({}), code({})", self.typ, self.code),
        };
        write!(f, "OpenFlow Error: {:?}, code({})", typ, self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_bits_round_trip() {
        for bits in &[0, OFPFW_ALL, OVSFW_ALL, OFPFW_NW_SRC_ALL | OFPFW_TP_DST, 8 << 14] {
            assert_eq!(*bits, Wildcards::from_bits(*bits).bits());
        }
    }

    #[test]
    fn all_wildcards() {
        let testee = Wildcards::all();
        assert!(testee.in_port && testee.nw_tos && !testee.tun_id);
        assert_eq!(63, testee.nw_src_bits);
        assert_eq!(OFPFW_ALL, testee.bits());
    }

    #[test]
    fn address_masks() {
        assert_eq!(0xffff_ffff, nw_bits_to_mask(0));
        assert_eq!(0xff00_0000, nw_bits_to_mask(24));
        assert_eq!(0, nw_bits_to_mask(32));
        assert_eq!(0, nw_bits_to_mask(63));
    }

    #[test]
    fn normalize_unknown_frame_type() {
        let mut testee = OfpMatch::new();
        testee.nw_src = 0x0a00_0001;
        testee.tp_dst = 80;
        testee.normalize();
        assert_eq!(OfpMatch::new(), testee);
    }

    #[test]
    fn normalize_ip_masks_addresses() {
        let mut testee = OfpMatch::new();
        testee.wildcards.dl_type = false;
        testee.dl_type = ETH_TYPE_IP;
        testee.wildcards.nw_src_bits = 8;
        testee.nw_src = 0x0a01_0203;
        testee.wildcards.nw_tos = false;
        testee.nw_tos = 0xff;
        testee.normalize();
        assert_eq!(0x0a01_0200, testee.nw_src);
        assert_eq!(0xfc, testee.nw_tos);
        assert!(testee.wildcards.tp_src);
    }

    #[test]
    fn normalize_ip_other_protocol_exact_matches_ports() {
        let mut testee = OfpMatch::new();
        testee.wildcards.dl_type = false;
        testee.dl_type = ETH_TYPE_IP;
        testee.wildcards.nw_proto = false;
        testee.nw_proto = 47;
        testee.tp_src = 5;
        testee.normalize();
        assert!(!testee.wildcards.tp_src && !testee.wildcards.tp_dst);
        assert_eq!(0, testee.tp_src);
    }

    #[test]
    fn normalize_non_ip_exact_matches_network() {
        let mut testee = OfpMatch::new();
        testee.wildcards.dl_type = false;
        testee.dl_type = 0x88cc;
        testee.normalize();
        assert_eq!(0, testee.wildcards.nw_src_bits);
        assert!(!testee.wildcards.nw_proto && !testee.wildcards.tp_dst);
    }

    #[test]
    fn normalized_tcp_is_stable() {
        let mut testee = OfpMatch::new();
        testee.wildcards.dl_type = false;
        testee.dl_type = ETH_TYPE_IP;
        testee.wildcards.nw_proto = false;
        testee.nw_proto = 6;
        testee.wildcards.tp_dst = false;
        testee.tp_dst = 22;
        assert_eq!(testee, testee.normalized());
    }

    #[test]
    fn error_display() {
        let testee = OfpErrorMsg {
            typ: 3,
            code: 0,
            data: vec![],
        };
        assert_eq!("OpenFlow Error: FlowModFailed, code(0)", testee.to_string());
    }

    #[test]
    fn port_name() {
        assert_eq!("eth0", c_string(b"eth0\0\0\0\0"));
        assert_eq!("abc", c_string(b"abc"));
    }
}
