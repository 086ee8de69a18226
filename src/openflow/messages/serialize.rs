/*!
All serialization and construction routines for the OpenFlow message primitives

Use the trait `OfpPacket` for serialization implementations of messages
that are sent. Other primitives that are part of a message should
implement a serialize funtion that operates on a given byte stream.
*/

use crate::datapath::ActionSlot;
use crate::openflow::gen_xid;
use crate::openflow::messages::*;

use byteorder::{ByteOrder, NetworkEndian, WriteBytesExt};

use std::io;
use std::io::Write;

impl OfpHeader {
    /// Constructs an `OfpHeader`
    pub fn new(typ: OfpType, xid: u32) -> OfpHeader {
        OfpHeader {
            version: OFP_VERSION,
            typ: typ as u8,
            length: OfpHeader::header_length() as u16,
            xid,
        }
    }

    /// Returns the fixed header length of 8 (in byte)
    pub fn header_length() -> usize {
        8
    }

    /// A header-only request of the given type with a fresh transaction id
    pub fn request(typ: OfpType) -> Vec<u8> {
        OfpHeader::new(typ, gen_xid()).to_bytes().to_vec()
    }

    pub fn to_bytes(&self) -> [u8; 8] {
        let mut buf = [0; 8];
        buf[0] = self.version;
        buf[1] = self.typ;
        NetworkEndian::write_u16(&mut buf[2..4], self.length);
        NetworkEndian::write_u32(&mut buf[4..], self.xid);
        buf
    }

    /// Serializes this header on the given stream
    pub fn serialize<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        stream.write_all(&self.to_bytes())
    }
}

/// Overwrites the length field of a complete message with the buffer's length.
pub fn update_length(msg: &mut [u8]) {
    if msg.len() >= 4 {
        let len = msg.len().min(0xffff) as u16;
        NetworkEndian::write_u16(&mut msg[2..4], len);
    }
}

impl OfpMatch {
    pub fn serialize<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        stream.write_u32::<NetworkEndian>(self.wildcards.bits())?;
        stream.write_u16::<NetworkEndian>(self.in_port)?;
        stream.write_all(&self.dl_src)?;
        stream.write_all(&self.dl_dst)?;
        stream.write_u16::<NetworkEndian>(self.dl_vlan)?;
        stream.write_all(&[self.dl_vlan_pcp, 0])?;
        stream.write_u16::<NetworkEndian>(self.dl_type)?;
        stream.write_all(&[self.nw_tos, self.nw_proto, 0, 0])?;
        stream.write_u32::<NetworkEndian>(self.nw_src)?;
        stream.write_u32::<NetworkEndian>(self.nw_dst)?;
        stream.write_u16::<NetworkEndian>(self.tp_src)?;
        stream.write_u16::<NetworkEndian>(self.tp_dst)
    }
}

impl ActionSlot for OfpAction {
    const SLOT_LEN: usize = 8;
}

impl OfpAction {
    pub fn serialize<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        stream.write_u16::<NetworkEndian>(self.typ())?;
        stream.write_u16::<NetworkEndian>(self.len() as u16)?;
        match *self {
            OfpAction::Output { port, max_len } => {
                stream.write_u16::<NetworkEndian>(port)?;
                stream.write_u16::<NetworkEndian>(max_len)
            }
            OfpAction::SetVlanVid(vid) => {
                stream.write_u16::<NetworkEndian>(vid)?;
                stream.write_all(&[0; 2])
            }
            OfpAction::SetVlanPcp(pcp) => stream.write_all(&[pcp, 0, 0, 0]),
            OfpAction::StripVlan => stream.write_all(&[0; 4]),
            OfpAction::SetDlSrc(ref addr) | OfpAction::SetDlDst(ref addr) => {
                stream.write_all(addr)?;
                stream.write_all(&[0; 6])
            }
            OfpAction::SetNwSrc(ip) | OfpAction::SetNwDst(ip) => {
                stream.write_u32::<NetworkEndian>(ip)
            }
            OfpAction::SetNwTos(tos) => stream.write_all(&[tos, 0, 0, 0]),
            OfpAction::SetTpSrc(port) | OfpAction::SetTpDst(port) => {
                stream.write_u16::<NetworkEndian>(port)?;
                stream.write_all(&[0; 2])
            }
            OfpAction::Resubmit(in_port) => {
                stream.write_u32::<NetworkEndian>(NX_VENDOR_ID)?;
                stream.write_u16::<NetworkEndian>(NXAST_RESUBMIT)?;
                stream.write_u16::<NetworkEndian>(in_port)?;
                stream.write_all(&[0; 4])
            }
            OfpAction::SetTunnel(tun_id) => {
                stream.write_u32::<NetworkEndian>(NX_VENDOR_ID)?;
                stream.write_u16::<NetworkEndian>(NXAST_SET_TUNNEL)?;
                stream.write_all(&[0; 2])?;
                stream.write_u32::<NetworkEndian>(tun_id)
            }
            OfpAction::Unknown { len, .. } => {
                stream.write_all(&vec![0; (len as usize).saturating_sub(4)])
            }
        }
    }
}

impl OfpFlowMod {
    /// Constructs an `OfpFlowMod` with the given fields.
    /// A `table_id` of 0xff leaves the choice of table to the switch,
    /// any other value needs the Nicira table id extension enabled.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        command: OfpFlowModCommand,
        table_id: u8,
        match_field: OfpMatch,
        cookie: u64,
        idle_timeout: u16,
        hard_timeout: u16,
        priority: u16,
        out_port: u16,
        actions: Vec<OfpAction>,
    ) -> OfpFlowMod {
        let mut command = command as u16;
        if table_id != 0xff {
            command |= u16::from(table_id) << 8;
        }
        OfpFlowMod {
            match_field,
            cookie,
            command,
            idle_timeout,
            hard_timeout,
            priority,
            buffer_id: OFP_NO_BUFFER,
            out_port,
            flags: 0,
            actions,
        }
    }
}

/// An OpenFlow packet. Must be implemented for all OpenFlow messsages that are sent.
pub trait OfpPacket {
    /// Constructs an OfpHeader with the given body length and transaction ID
    fn header(&self, body_length: usize, xid: u32) -> OfpHeader {
        OfpHeader {
            version: OFP_VERSION,
            typ: Self::typ() as u8,
            length: (OfpHeader::header_length() + body_length) as u16,
            xid,
        }
    }

    /// Returns the packet's type
    fn typ() -> OfpType;

    /// Serializes this packet with network byte order.
    /// The xid is used as its header's transaction id.
    fn serialize<S: Write>(&self, stream: &mut S, xid: u32) -> io::Result<()> {
        let mut body = vec![];
        self.serialize_body(&mut body)?;
        let header = self.header(body.len(), xid);
        debug!("Outgoing message: {:?}", header);
        header.serialize(stream)?;
        stream.write_all(&body)
    }

    /// Serializes this packet into a new buffer with a fresh transaction id
    fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buf = vec![];
        self.serialize(&mut buf, gen_xid())?;
        Ok(buf)
    }

    /// Serializes this packet's body.
    /// Implementers have to output network byte order on the given stream.
    fn serialize_body<S: Write>(&self, stream: &mut S) -> io::Result<()>;
}

impl OfpEchoRequest {
    /// Constructs a new `OfpEchoRequest` with `arbitrary` content.
    pub fn new(arbitrary: Vec<u8>) -> OfpEchoRequest {
        OfpEchoRequest { arbitrary }
    }
}
impl OfpPacket for OfpEchoRequest {
    fn typ() -> OfpType {
        OfpType::EchoRequest
    }

    fn serialize_body<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        stream.write_all(&self.arbitrary)
    }
}

impl OfpPacket for OfpFlowMod {
    fn typ() -> OfpType {
        OfpType::FlowMod
    }

    fn serialize_body<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        self.match_field.serialize(stream)?;
        stream.write_u64::<NetworkEndian>(self.cookie)?;
        stream.write_u16::<NetworkEndian>(self.command)?;
        stream.write_u16::<NetworkEndian>(self.idle_timeout)?;
        stream.write_u16::<NetworkEndian>(self.hard_timeout)?;
        stream.write_u16::<NetworkEndian>(self.priority)?;
        stream.write_u32::<NetworkEndian>(self.buffer_id)?;
        stream.write_u16::<NetworkEndian>(self.out_port)?;
        stream.write_u16::<NetworkEndian>(self.flags)?;
        for action in &self.actions {
            action.serialize(stream)?;
        }
        Ok(())
    }
}

impl OfpFlowStatsRequest {
    fn serialize<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        self.match_field.serialize(stream)?;
        stream.write_all(&[self.table_id, 0])?;
        stream.write_u16::<NetworkEndian>(self.out_port)
    }
}

impl OfpPacket for OfpStatsRequest {
    fn typ() -> OfpType {
        OfpType::StatsRequest
    }

    fn serialize_body<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        stream.write_u16::<NetworkEndian>(self.stats_type() as u16)?;
        stream.write_u16::<NetworkEndian>(0)?;
        match *self {
            OfpStatsRequest::Desc | OfpStatsRequest::Table => Ok(()),
            OfpStatsRequest::Flow(ref req) | OfpStatsRequest::Aggregate(ref req) => {
                req.serialize(stream)
            }
            OfpStatsRequest::Port(port_no) => {
                stream.write_u16::<NetworkEndian>(port_no)?;
                stream.write_all(&[0; 6])
            }
        }
    }
}

impl NxtSetFlag {
    pub fn new(subtype: NxtSubtype, set: bool) -> NxtSetFlag {
        NxtSetFlag { subtype, set }
    }
}
impl OfpPacket for NxtSetFlag {
    fn typ() -> OfpType {
        OfpType::Vendor
    }

    fn serialize_body<S: Write>(&self, stream: &mut S) -> io::Result<()> {
        stream.write_u32::<NetworkEndian>(NX_VENDOR_ID)?;
        stream.write_u32::<NetworkEndian>(self.subtype as u32)?;
        stream.write_u8(self.set as u8)?;
        stream.write_all(&[0; 7])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_request_header() {
        let xid = 42;
        let expected = OfpHeader {
            version: 1,
            typ: 2,
            length: 8,
            xid,
        };
        let testee = OfpEchoRequest::new(vec![]);
        assert_eq!(expected, testee.header(0, xid));
    }

    #[test]
    fn echo_request_body_serialization() {
        let testee = OfpEchoRequest::new(vec![1, 2, 3, 4]);
        let mut ser = vec![];
        testee.serialize_body(&mut ser).unwrap();
        assert_eq!(vec![1, 2, 3, 4], ser);
        assert_eq!(12, testee.header(ser.len(), 1).length);
    }

    #[test]
    fn header_request() {
        let testee = OfpHeader::request(OfpType::FeaturesRequest);
        assert_eq!(vec![1, 5, 0, 8], testee[..4].to_vec());
    }

    #[test]
    fn length_patch() {
        let mut testee = vec![1, 2, 0, 0, 0, 0, 0, 0, 9, 9];
        update_length(&mut testee);
        assert_eq!([0, 10], testee[2..4]);
    }

    #[test]
    fn match_serialization() {
        let mut testee = OfpMatch::new();
        testee.in_port = 0x0102;
        testee.nw_src = 0x0a00_0001;
        testee.tp_dst = 80;
        let mut ser = vec![];
        testee.serialize(&mut ser).unwrap();
        assert_eq!(40, ser.len());
        assert_eq!([0x00, 0x3f, 0xff, 0xff], ser[0..4]);
        assert_eq!([0x01, 0x02], ser[4..6]);
        assert_eq!([0x0a, 0, 0, 1], ser[28..32]);
        assert_eq!([0, 80], ser[38..40]);
    }

    #[test]
    fn action_output_serialization() {
        let testee = OfpAction::Output {
            port: 0xfffd,
            max_len: 0xffff,
        };
        let mut ser = vec![];
        testee.serialize(&mut ser).unwrap();
        assert_eq!(vec![0, 0, 0, 8, 0xff, 0xfd, 0xff, 0xff], ser);
    }

    #[test]
    fn action_lengths_match_serialization() {
        let actions = [
            OfpAction::SetVlanVid(3),
            OfpAction::SetVlanPcp(1),
            OfpAction::StripVlan,
            OfpAction::SetDlSrc([1; 6]),
            OfpAction::SetNwDst(7),
            OfpAction::SetNwTos(8),
            OfpAction::SetTpSrc(9),
            OfpAction::Resubmit(1),
            OfpAction::SetTunnel(0x1234),
        ];
        for action in &actions {
            let mut ser = vec![];
            action.serialize(&mut ser).unwrap();
            assert_eq!(action.len(), ser.len());
        }
    }

    #[test]
    fn nicira_action_serialization() {
        let mut ser = vec![];
        OfpAction::SetTunnel(0x1234).serialize(&mut ser).unwrap();
        assert_eq!(
            vec![0xff, 0xff, 0, 16, 0, 0, 0x23, 0x20, 0, 2, 0, 0, 0, 0, 0x12, 0x34],
            ser
        );
    }

    #[test]
    fn flow_mod_with_table() {
        let testee = OfpFlowMod::new(
            OfpFlowModCommand::Add,
            3,
            OfpMatch::new(),
            0,
            60,
            0,
            OFP_DEFAULT_PRIORITY,
            OFPP_NONE,
            vec![OfpAction::Output { port: 1, max_len: 0 }],
        );
        assert_eq!(0x0300, testee.command);
        let mut ser = vec![];
        testee.serialize(&mut ser, 7).unwrap();
        assert_eq!(72 + 8, ser.len());
        assert_eq!([0, 80], ser[2..4]);
        assert_eq!([0x03, 0x00], ser[56..58]);
        assert_eq!([0xff, 0xff, 0xff, 0xff], ser[64..68]);
    }

    #[test]
    fn port_stats_request() {
        let mut ser = vec![];
        OfpStatsRequest::Port(OFPP_NONE)
            .serialize(&mut ser, 1)
            .unwrap();
        assert_eq!(
            vec![1, 16, 0, 20, 0, 0, 0, 1, 0, 4, 0, 0, 0xff, 0xff, 0, 0, 0, 0, 0, 0],
            ser
        );
    }

    #[test]
    fn nicira_flag() {
        let mut ser = vec![];
        NxtSetFlag::new(NxtSubtype::FlowModTableId, true)
            .serialize(&mut ser, 1)
            .unwrap();
        assert_eq!(24, ser.len());
        assert_eq!(4, ser[1]);
        assert_eq!([0, 0, 0, 15, 1], ser[12..17]);
    }
}
