/*!
Datapath actions and the page-bounded list that carries them.
*/

use crate::datapath::PAGE_SIZE;
use crate::openflow::messages::{OfpAction, OFPP_CONTROLLER, OFPP_LOCAL, OFPP_MAX};
use crate::packets::{EthAddr, VLAN_PCP_MASK, VLAN_PCP_SHIFT, VLAN_VID_MASK};

use byteorder::{ByteOrder, NetworkEndian};

use std::slice;

/// An action kind that can be stored in an `ActionList`
pub trait ActionSlot: Clone {
    /// The number of bytes one action takes in a page-bounded list
    const SLOT_LEN: usize;
}

/// An append-only list of actions that never grows beyond one page.
///
/// Appending to a full list does not fail. The list switches to an
/// overflowed state instead and the new action overwrites the last slot.
/// Callers have to check `is_overflowed` before trusting the contents.
#[derive(Debug, Clone)]
pub struct ActionList<A> {
    slots: Vec<A>,
    n_actions: usize,
    overflows: u64,
}

impl<A: ActionSlot> ActionList<A> {
    pub fn new() -> ActionList<A> {
        ActionList {
            slots: Vec::with_capacity(Self::capacity()),
            n_actions: 0,
            overflows: 0,
        }
    }

    /// The maximum number of actions that fit into one page
    pub fn capacity() -> usize {
        PAGE_SIZE / A::SLOT_LEN
    }

    /// Appends `action` and returns a reference to the slot it landed in.
    pub fn add(&mut self, action: A) -> &mut A {
        let cap = Self::capacity();
        if self.n_actions < cap {
            self.slots.push(action);
            self.n_actions += 1;
            let last = self.slots.len() - 1;
            &mut self.slots[last]
        }
        else {
            self.overflows += 1;
            debug!("action list overflow, {} actions fit in one page", cap);
            self.n_actions = cap + 1;
            self.slots[cap - 1] = action;
            &mut self.slots[cap - 1]
        }
    }

    /// True iff more actions were added than fit.
    /// A list that is exactly full is not overflowed.
    pub fn is_overflowed(&self) -> bool {
        self.n_actions > Self::capacity()
    }

    /// The number of added actions, `capacity() + 1` once overflowed
    pub fn len(&self) -> usize {
        self.n_actions
    }

    pub fn is_empty(&self) -> bool {
        self.n_actions == 0
    }

    /// How often an append hit the overflow path
    pub fn overflow_count(&self) -> u64 {
        self.overflows
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.n_actions = 0;
        self.overflows = 0;
    }

    pub fn as_slice(&self) -> &[A] {
        &self.slots
    }

    pub fn iter(&self) -> slice::Iter<A> {
        self.slots.iter()
    }
}

impl<A: ActionSlot> Default for ActionList<A> {
    fn default() -> Self {
        ActionList::new()
    }
}

impl<'a, A: ActionSlot> IntoIterator for &'a ActionList<A> {
    type Item = &'a A;
    type IntoIter = slice::Iter<'a, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Output to switch port.
pub const ODPAT_OUTPUT: u16 = 0;
/// Output to all ports in group.
pub const ODPAT_OUTPUT_GROUP: u16 = 1;
/// Send copy to controller.
pub const ODPAT_CONTROLLER: u16 = 2;
/// Set the 802.1q VLAN VID and/or PCP.
pub const ODPAT_SET_DL_TCI: u16 = 3;
/// Strip the 802.1q header.
pub const ODPAT_STRIP_VLAN: u16 = 5;
/// Ethernet source address.
pub const ODPAT_SET_DL_SRC: u16 = 6;
/// Ethernet destination address.
pub const ODPAT_SET_DL_DST: u16 = 7;
/// IP source address.
pub const ODPAT_SET_NW_SRC: u16 = 8;
/// IP destination address.
pub const ODPAT_SET_NW_DST: u16 = 9;
/// IP ToS/DSCP field (6 bits).
pub const ODPAT_SET_NW_TOS: u16 = 10;
/// TCP/UDP source port.
pub const ODPAT_SET_TP_SRC: u16 = 11;
/// TCP/UDP destination port.
pub const ODPAT_SET_TP_DST: u16 = 12;

/// Length of one datapath action in byte
pub const ODP_ACTION_LEN: usize = 8;

/// One datapath action. Each variant occupies one 8-byte slot
/// that starts with the 16-bit action type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DpAction {
    Output { port: u16 },
    OutputGroup { group: u16 },
    /// `arg` is echoed back with the packet sent to userspace.
    Controller { arg: u32 },
    /// Bits of `tci` outside of `mask` must be zero.
    SetDlTci { tci: u16, mask: u16 },
    StripVlan,
    SetDlSrc(EthAddr),
    SetDlDst(EthAddr),
    SetNwSrc(u32),
    SetNwDst(u32),
    SetNwTos(u8),
    SetTpSrc(u16),
    SetTpDst(u16),
    /// An action type this side does not know. The slot is kept as is.
    Unknown { typ: u16, raw: [u8; ODP_ACTION_LEN] },
}

impl ActionSlot for DpAction {
    const SLOT_LEN: usize = ODP_ACTION_LEN;
}

impl DpAction {
    /// The action type on the wire
    pub fn typ(&self) -> u16 {
        match *self {
            DpAction::Output { .. } => ODPAT_OUTPUT,
            DpAction::OutputGroup { .. } => ODPAT_OUTPUT_GROUP,
            DpAction::Controller { .. } => ODPAT_CONTROLLER,
            DpAction::SetDlTci { .. } => ODPAT_SET_DL_TCI,
            DpAction::StripVlan => ODPAT_STRIP_VLAN,
            DpAction::SetDlSrc(_) => ODPAT_SET_DL_SRC,
            DpAction::SetDlDst(_) => ODPAT_SET_DL_DST,
            DpAction::SetNwSrc(_) => ODPAT_SET_NW_SRC,
            DpAction::SetNwDst(_) => ODPAT_SET_NW_DST,
            DpAction::SetNwTos(_) => ODPAT_SET_NW_TOS,
            DpAction::SetTpSrc(_) => ODPAT_SET_TP_SRC,
            DpAction::SetTpDst(_) => ODPAT_SET_TP_DST,
            DpAction::Unknown { typ, .. } => typ,
        }
    }

    pub fn to_bytes(&self) -> [u8; ODP_ACTION_LEN] {
        if let DpAction::Unknown { raw, .. } = *self {
            return raw;
        }
        let mut buf = [0; ODP_ACTION_LEN];
        NetworkEndian::write_u16(&mut buf[0..2], self.typ());
        match *self {
            DpAction::Output { port } => NetworkEndian::write_u16(&mut buf[2..4], port),
            DpAction::OutputGroup { group } => NetworkEndian::write_u16(&mut buf[2..4], group),
            DpAction::Controller { arg } => NetworkEndian::write_u32(&mut buf[4..8], arg),
            DpAction::SetDlTci { tci, mask } => {
                NetworkEndian::write_u16(&mut buf[2..4], tci);
                NetworkEndian::write_u16(&mut buf[4..6], mask);
            }
            DpAction::SetDlSrc(addr) | DpAction::SetDlDst(addr) => {
                buf[2..8].copy_from_slice(&addr)
            }
            DpAction::SetNwSrc(ip) | DpAction::SetNwDst(ip) => {
                NetworkEndian::write_u32(&mut buf[4..8], ip)
            }
            DpAction::SetNwTos(tos) => buf[2] = tos,
            DpAction::SetTpSrc(port) | DpAction::SetTpDst(port) => {
                NetworkEndian::write_u16(&mut buf[2..4], port)
            }
            DpAction::StripVlan | DpAction::Unknown { .. } => {}
        }
        buf
    }

    pub fn from_bytes(bytes: &[u8; ODP_ACTION_LEN]) -> DpAction {
        let typ = NetworkEndian::read_u16(&bytes[0..2]);
        let u16_at_2 = NetworkEndian::read_u16(&bytes[2..4]);
        let u32_at_4 = NetworkEndian::read_u32(&bytes[4..8]);
        let mut addr = [0; 6];
        addr.copy_from_slice(&bytes[2..8]);
        match typ {
            ODPAT_OUTPUT => DpAction::Output { port: u16_at_2 },
            ODPAT_OUTPUT_GROUP => DpAction::OutputGroup { group: u16_at_2 },
            ODPAT_CONTROLLER => DpAction::Controller { arg: u32_at_4 },
            ODPAT_SET_DL_TCI => DpAction::SetDlTci {
                tci: u16_at_2,
                mask: NetworkEndian::read_u16(&bytes[4..6]),
            },
            ODPAT_STRIP_VLAN => DpAction::StripVlan,
            ODPAT_SET_DL_SRC => DpAction::SetDlSrc(addr),
            ODPAT_SET_DL_DST => DpAction::SetDlDst(addr),
            ODPAT_SET_NW_SRC => DpAction::SetNwSrc(u32_at_4),
            ODPAT_SET_NW_DST => DpAction::SetNwDst(u32_at_4),
            ODPAT_SET_NW_TOS => DpAction::SetNwTos(bytes[2]),
            ODPAT_SET_TP_SRC => DpAction::SetTpSrc(u16_at_2),
            ODPAT_SET_TP_DST => DpAction::SetTpDst(u16_at_2),
            _ => DpAction::Unknown { typ, raw: *bytes },
        }
    }

    /// Translates an OpenFlow action into the datapath action that has the
    /// same effect on a packet. Actions that need switch logic beyond the
    /// datapath (flooding, normal forwarding, resubmits) have no translation.
    pub fn from_ofp(action: &OfpAction) -> Option<DpAction> {
        let dp = match *action {
            OfpAction::Output { port, max_len } => match port {
                p if p < OFPP_MAX => DpAction::Output { port: p },
                OFPP_LOCAL => DpAction::Output { port: 0 },
                OFPP_CONTROLLER => DpAction::Controller {
                    arg: u32::from(max_len),
                },
                _ => return None,
            },
            OfpAction::SetVlanVid(vid) => DpAction::SetDlTci {
                tci: vid & VLAN_VID_MASK,
                mask: VLAN_VID_MASK,
            },
            OfpAction::SetVlanPcp(pcp) => DpAction::SetDlTci {
                tci: (u16::from(pcp) << VLAN_PCP_SHIFT) & VLAN_PCP_MASK,
                mask: VLAN_PCP_MASK,
            },
            OfpAction::StripVlan => DpAction::StripVlan,
            OfpAction::SetDlSrc(addr) => DpAction::SetDlSrc(addr),
            OfpAction::SetDlDst(addr) => DpAction::SetDlDst(addr),
            OfpAction::SetNwSrc(ip) => DpAction::SetNwSrc(ip),
            OfpAction::SetNwDst(ip) => DpAction::SetNwDst(ip),
            OfpAction::SetNwTos(tos) => DpAction::SetNwTos(tos),
            OfpAction::SetTpSrc(port) => DpAction::SetTpSrc(port),
            OfpAction::SetTpDst(port) => DpAction::SetTpDst(port),
            OfpAction::Resubmit(_) | OfpAction::SetTunnel(_) | OfpAction::Unknown { .. } => {
                return None
            }
        };
        Some(dp)
    }
}

/// Decodes consecutive 8-byte action slots. A trailing partial slot is ignored.
pub fn decode_actions(bytes: &[u8]) -> ActionList<DpAction> {
    let mut actions = ActionList::new();
    for chunk in bytes.chunks(ODP_ACTION_LEN) {
        if chunk.len() < ODP_ACTION_LEN {
            warn!("ignoring {} trailing bytes after datapath actions", chunk.len());
            break;
        }
        let mut slot = [0; ODP_ACTION_LEN];
        slot.copy_from_slice(chunk);
        actions.add(DpAction::from_bytes(&slot));
    }
    actions
}

pub fn encode_actions(actions: &ActionList<DpAction>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(actions.as_slice().len() * ODP_ACTION_LEN);
    for action in actions {
        buf.extend_from_slice(&action.to_bytes());
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_one_page() {
        assert_eq!(512, ActionList::<DpAction>::capacity());
    }

    #[test]
    fn exactly_full_is_not_overflowed() {
        let mut testee = ActionList::new();
        for port in 0..512 {
            testee.add(DpAction::Output { port });
        }
        assert_eq!(512, testee.len());
        assert!(!testee.is_overflowed());
        assert_eq!(0, testee.overflow_count());
    }

    #[test]
    fn overflow_lands_in_last_slot() {
        let mut testee = ActionList::new();
        for port in 0..512 {
            testee.add(DpAction::Output { port });
        }
        *testee.add(DpAction::StripVlan) = DpAction::SetNwTos(4);
        testee.add(DpAction::SetTpDst(80));
        assert!(testee.is_overflowed());
        assert_eq!(513, testee.len());
        assert_eq!(2, testee.overflow_count());
        assert_eq!(512, testee.as_slice().len());
        assert_eq!(Some(&DpAction::SetTpDst(80)), testee.iter().last());
        assert_eq!(Some(&DpAction::Output { port: 510 }), testee.as_slice().get(510));
    }

    #[test]
    fn clear_forgets_overflows() {
        let mut testee = ActionList::new();
        for port in 0..513 {
            testee.add(DpAction::Output { port });
        }
        assert_eq!(1, testee.overflow_count());
        testee.clear();
        assert!(testee.is_empty());
        assert!(!testee.is_overflowed());
        assert_eq!(0, testee.overflow_count());
    }

    #[test]
    fn add_returns_the_new_slot() {
        let mut testee = ActionList::new();
        *testee.add(DpAction::Output { port: 1 }) = DpAction::Output { port: 2 };
        assert_eq!(&[DpAction::Output { port: 2 }], testee.as_slice());
    }

    #[test]
    fn action_wire_images() {
        assert_eq!(
            [0, 0, 0, 3, 0, 0, 0, 0],
            DpAction::Output { port: 3 }.to_bytes()
        );
        assert_eq!(
            [0, 2, 0, 0, 0, 0, 0x12, 0x34],
            DpAction::Controller { arg: 0x1234 }.to_bytes()
        );
        assert_eq!(
            [0, 3, 0, 0x0a, 0x0f, 0xff, 0, 0],
            DpAction::SetDlTci {
                tci: 10,
                mask: 0x0fff
            }
            .to_bytes()
        );
        assert_eq!(
            [0, 6, 1, 2, 3, 4, 5, 6],
            DpAction::SetDlSrc([1, 2, 3, 4, 5, 6]).to_bytes()
        );
    }

    #[test]
    fn unknown_type_is_kept() {
        let raw = [0, 4, 9, 9, 9, 9, 9, 9];
        let testee = DpAction::from_bytes(&raw);
        assert_eq!(DpAction::Unknown { typ: 4, raw }, testee);
        assert_eq!(raw, testee.to_bytes());
    }

    #[test]
    fn decode_list() {
        let mut bytes = DpAction::StripVlan.to_bytes().to_vec();
        bytes.extend_from_slice(&DpAction::SetNwSrc(0x0a00_0001).to_bytes());
        bytes.extend_from_slice(&[0, 0, 0]);
        let testee = decode_actions(&bytes);
        assert_eq!(
            &[DpAction::StripVlan, DpAction::SetNwSrc(0x0a00_0001)],
            testee.as_slice()
        );
        assert_eq!(bytes[..16].to_vec(), encode_actions(&testee));
    }

    #[test]
    fn translate_openflow_actions() {
        let output = OfpAction::Output { port: 2, max_len: 0 };
        assert_eq!(Some(DpAction::Output { port: 2 }), DpAction::from_ofp(&output));
        let ctl = OfpAction::Output {
            port: OFPP_CONTROLLER,
            max_len: 128,
        };
        assert_eq!(Some(DpAction::Controller { arg: 128 }), DpAction::from_ofp(&ctl));
        assert_eq!(
            Some(DpAction::SetDlTci {
                tci: 0xa000,
                mask: 0xe000
            }),
            DpAction::from_ofp(&OfpAction::SetVlanPcp(5))
        );
        assert_eq!(None, DpAction::from_ofp(&OfpAction::Resubmit(1)));
    }
}
