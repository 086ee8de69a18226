/*!
The datapath flow protocol: the fixed-layout records the userspace side
exchanges with the forwarding fast path.

Every record is serialized field by field in network byte order.
*/

pub mod actions;
pub mod format;
pub mod key;

pub use self::actions::{ActionList, ActionSlot, DpAction};
pub use self::key::FlowKey;

use byteorder::{ByteOrder, NetworkEndian};

use std::convert::TryFrom;

/// Action lists have to fit into one memory page.
pub const PAGE_SIZE: usize = 4096;

/// Per-flow counters as maintained by the datapath
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowStats {
    /// Number of matched packets.
    pub n_packets: u64,
    /// Number of matched bytes.
    pub n_bytes: u64,
    /// Time last used, zero for never.
    pub used_sec: u64,
    pub used_nsec: u32,
    /// Union of the TCP flags seen.
    pub tcp_flags: u8,
    /// The last IP ToS seen.
    pub ip_tos: u8,
    /// Only meaningful in a flow query response.
    pub error: u16,
}

impl FlowStats {
    /// Length of the wire image in byte
    pub const LEN: usize = 32;

    pub fn to_bytes(&self) -> [u8; FlowStats::LEN] {
        let mut buf = [0; FlowStats::LEN];
        NetworkEndian::write_u64(&mut buf[0..8], self.n_packets);
        NetworkEndian::write_u64(&mut buf[8..16], self.n_bytes);
        NetworkEndian::write_u64(&mut buf[16..24], self.used_sec);
        NetworkEndian::write_u32(&mut buf[24..28], self.used_nsec);
        buf[28] = self.tcp_flags;
        buf[29] = self.ip_tos;
        NetworkEndian::write_u16(&mut buf[30..], self.error);
        buf
    }

    pub fn from_bytes(bytes: &[u8; FlowStats::LEN]) -> FlowStats {
        FlowStats {
            n_packets: NetworkEndian::read_u64(&bytes[0..8]),
            n_bytes: NetworkEndian::read_u64(&bytes[8..16]),
            used_sec: NetworkEndian::read_u64(&bytes[16..24]),
            used_nsec: NetworkEndian::read_u32(&bytes[24..28]),
            tcp_flags: bytes[28],
            ip_tos: bytes[29],
            error: NetworkEndian::read_u16(&bytes[30..]),
        }
    }

    /// The last-used time in milliseconds, `None` if the flow was never hit
    /// or the time is beyond what milliseconds in an `i64` can hold.
    pub fn used_msec(&self) -> Option<i64> {
        if self.used_sec == 0 {
            return None;
        }
        let sec = i64::try_from(self.used_sec).ok()?;
        sec.checked_mul(1000)?
            .checked_add(i64::from(self.used_nsec / 1_000_000))
    }
}

/// One datapath flow: its key, counters and actions
#[derive(Debug, Clone)]
pub struct DpFlow {
    pub stats: FlowStats,
    pub key: FlowKey,
    pub actions: ActionList<DpAction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_wire_image() {
        let testee = FlowStats {
            n_packets: 1,
            n_bytes: 0x0102,
            used_sec: 3,
            used_nsec: 4,
            tcp_flags: 0x12,
            ip_tos: 0x20,
            error: 0,
        };
        let bytes = testee.to_bytes();
        assert_eq!(1, bytes[7]);
        assert_eq!([0x01, 0x02], [bytes[14], bytes[15]]);
        assert_eq!(0x12, bytes[28]);
        assert_eq!(testee, FlowStats::from_bytes(&bytes));
    }

    #[test]
    fn used_msec() {
        let mut testee = FlowStats::default();
        assert_eq!(None, testee.used_msec());
        testee.used_sec = 2;
        testee.used_nsec = 500_000_000;
        assert_eq!(Some(2500), testee.used_msec());
        testee.used_sec = 1 << 56;
        assert_eq!(None, testee.used_msec());
    }
}
