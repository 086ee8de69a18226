/*!
Human-readable rendering of datapath keys, actions, stats and flows.

Nothing in here fails: malformed input is rendered as a marker token.
*/

use crate::datapath::actions::DpAction;
use crate::datapath::key::FlowKey;
use crate::datapath::{DpFlow, FlowStats};
use crate::openflow::messages::OFP_VLAN_NONE;
use crate::packets::{vlan_tci_to_pcp, vlan_tci_to_vid, Mac, VLAN_PCP_MASK, VLAN_VID_MASK};

use std::fmt;
use std::net::Ipv4Addr;

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (vlan, pcp) = if self.dl_tci != 0 {
            (vlan_tci_to_vid(self.dl_tci), vlan_tci_to_pcp(self.dl_tci))
        }
        else {
            (OFP_VLAN_NONE, 0)
        };
        write!(
            f,
            "in_port{:04x}:vlan{}:pcp{} mac{}->{} type{:04x} proto{} tos{} ip{}->{} port{}->{}",
            self.in_port,
            vlan,
            pcp,
            Mac(&self.dl_src),
            Mac(&self.dl_dst),
            self.dl_type,
            self.nw_proto,
            self.nw_tos,
            Ipv4Addr::from(self.nw_src),
            Ipv4Addr::from(self.nw_dst),
            self.tp_src,
            self.tp_dst
        )
    }
}

impl fmt::Display for DpAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            DpAction::Output { port } => write!(f, "{}", port),
            DpAction::OutputGroup { group } => write!(f, "g{}", group),
            DpAction::Controller { arg } => write!(f, "ctl({})", arg),
            DpAction::SetDlTci { tci, mask } => match mask {
                VLAN_VID_MASK => write!(f, "set_vlan({})", vlan_tci_to_vid(tci)),
                VLAN_PCP_MASK => write!(f, "set_vlan_pcp({})", vlan_tci_to_pcp(tci)),
                _ => write!(f, "set_tci({:04x},mask={:04x})", tci, mask),
            },
            DpAction::StripVlan => write!(f, "strip_vlan"),
            DpAction::SetDlSrc(ref addr) => write!(f, "set_dl_src({})", Mac(addr)),
            DpAction::SetDlDst(ref addr) => write!(f, "set_dl_dst({})", Mac(addr)),
            DpAction::SetNwSrc(ip) => write!(f, "set_nw_src({})", Ipv4Addr::from(ip)),
            DpAction::SetNwDst(ip) => write!(f, "set_nw_dst({})", Ipv4Addr::from(ip)),
            DpAction::SetNwTos(tos) => write!(f, "set_nw_tos({})", tos),
            DpAction::SetTpSrc(port) => write!(f, "set_tp_src({})", port),
            DpAction::SetTpDst(port) => write!(f, "set_tp_dst({})", port),
            DpAction::Unknown { typ, .. } => write!(f, "***bad action {}***", typ),
        }
    }
}

/// Joins the actions with commas. An empty list drops.
pub fn format_actions(actions: &[DpAction]) -> String {
    if actions.is_empty() {
        return "drop".to_owned();
    }
    let parts: Vec<String> = actions.iter().map(|a| a.to_string()).collect();
    parts.join(",")
}

/// `now_msec` is the current time on the clock the datapath stamps
/// `used_sec` with.
pub fn format_flow_stats(stats: &FlowStats, now_msec: i64) -> String {
    let used = if stats.used_sec == 0 {
        "never".to_owned()
    }
    else {
        match stats.used_msec().and_then(|used| now_msec.checked_sub(used)) {
            Some(ago) => format!("{:.3}s", ago as f64 / 1000.0),
            None => "***bad***".to_owned(),
        }
    };
    format!(
        "packets:{}, bytes:{}, used:{}",
        stats.n_packets, stats.n_bytes, used
    )
}

pub fn format_flow(flow: &DpFlow, now_msec: i64) -> String {
    format!(
        "{}, {}, actions:{}",
        flow.key,
        format_flow_stats(&flow.stats, now_msec),
        format_actions(flow.actions.as_slice())
    )
}
