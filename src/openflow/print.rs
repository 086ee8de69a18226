/*!
Human readable rendering of OpenFlow matches, actions and switch replies.

Nothing in here fails. Messages that cannot be decoded are rendered
with a diagnostic marker instead.
*/

use crate::openflow::error::Result;
use crate::openflow::messages::deserialize::Deserialize;
use crate::openflow::messages::*;
use crate::packets::{IpProtocol, Mac, ETH_TYPE_ARP, ETH_TYPE_IP};

use std::fmt::Write;
use std::net::Ipv4Addr;

/// Every raw field of the match, wildcarded or not
pub fn match_to_literal_string(m: &OfpMatch) -> String {
    format!(
        "wildcards={:#010x} in_port={:5} dl_src={} dl_dst={} dl_vlan={:5} dl_vlan_pcp={:3} \
         dl_type={:#06x} nw_tos={:#04x} nw_proto={:#04x} nw_src={:#010x} nw_dst={:#010x} \
         tp_src={:5} tp_dst={:5}",
        m.wildcards.bits(),
        m.in_port,
        Mac(&m.dl_src),
        Mac(&m.dl_dst),
        m.dl_vlan,
        m.dl_vlan_pcp,
        m.dl_type,
        m.nw_tos,
        m.nw_proto,
        m.nw_src,
        m.nw_dst,
        m.tp_src,
        m.tp_dst
    )
}

fn ip_netmask(fields: &mut Vec<String>, name: &str, ip: u32, bits: u8) {
    if bits >= 32 {
        return;
    }
    let ip = Ipv4Addr::from(ip);
    if bits > 0 {
        fields.push(format!("{}={}/{}", name, ip, 32 - bits));
    }
    else {
        fields.push(format!("{}={}", name, ip));
    }
}

/// The non-wildcarded fields in flow syntax, with a protocol shorthand
/// where one applies. A match of everything renders empty.
pub fn match_to_string(m: &OfpMatch) -> String {
    let wc = &m.wildcards;
    let mut fields = vec![];
    let mut skip_type = false;
    let mut skip_proto = false;

    if !wc.dl_type {
        skip_type = true;
        if m.dl_type == ETH_TYPE_IP {
            match IpProtocol::from_u8(m.nw_proto) {
                Some(proto) if !wc.nw_proto => {
                    skip_proto = true;
                    let name = match proto {
                        IpProtocol::Icmp => "icmp",
                        IpProtocol::Tcp => "tcp",
                        IpProtocol::Udp => "udp",
                    };
                    fields.push(name.to_owned());
                }
                _ => fields.push("ip".to_owned()),
            }
        }
        else if m.dl_type == ETH_TYPE_ARP {
            fields.push("arp".to_owned());
        }
        else {
            skip_type = false;
        }
    }
    if wc.tun_id {
        fields.push("tun_id_wild".to_owned());
    }
    if !wc.in_port {
        fields.push(format!("in_port={}", m.in_port));
    }
    if !wc.dl_vlan {
        fields.push(format!("dl_vlan={}", m.dl_vlan));
    }
    if !wc.dl_vlan_pcp {
        fields.push(format!("dl_vlan_pcp={}", m.dl_vlan_pcp));
    }
    if !wc.dl_src {
        fields.push(format!("dl_src={}", Mac(&m.dl_src)));
    }
    if !wc.dl_dst {
        fields.push(format!("dl_dst={}", Mac(&m.dl_dst)));
    }
    if !skip_type && !wc.dl_type {
        fields.push(format!("dl_type={:#06x}", m.dl_type));
    }
    ip_netmask(&mut fields, "nw_src", m.nw_src, wc.nw_src_bits);
    ip_netmask(&mut fields, "nw_dst", m.nw_dst, wc.nw_dst_bits);
    if !skip_proto && !wc.nw_proto {
        let name = if m.dl_type == ETH_TYPE_ARP { "opcode" } else { "nw_proto" };
        fields.push(format!("{}={}", name, m.nw_proto));
    }
    if !wc.nw_tos {
        fields.push(format!("nw_tos={}", m.nw_tos));
    }
    let (src, dst) = if m.nw_proto == IpProtocol::Icmp as u8 {
        ("icmp_type", "icmp_code")
    }
    else {
        ("tp_src", "tp_dst")
    };
    if !wc.tp_src {
        fields.push(format!("{}={}", src, m.tp_src));
    }
    if !wc.tp_dst {
        fields.push(format!("{}={}", dst, m.tp_dst));
    }
    fields.join(",")
}

fn port_name(port: u16) -> String {
    match PORT_NAMES.iter().find(|&&(_, p)| p == port) {
        Some(&(name, _)) => name.to_owned(),
        None => port.to_string(),
    }
}

/// Renders one action in the syntax `str_to_actions` accepts
pub fn action_to_string(action: &OfpAction) -> String {
    match *action {
        OfpAction::Output { port, .. } if port < OFPP_MAX => format!("output:{}", port),
        OfpAction::Output {
            port: OFPP_CONTROLLER,
            max_len,
        } => {
            if max_len != 0 {
                format!("CONTROLLER:{}", max_len)
            }
            else {
                "CONTROLLER:all".to_owned()
            }
        }
        OfpAction::Output { port, .. } => port_name(port),
        OfpAction::SetVlanVid(vid) => format!("mod_vlan_vid:{}", vid),
        OfpAction::SetVlanPcp(pcp) => format!("mod_vlan_pcp:{}", pcp),
        OfpAction::StripVlan => "strip_vlan".to_owned(),
        OfpAction::SetDlSrc(ref addr) => format!("mod_dl_src:{}", Mac(addr)),
        OfpAction::SetDlDst(ref addr) => format!("mod_dl_dst:{}", Mac(addr)),
        OfpAction::SetNwSrc(ip) => format!("mod_nw_src:{}", Ipv4Addr::from(ip)),
        OfpAction::SetNwDst(ip) => format!("mod_nw_dst:{}", Ipv4Addr::from(ip)),
        OfpAction::SetNwTos(tos) => format!("mod_nw_tos:{}", tos),
        OfpAction::SetTpSrc(port) => format!("mod_tp_src:{}", port),
        OfpAction::SetTpDst(port) => format!("mod_tp_dst:{}", port),
        OfpAction::Resubmit(port) => format!("resubmit:{}", port),
        OfpAction::SetTunnel(tun_id) => format!("set_tunnel:{:#010x}", tun_id),
        OfpAction::Unknown { typ, .. } => format!("(decoder {} not implemented)", typ),
    }
}

/// Comma-joined actions, `drop` for none
pub fn actions_to_string(actions: &[OfpAction]) -> String {
    if actions.is_empty() {
        return "drop".to_owned();
    }
    let parts: Vec<String> = actions.iter().map(action_to_string).collect();
    parts.join(",")
}

/// One line per flow of a flow stats reply
pub fn flow_stats_to_string(fs: &OfpFlowStats) -> String {
    let m = match_to_string(&fs.match_field);
    format!(
        " cookie={:#x}, duration={}.{:03}s, table_id={}, priority={}, n_packets={}, \
         n_bytes={}, idle_timeout={}, hard_timeout={},{}{} actions={}",
        fs.cookie,
        fs.duration_sec,
        fs.duration_nsec / 1_000_000,
        fs.table_id,
        fs.priority,
        fs.packet_count,
        fs.byte_count,
        fs.idle_timeout,
        fs.hard_timeout,
        if m.is_empty() { "" } else { " " },
        m,
        actions_to_string(&fs.actions)
    )
}

fn counter(value: u64) -> String {
    if value == u64::max_value() {
        "?".to_owned()
    }
    else {
        value.to_string()
    }
}

/// Names the known bits of a flag word, what remains is printed in hex
fn flags_to_string(bits: u32, names: &[(u32, &str)]) -> String {
    let mut parts = vec![];
    let mut rest = bits;
    for &(bit, name) in names {
        if bits & bit != 0 {
            parts.push(name.to_owned());
            rest &= !bit;
        }
    }
    if rest != 0 || parts.is_empty() {
        parts.push(format!("{:#x}", rest));
    }
    parts.join(" ")
}

fn features_to_string(out: &mut String, f: &OfpSwitchFeatures) {
    let _ = writeln!(out, " dpid:{:016x}", f.datapath_id());
    let _ = writeln!(out, "n_tables:{}, n_buffers:{}", f.n_tables(), f.n_buffers());
    let _ = writeln!(
        out,
        "features: capabilities:{:#x}, actions:{:#x}",
        f.capabilities(),
        f.actions()
    );
    for port in f.ports() {
        let _ = writeln!(
            out,
            " {}({}): addr:{}",
            port_name(port.port_no()),
            port.name(),
            Mac(port.hw_addr())
        );
        let config = flags_to_string(
            port.config(),
            &[(OFPPC_PORT_DOWN, "PORT_DOWN"), (OFPPC_NO_FLOOD, "NO_FLOOD")],
        );
        let state = flags_to_string(port.state(), &[(OFPPS_LINK_DOWN, "LINK_DOWN")]);
        let _ = writeln!(out, "     config: {}", config);
        let _ = writeln!(out, "     state:  {}", state);
    }
}

fn stats_to_string(out: &mut String, reply: &OfpStatsReply) -> Result<()> {
    let body = reply.body();
    match OfpStatsType::from_u16(reply.typ()) {
        Some(OfpStatsType::Desc) => {
            let d = OfpDescStats::deserialize(body.to_vec())?;
            let _ = writeln!(out, "Manufacturer: {}", d.mfr_desc);
            let _ = writeln!(out, "Hardware: {}", d.hw_desc);
            let _ = writeln!(out, "Software: {}", d.sw_desc);
            let _ = writeln!(out, "Serial Num: {}", d.serial_num);
            let _ = writeln!(out, "DP Description: {}", d.dp_desc);
        }
        Some(OfpStatsType::Flow) => {
            for fs in OfpFlowStats::read_all(body)? {
                let _ = writeln!(out, "{}", flow_stats_to_string(&fs));
            }
        }
        Some(OfpStatsType::Aggregate) => {
            let a = OfpAggregateStats::deserialize(body.to_vec())?;
            let _ = writeln!(
                out,
                " packet_count={} byte_count={} flow_count={}",
                a.packet_count, a.byte_count, a.flow_count
            );
        }
        Some(OfpStatsType::Table) => {
            let tables = OfpTableStats::read_all(body)?;
            let _ = writeln!(out, " {} tables", tables.len());
            for t in tables {
                let _ = writeln!(
                    out,
                    "  {}: {:<8}: wild={:#07x}, max={:6}, active={}",
                    t.table_id, t.name, t.wildcards, t.max_entries, t.active_count
                );
                let _ = writeln!(
                    out,
                    "               lookup={}, matched={}",
                    t.lookup_count, t.matched_count
                );
            }
        }
        Some(OfpStatsType::Port) => {
            let ports = OfpPortStats::read_all(body)?;
            let _ = writeln!(out, " {} ports", ports.len());
            for p in ports {
                let _ = writeln!(
                    out,
                    "  port {:2}: rx pkts={}, bytes={}, drop={}, errs={}, frame={}, over={}, crc={}",
                    p.port_no,
                    counter(p.rx_packets),
                    counter(p.rx_bytes),
                    counter(p.rx_dropped),
                    counter(p.rx_errors),
                    counter(p.rx_frame_err),
                    counter(p.rx_over_err),
                    counter(p.rx_crc_err)
                );
                let _ = writeln!(
                    out,
                    "           tx pkts={}, bytes={}, drop={}, errs={}, coll={}",
                    counter(p.tx_packets),
                    counter(p.tx_bytes),
                    counter(p.tx_dropped),
                    counter(p.tx_errors),
                    counter(p.collisions)
                );
            }
        }
        Some(OfpStatsType::Vendor) | None => {
            let _ = writeln!(out, " stats type {}: {} bytes", reply.typ(), body.len());
        }
    }
    Ok(())
}

fn body_to_string(out: &mut String, typ: Option<OfpType>, body: Vec<u8>) -> Result<()> {
    match typ {
        Some(OfpType::FeaturesReply) => {
            features_to_string(out, &OfpSwitchFeatures::deserialize(body)?);
        }
        Some(OfpType::GetConfigReply) => {
            let c = OfpSwitchConfig::deserialize(body)?;
            let _ = writeln!(out, " flags={:#x} miss_send_len={}", c.flags(), c.miss_send_len());
        }
        Some(OfpType::StatsReply) => {
            let reply = OfpStatsReply::deserialize(body)?;
            if reply.more() {
                out.push_str(" flags=[more]");
            }
            out.push('\n');
            stats_to_string(out, &reply)?;
        }
        Some(OfpType::Error) => {
            let _ = writeln!(out, " {}", OfpErrorMsg::deserialize(body)?);
        }
        Some(OfpType::EchoRequest) | Some(OfpType::EchoReply) => {
            let _ = writeln!(out, " {} bytes of payload", body.len());
        }
        _ => {
            let _ = writeln!(out, " {} bytes", body.len());
        }
    }
    Ok(())
}

/// Renders a complete message, header included
pub fn message_to_string(msg: &[u8]) -> String {
    let header = match OfpHeader::of_message(msg) {
        Ok(h) => h,
        Err(_) => return format!("***truncated message: {} bytes***\n", msg.len()),
    };
    let typ = OfpType::from_u8(header.typ());
    let mut out = match typ {
        Some(t) => format!("{:?} (xid={:#x}):", t, header.xid()),
        None => format!("***unknown type {}*** (xid={:#x}):", header.typ(), header.xid()),
    };
    let body = msg[OfpHeader::header_length()..].to_vec();
    if let Err(e) = body_to_string(&mut out, typ, body) {
        let _ = writeln!(out, " ***decode error: {}***", e);
    }
    out
}
