/*!
Compiles the textual flow syntax into an OpenFlow match, actions and
the flow mod parameters around them.

```text
tcp,nw_src=10.0.0.0/8,tp_dst=80,priority=100,actions=mod_nw_tos:16,output:1
```

Fields that are not mentioned stay wildcarded.
*/

use crate::datapath::ActionList;
use crate::openflow::messages::*;
use crate::openflow::print::match_to_literal_string;
use crate::packets::{EthAddr, ETH_TYPE_ARP, ETH_TYPE_IP};

use ipnetwork::Ipv4Network;

use std::error;
use std::fmt;
use std::io;
use std::net::Ipv4Addr;
use std::str::FromStr;

const NAME_DELIMS: &[char] = &['=', ',', ' ', '\t', '\r', '\n'];
const VALUE_DELIMS: &[char] = &[',', ' ', '\t', '\r', '\n'];

const DEFAULT_IDLE_TIMEOUT: u16 = 60;
const MAX_TABLE_ID: u32 = 31;

#[derive(Debug, PartialEq)]
pub enum Error {
    InvalidNumber(String),
    InvalidMac(String),
    InvalidIp(String),
    InvalidNetmask(String, String),
    InvalidPrefix(String),
    UnknownKeyword(String),
    MissingValue(String),
    InvalidTable(String),
    MissingAction,
    UnknownAction(String),
    DropNotAlone { preceded: bool },
    MissingArgument(String),
    TooManyActions,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::InvalidNumber(ref s) => write!(f, "invalid numeric format {}", s),
            Error::InvalidMac(ref s) => write!(f, "invalid mac address {}", s),
            Error::InvalidIp(ref s) => write!(f, "{}: could not convert to IP address", s),
            Error::InvalidNetmask(ref s, ref m) => write!(f, "{}: {} is not a valid netmask", s, m),
            Error::InvalidPrefix(ref s) => {
                write!(f, "{}: network prefix bits not between 1 and 32", s)
            }
            Error::UnknownKeyword(ref s) => write!(f, "unknown keyword {}", s),
            Error::MissingValue(ref s) => write!(f, "field {} missing value", s),
            Error::InvalidTable(ref s) => {
                write!(f, "table {} is invalid, must be between 0 and {}", s, MAX_TABLE_ID)
            }
            Error::MissingAction => write!(f, "must specify an action"),
            Error::UnknownAction(ref s) => write!(f, "Unknown action: {}", s),
            Error::DropNotAlone { preceded: false } => {
                write!(f, "Drop actions must not be followed by other actions")
            }
            Error::DropNotAlone { preceded: true } => {
                write!(f, "Drop actions must not be preceded by other actions")
            }
            Error::MissingArgument(ref s) => write!(f, "action {} needs an argument", s),
            Error::TooManyActions => write!(f, "too many actions for one flow"),
        }
    }
}

impl error::Error for Error {
    fn description(&self) -> &str {
        "Flow syntax error"
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        io::Error::new(io::ErrorKind::InvalidInput, e)
    }
}

/// Selects the parts besides the match that are parsed from the text.
/// A name of an unselected part is treated like any other unknown name.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowParts {
    pub actions: bool,
    pub table: bool,
    pub out_port: bool,
    pub priority: bool,
    pub idle_timeout: bool,
    pub hard_timeout: bool,
    pub cookie: bool,
}

impl FlowParts {
    /// Everything a flow addition needs
    pub fn all() -> FlowParts {
        FlowParts {
            actions: true,
            table: true,
            out_port: true,
            priority: true,
            idle_timeout: true,
            hard_timeout: true,
            cookie: true,
        }
    }

    /// Just the match plus the flow stats request parameters
    pub fn stats_request() -> FlowParts {
        FlowParts {
            table: true,
            out_port: true,
            ..FlowParts::default()
        }
    }
}

/// The result of compiling one flow text
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFlow {
    pub match_field: OfpMatch,
    pub actions: Vec<OfpAction>,
    /// 0xff if no table is given
    pub table_idx: u8,
    pub out_port: u16,
    pub priority: u16,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub cookie: u64,
}

impl Default for ParsedFlow {
    fn default() -> Self {
        ParsedFlow {
            match_field: OfpMatch::new(),
            actions: vec![],
            table_idx: 0xff,
            out_port: OFPP_NONE,
            priority: OFP_DEFAULT_PRIORITY,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            hard_timeout: OFP_FLOW_PERMANENT,
            cookie: 0,
        }
    }
}

impl ParsedFlow {
    /// Builds the flow mod that carries this flow
    pub fn flow_mod(&self, command: OfpFlowModCommand) -> OfpFlowMod {
        OfpFlowMod::new(
            command,
            self.table_idx,
            self.match_field,
            self.cookie,
            self.idle_timeout,
            self.hard_timeout,
            self.priority,
            self.out_port,
            self.actions.clone(),
        )
    }
}

/// strtok-like splitting: skips leading delimiters, then consumes the
/// token and exactly one delimiter behind it.
struct Tokens<'a> {
    rest: &'a str,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Tokens<'a> {
        Tokens { rest: text }
    }

    fn next(&mut self, delims: &[char]) -> Option<&'a str> {
        let s = self.rest.trim_start_matches(|c: char| delims.contains(&c));
        if s.is_empty() {
            self.rest = s;
            return None;
        }
        let end = s.find(|c: char| delims.contains(&c)).unwrap_or_else(|| s.len());
        let (token, rest) = s.split_at(end);
        // delimiters are single byte
        self.rest = if rest.is_empty() { rest } else { &rest[1..] };
        Some(token)
    }
}

/// Parses like strtoull with base 0: decimal, 0x-prefixed hex or
/// 0-prefixed octal. Nothing may follow the digits.
pub fn str_to_u64(s: &str) -> Result<u64, Error> {
    let (digits, radix) = if s.starts_with("0x") || s.starts_with("0X") {
        (&s[2..], 16)
    }
    else if s.len() > 1 && s.starts_with('0') {
        (&s[1..], 8)
    }
    else {
        (s, 10)
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(Error::InvalidNumber(s.to_owned()));
    }
    u64::from_str_radix(digits, radix).map_err(|_| Error::InvalidNumber(s.to_owned()))
}

pub fn str_to_u32(s: &str) -> Result<u32, Error> {
    let value = str_to_u64(s)?;
    if value > u64::from(u32::max_value()) {
        return Err(Error::InvalidNumber(s.to_owned()));
    }
    Ok(value as u32)
}

pub fn str_to_u16(s: &str) -> Result<u16, Error> {
    let value = str_to_u32(s)?;
    if value > u32::from(u16::max_value()) {
        return Err(Error::InvalidNumber(s.to_owned()));
    }
    Ok(value as u16)
}

fn str_to_u8(s: &str) -> Result<u8, Error> {
    let value = str_to_u32(s)?;
    if value > u32::from(u8::max_value()) {
        return Err(Error::InvalidNumber(s.to_owned()));
    }
    Ok(value as u8)
}

/// Parses six colon-separated groups of one or two hex digits.
pub fn str_to_mac(s: &str) -> Result<EthAddr, Error> {
    let mut mac = [0; 6];
    let mut groups = s.split(':');
    for byte in mac.iter_mut() {
        let group = groups.next().ok_or_else(|| Error::InvalidMac(s.to_owned()))?;
        if group.is_empty() || group.len() > 2 {
            return Err(Error::InvalidMac(s.to_owned()));
        }
        *byte = u8::from_str_radix(group, 16).map_err(|_| Error::InvalidMac(s.to_owned()))?;
    }
    if groups.next().is_some() {
        return Err(Error::InvalidMac(s.to_owned()));
    }
    Ok(mac)
}

/// Parses `host[/netmask]` where the netmask is a dotted quad or a prefix
/// length. Returns the address and the number of wildcarded low-order bits.
pub fn str_to_ip(s: &str) -> Result<(u32, u8), Error> {
    let mut parts = s.splitn(2, '/');
    let host = parts.next().unwrap_or("");
    let ip = Ipv4Addr::from_str(host).map_err(|_| Error::InvalidIp(host.to_owned()))?;

    let n_wild = match parts.next() {
        None => 0,
        Some(mask) => match Ipv4Addr::from_str(mask) {
            Ok(mask_ip) => {
                let nm = u32::from(mask_ip);
                let n_wild = nm.trailing_zeros();
                // every bit above the lowest 1-bit has to be set, too
                if nm.count_ones() + n_wild != 32 {
                    return Err(Error::InvalidNetmask(host.to_owned(), mask.to_owned()));
                }
                n_wild as u8
            }
            Err(_) => {
                let prefix: u8 = mask
                    .parse()
                    .map_err(|_| Error::InvalidPrefix(host.to_owned()))?;
                let net = Ipv4Network::new(ip, prefix)
                    .map_err(|_| Error::InvalidPrefix(host.to_owned()))?;
                if net.prefix() == 0 {
                    return Err(Error::InvalidPrefix(host.to_owned()));
                }
                32 - net.prefix()
            }
        },
    };
    Ok((u32::from(ip), n_wild))
}

/// Resolves a symbolic port name, ignoring case
pub fn parse_port_name(name: &str) -> Option<u16> {
    PORT_NAMES
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|&(_, port)| port)
}

fn parse_protocol(name: &str) -> Option<(u16, Option<u8>)> {
    match name {
        "ip" => Some((ETH_TYPE_IP, None)),
        "arp" => Some((ETH_TYPE_ARP, None)),
        "icmp" => Some((ETH_TYPE_IP, Some(1))),
        "tcp" => Some((ETH_TYPE_IP, Some(6))),
        "udp" => Some((ETH_TYPE_IP, Some(17))),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    InPort,
    DlVlan,
    DlVlanPcp,
    DlSrc,
    DlDst,
    DlType,
    NwSrc,
    NwDst,
    NwProto,
    NwTos,
    TpSrc,
    TpDst,
}

const FIELDS: [(&str, Field); 14] = [
    ("in_port", Field::InPort),
    ("dl_vlan", Field::DlVlan),
    ("dl_vlan_pcp", Field::DlVlanPcp),
    ("dl_src", Field::DlSrc),
    ("dl_dst", Field::DlDst),
    ("dl_type", Field::DlType),
    ("nw_src", Field::NwSrc),
    ("nw_dst", Field::NwDst),
    ("nw_proto", Field::NwProto),
    ("nw_tos", Field::NwTos),
    ("tp_src", Field::TpSrc),
    ("tp_dst", Field::TpDst),
    ("icmp_type", Field::TpSrc),
    ("icmp_code", Field::TpDst),
];

fn parse_field(name: &str) -> Option<Field> {
    FIELDS.iter().find(|(n, _)| *n == name).map(|&(_, f)| f)
}

fn set_wildcard(wc: &mut Wildcards, field: Field, wild: bool) {
    match field {
        Field::InPort => wc.in_port = wild,
        Field::DlVlan => wc.dl_vlan = wild,
        Field::DlVlanPcp => wc.dl_vlan_pcp = wild,
        Field::DlSrc => wc.dl_src = wild,
        Field::DlDst => wc.dl_dst = wild,
        Field::DlType => wc.dl_type = wild,
        Field::NwProto => wc.nw_proto = wild,
        Field::NwTos => wc.nw_tos = wild,
        Field::TpSrc => wc.tp_src = wild,
        Field::TpDst => wc.tp_dst = wild,
        Field::NwSrc if wild => wc.set_nw_src_all(),
        Field::NwSrc => wc.nw_src_bits = 0,
        Field::NwDst if wild => wc.set_nw_dst_all(),
        Field::NwDst => wc.nw_dst_bits = 0,
    }
}

fn set_field(m: &mut OfpMatch, field: Field, value: &str) -> Result<(), Error> {
    if value == "*" || value == "ANY" {
        set_wildcard(&mut m.wildcards, field, true);
        return Ok(());
    }
    set_wildcard(&mut m.wildcards, field, false);
    match field {
        Field::InPort => {
            m.in_port = match parse_port_name(value) {
                Some(port) => port,
                None => str_to_u16(value)?,
            }
        }
        Field::DlVlan => m.dl_vlan = str_to_u16(value)?,
        Field::DlVlanPcp => m.dl_vlan_pcp = str_to_u8(value)?,
        Field::DlSrc => m.dl_src = str_to_mac(value)?,
        Field::DlDst => m.dl_dst = str_to_mac(value)?,
        Field::DlType => m.dl_type = str_to_u16(value)?,
        Field::NwSrc => {
            let (ip, n_wild) = str_to_ip(value)?;
            m.nw_src = ip;
            m.wildcards.nw_src_bits = n_wild;
        }
        Field::NwDst => {
            let (ip, n_wild) = str_to_ip(value)?;
            m.nw_dst = ip;
            m.wildcards.nw_dst_bits = n_wild;
        }
        Field::NwProto => m.nw_proto = str_to_u8(value)?,
        Field::NwTos => m.nw_tos = str_to_u8(value)?,
        Field::TpSrc => m.tp_src = str_to_u16(value)?,
        Field::TpDst => m.tp_dst = str_to_u16(value)?,
    }
    Ok(())
}

/// Compiles an action list such as `mod_vlan_vid:5,output:1`.
/// `drop` has to stand alone and yields no actions.
pub fn str_to_actions(text: &str) -> Result<Vec<OfpAction>, Error> {
    let mut tokens = Tokens::new(text);
    let mut list: ActionList<OfpAction> = ActionList::new();
    let mut drop = false;
    let mut n_actions = 0;

    while let Some(token) = tokens.next(VALUE_DELIMS) {
        if drop {
            return Err(Error::DropNotAlone { preceded: false });
        }
        let mut split = token.splitn(2, ':');
        let act = split.next().unwrap_or("");
        let arg = split.next();
        let need_arg = || arg.ok_or_else(|| Error::MissingArgument(act.to_owned()));

        let action = match act.to_ascii_lowercase().as_str() {
            "mod_vlan_vid" => OfpAction::SetVlanVid(str_to_u16(need_arg()?)?),
            "mod_vlan_pcp" => OfpAction::SetVlanPcp(str_to_u8(need_arg()?)?),
            "strip_vlan" => OfpAction::StripVlan,
            "mod_dl_src" => OfpAction::SetDlSrc(str_to_mac(need_arg()?)?),
            "mod_dl_dst" => OfpAction::SetDlDst(str_to_mac(need_arg()?)?),
            "mod_nw_src" => OfpAction::SetNwSrc(str_to_ip(need_arg()?)?.0),
            "mod_nw_dst" => OfpAction::SetNwDst(str_to_ip(need_arg()?)?.0),
            "mod_tp_src" => OfpAction::SetTpSrc(str_to_u16(need_arg()?)?),
            "mod_tp_dst" => OfpAction::SetTpDst(str_to_u16(need_arg()?)?),
            "mod_nw_tos" => OfpAction::SetNwTos(str_to_u8(need_arg()?)?),
            "resubmit" => OfpAction::Resubmit(str_to_u16(need_arg()?)?),
            "set_tunnel" => OfpAction::SetTunnel(str_to_u32(need_arg()?)?),
            "output" => OfpAction::Output {
                port: str_to_u16(need_arg()?)?,
                max_len: 0,
            },
            "drop" => {
                if n_actions > 0 {
                    return Err(Error::DropNotAlone { preceded: true });
                }
                drop = true;
                n_actions += 1;
                continue;
            }
            "controller" => {
                // the whole packet unless a length is given
                let max_len = match arg {
                    Some(a) if !a.is_empty() && a.bytes().all(|b| b.is_ascii_digit()) => {
                        str_to_u16(a)?
                    }
                    _ => u16::max_value(),
                };
                OfpAction::Output {
                    port: OFPP_CONTROLLER,
                    max_len,
                }
            }
            _ => {
                if let Some(port) = parse_port_name(act) {
                    OfpAction::Output { port, max_len: 0 }
                }
                else if !act.is_empty() && act.bytes().all(|b| b.is_ascii_digit()) {
                    OfpAction::Output {
                        port: str_to_u16(act)?,
                        max_len: 0,
                    }
                }
                else {
                    return Err(Error::UnknownAction(act.to_owned()));
                }
            }
        };
        list.add(action);
        n_actions += 1;
    }

    if n_actions == 0 {
        return Err(Error::MissingAction);
    }
    if list.is_overflowed() {
        return Err(Error::TooManyActions);
    }
    Ok(list.as_slice().to_vec())
}

/// Compiles one flow text. Only the parts selected by `parts` are looked
/// for besides the match fields; the others keep their defaults.
pub fn str_to_flow(text: &str, parts: FlowParts) -> Result<ParsedFlow, Error> {
    let mut flow = ParsedFlow::default();
    let mut fields = text;

    if parts.actions {
        let start = text.find("action").ok_or(Error::MissingAction)?;
        let after = &text[start + 1..];
        let eq = after.find('=').ok_or(Error::MissingAction)?;
        flow.actions = str_to_actions(&after[eq + 1..])?;
        fields = &text[..start];
    }

    let m = &mut flow.match_field;
    let mut tokens = Tokens::new(fields);
    while let Some(name) = tokens.next(NAME_DELIMS) {
        if let Some((dl_type, nw_proto)) = parse_protocol(name) {
            m.wildcards.dl_type = false;
            m.dl_type = dl_type;
            if let Some(proto) = nw_proto {
                m.wildcards.nw_proto = false;
                m.nw_proto = proto;
            }
            continue;
        }

        let value = tokens
            .next(VALUE_DELIMS)
            .ok_or_else(|| Error::MissingValue(name.to_owned()))?;

        match name {
            "table" if parts.table => {
                let table = str_to_u32(value).map_err(|_| Error::InvalidTable(value.to_owned()))?;
                if table > MAX_TABLE_ID {
                    return Err(Error::InvalidTable(value.to_owned()));
                }
                flow.table_idx = table as u8;
            }
            "out_port" if parts.out_port => flow.out_port = str_to_u16(value)?,
            "priority" if parts.priority => flow.priority = str_to_u16(value)?,
            "idle_timeout" if parts.idle_timeout => flow.idle_timeout = str_to_u16(value)?,
            "hard_timeout" if parts.hard_timeout => flow.hard_timeout = str_to_u16(value)?,
            "cookie" if parts.cookie => flow.cookie = str_to_u64(value)?,
            "tun_id_wild" => m.wildcards.tun_id = true,
            _ => match parse_field(name) {
                Some(field) => set_field(m, field, value)?,
                None => return Err(Error::UnknownKeyword(name.to_owned())),
            },
        }
    }

    warn_unnormalized(&flow.match_field);
    Ok(flow)
}

/// Warns about a match that normalization would change. The match is used
/// as specified either way. Returns whether it warned.
fn warn_unnormalized(m: &OfpMatch) -> bool {
    let normalized = m.normalized();
    if normalized == *m {
        return false;
    }
    warn!("The specified flow is not in normal form:");
    warn!(" as specified: {}", match_to_literal_string(m));
    warn!("as normalized: {}", match_to_literal_string(&normalized));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openflow::messages::serialize::OfpPacket;

    #[test]
    fn numbers() {
        assert_eq!(Ok(80), str_to_u32("80"));
        assert_eq!(Ok(0x1f), str_to_u32("0x1f"));
        assert_eq!(Ok(8), str_to_u32("010"));
        assert_eq!(Ok(0), str_to_u32("0"));
        assert_eq!(Ok(u64::max_value()), str_to_u64("0xffffffffffffffff"));
        for bad in &["", "0x", "12a", "-1", "+1", "4294967296", "08"] {
            assert_eq!(Err(Error::InvalidNumber(bad.to_string())), str_to_u32(bad));
        }
    }

    #[test]
    fn mac_addresses() {
        assert_eq!(Ok([0, 0x16, 0x3e, 0xa, 0xb, 0xff]), str_to_mac("00:16:3e:a:0b:FF"));
        for bad in &["00:16:3e:0a:0b", "00:16:3e:0a:0b:0c:0d", "00:16:3e:0a:0b:0g", "001:1:1:1:1:1"] {
            assert_eq!(Err(Error::InvalidMac(bad.to_string())), str_to_mac(bad));
        }
    }

    #[test]
    fn netmask_forms_agree() {
        let expected = Ok((0xc0a8_0100, 8));
        assert_eq!(expected, str_to_ip("192.168.1.0/24"));
        assert_eq!(expected, str_to_ip("192.168.1.0/255.255.255.0"));
        assert_eq!(Ok((0xc0a8_0101, 0)), str_to_ip("192.168.1.1"));
    }

    #[test]
    fn bad_netmasks() {
        assert_eq!(
            Err(Error::InvalidNetmask(
                "192.168.1.0".to_owned(),
                "255.255.0.255".to_owned()
            )),
            str_to_ip("192.168.1.0/255.255.0.255")
        );
        for bad in &["10.0.0.0/0", "10.0.0.0/33", "10.0.0.0/x"] {
            assert_eq!(Err(Error::InvalidPrefix("10.0.0.0".to_owned())), str_to_ip(bad));
        }
        assert_eq!(Ok((0x0a00_0000, 32)), str_to_ip("10.0.0.0/0.0.0.0"));
    }

    #[test]
    fn end_to_end() {
        let testee = str_to_flow(
            "nw_src=10.0.0.0/8,tp_dst=80,action=output:1",
            FlowParts::all(),
        )
        .unwrap();
        let m = testee.match_field;
        assert_eq!(24, m.wildcards.nw_src_bits);
        assert_eq!(0x0a00_0000, m.nw_src);
        assert!(!m.wildcards.tp_dst);
        assert_eq!(80, m.tp_dst);
        assert!(m.wildcards.tp_src && m.wildcards.dl_type);
        let mut ser = vec![];
        m.serialize(&mut ser).unwrap();
        assert_eq!([0, 80], ser[38..40]);
        assert_eq!(
            vec![OfpAction::Output {
                port: 1,
                max_len: 0
            }],
            testee.actions
        );
    }

    #[test]
    fn side_channel_defaults() {
        let testee = str_to_flow("in_port=1,actions=drop", FlowParts::all()).unwrap();
        assert_eq!(0xff, testee.table_idx);
        assert_eq!(OFPP_NONE, testee.out_port);
        assert_eq!(OFP_DEFAULT_PRIORITY, testee.priority);
        assert_eq!(60, testee.idle_timeout);
        assert_eq!(0, testee.hard_timeout);
        assert_eq!(0, testee.cookie);
    }

    #[test]
    fn side_channels() {
        let text = "table=3 priority=7,idle_timeout=0 hard_timeout=30 cookie=0x10 \
                    out_port=2 actions=LOCAL";
        let testee = str_to_flow(text, FlowParts::all()).unwrap();
        assert_eq!(3, testee.table_idx);
        assert_eq!(7, testee.priority);
        assert_eq!(0, testee.idle_timeout);
        assert_eq!(30, testee.hard_timeout);
        assert_eq!(0x10, testee.cookie);
        assert_eq!(2, testee.out_port);
        assert_eq!(Wildcards::all(), testee.match_field.wildcards);
    }

    #[test]
    fn unrequested_side_channel_is_unknown() {
        assert_eq!(
            Err(Error::UnknownKeyword("priority".to_owned())),
            str_to_flow("priority=5", FlowParts::stats_request())
        );
    }

    #[test]
    fn table_out_of_range() {
        assert_eq!(
            Err(Error::InvalidTable("32".to_owned())),
            str_to_flow("table=32", FlowParts::stats_request())
        );
    }

    #[test]
    fn protocols() {
        let testee = str_to_flow("icmp,icmp_type=8", FlowParts::default()).unwrap();
        let m = testee.match_field;
        assert_eq!(ETH_TYPE_IP, m.dl_type);
        assert_eq!(1, m.nw_proto);
        assert!(!m.wildcards.dl_type && !m.wildcards.nw_proto);
        assert_eq!(8, m.tp_src);
        let arp = str_to_flow("arp", FlowParts::default()).unwrap();
        assert_eq!(ETH_TYPE_ARP, arp.match_field.dl_type);
        assert!(arp.match_field.wildcards.nw_proto);
    }

    #[test]
    fn wildcard_values() {
        let text = "dl_type=0x0800,nw_src=ANY,tp_src=*,tun_id_wild=1";
        let testee = str_to_flow(text, FlowParts::default()).unwrap();
        let wc = testee.match_field.wildcards;
        assert!(!wc.dl_type);
        assert_eq!(63, wc.nw_src_bits);
        assert!(wc.tp_src);
        assert!(wc.tun_id);
    }

    #[test]
    fn in_port_names() {
        let testee = str_to_flow("in_port=local", FlowParts::default()).unwrap();
        assert_eq!(OFPP_LOCAL, testee.match_field.in_port);
        assert!(!testee.match_field.wildcards.in_port);
    }

    #[test]
    fn field_errors() {
        let parts = FlowParts::default();
        assert_eq!(
            Err(Error::MissingValue("tp_dst".to_owned())),
            str_to_flow("tcp,tp_dst", parts)
        );
        assert_eq!(
            Err(Error::UnknownKeyword("nw_ttl".to_owned())),
            str_to_flow("nw_ttl=3", parts)
        );
        assert_eq!(
            Err(Error::InvalidNumber("256".to_owned())),
            str_to_flow("nw_proto=256", parts)
        );
    }

    #[test]
    fn missing_action() {
        let parts = FlowParts::all();
        assert_eq!(Err(Error::MissingAction), str_to_flow("in_port=1", parts));
        assert_eq!(Err(Error::MissingAction), str_to_flow("in_port=1,action", parts));
        assert_eq!(Err(Error::MissingAction), str_to_flow("action=", parts));
    }

    #[test]
    fn drop_alone() {
        let testee = str_to_flow("action=drop", FlowParts::all()).unwrap();
        assert!(testee.actions.is_empty());
        assert_eq!(
            Err(Error::DropNotAlone { preceded: false }),
            str_to_actions("drop,output:1")
        );
        assert_eq!(
            Err(Error::DropNotAlone { preceded: true }),
            str_to_actions("output:1 drop")
        );
    }

    #[test]
    fn action_grammar() {
        let text = "mod_vlan_vid:5,MOD_VLAN_PCP:2 strip_vlan,mod_dl_src:00:00:00:00:00:01,\
                    mod_nw_dst:10.0.0.2,mod_tp_src:1,mod_nw_tos:16,resubmit:3,set_tunnel:0x22,\
                    CONTROLLER,controller:128,flood,7";
        let expected = vec![
            OfpAction::SetVlanVid(5),
            OfpAction::SetVlanPcp(2),
            OfpAction::StripVlan,
            OfpAction::SetDlSrc([0, 0, 0, 0, 0, 1]),
            OfpAction::SetNwDst(0x0a00_0002),
            OfpAction::SetTpSrc(1),
            OfpAction::SetNwTos(16),
            OfpAction::Resubmit(3),
            OfpAction::SetTunnel(0x22),
            OfpAction::Output {
                port: OFPP_CONTROLLER,
                max_len: 0xffff,
            },
            OfpAction::Output {
                port: OFPP_CONTROLLER,
                max_len: 128,
            },
            OfpAction::Output {
                port: OFPP_FLOOD,
                max_len: 0,
            },
            OfpAction::Output {
                port: 7,
                max_len: 0,
            },
        ];
        assert_eq!(Ok(expected), str_to_actions(text));
    }

    #[test]
    fn action_errors() {
        assert_eq!(
            Err(Error::UnknownAction("bounce".to_owned())),
            str_to_actions("bounce")
        );
        assert_eq!(
            Err(Error::MissingArgument("output".to_owned())),
            str_to_actions("output")
        );
    }

    #[test]
    fn too_many_actions() {
        let text = vec!["strip_vlan"; 513].join(",");
        assert_eq!(Err(Error::TooManyActions), str_to_actions(&text));
        let text = vec!["strip_vlan"; 512].join(",");
        assert_eq!(512, str_to_actions(&text).unwrap().len());
    }

    #[test]
    fn unnormalized_is_accepted() {
        let testee = str_to_flow("nw_src=10.1.2.3/8", FlowParts::default()).unwrap();
        assert_eq!(0x0a01_0203, testee.match_field.nw_src);
        assert_ne!(testee.match_field.normalized(), testee.match_field);
        assert!(warn_unnormalized(&testee.match_field));

        let testee = str_to_flow("ip,nw_src=10.1.2.3/8", FlowParts::default()).unwrap();
        assert_eq!(0x0a00_0000, testee.match_field.normalized().nw_src);
        assert!(warn_unnormalized(&testee.match_field));
    }

    #[test]
    fn normal_form_is_not_warned() {
        for text in &["tcp,nw_src=10.0.0.0/8,tp_dst=80", "in_port=1", ""] {
            let testee = str_to_flow(text, FlowParts::default()).unwrap();
            assert_eq!(testee.match_field.normalized(), testee.match_field);
            assert!(!warn_unnormalized(&testee.match_field));
        }
    }

    #[test]
    fn host_names_are_not_resolved() {
        assert_eq!(Err(Error::InvalidIp("localhost".to_owned())), str_to_ip("localhost"));
        assert_eq!(
            Err(Error::InvalidIp("foo".to_owned())),
            str_to_ip("foo/24")
        );
    }

    #[test]
    fn flow_mod_command_carries_table() {
        let testee = str_to_flow("table=2,actions=1", FlowParts::all()).unwrap();
        let mut ser = vec![];
        testee
            .flow_mod(OfpFlowModCommand::Add)
            .serialize_body(&mut ser)
            .unwrap();
        assert_eq!([2, 0], ser[48..50]);
    }
}
