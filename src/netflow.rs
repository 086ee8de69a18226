/*!
NetFlow v5 export.

Expired flows are turned into 48 byte records that accumulate in one
datagram behind a 24 byte header. The datagram goes out to every
collector when `run` is called or as soon as it holds 30 records.
*/

use crate::flow::Flow;
use crate::packets::{IpProtocol, ETH_TYPE_IP};
use crate::time::{time_msec, time_wall};
use crate::vlog::RateLimit;

use byteorder::{ByteOrder, NetworkEndian};

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

pub const NETFLOW_V5_VERSION: u16 = 5;
pub const NETFLOW_V5_HEADER_LEN: usize = 24;
pub const NETFLOW_V5_RECORD_LEN: usize = 48;
/// A datagram carries at most this many records.
pub const NETFLOW_V5_MAX_RECORDS: u16 = 30;

/// Seconds, used when the options do not name an active timeout
pub const ACTIVE_TIMEOUT_DEFAULT: u32 = 600;

/* Output interface indices that do not name a single port */
/// The flow floods packets.
pub const NF_OUT_FLOOD: u16 = u16::max_value();
/// The flow outputs to more than one port.
pub const NF_OUT_MULTI: u16 = u16::max_value() - 1;
/// The flow drops packets.
pub const NF_OUT_DROP: u16 = u16::max_value() - 2;

/// Source of the two clocks the exporter needs
pub trait Clock {
    /// Monotonic milliseconds
    fn msec(&self) -> i64;

    /// Seconds and nanoseconds since the epoch
    fn wall(&self) -> (u32, u32);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn msec(&self) -> i64 {
        time_msec()
    }

    fn wall(&self) -> (u32, u32) {
        time_wall()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetflowV5Header {
    pub version: u16,
    pub count: u16,
    /// System uptime in milliseconds.
    pub sysuptime: u32,
    pub unix_secs: u32,
    pub unix_nsecs: u32,
    /// Number of flows since sending messages began.
    pub flow_seq: u32,
    pub engine_type: u8,
    pub engine_id: u8,
    pub sampling_interval: u16,
}

impl NetflowV5Header {
    pub fn to_bytes(&self) -> [u8; NETFLOW_V5_HEADER_LEN] {
        let mut buf = [0; NETFLOW_V5_HEADER_LEN];
        NetworkEndian::write_u16(&mut buf[0..2], self.version);
        NetworkEndian::write_u16(&mut buf[2..4], self.count);
        NetworkEndian::write_u32(&mut buf[4..8], self.sysuptime);
        NetworkEndian::write_u32(&mut buf[8..12], self.unix_secs);
        NetworkEndian::write_u32(&mut buf[12..16], self.unix_nsecs);
        NetworkEndian::write_u32(&mut buf[16..20], self.flow_seq);
        buf[20] = self.engine_type;
        buf[21] = self.engine_id;
        NetworkEndian::write_u16(&mut buf[22..24], self.sampling_interval);
        buf
    }

    pub fn from_bytes(bytes: &[u8; NETFLOW_V5_HEADER_LEN]) -> NetflowV5Header {
        NetflowV5Header {
            version: NetworkEndian::read_u16(&bytes[0..2]),
            count: NetworkEndian::read_u16(&bytes[2..4]),
            sysuptime: NetworkEndian::read_u32(&bytes[4..8]),
            unix_secs: NetworkEndian::read_u32(&bytes[8..12]),
            unix_nsecs: NetworkEndian::read_u32(&bytes[12..16]),
            flow_seq: NetworkEndian::read_u32(&bytes[16..20]),
            engine_type: bytes[20],
            engine_id: bytes[21],
            sampling_interval: NetworkEndian::read_u16(&bytes[22..24]),
        }
    }
}

/// One terminated (or timed out) flow. AS numbers and masks are always 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetflowV5Record {
    pub src_addr: u32,
    pub dst_addr: u32,
    pub nexthop: u32,
    /// Input interface index.
    pub input: u16,
    /// Output interface index.
    pub output: u16,
    pub packet_count: u32,
    pub byte_count: u32,
    /// Value of sysuptime on first packet.
    pub init_time: u32,
    /// Value of sysuptime on last packet.
    pub used_time: u32,
    /// For ICMP, `dst_port` holds type and code, high and low byte.
    pub src_port: u16,
    pub dst_port: u16,
    /// Union of seen TCP flags.
    pub tcp_flags: u8,
    pub ip_proto: u8,
    pub ip_tos: u8,
}

impl NetflowV5Record {
    pub fn to_bytes(&self) -> [u8; NETFLOW_V5_RECORD_LEN] {
        let mut buf = [0; NETFLOW_V5_RECORD_LEN];
        NetworkEndian::write_u32(&mut buf[0..4], self.src_addr);
        NetworkEndian::write_u32(&mut buf[4..8], self.dst_addr);
        NetworkEndian::write_u32(&mut buf[8..12], self.nexthop);
        NetworkEndian::write_u16(&mut buf[12..14], self.input);
        NetworkEndian::write_u16(&mut buf[14..16], self.output);
        NetworkEndian::write_u32(&mut buf[16..20], self.packet_count);
        NetworkEndian::write_u32(&mut buf[20..24], self.byte_count);
        NetworkEndian::write_u32(&mut buf[24..28], self.init_time);
        NetworkEndian::write_u32(&mut buf[28..32], self.used_time);
        NetworkEndian::write_u16(&mut buf[32..34], self.src_port);
        NetworkEndian::write_u16(&mut buf[34..36], self.dst_port);
        // buf[36] is padding
        buf[37] = self.tcp_flags;
        buf[38] = self.ip_proto;
        buf[39] = self.ip_tos;
        // src_as, dst_as, src_mask, dst_mask and padding stay 0
        buf
    }

    pub fn from_bytes(bytes: &[u8; NETFLOW_V5_RECORD_LEN]) -> NetflowV5Record {
        NetflowV5Record {
            src_addr: NetworkEndian::read_u32(&bytes[0..4]),
            dst_addr: NetworkEndian::read_u32(&bytes[4..8]),
            nexthop: NetworkEndian::read_u32(&bytes[8..12]),
            input: NetworkEndian::read_u16(&bytes[12..14]),
            output: NetworkEndian::read_u16(&bytes[14..16]),
            packet_count: NetworkEndian::read_u32(&bytes[16..20]),
            byte_count: NetworkEndian::read_u32(&bytes[20..24]),
            init_time: NetworkEndian::read_u32(&bytes[24..28]),
            used_time: NetworkEndian::read_u32(&bytes[28..32]),
            src_port: NetworkEndian::read_u16(&bytes[32..34]),
            dst_port: NetworkEndian::read_u16(&bytes[34..36]),
            tcp_flags: bytes[37],
            ip_proto: bytes[38],
            ip_tos: bytes[39],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetflowOptions {
    /// `host:port` strings
    pub collectors: Vec<String>,
    pub engine_type: u8,
    pub engine_id: u8,
    /// Seconds, `None` for the default
    pub active_timeout: Option<u32>,
    /// Put the 7 least significant bits of `engine_id` into the
    /// 7 most significant bits of the interface indices.
    pub add_id_to_iface: bool,
}

/// Export state kept per tracked flow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetflowFlow {
    /// Last time the flow was reported or its timer was reset.
    pub last_expired: i64,
    /// Time of the first packet since the last report, 0 if unset.
    pub created: i64,
    pub packet_count_off: u64,
    pub byte_count_off: u64,
    pub output_iface: u16,
    pub ip_tos: u8,
    pub tcp_flags: u8,
}

impl NetflowFlow {
    /// Forgets everything but the output interface
    pub fn clear(&mut self) {
        *self = NetflowFlow {
            output_iface: self.output_iface,
            ..NetflowFlow::default()
        };
    }

    pub fn update_flags(&mut self, ip_tos: u8, tcp_flags: u8) {
        self.ip_tos = ip_tos;
        self.tcp_flags |= tcp_flags;
    }
}

/// A flow's totals at the time it is reported
#[derive(Debug, Clone)]
pub struct Expired {
    pub flow: Flow,
    pub packet_count: u64,
    pub byte_count: u64,
    /// Time of the last packet.
    pub used: i64,
}

pub struct Netflow<C = SystemClock> {
    clock: C,
    engine_type: u8,
    engine_id: u8,
    boot_time: i64,
    collectors: Vec<UdpSocket>,
    add_id_to_iface: bool,
    netflow_cnt: u32,
    packet: Vec<u8>,
    /// Milliseconds, 0 disables active timeouts.
    active_timeout: i64,
    reconfig_time: i64,
    send_rl: RateLimit,
}

/// Resolves `host:port` to an IPv4 address and connects a non-blocking
/// UDP socket to it.
fn open_collector(name: &str) -> io::Result<UdpSocket> {
    let mut parts = name.splitn(2, ':');
    let host = parts.next().unwrap_or("");
    if host.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{}: bad peer name format", name),
        ));
    }
    let port = match parts.next().map(|p| p.parse::<u16>()) {
        Some(Ok(port)) => port,
        _ => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{}: bad port format", name),
            ))
        }
    };
    let addr = (host, port)
        .to_socket_addrs()?
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: no IPv4 address", host),
            )
        })?;

    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.set_nonblocking(true)?;
    socket.connect(addr)?;
    debug!("Opened NetFlow collector {} ({})", name, addr);
    Ok(socket)
}

impl<C: Clock> Netflow<C> {
    pub fn new(clock: C) -> Netflow<C> {
        let boot_time = clock.msec();
        Netflow {
            clock,
            engine_type: 0,
            engine_id: 0,
            boot_time,
            collectors: vec![],
            add_id_to_iface: false,
            netflow_cnt: 0,
            packet: Vec::with_capacity(1500),
            active_timeout: 0,
            reconfig_time: 0,
            send_rl: RateLimit::new(1, 5),
        }
    }

    /// Replaces the collectors and applies the other options.
    /// Collectors that cannot be opened are skipped with a warning,
    /// the first such failure is returned after all others were tried.
    pub fn set_options(&mut self, options: &NetflowOptions) -> io::Result<()> {
        self.engine_type = options.engine_type;
        self.engine_id = options.engine_id;
        self.add_id_to_iface = options.add_id_to_iface;

        self.collectors.clear();

        let mut names = options.collectors.clone();
        names.sort();
        names.dedup();

        let mut error = None;
        for name in &names {
            match open_collector(name) {
                Ok(socket) => self.collectors.push(socket),
                Err(e) => {
                    warn!("couldn't open connection to collector ({}), ignoring {}", e, name);
                    if error.is_none() {
                        error = Some(e);
                    }
                }
            }
        }

        let old_timeout = self.active_timeout;
        let timeout = options.active_timeout.unwrap_or(ACTIVE_TIMEOUT_DEFAULT);
        self.active_timeout = i64::from(timeout) * 1000;
        if old_timeout != self.active_timeout {
            self.reconfig_time = self.clock.msec();
        }

        match error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn n_collectors(&self) -> usize {
        self.collectors.len()
    }

    /// The datagram accumulated so far, empty if nothing is pending
    pub fn packet(&self) -> &[u8] {
        &self.packet
    }

    fn record_count(&self) -> u16 {
        if self.packet.len() < NETFLOW_V5_HEADER_LEN {
            0
        }
        else {
            NetworkEndian::read_u16(&self.packet[2..4])
        }
    }

    fn uptime(&self, time: i64) -> u32 {
        (time - self.boot_time).max(0) as u32
    }

    fn iface(&self, port: u16) -> u16 {
        if self.add_id_to_iface {
            let iface = u16::from(self.engine_id & 0x7f) << 9;
            iface | (port & 0x1ff)
        }
        else {
            port
        }
    }

    /// Reports the traffic `expired` saw since the flow's last report.
    /// Non-IP flows and flows without new packets are not reported.
    pub fn expire(&mut self, nf_flow: &mut NetflowFlow, expired: &Expired) {
        nf_flow.last_expired += self.active_timeout;

        if expired.flow.dl_type != ETH_TYPE_IP {
            return;
        }
        if expired.packet_count <= nf_flow.packet_count_off {
            if expired.packet_count < nf_flow.packet_count_off {
                debug!("flow counters went backwards, resynchronizing");
                nf_flow.packet_count_off = expired.packet_count;
                nf_flow.byte_count_off = expired.byte_count;
            }
            return;
        }

        if self.packet.is_empty() {
            let (unix_secs, unix_nsecs) = self.clock.wall();
            let header = NetflowV5Header {
                version: NETFLOW_V5_VERSION,
                count: 0,
                sysuptime: self.uptime(self.clock.msec()),
                unix_secs,
                unix_nsecs,
                flow_seq: self.netflow_cnt,
                engine_type: self.engine_type,
                engine_id: self.engine_id,
                sampling_interval: 0,
            };
            self.netflow_cnt = self.netflow_cnt.wrapping_add(1);
            self.packet.extend_from_slice(&header.to_bytes());
        }

        let count = self.record_count() + 1;
        NetworkEndian::write_u16(&mut self.packet[2..4], count);

        let flow = &expired.flow;
        let clamp = |delta: u64| delta.min(u64::from(u32::max_value())) as u32;
        let (src_port, dst_port) = if flow.nw_proto == IpProtocol::Icmp as u8 {
            let typ = flow.tp_src as u8;
            let code = flow.tp_dst as u8;
            (0, u16::from(typ) << 8 | u16::from(code))
        }
        else {
            (flow.tp_src, flow.tp_dst)
        };
        let record = NetflowV5Record {
            src_addr: flow.nw_src,
            dst_addr: flow.nw_dst,
            nexthop: 0,
            input: self.iface(flow.in_port),
            output: self.iface(nf_flow.output_iface),
            packet_count: clamp(expired.packet_count - nf_flow.packet_count_off),
            byte_count: clamp(expired.byte_count.saturating_sub(nf_flow.byte_count_off)),
            init_time: self.uptime(nf_flow.created),
            used_time: self.uptime(nf_flow.created.max(expired.used)),
            src_port,
            dst_port,
            tcp_flags: nf_flow.tcp_flags,
            ip_proto: flow.nw_proto,
            ip_tos: nf_flow.ip_tos,
        };
        self.packet.extend_from_slice(&record.to_bytes());

        nf_flow.created = 0;
        nf_flow.packet_count_off = expired.packet_count;
        nf_flow.byte_count_off = expired.byte_count;
        nf_flow.tcp_flags = 0;

        if count >= NETFLOW_V5_MAX_RECORDS {
            self.run();
        }
    }

    /// Sends the pending datagram to every collector and starts a new one
    pub fn run(&mut self) {
        if self.packet.is_empty() {
            return;
        }
        let mut failures = vec![];
        for socket in &self.collectors {
            if let Err(e) = socket.send(&self.packet) {
                failures.push(e);
            }
        }
        for e in &failures {
            self.send_failed(e);
        }
        self.packet.clear();
    }

    /// Logs a failed send, rate limited on this exporter's clock.
    /// Returns whether the failure was logged.
    fn send_failed(&mut self, e: &io::Error) -> bool {
        if !self.send_rl.allow_at(self.clock.msec()) {
            return false;
        }
        warn!("netflow message send failed: {}", e);
        true
    }

    /// Notes activity of a flow at time `used`
    pub fn flow_update_time(&self, nf_flow: &mut NetflowFlow, used: i64) {
        if nf_flow.created == 0 {
            nf_flow.created = used;
        }

        if self.active_timeout == 0
            || nf_flow.last_expired == 0
            || self.reconfig_time > nf_flow.last_expired
        {
            // keep the timer fresh, so no flood of expirations follows
            nf_flow.last_expired = self.clock.msec();
        }
    }

    pub fn flow_update_flags(&self, nf_flow: &mut NetflowFlow, ip_tos: u8, tcp_flags: u8) {
        nf_flow.update_flags(ip_tos, tcp_flags);
    }

    /// Whether the flow has been active for longer than the active timeout
    pub fn active_timeout_expired(&self, nf_flow: &NetflowFlow) -> bool {
        self.active_timeout != 0 && self.clock.msec() > nf_flow.last_expired + self.active_timeout
    }
}
