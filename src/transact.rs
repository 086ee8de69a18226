/*!
Request/reply correlation on top of a `Vconn`.

A request is sent with a transaction id and the replies carrying that id
are picked from the connection. Anything else arriving in between is
dropped. Statistics requests are answered by a sequence of replies that
ends with the first one lacking the "more" flag.
*/

use crate::openflow;
use crate::openflow::messages::deserialize::Deserialize;
use crate::openflow::messages::serialize::{update_length, OfpPacket};
use crate::openflow::messages::*;
use crate::vconn::Vconn;
use crate::vlog::RateLimit;

use std::error;
use std::fmt;
use std::io;
use std::result;

use tls_api;

/// Size of a statistics reply without its body
const STATS_REPLY_HEADER_LEN: usize = 12;

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    OpenFlow(openflow::error::Error),
    Tls(tls_api::Error),
    /// The connection URI cannot be used.
    InvalidUri(String),
    /// The peer only speaks an older OpenFlow version.
    HelloFailed(u8),
    /// The peer's first message was not a HELLO.
    NoHello(u8),
    /// A message header announced less than a header's length.
    ShortMessage(u16),
    /// A matching reply too short to be a statistics reply.
    ShortReply(usize),
    /// The switch answered with an OpenFlow error.
    Switch(OfpErrorMsg),
    /// The echo reply's size differs from the request's.
    ProbeMismatch { sent: usize, received: usize },
    /// The echo reply does not carry the request's payload.
    EchoMismatch,
}

impl error::Error for Error {
    fn description(&self) -> &str {
        "OpenFlow transaction error"
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref e) => write!(f, "{}", e),
            Error::OpenFlow(ref e) => write!(f, "{}", e),
            Error::Tls(ref e) => write!(f, "TLS error: {}", e),
            Error::InvalidUri(ref uri) => write!(f, "{}: unknown or unsupported connection", uri),
            Error::HelloFailed(v) => {
                write!(f, "peer supports OpenFlow version {:#04x} only, need {:#04x}", v, OFP_VERSION)
            }
            Error::NoHello(t) => write!(f, "expected HELLO, received message type {}", t),
            Error::ShortMessage(len) => write!(f, "received message with length {} < 8", len),
            Error::ShortReply(len) => write!(f, "received too-short reply ({} bytes)", len),
            Error::Switch(ref msg) => write!(f, "{}", msg),
            Error::ProbeMismatch { sent, received } => write!(
                f,
                "received reply of {} bytes to a request of {} bytes",
                received, sent
            ),
            Error::EchoMismatch => write!(f, "reply does not match request"),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<openflow::error::Error> for Error {
    fn from(e: openflow::error::Error) -> Self {
        Error::OpenFlow(e)
    }
}

impl From<tls_api::Error> for Error {
    fn from(e: tls_api::Error) -> Self {
        Error::Tls(e)
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            e => io::Error::new(io::ErrorKind::Other, e.to_string()),
        }
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Drives transactions over one connection
pub struct Transactor<V> {
    vconn: V,
    discard_rl: RateLimit,
}

impl<V: Vconn> Transactor<V> {
    pub fn new(vconn: V) -> Transactor<V> {
        Transactor {
            vconn,
            discard_rl: RateLimit::new(60, 20),
        }
    }

    pub fn into_inner(self) -> V {
        self.vconn
    }

    /// Sends a complete message after fixing up its length field
    pub fn send(&mut self, mut request: Vec<u8>) -> Result<()> {
        update_length(&mut request);
        self.vconn.send(&request)
    }

    /// Receives until a message with the given transaction id shows up
    pub fn recv_xid(&mut self, xid: u32) -> Result<Vec<u8>> {
        loop {
            let reply = self.vconn.recv()?;
            let header = OfpHeader::of_message(&reply)?;
            if header.xid() == xid {
                return Ok(reply);
            }
            debug_rl!(
                self.discard_rl,
                "received reply with xid {:08x} != expected {:08x}",
                header.xid(),
                xid
            );
        }
    }

    /// Sends `request` and returns the first reply that belongs to it
    pub fn transact(&mut self, request: Vec<u8>) -> Result<Vec<u8>> {
        let xid = OfpHeader::of_message(&request)?.xid();
        self.send(request)?;
        self.recv_xid(xid)
    }

    /// Sends a statistics request and hands every reply of it to `on_reply`,
    /// until the switch signals that no more replies follow.
    pub fn stats_transact<F>(&mut self, request: Vec<u8>, mut on_reply: F) -> Result<()>
    where
        F: FnMut(&[u8]),
    {
        let xid = OfpHeader::of_message(&request)?.xid();
        self.send(request)?;
        loop {
            let reply = self.recv_xid(xid)?;
            if reply.len() < STATS_REPLY_HEADER_LEN {
                return Err(Error::ShortReply(reply.len()));
            }
            let header = OfpHeader::of_message(&reply)?;
            let typ = header.typ();
            if typ == OfpType::Error as u8 {
                let msg = OfpErrorMsg::deserialize(reply[OfpHeader::header_length()..].to_vec())?;
                return Err(Error::Switch(msg));
            }
            on_reply(&reply);
            if typ == OfpType::StatsReply as u8 {
                let stats = OfpStatsReply::deserialize(reply[OfpHeader::header_length()..].to_vec())?;
                if !stats.more() {
                    return Ok(());
                }
            }
            else {
                debug!("ignoring reply of type {} to a statistics request", typ);
            }
        }
    }

    /// Sends an empty echo request and checks the reply's size
    pub fn probe(&mut self) -> Result<Vec<u8>> {
        let request = OfpHeader::request(OfpType::EchoRequest);
        let sent = request.len();
        let reply = self.transact(request)?;
        if reply.len() != sent {
            return Err(Error::ProbeMismatch {
                sent,
                received: reply.len(),
            });
        }
        Ok(reply)
    }

    /// Sends an echo request with `payload` and checks that it comes back
    pub fn ping(&mut self, payload: Vec<u8>) -> Result<Vec<u8>> {
        let request = {
            let echo = OfpEchoRequest::new(payload);
            let mut buf = vec![];
            echo.serialize(&mut buf, openflow::gen_xid())?;
            buf
        };
        let reply = self.transact(request.clone())?;
        let header = OfpHeader::of_message(&reply)?;
        if header.typ() != OfpType::EchoReply as u8
            || reply[OfpHeader::header_length()..] != request[OfpHeader::header_length()..]
        {
            return Err(Error::EchoMismatch);
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;

    struct MockVconn {
        sent: Vec<Vec<u8>>,
        replies: VecDeque<Vec<u8>>,
    }

    impl MockVconn {
        fn new(replies: Vec<Vec<u8>>) -> MockVconn {
            MockVconn {
                sent: vec![],
                replies: replies.into_iter().collect(),
            }
        }
    }

    impl Vconn for MockVconn {
        fn send(&mut self, msg: &[u8]) -> Result<()> {
            self.sent.push(msg.to_vec());
            Ok(())
        }

        fn recv(&mut self) -> Result<Vec<u8>> {
            self.replies
                .pop_front()
                .ok_or_else(|| Error::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "closed")))
        }
    }

    fn stats_reply(xid: u32, more: bool) -> Vec<u8> {
        let mut msg = OfpHeader::new(OfpType::StatsReply, xid).to_bytes().to_vec();
        msg.extend_from_slice(&[0, 1, 0, more as u8]);
        update_length(&mut msg);
        msg
    }

    fn flow_stats_request(xid: u32) -> Vec<u8> {
        let request = OfpStatsRequest::Flow(OfpFlowStatsRequest {
            match_field: OfpMatch::new(),
            table_id: 0xff,
            out_port: OFPP_NONE,
        });
        let mut buf = vec![];
        request.serialize(&mut buf, xid).unwrap();
        buf
    }

    #[test]
    fn stats_drains_all_parts() {
        let replies = vec![
            stats_reply(7, true),
            stats_reply(8, false),
            stats_reply(7, true),
            stats_reply(7, false),
            stats_reply(7, false),
        ];
        let mut testee = Transactor::new(MockVconn::new(replies));
        let mut seen = vec![];
        testee
            .stats_transact(flow_stats_request(7), |r| seen.push(r.to_vec()))
            .unwrap();
        assert_eq!(3, seen.len());
        assert!(seen.iter().all(|r| OfpHeader::of_message(r).unwrap().xid() == 7));
        let vconn = testee.into_inner();
        assert_eq!(1, vconn.sent.len());
        assert_eq!(1, vconn.replies.len());
    }

    #[test]
    fn short_stats_reply() {
        let short = OfpHeader::new(OfpType::StatsReply, 3).to_bytes().to_vec();
        let mut testee = Transactor::new(MockVconn::new(vec![short]));
        match testee.stats_transact(flow_stats_request(3), |_| {}) {
            Err(Error::ShortReply(8)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn switch_error() {
        let mut msg = OfpHeader::new(OfpType::Error, 5).to_bytes().to_vec();
        msg.extend_from_slice(&[0, 1, 0, 2]);
        update_length(&mut msg);
        let mut testee = Transactor::new(MockVconn::new(vec![msg]));
        match testee.stats_transact(flow_stats_request(5), |_| {}) {
            Err(Error::Switch(e)) => assert_eq!(2, e.code()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn connection_closed() {
        let mut testee = Transactor::new(MockVconn::new(vec![]));
        assert!(testee.transact(OfpHeader::request(OfpType::FeaturesRequest)).is_err());
    }

    #[test]
    fn transact_skips_other_xids() {
        let request = OfpHeader::new(OfpType::FeaturesRequest, 11).to_bytes().to_vec();
        let expected = OfpHeader::new(OfpType::FeaturesReply, 11).to_bytes().to_vec();
        let other = OfpHeader::new(OfpType::EchoRequest, 12).to_bytes().to_vec();
        let mut testee = Transactor::new(MockVconn::new(vec![other, expected.clone()]));
        assert_eq!(expected, testee.transact(request).unwrap());
    }

    #[test]
    fn probe_size_mismatch() {
        let mut testee = Transactor::new(EchoVconn::new(4));
        match testee.probe() {
            Err(Error::ProbeMismatch { sent: 8, received: 12 }) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn ping_echoes_payload() {
        let mut testee = Transactor::new(EchoVconn::new(0));
        let reply = testee.ping(vec![1, 2, 3, 4]).unwrap();
        assert_eq!(12, reply.len());
        assert_eq!(&[1, 2, 3, 4], &reply[8..]);
    }

    /// Answers every echo request, padded with `extra` zero bytes
    struct EchoVconn {
        extra: usize,
        pending: VecDeque<Vec<u8>>,
    }

    impl EchoVconn {
        fn new(extra: usize) -> EchoVconn {
            EchoVconn {
                extra,
                pending: VecDeque::new(),
            }
        }
    }

    impl Vconn for EchoVconn {
        fn send(&mut self, msg: &[u8]) -> Result<()> {
            let mut reply = msg.to_vec();
            reply[1] = OfpType::EchoReply as u8;
            reply.extend(vec![0; self.extra]);
            update_length(&mut reply);
            self.pending.push_back(reply);
            Ok(())
        }

        fn recv(&mut self) -> Result<Vec<u8>> {
            self.pending
                .pop_front()
                .ok_or_else(|| Error::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "closed")))
        }
    }
}
