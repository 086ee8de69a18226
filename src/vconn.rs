/*!
Connections that carry whole OpenFlow messages.

Connection names follow the usual forms:

* `tcp:host[:port]` connects to a switch listening on TCP,
* `unix:path` connects to a switch's unix domain socket,
* `ptcp:[port]` waits for one switch to connect,
* `ptls:[port]` is the same over TLS (needs the `tls` feature).
*/

use crate::conf::{Connection, Target};
use crate::openflow::gen_xid;
use crate::openflow::messages::*;
use crate::transact::{Error, Result};

use std::io;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
#[cfg(unix)]
use std::os::unix::net::UnixStream;

use tls_api;
#[cfg(feature = "tls")]
use tls_api::TlsAcceptor;
use tls_api::TlsStream;

/// A message oriented connection to a switch
pub trait Vconn {
    /// Sends one complete message
    fn send(&mut self, msg: &[u8]) -> Result<()>;

    /// Blocks until one complete message has been received
    fn recv(&mut self) -> Result<Vec<u8>>;
}

#[derive(Debug)]
pub enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
    Tls(TlsStream<TcpStream>),
}

impl Stream {
    fn accept(connection: &Connection, stream: TcpStream, tls: bool) -> Result<Stream> {
        if tls {
            if !connection.has_identity() {
                return Err(Error::Tls(tls_api::Error::new_other(
                    "no TLS identity configured",
                )));
            }
            #[cfg(feature = "tls")]
            {
                if let Some(acc) = connection.tls_acceptor()? {
                    return match acc.accept(stream) {
                        Ok(s) => Ok(Stream::Tls(s)),
                        Err(tls_api::HandshakeError::Failure(e)) => Err(Error::Tls(e)),
                        Err(tls_api::HandshakeError::Interrupted(_)) => Err(Error::Tls(
                            tls_api::Error::new_other("TLS stream was interrupted"),
                        )),
                    };
                }
            }
            return Err(Error::Tls(tls_api::Error::new_other(
                "TLS support is not compiled in",
            )));
        }
        Ok(Stream::Tcp(stream))
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match *self {
            Stream::Tcp(ref mut s) => s.read(buf),
            #[cfg(unix)]
            Stream::Unix(ref mut s) => s.read(buf),
            Stream::Tls(ref mut s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match *self {
            Stream::Tcp(ref mut s) => s.write(buf),
            #[cfg(unix)]
            Stream::Unix(ref mut s) => s.write(buf),
            Stream::Tls(ref mut s) => s.write(buf),
        }
    }
    fn flush(&mut self) -> io::Result<()> {
        match *self {
            Stream::Tcp(ref mut s) => s.flush(),
            #[cfg(unix)]
            Stream::Unix(ref mut s) => s.flush(),
            Stream::Tls(ref mut s) => s.flush(),
        }
    }
}

/// Frames OpenFlow messages on a byte stream by their header's length field
#[derive(Debug)]
pub struct StreamVconn<S> {
    stream: S,
    name: String,
}

impl<S: Read + Write> StreamVconn<S> {
    pub fn new(stream: S, name: &str) -> StreamVconn<S> {
        StreamVconn {
            stream,
            name: name.to_owned(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Exchanges HELLO messages. Fails if the peer is older than us
    /// or starts with anything but a HELLO.
    pub fn handshake(&mut self) -> Result<()> {
        let hello = OfpHeader::new(OfpType::Hello, gen_xid());
        self.send(&hello.to_bytes())?;

        let msg = self.recv()?;
        let header = OfpHeader::of_message(&msg)?;
        if header.typ() != OfpType::Hello as u8 {
            return Err(Error::NoHello(header.typ()));
        }
        // simple version discovery
        if header.version() < OFP_VERSION {
            return Err(Error::HelloFailed(header.version()));
        }
        debug!("{}: negotiated OpenFlow version {:#04x}", self.name, OFP_VERSION);
        Ok(())
    }
}

impl<S: Read + Write> Vconn for StreamVconn<S> {
    fn send(&mut self, msg: &[u8]) -> Result<()> {
        if let Ok(header) = OfpHeader::of_message(msg) {
            debug!("Outgoing message: {:?}", header);
        }
        self.stream.write_all(msg)?;
        self.stream.flush()?;
        Ok(())
    }

    fn recv(&mut self) -> Result<Vec<u8>> {
        let mut buf = [0; 8];
        self.stream.read_exact(&mut buf)?;
        let header = OfpHeader::deserialize(&buf);
        trace!("Incoming message: {:?}", header);
        if (header.length() as usize) < OfpHeader::header_length() {
            return Err(Error::ShortMessage(header.length()));
        }

        let mut msg = Vec::with_capacity(header.length() as usize);
        msg.extend_from_slice(&buf);
        msg.resize(header.length() as usize, 0);
        self.stream.read_exact(&mut msg[OfpHeader::header_length()..])?;
        Ok(msg)
    }
}

/// Opens the connection `target` names and exchanges HELLOs.
/// Passive targets wait for exactly one switch.
pub fn open(target: &Target, connection: &Connection) -> Result<StreamVconn<Stream>> {
    let name = target.to_string();
    let stream = match *target {
        Target::Tcp(ref host, port) => {
            let stream = TcpStream::connect((host.as_str(), port))?;
            stream.set_nodelay(true)?;
            Stream::Tcp(stream)
        }
        #[cfg(unix)]
        Target::Unix(ref path) => Stream::Unix(UnixStream::connect(path)?),
        Target::PTcp(port) | Target::PTls(port) => {
            let listener = TcpListener::bind(("0.0.0.0", port))?;
            info!("Listening on {}", listener.local_addr()?);
            let (stream, peer) = listener.accept()?;
            info!("Accepted connection from {}", peer);
            Stream::accept(connection, stream, target.is_tls())?
        }
    };
    let mut vconn = StreamVconn::new(stream, &name);
    vconn.handshake()?;
    Ok(vconn)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    /// Reads canned input, collects output
    struct Pipe {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Pipe {
        fn new(input: Vec<u8>) -> Pipe {
            Pipe {
                input: Cursor::new(input),
                output: vec![],
            }
        }
    }

    impl Read for Pipe {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Pipe {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn frames_messages() {
        let mut input = vec![1, 2, 0, 10, 0, 0, 0, 1, 0xaa, 0xbb];
        input.extend_from_slice(&[1, 3, 0, 8, 0, 0, 0, 2]);
        let mut testee = StreamVconn::new(Pipe::new(input), "test");
        assert_eq!(vec![1, 2, 0, 10, 0, 0, 0, 1, 0xaa, 0xbb], testee.recv().unwrap());
        assert_eq!(vec![1, 3, 0, 8, 0, 0, 0, 2], testee.recv().unwrap());
        assert!(testee.recv().is_err());
    }

    #[test]
    fn short_length_field() {
        let mut testee = StreamVconn::new(Pipe::new(vec![1, 2, 0, 4, 0, 0, 0, 1]), "test");
        match testee.recv() {
            Err(Error::ShortMessage(4)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn truncated_body() {
        let mut testee = StreamVconn::new(Pipe::new(vec![1, 2, 0, 12, 0, 0, 0, 1, 0]), "test");
        assert!(testee.recv().is_err());
    }

    #[test]
    fn handshake() {
        let mut testee = StreamVconn::new(Pipe::new(vec![1, 0, 0, 8, 0, 0, 0, 9]), "test");
        testee.handshake().unwrap();
        assert_eq!(8, testee.stream.output.len());
        assert_eq!(&[1, 0, 0, 8], &testee.stream.output[..4]);
    }

    #[test]
    fn handshake_old_peer() {
        let mut testee = StreamVconn::new(Pipe::new(vec![0, 0, 0, 8, 0, 0, 0, 9]), "test");
        match testee.handshake() {
            Err(Error::HelloFailed(0)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn handshake_without_hello() {
        let mut testee = StreamVconn::new(Pipe::new(vec![1, 2, 0, 8, 0, 0, 0, 9]), "test");
        match testee.handshake() {
            Err(Error::NoHello(2)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }
}
