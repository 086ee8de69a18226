/*!
A parser for an INI file with the following structure:

```ini
[Connection]
uri=tcp:192.0.2.1:6633

; A passive TLS connection setup:
; uri=ptls:6633
; pkcs12=/etc/ofswitchctl.p12
; passwd=s3cr3t

[NetFlow]
collectors=192.0.2.9:2055 collector.example:9995
engine_type=0
engine_id=0
active_timeout=600
add_id_to_iface=false
```

Both sections are optional.
*/

use crate::netflow::NetflowOptions;
use crate::openflow::messages::{OFP_SSL_PORT, OFP_TCP_PORT};

use ini::ini;
use ini::Ini;

use std::error;
use std::fmt;
use std::fs::File;
use std::io;
use std::io::Read;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::str::FromStr;
use std::str::ParseBoolError;

#[cfg(feature = "tls")]
use tls_api::TlsAcceptorBuilder;

const CONN_SECTION: &str = "Connection";
const URI_KEY: &str = "uri";
const P12_KEY: &str = "pkcs12";
const PASS_KEY: &str = "passwd";

const NETFLOW_SECTION: &str = "NetFlow";
const COLLECTORS_KEY: &str = "collectors";
const ENGINE_TYPE_KEY: &str = "engine_type";
const ENGINE_ID_KEY: &str = "engine_id";
const ACTIVE_TIMEOUT_KEY: &str = "active_timeout";
const ADD_ID_KEY: &str = "add_id_to_iface";

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Ini(ini::Error),
    ParseInt(&'static str, ParseIntError),
    ParseBool(&'static str, ParseBoolError),
    MissingEntry(&'static str, &'static str),
    InvalidUri(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref e) => write!(f, "{}", e),
            Error::Ini(ref e) => write!(f, "{}", e),
            Error::ParseInt(k, ref e) => write!(f, "Error on trying to parse '{}': {}", k, e),
            Error::ParseBool(k, ref e) => write!(f, "Error on trying to parse '{}': {}", k, e),
            Error::MissingEntry(s, k) => {
                write!(f, "The INI [{}] section does not have a '{}' key", s, k)
            }
            Error::InvalidUri(ref uri) => write!(f, "The OpenFlow connection URI {} is invalid", uri),
        }
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(ioe) => ioe,
            _ => io::Error::new(io::ErrorKind::InvalidData, e),
        }
    }
}
impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl error::Error for Error {
    fn description(&self) -> &str {
        "INI configuration parser error"
    }
}

trait Section {
    type S;

    fn from_ini(conf: &Ini) -> Result<Self::S, Error>;
}

/// Where to find the switch
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Connect to host and port.
    Tcp(String, u16),
    /// Connect to a unix domain socket.
    #[cfg(unix)]
    Unix(PathBuf),
    /// Wait for the switch on a TCP port.
    PTcp(u16),
    /// Wait for the switch on a TCP port and talk TLS.
    PTls(u16),
}

impl Target {
    pub fn is_tls(&self) -> bool {
        match *self {
            Target::PTls(_) => true,
            _ => false,
        }
    }
}

fn parse_port(uri: &str, port: Option<&str>, default: u16) -> Result<u16, Error> {
    match port {
        None | Some("") => Ok(default),
        Some(p) => p.parse().map_err(|_| Error::InvalidUri(uri.to_owned())),
    }
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(uri: &str) -> Result<Target, Self::Err> {
        let mut split = uri.splitn(2, ':');
        let proto = split.next().unwrap_or("");
        let rest = split.next().ok_or_else(|| Error::InvalidUri(uri.to_owned()))?;

        let target = match proto {
            "tcp" => {
                // an IPv6 host has to be bracketed
                let (host, port) = match rest.rfind(':') {
                    Some(i) if !rest[i..].contains(']') => (&rest[..i], Some(&rest[i + 1..])),
                    _ => (rest, None),
                };
                let host = host.trim_start_matches('[').trim_end_matches(']');
                if host.is_empty() {
                    return Err(Error::InvalidUri(uri.to_owned()));
                }
                Target::Tcp(host.to_owned(), parse_port(uri, port, OFP_TCP_PORT)?)
            }
            #[cfg(unix)]
            "unix" if !rest.is_empty() => Target::Unix(PathBuf::from(rest)),
            "ptcp" => Target::PTcp(parse_port(uri, Some(rest), OFP_TCP_PORT)?),
            "ptls" => Target::PTls(parse_port(uri, Some(rest), OFP_SSL_PORT)?),
            _ => return Err(Error::InvalidUri(uri.to_owned())),
        };
        debug!("Got {:?}", target);
        Ok(target)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Target::Tcp(ref host, port) if host.contains(':') => write!(f, "tcp:[{}]:{}", host, port),
            Target::Tcp(ref host, port) => write!(f, "tcp:{}:{}", host, port),
            #[cfg(unix)]
            Target::Unix(ref path) => write!(f, "unix:{}", path.display()),
            Target::PTcp(port) => write!(f, "ptcp:{}", port),
            Target::PTls(port) => write!(f, "ptls:{}", port),
        }
    }
}

/// The `[Connection]` section
#[derive(Debug, Default)]
pub struct Connection {
    pub target: Option<Target>,
    pkcs12: Option<(Vec<u8>, String)>,
}

impl Connection {
    /// The target named on the command line wins over the configured one.
    /// `-` stands for the configured one.
    pub fn target(&self, name: Option<&str>) -> Result<Target, Error> {
        match name {
            Some(n) if n != "-" => Target::from_str(n),
            _ => self
                .target
                .clone()
                .ok_or(Error::MissingEntry(CONN_SECTION, URI_KEY)),
        }
    }

    pub fn has_identity(&self) -> bool {
        self.pkcs12.is_some()
    }

    #[cfg(feature = "tls")]
    pub fn tls_acceptor(&self) -> tls_api::Result<Option<tls_api_openssl::TlsAcceptor>> {
        Ok(match self.pkcs12 {
            Some(ref p12) => {
                Some(tls_api_openssl::TlsAcceptorBuilder::from_pkcs12(&p12.0, &p12.1)?.build()?)
            }
            _ => None,
        })
    }
}

impl Section for Connection {
    type S = Connection;

    fn from_ini(conf: &Ini) -> Result<Self::S, Error> {
        debug!("Reading [{}] section", CONN_SECTION);

        match conf.section(Some(CONN_SECTION.to_owned())) {
            Some(conn_section) => {
                let target = match conn_section.get(URI_KEY) {
                    Some(uri) => Some(Target::from_str(uri)?),
                    None => None,
                };
                let mut conn = Connection {
                    target,
                    pkcs12: None,
                };

                if let Some(path) = conn_section.get(P12_KEY) {
                    let mut p12 = vec![];
                    File::open(path)?.read_to_end(&mut p12)?;
                    let passwd = conn_section
                        .get(PASS_KEY)
                        .ok_or(Error::MissingEntry(CONN_SECTION, PASS_KEY))?;
                    conn.pkcs12 = Some((p12, passwd.to_owned()));
                }
                else if conn.target.as_ref().map_or(false, Target::is_tls) {
                    return Err(Error::MissingEntry(CONN_SECTION, P12_KEY));
                }
                Ok(conn)
            }
            _ => Ok(Connection::default()),
        }
    }
}

fn parse_int<T: FromStr<Err = ParseIntError>>(key: &'static str, value: &str) -> Result<T, Error> {
    value.parse().map_err(|e| Error::ParseInt(key, e))
}

impl Section for NetflowOptions {
    type S = NetflowOptions;

    fn from_ini(conf: &Ini) -> Result<Self::S, Error> {
        debug!("Reading [{}] section", NETFLOW_SECTION);

        let mut options = NetflowOptions::default();
        if let Some(section) = conf.section(Some(NETFLOW_SECTION.to_owned())) {
            if let Some(collectors) = section.get(COLLECTORS_KEY) {
                options.collectors = collectors
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|c| !c.is_empty())
                    .map(str::to_owned)
                    .collect();
            }
            if let Some(v) = section.get(ENGINE_TYPE_KEY) {
                options.engine_type = parse_int(ENGINE_TYPE_KEY, v)?;
            }
            if let Some(v) = section.get(ENGINE_ID_KEY) {
                options.engine_id = parse_int(ENGINE_ID_KEY, v)?;
            }
            if let Some(v) = section.get(ACTIVE_TIMEOUT_KEY) {
                options.active_timeout = Some(parse_int(ACTIVE_TIMEOUT_KEY, v)?);
            }
            if let Some(v) = section.get(ADD_ID_KEY) {
                options.add_id_to_iface = v.parse().map_err(|e| Error::ParseBool(ADD_ID_KEY, e))?;
            }
        }

        debug!("Got {:?}", options);
        Ok(options)
    }
}

/// Everything the INI file configures
#[derive(Debug, Default)]
pub struct Conf {
    pub connection: Connection,
    pub netflow: NetflowOptions,
}

impl Conf {
    fn from_ini(conf: &Ini) -> Result<Conf, Error> {
        Ok(Conf {
            connection: Connection::from_ini(conf)?,
            netflow: NetflowOptions::from_ini(conf)?,
        })
    }
}

pub fn parse_file(path: &str) -> Result<Conf, Error> {
    info!("Reading INI file {}", path);

    let conf = match Ini::load_from_file(path) {
        Ok(i) => i,
        Err(e) => {
            return Err(Error::Ini(e));
        }
    };
    Conf::from_ini(&conf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(text: &str) -> Result<Conf, Error> {
        Conf::from_ini(&Ini::load_from_str(text).unwrap())
    }

    #[test]
    fn targets() {
        let cases = vec![
            ("tcp:192.0.2.1", Target::Tcp("192.0.2.1".to_owned(), 6633)),
            ("tcp:192.0.2.1:6653", Target::Tcp("192.0.2.1".to_owned(), 6653)),
            ("tcp:[2001:db8::1]:1", Target::Tcp("2001:db8::1".to_owned(), 1)),
            ("tcp:[2001:db8::1]", Target::Tcp("2001:db8::1".to_owned(), 6633)),
            ("ptcp:", Target::PTcp(6633)),
            ("ptcp:7000", Target::PTcp(7000)),
            ("ptls:7001", Target::PTls(7001)),
        ];
        for (uri, expected) in cases {
            assert_eq!(expected, Target::from_str(uri).unwrap());
        }
    }

    #[cfg(unix)]
    #[test]
    fn unix_target() {
        let expected = Target::Unix(PathBuf::from("/var/run/br0.mgmt"));
        let testee = Target::from_str("unix:/var/run/br0.mgmt").unwrap();
        assert_eq!(expected, testee);
        assert_eq!("unix:/var/run/br0.mgmt", testee.to_string());
    }

    #[test]
    fn invalid_targets() {
        for uri in &["tcp", "tcp:", "tcp:host:port", "udp:1.2.3.4", "ptcp:70000", "br0"] {
            assert!(Target::from_str(uri).is_err(), "{}", uri);
        }
    }

    #[test]
    fn display_round_trip() {
        for uri in &["tcp:192.0.2.1:6633", "tcp:[2001:db8::1]:1", "ptcp:6633", "ptls:1"] {
            assert_eq!(*uri, Target::from_str(uri).unwrap().to_string());
        }
    }

    #[test]
    fn empty_file() {
        let testee = load("").unwrap();
        assert_eq!(None, testee.connection.target);
        assert_eq!(NetflowOptions::default(), testee.netflow);
        assert!(testee.connection.target(None).is_err());
    }

    #[test]
    fn command_line_wins() {
        let testee = load("[Connection]\nuri=tcp:192.0.2.1\n").unwrap();
        assert_eq!(
            Target::PTcp(1),
            testee.connection.target(Some("ptcp:1")).unwrap()
        );
        assert_eq!(
            Target::Tcp("192.0.2.1".to_owned(), 6633),
            testee.connection.target(Some("-")).unwrap()
        );
    }

    #[test]
    fn tls_needs_identity() {
        match load("[Connection]\nuri=ptls:6633\n") {
            Err(Error::MissingEntry(CONN_SECTION, P12_KEY)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn netflow_section() {
        let testee = load(
            "[NetFlow]\ncollectors=192.0.2.9:2055, c.example:9995\nengine_type=2\n\
             engine_id=3\nactive_timeout=30\nadd_id_to_iface=true\n",
        )
        .unwrap();
        let expected = NetflowOptions {
            collectors: vec!["192.0.2.9:2055".to_owned(), "c.example:9995".to_owned()],
            engine_type: 2,
            engine_id: 3,
            active_timeout: Some(30),
            add_id_to_iface: true,
        };
        assert_eq!(expected, testee.netflow);
    }

    #[test]
    fn netflow_bad_number() {
        match load("[NetFlow]\nengine_id=300\n") {
            Err(Error::ParseInt(ENGINE_ID_KEY, _)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }
}
