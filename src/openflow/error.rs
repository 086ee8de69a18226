use crate::openflow::messages::*;

use std::error;
use std::fmt;
use std::io;
use std::result;

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    BadRequest(OfpBadRequestCode, Vec<u8>),
}

impl error::Error for Error {
    fn description(&self) -> &str {
        "Deserialization error"
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref e) => write!(f, "{}", e),
            Error::BadRequest(code, ref bytes) => {
                write!(f, "malformed OpenFlow message ({:?}, {} bytes)", code, bytes.len())
            }
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            e => io::Error::new(io::ErrorKind::InvalidData, e.to_string()),
        }
    }
}

pub type Result<T> = result::Result<T, Error>;
