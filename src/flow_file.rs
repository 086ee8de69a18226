/*!
A reader for files with one flow per line, as consumed by `add-flows`.

# Syntax

Everything behind a `#` is a comment. Lines that are empty after
removing the comment are ignored. Every other line is a flow in the
usual flow syntax, actions included, e.g.

```text
# web traffic goes to port 2
priority=100,tcp,tp_dst=80,actions=output:2
table=1,in_port=3,idle_timeout=0,actions=drop
```
*/

use crate::openflow::parse;
use crate::openflow::parse::{str_to_flow, FlowParts, ParsedFlow};

use std::error;
use std::fmt;
use std::fs::File;
use std::io;
use std::io::prelude::*;

/// The char introducing a line comment.
const COMMENT: char = '#';

/// Represents all errors that can occur while reading a flow file
#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    /// A line does not compile. Line numbers start at 1.
    Flow(usize, parse::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref e) => write!(f, "{}", e),
            Error::Flow(line, ref e) => write!(f, "line {}: {}", line, e),
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
            e => io::Error::new(io::ErrorKind::InvalidData, e),
        }
    }
}

impl error::Error for Error {
    fn description(&self) -> &str {
        "flow file parser error"
    }
}

/// The flows of an add-flows file.
/// Out ports are not part of a flow addition, so they are not parsed.
fn flow_parts() -> FlowParts {
    FlowParts {
        out_port: false,
        ..FlowParts::all()
    }
}

/// Parses one line. `None` for lines without a flow.
fn parse_line(line: &str) -> Result<Option<ParsedFlow>, parse::Error> {
    let text = match line.find(COMMENT) {
        Some(i) => &line[..i],
        None => line,
    };
    if text.trim().is_empty() {
        return Ok(None);
    }
    let flow = str_to_flow(text, flow_parts())?;
    debug!("Got {:?}", flow);
    Ok(Some(flow))
}

/// Parses every line of `reader`
pub fn parse<R: BufRead>(reader: R) -> Result<Vec<ParsedFlow>, Error> {
    let mut flows = vec![];
    for (i, line_res) in reader.lines().enumerate() {
        let line = line_res?;
        if let Some(flow) = parse_line(&line).map_err(|e| Error::Flow(i + 1, e))? {
            flows.push(flow);
        }
    }
    Ok(flows)
}

/// Parses a flow file and returns its flows in file order
pub fn parse_file(path: &str) -> Result<Vec<ParsedFlow>, Error> {
    info!("Reading flow file {}", path);

    let file = File::open(path).map_err(|e| {
        io::Error::new(e.kind(), format!("Unable to open `{:?}`: {}", path, e))
    })?;
    parse(io::BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openflow::messages::*;

    #[test]
    fn comments_and_blank_lines() {
        let text = "# header\n\n   \t\nin_port=1,actions=output:2 # trailing\n#in_port=2\n";
        let testee = parse(text.as_bytes()).unwrap();
        assert_eq!(1, testee.len());
        assert_eq!(1, testee[0].match_field.in_port);
        assert_eq!(
            vec![OfpAction::Output {
                port: 2,
                max_len: 0
            }],
            testee[0].actions
        );
    }

    #[test]
    fn side_channels() {
        let text = "table=3,priority=7,idle_timeout=0,hard_timeout=9,cookie=0x10,actions=drop\n";
        let testee = parse(text.as_bytes()).unwrap();
        let flow = &testee[0];
        assert_eq!(3, flow.table_idx);
        assert_eq!(7, flow.priority);
        assert_eq!(0, flow.idle_timeout);
        assert_eq!(9, flow.hard_timeout);
        assert_eq!(0x10, flow.cookie);
        assert!(flow.actions.is_empty());
    }

    #[test]
    fn keeps_file_order() {
        let text = "tp_dst=1,actions=drop\ntp_dst=2,actions=drop\n";
        let testee = parse(text.as_bytes()).unwrap();
        assert_eq!(1, testee[0].match_field.tp_dst);
        assert_eq!(2, testee[1].match_field.tp_dst);
    }

    #[test]
    fn error_with_line_number() {
        let text = "actions=drop\n\nin_port=1\n";
        match parse(text.as_bytes()) {
            Err(Error::Flow(3, parse::Error::MissingAction)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn out_port_is_no_keyword() {
        let text = "out_port=1,actions=drop\n";
        match parse(text.as_bytes()) {
            Err(Error::Flow(1, parse::Error::UnknownKeyword(ref k))) => assert_eq!("out_port", k),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn missing_file() {
        assert!(parse_file("/nonexistent/flows.txt").is_err());
    }
}
