/*!
The OpenFlow 1.0 side of the switch: wire messages, the flow text
compiler and the human readable printers.
*/

pub mod error;
pub mod messages;
pub mod parse;
pub mod print;

use rand;

/// Picks a random transaction id for an outgoing request
pub fn gen_xid() -> u32 {
    let xid = rand::random();
    trace!("Using xid {} for the outgoing message", xid);
    xid
}
