/*!
Userspace control-plane codecs for an OpenFlow switch.

The crate bundles three closely related pieces:

* the datapath flow protocol: a fixed-layout flow key, flow statistics and
  page-bounded action lists (`datapath`),
* an OpenFlow 1.0 flow specification compiler that turns
  `field=value,...,action=...` strings into wire matches and actions
  (`openflow::parse`), together with the matching formatters,
* a transaction driver that talks to a switch over a `Vconn` (`transact`)
  and a NetFlow v5 exporter (`netflow`).
*/

#[macro_use]
extern crate log;
extern crate ahash;
extern crate byteorder;
extern crate ini;
extern crate ipnetwork;
extern crate rand;

extern crate tls_api;
#[cfg(feature = "tls")]
extern crate tls_api_openssl;

#[macro_use]
pub mod vlog;

pub mod conf;
pub mod datapath;
pub mod flow;
pub mod flow_file;
pub mod hash;
pub mod netflow;
pub mod openflow;
pub mod packets;
pub mod time;
pub mod transact;
pub mod vconn;
