/*!
Feeds polled OpenFlow flow statistics into the NetFlow exporter.

Flows are tracked by their datapath key. A flow is reported when its
active timeout expires and once more when it disappears from the table.
*/

use ofswitchctl::datapath::format::format_flow;
use ofswitchctl::datapath::{ActionList, DpAction, DpFlow, FlowKey, FlowStats};
use ofswitchctl::flow::Flow;
use ofswitchctl::netflow::{Clock, Expired, Netflow, NetflowFlow};
use ofswitchctl::netflow::{NF_OUT_DROP, NF_OUT_FLOOD, NF_OUT_MULTI};
use ofswitchctl::openflow::messages::*;

use std::collections::HashMap;

/// The NetFlow output interface of an action list
pub fn output_iface(actions: &[OfpAction]) -> u16 {
    let mut iface = NF_OUT_DROP;
    for action in actions {
        if let OfpAction::Output { port, .. } = *action {
            let out = match port {
                OFPP_FLOOD | OFPP_ALL => NF_OUT_FLOOD,
                p if p < OFPP_MAX || p == OFPP_IN_PORT || p == OFPP_LOCAL => p,
                _ => continue,
            };
            iface = match iface {
                NF_OUT_DROP => out,
                NF_OUT_FLOOD => NF_OUT_FLOOD,
                _ if out == NF_OUT_FLOOD => NF_OUT_FLOOD,
                _ => NF_OUT_MULTI,
            };
        }
    }
    iface
}

/// One flow's state as seen in the latest poll
#[derive(Debug, Clone)]
struct Sample {
    flow: Flow,
    packet_count: u64,
    byte_count: u64,
    output_iface: u16,
}

#[derive(Debug)]
struct Tracked {
    flow: Flow,
    nf_flow: NetflowFlow,
    packet_count: u64,
    byte_count: u64,
    used: i64,
}

impl Tracked {
    fn expired(&self) -> Expired {
        Expired {
            flow: self.flow,
            packet_count: self.packet_count,
            byte_count: self.byte_count,
            used: self.used,
        }
    }
}

pub struct FlowMonitor<C> {
    netflow: Netflow<C>,
    flows: HashMap<FlowKey, Tracked>,
}

impl<C: Clock> FlowMonitor<C> {
    pub fn new(netflow: Netflow<C>) -> FlowMonitor<C> {
        FlowMonitor {
            netflow,
            flows: HashMap::new(),
        }
    }

    pub fn netflow(&self) -> &Netflow<C> {
        &self.netflow
    }

    pub fn n_flows(&self) -> usize {
        self.flows.len()
    }

    /// Flow entries whose match fields coincide share one key,
    /// their counters are added up.
    fn samples(stats: &[OfpFlowStats], now: i64) -> HashMap<FlowKey, Sample> {
        let mut samples: HashMap<FlowKey, Sample> = HashMap::new();
        for fs in stats {
            let flow = Flow::from_match(&fs.match_field, false, 0);
            let key = FlowKey::from_flow(&flow);
            trace!("{}", format_flow(&dp_flow(key, fs), now));

            let iface = output_iface(&fs.actions);
            let sample = samples.entry(key).or_insert_with(|| Sample {
                flow,
                packet_count: 0,
                byte_count: 0,
                output_iface: iface,
            });
            sample.packet_count += fs.packet_count;
            sample.byte_count += fs.byte_count;
            if sample.output_iface != iface {
                sample.output_iface = NF_OUT_MULTI;
            }
        }
        samples
    }

    /// Processes one complete dump of the flow table taken at `now`
    pub fn poll(&mut self, stats: &[OfpFlowStats], now: i64) {
        let samples = FlowMonitor::<C>::samples(stats, now);

        for (key, sample) in &samples {
            let tracked = self.flows.entry(*key).or_insert_with(|| Tracked {
                flow: sample.flow,
                nf_flow: NetflowFlow::default(),
                packet_count: 0,
                byte_count: 0,
                used: 0,
            });
            tracked.nf_flow.output_iface = sample.output_iface;
            if sample.packet_count != tracked.packet_count {
                tracked.used = now;
                self.netflow.flow_update_time(&mut tracked.nf_flow, now);
                self.netflow
                    .flow_update_flags(&mut tracked.nf_flow, sample.flow.nw_tos, 0);
            }
            tracked.packet_count = sample.packet_count;
            tracked.byte_count = sample.byte_count;

            if self.netflow.active_timeout_expired(&tracked.nf_flow) {
                let expired = tracked.expired();
                self.netflow.expire(&mut tracked.nf_flow, &expired);
            }
        }

        let gone: Vec<FlowKey> = self
            .flows
            .keys()
            .filter(|k| !samples.contains_key(*k))
            .cloned()
            .collect();
        for key in gone {
            if let Some(mut tracked) = self.flows.remove(&key) {
                debug!("flow {} was removed", key);
                let expired = tracked.expired();
                self.netflow.expire(&mut tracked.nf_flow, &expired);
            }
        }
    }

    /// Sends what the last polls produced
    pub fn run(&mut self) {
        self.netflow.run();
    }
}

/// The datapath view of a flow entry, for tracing
fn dp_flow(key: FlowKey, fs: &OfpFlowStats) -> DpFlow {
    let mut actions = ActionList::new();
    for action in fs.actions.iter().filter_map(DpAction::from_ofp) {
        actions.add(action);
    }
    DpFlow {
        stats: FlowStats {
            n_packets: fs.packet_count,
            n_bytes: fs.byte_count,
            ..FlowStats::default()
        },
        key,
        actions,
    }
}
