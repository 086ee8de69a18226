/*!
Administers one OpenFlow 1.0 switch from the command line.

Besides querying and modifying the switch's flow tables the tool compiles
flow texts offline and exports NetFlow v5 records of the switch's flows.

```sh
$ ofswitchctl dump-flows tcp:192.0.2.1 "tcp,tp_dst=80"
$ ofswitchctl add-flows tcp:192.0.2.1 flows.txt
$ ofswitchctl parse-flow "in_port=1,actions=mod_vlan_vid:5,output:2"
$ ofswitchctl -c /etc/ofswitchctl.ini netflow -
```

A switch named `-` is the one the INI file's `[Connection] uri` names.
*/

#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;
extern crate ofswitchctl;
extern crate rand;
extern crate simple_logger;

#[cfg(unix)]
extern crate libc;
#[cfg(unix)]
extern crate log_panics;
#[cfg(unix)]
extern crate syslog;

mod monitor;

use crate::monitor::FlowMonitor;

use ofswitchctl::conf;
use ofswitchctl::conf::Conf;
use ofswitchctl::datapath::format::format_flow;
use ofswitchctl::datapath::{ActionList, DpAction, DpFlow, FlowKey, FlowStats};
use ofswitchctl::flow::Flow;
use ofswitchctl::flow_file;
use ofswitchctl::netflow::{Netflow, SystemClock};
use ofswitchctl::openflow::messages::deserialize::Deserialize;
use ofswitchctl::openflow::messages::serialize::OfpPacket;
use ofswitchctl::openflow::messages::*;
use ofswitchctl::openflow::parse::{str_to_flow, str_to_u16, FlowParts, ParsedFlow};
use ofswitchctl::openflow::print::*;
use ofswitchctl::time::time_msec;
use ofswitchctl::transact;
use ofswitchctl::transact::Transactor;
use ofswitchctl::vconn;
use ofswitchctl::vconn::{Stream, StreamVconn};

use clap::{AppSettings, ArgMatches, SubCommand};

use std::io;
use std::process::exit;
use std::thread;
use std::time::{Duration, Instant};

type Switch = Transactor<StreamVconn<Stream>>;

const PING_COUNT: usize = 10;
const PING_PAYLOAD_DEFAULT: usize = 64;
/// Seconds between two flow table polls
const NETFLOW_INTERVAL_DEFAULT: u64 = 5;

const SWITCH_USAGE: &str =
    "<SWITCH> 'tcp:HOST[:PORT], unix:PATH, ptcp:[PORT], ptls:[PORT] or - for the configured one'";

fn invalid_input(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, msg)
}

/// Connects to the switch named by the subcommand's SWITCH argument
fn open_switch(conf: &Conf, sub: &ArgMatches) -> io::Result<Switch> {
    let target = conf.connection.target(sub.value_of("SWITCH"))?;
    let vconn = vconn::open(&target, &conf.connection)?;
    info!("Connected to {}", vconn.name());
    Ok(Transactor::new(vconn))
}

/// Compiles the subcommand's FLOW argument. An absent flow matches everything.
fn flow_arg(sub: &ArgMatches, parts: FlowParts) -> io::Result<ParsedFlow> {
    Ok(str_to_flow(sub.value_of("FLOW").unwrap_or(""), parts)?)
}

fn do_show(sw: &mut Switch) -> io::Result<()> {
    for &typ in &[OfpType::FeaturesRequest, OfpType::GetConfigRequest] {
        let reply = sw.transact(OfpHeader::request(typ))?;
        print!("{}", message_to_string(&reply));
    }
    Ok(())
}

fn dump_stats(sw: &mut Switch, request: &OfpStatsRequest) -> io::Result<()> {
    sw.stats_transact(request.to_bytes()?, |reply| {
        print!("{}", message_to_string(reply))
    })?;
    Ok(())
}

fn flow_stats_request(flow: &ParsedFlow) -> OfpFlowStatsRequest {
    OfpFlowStatsRequest {
        match_field: flow.match_field,
        table_id: flow.table_idx,
        out_port: flow.out_port,
    }
}

/// Sends a flow mod, preceded by switching the table id extension
/// on or off if the flow needs it the other way than `table_ext`.
fn send_flow_mod(
    sw: &mut Switch,
    flow: &ParsedFlow,
    command: OfpFlowModCommand,
    table_ext: &mut bool,
) -> io::Result<()> {
    let wanted = flow.table_idx != 0xff;
    if wanted != *table_ext {
        debug!("Turning the flow mod table id extension {}", if wanted { "on" } else { "off" });
        sw.send(NxtSetFlag::new(NxtSubtype::FlowModTableId, wanted).to_bytes()?)?;
        *table_ext = wanted;
    }
    sw.send(flow.flow_mod(command).to_bytes()?)?;
    Ok(())
}

/// Flow mods carry everything but an out port
fn flow_mod_parts() -> FlowParts {
    FlowParts {
        out_port: false,
        ..FlowParts::all()
    }
}

fn do_add_flows(sw: &mut Switch, path: &str) -> io::Result<()> {
    let flows = flow_file::parse_file(path)?;
    let mut table_ext = false;
    for flow in &flows {
        send_flow_mod(sw, flow, OfpFlowModCommand::Add, &mut table_ext)?;
    }
    info!("Sent {} flows", flows.len());
    Ok(())
}

fn do_tun_cookie(sw: &mut Switch, value: &str) -> io::Result<()> {
    let set = match value.to_ascii_lowercase().as_str() {
        "true" => true,
        "false" => false,
        _ => return Err(invalid_input(format!("must specify true or false, not {}", value))),
    };
    sw.send(NxtSetFlag::new(NxtSubtype::TunIdFromCookie, set).to_bytes()?)?;
    Ok(())
}

fn do_ping(sw: &mut Switch, name: &str, payload: usize) -> io::Result<()> {
    let max_payload = usize::from(u16::max_value()) - OfpHeader::header_length();
    if payload > max_payload {
        return Err(invalid_input(format!(
            "payload must be between 0 and {} bytes",
            max_payload
        )));
    }

    for _ in 0..PING_COUNT {
        let request: Vec<u8> = (0..payload).map(|_| rand::random()).collect();
        let start = Instant::now();
        match sw.ping(request) {
            Ok(reply) => {
                let elapsed = start.elapsed();
                let header = OfpHeader::of_message(&reply)?;
                println!(
                    "{} bytes from {}: xid={:08x} time={:.1} ms",
                    reply.len() - OfpHeader::header_length(),
                    name,
                    header.xid(),
                    elapsed.as_secs() as f64 * 1000.0 + f64::from(elapsed.subsec_nanos()) / 1e6
                );
            }
            Err(transact::Error::EchoMismatch) => println!("Reply does not match request."),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Prints what a flow text compiles to, in OpenFlow and in datapath terms
fn do_parse_flow(text: &str) -> io::Result<()> {
    let flow = str_to_flow(text, FlowParts::all())?;
    println!("match: {}", match_to_string(&flow.match_field));
    println!("literal: {}", match_to_literal_string(&flow.match_field));
    println!("actions: {}", actions_to_string(&flow.actions));
    println!(
        "table={} priority={} idle_timeout={} hard_timeout={} cookie={:#x}",
        flow.table_idx, flow.priority, flow.idle_timeout, flow.hard_timeout, flow.cookie
    );

    let key = FlowKey::from_flow(&Flow::from_match(&flow.match_field, false, flow.cookie));
    let mut actions = ActionList::new();
    for action in &flow.actions {
        match DpAction::from_ofp(action) {
            Some(dp) => {
                actions.add(dp);
            }
            None => warn!("{} has no datapath equivalent", action_to_string(action)),
        }
    }
    let dp_flow = DpFlow {
        stats: FlowStats::default(),
        key,
        actions,
    };
    println!("datapath: {}", format_flow(&dp_flow, time_msec()));
    Ok(())
}

/// Fetches every flow entry of the switch
fn poll_flows(sw: &mut Switch) -> io::Result<Vec<OfpFlowStats>> {
    let request = OfpStatsRequest::Flow(OfpFlowStatsRequest {
        match_field: OfpMatch::new(),
        table_id: 0xff,
        out_port: OFPP_NONE,
    });
    let mut bodies = vec![];
    sw.stats_transact(request.to_bytes()?, |reply| {
        if reply[1] == OfpType::StatsReply as u8 {
            bodies.push(reply[OfpHeader::header_length()..].to_vec());
        }
    })?;

    let mut flows = vec![];
    for body in bodies {
        let reply = OfpStatsReply::deserialize(body)?;
        if reply.typ() == OfpStatsType::Flow as u16 {
            flows.extend(OfpFlowStats::read_all(reply.body())?);
        }
    }
    Ok(flows)
}

fn do_netflow(conf: &Conf, sub: &ArgMatches) -> io::Result<()> {
    let interval = match sub.value_of("interval") {
        Some(s) => s
            .parse::<u64>()
            .map_err(|e| invalid_input(format!("invalid interval {}: {}", s, e)))?,
        None => NETFLOW_INTERVAL_DEFAULT,
    };

    let mut netflow = Netflow::new(SystemClock);
    if let Err(e) = netflow.set_options(&conf.netflow) {
        if netflow.n_collectors() == 0 {
            return Err(e);
        }
    }
    if netflow.n_collectors() == 0 {
        return Err(invalid_input("no NetFlow collectors configured".to_owned()));
    }

    let mut sw = open_switch(conf, sub)?;
    let mut monitor = FlowMonitor::new(netflow);
    info!("Exporting to {} collectors", monitor.netflow().n_collectors());
    loop {
        let flows = poll_flows(&mut sw)?;
        monitor.poll(&flows, time_msec());
        debug!("Polled {} flow entries, tracking {} flows", flows.len(), monitor.n_flows());
        monitor.run();
        thread::sleep(Duration::from_secs(interval));
    }
}

#[cfg(unix)]
fn init_logging(matches: &ArgMatches, log_lvl: log::Level) -> io::Result<()> {
    if matches.is_present("syslog") {
        let app_name = Some(crate_name!());
        let filter = log_lvl.to_level_filter();
        syslog::init(syslog::Facility::LOG_USER, filter, app_name)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        log_panics::init();
        Ok(())
    }
    else {
        simple_logger::init_with_level(log_lvl)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
    }
}

#[cfg(not(unix))]
fn init_logging(_: &ArgMatches, log_lvl: log::Level) -> io::Result<()> {
    simple_logger::init_with_level(log_lvl)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
}

/// Reads command line arguments and calls the corresponding functions.
fn handle_cli_args() -> io::Result<()> {
    #[cfg(unix)]
    let unix_opts =
        "-s, --syslog         'Logs via syslog'
        -t, --timeout [secs] 'Gives up after the given number of seconds'
        ";
    #[cfg(not(unix))]
    let unix_opts = "";

    let usage = &format!(
        "{}-v...             'Repeat to set the level of verbosity'
        -c, --conf [ini]     'The INI configuration file'
        --strict             'Uses strict matching for mod-flows and del-flows'"
    , unix_opts);
    let flow_usage = "[FLOW] 'Flow fields to match, everything if omitted'";

    let matches = app_from_crate!()
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .args_from_usage(usage)
        .subcommand(SubCommand::with_name("show")
            .about("Shows the switch's features and configuration")
            .arg_from_usage(SWITCH_USAGE))
        .subcommand(SubCommand::with_name("dump-desc")
            .about("Prints the switch description")
            .arg_from_usage(SWITCH_USAGE))
        .subcommand(SubCommand::with_name("dump-tables")
            .about("Prints table statistics")
            .arg_from_usage(SWITCH_USAGE))
        .subcommand(SubCommand::with_name("dump-flows")
            .about("Prints the matching flow entries")
            .arg_from_usage(SWITCH_USAGE)
            .arg_from_usage(flow_usage))
        .subcommand(SubCommand::with_name("dump-aggregate")
            .about("Prints aggregate statistics of the matching flows")
            .arg_from_usage(SWITCH_USAGE)
            .arg_from_usage(flow_usage))
        .subcommand(SubCommand::with_name("dump-ports")
            .about("Prints port statistics")
            .arg_from_usage(SWITCH_USAGE)
            .arg_from_usage("[PORT] 'The port number, all ports if omitted'"))
        .subcommand(SubCommand::with_name("add-flow")
            .about("Adds one flow")
            .arg_from_usage(SWITCH_USAGE)
            .arg_from_usage("<FLOW> 'The flow including its actions'"))
        .subcommand(SubCommand::with_name("add-flows")
            .about("Adds the flows of a file, one per line")
            .arg_from_usage(SWITCH_USAGE)
            .arg_from_usage("<FILE> 'The flow file'"))
        .subcommand(SubCommand::with_name("mod-flows")
            .about("Modifies the actions of the matching flows")
            .arg_from_usage(SWITCH_USAGE)
            .arg_from_usage("<FLOW> 'The flow including its new actions'"))
        .subcommand(SubCommand::with_name("del-flows")
            .about("Deletes the matching flows")
            .arg_from_usage(SWITCH_USAGE)
            .arg_from_usage(flow_usage))
        .subcommand(SubCommand::with_name("tun-cookie")
            .about("Turns taking the tunnel id from the flow cookie on or off")
            .arg_from_usage(SWITCH_USAGE)
            .arg_from_usage("<VALUE> 'true or false'"))
        .subcommand(SubCommand::with_name("probe")
            .about("Checks that the switch answers an echo request")
            .arg_from_usage(SWITCH_USAGE))
        .subcommand(SubCommand::with_name("ping")
            .about("Measures echo round trips")
            .arg_from_usage(SWITCH_USAGE)
            .arg_from_usage("[N] 'Payload bytes per echo request, 64 if omitted'"))
        .subcommand(SubCommand::with_name("parse-flow")
            .about("Compiles a flow without talking to a switch")
            .arg_from_usage("<FLOW> 'The flow including its actions'"))
        .subcommand(SubCommand::with_name("netflow")
            .about("Exports the switch's flows to the configured NetFlow collectors")
            .arg_from_usage(SWITCH_USAGE)
            .arg_from_usage("-i, --interval [secs] 'Seconds between two polls, 5 if omitted'"))
        .get_matches();

    let log_lvl = match matches.occurrences_of("v") {
        0 => log::Level::Error,
        1 => log::Level::Warn,
        2 => log::Level::Info,
        3 => log::Level::Debug,
        _ => log::Level::Trace,
    };
    init_logging(&matches, log_lvl)?;

    #[cfg(unix)]
    {
        if let Some(secs) = matches.value_of("timeout") {
            let secs = secs
                .parse::<u32>()
                .map_err(|e| invalid_input(format!("invalid timeout {}: {}", secs, e)))?;
            unsafe {
                libc::alarm(secs);
            }
        }
    }

    let conf = match matches.value_of("conf") {
        Some(path) => conf::parse_file(path)?,
        None => Conf::default(),
    };
    let strict = matches.is_present("strict");

    match matches.subcommand() {
        ("show", Some(sub)) => do_show(&mut open_switch(&conf, sub)?),
        ("dump-desc", Some(sub)) => dump_stats(&mut open_switch(&conf, sub)?, &OfpStatsRequest::Desc),
        ("dump-tables", Some(sub)) => {
            dump_stats(&mut open_switch(&conf, sub)?, &OfpStatsRequest::Table)
        }
        ("dump-flows", Some(sub)) => {
            let flow = flow_arg(sub, FlowParts::stats_request())?;
            let request = OfpStatsRequest::Flow(flow_stats_request(&flow));
            dump_stats(&mut open_switch(&conf, sub)?, &request)
        }
        ("dump-aggregate", Some(sub)) => {
            let flow = flow_arg(sub, FlowParts::stats_request())?;
            let request = OfpStatsRequest::Aggregate(flow_stats_request(&flow));
            dump_stats(&mut open_switch(&conf, sub)?, &request)
        }
        ("dump-ports", Some(sub)) => {
            let port = match sub.value_of("PORT") {
                Some(p) => str_to_u16(p)?,
                None => OFPP_NONE,
            };
            dump_stats(&mut open_switch(&conf, sub)?, &OfpStatsRequest::Port(port))
        }
        ("add-flow", Some(sub)) => {
            let flow = flow_arg(sub, flow_mod_parts())?;
            send_flow_mod(&mut open_switch(&conf, sub)?, &flow, OfpFlowModCommand::Add, &mut false)
        }
        ("add-flows", Some(sub)) => {
            let path = sub.value_of("FILE").unwrap_or("");
            do_add_flows(&mut open_switch(&conf, sub)?, path)
        }
        ("mod-flows", Some(sub)) => {
            let flow = flow_arg(sub, flow_mod_parts())?;
            let command = if strict {
                OfpFlowModCommand::ModifyStrict
            }
            else {
                OfpFlowModCommand::Modify
            };
            send_flow_mod(&mut open_switch(&conf, sub)?, &flow, command, &mut false)
        }
        ("del-flows", Some(sub)) => {
            let parts = FlowParts {
                out_port: true,
                priority: true,
                ..FlowParts::default()
            };
            let flow = flow_arg(sub, parts)?;
            let command = if strict {
                OfpFlowModCommand::DeleteStrict
            }
            else {
                OfpFlowModCommand::Delete
            };
            send_flow_mod(&mut open_switch(&conf, sub)?, &flow, command, &mut false)
        }
        ("tun-cookie", Some(sub)) => {
            do_tun_cookie(&mut open_switch(&conf, sub)?, sub.value_of("VALUE").unwrap_or(""))
        }
        ("probe", Some(sub)) => {
            open_switch(&conf, sub)?.probe()?;
            Ok(())
        }
        ("ping", Some(sub)) => {
            let payload = match sub.value_of("N") {
                Some(n) => n
                    .parse::<usize>()
                    .map_err(|e| invalid_input(format!("invalid payload size {}: {}", n, e)))?,
                None => PING_PAYLOAD_DEFAULT,
            };
            let name = sub.value_of("SWITCH").unwrap_or("-");
            do_ping(&mut open_switch(&conf, sub)?, name, payload)
        }
        ("parse-flow", Some(sub)) => do_parse_flow(sub.value_of("FLOW").unwrap_or("")),
        ("netflow", Some(sub)) => do_netflow(&conf, sub),
        (cmd, _) => Err(invalid_input(format!("unknown command {}", cmd))),
    }
}

/// Entry function with top level error handling.
fn main() {
    if let Err(e) = handle_cli_args() {
        error!("{}", e);
        exit(1);
    }
}
