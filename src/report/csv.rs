//! CSV report format.
//!
//! One row per port record per host. Hosts without port records (dead hosts,
//! or live hosts whose scan was cut short before any port finished) get a
//! single row with empty port columns, so every host survives a round trip.

use crate::error::{ReportError, ReportResult};
use crate::types::{HostRecord, MacAddr, Port, PortRecord, PortState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::IpAddr;

#[derive(Debug, Serialize, Deserialize)]
struct Row {
    address: IpAddr,
    alive: bool,
    mac: Option<MacAddr>,
    probe_duration_ms: u64,
    partial: bool,
    port: Option<Port>,
    state: Option<PortState>,
    service: Option<String>,
    banner: Option<String>,
}

impl Row {
    fn host(host: &HostRecord) -> Self {
        Self {
            address: host.address,
            alive: host.alive,
            mac: host.mac,
            probe_duration_ms: host.probe_duration_ms,
            partial: host.partial,
            port: None,
            state: None,
            service: None,
            banner: None,
        }
    }
}

/// Write host records as CSV with a header row.
pub fn write_hosts<W: Write>(hosts: &[HostRecord], writer: W) -> ReportResult<()> {
    let mut wtr = ::csv::Writer::from_writer(writer);

    for host in hosts {
        if host.ports.is_empty() {
            wtr.serialize(Row::host(host))?;
            continue;
        }
        for port in &host.ports {
            wtr.serialize(Row {
                port: Some(port.port),
                state: Some(port.state),
                service: port.service.clone(),
                banner: port.banner.clone(),
                ..Row::host(host)
            })?;
        }
    }

    wtr.flush()?;
    Ok(())
}

pub fn to_string(hosts: &[HostRecord]) -> ReportResult<String> {
    let mut buf = Vec::new();
    write_hosts(hosts, &mut buf)?;
    String::from_utf8(buf).map_err(|e| ReportError::Io(std::io::Error::other(e)))
}

/// Rebuild host records from CSV written by [`write_hosts`]. Hosts come
/// back in the order they first appear.
pub fn read_hosts<R: Read>(reader: R) -> ReportResult<Vec<HostRecord>> {
    let mut rdr = ::csv::Reader::from_reader(reader);
    let mut hosts: Vec<HostRecord> = Vec::new();
    let mut index: HashMap<IpAddr, usize> = HashMap::new();

    for (i, row) in rdr.deserialize::<Row>().enumerate() {
        let row = row?;
        let slot = *index.entry(row.address).or_insert_with(|| {
            let mut host = HostRecord::shell(row.address, row.alive, row.probe_duration_ms);
            host.mac = row.mac;
            host.partial = row.partial;
            hosts.push(host);
            hosts.len() - 1
        });

        let Some(port) = row.port else {
            continue;
        };
        let state = row.state.ok_or_else(|| ReportError::MalformedRow {
            row: i + 1,
            reason: format!("port {} has no state", port),
        })?;

        let host = &mut hosts[slot];
        if !host.alive {
            return Err(ReportError::MalformedRow {
                row: i + 1,
                reason: format!("{} is not alive but lists port {}", host.address, port),
            });
        }
        let mut record = PortRecord::new(port, state);
        record.service = row.service;
        record.banner = row.banner;
        host.ports.push(record);
    }

    Ok(hosts)
}
