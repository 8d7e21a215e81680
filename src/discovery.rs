/*!
 * NAS discovery over mDNS.
 *
 * Sends one multicast DNS PTR query for `_smb._tcp.local` and collects
 * responses for a short window. Best-effort glue for the settings page; any
 * failure just produces an empty device list.
 */

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use log::{debug, warn};
use serde::Serialize;
use tokio::net::UdpSocket;

const MDNS_ADDR: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
const MDNS_PORT: u16 = 5353;
const SMB_SERVICE: &str = "_smb._tcp.local";
const COLLECT_WINDOW: Duration = Duration::from_millis(2500);

/// One discovered SMB host
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredNas {
    pub name: String,
    pub address: String,
}

/// Query the local network for SMB services.
pub async fn discover_smb_hosts() -> Vec<DiscoveredNas> {
    match run_query().await {
        Ok(devices) => devices,
        Err(e) => {
            warn!("NAS discovery failed: {}", e);
            Vec::new()
        }
    }
}

async fn run_query() -> std::io::Result<Vec<DiscoveredNas>> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
    socket
        .send_to(&build_ptr_query(SMB_SERVICE), (MDNS_ADDR, MDNS_PORT))
        .await?;

    let mut devices: HashMap<String, DiscoveredNas> = HashMap::new();
    let deadline = tokio::time::Instant::now() + COLLECT_WINDOW;
    let mut buffer = [0u8; 4096];

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        let (len, from) = match tokio::time::timeout(remaining, socket.recv_from(&mut buffer)).await
        {
            Ok(Ok(received)) => received,
            Ok(Err(e)) => {
                debug!("mDNS receive error: {}", e);
                break;
            }
            Err(_) => break,
        };

        for name in parse_ptr_answers(&buffer[..len]) {
            // "My NAS._smb._tcp.local" -> "My NAS"
            let display = name
                .strip_suffix(&format!(".{}", SMB_SERVICE))
                .unwrap_or(&name)
                .to_string();
            devices.entry(display.clone()).or_insert(DiscoveredNas {
                name: display,
                address: from.ip().to_string(),
            });
        }
    }

    let mut result: Vec<DiscoveredNas> = devices.into_values().collect();
    result.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(result)
}

/// Build a single-question mDNS query packet (QTYPE PTR, QCLASS IN).
fn build_ptr_query(service: &str) -> Vec<u8> {
    let mut packet = vec![
        0x00, 0x00, // transaction id (0 for mDNS)
        0x00, 0x00, // flags: standard query
        0x00, 0x01, // one question
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // no answer/authority/additional
    ];
    for label in service.split('.') {
        packet.push(label.len() as u8);
        packet.extend_from_slice(label.as_bytes());
    }
    packet.push(0); // root label
    packet.extend_from_slice(&[0x00, 0x0C]); // QTYPE PTR
    // QCLASS IN with the unicast-response bit set, so answers come back to
    // this socket instead of the multicast group.
    packet.extend_from_slice(&[0x80, 0x01]);
    packet
}

/// Extract PTR answer target names from an mDNS response packet.
fn parse_ptr_answers(packet: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    if packet.len() < 12 {
        return names;
    }
    let questions = u16::from_be_bytes([packet[4], packet[5]]) as usize;
    let answers = u16::from_be_bytes([packet[6], packet[7]]) as usize;

    let mut pos = 12;
    for _ in 0..questions {
        let Some(next) = skip_name(packet, pos) else {
            return names;
        };
        pos = next + 4; // QTYPE + QCLASS
    }

    for _ in 0..answers {
        let Some(next) = skip_name(packet, pos) else {
            return names;
        };
        pos = next;
        if pos + 10 > packet.len() {
            return names;
        }
        let rtype = u16::from_be_bytes([packet[pos], packet[pos + 1]]);
        let rdlength = u16::from_be_bytes([packet[pos + 8], packet[pos + 9]]) as usize;
        pos += 10;
        if pos + rdlength > packet.len() {
            return names;
        }
        if rtype == 0x0C {
            if let Some(name) = decode_name(packet, pos) {
                names.push(name);
            }
        }
        pos += rdlength;
    }
    names
}

/// Advance past a (possibly compressed) DNS name; returns the next offset.
fn skip_name(packet: &[u8], mut pos: usize) -> Option<usize> {
    loop {
        let len = *packet.get(pos)? as usize;
        if len == 0 {
            return Some(pos + 1);
        }
        if len & 0xC0 == 0xC0 {
            return Some(pos + 2);
        }
        pos += 1 + len;
    }
}

/// Decode a DNS name with compression-pointer support.
fn decode_name(packet: &[u8], mut pos: usize) -> Option<String> {
    let mut labels = Vec::new();
    let mut jumps = 0;
    loop {
        let len = *packet.get(pos)? as usize;
        if len == 0 {
            break;
        }
        if len & 0xC0 == 0xC0 {
            let low = *packet.get(pos + 1)? as usize;
            pos = ((len & 0x3F) << 8) | low;
            jumps += 1;
            if jumps > 16 {
                return None; // pointer loop
            }
            continue;
        }
        let label = packet.get(pos + 1..pos + 1 + len)?;
        labels.push(String::from_utf8_lossy(label).to_string());
        pos += 1 + len;
    }
    if labels.is_empty() {
        None
    } else {
        Some(labels.join("."))
    }
}
