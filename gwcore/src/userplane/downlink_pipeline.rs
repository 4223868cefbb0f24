use super::{DataPlane, ForwardingSink, IPV4_HEADER_LEN, MAX_DATAGRAM_LEN};
use anyhow::Result;
use async_std::{
    net::UdpSocket,
    task::{self, JoinHandle},
};
use atomic_counter::{AtomicCounter, RelaxedCounter};
use derive_deref::Deref;
use slog::{Logger, info};
use std::net::Ipv4Addr;
use std::sync::Arc;

pub mod downlink_counter_indices {
    pub const DL_RX_PKTS: usize = 0;
    pub const DL_RX_BYTES: usize = 1;
    pub const DL_DROP_TOO_SHORT: usize = 2;
    pub const DL_DROP_NOT_IPV4: usize = 3;
    pub const DL_DROP_BAD_LENGTH: usize = 4;
    pub const DL_NUM_COUNTERS: usize = 5;
}
use downlink_counter_indices::*;

#[derive(Deref, Default)]
pub struct DownlinkCounters([RelaxedCounter; DL_NUM_COUNTERS]);

/// SGi -> data plane.  Each datagram from an APN gateway carries one IPv4 packet for a UE.
pub struct DownlinkPipeline<S: ForwardingSink> {
    sgi_socket: UdpSocket,
    data_plane: Arc<DataPlane<S>>,
    counters: Arc<DownlinkCounters>,
}

impl<S: ForwardingSink> DownlinkPipeline<S> {
    pub fn new(
        sgi_socket: UdpSocket,
        data_plane: Arc<DataPlane<S>>,
        counters: Arc<DownlinkCounters>,
    ) -> Self {
        Self {
            sgi_socket,
            data_plane,
            counters,
        }
    }

    pub fn run(self, logger: Logger) -> JoinHandle<()> {
        task::spawn(async move {
            let mut buf = [0u8; MAX_DATAGRAM_LEN];
            loop {
                if let Err(e) = self.handle_next_downlink_packet(&mut buf).await {
                    info!(logger, "Exiting downlink pipeline with error {e}");
                    break;
                }
            }
        })
    }

    async fn handle_next_downlink_packet(&self, buf: &mut [u8; MAX_DATAGRAM_LEN]) -> Result<()> {
        let (bytes_read, _peer) = self.sgi_socket.recv_from(buf).await?;
        self.counters[DL_RX_PKTS].inc();
        self.counters[DL_RX_BYTES].add(bytes_read);

        match parse_ipv4(&buf[..bytes_read]) {
            Ok((ue_ip_addr, packet)) => {
                self.data_plane.handle_downlink(ue_ip_addr, packet.to_vec())
            }
            Err(reason) => {
                let idx = match reason {
                    Ipv4Drop::TooShort => DL_DROP_TOO_SHORT,
                    Ipv4Drop::NotIpv4 => DL_DROP_NOT_IPV4,
                    Ipv4Drop::BadLength => DL_DROP_BAD_LENGTH,
                };
                self.counters[idx].inc();
            }
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Ipv4Drop {
    TooShort,
    NotIpv4,
    BadLength,
}

// Returns the destination address and the packet trimmed to its total length.  A datagram
// shorter than its total length was truncated on receive (or by the sender) and is dropped.
fn parse_ipv4(buf: &[u8]) -> Result<(Ipv4Addr, &[u8]), Ipv4Drop> {
    if buf.len() < IPV4_HEADER_LEN {
        return Err(Ipv4Drop::TooShort);
    }
    if buf[0] & 0xf0 != 0x40 {
        return Err(Ipv4Drop::NotIpv4);
    }

    // RFC 791 total length at offset 2, destination address at offset 16.
    let total_len = u16::from_be_bytes([buf[2], buf[3]]) as usize;
    if total_len < IPV4_HEADER_LEN {
        return Err(Ipv4Drop::BadLength);
    }
    let Some(packet) = buf.get(..total_len) else {
        return Err(Ipv4Drop::BadLength);
    };
    let dst = Ipv4Addr::new(buf[16], buf[17], buf[18], buf[19]);
    Ok((dst, packet))
}
