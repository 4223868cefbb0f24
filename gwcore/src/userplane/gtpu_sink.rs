use super::gtpu::encode_gpdu;
use super::{ForwardingSink, Packet};
use atomic_counter::{AtomicCounter, RelaxedCounter};
use derive_deref::Deref;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Arc;

pub mod sink_counter_indices {
    pub const TX_APN_PKTS: usize = 0;
    pub const TX_SGW_PKTS: usize = 1;
    pub const TX_DROP_SEND_FAILED: usize = 2;
    pub const TX_DROP_TOO_BIG: usize = 3;
    pub const TX_NUM_COUNTERS: usize = 4;
}
use sink_counter_indices::*;

#[derive(Deref, Default)]
pub struct SinkCounters([RelaxedCounter; TX_NUM_COUNTERS]);

/// Sends uplink packets as-is to the APN gateway from the SGi socket, and downlink packets
/// as G-PDUs to the SGW from the S1-U socket.
pub struct GtpuSink {
    s1u_socket: UdpSocket,
    sgi_socket: UdpSocket,
    sgw_gtpu_port: u16,
    apn_gateway_port: u16,
    counters: Arc<SinkCounters>,
}

impl GtpuSink {
    pub(crate) fn new(
        s1u_socket: UdpSocket,
        sgi_socket: UdpSocket,
        sgw_gtpu_port: u16,
        apn_gateway_port: u16,
        counters: Arc<SinkCounters>,
    ) -> Self {
        GtpuSink {
            s1u_socket,
            sgi_socket,
            sgw_gtpu_port,
            apn_gateway_port,
            counters,
        }
    }

    fn send(&self, socket: &UdpSocket, bytes: &[u8], dest: SocketAddr, tx_idx: usize) {
        // The sockets are shared with the receive pipelines and so are non-blocking.  A full
        // send buffer is a drop like any other.
        match socket.send_to(bytes, dest) {
            Ok(_) => self.counters[tx_idx].inc(),
            Err(_) => self.counters[TX_DROP_SEND_FAILED].inc(),
        };
    }
}

impl ForwardingSink for GtpuSink {
    fn forward_to_apn(&self, apn_gateway: Ipv4Addr, packet: Packet) {
        let dest = SocketAddr::new(apn_gateway.into(), self.apn_gateway_port);
        self.send(&self.sgi_socket, &packet, dest, TX_APN_PKTS);
    }

    fn forward_to_sgw(&self, sgw_address: Ipv4Addr, sgw_dp_teid: u32, packet: Packet) {
        let Some(pdu) = encode_gpdu(sgw_dp_teid, &packet) else {
            self.counters[TX_DROP_TOO_BIG].inc();
            return;
        };
        let dest = SocketAddr::new(sgw_address.into(), self.sgw_gtpu_port);
        self.send(&self.s1u_socket, &pdu, dest, TX_SGW_PKTS);
    }
}
