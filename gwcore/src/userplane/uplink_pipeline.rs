use super::gtpu::{GpduDrop, decode_gpdu};
use super::{DataPlane, ForwardingSink, MAX_DATAGRAM_LEN};
use anyhow::Result;
use async_std::{
    net::UdpSocket,
    task::{self, JoinHandle},
};
use atomic_counter::{AtomicCounter, RelaxedCounter};
use derive_deref::Deref;
use slog::{Logger, info};
use std::sync::Arc;

pub mod uplink_counter_indices {
    pub const UL_RX_PKTS: usize = 0;
    pub const UL_RX_BYTES: usize = 1;
    pub const UL_DROP_TOO_SHORT: usize = 2;
    pub const UL_DROP_GTP_HEADER: usize = 3;
    pub const UL_DROP_GTP_LENGTH: usize = 4;
    pub const UL_NUM_COUNTERS: usize = 5;
}
use uplink_counter_indices::*;

#[derive(Deref, Default)]
pub struct UplinkCounters([RelaxedCounter; UL_NUM_COUNTERS]);

/// S1-U -> data plane.  Receives G-PDUs from SGWs and hands their payloads to the data plane.
pub struct UplinkPipeline<S: ForwardingSink> {
    s1u_socket: UdpSocket,
    data_plane: Arc<DataPlane<S>>,
    counters: Arc<UplinkCounters>,
}

impl<S: ForwardingSink> UplinkPipeline<S> {
    pub fn new(
        s1u_socket: UdpSocket,
        data_plane: Arc<DataPlane<S>>,
        counters: Arc<UplinkCounters>,
    ) -> Self {
        Self {
            s1u_socket,
            data_plane,
            counters,
        }
    }

    pub fn run(self, logger: Logger) -> JoinHandle<()> {
        task::spawn(async move {
            let mut buf = [0u8; MAX_DATAGRAM_LEN];
            loop {
                if let Err(e) = self.handle_next_uplink_packet(&mut buf).await {
                    info!(logger, "Exiting uplink pipeline with error {e}");
                    break;
                }
            }
        })
    }

    async fn handle_next_uplink_packet(&self, buf: &mut [u8; MAX_DATAGRAM_LEN]) -> Result<()> {
        let (bytes_read, _peer) = self.s1u_socket.recv_from(buf).await?;
        self.counters[UL_RX_PKTS].inc();
        self.counters[UL_RX_BYTES].add(bytes_read);

        match decode_gpdu(&buf[..bytes_read]) {
            Ok((teid, payload)) => self.data_plane.handle_uplink(teid, payload.to_vec()),
            Err(reason) => {
                let idx = match reason {
                    GpduDrop::TooShort => UL_DROP_TOO_SHORT,
                    GpduDrop::UnhandledHeader => UL_DROP_GTP_HEADER,
                    GpduDrop::BadLength => UL_DROP_GTP_LENGTH,
                };
                self.counters[idx].inc();
            }
        }
        Ok(())
    }
}
