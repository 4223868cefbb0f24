use super::downlink_pipeline::downlink_counter_indices::*;
use super::gtpu_sink::sink_counter_indices::*;
use super::uplink_pipeline::uplink_counter_indices::*;
use super::{
    DataPlane, DownlinkCounters, DownlinkPipeline, GtpuSink, SinkCounters, UplinkCounters,
    UplinkPipeline,
};
use crate::ControlPlane;
use anyhow::{Context, Result};
use async_std::task::{self, JoinHandle};
use atomic_counter::{AtomicCounter, RelaxedCounter};
use slog::{Logger, info, warn};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

const STATS_INTERVAL: Duration = Duration::from_secs(5);

pub struct PacketProcessor {
    s1u_addr: SocketAddr,
    sgi_addr: SocketAddr,
    tasks: Vec<JoinHandle<()>>,
}

pub struct PacketProcessorConfig {
    pub local_ip: Ipv4Addr,
    pub s1u_port: u16,
    pub sgi_port: u16,
    pub sgw_gtpu_port: u16,
    pub apn_gateway_port: u16,
}

impl PacketProcessor {
    pub fn start(
        config: PacketProcessorConfig,
        control_plane: Arc<ControlPlane>,
        logger: &Logger,
    ) -> Result<Self> {
        // Create the packet source/sinks.
        let s1u_socket =
            create_udp_socket(config.local_ip, config.s1u_port, "GTP-U (S1-U)", logger)?;
        let sgi_socket = create_udp_socket(config.local_ip, config.sgi_port, "SGi", logger)?;
        let s1u_addr = s1u_socket.local_addr()?;
        let sgi_addr = sgi_socket.local_addr()?;

        let sink_counters = Arc::new(SinkCounters::default());
        let sink = GtpuSink::new(
            s1u_socket.try_clone()?,
            sgi_socket.try_clone()?,
            config.sgw_gtpu_port,
            config.apn_gateway_port,
            sink_counters.clone(),
        );
        let data_plane = Arc::new(DataPlane::new(control_plane, sink));

        // Start the uplink pipeline (S1-U -> SGi).
        let uplink_counters = Arc::new(UplinkCounters::default());
        let uplink_task = UplinkPipeline::new(
            s1u_socket.into(),
            data_plane.clone(),
            uplink_counters.clone(),
        )
        .run(logger.clone());

        // Start the downlink pipeline (SGi -> S1-U).
        let downlink_counters = Arc::new(DownlinkCounters::default());
        let downlink_task = DownlinkPipeline::new(
            sgi_socket.into(),
            data_plane.clone(),
            downlink_counters.clone(),
        )
        .run(logger.clone());

        let stats_task = task::spawn(dump_stats(
            logger.clone(),
            downlink_counters,
            uplink_counters,
            sink_counters,
        ));

        Ok(PacketProcessor {
            s1u_addr,
            sgi_addr,
            tasks: vec![uplink_task, downlink_task, stats_task],
        })
    }

    pub fn s1u_addr(&self) -> SocketAddr {
        self.s1u_addr
    }

    pub fn sgi_addr(&self) -> SocketAddr {
        self.sgi_addr
    }

    pub async fn graceful_shutdown(self) {
        for task in self.tasks {
            task.cancel().await;
        }
    }
}

fn create_udp_socket(
    local_ip: Ipv4Addr,
    port: u16,
    name: &str,
    logger: &Logger,
) -> Result<UdpSocket> {
    let transport_address = SocketAddr::new(IpAddr::V4(local_ip), port);
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_port(true)?;
    socket
        .bind(&transport_address.into())
        .context(format!("Failed to bind {}", transport_address))?;
    let socket: UdpSocket = socket.into();
    info!(logger, "Serving {name} on {}", socket.local_addr()?);
    Ok(socket)
}

async fn dump_stats(
    logger: Logger,
    dl: Arc<DownlinkCounters>,
    ul: Arc<UplinkCounters>,
    tx: Arc<SinkCounters>,
) {
    let mut last_dl = [0usize; DL_NUM_COUNTERS];
    let mut last_ul = [0usize; UL_NUM_COUNTERS];
    let mut last_tx = [0usize; TX_NUM_COUNTERS];
    const FIRST_DL_WARN_IDX: usize = DL_DROP_TOO_SHORT;
    const FIRST_UL_WARN_IDX: usize = UL_DROP_TOO_SHORT;
    const FIRST_TX_WARN_IDX: usize = TX_DROP_SEND_FAILED;

    loop {
        task::sleep(STATS_INTERVAL).await;

        if dl[DL_RX_PKTS].get() != last_dl[DL_RX_PKTS]
            || ul[UL_RX_PKTS].get() != last_ul[UL_RX_PKTS]
        {
            last_dl[DL_RX_PKTS] = dl[DL_RX_PKTS].get();
            last_dl[DL_RX_BYTES] = dl[DL_RX_BYTES].get();
            last_ul[UL_RX_PKTS] = ul[UL_RX_PKTS].get();
            last_ul[UL_RX_BYTES] = ul[UL_RX_BYTES].get();
            last_tx[TX_APN_PKTS] = tx[TX_APN_PKTS].get();
            last_tx[TX_SGW_PKTS] = tx[TX_SGW_PKTS].get();

            // Received minus forwarded includes packets the data plane dropped as unroutable
            // or over rate.
            info!(
                &logger,
                "DL pkts={} bytes={} fwd={} UL pkts={} bytes={} fwd={}",
                last_dl[DL_RX_PKTS],
                last_dl[DL_RX_BYTES],
                last_tx[TX_SGW_PKTS],
                last_ul[UL_RX_PKTS],
                last_ul[UL_RX_BYTES],
                last_tx[TX_APN_PKTS]
            );
        }

        let dl_warn_needed = update_drop_counters(&dl[..], &mut last_dl, FIRST_DL_WARN_IDX);
        let ul_warn_needed = update_drop_counters(&ul[..], &mut last_ul, FIRST_UL_WARN_IDX);
        let tx_warn_needed = update_drop_counters(&tx[..], &mut last_tx, FIRST_TX_WARN_IDX);

        if dl_warn_needed {
            warn!(
                &logger,
                "DL DROPS too_short={} not_ipv4={} bad_length={}",
                last_dl[DL_DROP_TOO_SHORT],
                last_dl[DL_DROP_NOT_IPV4],
                last_dl[DL_DROP_BAD_LENGTH]
            );
        }

        if ul_warn_needed {
            warn!(
                &logger,
                "UL DROPS too_short={} gtp_header={} gtp_length={}",
                last_ul[UL_DROP_TOO_SHORT],
                last_ul[UL_DROP_GTP_HEADER],
                last_ul[UL_DROP_GTP_LENGTH]
            );
        }

        if tx_warn_needed {
            warn!(
                &logger,
                "TX DROPS send_failed={} too_big={}",
                last_tx[TX_DROP_SEND_FAILED],
                last_tx[TX_DROP_TOO_BIG]
            );
        }
    }
}

// Copies the drop counters from `first_idx` onwards into `last`.  Returns true if any moved.
fn update_drop_counters(
    counters: &[RelaxedCounter],
    last: &mut [usize],
    first_idx: usize,
) -> bool {
    let mut changed = false;
    for idx in first_idx..counters.len() {
        let current = counters[idx].get();
        if last[idx] != current {
            changed = true;
        }
        last[idx] = current;
    }
    changed
}
