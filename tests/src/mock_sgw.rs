#![allow(clippy::unusual_byte_groupings)]
use anyhow::{Result, ensure};
use async_net::{SocketAddr, UdpSocket};
use async_std::future;
use slog::{Logger, info, o};
use std::time::Duration;

const GTP_MESSAGE_TYPE_GPDU: u8 = 255; // TS29.281, table 6.1-1

/// Radio side peer.  Sends uplink G-PDUs and receives downlink ones.
pub struct MockSgw {
    gtpu_socket: UdpSocket,
    logger: Logger,
}

impl MockSgw {
    pub async fn new(local_ip: &str, logger: &Logger) -> Result<Self> {
        let gtpu_socket = UdpSocket::bind(format!("{local_ip}:0")).await?;
        let logger = logger.new(o!("sgw" => 1));
        info!(logger, "Serving GTP-U on {}", gtpu_socket.local_addr()?);
        Ok(MockSgw {
            gtpu_socket,
            logger,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.gtpu_socket.local_addr()?)
    }

    pub async fn send_gpdu(&self, gateway: SocketAddr, teid: u32, payload: &[u8]) -> Result<()> {
        let length = (payload.len() as u16).to_be_bytes();
        let teid_bytes = teid.to_be_bytes();
        let mut packet = vec![
            // ---- GTP header ----
            0b001_1_0_0_0_0,       // version, PT, R, E, S, PN
            GTP_MESSAGE_TYPE_GPDU, // message type
            length[0],
            length[1],
            teid_bytes[0],
            teid_bytes[1],
            teid_bytes[2],
            teid_bytes[3],
        ];
        packet.extend_from_slice(payload);
        info!(
            self.logger,
            "Send G-PDU with TEID {:#x}, {} byte payload",
            teid,
            payload.len()
        );
        self.gtpu_socket.send_to(&packet, gateway).await?;
        Ok(())
    }

    pub async fn send_raw(&self, gateway: SocketAddr, bytes: &[u8]) -> Result<()> {
        self.gtpu_socket.send_to(bytes, gateway).await?;
        Ok(())
    }

    /// Wait for a downlink G-PDU and return its TEID and payload.
    pub async fn recv_gpdu(&self) -> Result<(u32, Vec<u8>)> {
        let mut buf = vec![0u8; 2000];
        let future_result = self.gtpu_socket.recv_from(&mut buf);
        let (bytes_received, _source_address) =
            future::timeout(Duration::from_secs(5), future_result).await??;
        ensure!(bytes_received >= 8, "G-PDU too short");
        ensure!(
            buf[0] == 0x30 && buf[1] == GTP_MESSAGE_TYPE_GPDU,
            "Unexpected GTP header {:x?}",
            &buf[0..2]
        );
        let length = u16::from_be_bytes([buf[2], buf[3]]) as usize;
        ensure!(length == bytes_received - 8, "Bad GTP length {length}");
        let teid = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        info!(self.logger, ">> Downlink G-PDU with TEID {:#x}", teid);
        Ok((teid, buf[8..bytes_received].to_vec()))
    }

    /// Check that nothing arrives within `wait`.
    pub async fn expect_nothing(&self, wait: Duration) -> Result<()> {
        let mut buf = vec![0u8; 2000];
        let future_result = self.gtpu_socket.recv_from(&mut buf);
        ensure!(
            future::timeout(wait, future_result).await.is_err(),
            "Unexpected packet at SGW"
        );
        Ok(())
    }
}
