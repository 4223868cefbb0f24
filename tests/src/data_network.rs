use anyhow::{Result, ensure};
use async_net::{SocketAddr, UdpSocket};
use async_std::future;
use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::{self, MutableIpv4Packet};
use slog::{Logger, info, o};
use std::net::Ipv4Addr;
use std::time::Duration;

const IPV4_HEADER_LEN: usize = 20;

/// Internet side peer, standing in for an APN gateway.  Receives uplink packets and sends
/// downlink IPv4 packets addressed to UEs.
pub struct DataNetwork {
    logger: Logger,
    udp_socket: UdpSocket,
}

impl DataNetwork {
    pub async fn new(local_ip: &str, logger: &Logger) -> Result<Self> {
        let udp_socket = UdpSocket::bind(format!("{local_ip}:0")).await?;
        Ok(DataNetwork {
            logger: logger.new(o!("dn" => 1)),
            udp_socket,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.udp_socket.local_addr()?)
    }

    /// Send an IPv4 packet with `payload_len` bytes of payload to the UE.  Returns the packet.
    pub async fn send_downlink_ipv4(
        &self,
        gateway: SocketAddr,
        ue_ip: Ipv4Addr,
        payload_len: usize,
    ) -> Result<Vec<u8>> {
        let mut packet = vec![0u8; IPV4_HEADER_LEN + payload_len];
        let mut ipv4_packet = MutableIpv4Packet::new(&mut packet)
            .ok_or_else(|| anyhow::anyhow!("Buffer too small for IPv4 header"))?;
        ipv4_packet.set_version(4);
        ipv4_packet.set_header_length(5);
        ipv4_packet.set_total_length((IPV4_HEADER_LEN + payload_len) as u16);
        ipv4_packet.set_ttl(64);
        ipv4_packet.set_next_level_protocol(IpNextHeaderProtocols::Udp);
        ipv4_packet.set_source(Ipv4Addr::new(8, 8, 8, 8));
        ipv4_packet.set_destination(ue_ip);
        let checksum = ipv4::checksum(&ipv4_packet.to_immutable());
        ipv4_packet.set_checksum(checksum);

        self.udp_socket.send_to(&packet, gateway).await?;
        info!(self.logger, "Sent downlink packet to UE {ue_ip}");
        Ok(packet)
    }

    pub async fn send_raw(&self, gateway: SocketAddr, bytes: &[u8]) -> Result<()> {
        self.udp_socket.send_to(bytes, gateway).await?;
        Ok(())
    }

    pub async fn receive_uplink(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; 2000];
        let future_result = self.udp_socket.recv(&mut buf);
        let bytes_received = future::timeout(Duration::from_secs(5), future_result).await??;
        info!(&self.logger, ">> Uplink packet from UE");
        buf.truncate(bytes_received);
        Ok(buf)
    }

    /// Check that nothing arrives within `wait`.
    pub async fn expect_nothing(&self, wait: Duration) -> Result<()> {
        let mut buf = vec![0u8; 2000];
        let future_result = self.udp_socket.recv(&mut buf);
        ensure!(
            future::timeout(wait, future_result).await.is_err(),
            "Unexpected packet at APN gateway"
        );
        Ok(())
    }
}
