use crate::userplane::{PacketProcessor, PacketProcessorConfig};
use crate::{Config, ControlPlane, GatewayError, SessionConfig};
use anyhow::{Context, Result, anyhow, bail};
use slog::{Logger, info};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

pub struct Gateway {
    logger: Logger,
    control_plane: Arc<ControlPlane>,
    packet_processor: PacketProcessor,
}

impl Gateway {
    pub fn start(config: Config, logger: Logger) -> Result<Self> {
        config.check()?;
        let local_ip = resolve_local_ip(config.local_ip)?;

        let control_plane = Arc::new(ControlPlane::with_ue_ip_pool(
            config.ue_ip_pool_base,
            logger.clone(),
        ));
        for apn in config.apns.iter() {
            control_plane.add_apn(&apn.name, apn.gateway)?;
        }
        for session in config.sessions.iter() {
            provision_session(&control_plane, session, &logger)
                .with_context(|| format!("Failed to provision session on APN {}", session.apn))?;
        }

        let packet_processor = PacketProcessor::start(
            PacketProcessorConfig {
                local_ip,
                s1u_port: config.s1u_port,
                sgi_port: config.sgi_port,
                sgw_gtpu_port: config.sgw_gtpu_port,
                apn_gateway_port: config.apn_gateway_port,
            },
            control_plane.clone(),
            &logger,
        )?;

        Ok(Gateway {
            logger,
            control_plane,
            packet_processor,
        })
    }

    pub fn control_plane(&self) -> &Arc<ControlPlane> {
        &self.control_plane
    }

    pub fn s1u_addr(&self) -> SocketAddr {
        self.packet_processor.s1u_addr()
    }

    pub fn sgi_addr(&self) -> SocketAddr {
        self.packet_processor.sgi_addr()
    }

    pub async fn graceful_shutdown(self) {
        info!(&self.logger, "Shutting down");
        self.packet_processor.graceful_shutdown().await;
    }
}

fn resolve_local_ip(configured: Option<Ipv4Addr>) -> Result<Ipv4Addr> {
    if let Some(ip) = configured {
        return Ok(ip);
    }
    match local_ip_address::local_ip().context("No local_ip configured and none discovered")? {
        IpAddr::V4(ip) => Ok(ip),
        IpAddr::V6(ip) => bail!("Discovered local IP {ip} is not IPv4 - set local_ip in the config"),
    }
}

fn provision_session(
    control_plane: &ControlPlane,
    session: &SessionConfig,
    logger: &Logger,
) -> Result<()> {
    let pdn = control_plane
        .create_pdn_connection(&session.apn, session.sgw_address, session.sgw_cp_teid)
        .ok_or_else(|| GatewayError::UnknownApn(session.apn.clone()))?;

    for (idx, bearer_config) in session.bearers.iter().enumerate() {
        let bearer = control_plane
            .create_bearer(&pdn, bearer_config.sgw_teid)
            .ok_or_else(|| anyhow!("Session {pdn} deleted while provisioning"))?;
        bearer.set_uplink_rate(bearer_config.uplink_rate);
        bearer.set_downlink_rate(bearer_config.downlink_rate);
        if idx == 0 {
            pdn.set_default_bearer(&bearer)?;
        }
    }

    info!(
        logger,
        "Provisioned session {} with {} bearers",
        pdn,
        session.bearers.len()
    );
    Ok(())
}
