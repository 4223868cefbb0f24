use super::{DataNetwork, MockSgw, RecordingSink};
use anyhow::Result;
use gwcore::userplane::DataPlane;
use gwcore::{ApnConfig, Bearer, Config, ControlPlane, Gateway, PdnConnection};
use slog::{Drain, Logger, o};
use std::net::Ipv4Addr;
use std::sync::Arc;

pub const APN: &str = "test.apn";
pub const APN_GW: Ipv4Addr = Ipv4Addr::new(127, 0, 0, 1);
pub const SGW_ADDR: Ipv4Addr = Ipv4Addr::new(127, 1, 0, 1);
pub const SGW_DEFAULT_BEARER_TEID: u32 = 1;
pub const SGW_DEDICATED_BEARER_TEID: u32 = 2;

pub fn init_logging() -> Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::CompactFormat::new(decorator).build();
    let drain = std::sync::Mutex::new(drain).fuse();
    let drain = slog_envlogger::new(drain);
    slog::Logger::root(drain, o!())
}

/// One session on `APN` with a default and a dedicated bearer, and a data plane that
/// records what it forwards.
pub struct Fixture {
    pub control_plane: Arc<ControlPlane>,
    pub data_plane: DataPlane<Arc<RecordingSink>>,
    pub sink: Arc<RecordingSink>,
    pub pdn: Arc<PdnConnection>,
    pub default_bearer: Arc<Bearer>,
    pub dedicated_bearer: Arc<Bearer>,
}

pub fn init() -> Result<Fixture> {
    let logger = init_logging();
    let control_plane = Arc::new(ControlPlane::new(logger.new(o!("cp" => 1))));
    control_plane.add_apn(APN, APN_GW)?;

    let pdn = control_plane
        .create_pdn_connection(APN, SGW_ADDR, SGW_DEFAULT_BEARER_TEID)
        .ok_or_else(|| anyhow::anyhow!("Failed to create session"))?;
    let default_bearer = control_plane
        .create_bearer(&pdn, SGW_DEFAULT_BEARER_TEID)
        .ok_or_else(|| anyhow::anyhow!("Failed to create default bearer"))?;
    pdn.set_default_bearer(&default_bearer)?;
    let dedicated_bearer = control_plane
        .create_bearer(&pdn, SGW_DEDICATED_BEARER_TEID)
        .ok_or_else(|| anyhow::anyhow!("Failed to create dedicated bearer"))?;

    let sink = Arc::new(RecordingSink::default());
    let data_plane = DataPlane::new(control_plane.clone(), sink.clone());

    Ok(Fixture {
        control_plane,
        data_plane,
        sink,
        pdn,
        default_bearer,
        dedicated_bearer,
    })
}

/// A gateway on loopback with ephemeral local ports, an SGW peer and an APN gateway peer.
pub async fn start_gateway(
    apn_gw_ip: &str,
    sgw_ip: &str,
) -> Result<(Gateway, MockSgw, DataNetwork, Logger)> {
    let logger = init_logging();
    let sgw = MockSgw::new(sgw_ip, &logger).await?;
    let dn = DataNetwork::new(apn_gw_ip, &logger).await?;

    let config = Config {
        local_ip: Some(Ipv4Addr::LOCALHOST),
        s1u_port: 0,
        sgi_port: 0,
        sgw_gtpu_port: sgw.local_addr()?.port(),
        apn_gateway_port: dn.local_addr()?.port(),
        apns: vec![ApnConfig {
            name: APN.to_string(),
            gateway: apn_gw_ip.parse()?,
        }],
        ..Config::default()
    };
    let gw = Gateway::start(config, logger.new(o!("gw" => 1)))?;
    Ok((gw, sgw, dn, logger))
}
