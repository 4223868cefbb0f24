use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use slog::{Logger, error, info};
use std::fs;
use std::net::Ipv4Addr;

pub const DEFAULT_GTPU_PORT: u16 = 2152; // TS29.281
pub const DEFAULT_SGI_PORT: u16 = 2153;
pub const DEFAULT_UE_IP_POOL_BASE: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    // Local address for both the S1-U and SGi sockets.  If absent, the host's primary IPv4
    // address is used.
    pub local_ip: Option<Ipv4Addr>,

    // Local GTP-U port facing the SGWs.
    #[serde(default = "default_gtpu_port")]
    pub s1u_port: u16,

    // Local port facing the APN gateways.
    #[serde(default = "default_sgi_port")]
    pub sgi_port: u16,

    // Destination port for GTP-U packets sent to an SGW.
    #[serde(default = "default_gtpu_port")]
    pub sgw_gtpu_port: u16,

    // Destination port for packets sent to an APN gateway.
    #[serde(default = "default_sgi_port")]
    pub apn_gateway_port: u16,

    // First UE IP address handed out.  Addresses are allocated sequentially from here.
    #[serde(default = "default_ue_ip_pool_base")]
    pub ue_ip_pool_base: Ipv4Addr,

    #[serde(default)]
    pub apns: Vec<ApnConfig>,

    // Sessions provisioned at startup.
    #[serde(default)]
    pub sessions: Vec<SessionConfig>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ApnConfig {
    pub name: String,
    pub gateway: Ipv4Addr,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    pub apn: String,
    pub sgw_address: Ipv4Addr,
    pub sgw_cp_teid: u32,

    // The first bearer becomes the default bearer.
    #[serde(default)]
    pub bearers: Vec<BearerConfig>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BearerConfig {
    pub sgw_teid: u32,

    // Bits per second, 0 = unlimited.
    #[serde(default)]
    pub uplink_rate: u32,
    #[serde(default)]
    pub downlink_rate: u32,
}

fn default_gtpu_port() -> u16 {
    DEFAULT_GTPU_PORT
}

fn default_sgi_port() -> u16 {
    DEFAULT_SGI_PORT
}

fn default_ue_ip_pool_base() -> Ipv4Addr {
    DEFAULT_UE_IP_POOL_BASE
}

impl Default for Config {
    fn default() -> Self {
        Config {
            local_ip: None,
            s1u_port: DEFAULT_GTPU_PORT,
            sgi_port: DEFAULT_SGI_PORT,
            sgw_gtpu_port: DEFAULT_GTPU_PORT,
            apn_gateway_port: DEFAULT_SGI_PORT,
            ue_ip_pool_base: DEFAULT_UE_IP_POOL_BASE,
            apns: vec![],
            sessions: vec![],
        }
    }
}

impl std::str::FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.check()?;
        Ok(config)
    }
}

impl Config {
    /// Checks that don't need the control plane.  APN collisions and sessions naming unknown
    /// APNs are caught when the gateway registers them.
    pub fn check(&self) -> Result<()> {
        if let Some(ip) = self.local_ip {
            ensure!(
                !ip.is_unspecified(),
                "Unspecific IP address 0.0.0.0 not allowed for local IP - this must be an address that the SGW can send to"
            );
        }
        ensure!(
            !self.ue_ip_pool_base.is_unspecified(),
            "UE IP pool base must not be 0.0.0.0"
        );
        for session in &self.sessions {
            ensure!(
                !session.sgw_address.is_unspecified(),
                "Session on APN {} has unspecified SGW address",
                session.apn
            );
        }
        Ok(())
    }
}

/// Load the gateway config from file.
pub fn load_config_file(filename: &str, logger: &Logger) -> Result<Config> {
    let path = std::env::current_dir()?;
    let contents = fs::read_to_string(filename).inspect_err(|e| {
        error!(
            logger,
            "Failed to load config file {filename} (current directory {}) with error code {e}",
            path.display()
        )
    })?;
    let config: Config = contents
        .parse()
        .with_context(|| format!("Bad config file {filename}"))?;
    info!(
        logger,
        "Loaded {} APNs and {} sessions from {filename}",
        config.apns.len(),
        config.sessions.len()
    );
    Ok(config)
}
