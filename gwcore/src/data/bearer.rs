use super::{PdnConnection, RateLimiter};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

/// A data tunnel within a PDN connection.  Bearers are created and destroyed by the ControlPlane.
#[derive(Debug)]
pub struct Bearer {
    dp_teid: u32,
    sgw_dp_teid: AtomicU32,
    pdn: Weak<PdnConnection>,
    uplink_limiter: RateLimiter,
    downlink_limiter: RateLimiter,
}

impl Bearer {
    pub(crate) fn new(dp_teid: u32, pdn: &Arc<PdnConnection>) -> Self {
        Bearer {
            dp_teid,
            sgw_dp_teid: AtomicU32::new(0),
            pdn: Arc::downgrade(pdn),
            uplink_limiter: RateLimiter::new(0),
            downlink_limiter: RateLimiter::new(0),
        }
    }

    /// Locally assigned TEID, the key for uplink packets.
    pub fn dp_teid(&self) -> u32 {
        self.dp_teid
    }

    /// TEID the SGW expects on downlink packets for this bearer.
    pub fn sgw_dp_teid(&self) -> u32 {
        self.sgw_dp_teid.load(Ordering::Relaxed)
    }

    pub fn set_sgw_dp_teid(&self, teid: u32) {
        self.sgw_dp_teid.store(teid, Ordering::Relaxed)
    }

    /// The owning PDN connection, if it is still alive.
    pub fn pdn_connection(&self) -> Option<Arc<PdnConnection>> {
        self.pdn.upgrade()
    }

    pub fn check_uplink_rate(&self, packet_size_bytes: usize) -> bool {
        self.uplink_limiter.consume(bytes_to_bits(packet_size_bytes))
    }

    pub fn check_downlink_rate(&self, packet_size_bytes: usize) -> bool {
        self.downlink_limiter.consume(bytes_to_bits(packet_size_bytes))
    }

    pub fn set_uplink_rate(&self, rate_bps: u32) {
        self.uplink_limiter.set_rate(rate_bps)
    }

    pub fn set_downlink_rate(&self, rate_bps: u32) {
        self.downlink_limiter.set_rate(rate_bps)
    }

    pub fn uplink_rate(&self) -> u32 {
        self.uplink_limiter.rate()
    }

    pub fn downlink_rate(&self) -> u32 {
        self.downlink_limiter.rate()
    }
}

impl std::fmt::Display for Bearer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:#x},{:#x})", self.dp_teid, self.sgw_dp_teid())
    }
}

fn bytes_to_bits(size_bytes: usize) -> u64 {
    (size_bytes as u64).saturating_mul(8)
}
