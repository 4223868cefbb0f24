use super::{Bearer, GatewayError};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

#[derive(Debug)]
struct SgwState {
    sgw_address: Ipv4Addr,
    sgw_cp_teid: u32,
    bearers: BTreeMap<u32, Arc<Bearer>>,
    default_bearer: Option<Arc<Bearer>>,
}

/// A subscriber's data session.  The identity fields are fixed at creation; the SGW side
/// and the bearer set change over the session's life.
#[derive(Debug)]
pub struct PdnConnection {
    cp_teid: u32,
    apn_gateway: Ipv4Addr,
    ue_ip: Ipv4Addr,
    state: Mutex<SgwState>,
}

impl PdnConnection {
    pub fn new(cp_teid: u32, apn_gateway: Ipv4Addr, ue_ip: Ipv4Addr) -> Self {
        PdnConnection {
            cp_teid,
            apn_gateway,
            ue_ip,
            state: Mutex::new(SgwState {
                sgw_address: Ipv4Addr::UNSPECIFIED,
                sgw_cp_teid: 0,
                bearers: BTreeMap::new(),
                default_bearer: None,
            }),
        }
    }

    pub fn cp_teid(&self) -> u32 {
        self.cp_teid
    }

    pub fn apn_gateway(&self) -> Ipv4Addr {
        self.apn_gateway
    }

    pub fn ue_ip(&self) -> Ipv4Addr {
        self.ue_ip
    }

    pub fn sgw_address(&self) -> Ipv4Addr {
        self.state.lock().sgw_address
    }

    pub fn set_sgw_address(&self, sgw_address: Ipv4Addr) {
        self.state.lock().sgw_address = sgw_address;
    }

    pub fn sgw_cp_teid(&self) -> u32 {
        self.state.lock().sgw_cp_teid
    }

    pub fn set_sgw_cp_teid(&self, sgw_cp_teid: u32) {
        self.state.lock().sgw_cp_teid = sgw_cp_teid;
    }

    pub fn default_bearer(&self) -> Option<Arc<Bearer>> {
        self.state.lock().default_bearer.clone()
    }

    /// Make one of this session's bearers the default, used for downlink traffic.
    pub fn set_default_bearer(&self, bearer: &Arc<Bearer>) -> Result<(), GatewayError> {
        let mut state = self.state.lock();
        match state.bearers.get(&bearer.dp_teid()) {
            Some(b) if Arc::ptr_eq(b, bearer) => {
                state.default_bearer = Some(bearer.clone());
                Ok(())
            }
            _ => Err(GatewayError::BearerNotInSession {
                dp_teid: bearer.dp_teid(),
                cp_teid: self.cp_teid,
            }),
        }
    }

    /// Snapshot of the bearers, in TEID order.
    pub fn bearers(&self) -> Vec<Arc<Bearer>> {
        self.state.lock().bearers.values().cloned().collect()
    }

    pub(crate) fn add_bearer(&self, bearer: Arc<Bearer>) {
        self.state.lock().bearers.insert(bearer.dp_teid(), bearer);
    }

    pub(crate) fn remove_bearer(&self, dp_teid: u32) -> Option<Arc<Bearer>> {
        let mut state = self.state.lock();
        let removed = state.bearers.remove(&dp_teid)?;
        if state
            .default_bearer
            .as_ref()
            .is_some_and(|b| b.dp_teid() == dp_teid)
        {
            state.default_bearer = None;
        }
        Some(removed)
    }

    pub(crate) fn take_bearers(&self) -> Vec<Arc<Bearer>> {
        let mut state = self.state.lock();
        state.default_bearer = None;
        std::mem::take(&mut state.bearers).into_values().collect()
    }
}

impl std::fmt::Display for PdnConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:#x},{})", self.cp_teid, self.ue_ip)
    }
}
