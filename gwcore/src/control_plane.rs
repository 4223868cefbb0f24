//! control_plane - owns every PDN connection and bearer, and the tables used to route to them

use crate::{Bearer, DEFAULT_UE_IP_POOL_BASE, GatewayError, PdnConnection};
use parking_lot::RwLock;
use slog::{Logger, info, warn};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::net::Ipv4Addr;
use std::sync::Arc;

struct Tables {
    apns: HashMap<String, Ipv4Addr>,
    pdns: HashMap<u32, Arc<PdnConnection>>,
    pdns_by_ue_ip: HashMap<Ipv4Addr, Arc<PdnConnection>>,
    bearers: HashMap<u32, Arc<Bearer>>,

    // Identifier sequences.  Never reused for the life of the ControlPlane.
    next_cp_teid: u32,
    next_dp_teid: u32,
    next_ue_ip: u32,
}

impl Tables {
    fn allocate_cp_teid(&mut self) -> u32 {
        let cp_teid = self.next_cp_teid;
        self.next_cp_teid = self.next_cp_teid.wrapping_add(1);
        cp_teid
    }

    fn allocate_dp_teid(&mut self) -> u32 {
        let dp_teid = self.next_dp_teid;
        self.next_dp_teid = self.next_dp_teid.wrapping_add(1);
        dp_teid
    }

    fn allocate_ue_ip(&mut self) -> Ipv4Addr {
        let ue_ip = Ipv4Addr::from(self.next_ue_ip);
        self.next_ue_ip = self.next_ue_ip.wrapping_add(1);
        ue_ip
    }

    fn is_live(&self, pdn: &Arc<PdnConnection>) -> bool {
        self.pdns
            .get(&pdn.cp_teid())
            .is_some_and(|p| Arc::ptr_eq(p, pdn))
    }
}

/// Session registry.  Mutations take the write lock, so identifier allocation and the
/// four tables are always updated together.  Lookups share the read lock.
pub struct ControlPlane {
    tables: RwLock<Tables>,
    logger: Logger,
}

impl ControlPlane {
    pub fn new(logger: Logger) -> Self {
        Self::with_ue_ip_pool(DEFAULT_UE_IP_POOL_BASE, logger)
    }

    pub fn with_ue_ip_pool(ue_ip_pool_base: Ipv4Addr, logger: Logger) -> Self {
        ControlPlane {
            tables: RwLock::new(Tables {
                apns: HashMap::new(),
                pdns: HashMap::new(),
                pdns_by_ue_ip: HashMap::new(),
                bearers: HashMap::new(),
                next_cp_teid: 1,
                next_dp_teid: 1,
                next_ue_ip: ue_ip_pool_base.into(),
            }),
            logger,
        }
    }

    /// Register an APN.  The first registration of a name wins.
    pub fn add_apn(&self, name: &str, gateway: Ipv4Addr) -> Result<(), GatewayError> {
        match self.tables.write().apns.entry(name.to_string()) {
            Entry::Occupied(e) => {
                let existing = *e.get();
                warn!(
                    self.logger,
                    "Ignoring APN {name} -> {gateway}, already registered with gateway {existing}"
                );
                Err(GatewayError::DuplicateApn {
                    name: name.to_string(),
                    existing,
                })
            }
            Entry::Vacant(e) => {
                e.insert(gateway);
                info!(self.logger, "Registered APN {name} -> {gateway}");
                Ok(())
            }
        }
    }

    pub fn apn_gateway(&self, name: &str) -> Option<Ipv4Addr> {
        self.tables.read().apns.get(name).copied()
    }

    /// Create a session on a registered APN.  Returns None if the APN is unknown.
    pub fn create_pdn_connection(
        &self,
        apn: &str,
        sgw_address: Ipv4Addr,
        sgw_cp_teid: u32,
    ) -> Option<Arc<PdnConnection>> {
        let pdn = {
            let mut tables = self.tables.write();
            let apn_gateway = *tables.apns.get(apn)?;
            let cp_teid = tables.allocate_cp_teid();
            let ue_ip = tables.allocate_ue_ip();

            let pdn = Arc::new(PdnConnection::new(cp_teid, apn_gateway, ue_ip));
            pdn.set_sgw_address(sgw_address);
            pdn.set_sgw_cp_teid(sgw_cp_teid);

            tables.pdns.insert(cp_teid, pdn.clone());
            tables.pdns_by_ue_ip.insert(ue_ip, pdn.clone());
            pdn
        };
        info!(
            self.logger,
            "Created session {} on APN {}, SGW {}-{:#x}", pdn, apn, sgw_address, sgw_cp_teid
        );
        Some(pdn)
    }

    /// Delete a session together with all of its bearers.  Unknown TEIDs are ignored.
    pub fn delete_pdn_connection(&self, cp_teid: u32) -> Option<Arc<PdnConnection>> {
        let (pdn, bearers) = {
            let mut tables = self.tables.write();
            let pdn = tables.pdns.remove(&cp_teid)?;
            tables.pdns_by_ue_ip.remove(&pdn.ue_ip());
            let bearers = pdn.take_bearers();
            for bearer in bearers.iter() {
                tables.bearers.remove(&bearer.dp_teid());
            }
            (pdn, bearers)
        };
        info!(
            self.logger,
            "Deleted session {} and {} bearers",
            pdn,
            bearers.len()
        );
        Some(pdn)
    }

    /// Create a bearer in a live session.  Returns None if the session has been deleted.
    pub fn create_bearer(&self, pdn: &Arc<PdnConnection>, sgw_dp_teid: u32) -> Option<Arc<Bearer>> {
        let bearer = {
            let mut tables = self.tables.write();
            if !tables.is_live(pdn) {
                return None;
            }
            let dp_teid = tables.allocate_dp_teid();
            let bearer = Arc::new(Bearer::new(dp_teid, pdn));
            bearer.set_sgw_dp_teid(sgw_dp_teid);

            tables.bearers.insert(dp_teid, bearer.clone());
            pdn.add_bearer(bearer.clone());
            bearer
        };
        info!(self.logger, "Created bearer {} in session {}", bearer, pdn);
        Some(bearer)
    }

    /// Delete a bearer and unlink it from its session.  Unknown TEIDs are ignored.
    pub fn delete_bearer(&self, dp_teid: u32) -> Option<Arc<Bearer>> {
        let bearer = {
            let mut tables = self.tables.write();
            let bearer = tables.bearers.remove(&dp_teid)?;
            if let Some(pdn) = bearer.pdn_connection() {
                pdn.remove_bearer(dp_teid);
            }
            bearer
        };
        info!(self.logger, "Deleted bearer {}", bearer);
        Some(bearer)
    }

    pub fn find_pdn_by_cp_teid(&self, cp_teid: u32) -> Option<Arc<PdnConnection>> {
        self.tables.read().pdns.get(&cp_teid).cloned()
    }

    pub fn find_pdn_by_ip_address(&self, ue_ip: Ipv4Addr) -> Option<Arc<PdnConnection>> {
        self.tables.read().pdns_by_ue_ip.get(&ue_ip).cloned()
    }

    pub fn find_bearer_by_dp_teid(&self, dp_teid: u32) -> Option<Arc<Bearer>> {
        self.tables.read().bearers.get(&dp_teid).cloned()
    }

    /// Reconfigure both directions of a bearer.  Returns false if there is no such bearer.
    pub fn set_bearer_rates(&self, dp_teid: u32, uplink_rate: u32, downlink_rate: u32) -> bool {
        let Some(bearer) = self.find_bearer_by_dp_teid(dp_teid) else {
            return false;
        };
        bearer.set_uplink_rate(uplink_rate);
        bearer.set_downlink_rate(downlink_rate);
        info!(
            self.logger,
            "Bearer {} rates set to UL {} bps, DL {} bps", bearer, uplink_rate, downlink_rate
        );
        true
    }

    pub fn pdn_count(&self) -> usize {
        self.tables.read().pdns.len()
    }

    pub fn bearer_count(&self) -> usize {
        self.tables.read().bearers.len()
    }
}
