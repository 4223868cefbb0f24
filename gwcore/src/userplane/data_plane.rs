use crate::ControlPlane;
use std::net::Ipv4Addr;
use std::sync::Arc;

pub type Packet = Vec<u8>;

/// Where the data plane sends packets that it has decided to forward.  Delivery failures
/// belong to the sink.
pub trait ForwardingSink: Send + Sync + 'static {
    fn forward_to_apn(&self, apn_gateway: Ipv4Addr, packet: Packet);
    fn forward_to_sgw(&self, sgw_address: Ipv4Addr, sgw_dp_teid: u32, packet: Packet);
}

impl<S: ForwardingSink> ForwardingSink for Arc<S> {
    fn forward_to_apn(&self, apn_gateway: Ipv4Addr, packet: Packet) {
        (**self).forward_to_apn(apn_gateway, packet)
    }
    fn forward_to_sgw(&self, sgw_address: Ipv4Addr, sgw_dp_teid: u32, packet: Packet) {
        (**self).forward_to_sgw(sgw_address, sgw_dp_teid, packet)
    }
}

/// Per-packet forwarding decisions.  Reads the control plane's tables but never changes them.
/// Anything that can't be routed, or is over its bearer's rate, is silently dropped.
pub struct DataPlane<S: ForwardingSink> {
    control_plane: Arc<ControlPlane>,
    sink: S,
}

impl<S: ForwardingSink> DataPlane<S> {
    pub fn new(control_plane: Arc<ControlPlane>, sink: S) -> Self {
        DataPlane {
            control_plane,
            sink,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// SGW -> APN gateway, keyed by our TEID.
    pub fn handle_uplink(&self, dp_teid: u32, packet: Packet) {
        let Some(bearer) = self.control_plane.find_bearer_by_dp_teid(dp_teid) else {
            return;
        };
        if !bearer.check_uplink_rate(packet.len()) {
            return;
        }
        let Some(pdn) = bearer.pdn_connection() else {
            return;
        };
        self.sink.forward_to_apn(pdn.apn_gateway(), packet);
    }

    /// APN gateway -> SGW, keyed by UE IP, always on the default bearer.
    pub fn handle_downlink(&self, ue_ip: Ipv4Addr, packet: Packet) {
        let Some(pdn) = self.control_plane.find_pdn_by_ip_address(ue_ip) else {
            return;
        };
        let Some(bearer) = pdn.default_bearer() else {
            return;
        };
        if !bearer.check_downlink_rate(packet.len()) {
            return;
        }
        self.sink
            .forward_to_sgw(pdn.sgw_address(), bearer.sgw_dp_teid(), packet);
    }
}
