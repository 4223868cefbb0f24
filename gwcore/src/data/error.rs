use std::net::Ipv4Addr;
use thiserror::Error;

/// Configuration and precondition failures.  Routine misses on the forwarding path are
/// not errors and never produce one of these.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum GatewayError {
    #[error("APN {name} already registered with gateway {existing}")]
    DuplicateApn { name: String, existing: Ipv4Addr },

    #[error("APN {0} is not registered")]
    UnknownApn(String),

    #[error("Bearer {dp_teid:#x} does not belong to session {cp_teid:#x}")]
    BearerNotInSession { dp_teid: u32, cp_teid: u32 },
}
