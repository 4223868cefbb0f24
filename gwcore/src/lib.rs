mod control_plane;
mod data;
mod gateway;
pub mod userplane;

pub use control_plane::ControlPlane;
pub use data::*;
pub use gateway::Gateway;
