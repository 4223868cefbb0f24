mod data_network;
mod mock_sgw;
pub mod framework;

pub use data_network::DataNetwork;
pub use mock_sgw::MockSgw;
pub use recording_sink::RecordingSink;
