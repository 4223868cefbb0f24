mod data_plane;
mod downlink_pipeline;
mod gtpu;
mod gtpu_sink;
mod packet_processor;
mod uplink_pipeline;

use downlink_pipeline::{DownlinkCounters, DownlinkPipeline};
use gtpu_sink::SinkCounters;
use uplink_pipeline::{UplinkCounters, UplinkPipeline};

pub use data_plane::{DataPlane, ForwardingSink, Packet};
pub use gtpu_sink::GtpuSink;
pub use packet_processor::{PacketProcessor, PacketProcessorConfig};

const GTP_HEADER_LEN: usize = 8;
const GTP_MESSAGE_TYPE_GPDU: u8 = 255; // TS29.281, table 6.1-1
const IPV4_HEADER_LEN: usize = 20;
const MAX_DATAGRAM_LEN: usize = 2000;
