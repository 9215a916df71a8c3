mod config;
mod endpoint;
mod error;
mod port;
mod segment;

pub use config::Config;
pub use endpoint::Endpoint;
pub use error::Error;
pub use port::{DatagramPort, UdpPort};
pub use segment::Segment;
