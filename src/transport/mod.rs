//! Link probing and the info request.

pub mod http;
pub mod probe;

pub use http::{HttpInfoClient, InfoResponse, NetworkClient, info_url};
pub use probe::{ConnectivityProbe, TcpConnectivityProbe};
