//! Proxy plumbing on both ends of the tunnel.
//!
//! The client side runs a local SOCKS5 listener and opens one encrypted
//! tunnel per accepted connection. The server side reads the target address
//! off the decrypted stream and relays bytes to it. There is no
//! multiplexing: a proxied connection and its tunnel live and die together.

pub mod relay;
pub mod socks5;

pub use relay::relay_connection;
pub use socks5::run_socks5_proxy;
