pub mod record;
pub mod labels;
pub mod stream;
pub mod sink;

#[cfg(feature = "loki")]
pub mod loki;

pub mod noop_sink;
pub mod diagnostics;
pub mod shipper;
pub mod worker;
pub mod context;
pub mod emitter;
pub mod lifecycle;
pub mod layer;
pub mod init;
pub mod env;
pub mod claims;
