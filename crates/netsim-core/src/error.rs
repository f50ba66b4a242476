use std::path::PathBuf;

use thiserror::Error;

/// Fatal at startup: malformed topology/general config. Aborts the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown routing algorithm {0:?}")]
    UnknownRoutingAlgorithm(String),
    #[error("invalid address {0:?}: {1}")]
    InvalidAddress(String, std::num::ParseIntError),
    #[error("missing or invalid required field {0:?} in {1}: {2}")]
    MissingField(&'static str, String, String),
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Trace(#[from] TraceError),
}

/// Fatal at startup: a trace or loss schedule file failed to parse.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("failed to read trace file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("trace file {0:?} is empty")]
    Empty(PathBuf),
    #[error("non-integer offset {0:?} on line {1} of {2:?}")]
    NonIntegerOffset(String, usize, PathBuf),
    #[error("offsets are not strictly increasing at line {0} of {1:?}")]
    NonMonotoneOffsets(usize, PathBuf),
    #[error("malformed loss schedule row {0:?} in {1:?}")]
    MalformedLossRow(String, PathBuf),
    #[error("loss probability {0} out of [0,1] range in {1:?}")]
    ProbabilityOutOfRange(f64, PathBuf),
}

/// Fatal: ingress bytes did not decode as IPv4 + (UDP|TCP).
#[derive(Debug, Error)]
pub enum IngressError {
    #[error("failed to read from tunnel device: {0}")]
    DeviceRead(#[source] std::io::Error),
    #[error("failed to write to tunnel device: {0}")]
    DeviceWrite(#[source] std::io::Error),
    #[error("ingress datagram did not parse as IPv4")]
    NotIpv4,
    #[error("ingress datagram's transport layer is neither UDP nor TCP")]
    UnsupportedTransport,
    #[error("ingress datagram is truncated or has an inconsistent header length")]
    Truncated,
}
