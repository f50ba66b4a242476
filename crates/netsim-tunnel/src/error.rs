use thiserror::Error;

/// Fatal at startup: the TUN device could not be created or configured.
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("failed to create tun device {name:?}: {source}")]
    Create {
        name: String,
        #[source]
        source: tun::Error,
    },
}
