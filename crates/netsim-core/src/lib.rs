//! Core engine for the drone-relay network simulator: link emulation,
//! pluggable routing policies, and the packet-lifecycle log sink. Tunnel I/O
//! and host-specific packet rewriting live in `netsim-tunnel`; JSON config
//! loading and the CLI live in `netsim-cli`.

pub mod adapter;
pub mod engine;
pub mod error;
pub mod link;
pub mod logsink;
pub mod packet;
pub mod policy;
pub mod registry;
pub mod trace;

pub use adapter::{PacketAdapter, TunnelAdapter};
pub use engine::{Engine, EngineConfig};
pub use error::{ConfigError, IngressError, TraceError};
pub use link::{DelayEmulator, LinkEmulator, LinkId, TraceEmulator};
pub use packet::{Address, Packet, PacketIdAllocator, PacketKind};
pub use policy::{BestNeighborPolicy, BroadcastPolicy, OraclePolicy, RoutingPolicy};
pub use registry::LinkTable;
pub use trace::{LossSchedule, TraceSchedule, SLOT_BYTES};
