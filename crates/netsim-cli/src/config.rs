//! JSON simulation config: topology, routing algorithm, and tunnel
//! parameters. Mirrors the permissive-`Input` / strict-`resolve()` split used
//! throughout this codebase — a `*Input` struct derives `Deserialize` with
//! every field optional, and `.resolve()` turns it into the strict types the
//! engine actually runs on, surfacing every validation failure as a
//! [`ConfigError`].
//!
//! The wire shape is `{"topology": {...}, "general": {...}}`: `topology`
//! maps a source address to a map of destination address (or the `"base"`
//! sentinel for the terminal) to a tagged link description; `general`
//! carries addressing, queueing, and routing-algorithm parameters.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use netsim_core::error::ConfigError;
use netsim_core::link::{DelayEmulator, LinkEmulator, TraceEmulator};
use netsim_core::logsink;
use netsim_core::policy::{BestNeighborPolicy, BroadcastPolicy, OraclePolicy, RoutingPolicy};
use netsim_core::registry::LinkTable;
use netsim_core::trace::{LossSchedule, TraceSchedule};
use netsim_core::{Address, EngineConfig};

/// Point-to-point TUN device is always a peer pair, not a config knob.
const DEVICE_NETMASK: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 255);
const DEFAULT_MTU: u16 = 1500;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum LinkEntryInput {
    Delay { delay: u64 },
    Trace { file: PathBuf, loss: PathBuf },
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RoutingAlgorithmInput {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(rename = "updateLag")]
    update_lag: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct GeneralInput {
    #[serde(rename = "realSrcAddress")]
    real_src_address: Option<String>,
    #[serde(rename = "simulatedSrcAddress")]
    simulated_src_address: Option<i64>,
    #[serde(rename = "simulatedDstAddress")]
    simulated_dst_address: Option<i64>,
    #[serde(rename = "maxQueueLength")]
    max_queue_length: Option<usize>,
    #[serde(rename = "maxHops")]
    max_hops: Option<u32>,
    #[serde(rename = "devName")]
    dev_name: Option<String>,
    #[serde(rename = "devSrcAddr")]
    dev_src_addr: Option<String>,
    #[serde(rename = "devDstAddr")]
    dev_dst_addr: Option<String>,
    #[serde(rename = "routingTableNum")]
    routing_table_num: Option<String>,
    #[serde(rename = "routingAlgorithm")]
    routing_algorithm: RoutingAlgorithmInput,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SimulationConfigInput {
    topology: HashMap<String, HashMap<String, LinkEntryInput>>,
    general: GeneralInput,
}

pub struct TunSettings {
    pub name: String,
    pub address: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub mtu: u16,
}

/// Fully-resolved config, ready to build an [`Engine`](netsim_core::Engine).
pub struct ResolvedConfig {
    pub engine: EngineConfig,
    pub links: LinkTable,
    pub policy: Arc<dyn RoutingPolicy>,
    pub tun: TunSettings,
    /// Policy-routing table the host is expected to already route through
    /// (§6.3: configuring it is the host's precondition, not this binary's).
    pub routing_table_num: String,
}

fn required_field(value: &Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .clone()
        .ok_or_else(|| ConfigError::MissingField(name, "general".into(), "".into()))
}

fn required_ipv4(value: &Option<String>, name: &'static str) -> Result<Ipv4Addr, ConfigError> {
    let raw = required_field(value, name)?;
    raw.parse()
        .map_err(|_| ConfigError::MissingField(name, "general".into(), raw))
}

fn required_i64(value: Option<i64>, name: &'static str) -> Result<i64, ConfigError> {
    value.ok_or_else(|| ConfigError::MissingField(name, "general".into(), "".into()))
}

impl SimulationConfigInput {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let input: Self = serde_json::from_str(&text)?;
        Ok(input)
    }

    pub fn resolve(self, base_dir: &Path) -> Result<ResolvedConfig, ConfigError> {
        let general = self.general;

        let terminal: Address = required_i64(general.simulated_dst_address, "general.simulatedDstAddress")?;
        let source: Address = required_i64(general.simulated_src_address, "general.simulatedSrcAddress")?;

        // Validated but otherwise unused: wiring `realSrcAddress`/
        // `routingTableNum` into an `ip rule`/`ip route` policy-routing
        // setup is the host's precondition per §6.3, not something this
        // binary shells out to do itself.
        let _real_src_address: Ipv4Addr = required_ipv4(&general.real_src_address, "general.realSrcAddress")?;
        let routing_table_num = required_field(&general.routing_table_num, "general.routingTableNum")?;

        let link_queue_capacity = general
            .max_queue_length
            .ok_or_else(|| ConfigError::MissingField("general.maxQueueLength", "general".into(), "".into()))?
            .max(1);
        let max_hops = required_i64(general.max_hops.map(|h| h as i64), "general.maxHops")? as u32;

        let dev_name = required_field(&general.dev_name, "general.devName")?;
        let dev_src_addr = required_ipv4(&general.dev_src_addr, "general.devSrcAddr")?;
        let dev_dst_addr = required_ipv4(&general.dev_dst_addr, "general.devDstAddr")?;

        let policy = resolve_routing_algorithm(&general.routing_algorithm, terminal)?;

        let mut table = LinkTable::new();
        let mut link_index: u64 = 0;
        let mut src_keys: Vec<&String> = self.topology.keys().collect();
        src_keys.sort();
        for src_key in src_keys {
            let links_by_dst = &self.topology[src_key];
            let src = parse_address(src_key)?;
            let mut dst_keys: Vec<&String> = links_by_dst.keys().collect();
            dst_keys.sort();
            for dst_key in dst_keys {
                let entry = &links_by_dst[dst_key];
                let dst = if dst_key == "base" {
                    terminal
                } else {
                    parse_address(dst_key)?
                };

                let emulator: Arc<dyn LinkEmulator> = match entry {
                    LinkEntryInput::Delay { delay } => {
                        Arc::new(DelayEmulator::with_queue_capacity(Duration::from_millis(*delay), link_queue_capacity))
                    }
                    LinkEntryInput::Trace { file, loss } => {
                        let trace_path = resolve_relative(base_dir, file);
                        let trace = TraceSchedule::load(&trace_path).map_err(ConfigError::Trace)?;
                        let loss_path = resolve_relative(base_dir, loss);
                        let loss = LossSchedule::load(&loss_path).map_err(ConfigError::Trace)?;
                        let seed = link_index ^ 0x9E37_79B9_7F4A_7C15;
                        logsink::start_trace(src, dst);
                        Arc::new(TraceEmulator::with_queue_capacity(trace, loss, seed, link_queue_capacity))
                    }
                };
                link_index += 1;

                table.insert(src, dst, emulator);
            }
        }

        let engine = EngineConfig {
            source,
            terminal,
            max_hops,
            terminal_ipv4: dev_dst_addr,
        };

        let tun = TunSettings {
            name: dev_name,
            address: dev_src_addr,
            destination: dev_dst_addr,
            netmask: DEVICE_NETMASK,
            mtu: DEFAULT_MTU,
        };

        Ok(ResolvedConfig {
            engine,
            links: table,
            policy,
            tun,
            routing_table_num,
        })
    }
}

fn resolve_routing_algorithm(input: &RoutingAlgorithmInput, terminal: Address) -> Result<Arc<dyn RoutingPolicy>, ConfigError> {
    let kind = input
        .kind
        .clone()
        .ok_or_else(|| ConfigError::MissingField("general.routingAlgorithm.type", "general".into(), "".into()))?;

    match kind.as_str() {
        "broadcast" => Ok(Arc::new(BroadcastPolicy)),
        "oracle" => Ok(Arc::new(OraclePolicy::new(terminal))),
        "best_neighbor" => {
            let update_lag_ms = input.update_lag.ok_or_else(|| {
                ConfigError::MissingField("general.routingAlgorithm.updateLag", "general".into(), "".into())
            })?;
            Ok(BestNeighborPolicy::new(terminal, Duration::from_millis(update_lag_ms)))
        }
        other => Err(ConfigError::UnknownRoutingAlgorithm(other.to_string())),
    }
}

fn parse_address(raw: &str) -> Result<Address, ConfigError> {
    raw.parse()
        .map_err(|source| ConfigError::InvalidAddress(raw.to_string(), source))
}

fn resolve_relative(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json(routing: &str) -> String {
        format!(
            r#"{{
                "topology": {{
                    "-1": {{ "1": {{ "type": "delay", "delay": 10 }} }},
                    "1": {{ "base": {{ "type": "delay", "delay": 10 }} }}
                }},
                "general": {{
                    "realSrcAddress": "10.0.0.5",
                    "simulatedSrcAddress": -1,
                    "simulatedDstAddress": 5,
                    "maxQueueLength": 32,
                    "maxHops": 8,
                    "devName": "netsim0",
                    "devSrcAddr": "10.10.0.1",
                    "devDstAddr": "10.10.0.2",
                    "routingTableNum": "1",
                    "routingAlgorithm": {routing}
                }}
            }}"#
        )
    }

    #[test]
    fn base_sentinel_resolves_to_terminal_address() {
        let json = sample_json(r#"{"type": "broadcast"}"#);
        let input: SimulationConfigInput = serde_json::from_str(&json).unwrap();
        let resolved = input.resolve(Path::new(".")).unwrap();
        assert!(resolved.links.emulator((1, 5)).is_some());
        assert_eq!(resolved.engine.terminal, 5);
        assert_eq!(resolved.engine.source, -1);
    }

    #[test]
    fn single_delay_link_resolves() {
        let json = r#"{
            "topology": {
                "0": {
                    "1": {"type": "delay", "delay": 1}
                }
            },
            "general": {
                "realSrcAddress": "10.0.0.5",
                "simulatedSrcAddress": 0,
                "simulatedDstAddress": 5,
                "maxQueueLength": 32,
                "maxHops": 8,
                "devName": "netsim0",
                "devSrcAddr": "10.10.0.1",
                "devDstAddr": "10.10.0.2",
                "routingTableNum": "1",
                "routingAlgorithm": {"type": "broadcast"}
            }
        }"#;
        let input: SimulationConfigInput = serde_json::from_str(json).unwrap();
        let resolved = input.resolve(Path::new(".")).unwrap();
        assert!(resolved.links.emulator((0, 1)).is_some());
    }

    #[test]
    fn rejects_unknown_routing_algorithm() {
        let json = sample_json(r#"{"type": "quantum"}"#);
        let input: SimulationConfigInput = serde_json::from_str(&json).unwrap();
        let err = input.resolve(Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRoutingAlgorithm(_)));
    }

    #[test]
    fn best_neighbor_requires_update_lag() {
        let json = sample_json(r#"{"type": "best_neighbor"}"#);
        let input: SimulationConfigInput = serde_json::from_str(&json).unwrap();
        let err = input.resolve(Path::new(".")).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField("general.routingAlgorithm.updateLag", _, _)
        ));
    }

    #[test]
    fn best_neighbor_with_update_lag_resolves() {
        let json = sample_json(r#"{"type": "best_neighbor", "updateLag": 50}"#);
        let input: SimulationConfigInput = serde_json::from_str(&json).unwrap();
        assert!(input.resolve(Path::new(".")).is_ok());
    }

    #[test]
    fn missing_general_field_is_a_config_error() {
        let json = r#"{"topology": {}, "general": {"simulatedDstAddress": 5}}"#;
        let input: SimulationConfigInput = serde_json::from_str(json).unwrap();
        assert!(input.resolve(Path::new(".")).is_err());
    }
}
