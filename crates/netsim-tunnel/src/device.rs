use std::io::{Read, Write};
use std::net::Ipv4Addr;
use std::sync::Mutex;

use bytes::Bytes;
use netsim_core::TunnelAdapter;

use crate::error::TunnelError;

/// A TUN device opened for the lifetime of the simulation, shared between
/// the ingress-read thread and the egress-write path from the dispatcher.
pub struct TunDevice {
    inner: Mutex<tun::platform::Device>,
    mtu: usize,
}

impl TunDevice {
    /// Opens a point-to-point TUN device: `address` is this end's address,
    /// `destination` is the peer address packets are addressed to on the
    /// link (`ifconfig <dev> <address> dstaddr <destination>` in the
    /// original shell-scripted setup this replaces).
    pub fn open(
        name: &str,
        address: Ipv4Addr,
        destination: Ipv4Addr,
        netmask: Ipv4Addr,
        mtu: u16,
    ) -> Result<Self, TunnelError> {
        let mut config = tun::Configuration::default();
        config
            .name(name)
            .address(address)
            .destination(destination)
            .netmask(netmask)
            .mtu(mtu as i32)
            .up();

        let device = tun::create(&config).map_err(|source| TunnelError::Create {
            name: name.to_string(),
            source,
        })?;

        Ok(Self {
            inner: Mutex::new(device),
            mtu: mtu as usize,
        })
    }
}

impl TunnelAdapter for TunDevice {
    fn recv(&self) -> std::io::Result<Bytes> {
        let mut buf = vec![0u8; self.mtu.max(1500)];
        let mut device = self.inner.lock().expect("tun device poisoned");
        let n = device.read(&mut buf)?;
        buf.truncate(n);
        Ok(Bytes::from(buf))
    }

    fn send(&self, datagram: &[u8]) -> std::io::Result<()> {
        let mut device = self.inner.lock().expect("tun device poisoned");
        device.write_all(datagram)
    }
}
