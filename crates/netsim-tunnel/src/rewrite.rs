use std::net::Ipv4Addr;

use bytes::Bytes;
use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::{checksum as ipv4_checksum, Ipv4Packet, MutableIpv4Packet};
use pnet_packet::tcp::{self, MutableTcpPacket};
use pnet_packet::udp::{self, MutableUdpPacket};
use pnet_packet::Packet as _;

use netsim_core::adapter::PacketAdapter;
use netsim_core::error::IngressError;

/// Validates ingress datagrams as IPv4 + (UDP|TCP), and on egress rewrites
/// the source address (and recomputes both the IPv4 and transport checksums)
/// so the real receiver sees a consistent source regardless of which
/// simulated path a packet took.
#[derive(Debug, Default)]
pub struct Ipv4RewriteAdapter;

const MIN_IPV4_HEADER_BYTES: usize = 20;

impl PacketAdapter for Ipv4RewriteAdapter {
    fn validate_ingress(&self, raw: &Bytes) -> Result<(), IngressError> {
        let ipv4 = Ipv4Packet::new(raw).ok_or(IngressError::Truncated)?;
        if ipv4.get_version() != 4 {
            return Err(IngressError::NotIpv4);
        }
        let header_len = (ipv4.get_header_length() as usize) * 4;
        if header_len < MIN_IPV4_HEADER_BYTES || raw.len() < header_len {
            return Err(IngressError::Truncated);
        }
        match ipv4.get_next_level_protocol() {
            IpNextHeaderProtocols::Udp | IpNextHeaderProtocols::Tcp => Ok(()),
            _ => Err(IngressError::UnsupportedTransport),
        }
    }

    fn rewrite_source(&self, raw: &Bytes, new_src: Ipv4Addr) -> Result<Bytes, IngressError> {
        let mut buf = raw.to_vec();

        let (header_len, protocol, destination) = {
            let ipv4 = Ipv4Packet::new(&buf).ok_or(IngressError::Truncated)?;
            (
                (ipv4.get_header_length() as usize) * 4,
                ipv4.get_next_level_protocol(),
                ipv4.get_destination(),
            )
        };
        if header_len < MIN_IPV4_HEADER_BYTES || buf.len() < header_len {
            return Err(IngressError::Truncated);
        }

        {
            let mut ipv4 = MutableIpv4Packet::new(&mut buf).ok_or(IngressError::Truncated)?;
            ipv4.set_source(new_src);
            ipv4.set_checksum(0);
        }
        let ip_checksum = {
            let ipv4 = Ipv4Packet::new(&buf).ok_or(IngressError::Truncated)?;
            ipv4_checksum(&ipv4)
        };
        {
            let mut ipv4 = MutableIpv4Packet::new(&mut buf).ok_or(IngressError::Truncated)?;
            ipv4.set_checksum(ip_checksum);
        }

        let (_, transport) = buf.split_at_mut(header_len);
        match protocol {
            IpNextHeaderProtocols::Udp => {
                let mut packet = MutableUdpPacket::new(transport).ok_or(IngressError::Truncated)?;
                packet.set_checksum(0);
                let checksum = udp::ipv4_checksum(&packet.to_immutable(), &new_src, &destination);
                packet.set_checksum(checksum);
            }
            IpNextHeaderProtocols::Tcp => {
                let mut packet = MutableTcpPacket::new(transport).ok_or(IngressError::Truncated)?;
                packet.set_checksum(0);
                let checksum = tcp::ipv4_checksum(&packet.to_immutable(), &new_src, &destination);
                packet.set_checksum(checksum);
            }
            _ => return Err(IngressError::UnsupportedTransport),
        }

        Ok(Bytes::from(buf))
    }
}
