use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use log::debug;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::util::error::{LanError, Result};

/// A UDP endpoint owned by a single discovery scan or device command.
///
/// The socket is closed when the transport is dropped, so every exit path
/// of the owning call (success, error, timeout or a cancelled future)
/// releases it.
#[derive(Debug)]
pub struct Transport {
    socket: UdpSocket,
    timeout: Duration,
}

impl Transport {
    /// Binds an ephemeral local port for talking to a single device.
    pub async fn bind_unicast(receive_timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        debug!("Bound control socket on {}", socket.local_addr()?);
        Ok(Transport {
            socket,
            timeout: receive_timeout,
        })
    }

    /// Binds `listen_port` for scan replies with multicast sending enabled.
    ///
    /// Address reuse is set so that a second scan can start while the
    /// previous socket is still lingering in the kernel.
    pub async fn bind_multicast(
        listen_port: u16,
        ttl: u32,
        receive_timeout: Duration,
    ) -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_multicast_ttl_v4(ttl)?;
        socket.set_multicast_loop_v4(true)?;
        let bind_address = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, listen_port));
        socket.bind(&bind_address.into())?;
        socket.set_nonblocking(true)?;

        let socket = UdpSocket::from_std(socket.into())?;
        debug!("Bound discovery socket on {}", socket.local_addr()?);
        Ok(Transport {
            socket,
            timeout: receive_timeout,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn send(&self, bytes: &[u8], destination: SocketAddr) -> Result<()> {
        let sent = self.socket.send_to(bytes, destination).await?;
        debug!("Sent {} bytes to {}", sent, destination);
        Ok(())
    }

    /// Waits up to the configured timeout for one datagram.
    pub async fn receive(&self, max_size: usize) -> Result<(Vec<u8>, SocketAddr)> {
        self.receive_within(max_size, self.timeout).await
    }

    /// Waits up to `deadline` for one datagram.
    ///
    /// Datagrams longer than `max_size` are truncated by the OS.
    pub async fn receive_within(
        &self,
        max_size: usize,
        deadline: Duration,
    ) -> Result<(Vec<u8>, SocketAddr)> {
        let mut buffer = vec![0; max_size];
        match timeout(deadline, self.socket.recv_from(&mut buffer)).await {
            Ok(Ok((number_of_bytes, source))) => {
                buffer.truncate(number_of_bytes);
                debug!("Received {} bytes from {}", number_of_bytes, source);
                Ok((buffer, source))
            }
            Ok(Err(e)) => Err(LanError::Transport(e)),
            Err(_) => Err(LanError::Timeout(deadline)),
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Ok(address) = self.socket.local_addr() {
            debug!("Releasing socket {}", address);
        }
    }
}
