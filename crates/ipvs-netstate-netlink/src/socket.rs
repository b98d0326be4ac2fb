//! Blocking request/reply transport over one `NETLINK_ROUTE` socket
//!
//! Each request holds the socket lock until its reply is complete, so
//! concurrent callers never read each other's replies.

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use netlink_packet_core::{
    NLM_F_ACK, NLM_F_DUMP, NLM_F_REQUEST, NetlinkHeader, NetlinkMessage, NetlinkPayload,
};
use netlink_packet_route::RtnlMessage;
use netlink_sys::{Socket, SocketAddr, protocols::NETLINK_ROUTE};
use tracing::trace;

/// Netlink message lengths are padded to this boundary
const NLMSG_ALIGNTO: usize = 4;

pub(crate) struct RouteSocket {
    socket: Mutex<Socket>,
    sequence: AtomicU32,
}

impl RouteSocket {
    /// Open, bind, and connect a socket to the kernel
    pub(crate) fn open() -> io::Result<Self> {
        let mut socket = Socket::new(NETLINK_ROUTE)?;
        let local = socket.bind_auto()?;
        socket.connect(&SocketAddr::new(0, 0))?;
        trace!("Opened rtnetlink socket, port {}", local.port_number());

        Ok(Self {
            socket: Mutex::new(socket),
            sequence: AtomicU32::new(1),
        })
    }

    /// Send a request that changes kernel state and wait for its ack
    pub(crate) fn execute(&self, message: RtnlMessage, extra_flags: u16) -> io::Result<()> {
        self.request(message, NLM_F_REQUEST | NLM_F_ACK | extra_flags)
            .map(|_| ())
    }

    /// Send a non-dump query and return its single reply
    pub(crate) fn query(&self, message: RtnlMessage) -> io::Result<Option<RtnlMessage>> {
        Ok(self.request(message, NLM_F_REQUEST)?.into_iter().next())
    }

    /// Send a dump request and collect every reply until `NLMSG_DONE`
    pub(crate) fn dump(&self, message: RtnlMessage) -> io::Result<Vec<RtnlMessage>> {
        self.request(message, NLM_F_REQUEST | NLM_F_DUMP)
    }

    fn request(&self, message: RtnlMessage, flags: u16) -> io::Result<Vec<RtnlMessage>> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);

        let mut header = NetlinkHeader::default();
        header.flags = flags;
        header.sequence_number = sequence;
        let mut packet = NetlinkMessage::new(header, NetlinkPayload::from(message));
        packet.finalize();

        let mut buf = vec![0; packet.buffer_len()];
        packet.serialize(&mut buf[..]);

        let socket = self.socket.lock().unwrap_or_else(PoisonError::into_inner);
        trace!("netlink request seq={} flags={:#x}: {:?}", sequence, flags, packet.payload);
        socket.send(&buf, 0)?;

        let mut replies = Vec::new();
        loop {
            let (bytes, _) = socket.recv_from_full()?;
            if parse_replies(&bytes, sequence, flags, &mut replies)? {
                return Ok(replies);
            }
        }
    }
}

/// Decode one datagram of replies to the request numbered `sequence`
///
/// Inner messages are appended to `replies`. Returns `true` once the
/// request is complete: `NLMSG_DONE`, an ack, or the single reply of a
/// non-dump query sent without `NLM_F_ACK`. Kernel error codes become
/// raw OS errors.
fn parse_replies(
    bytes: &[u8],
    sequence: u32,
    flags: u16,
    replies: &mut Vec<RtnlMessage>,
) -> io::Result<bool> {
    let is_dump = flags & NLM_F_DUMP == NLM_F_DUMP;
    let wants_ack = flags & NLM_F_ACK != 0;
    let mut offset = 0;

    while offset < bytes.len() {
        let reply = NetlinkMessage::<RtnlMessage>::deserialize(&bytes[offset..]).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("malformed netlink reply: {e}"),
            )
        })?;
        let length = reply.header.length as usize;
        if length == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "netlink reply with zero length",
            ));
        }
        offset += align(length);

        if reply.header.sequence_number != sequence {
            trace!(
                "Skipping netlink reply for seq={} (want {})",
                reply.header.sequence_number, sequence
            );
            continue;
        }

        match reply.payload {
            NetlinkPayload::Done(_) => return Ok(true),
            NetlinkPayload::Error(err) => {
                return match err.code {
                    None => Ok(true),
                    Some(code) => {
                        trace!("netlink request seq={} failed: errno {}", sequence, -code.get());
                        Err(io::Error::from_raw_os_error(-code.get()))
                    }
                };
            }
            NetlinkPayload::InnerMessage(inner) => {
                replies.push(inner);
                if !is_dump && !wants_ack {
                    return Ok(true);
                }
            }
            NetlinkPayload::Overrun(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "netlink receive buffer overrun",
                ));
            }
            _ => {}
        }
    }

    Ok(false)
}

fn align(length: usize) -> usize {
    (length + NLMSG_ALIGNTO - 1) & !(NLMSG_ALIGNTO - 1)
}
