/* BEGIN LICENSE
  lzt, a Level Zero conformance test harness.
  Copyright (C) 2025 SupaMaggie70 (Magnus Larsson)


  lzt is free software; you can redistribute it and/or
  modify it under the terms of the GNU General Public License
  as published by the Free Software Foundation; either version 3
  of the License, or (at your option) any later version.

  lzt is distributed in the hope that it will be useful,
  but WITHOUT ANY WARRANTY; without even the implied warranty of
  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
  GNU General Public License for more details.

  You should have received a copy of the GNU General Public License
  along with this program.  If not, see <http://www.gnu.org/licenses/>.
END LICENSE */
//! Passing file descriptors between processes over a Unix domain socket, used to hand exported
//! memory to a peer process.
use std::{
    io,
    mem::size_of,
    os::{
        fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd},
        unix::net::UnixStream,
    },
};

use libc::c_int;

/// Room for one `SCM_RIGHTS` message carrying a single descriptor on every supported target.
#[repr(C, align(8))]
struct ControlBuffer([u8; 64]);

fn control_space() -> usize {
    unsafe { libc::CMSG_SPACE(size_of::<c_int>() as _) as usize }
}

/// Sends `fd` as `SCM_RIGHTS` ancillary data alongside a single dummy byte.
pub fn write_fd_to_socket(socket: &UnixStream, fd: BorrowedFd<'_>) -> io::Result<()> {
    let mut payload = [0u8; 1];
    let mut iov = libc::iovec {
        iov_base: payload.as_mut_ptr().cast(),
        iov_len: payload.len(),
    };
    let mut control = ControlBuffer([0; 64]);
    let sent = unsafe {
        let mut msg: libc::msghdr = std::mem::zeroed();
        msg.msg_iov = &mut iov;
        msg.msg_iovlen = 1;
        msg.msg_control = control.0.as_mut_ptr().cast();
        msg.msg_controllen = control_space() as _;
        let header = libc::CMSG_FIRSTHDR(&msg);
        if header.is_null() {
            return Err(io::Error::other("no room for a control message"));
        }
        (*header).cmsg_level = libc::SOL_SOCKET;
        (*header).cmsg_type = libc::SCM_RIGHTS;
        (*header).cmsg_len = libc::CMSG_LEN(size_of::<c_int>() as _) as _;
        std::ptr::write_unaligned(libc::CMSG_DATA(header).cast::<c_int>(), fd.as_raw_fd());
        libc::sendmsg(socket.as_raw_fd(), &msg, 0)
    };
    if sent < 0 {
        return Err(io::Error::last_os_error());
    }
    log::trace!("Sent fd {} over socket", fd.as_raw_fd());
    Ok(())
}

/// Receives a descriptor sent with [`write_fd_to_socket`]. The returned descriptor is a new
/// duplicate owned by this process.
pub fn read_fd_from_socket(socket: &UnixStream) -> io::Result<OwnedFd> {
    let mut payload = [0u8; 1];
    let mut iov = libc::iovec {
        iov_base: payload.as_mut_ptr().cast(),
        iov_len: payload.len(),
    };
    let mut control = ControlBuffer([0; 64]);
    let fd: RawFd = unsafe {
        let mut msg: libc::msghdr = std::mem::zeroed();
        msg.msg_iov = &mut iov;
        msg.msg_iovlen = 1;
        msg.msg_control = control.0.as_mut_ptr().cast();
        msg.msg_controllen = control_space() as _;
        let received = libc::recvmsg(socket.as_raw_fd(), &mut msg, 0);
        if received < 0 {
            return Err(io::Error::last_os_error());
        }
        if received == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "socket closed before a descriptor arrived",
            ));
        }
        let header = libc::CMSG_FIRSTHDR(&msg);
        if header.is_null()
            || (*header).cmsg_level != libc::SOL_SOCKET
            || (*header).cmsg_type != libc::SCM_RIGHTS
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "message carried no descriptor",
            ));
        }
        std::ptr::read_unaligned(libc::CMSG_DATA(header).cast::<c_int>())
    };
    if fd < 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "received an invalid descriptor",
        ));
    }
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}
