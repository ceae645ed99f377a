use std::io;

#[cfg(target_os = "linux")]
pub use linux::TunDevice;

#[cfg(not(target_os = "linux"))]
pub use unsupported::TunDevice;

#[cfg(target_os = "linux")]
mod linux {
    use std::{
        ffi::CStr,
        fs::{File, OpenOptions},
        io::{Read, Write},
        os::{fd::AsRawFd, unix::fs::OpenOptionsExt},
    };

    use nix::libc;
    use tokio::io::unix::AsyncFd;

    use super::io;
    use crate::{Device, Error, Result};

    const CLONE_DEVICE: &str = "/dev/net/tun";
    const DEFAULT_NAME: &str = "tun%d";

    // TUNSETIFF = _IOW('T', 202, int)
    nix::ioctl_write_int!(tunsetiff, b'T', 202);

    /// A Linux TUN interface in `IFF_NO_PI` mode, so every read and write is one bare IP
    /// datagram.
    #[derive(Debug)]
    pub struct TunDevice {
        fd: AsyncFd<File>,
        name: String,
    }

    impl TunDevice {
        /// Allocates a new TUN interface. `name` may contain a `%d` placeholder; the kernel
        /// picks the first free index. Defaults to `tun%d`.
        ///
        /// Requires `CAP_NET_ADMIN`.
        pub fn create(name: Option<&str>) -> Result<Self> {
            let template = name.unwrap_or(DEFAULT_NAME);
            if template.is_empty() || template.len() >= libc::IFNAMSIZ || template.contains('\0')
            {
                return Err(Error::Name(template.to_owned()));
            }

            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .custom_flags(libc::O_NONBLOCK | libc::O_CLOEXEC)
                .open(CLONE_DEVICE)?;

            // SAFETY: `ifreq` is a plain C struct for which all-zeroes is a valid value.
            let mut req: libc::ifreq = unsafe { std::mem::zeroed() };
            for (dst, src) in req.ifr_name.iter_mut().zip(template.bytes()) {
                *dst = src as libc::c_char;
            }
            req.ifr_ifru.ifru_flags = (libc::IFF_TUN | libc::IFF_NO_PI) as libc::c_short;

            // SAFETY: the descriptor is open and `req` outlives the call. The kernel writes the
            // final, NUL-terminated interface name back into `req.ifr_name`.
            unsafe { tunsetiff(file.as_raw_fd(), &mut req as *mut libc::ifreq as _) }?;
            // SAFETY: `ifr_name` is NUL-terminated. The template is shorter than `IFNAMSIZ` and
            // the rest of the array was zeroed, and the kernel's name is bounded the same way.
            let name = unsafe { CStr::from_ptr(req.ifr_name.as_ptr()) }
                .to_string_lossy()
                .into_owned();

            tracing::info!(name, "created TUN interface");

            Ok(Self { fd: AsyncFd::new(file)?, name })
        }
    }

    #[async_trait::async_trait]
    impl Device for TunDevice {
        fn name(&self) -> &str {
            &self.name
        }

        async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            loop {
                let mut guard = self.fd.readable().await?;

                match guard.try_io(|inner| inner.get_ref().read(buf)) {
                    Ok(result) => return result,
                    Err(_would_block) => continue,
                }
            }
        }

        async fn send(&mut self, packet: &[u8]) -> io::Result<()> {
            loop {
                let mut guard = self.fd.writable().await?;

                match guard.try_io(|inner| inner.get_ref().write(packet)) {
                    Ok(Ok(n)) if n == packet.len() => return Ok(()),
                    Ok(Ok(n)) => {
                        return Err(io::Error::new(
                            io::ErrorKind::WriteZero,
                            format!("short write to TUN device: {n} of {} bytes", packet.len()),
                        ))
                    }
                    Ok(Err(e)) => return Err(e),
                    Err(_would_block) => continue,
                }
            }
        }
    }

}

#[cfg(not(target_os = "linux"))]
mod unsupported {
    use super::io;
    use crate::{Device, Error, Result};

    /// Placeholder on platforms without a TUN implementation. [`TunDevice::create`] always
    /// fails with [`Error::Unsupported`].
    #[derive(Debug)]
    pub struct TunDevice {
        name: String,
    }

    impl TunDevice {
        pub fn create(_name: Option<&str>) -> Result<Self> {
            Err(Error::Unsupported)
        }
    }

    #[async_trait::async_trait]
    impl Device for TunDevice {
        fn name(&self) -> &str {
            &self.name
        }

        async fn recv(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::ErrorKind::Unsupported.into())
        }

        async fn send(&mut self, _packet: &[u8]) -> io::Result<()> {
            Err(io::ErrorKind::Unsupported.into())
        }
    }
}
