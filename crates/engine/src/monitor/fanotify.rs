#![forbid(unsafe_code)]

use super::{EventSource, FileEvent};
use crate::error::Error;
use nix::errno::Errno;
use nix::sys::fanotify::{EventFFlags, Fanotify, InitFlags, MarkFlags, MaskFlags};
use std::fs::File;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, trace};

const IDLE: Duration = Duration::from_millis(100);

/// Close-write notifications for whole mounts. Needs `CAP_SYS_ADMIN`.
pub struct FanotifySource {
    fan: Fanotify,
    self_pid: i32,
}

impl FanotifySource {
    /// Watch every mount in `mounts`. Failing to initialize or to mark any
    /// of them is an error.
    pub fn new(mounts: &[PathBuf]) -> Result<Self, Error> {
        let fan = Fanotify::init(
            InitFlags::FAN_CLOEXEC | InitFlags::FAN_CLASS_NOTIF | InitFlags::FAN_NONBLOCK,
            EventFFlags::O_RDONLY | EventFFlags::O_CLOEXEC | EventFFlags::O_LARGEFILE,
        )?;

        for mount in mounts {
            let dir = File::open(mount).map_err(|err| Error::file(mount, err))?;
            fan.mark(
                MarkFlags::FAN_MARK_ADD | MarkFlags::FAN_MARK_MOUNT,
                MaskFlags::FAN_CLOSE_WRITE,
                &dir,
                None::<&Path>,
            )?;
            info!(mount = %mount.display(), "watching mount");
        }

        Ok(Self {
            fan,
            self_pid: std::process::id() as i32,
        })
    }
}

impl EventSource for FanotifySource {
    fn next(&mut self) -> Result<Vec<FileEvent>, Error> {
        let events = match self.fan.read_events() {
            Ok(events) => events,
            Err(Errno::EAGAIN) => {
                std::thread::sleep(IDLE);
                return Ok(Vec::new());
            }
            Err(Errno::EINTR) => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut out = Vec::with_capacity(events.len());
        for event in &events {
            let mask = event.mask();
            if !mask.contains(MaskFlags::FAN_CLOSE_WRITE) {
                out.push(FileEvent::Other(mask.bits()));
                continue;
            }
            // Our own writes come from quarantine and clean.
            if event.pid() == self.self_pid {
                continue;
            }
            let Some(fd) = event.fd() else {
                out.push(FileEvent::Other(mask.bits()));
                continue;
            };
            match std::fs::read_link(format!("/proc/self/fd/{}", fd.as_raw_fd())) {
                Ok(path) => out.push(FileEvent::CloseWrite(path)),
                Err(err) => trace!(%err, "unresolvable event fd"),
            }
        }
        Ok(out)
    }
}
