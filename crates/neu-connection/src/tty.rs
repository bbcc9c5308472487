//! Serial (TTY) transport: POSIX termios setup plus optional RS-485
//! direction control via the Linux `TIOCSRS485` ioctl (§2B, smart-link).

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;

use neu_core::error::{ErrorCode, NeuError, Result};

use crate::config::{FlowControl, Parity, TtyConfig};

const TIOCSRS485: libc::c_ulong = 0x542F;
const SER_RS485_ENABLED: u32 = 1 << 0;

#[repr(C)]
struct SerialRs485 {
    flags: u32,
    delay_rts_before_send: u32,
    delay_rts_after_send: u32,
    padding: [u32; 5],
}

pub struct TtyTransport {
    file: Option<File>,
}

impl TtyTransport {
    pub fn new() -> Self {
        Self { file: None }
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Open the device, apply termios, and (if `smart_link`) the RS-485
    /// ioctl before the transport is considered started.
    pub async fn open(&mut self, cfg: TtyConfig) -> Result<()> {
        cfg.validate()?;
        let file = tokio::task::spawn_blocking(move || open_blocking(&cfg))
            .await
            .map_err(|e| NeuError::domain(ErrorCode::EInternal, e.to_string()))??;
        self.file = Some(file);
        Ok(())
    }

    pub async fn send(&mut self, buf: Vec<u8>) -> Result<usize> {
        let fd = self
            .file
            .take()
            .ok_or_else(|| NeuError::domain(ErrorCode::EClosed, "not open"))?;
        let (fd, result) = tokio::task::spawn_blocking(move || {
            let mut fd = fd;
            let r = fd.write(&buf).map_err(map_io_err);
            (fd, r)
        })
        .await
        .map_err(|e| NeuError::domain(ErrorCode::EInternal, e.to_string()))?;
        self.file = Some(fd);
        result
    }

    pub async fn recv(&mut self, max_len: usize) -> Result<Vec<u8>> {
        let fd = self
            .file
            .take()
            .ok_or_else(|| NeuError::domain(ErrorCode::EClosed, "not open"))?;
        let (fd, result) = tokio::task::spawn_blocking(move || {
            let mut fd = fd;
            let mut buf = vec![0u8; max_len];
            let r = fd.read(&mut buf).map(|n| {
                buf.truncate(n);
                buf
            }).map_err(map_io_err);
            (fd, r)
        })
        .await
        .map_err(|e| NeuError::domain(ErrorCode::EInternal, e.to_string()))?;
        self.file = Some(fd);
        result
    }

    pub fn close(&mut self) {
        self.file = None;
    }
}

impl Default for TtyTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn open_blocking(cfg: &TtyConfig) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY)
        .open(&cfg.device)
        .map_err(|e| NeuError::domain(ErrorCode::ENoEnt, format!("open {}: {e}", cfg.device)))?;

    apply_termios(&file, cfg)?;
    if cfg.smart_link {
        apply_rs485(&file)?;
    }
    Ok(file)
}

fn apply_termios(file: &File, cfg: &TtyConfig) -> Result<()> {
    let fd = file.as_raw_fd();
    unsafe {
        let mut tio: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(fd, &mut tio) != 0 {
            return Err(NeuError::domain(ErrorCode::EInternal, "tcgetattr failed"));
        }

        libc::cfmakeraw(&mut tio);

        let speed = baud_to_speed(cfg.baud)?;
        libc::cfsetispeed(&mut tio, speed);
        libc::cfsetospeed(&mut tio, speed);

        tio.c_cflag &= !libc::CSIZE;
        tio.c_cflag |= match cfg.data_bits {
            5 => libc::CS5,
            6 => libc::CS6,
            7 => libc::CS7,
            _ => libc::CS8,
        };

        tio.c_cflag &= !(libc::PARENB | libc::PARODD);
        match cfg.parity {
            Parity::None => {}
            Parity::Odd => tio.c_cflag |= libc::PARENB | libc::PARODD,
            Parity::Even => tio.c_cflag |= libc::PARENB,
            // `mark`/`space` parity have no portable POSIX termios bit; fall
            // back to the closest even/odd pairing rather than silently
            // ignoring the request.
            Parity::Mark => tio.c_cflag |= libc::PARENB | libc::PARODD,
            Parity::Space => tio.c_cflag |= libc::PARENB,
        }

        if cfg.stop_bits == 2 {
            tio.c_cflag |= libc::CSTOPB;
        } else {
            tio.c_cflag &= !libc::CSTOPB;
        }

        match cfg.flow {
            FlowControl::On => tio.c_cflag |= libc::CRTSCTS,
            FlowControl::Off => tio.c_cflag &= !libc::CRTSCTS,
        }

        tio.c_cflag |= libc::CLOCAL | libc::CREAD;

        // VMIN/VTIME: blocking mode reads wait up to timeout_ms (deciseconds,
        // rounded up) for at least one byte; non-blocking returns immediately.
        if cfg.timeout_ms > 0 {
            tio.c_cc[libc::VMIN] = 0;
            tio.c_cc[libc::VTIME] = (cfg.timeout_ms / 100).clamp(1, 255) as u8;
        } else {
            tio.c_cc[libc::VMIN] = 1;
            tio.c_cc[libc::VTIME] = 0;
        }

        if libc::tcsetattr(fd, libc::TCSANOW, &tio) != 0 {
            return Err(NeuError::domain(ErrorCode::EInternal, "tcsetattr failed"));
        }
    }
    Ok(())
}

fn apply_rs485(file: &File) -> Result<()> {
    let fd = file.as_raw_fd();
    let mut rs485 = SerialRs485 {
        flags: SER_RS485_ENABLED,
        delay_rts_before_send: 0,
        delay_rts_after_send: 0,
        padding: [0; 5],
    };
    let ret = unsafe { libc::ioctl(fd, TIOCSRS485, &mut rs485 as *mut SerialRs485) };
    if ret != 0 {
        return Err(NeuError::domain(ErrorCode::ENotSup, "TIOCSRS485 ioctl failed"));
    }
    Ok(())
}

fn baud_to_speed(baud: u32) -> Result<libc::speed_t> {
    let speed = match baud {
        150 => libc::B150,
        300 => libc::B300,
        600 => libc::B600,
        1200 => libc::B1200,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19200 => libc::B19200,
        38400 => libc::B38400,
        57600 => libc::B57600,
        115200 => libc::B115200,
        other => return Err(NeuError::domain(ErrorCode::ParamIsWrong, format!("unsupported baud {other}"))),
    };
    Ok(speed)
}

fn map_io_err(e: std::io::Error) -> NeuError {
    use std::io::ErrorKind;
    match e.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => NeuError::domain(ErrorCode::EAgain, e.to_string()),
        _ => NeuError::domain(ErrorCode::EClosed, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baud_to_speed_rejects_unknown_rate() {
        assert!(baud_to_speed(1_000_000).is_err());
    }

    #[test]
    fn baud_to_speed_accepts_every_enumerated_rate() {
        for baud in [150, 300, 600, 1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200] {
            assert!(baud_to_speed(baud).is_ok());
        }
    }
}
