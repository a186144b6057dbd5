// The members of the device bank. Every device speaks the same six-operation
// contract; the machine only ever talks to `dyn Device`.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Instant;

use log::error;

/// Common device contract. The defaults describe an inert device: reads
/// yield a zero byte, writes are accepted and dropped, and the device
/// reports itself initialised.
pub trait Device {
    fn test(&mut self) -> bool {
        true
    }
    fn read(&mut self) -> u8 {
        0x00
    }
    fn readn(&mut self, count: usize) -> Vec<u8> {
        (0..count).map(|_| self.read()).collect()
    }
    fn write(&mut self, _data: &[u8]) {}
    fn flush(&mut self) {}
    fn initialised(&self) -> bool {
        true
    }
}

/// Backing file name for a lazily created device: the two-digit upper-case
/// hex id followed by `.dev`.
pub fn device_file_name(id: u8) -> String {
    format!("{:02X}.dev", id)
}

/// The host process's standard streams in raw binary mode.
pub enum StreamDevice {
    Stdin,
    Stdout,
    Stderr,
}

impl Device for StreamDevice {
    fn read(&mut self) -> u8 {
        match self {
            StreamDevice::Stdin => {
                let mut buf = [0u8; 1];
                match io::stdin().read(&mut buf) {
                    Ok(1) => buf[0],
                    Ok(_) => 0x00,
                    Err(err) => {
                        error!("stdin read failed: {}", err);
                        0x00
                    }
                }
            }
            _ => 0x00,
        }
    }
    fn write(&mut self, data: &[u8]) {
        let result = match self {
            StreamDevice::Stdin => Ok(()),
            StreamDevice::Stdout => io::stdout().write_all(data),
            StreamDevice::Stderr => io::stderr().write_all(data),
        };
        if let Err(err) = result {
            error!("stream write failed: {}", err);
        }
    }
    fn flush(&mut self) {
        let result = match self {
            StreamDevice::Stdin => Ok(()),
            StreamDevice::Stdout => io::stdout().flush(),
            StreamDevice::Stderr => io::stderr().flush(),
        };
        if let Err(err) = result {
            error!("stream flush failed: {}", err);
        }
    }
}

/// Each read yields a freshly drawn uniform byte.
pub struct RandomDevice;

impl Device for RandomDevice {
    fn read(&mut self) -> u8 {
        rand::random::<u8>()
    }
}

/// A command port for wall-clock measurements. Writing 0x01 captures the
/// start time; writing 0x02 latches the elapsed milliseconds truncated to
/// 24 bits as three pending bytes, MSB first. Reads drain the pending bytes
/// and yield zeros afterwards.
pub struct TimerDevice {
    started: Instant,
    pending: VecDeque<u8>,
}

impl TimerDevice {
    pub fn new() -> TimerDevice {
        TimerDevice { started: Instant::now(), pending: VecDeque::from(vec![0x00; 3]) }
    }
}

impl Device for TimerDevice {
    fn read(&mut self) -> u8 {
        self.pending.pop_front().unwrap_or(0x00)
    }
    fn write(&mut self, data: &[u8]) {
        for &command in data {
            match command {
                0x01 => self.started = Instant::now(),
                0x02 => {
                    let elapsed = self.started.elapsed().as_millis() as u64 % 0x0100_0000;
                    self.pending.clear();
                    self.pending.extend(&[(elapsed >> 16) as u8, (elapsed >> 8) as u8, elapsed as u8]);
                }
                _ => {}
            }
        }
    }
}

/// A device backed by a host file, opened read/write without truncation.
/// When the file cannot be opened the device stays uninitialised and every
/// operation is inert.
pub struct FileDevice {
    file: Option<File>,
}

impl FileDevice {
    pub fn open<P: AsRef<Path>>(path: P) -> FileDevice {
        match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => FileDevice { file: Some(file) },
            Err(err) => {
                error!("file not found ({}): {}", path.as_ref().display(), err);
                FileDevice { file: None }
            }
        }
    }
}

impl Device for FileDevice {
    fn read(&mut self) -> u8 {
        let mut buf = [0u8; 1];
        match self.file.as_mut() {
            Some(file) => match file.read(&mut buf) {
                Ok(1) => buf[0],
                _ => 0x00,
            },
            None => 0x00,
        }
    }
    fn readn(&mut self, count: usize) -> Vec<u8> {
        let mut buf = vec![0u8; count];
        match self.file.as_mut() {
            Some(file) => match file.read(&mut buf) {
                Ok(n) => buf.truncate(n),
                Err(_) => buf.clear(),
            },
            None => buf.clear(),
        }
        buf
    }
    fn write(&mut self, data: &[u8]) {
        if let Some(file) = self.file.as_mut() {
            if let Err(err) = file.write_all(data) {
                error!("device write failed: {}", err);
            }
        }
    }
    fn flush(&mut self) {
        if let Some(file) = self.file.as_mut() {
            if let Err(err) = file.flush() {
                error!("device flush failed: {}", err);
            }
        }
    }
    fn initialised(&self) -> bool {
        self.file.is_some()
    }
}
