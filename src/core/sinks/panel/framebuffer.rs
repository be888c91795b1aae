//! Linux framebuffer output for the panel.
//!
//! The canvas is packed into the device's pixel layout and written at
//! offset zero on every refresh. Blanking goes through the sysfs `blank`
//! attribute of the same framebuffer when it exists.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, trace};

use super::canvas::Canvas;
use crate::{
    config::{PanelConfig, PixelFormat},
    core::sinks::SinkError,
};

const SYSFS_GRAPHICS: &str = "/sys/class/graphics";

/// Value written to `blank` to unblank the panel.
const FB_UNBLANK: &str = "0";
/// Value written to `blank` to power the panel down.
const FB_BLANK_POWERDOWN: &str = "4";

/// Something a finished frame can be pushed to.
pub trait PanelDevice {
    fn write_frame(&mut self, canvas: &Canvas) -> io::Result<()>;

    /// Powers the panel down (`true`) or back up.
    fn blank(&mut self, blanked: bool) -> io::Result<()>;

    /// Gives up the device handle. Further frames are dropped.
    fn close(&mut self);
}

/// Bytes per row for `width` pixels in `format`.
pub fn row_stride(format: PixelFormat, width: u32) -> usize {
    (width * format.bits_per_pixel()).div_ceil(8) as usize
}

/// Packs `canvas` into `out` using `format`, `stride` bytes per row.
pub fn pack(canvas: &Canvas, format: PixelFormat, stride: usize, out: &mut Vec<u8>) {
    out.clear();
    out.resize(stride * canvas.height() as usize, 0);

    for (y, row) in canvas.rows().enumerate() {
        let line = &mut out[y * stride..(y + 1) * stride];
        for x in row.iter().enumerate().filter_map(|(x, on)| on.then_some(x)) {
            match format {
                PixelFormat::Mono1 => line[x / 8] |= 0x80 >> (x % 8),
                PixelFormat::Gray8 => line[x] = 0xff,
                PixelFormat::Rgb565 => line[x * 2..x * 2 + 2].copy_from_slice(&0xffffu16.to_le_bytes()),
            }
        }
    }
}

pub struct FramebufferDevice {
    file: Option<File>,
    path: PathBuf,
    blank_path: Option<PathBuf>,
    format: PixelFormat,
    stride: usize,
    scratch: Vec<u8>,
}

impl FramebufferDevice {
    pub fn open(config: &PanelConfig) -> Result<Self, SinkError> {
        let file = OpenOptions::new()
            .write(true)
            .open(&config.device)
            .map_err(|source| SinkError::Open {
                target: config.device.display().to_string(),
                source,
            })?;

        let sysfs = sysfs_dir(&config.device);
        let minimum = row_stride(config.pixel_format, config.width);
        let stride = match sysfs.as_deref().and_then(read_stride) {
            Some(stride) if stride < minimum => {
                return Err(SinkError::Unsupported(format!(
                    "{} has {} bytes per line, {} needed for {} pixels",
                    config.device.display(),
                    stride,
                    minimum,
                    config.width
                )))
            }
            Some(stride) => stride,
            None => minimum,
        };

        let blank_path = sysfs.map(|dir| dir.join("blank")).filter(|p| p.exists());
        debug!(
            device = %config.device.display(),
            stride,
            format = ?config.pixel_format,
            blank = blank_path.is_some(),
            "Opened framebuffer"
        );

        Ok(Self {
            file: Some(file),
            path: config.device.clone(),
            blank_path,
            format: config.pixel_format,
            stride,
            scratch: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PanelDevice for FramebufferDevice {
    fn write_frame(&mut self, canvas: &Canvas) -> io::Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        pack(canvas, self.format, self.stride, &mut self.scratch);
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&self.scratch)?;
        trace!(bytes = self.scratch.len(), "Frame written");
        Ok(())
    }

    fn blank(&mut self, blanked: bool) -> io::Result<()> {
        match &self.blank_path {
            Some(path) => fs::write(path, if blanked { FB_BLANK_POWERDOWN } else { FB_UNBLANK }),
            None => Ok(()),
        }
    }

    fn close(&mut self) {
        if self.file.take().is_some() {
            debug!(device = %self.path.display(), "Closed framebuffer");
        }
    }
}

/// `/sys/class/graphics/fbN` for a `/dev/fbN` node, when present.
fn sysfs_dir(device: &Path) -> Option<PathBuf> {
    let dir = Path::new(SYSFS_GRAPHICS).join(device.file_name()?);
    dir.is_dir().then_some(dir)
}

fn read_stride(dir: &Path) -> Option<usize> {
    fs::read_to_string(dir.join("stride")).ok()?.trim().parse().ok()
}
