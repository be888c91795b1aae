//! Monochrome panel output.
//!
//! Frames are laid out for a 256x64 panel with fixed-position text,
//! rendered into a [`Canvas`] and pushed to a [`PanelDevice`].

pub mod canvas;
pub mod framebuffer;

use chrono::{DateTime, Local};
use embedded_graphics::{
    mono_font::{
        iso_8859_1::{FONT_5X7, FONT_6X10, FONT_7X13},
        MonoFont, MonoTextStyle,
    },
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{Line, PrimitiveStyle},
    text::{Alignment, Text},
};
use tracing::{debug, warn};

pub use canvas::Canvas;
pub use framebuffer::{FramebufferDevice, PanelDevice};

use super::{error::SinkError, traits::Sink, unavailable_message};
use crate::{
    config::PanelConfig,
    core::{
        lifecycle::Release,
        telemetry::{FetchError, FetchOutcome, Hemisphere, Snapshot},
    },
};

pub const UNAVAILABLE_TITLE: &str = "GPS Data Unavailable";
pub const HEADER_TITLE: &str = "GPS Monitor";

fn text(canvas: &mut Canvas, content: &str, font: &MonoFont<'_>, position: Point, alignment: Alignment) {
    let style = MonoTextStyle::new(font, BinaryColor::On);
    Text::with_alignment(content, position, style, alignment)
        .draw(canvas)
        .unwrap_or_else(|never| match never {});
}

fn rule(canvas: &mut Canvas, y: i32) {
    let right = canvas.width() as i32 - 1;
    Line::new(Point::new(0, y), Point::new(right, y))
        .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
        .draw(canvas)
        .unwrap_or_else(|never| match never {});
}

fn unavailable_frame(canvas: &mut Canvas, error: &FetchError) {
    let center = canvas.width() as i32 / 2;
    text(canvas, UNAVAILABLE_TITLE, &FONT_7X13, Point::new(center, 30), Alignment::Center);
    text(
        canvas,
        &unavailable_message(error),
        &FONT_6X10,
        Point::new(center, 45),
        Alignment::Center,
    );
}

fn data_frame(canvas: &mut Canvas, snapshot: &Snapshot<'_>, now: &DateTime<Local>) {
    let fix = snapshot.fix();

    text(canvas, HEADER_TITLE, &FONT_6X10, Point::new(0, 8), Alignment::Left);
    let clock = now.format("%H:%M:%S").to_string();
    text(canvas, &clock, &FONT_6X10, Point::new(200, 8), Alignment::Left);
    rule(canvas, 10);

    if fix.latitude.is_some() {
        let lat = fix.latitude_deg();
        let line = format!("Lat: {:.6}°{}", lat.abs(), Hemisphere::of_latitude(lat));
        text(canvas, &line, &FONT_7X13, Point::new(0, 22), Alignment::Left);
    }
    if fix.longitude.is_some() {
        let lon = fix.longitude_deg();
        let line = format!("Lon: {:.6}°{}", lon.abs(), Hemisphere::of_longitude(lon));
        text(canvas, &line, &FONT_7X13, Point::new(0, 34), Alignment::Left);
    }
    rule(canvas, 36);

    if fix.speed.is_some() {
        let line = format!("Spd: {:.1} m/s ({:.1} kn)", fix.speed_ms(), fix.speed_knots());
        text(canvas, &line, &FONT_7X13, Point::new(0, 48), Alignment::Left);
    }
    if fix.elevation.is_some() {
        let line = format!("Elev: {:.1} m", fix.elevation_m());
        text(canvas, &line, &FONT_7X13, Point::new(0, 60), Alignment::Left);
    }

    let date = now.format("%Y-%m-%d").to_string();
    text(canvas, &date, &FONT_5X7, Point::new(190, 63), Alignment::Left);
}

/// Lays out one frame for `outcome` on a cleared canvas.
pub fn render_frame(canvas: &mut Canvas, outcome: &FetchOutcome<'_>, now: &DateTime<Local>) {
    canvas.clear();
    match outcome {
        Ok(snapshot) => data_frame(canvas, snapshot, now),
        Err(e) => unavailable_frame(canvas, e),
    }
}

pub struct PanelSink<D: PanelDevice> {
    device: Option<D>,
    canvas: Canvas,
}

impl PanelSink<FramebufferDevice> {
    /// Opens the framebuffer named in `config`, wakes it and clears it.
    pub fn open(config: &PanelConfig) -> Result<Self, SinkError> {
        let device = FramebufferDevice::open(config)?;
        Self::with_device(device, config.width, config.height)
    }
}

impl<D: PanelDevice> PanelSink<D> {
    pub fn with_device(mut device: D, width: u32, height: u32) -> Result<Self, SinkError> {
        let canvas = Canvas::new(width, height);
        if let Err(e) = device.blank(false) {
            warn!("Could not unblank the panel: {}", e);
        }
        device.write_frame(&canvas)?;
        Ok(Self {
            device: Some(device),
            canvas,
        })
    }

    /// The last frame drawn.
    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }
}

impl<D: PanelDevice> Sink for PanelSink<D> {
    fn name(&self) -> &'static str {
        "panel"
    }

    fn present(&mut self, outcome: &FetchOutcome<'_>) -> Result<(), SinkError> {
        let device = self.device.as_mut().ok_or(SinkError::Released)?;
        render_frame(&mut self.canvas, outcome, &Local::now());
        device.write_frame(&self.canvas)?;
        debug!(lit = self.canvas.lit_count(), "Panel frame sent");
        Ok(())
    }
}

impl<D: PanelDevice> Release for PanelSink<D> {
    fn label(&self) -> &'static str {
        "panel"
    }

    /// Clears the panel, powers it down and closes the device.
    fn release(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let Some(mut device) = self.device.take() else {
            return Ok(());
        };
        self.canvas.clear();
        let cleared = device.write_frame(&self.canvas);
        let blanked = device.blank(true);
        device.close();
        cleared?;
        blanked?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;
    use gps_monitor_ubus::StatusCode;

    use super::{framebuffer::testing::MemoryPanel, *};
    use crate::core::telemetry::{AttrValue, AttributeBuffer};

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 17, 8, 30, 5).unwrap()
    }

    fn lit_in(canvas: &Canvas, rows: std::ops::Range<u32>) -> usize {
        rows.map(|y| (0..canvas.width()).filter(|x| canvas.pixel(*x, y)).count())
            .sum()
    }

    fn full_fix() -> AttributeBuffer {
        let mut buffer = AttributeBuffer::new();
        for (key, value) in [
            ("latitude", "40.000000"),
            ("longitude", "-70.000000"),
            ("speed", "3.000000"),
            ("elevation", "10.0"),
        ] {
            buffer.insert(key, AttrValue::String(value.into()));
        }
        buffer
    }

    #[test]
    fn test_data_frame_layout() {
        let buffer = full_fix();
        let mut canvas = Canvas::new(256, 64);
        render_frame(&mut canvas, &Ok(Snapshot::new(&buffer, Some(StatusCode::Ok))), &now());

        // Both separators run the full width.
        assert!((0..256).all(|x| canvas.pixel(x, 10)));
        assert!((0..256).all(|x| canvas.pixel(x, 36)));
        // Header, both coordinate lines and both lower lines carry ink.
        assert!(lit_in(&canvas, 0..10) > 0);
        assert!(lit_in(&canvas, 11..23) > 0);
        assert!(lit_in(&canvas, 24..35) > 0);
        assert!(lit_in(&canvas, 37..49) > 0);
        assert!(lit_in(&canvas, 50..61) > 0);
    }

    #[test]
    fn test_data_frame_without_fields_keeps_chrome() {
        let buffer = AttributeBuffer::new();
        let mut canvas = Canvas::new(256, 64);
        render_frame(&mut canvas, &Ok(Snapshot::new(&buffer, None)), &now());

        assert!((0..256).all(|x| canvas.pixel(x, 36)));
        assert_eq!(lit_in(&canvas, 11..36), 0);
        assert_eq!(lit_in(&canvas, 37..56), 0);
    }

    #[test]
    fn test_unavailable_frame_is_centered() {
        let mut canvas = Canvas::new(256, 64);
        render_frame(
            &mut canvas,
            &Err(FetchError::Timeout(Duration::from_secs(1))),
            &now(),
        );

        assert!(lit_in(&canvas, 0..12) == 0);
        assert!(lit_in(&canvas, 18..32) > 0);
        assert!(lit_in(&canvas, 36..48) > 0);
        // Centered text leaves both margins empty.
        assert!((0..20).all(|x| (0..64).all(|y| !canvas.pixel(x, y))));
        assert!((236..256).all(|x| (0..64).all(|y| !canvas.pixel(x, y))));
    }

    #[test]
    fn test_unavailable_frames_differ_by_cause() {
        let mut timeout = Canvas::new(256, 64);
        let mut empty = Canvas::new(256, 64);
        render_frame(&mut timeout, &Err(FetchError::Timeout(Duration::from_secs(1))), &now());
        render_frame(&mut empty, &Err(FetchError::EmptyReply { status: None }), &now());
        assert_ne!(timeout, empty);
    }

    #[test]
    fn test_sink_lifecycle() {
        let panel = MemoryPanel::default();
        let log = panel.log.clone();
        let buffer = full_fix();

        let mut sink = PanelSink::with_device(panel, 256, 64).unwrap();
        sink.present(&Ok(Snapshot::new(&buffer, None))).unwrap();
        assert!(sink.canvas().lit_count() > 0);

        sink.release().unwrap();
        sink.release().unwrap();

        let log = log.lock().unwrap();
        // Blank frame on open, data frame, cleared frame on release.
        assert_eq!(log.frames.len(), 3);
        assert_eq!(log.frames[2].lit_count(), 0);
        assert_eq!(log.blanks, vec![false, true]);
        assert_eq!(log.closed, 1);
        drop(log);

        assert!(matches!(
            sink.present(&Ok(Snapshot::new(&buffer, None))),
            Err(SinkError::Released)
        ));
    }

    #[test]
    fn test_write_failure_surfaces() {
        let panel = MemoryPanel::default();
        let mut sink = PanelSink::with_device(panel, 256, 64).unwrap();
        if let Some(device) = sink.device.as_mut() {
            device.fail_writes = true;
        }
        let result = sink.present(&Err(FetchError::EmptyReply { status: None }));
        assert!(matches!(result, Err(SinkError::Io(_))));
    }
}
