//! Read-only view over the latest reply and the derived navigation values.
//!
//! All numeric fields arrive as decimal text. They are converted with
//! [`parse_number`], which never fails: missing or malformed text reads as
//! `0.0`, the same way C's `atof` behaves.

use std::fmt;

use gps_monitor_ubus::StatusCode;

use super::attributes::AttributeBuffer;

/// Metres per second to knots.
pub const KNOTS_PER_MS: f64 = 1.94384;

const COMPASS_POINTS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

/// A successful fetch. Borrowed from the client, so it cannot outlive the
/// next fetch.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    attributes: &'a AttributeBuffer,
    status: Option<StatusCode>,
}

impl<'a> Snapshot<'a> {
    pub fn new(attributes: &'a AttributeBuffer, status: Option<StatusCode>) -> Self {
        Self { attributes, status }
    }

    pub fn attributes(&self) -> &'a AttributeBuffer {
        self.attributes
    }

    /// Text of the attribute `key`, if it exists and is a string.
    pub fn get_value(&self, key: &str) -> Option<&'a str> {
        self.attributes.get(key).and_then(|value| value.as_str())
    }

    /// `get_value` followed by [`parse_number`].
    pub fn number(&self, key: &str) -> f64 {
        parse_number(self.get_value(key))
    }

    /// Status of the reply, when it arrived in time.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Non-OK status that came with the attributes.
    pub fn warning(&self) -> Option<StatusCode> {
        self.status.filter(|status| !status.is_ok())
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn fix(&self) -> Fix<'a> {
        Fix {
            latitude: self.get_value("latitude"),
            longitude: self.get_value("longitude"),
            speed: self.get_value("speed"),
            elevation: self.get_value("elevation"),
            course: self.get_value("course"),
            age: self.get_value("age"),
        }
    }
}

/// The position fields of a reply, still as text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fix<'a> {
    pub latitude: Option<&'a str>,
    pub longitude: Option<&'a str>,
    /// m/s
    pub speed: Option<&'a str>,
    /// m
    pub elevation: Option<&'a str>,
    /// degrees
    pub course: Option<&'a str>,
    /// seconds
    pub age: Option<&'a str>,
}

impl Fix<'_> {
    pub fn has_position(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    pub fn latitude_deg(&self) -> f64 {
        parse_number(self.latitude)
    }

    pub fn longitude_deg(&self) -> f64 {
        parse_number(self.longitude)
    }

    pub fn speed_ms(&self) -> f64 {
        parse_number(self.speed)
    }

    pub fn speed_knots(&self) -> f64 {
        knots(self.speed_ms())
    }

    pub fn elevation_m(&self) -> f64 {
        parse_number(self.elevation)
    }

    pub fn course_deg(&self) -> f64 {
        parse_number(self.course)
    }
}

/// Converts decimal text the way `atof` does.
///
/// Leading whitespace is skipped, then the longest prefix of the form
/// `[+-]digits[.digits][e[+-]digits]` is converted. Anything else, including
/// `None`, yields `0.0`.
pub fn parse_number(text: Option<&str>) -> f64 {
    let Some(text) = text else {
        return 0.0;
    };
    let s = text.trim_start_matches(|c: char| c.is_ascii_whitespace() || c == '\x0b');
    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_end = digits_from(end);
    let mut digits = int_end - end;
    end = int_end;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        digits += frac_end - (end + 1);
        end = frac_end;
    }
    if digits == 0 {
        return 0.0;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    s[..end].parse().unwrap_or(0.0)
}

pub fn knots(speed_ms: f64) -> f64 {
    speed_ms * KNOTS_PER_MS
}

/// 8-point compass rose, 45° sectors centred on north.
///
/// Courses outside `[0, 360)` are wrapped onto the circle first, so 382.5°
/// reads as "NE" and -45° as "NW".
pub fn compass_point(course: f64) -> &'static str {
    let normalized = course.rem_euclid(360.0);
    let sector = ((normalized + 22.5) / 45.0) as usize % COMPASS_POINTS.len();
    COMPASS_POINTS[sector]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemisphere {
    North,
    South,
    East,
    West,
}

impl Hemisphere {
    pub fn of_latitude(value: f64) -> Self {
        if value >= 0.0 {
            Hemisphere::North
        } else {
            Hemisphere::South
        }
    }

    pub fn of_longitude(value: f64) -> Self {
        if value >= 0.0 {
            Hemisphere::East
        } else {
            Hemisphere::West
        }
    }

    pub fn letter(self) -> char {
        match self {
            Hemisphere::North => 'N',
            Hemisphere::South => 'S',
            Hemisphere::East => 'E',
            Hemisphere::West => 'W',
        }
    }
}

impl fmt::Display for Hemisphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}
