//! Datagram format shared by the hub and the vehicles.
//!
//! Every message is a single ASCII UDP datagram sent to the vehicle's well-known port:
//!
//! - Telemetry: `"<x>,<y>"`, both axes with two decimals, e.g. `"0.50,-1.00"`
//! - Win: the literal `"WIN"`
//!
//! Delivery is unreliable and unordered. Each telemetry packet is a complete directive, so a
//! lost, duplicated or reordered packet is harmless; only silence matters to the receiver.

use std::fmt;

use anyhow::{bail, Context};

/// Literal payload of a Win message.
pub const WIN_PAYLOAD: &str = "WIN";

/// Default magnitude below which an axis counts as neutral.
pub const DEFAULT_DEADZONE: f32 = 0.12;

/// One analog stick reading, both axes in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Axes {
    /// Turn axis, positive to the right.
    pub x: f32,
    /// Throttle axis, positive forward.
    pub y: f32,
}

impl Axes {
    /// Neutral stick.
    pub const NEUTRAL: Axes = Axes { x: 0.0, y: 0.0 };

    /// Creates axes clamped to `[-1, 1]`. Non-finite values become 0.
    pub fn new(x: f32, y: f32) -> Axes {
        Axes {
            x: clamp_unit(x),
            y: clamp_unit(y),
        }
    }

    /// Zero every axis whose magnitude is below `threshold`.
    pub fn with_deadzone(self, threshold: f32) -> Axes {
        let dz = |v: f32| if v.abs() < threshold { 0.0 } else { v };
        Axes {
            x: dz(self.x),
            y: dz(self.y),
        }
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_finite() {
        v.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// A decoded datagram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    /// Latest control axes for the receiving vehicle.
    Telemetry(Axes),
    /// The receiving vehicle's team won a round.
    Win,
}

impl Message {
    /// Wire representation of the message.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Decode a received datagram.
    ///
    /// A payload of exactly `"WIN"` is a Win, a payload with a comma is telemetry, anything
    /// else is rejected. Telemetry must have exactly two numeric fields.
    pub fn parse(payload: &[u8]) -> anyhow::Result<Message> {
        let text = std::str::from_utf8(payload).context("payload is not UTF-8")?;

        if text == WIN_PAYLOAD {
            return Ok(Message::Win);
        }
        if !text.contains(',') {
            bail!("unknown payload '{text}'");
        }

        let mut fields = text.split(',');
        let (Some(x), Some(y), None) = (fields.next(), fields.next(), fields.next()) else {
            bail!("telemetry '{text}' does not have two fields");
        };
        let x: f32 = x
            .trim()
            .parse()
            .with_context(|| format!("bad x axis in '{text}'"))?;
        let y: f32 = y
            .trim()
            .parse()
            .with_context(|| format!("bad y axis in '{text}'"))?;
        if !x.is_finite() || !y.is_finite() {
            bail!("telemetry '{text}' is not finite");
        }

        Ok(Message::Telemetry(Axes::new(x, y)))
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Telemetry(axes) => write!(f, "{:.2},{:.2}", axes.x, axes.y),
            Message::Win => f.write_str(WIN_PAYLOAD),
        }
    }
}
