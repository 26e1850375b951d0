use crate::{
    color::{Rgb, brightness_to_device},
    error::CommandError,
};

/// Every command is a fixed 9-byte frame: `[0x7e, 0x00, opcode, ...]`
/// terminated by `0xef`.
pub const PACKET_LEN: usize = 9;

const HEAD: [u8; 2] = [0x7e, 0x00];
const TAIL: u8 = 0xef;

const OPCODE_BRIGHTNESS: u8 = 0x01;
const OPCODE_POWER: u8 = 0x04;
const OPCODE_COLOR: u8 = 0x05;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Power { on: bool },
    Color { rgb: Rgb },
    Brightness { pct: u8 },
}

impl Command {
    pub fn power(on: bool) -> Self {
        Command::Power { on }
    }

    pub fn color(rgb: Rgb) -> Self {
        Command::Color { rgb }
    }

    /// Brightness percentage command. Unlike color channels, an out-of-range
    /// percentage is rejected, not clamped.
    pub fn brightness(pct: u8) -> Result<Self, CommandError> {
        if pct > 100 {
            return Err(CommandError::InvalidArgument(format!(
                "brightness {pct} out of range 0-100"
            )));
        }
        Ok(Command::Brightness { pct })
    }

    pub fn to_bytes(self) -> [u8; PACKET_LEN] {
        match self {
            Command::Power { on: true } => {
                [HEAD[0], HEAD[1], OPCODE_POWER, 0xf0, 0x00, 0x01, 0xff, 0x00, TAIL]
            }
            Command::Power { on: false } => {
                [HEAD[0], HEAD[1], OPCODE_POWER, 0x00, 0x00, 0x00, 0xff, 0x00, TAIL]
            }
            // Payload order is r, b, g: a quirk of the strip's firmware,
            // not a mistake.
            Command::Color { rgb } => [
                HEAD[0],
                HEAD[1],
                OPCODE_COLOR,
                0x03,
                rgb.r,
                rgb.b,
                rgb.g,
                0x00,
                TAIL,
            ],
            Command::Brightness { pct } => [
                HEAD[0],
                HEAD[1],
                OPCODE_BRIGHTNESS,
                brightness_to_device(pct),
                0x00,
                0x00,
                0x00,
                0x00,
                TAIL,
            ],
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Power { .. } => "power",
            Command::Color { .. } => "color",
            Command::Brightness { .. } => "brightness",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    // Test-side decoder for round-tripping color packets.
    fn decode_color(packet: &[u8; PACKET_LEN]) -> Option<Rgb> {
        if packet[0..2] != HEAD || packet[2] != OPCODE_COLOR || packet[3] != 0x03 {
            return None;
        }
        if packet[7] != 0x00 || packet[8] != TAIL {
            return None;
        }
        Some(Rgb::new(packet[4], packet[6], packet[5]))
    }

    #[test]
    fn power_on_bytes() {
        let bytes = Command::power(true).to_bytes();
        assert_eq!(bytes, [0x7e, 0x00, 0x04, 0xf0, 0x00, 0x01, 0xff, 0x00, 0xef]);
    }

    #[test]
    fn power_off_bytes() {
        let bytes = Command::power(false).to_bytes();
        assert_eq!(bytes, [0x7e, 0x00, 0x04, 0x00, 0x00, 0x00, 0xff, 0x00, 0xef]);
    }

    #[test]
    fn color_payload_is_r_b_g() {
        let bytes = Command::color(Rgb::new(1, 2, 3)).to_bytes();
        assert_eq!(bytes[0..4], [0x7e, 0x00, 0x05, 0x03]);
        assert_eq!(bytes[4..7], [1, 3, 2]); // r, b, g
        assert_eq!(bytes[7..9], [0x00, 0xef]);
    }

    #[test]
    fn brightness_full_scale() {
        let bytes = Command::brightness(100).unwrap().to_bytes();
        assert_eq!(bytes, [0x7e, 0x00, 0x01, 255, 0x00, 0x00, 0x00, 0x00, 0xef]);

        let bytes = Command::brightness(0).unwrap().to_bytes();
        assert_eq!(bytes[3], 0);
    }

    #[test]
    fn brightness_out_of_range_is_rejected() {
        match Command::brightness(101) {
            Err(CommandError::InvalidArgument(msg)) => assert!(msg.contains("101")),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn color_round_trips_through_decoder(r in any::<u8>(), g in any::<u8>(), b in any::<u8>()) {
            let rgb = Rgb::new(r, g, b);
            let bytes = Command::color(rgb).to_bytes();
            prop_assert_eq!(decode_color(&bytes), Some(rgb));
        }

        #[test]
        fn every_packet_is_framed(pct in 0u8..=100, on in any::<bool>()) {
            for bytes in [
                Command::power(on).to_bytes(),
                Command::brightness(pct).unwrap().to_bytes(),
            ] {
                prop_assert_eq!(bytes.len(), PACKET_LEN);
                prop_assert_eq!(&bytes[0..2], &HEAD[..]);
                prop_assert_eq!(bytes[8], TAIL);
            }
        }

        #[test]
        fn brightness_byte_monotone_in_pct(pct in 0u8..100) {
            let lo = Command::brightness(pct).unwrap().to_bytes()[3];
            let hi = Command::brightness(pct + 1).unwrap().to_bytes()[3];
            prop_assert!(lo <= hi);
        }
    }
}
