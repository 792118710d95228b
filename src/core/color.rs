use std::ops::{Add, AddAssign, Mul};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32, // Red component (0.0 - 1.0)
    pub g: f32, // Green component (0.0 - 1.0)
    pub b: f32, // Blue component (0.0 - 1.0)
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Create a color from a packed `0xRRGGBB` value, the way lights and
    /// materials are usually written down (`0xff9000`).
    pub const fn from_u32(rgb: u32) -> Self {
        Self {
            r: ((rgb >> 16) & 0xFF) as f32 / 255.0,
            g: ((rgb >> 8) & 0xFF) as f32 / 255.0,
            b: (rgb & 0xFF) as f32 / 255.0,
        }
    }

    /// Create a color from a hexadecimal string.
    /// Accepts formats like "#RRGGBB" or "RRGGBB".
    pub fn from_hex(hex: &str) -> Result<Self, &'static str> {
        let hex = hex.trim_start_matches('#');
        if hex.len() != 6 {
            return Err("Hex string should be 6 characters long (RRGGBB).");
        }
        let rgb = u32::from_str_radix(hex, 16).map_err(|_| "Invalid hex digits")?;
        Ok(Self::from_u32(rgb))
    }

    pub fn to_crossterm_color(&self) -> crossterm::style::Color {
        let [r, g, b] = self.to_rgb8();
        crossterm::style::Color::Rgb { r, g, b }
    }

    pub fn to_rgb8(&self) -> [u8; 3] {
        [
            (self.r.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.g.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.b.clamp(0.0, 1.0) * 255.0).round() as u8,
        ]
    }

    /// Packed `0x00RRGGBB`, the layout minifb expects.
    pub fn to_u32(&self) -> u32 {
        let [r, g, b] = self.to_rgb8();
        ((r as u32) << 16) | ((g as u32) << 8) | b as u32
    }

    pub fn lerp(&self, end: &Color, t: f32) -> Color {
        Color {
            r: self.r + (end.r - self.r) * t,
            g: self.g + (end.g - self.g) * t,
            b: self.b + (end.b - self.b) * t,
        }
    }

    /// Component-wise product, used for light color × surface albedo.
    pub fn modulate(&self, other: &Color) -> Color {
        Color::new(self.r * other.r, self.g * other.g, self.b * other.b)
    }

    pub fn clamped(&self) -> Color {
        Color::new(
            self.r.clamp(0.0, 1.0),
            self.g.clamp(0.0, 1.0),
            self.b.clamp(0.0, 1.0),
        )
    }

    /// Rec. 709 relative luminance.
    pub fn luminance(&self) -> f32 {
        0.2126 * self.r + 0.7152 * self.g + 0.0722 * self.b
    }
}

impl Add for Color {
    type Output = Color;

    fn add(self, rhs: Color) -> Color {
        Color::new(self.r + rhs.r, self.g + rhs.g, self.b + rhs.b)
    }
}

impl AddAssign for Color {
    fn add_assign(&mut self, rhs: Color) {
        self.r += rhs.r;
        self.g += rhs.g;
        self.b += rhs.b;
    }
}

impl Mul<f32> for Color {
    type Output = Color;

    fn mul(self, rhs: f32) -> Color {
        Color::new(self.r * rhs, self.g * rhs, self.b * rhs)
    }
}

// Predefined colors
impl Color {
    pub const BLACK: Color = Color::from_u32(0x000000);
    pub const DARK_GRAY: Color = Color::from_u32(0x363737);
    pub const GRAY: Color = Color::from_u32(0x808080);
    pub const WHITE: Color = Color::from_u32(0xFFFFFF);
    pub const RED: Color = Color::from_u32(0xFF0000);
    pub const GREEN: Color = Color::from_u32(0x00FF00);
    pub const BLUE: Color = Color::from_u32(0x0000FF);
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE // Default to white color
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_round_trip_matches_hex() {
        let c = Color::from_u32(0xff9000);
        assert_eq!(c.to_u32(), 0xff9000);
        assert_eq!(Color::from_hex("#ff9000"), Ok(c));
        assert!(Color::from_hex("ff90").is_err());
    }

    #[test]
    fn out_of_range_channels_saturate_when_packed() {
        let c = Color::new(2.0, -1.0, 0.5);
        // 127.5 rounds away from zero
        assert_eq!(c.to_rgb8(), [255, 0, 128]);
    }

    #[test]
    fn modulate_and_scale() {
        let c = Color::new(0.5, 1.0, 0.25).modulate(&Color::new(0.5, 0.5, 1.0)) * 2.0;
        assert_eq!(c, Color::new(0.5, 1.0, 0.5));
    }
}
