use super::canvas::{Canvas, ColorMode, color_to_fg};

/// Braille dot bits for the 2x4 pixel block of one cell, indexed `[dy][dx]`.
///
/// Unicode braille: U+2800 + dot_bits
const BRAILLE_OFFSET: u32 = 0x2800;
const DOT_BITS: [[u32; 2]; 4] = [[0x01, 0x08], [0x02, 0x10], [0x04, 0x20], [0x40, 0x80]];

/// A dot is raised once the pixel is this bright. Dimmer pixels (city
/// silhouette, faint halos) drop out, which keeps the night sky readable.
const THRESHOLD: f64 = 0.12;

pub fn render(canvas: &Canvas) -> String {
    let (term_cols, term_rows) = canvas.term_size();
    let mut out = String::with_capacity(term_cols * term_rows * 20);
    let colored = canvas.color_mode != ColorMode::Mono;
    let mut last_fg = String::new();

    for row in 0..term_rows {
        for col in 0..term_cols {
            let mut bits = 0u32;
            let mut sum = [0u32; 3];
            let mut peak = 0.0f64;
            let mut lit = 0u32;

            for (dy, row_bits) in DOT_BITS.iter().enumerate() {
                for (dx, bit) in row_bits.iter().enumerate() {
                    let idx = (row * 4 + dy) * canvas.width + col * 2 + dx;
                    let (v, (r, g, b)) = canvas.sample(idx);
                    if v > THRESHOLD {
                        bits |= bit;
                        sum[0] += r as u32;
                        sum[1] += g as u32;
                        sum[2] += b as u32;
                        peak = peak.max(v);
                        lit += 1;
                    }
                }
            }

            let ch = char::from_u32(BRAILLE_OFFSET + bits).unwrap_or(' ');
            if colored && lit > 0 {
                // Dots cannot be dimmed individually; fold brightness into the color.
                let shade = |c: u32| ((c / lit) as f64 * peak) as u8;
                let color = canvas.map_color(shade(sum[0]), shade(sum[1]), shade(sum[2]));
                let fg = color_to_fg(color);
                if fg != last_fg {
                    out.push_str("\x1b[");
                    out.push_str(&fg);
                    out.push('m');
                    last_fg = fg;
                }
            }
            out.push(ch);
        }
        if colored {
            out.push_str("\x1b[0m");
            last_fg.clear();
        }
        // Use cursor movement instead of \n to avoid blank line issues
        out.push_str(&format!("\x1b[{};1H", row + 2));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::canvas::{RenderMode, WHITE};

    #[test]
    fn test_single_dot_maps_to_braille_bit() {
        let mut c = Canvas::new(1, 1, RenderMode::Braille, ColorMode::Mono);
        c.blend(1, 3, WHITE, 1.0);
        let frame = render(&c);
        assert!(frame.starts_with('\u{2880}'));
    }

    #[test]
    fn test_dim_pixels_stay_blank() {
        let mut c = Canvas::new(1, 1, RenderMode::Braille, ColorMode::Mono);
        c.blend(0, 0, WHITE, 0.05);
        assert!(render(&c).starts_with('\u{2800}'));
    }
}
