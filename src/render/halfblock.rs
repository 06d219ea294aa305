use super::canvas::{Canvas, ColorMode, Rgb8, color_to_bg, color_to_fg};

/// Pixel brightness below which a half is treated as empty background.
/// Half-block renders the full brightness via color scaling, so the threshold
/// only has to cut off numeric dust; the near-black skyline stays visible.
const DARK_THRESHOLD: f64 = 0.02;

fn shaded((v, (r, g, b)): (f64, Rgb8)) -> Rgb8 {
    let v = v.clamp(0.0, 1.0);
    ((r as f64 * v) as u8, (g as f64 * v) as u8, (b as f64 * v) as u8)
}

pub fn render(canvas: &Canvas) -> String {
    let (term_cols, term_rows) = canvas.term_size();
    let mut out = String::with_capacity(term_cols * term_rows * 10);
    let mut last_sgr = String::new();

    for row in 0..term_rows {
        for col in 0..term_cols {
            let top = canvas.sample(row * 2 * canvas.width + col);
            let bot = canvas.sample((row * 2 + 1) * canvas.width + col);
            let top_dark = top.0 < DARK_THRESHOLD;
            let bot_dark = bot.0 < DARK_THRESHOLD;

            if canvas.color_mode == ColorMode::Mono {
                out.push(match (!top_dark, !bot_dark) {
                    (true, true) => '█',
                    (true, false) => '▀',
                    (false, true) => '▄',
                    (false, false) => ' ',
                });
                continue;
            }

            if top_dark && bot_dark {
                if !last_sgr.is_empty() {
                    out.push_str("\x1b[0m");
                    last_sgr.clear();
                }
                out.push(' ');
                continue;
            }

            let (tr, tg, tb) = shaded(top);
            let (br, bg, bb) = shaded(bot);
            let sgr = format!(
                "{};{}",
                color_to_fg(canvas.map_color(tr, tg, tb)),
                color_to_bg(canvas.map_color(br, bg, bb)),
            );
            if sgr != last_sgr {
                out.push_str("\x1b[");
                out.push_str(&sgr);
                out.push('m');
                last_sgr = sgr;
            }
            out.push('▀');
        }
        if !last_sgr.is_empty() {
            out.push_str("\x1b[0m");
            last_sgr.clear();
        }
        out.push_str(&format!("\x1b[{};1H", row + 2));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::canvas::{RenderMode, WHITE};

    #[test]
    fn test_mono_picks_half_blocks() {
        let mut c = Canvas::new(2, 1, RenderMode::HalfBlock, ColorMode::Mono);
        c.blend(0, 0, WHITE, 1.0);
        c.blend(1, 1, WHITE, 1.0);
        assert!(render(&c).starts_with("▀▄"));
    }

    #[test]
    fn test_true_color_emits_fg_and_bg() {
        let mut c = Canvas::new(1, 1, RenderMode::HalfBlock, ColorMode::TrueColor);
        c.blend(0, 0, WHITE, 1.0);
        let frame = render(&c);
        assert!(frame.contains("38;2;255;255;255;48;2;0;0;0"));
    }
}
