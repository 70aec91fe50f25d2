//! Classic doom-fire: heat is seeded along the bottom row and drifts up,
//! cooling as it goes.

use deskapp_core::keycodes::Keycode;
use rand::Rng;
use ratatui::style::{Color, Style};

use crate::compositor::Panel;
use crate::module::{Capabilities, Context, KeyBinder, Module, Render};

const GLYPHS: &[char] = &[' ', '.', ':', '*', 's', 'S', '#', '$'];
const MAX_HEAT: u8 = 36;
const MAX_INTENSITY: u8 = 10;

/// Fire animation
#[derive(Debug)]
pub struct Fire {
    heat: Vec<u8>,
    width: usize,
    height: usize,
    intensity: u8,
    paused: bool,
}

impl Default for Fire {
    fn default() -> Self {
        Self {
            heat: Vec::new(),
            width: 0,
            height: 0,
            intensity: 7,
            paused: false,
        }
    }
}

impl Fire {
    /// Current intensity, 0 to 10
    pub fn intensity(&self) -> u8 {
        self.intensity
    }

    /// Whether the animation is frozen
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    fn resize(&mut self, width: usize, height: usize) {
        if (width, height) != (self.width, self.height) {
            self.width = width;
            self.height = height;
            self.heat = vec![0; width * height];
        }
    }

    fn advance(&mut self, rng: &mut impl Rng) {
        let (w, h) = (self.width, self.height);
        if w == 0 || h == 0 {
            return;
        }

        let seed_max = u16::from(MAX_HEAT) * u16::from(self.intensity) / u16::from(MAX_INTENSITY);
        let seed_max = u8::try_from(seed_max).unwrap_or(MAX_HEAT);
        for x in 0..w {
            self.heat[(h - 1) * w + x] = rng.gen_range(0..=seed_max);
        }

        for y in 0..h - 1 {
            for x in 0..w {
                let below = self.heat[(y + 1) * w + x];
                let drift = rng.gen_range(0..3);
                let target = (x + drift).saturating_sub(1).min(w - 1);
                let cool = rng.gen_range(0..=2);
                self.heat[y * w + target] = below.saturating_sub(cool);
            }
        }
    }

    fn cell(heat: u8) -> (char, Style) {
        let index = usize::from(heat) * (GLYPHS.len() - 1) / usize::from(MAX_HEAT);
        let color = match heat {
            0..=5 => Color::DarkGray,
            6..=14 => Color::Red,
            15..=24 => Color::LightRed,
            25..=31 => Color::Yellow,
            _ => Color::White,
        };
        (GLYPHS[index.min(GLYPHS.len() - 1)], Style::default().fg(color))
    }
}

impl Module for Fire {
    fn name(&self) -> &str {
        "Fire"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::PRIMARY | Capabilities::INFO
    }

    fn render(&mut self, panel: &mut Panel, _ctx: &Context) -> anyhow::Result<Render> {
        let inner = panel.inner();
        self.resize(usize::from(inner.width), usize::from(inner.height));
        if !self.paused {
            self.advance(&mut rand::thread_rng());
        }

        for (row, y) in (0..self.height).zip(inner.y..) {
            for (col, x) in (0..self.width).zip(inner.x..) {
                let (glyph, style) = Self::cell(self.heat[row * self.width + col]);
                panel.buffer[(x, y)].set_char(glyph).set_style(style);
            }
        }
        Ok(Render::Handled)
    }

    fn render_info(&mut self, _panel: &mut Panel, _ctx: &Context) -> anyhow::Result<Render> {
        let state = if self.paused { "paused" } else { "burning" };
        Ok(Render::lines([
            format!("intensity {}/{MAX_INTENSITY}  {state}", self.intensity),
            "up/down intensity  space pause".to_string(),
        ]))
    }

    fn bind_keys(&self, keys: &mut KeyBinder<'_, Self>) {
        keys.bind(Keycode::UP, "hotter", "raise intensity", |fire, _ctx| {
            fire.intensity = (fire.intensity + 1).min(MAX_INTENSITY);
            Ok(())
        });
        keys.bind(Keycode::DOWN, "cooler", "lower intensity", |fire, _ctx| {
            fire.intensity = fire.intensity.saturating_sub(1);
            Ok(())
        });
        keys.bind(Keycode::SPACE, "pause", "pause or resume", |fire, ctx| {
            fire.paused = !fire.paused;
            ctx.state
                .messages
                .info(if fire.paused { "fire paused" } else { "fire resumed" });
            Ok(())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_zero_intensity_goes_cold() {
        let mut fire = Fire {
            intensity: 0,
            ..Fire::default()
        };
        fire.resize(8, 4);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10 {
            fire.advance(&mut rng);
        }
        assert!(fire.heat.iter().all(|h| *h == 0));
    }

    #[test]
    fn test_heat_rises_from_the_bottom() {
        let mut fire = Fire::default();
        fire.resize(16, 6);
        let mut rng = StdRng::seed_from_u64(1);
        fire.advance(&mut rng);
        assert!(fire.heat[..16].iter().all(|h| *h == 0));
        for _ in 0..10 {
            fire.advance(&mut rng);
        }
        assert!(fire.heat[..16 * 5].iter().any(|h| *h > 0));
        assert!(fire.heat.iter().all(|h| *h <= MAX_HEAT));
    }

    #[test]
    fn test_glyphs_cover_the_heat_range() {
        assert_eq!(Fire::cell(0).0, ' ');
        assert_eq!(Fire::cell(MAX_HEAT).0, '$');
    }
}
