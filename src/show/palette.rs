//! Colour tables: the standard palette, classic metallic finishes, and the
//! built-in country flag lookup.

use rand::RngExt;

use super::entity::FlagLayout::{Gradient as G, Horizontal as H, Vertical as V};
use super::entity::{ClassicFinish, FireworkKind, FlagLayout, Rgb};

/// Flat colours for standard shots. No green: it reads as the city glow.
pub const STANDARD_PALETTE: [Rgb; 10] = [
    Rgb::new(255, 50, 80),   // red
    Rgb::new(255, 200, 50),  // bright gold
    Rgb::new(50, 200, 255),  // blue
    Rgb::new(255, 100, 255), // pink
    Rgb::new(150, 100, 255), // purple
    Rgb::new(255, 150, 50),  // orange
    Rgb::new(255, 80, 120),  // coral
    Rgb::new(200, 100, 255), // lavender
    Rgb::new(100, 255, 255), // cyan
    Rgb::new(255, 255, 100), // yellow
];

pub const GOLD: Rgb = Rgb::new(255, 215, 0);
/// Third colour slot of a gold burst
pub const GOLD_WHITE: Rgb = Rgb::new(255, 240, 200);
/// Gold sparkle overlay
pub const SPARKLE: Rgb = Rgb::new(255, 250, 230);
/// Rocket trail segments that are not white
pub const EMBER_ORANGE: Rgb = Rgb::new(255, 150, 80);
/// Cursor flare sparks
pub const FLARE: Rgb = Rgb::new(255, 235, 190);
/// Three-stop gradient of brand text and finale messages
pub const BRAND_GRADIENT: [Rgb; 3] = [
    Rgb::new(255, 215, 0),
    Rgb::new(255, 120, 40),
    Rgb::new(255, 60, 160),
];

/// A classic metallic shot.
pub fn classic(finish: ClassicFinish) -> FireworkKind {
    let (primary, secondary) = match finish {
        ClassicFinish::Gold => (GOLD, Rgb::new(255, 250, 240)),
        ClassicFinish::White => (Rgb::WHITE, Rgb::new(240, 240, 255)),
        ClassicFinish::Silver => (Rgb::new(192, 192, 192), Rgb::WHITE),
    };
    FireworkKind::Classic {
        finish,
        primary,
        secondary,
        drip: true,
    }
}

pub fn random_classic(rng: &mut impl RngExt) -> FireworkKind {
    const FINISHES: [ClassicFinish; 3] = [ClassicFinish::Gold, ClassicFinish::White, ClassicFinish::Silver];
    classic(FINISHES[rng.random_range(0..FINISHES.len())])
}

pub fn random_standard(rng: &mut impl RngExt) -> FireworkKind {
    FireworkKind::Standard {
        color: STANDARD_PALETTE[rng.random_range(0..STANDARD_PALETTE.len())],
    }
}

/// Colours, display name, and stripe layout of a country flag.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagTheme {
    pub colors: Vec<Rgb>,
    pub name: String,
    pub layout: FlagLayout,
}

impl FlagTheme {
    /// Country shot using this flag. Short flags repeat their last colour.
    pub fn kind(&self) -> FireworkKind {
        let mut colors = [Rgb::WHITE; 4];
        let mut last = self.colors.first().copied().unwrap_or(Rgb::WHITE);
        for (i, slot) in colors.iter_mut().enumerate() {
            if let Some(c) = self.colors.get(i) {
                last = *c;
            }
            *slot = last;
        }
        FireworkKind::Country {
            colors,
            name: self.name.clone(),
            layout: self.layout,
        }
    }
}

const fn c(r: u8, g: u8, b: u8) -> Rgb {
    Rgb::new(r, g, b)
}

#[rustfmt::skip]
const FLAGS: &[(&str, &str, FlagLayout, &[Rgb])] = &[
    ("FR", "FRANCE", V, &[c(0, 85, 164), c(255, 255, 255), c(239, 65, 53)]),
    ("IT", "ITALY", V, &[c(0, 146, 70), c(255, 255, 255), c(206, 43, 55)]),
    ("IE", "IRELAND", V, &[c(22, 155, 98), c(255, 255, 255), c(255, 136, 62)]),
    ("BE", "BELGIUM", V, &[c(0, 0, 0), c(253, 218, 36), c(239, 51, 64)]),
    ("RO", "ROMANIA", V, &[c(0, 43, 127), c(252, 209, 22), c(206, 17, 38)]),
    ("MX", "MEXICO", V, &[c(0, 104, 71), c(255, 255, 255), c(206, 17, 38)]),
    ("NG", "NIGERIA", V, &[c(0, 135, 81), c(255, 255, 255), c(0, 135, 81)]),
    ("PE", "PERU", V, &[c(217, 16, 35), c(255, 255, 255), c(217, 16, 35)]),
    ("DE", "GERMANY", H, &[c(0, 0, 0), c(255, 0, 0), c(255, 206, 0)]),
    ("RU", "RUSSIA", H, &[c(255, 255, 255), c(0, 57, 166), c(213, 43, 30)]),
    ("NL", "NETHERLANDS", H, &[c(174, 28, 40), c(255, 255, 255), c(33, 70, 139)]),
    ("HU", "HUNGARY", H, &[c(205, 42, 62), c(255, 255, 255), c(67, 111, 77)]),
    ("AT", "AUSTRIA", H, &[c(237, 41, 57), c(255, 255, 255), c(237, 41, 57)]),
    ("PL", "POLAND", H, &[c(255, 255, 255), c(220, 20, 60)]),
    ("ID", "INDONESIA", H, &[c(255, 0, 0), c(255, 255, 255)]),
    ("UA", "UKRAINE", H, &[c(0, 91, 187), c(255, 221, 0)]),
    ("US", "USA", V, &[c(178, 34, 52), c(255, 255, 255), c(60, 59, 110)]),
    ("CA", "CANADA", V, &[c(255, 0, 0), c(255, 255, 255), c(255, 0, 0)]),
    ("ES", "SPAIN", H, &[c(170, 0, 0), c(255, 196, 0), c(170, 0, 0)]),
    ("IN", "INDIA", H, &[c(255, 153, 51), c(255, 255, 255), c(18, 136, 7)]),
    ("AR", "ARGENTINA", H, &[c(116, 172, 223), c(255, 255, 255), c(116, 172, 223)]),
    ("CO", "COLOMBIA", H, &[c(252, 209, 22), c(0, 56, 168), c(206, 17, 38)]),
    ("SE", "SWEDEN", V, &[c(0, 106, 167), c(254, 204, 0), c(0, 106, 167)]),
    ("NO", "NORWAY", V, &[c(186, 12, 47), c(255, 255, 255), c(0, 40, 104)]),
    ("FI", "FINLAND", V, &[c(255, 255, 255), c(0, 47, 108), c(255, 255, 255)]),
    ("DK", "DENMARK", V, &[c(198, 12, 48), c(255, 255, 255), c(198, 12, 48)]),
    ("JP", "JAPAN", V, &[c(255, 255, 255), c(188, 0, 45), c(255, 255, 255)]),
    ("CN", "CHINA", V, &[c(222, 41, 16), c(255, 222, 0), c(222, 41, 16)]),
    ("BR", "BRAZIL", G, &[c(0, 156, 59), c(254, 223, 0), c(0, 39, 118)]),
    ("AU", "AUSTRALIA", G, &[c(0, 0, 139), c(255, 255, 255), c(255, 0, 0)]),
    ("KR", "SOUTH KOREA", G, &[c(255, 255, 255), c(205, 37, 44), c(0, 71, 160)]),
    ("ZA", "SOUTH AFRICA", G, &[c(0, 119, 73), c(252, 209, 22), c(222, 56, 49), c(0, 46, 95)]),
    ("GB", "UNITED KINGDOM", G, &[c(1, 33, 105), c(255, 255, 255), c(200, 16, 46)]),
    ("NZ", "NEW ZEALAND", G, &[c(0, 36, 125), c(204, 0, 51), c(255, 255, 255)]),
    ("CH", "SWITZERLAND", V, &[c(255, 0, 0), c(255, 255, 255), c(255, 0, 0)]),
    ("PT", "PORTUGAL", V, &[c(0, 102, 0), c(255, 0, 0)]),
    ("GR", "GREECE", H, &[c(13, 94, 175), c(255, 255, 255), c(13, 94, 175)]),
    ("TR", "TURKEY", V, &[c(227, 10, 23), c(255, 255, 255), c(227, 10, 23)]),
    ("SG", "SINGAPORE", H, &[c(237, 27, 46), c(255, 255, 255)]),
    ("TH", "THAILAND", H, &[c(237, 28, 36), c(255, 255, 255), c(45, 42, 74)]),
    ("PH", "PHILIPPINES", G, &[c(0, 56, 168), c(206, 17, 38), c(255, 255, 255), c(252, 209, 22)]),
    ("MY", "MALAYSIA", G, &[c(204, 0, 0), c(255, 255, 255), c(0, 0, 128), c(252, 196, 0)]),
    ("VN", "VIETNAM", V, &[c(218, 37, 29), c(255, 255, 0), c(218, 37, 29)]),
    ("CL", "CHILE", G, &[c(0, 56, 168), c(255, 255, 255), c(215, 0, 21)]),
    ("CZ", "CZECH REPUBLIC", G, &[c(17, 69, 126), c(255, 255, 255), c(215, 20, 26)]),
    ("IL", "ISRAEL", H, &[c(0, 56, 184), c(255, 255, 255), c(0, 56, 184)]),
    ("AE", "UNITED ARAB EMIRATES", H, &[c(0, 122, 61), c(255, 255, 255), c(0, 0, 0)]),
    ("SA", "SAUDI ARABIA", V, &[c(0, 98, 56), c(255, 255, 255), c(0, 98, 56)]),
    ("EG", "EGYPT", H, &[c(206, 17, 38), c(255, 255, 255), c(0, 0, 0)]),
    ("KE", "KENYA", H, &[c(0, 0, 0), c(188, 20, 26), c(0, 104, 56)]),
];

/// Look up a flag by ISO 3166 alpha-2 code (case-insensitive).
pub fn flag_for(code: &str) -> Option<FlagTheme> {
    let code = code.trim();
    FLAGS
        .iter()
        .find(|(iso, ..)| iso.eq_ignore_ascii_case(code))
        .map(|(_, name, layout, colors)| FlagTheme {
            colors: colors.to_vec(),
            name: (*name).to_string(),
            layout: *layout,
        })
}
