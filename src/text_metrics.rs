use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;
use ttf_parser::Face;

static TEXT_MEASURER: Lazy<Mutex<TextMeasurer>> = Lazy::new(|| Mutex::new(TextMeasurer::new()));

const ELLIPSIS: char = '\u{2026}';

/// Width of `text` using the first installed font matching `font_family`.
/// `None` when no font can be loaded.
pub fn measure_text_width(text: &str, font_size: f32, font_family: &str) -> Option<f32> {
    if text.is_empty() || font_size <= 0.0 {
        return Some(0.0);
    }
    let mut guard = TEXT_MEASURER.lock().ok()?;
    guard.measure(text, font_size, font_family)
}

/// Font-independent width estimate from per-character classes.
pub fn estimate_text_width(text: &str, font_size: f32) -> f32 {
    text.chars()
        .map(|ch| match ch {
            ' ' | '.' | ',' | ':' | ';' | '|' | '!' | '\'' | 'i' | 'l' | 'j' | 'I' => 0.3,
            'f' | 't' | 'r' | '(' | ')' | '[' | ']' | '-' => 0.4,
            'm' | 'w' | 'M' | 'W' | '%' | '@' => 0.85,
            ch if ch.is_ascii_uppercase() || ch.is_ascii_digit() => 0.64,
            ch if ch.is_ascii() => 0.55,
            _ => 0.9,
        })
        .sum::<f32>()
        * font_size
}

pub fn text_width(text: &str, font_size: f32, font_family: &str, fast: bool) -> f32 {
    if fast {
        return estimate_text_width(text, font_size);
    }
    measure_text_width(text, font_size, font_family)
        .unwrap_or_else(|| estimate_text_width(text, font_size))
}

/// Truncates `text` with an ellipsis so it fits in `max_width`.
pub fn fit_label(
    text: &str,
    max_width: f32,
    font_size: f32,
    font_family: &str,
    fast: bool,
) -> String {
    if text_width(text, font_size, font_family, fast) <= max_width {
        return text.to_string();
    }
    let mut chars: Vec<char> = text.chars().collect();
    while !chars.is_empty() {
        chars.pop();
        let mut candidate: String = chars.iter().collect::<String>().trim_end().to_string();
        candidate.push(ELLIPSIS);
        if text_width(&candidate, font_size, font_family, fast) <= max_width {
            return candidate;
        }
    }
    ELLIPSIS.to_string()
}

struct TextMeasurer {
    db: Database,
    loaded_system_fonts: bool,
    cache: HashMap<String, Option<FontFace>>,
}

impl TextMeasurer {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            cache: HashMap::new(),
        }
    }

    fn measure(&mut self, text: &str, font_size: f32, font_family: &str) -> Option<f32> {
        let key = font_family.trim().to_string();
        if !self.cache.contains_key(&key) {
            let face = self.load_face(font_family);
            if face.is_none() {
                tracing::debug!(font_family, "no installed font matched, estimating text widths");
            }
            self.cache.insert(key.clone(), face);
        }
        let face = self.cache.get(&key)?.as_ref()?;
        Some(face.measure_width(text, font_size))
    }

    fn load_face(&mut self, font_family: &str) -> Option<FontFace> {
        let mut names: Vec<String> = Vec::new();
        let mut generics: Vec<(usize, Family<'static>)> = Vec::new();
        for part in font_family.split(',') {
            let raw = part.trim().trim_matches('"').trim_matches('\'');
            if raw.is_empty() {
                continue;
            }
            let generic = match raw.to_ascii_lowercase().as_str() {
                "serif" => Some(Family::Serif),
                "sans-serif" | "system-ui" | "-apple-system" | "ui-sans-serif" => {
                    Some(Family::SansSerif)
                }
                "monospace" | "ui-monospace" => Some(Family::Monospace),
                _ => None,
            };
            match generic {
                Some(family) => generics.push((names.len(), family)),
                None => names.push(raw.to_string()),
            }
        }

        // Named families keep their position relative to the generic fallbacks.
        let mut families: Vec<Family<'_>> = Vec::new();
        let mut generic_iter = generics.iter().peekable();
        for (idx, name) in names.iter().enumerate() {
            while let Some((at, family)) = generic_iter.peek() {
                if *at > idx {
                    break;
                }
                families.push(*family);
                generic_iter.next();
            }
            families.push(Family::Name(name.as_str()));
        }
        families.extend(generic_iter.map(|(_, family)| *family));
        if families.is_empty() {
            families.push(Family::SansSerif);
        }

        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
        }

        let query = Query {
            families: &families,
            weight: Weight::NORMAL,
            stretch: Stretch::Normal,
            style: Style::Normal,
        };
        let id = self.db.query(&query)?;
        self.db
            .with_face_data(id, |data, index| FontFace::parse(data, index))
            .flatten()
    }
}

/// Horizontal advances copied out of a parsed face, so no borrowed font data
/// has to outlive the database callback.
struct FontFace {
    units_per_em: f32,
    advances: HashMap<char, u16>,
    fallback_advance: u16,
}

impl FontFace {
    fn parse(data: &[u8], index: u32) -> Option<Self> {
        let face = Face::parse(data, index).ok()?;
        let mut advances = HashMap::new();
        let mut total = 0u32;
        let mut seen = 0u32;
        for ch in (0x20u8..0x7f).map(char::from).chain(['\u{2026}', '\u{00a0}']) {
            if let Some(glyph) = face.glyph_index(ch) {
                let advance = face.glyph_hor_advance(glyph).unwrap_or(0);
                advances.insert(ch, advance);
                total += advance as u32;
                seen += 1;
            }
        }
        let fallback_advance = if seen == 0 { 0 } else { (total / seen) as u16 };
        Some(Self {
            units_per_em: face.units_per_em().max(1) as f32,
            advances,
            fallback_advance,
        })
    }

    fn measure_width(&self, text: &str, font_size: f32) -> f32 {
        let scale = font_size / self.units_per_em;
        text.chars()
            .filter(|ch| *ch != '\n')
            .map(|ch| {
                let advance = self.advances.get(&ch).copied().unwrap_or(self.fallback_advance);
                advance as f32 * scale
            })
            .sum::<f32>()
            .max(0.0)
    }
}
