//! `text` plugin: free text and formatted prices.
//!
//! Exactly one draw mode applies per instance:
//!
//! | Flag | Mode | Output |
//! |------|------|--------|
//! | `drawWrapped` | wrapped | `text`, ellipsized to `maxCharacter`, word-wrapped at `textWidth` |
//! | `isDec` | decimal price | `decimal_price` zero-padded to 3 digits + currency |
//! | `isInt` | integer price | `int_price` grouped, followed by the separator |
//! | *(none)* | price | promotional price, optionally followed by the struck-through original |
//!
//! `x`/`y` are absolute pixels. In the price modes they are the baseline
//! origin of the first run; in wrapped mode they double as the anchor point
//! (`x / canvas_width`, `y / canvas_height`).
//!
//! Layout is computed first as a [`TextLayout`] (runs and rules), then
//! painted, so tests can check what a mode decided to draw.

use std::collections::BTreeMap;

use async_trait::async_trait;
use image::Rgba;
use serde::Deserialize;

use super::{BindField, BindValues, Binding, Capability, PluginKind};
use crate::assets::AssetSource;
use crate::error::{BindError, ConfigError, DrawError};
use crate::raster::Canvas;
use crate::raster::color::{self, BLACK};
use crate::raster::font::{FontFace, ellipsis};

/// Offset of the decimal part, in widths of the integer part.
const DECIMAL_OFFSET: f64 = 1.35;
/// Strike rule height above the baseline, as a fraction of line height.
const STRIKE_RISE: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Vi,
    En,
}

impl Locale {
    pub fn group_separator(&self) -> char {
        match self {
            Locale::Vi => '.',
            Locale::En => ',',
        }
    }

    pub fn currency(&self) -> &'static str {
        match self {
            Locale::Vi => "đ",
            Locale::En => "",
        }
    }
}

/// `1234567` → `1.234.567` with the locale's separator.
pub fn group_thousands(n: i64, locale: Locale) -> String {
    let digits = n.unsigned_abs().to_string();
    let sep = locale.group_separator();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(sep);
        }
        out.push(ch);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Text,
    Price,
    PromotionPrice,
    DecimalPrice,
    IntPrice,
}

impl BindField for TextField {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "text" => Some(TextField::Text),
            "price" => Some(TextField::Price),
            "promotion_price" => Some(TextField::PromotionPrice),
            "decimal_price" => Some(TextField::DecimalPrice),
            "int_price" => Some(TextField::IntPrice),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    Wrapped,
    DecimalPrice,
    IntPrice,
    Price,
}

/// One line of text positioned by its baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphRun {
    pub text: String,
    pub x: f64,
    pub baseline: f64,
    pub width: f64,
}

/// A horizontal strike rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub x0: f64,
    pub x1: f64,
    pub y: f64,
    pub thickness: f64,
}

impl Rule {
    pub fn length(&self) -> f64 {
        self.x1 - self.x0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextLayout {
    pub runs: Vec<GlyphRun>,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TextPlugin {
    pub binding: BTreeMap<String, String>,
    pub text: String,
    pub price: i64,
    #[serde(rename = "promotionprice")]
    pub promotion_price: i64,
    #[serde(rename = "decimalprice")]
    pub decimal_price: i64,
    #[serde(rename = "intprice")]
    pub int_price: i64,

    pub x: f64,
    pub y: f64,
    pub color: String,
    #[serde(rename = "fonturi")]
    pub font_uri: String,
    #[serde(rename = "fontsize")]
    pub font_size: f64,
    #[serde(rename = "strikefull")]
    pub strike_full: bool,
    #[serde(rename = "drawwrapped")]
    pub draw_wrapped: bool,
    #[serde(rename = "isdec")]
    pub is_dec: bool,
    #[serde(rename = "isint")]
    pub is_int: bool,
    #[serde(rename = "linespacing")]
    pub line_spacing: f64,
    #[serde(rename = "textwidth")]
    pub text_width: f64,
    #[serde(rename = "maxcharacter")]
    pub max_character: usize,
    pub locale: Locale,
    pub currency: Option<String>,

    #[serde(skip)]
    bindings: Binding<TextField>,
    #[serde(skip)]
    face: Option<FontFace>,
    #[serde(skip)]
    rgba: Rgba<u8>,
}

impl Default for TextPlugin {
    fn default() -> Self {
        Self {
            binding: BTreeMap::new(),
            text: String::new(),
            price: 0,
            promotion_price: 0,
            decimal_price: 0,
            int_price: 0,
            x: 0.0,
            y: 0.0,
            color: String::new(),
            font_uri: String::new(),
            font_size: 0.0,
            strike_full: false,
            draw_wrapped: false,
            is_dec: false,
            is_int: false,
            line_spacing: 1.0,
            text_width: 0.0,
            max_character: 0,
            locale: Locale::default(),
            currency: None,
            bindings: Binding::default(),
            face: None,
            rgba: BLACK,
        }
    }
}

impl TextPlugin {
    pub fn mode(&self) -> DrawMode {
        if self.draw_wrapped {
            DrawMode::Wrapped
        } else if self.is_dec {
            DrawMode::DecimalPrice
        } else if self.is_int {
            DrawMode::IntPrice
        } else {
            DrawMode::Price
        }
    }

    fn currency(&self) -> &str {
        self.currency.as_deref().unwrap_or(self.locale.currency())
    }

    /// `123456` → `123.456đ`
    pub fn format_price(&self, amount: i64) -> String {
        format!("{}{}", group_thousands(amount, self.locale), self.currency())
    }

    fn int_label(&self) -> String {
        format!(
            "{}{}",
            group_thousands(self.int_price, self.locale),
            self.locale.group_separator()
        )
    }

    /// Decide what to draw on a `width × height` canvas.
    pub fn layout(&self, width: u32, height: u32) -> Result<TextLayout, DrawError> {
        let face = self.face.as_ref().ok_or(DrawError::NotConfigured)?;
        let mut layout = TextLayout::default();
        let run = |text: String, x: f64, baseline: f64| GlyphRun {
            width: face.measure(&text).0,
            text,
            x,
            baseline,
        };

        match self.mode() {
            DrawMode::Wrapped => {
                let text = ellipsis(&self.text, self.max_character);
                let lines = face.wrap(&text, self.text_width);
                let fh = face.line_height();
                let spacing = self.line_spacing;
                let block_h = lines.len() as f64 * fh * spacing - (spacing - 1.0) * fh;

                let ax = if width > 0 { self.x / width as f64 } else { 0.0 };
                let ay = if height > 0 { self.y / height as f64 } else { 0.0 };
                let left = self.x - ax * self.text_width;
                let top = self.y - ay * block_h;

                for (i, line) in lines.into_iter().enumerate() {
                    let baseline = top + fh + i as f64 * fh * spacing;
                    layout.runs.push(run(line, left, baseline));
                }
            }
            DrawMode::IntPrice => {
                layout.runs.push(run(self.int_label(), self.x, self.y));
            }
            DrawMode::DecimalPrice => {
                let (int_w, _) = face.measure(&self.int_label());
                let label = format!("{:03}{}", self.decimal_price, self.currency());
                layout
                    .runs
                    .push(run(label, self.x + int_w * DECIMAL_OFFSET, self.y));
            }
            DrawMode::Price => {
                let has_promo = self.promotion_price > 0 && self.promotion_price < self.price;
                if !has_promo {
                    let amount = if self.price > 0 {
                        self.price
                    } else {
                        self.promotion_price
                    };
                    if amount > 0 {
                        layout.runs.push(run(self.format_price(amount), self.x, self.y));
                    }
                    return Ok(layout);
                }

                let promo = run(self.format_price(self.promotion_price), self.x, self.y);
                let end = promo.x + promo.width;
                layout.runs.push(promo);

                if self.strike_full {
                    let original = run(self.format_price(self.price), end, self.y);
                    let fh = face.line_height();
                    layout.rules.push(Rule {
                        x0: end,
                        x1: end + original.width,
                        y: self.y - fh * STRIKE_RISE,
                        thickness: (fh / 24.0).round().max(1.0),
                    });
                    layout.runs.push(original);
                }
            }
        }

        Ok(layout)
    }
}

#[async_trait]
impl Capability for TextPlugin {
    const KIND: PluginKind = PluginKind::Text;

    async fn configure(&mut self, assets: &AssetSource) -> Result<(), ConfigError> {
        if self.font_uri.is_empty() {
            return Err(ConfigError::MissingField("fontUri"));
        }
        if self.font_size <= 0.0 {
            return Err(ConfigError::MissingField("fontSize"));
        }
        if self.line_spacing <= 0.0 {
            self.line_spacing = 1.0;
        }
        self.bindings = Binding::parse(&self.binding, Self::KIND)?;
        self.rgba = color::parse_or(&self.color, BLACK)?;
        self.face = Some(FontFace::load(&self.font_uri, self.font_size as f32, assets).await?);
        Ok(())
    }

    async fn bind(
        &self,
        values: &BindValues,
        _assets: &AssetSource,
    ) -> Result<Option<Self>, BindError> {
        if self.bindings.is_empty() {
            return Ok(None);
        }

        let mut copy = self.clone();
        let mut changed = false;
        for (field, key) in self.bindings.iter() {
            changed |= match field {
                TextField::Text => replace(&mut copy.text, values.get_string(key)),
                TextField::Price => replace(&mut copy.price, values.get_int(key)?),
                TextField::PromotionPrice => {
                    replace(&mut copy.promotion_price, values.get_int(key)?)
                }
                TextField::DecimalPrice => {
                    replace(&mut copy.decimal_price, values.get_int(key)? % 1000)
                }
                TextField::IntPrice => replace(&mut copy.int_price, values.get_int(key)? / 1000),
            };
        }

        Ok(changed.then_some(copy))
    }

    fn apply(&self, canvas: &mut Canvas) -> Result<(), DrawError> {
        let layout = self.layout(canvas.width(), canvas.height())?;
        let face = self.face.as_ref().ok_or(DrawError::NotConfigured)?;

        for rule in &layout.rules {
            canvas.hline(rule.x0, rule.x1, rule.y, rule.thickness, self.rgba);
        }
        for run in &layout.runs {
            face.draw(canvas, &run.text, run.x, run.baseline, self.rgba);
        }
        Ok(())
    }

    fn is_bound(&self) -> bool {
        !self.binding.is_empty()
    }
}

/// Store `value` in `slot`, reporting whether it differed.
fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}
