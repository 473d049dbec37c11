//! # Plugins
//!
//! A template is an ordered list of plugins. Each plugin is one drawing
//! operation with a three-step lifecycle:
//!
//! ```text
//!   YAML fields ──parse──► Plugin ──configure──► configured (shared, read-only)
//!                                                   │
//!                         per request: bind(values) │  binding declared and a
//!                                                   ▼  value changed? → new copy
//!                                              bound Plugin ──apply──► Canvas
//! ```
//!
//! | Tag | Type | Draws |
//! |-----|------|-------|
//! | `image` | [`ImagePlugin`] | a raster fitted into a fractional rectangle |
//! | `text` | [`TextPlugin`] | free text or formatted prices |
//! | `qr` | [`QrPlugin`] | a QR code centred on a fractional point |
//!
//! ## Binding
//!
//! Any plugin may declare a `binding` map of `field → request key`. Field
//! names are checked against a per-kind enum at configure time; request
//! values are looked up and coerced only when binding. A plugin without a
//! binding is returned as-is (same `Arc`) from every bind.

pub mod image;
pub mod qr;
pub mod text;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::assets::AssetSource;
use crate::error::{BindError, ConfigError, DrawError, RenderError};
use crate::raster::Canvas;

pub use self::image::ImagePlugin;
pub use self::qr::QrPlugin;
pub use self::text::TextPlugin;

/// Plugin type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    Image,
    Text,
    Qr,
}

impl PluginKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginKind::Image => "image",
            PluginKind::Text => "text",
            PluginKind::Qr => "qr",
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Request values
// ============================================================================

/// A scalar request value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BindValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl BindValue {
    pub fn to_string_value(&self) -> String {
        match self {
            BindValue::Int(n) => n.to_string(),
            BindValue::Float(f) => f.to_string(),
            BindValue::Str(s) => s.clone(),
        }
    }
}

impl From<&str> for BindValue {
    fn from(s: &str) -> Self {
        BindValue::Str(s.to_string())
    }
}

impl From<String> for BindValue {
    fn from(s: String) -> Self {
        BindValue::Str(s)
    }
}

impl From<i64> for BindValue {
    fn from(n: i64) -> Self {
        BindValue::Int(n)
    }
}

/// The per-request value set. Keys are case-insensitive (stored lowercase).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BindValues(HashMap<String, BindValue>);

impl BindValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: impl Into<BindValue>) {
        self.0.insert(key.to_lowercase(), value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: &str, value: impl Into<BindValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&BindValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// String form of `key`; missing keys read as empty.
    pub fn get_string(&self, key: &str) -> String {
        self.get(key).map(BindValue::to_string_value).unwrap_or_default()
    }

    /// Integer form of `key`. Missing or blank values coerce to 0;
    /// anything else that is not an integer is a [`BindError::Coercion`].
    pub fn get_int(&self, key: &str) -> Result<i64, BindError> {
        match self.get(key) {
            None => Ok(0),
            Some(BindValue::Int(n)) => Ok(*n),
            Some(BindValue::Float(f)) if f.fract() == 0.0 => Ok(*f as i64),
            Some(BindValue::Str(s)) if s.trim().is_empty() => Ok(0),
            Some(BindValue::Str(s)) => s.trim().parse().map_err(|_| BindError::Coercion {
                key: key.to_string(),
                value: s.clone(),
            }),
            Some(other) => Err(BindError::Coercion {
                key: key.to_string(),
                value: other.to_string_value(),
            }),
        }
    }
}

impl<K: AsRef<str>, V: Into<BindValue>> FromIterator<(K, V)> for BindValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = BindValues::new();
        for (k, v) in iter {
            values.insert(k.as_ref(), v);
        }
        values
    }
}

// ============================================================================
// Binding maps
// ============================================================================

/// A bindable field of one plugin kind.
pub trait BindField: Copy + fmt::Debug + Send + Sync + 'static {
    fn parse(name: &str) -> Option<Self>;
}

/// Typed form of a `binding:` map, in declaration (sorted) order.
#[derive(Debug, Clone)]
pub struct Binding<F: BindField> {
    entries: Vec<(F, String)>,
}

impl<F: BindField> Default for Binding<F> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<F: BindField> Binding<F> {
    /// Validate a raw map, lowercasing field names and request keys.
    pub fn parse(raw: &BTreeMap<String, String>, kind: PluginKind) -> Result<Self, ConfigError> {
        let entries = raw
            .iter()
            .map(|(field, key)| {
                let field = field.to_lowercase();
                let parsed = F::parse(&field).ok_or(ConfigError::UnknownBinding {
                    kind,
                    field: field.clone(),
                })?;
                Ok((parsed, key.to_lowercase()))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (F, &str)> {
        self.entries.iter().map(|(f, k)| (*f, k.as_str()))
    }
}

// ============================================================================
// Capability
// ============================================================================

/// The contract every plugin kind implements.
#[async_trait]
pub trait Capability: Clone + Send + Sync + Sized {
    const KIND: PluginKind;

    /// One-time setup from the declared fields. On error the plugin must not
    /// be drawn.
    async fn configure(&mut self, assets: &AssetSource) -> Result<(), ConfigError>;

    /// Resolve the binding against `values`. `Ok(None)` means nothing changed
    /// and the receiver should be reused.
    async fn bind(
        &self,
        values: &BindValues,
        assets: &AssetSource,
    ) -> Result<Option<Self>, BindError>;

    /// Paint onto the canvas.
    fn apply(&self, canvas: &mut Canvas) -> Result<(), DrawError>;

    /// True when the plugin declares any binding.
    fn is_bound(&self) -> bool;
}

/// One configured drawing operation.
#[derive(Debug, Clone)]
pub enum Plugin {
    Image(ImagePlugin),
    Text(TextPlugin),
    Qr(QrPlugin),
}

impl Plugin {
    pub fn kind(&self) -> PluginKind {
        match self {
            Plugin::Image(_) => ImagePlugin::KIND,
            Plugin::Text(_) => TextPlugin::KIND,
            Plugin::Qr(_) => QrPlugin::KIND,
        }
    }

    pub fn is_bound(&self) -> bool {
        match self {
            Plugin::Image(p) => p.is_bound(),
            Plugin::Text(p) => p.is_bound(),
            Plugin::Qr(p) => p.is_bound(),
        }
    }

    pub async fn configure(&mut self, assets: &AssetSource) -> Result<(), ConfigError> {
        match self {
            Plugin::Image(p) => p.configure(assets).await,
            Plugin::Text(p) => p.configure(assets).await,
            Plugin::Qr(p) => p.configure(assets).await,
        }
    }

    /// Bind a shared plugin. Returns the same `Arc` when nothing changed.
    pub async fn bind(
        plugin: &Arc<Plugin>,
        values: &BindValues,
        assets: &AssetSource,
    ) -> Result<Arc<Plugin>, BindError> {
        let bound = match plugin.as_ref() {
            Plugin::Image(p) => p.bind(values, assets).await?.map(Plugin::Image),
            Plugin::Text(p) => p.bind(values, assets).await?.map(Plugin::Text),
            Plugin::Qr(p) => p.bind(values, assets).await?.map(Plugin::Qr),
        };
        Ok(match bound {
            Some(copy) => Arc::new(copy),
            None => Arc::clone(plugin),
        })
    }

    pub fn apply(&self, canvas: &mut Canvas) -> Result<(), DrawError> {
        match self {
            Plugin::Image(p) => p.apply(canvas),
            Plugin::Text(p) => p.apply(canvas),
            Plugin::Qr(p) => p.apply(canvas),
        }
    }
}

/// Bind every plugin in order. The first failure aborts the whole list.
pub async fn bind_all(
    plugins: &[Arc<Plugin>],
    values: &BindValues,
    assets: &AssetSource,
) -> Result<Vec<Arc<Plugin>>, RenderError> {
    let mut bound = Vec::with_capacity(plugins.len());
    for (index, plugin) in plugins.iter().enumerate() {
        if plugin.is_bound() {
            debug!(index, kind = %plugin.kind(), "bind");
        }
        let p = Plugin::bind(plugin, values, assets)
            .await
            .map_err(|source| RenderError::Bind {
                index,
                kind: plugin.kind(),
                source,
            })?;
        bound.push(p);
    }
    Ok(bound)
}

// ============================================================================
// Parsing
// ============================================================================

/// Lowercase keys and drop underscores so `fontUri`, `fonturi` and
/// `font_uri` all name the same field.
pub(crate) fn normalize_keys(fields: Mapping) -> Mapping {
    fields
        .into_iter()
        .map(|(k, v)| match k {
            Value::String(s) => (Value::String(s.to_lowercase().replace('_', "")), v),
            other => (other, v),
        })
        .collect()
}

/// Build an unconfigured plugin from its type tag and remaining fields.
pub fn parse_plugin_config(tag: &str, fields: Mapping) -> Result<Plugin, ConfigError> {
    let value = Value::Mapping(normalize_keys(fields));
    match tag.to_lowercase().as_str() {
        "image" => Ok(Plugin::Image(serde_yaml::from_value(value)?)),
        "text" => Ok(Plugin::Text(serde_yaml::from_value(value)?)),
        "qr" => Ok(Plugin::Qr(serde_yaml::from_value(value)?)),
        _ => Err(ConfigError::UnknownPluginType(tag.to_string())),
    }
}

/// Split the `type` tag off a plugin mapping and parse the rest.
pub fn parse_plugin_entry(mut fields: Mapping) -> Result<Plugin, ConfigError> {
    let tag = match fields.remove("type") {
        Some(Value::String(tag)) => tag,
        Some(_) => {
            return Err(ConfigError::InvalidField {
                field: "type",
                reason: "must be a string".to_string(),
            });
        }
        None => return Err(ConfigError::MissingField("type")),
    };
    parse_plugin_config(&tag, fields)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::fetch::{Fetcher, FetcherConfig};

    /// Asset source with a throw-away static root and no proxy.
    pub(crate) fn test_assets(root: &std::path::Path) -> AssetSource {
        let fetcher = Fetcher::new(&FetcherConfig {
            concurrency: 2,
            use_system_proxy: false,
            ..Default::default()
        })
        .unwrap();
        AssetSource::new(Arc::new(fetcher), root)
    }

    fn mapping(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_get_int_coercion() {
        let values = BindValues::new()
            .with("price", "123456")
            .with("blank", "")
            .with("n", 42)
            .with("bad", "12abc");

        assert_eq!(values.get_int("price").unwrap(), 123456);
        assert_eq!(values.get_int("blank").unwrap(), 0);
        assert_eq!(values.get_int("missing").unwrap(), 0);
        assert_eq!(values.get_int("n").unwrap(), 42);
        assert!(matches!(
            values.get_int("bad"),
            Err(BindError::Coercion { .. })
        ));
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let values: BindValues = [("Price", "10")].into_iter().collect();
        assert_eq!(values.get_string("price"), "10");
        assert_eq!(values.get_string("nope"), "");
    }

    #[test]
    fn test_unknown_tag_is_config_error() {
        let err = parse_plugin_config("sparkle", Mapping::new()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPluginType(t) if t == "sparkle"));
    }

    #[test]
    fn test_entry_requires_type() {
        let err = parse_plugin_entry(mapping("image: foo.png")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("type")));
    }

    #[test]
    fn test_entry_dispatches_on_tag() {
        let p = parse_plugin_entry(mapping("type: qr\ntext: hello\nsize: 0.5")).unwrap();
        assert_eq!(p.kind(), PluginKind::Qr);

        let p = parse_plugin_entry(mapping("type: IMAGE\nimage: foo.png")).unwrap();
        assert_eq!(p.kind(), PluginKind::Image);
    }

    #[test]
    fn test_key_normalization() {
        let m = normalize_keys(mapping("fontUri: a\nfont_size: 3\nhAlign: left"));
        let keys: Vec<_> = m.keys().filter_map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["fonturi", "fontsize", "halign"]);
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Dummy {
        Text,
    }

    impl BindField for Dummy {
        fn parse(name: &str) -> Option<Self> {
            (name == "text").then_some(Dummy::Text)
        }
    }

    #[test]
    fn test_binding_parse_lowercases() {
        let raw = BTreeMap::from([("TEXT".to_string(), "QR_Payload".to_string())]);
        let binding = Binding::<Dummy>::parse(&raw, PluginKind::Qr).unwrap();
        let entries: Vec<_> = binding.iter().collect();
        assert_eq!(entries, vec![(Dummy::Text, "qr_payload")]);
    }

    #[test]
    fn test_binding_rejects_unknown_field() {
        let raw = BTreeMap::from([("colour".to_string(), "c".to_string())]);
        let err = Binding::<Dummy>::parse(&raw, PluginKind::Qr).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBinding { field, .. } if field == "colour"));
    }
}
