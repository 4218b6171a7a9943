//! Image surfaces and the synchronizer that makes the processed surface
//! render with the original surface's geometry.

use std::{collections::BTreeMap, fmt, sync::Arc};

use tokio::sync::oneshot;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StyleProperty {
    Width,
    Height,
    MaxWidth,
    MaxHeight,
    ObjectFit,
    BorderRadius,
    BoxShadow,
    Position,
    Transform,
    Top,
    Left,
}

impl StyleProperty {
    pub fn css_name(self) -> &'static str {
        match self {
            StyleProperty::Width => "width",
            StyleProperty::Height => "height",
            StyleProperty::MaxWidth => "max-width",
            StyleProperty::MaxHeight => "max-height",
            StyleProperty::ObjectFit => "object-fit",
            StyleProperty::BorderRadius => "border-radius",
            StyleProperty::BoxShadow => "box-shadow",
            StyleProperty::Position => "position",
            StyleProperty::Transform => "transform",
            StyleProperty::Top => "top",
            StyleProperty::Left => "left",
        }
    }
}

impl fmt::Display for StyleProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.css_name())
    }
}

/// Box size, max-size constraints, fit mode, corner rounding, shadow,
/// position, transform and offset.
pub const SYNCED_PROPERTIES: [StyleProperty; 11] = [
    StyleProperty::Width,
    StyleProperty::Height,
    StyleProperty::MaxWidth,
    StyleProperty::MaxHeight,
    StyleProperty::ObjectFit,
    StyleProperty::BorderRadius,
    StyleProperty::BoxShadow,
    StyleProperty::Position,
    StyleProperty::Transform,
    StyleProperty::Top,
    StyleProperty::Left,
];

#[derive(Clone, PartialEq, Eq)]
pub enum SurfaceSource {
    /// Bytes already held by the client (the original upload).
    Inline { bytes: Arc<[u8]>, mime_type: String },
    /// Output hosted by the service.
    Remote(Url),
}

impl fmt::Debug for SurfaceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceSource::Inline { bytes, mime_type } => f
                .debug_struct("Inline")
                .field("len", &bytes.len())
                .field("mime_type", mime_type)
                .finish(),
            SurfaceSource::Remote(url) => f.debug_tuple("Remote").field(&url.as_str()).finish(),
        }
    }
}

/// Resolves once the surface's load event fires, or with the decode/fetch error.
pub type SurfaceLoad = oneshot::Receiver<Result<(), String>>;

/// A rendered image element.
pub trait Surface: Send {
    /// Starts loading `source`, replacing any previous source.
    fn load(&mut self, source: SurfaceSource) -> SurfaceLoad;
    /// Drops the source, caption and overrides, and hides the surface.
    fn clear(&mut self);
    fn source(&self) -> Option<SurfaceSource>;
    fn is_visible(&self) -> bool;
    fn set_visible(&mut self, visible: bool);
    fn caption(&self) -> Option<String>;
    fn set_caption(&mut self, caption: Option<String>);
    /// Effective value after layout, overrides included.
    fn computed_style(&self, property: StyleProperty) -> Option<String>;
    fn style_override(&self, property: StyleProperty) -> Option<String>;
    fn set_style_override(&mut self, property: StyleProperty, value: Option<String>);
}

/// Typed registry of the two surfaces the controller drives.
pub struct Surfaces {
    pub original: Box<dyn Surface>,
    pub processed: Box<dyn Surface>,
}

impl Surfaces {
    pub fn new(original: impl Surface + 'static, processed: impl Surface + 'static) -> Self {
        Self {
            original: Box::new(original),
            processed: Box::new(processed),
        }
    }

    pub fn headless() -> Self {
        Self::new(HeadlessSurface::default(), HeadlessSurface::default())
    }
}

#[derive(Debug, Clone)]
pub struct PresentationSynchronizer {
    properties: &'static [StyleProperty],
}

impl Default for PresentationSynchronizer {
    fn default() -> Self {
        Self {
            properties: &SYNCED_PROPERTIES,
        }
    }
}

impl PresentationSynchronizer {
    pub fn properties(&self) -> &'static [StyleProperty] {
        self.properties
    }

    /// Clears every synced override so stale values cannot compound.
    pub fn reset(&self, target: &mut dyn Surface) {
        for property in self.properties {
            target.set_style_override(*property, None);
        }
    }

    /// Copies the reference's computed values onto `target`. Returns the
    /// number of properties copied; zero when the reference is hidden.
    pub fn synchronize(&self, reference: &dyn Surface, target: &mut dyn Surface) -> usize {
        self.reset(target);
        if !reference.is_visible() {
            return 0;
        }

        let mut copied = 0;
        for property in self.properties {
            if let Some(value) = reference.computed_style(*property) {
                target.set_style_override(*property, Some(value));
                copied += 1;
            }
        }
        tracing::debug!(copied, "synchronized processed surface with original");
        copied
    }
}

/// In-memory surface: loads complete immediately, computed style is a fixed
/// base stylesheet plus overrides.
#[derive(Debug, Clone, Default)]
pub struct HeadlessSurface {
    source: Option<SurfaceSource>,
    visible: bool,
    caption: Option<String>,
    base_style: BTreeMap<StyleProperty, String>,
    overrides: BTreeMap<StyleProperty, String>,
}

impl HeadlessSurface {
    pub fn with_base_style<I, V>(style: I) -> Self
    where
        I: IntoIterator<Item = (StyleProperty, V)>,
        V: Into<String>,
    {
        Self {
            base_style: style.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ..Self::default()
        }
    }
}

impl Surface for HeadlessSurface {
    fn load(&mut self, source: SurfaceSource) -> SurfaceLoad {
        self.source = Some(source);
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Ok(()));
        rx
    }

    fn clear(&mut self) {
        self.source = None;
        self.visible = false;
        self.caption = None;
        self.overrides.clear();
    }

    fn source(&self) -> Option<SurfaceSource> {
        self.source.clone()
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn caption(&self) -> Option<String> {
        self.caption.clone()
    }

    fn set_caption(&mut self, caption: Option<String>) {
        self.caption = caption;
    }

    fn computed_style(&self, property: StyleProperty) -> Option<String> {
        self.overrides
            .get(&property)
            .or_else(|| self.base_style.get(&property))
            .cloned()
    }

    fn style_override(&self, property: StyleProperty) -> Option<String> {
        self.overrides.get(&property).cloned()
    }

    fn set_style_override(&mut self, property: StyleProperty, value: Option<String>) {
        match value {
            Some(value) => {
                self.overrides.insert(property, value);
            }
            None => {
                self.overrides.remove(&property);
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/presentation_tests.rs"]
mod tests;
