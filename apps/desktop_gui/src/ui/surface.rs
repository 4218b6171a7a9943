//! egui-backed image surfaces.
//!
//! A surface's state lives in a [`SharedFrame`] read by two sides: the
//! backend worker drives it through [`EguiSurface`] (the controller's
//! `Surface` implementation) and the UI thread paints it through
//! [`SurfaceView`], recording the laid-out box as the computed style.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use client_core::{StyleProperty, Surface, SurfaceLoad, SurfaceSource, VisionClient};
use eframe::egui;
use tokio::{runtime::Handle, sync::oneshot};

pub const MAX_DISPLAY_WIDTH: f32 = 480.0;
pub const MAX_DISPLAY_HEIGHT: f32 = 400.0;
const CORNER_RADIUS: u8 = 10;

#[derive(Default)]
pub struct SurfaceFrame {
    source: Option<SurfaceSource>,
    /// Bumped on every load and clear; stale decodes compare against it.
    load_id: u64,
    pixels: Option<Arc<egui::ColorImage>>,
    visible: bool,
    caption: Option<String>,
    overrides: BTreeMap<StyleProperty, String>,
    layout: BTreeMap<StyleProperty, String>,
}

pub type SharedFrame = Arc<Mutex<SurfaceFrame>>;

pub fn shared_frame() -> SharedFrame {
    Arc::new(Mutex::new(SurfaceFrame::default()))
}

fn lock(frame: &SharedFrame) -> MutexGuard<'_, SurfaceFrame> {
    frame.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn decode_color_image(bytes: &[u8]) -> Result<egui::ColorImage, String> {
    let decoded = image::load_from_memory(bytes).map_err(|err| format!("decode failed: {err}"))?;
    let rgba = decoded.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    Ok(egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw()))
}

/// Parses a `"123.5px"` style value.
pub fn parse_px(value: &str) -> Option<f32> {
    value.trim().strip_suffix("px")?.trim().parse().ok()
}

/// Largest size with the image's aspect ratio inside the display bounds.
pub fn contain_size(image: [usize; 2], max: egui::Vec2) -> egui::Vec2 {
    let [w, h] = image;
    if w == 0 || h == 0 {
        return egui::Vec2::ZERO;
    }
    let size = egui::vec2(w as f32, h as f32);
    let scale = (max.x / size.x).min(max.y / size.y).min(1.0);
    size * scale
}

/// Backend-side handle: loads sources and applies controller mutations.
pub struct EguiSurface {
    frame: SharedFrame,
    client: VisionClient,
    runtime: Handle,
}

impl EguiSurface {
    pub fn new(frame: SharedFrame, client: VisionClient, runtime: Handle) -> Self {
        Self {
            frame,
            client,
            runtime,
        }
    }
}

impl Surface for EguiSurface {
    fn load(&mut self, source: SurfaceSource) -> SurfaceLoad {
        let (tx, rx) = oneshot::channel();
        let load_id = {
            let mut frame = lock(&self.frame);
            frame.load_id += 1;
            frame.source = Some(source.clone());
            frame.pixels = None;
            frame.load_id
        };

        let shared = Arc::clone(&self.frame);
        let client = self.client.clone();
        self.runtime.spawn(async move {
            let bytes = match source {
                SurfaceSource::Inline { bytes, .. } => Ok(bytes.to_vec()),
                SurfaceSource::Remote(url) => client.fetch(&url).await.map_err(|err| err.to_string()),
            };
            let decoded = match bytes {
                Ok(bytes) => tokio::task::spawn_blocking(move || decode_color_image(&bytes))
                    .await
                    .unwrap_or_else(|err| Err(format!("decode task failed: {err}"))),
                Err(reason) => Err(reason),
            };
            let result = match decoded {
                Ok(pixels) => {
                    let mut frame = lock(&shared);
                    if frame.load_id == load_id {
                        frame.pixels = Some(Arc::new(pixels));
                        Ok(())
                    } else {
                        tracing::debug!(load_id, "dropping superseded surface decode");
                        Err("superseded by a newer load".to_string())
                    }
                }
                Err(reason) => Err(reason),
            };
            let _ = tx.send(result);
        });
        rx
    }

    fn clear(&mut self) {
        let mut frame = lock(&self.frame);
        frame.load_id += 1;
        frame.source = None;
        frame.pixels = None;
        frame.visible = false;
        frame.caption = None;
        frame.overrides.clear();
    }

    fn source(&self) -> Option<SurfaceSource> {
        lock(&self.frame).source.clone()
    }

    fn is_visible(&self) -> bool {
        lock(&self.frame).visible
    }

    fn set_visible(&mut self, visible: bool) {
        lock(&self.frame).visible = visible;
    }

    fn caption(&self) -> Option<String> {
        lock(&self.frame).caption.clone()
    }

    fn set_caption(&mut self, caption: Option<String>) {
        lock(&self.frame).caption = caption;
    }

    fn computed_style(&self, property: StyleProperty) -> Option<String> {
        let frame = lock(&self.frame);
        frame
            .overrides
            .get(&property)
            .or_else(|| frame.layout.get(&property))
            .cloned()
    }

    fn style_override(&self, property: StyleProperty) -> Option<String> {
        lock(&self.frame).overrides.get(&property).cloned()
    }

    fn set_style_override(&mut self, property: StyleProperty, value: Option<String>) {
        let mut frame = lock(&self.frame);
        match value {
            Some(value) => {
                frame.overrides.insert(property, value);
            }
            None => {
                frame.overrides.remove(&property);
            }
        }
    }
}

/// UI-side handle: owns the texture and paints the frame.
pub struct SurfaceView {
    frame: SharedFrame,
    name: &'static str,
    texture: Option<(Arc<egui::ColorImage>, egui::TextureHandle)>,
}

impl SurfaceView {
    pub fn new(name: &'static str, frame: SharedFrame) -> Self {
        Self {
            frame,
            name,
            texture: None,
        }
    }

    /// Paints the surface if visible and records its laid-out box.
    pub fn show(&mut self, ui: &mut egui::Ui) {
        let (pixels, visible, caption, overrides) = {
            let frame = lock(&self.frame);
            (
                frame.pixels.clone(),
                frame.visible,
                frame.caption.clone(),
                frame.overrides.clone(),
            )
        };
        let Some(pixels) = pixels.filter(|_| visible) else {
            self.texture = None;
            return;
        };

        let stale = self
            .texture
            .as_ref()
            .map_or(true, |(uploaded, _)| !Arc::ptr_eq(uploaded, &pixels));
        if stale {
            let texture = ui.ctx().load_texture(
                format!("surface:{}", self.name),
                (*pixels).clone(),
                egui::TextureOptions::LINEAR,
            );
            self.texture = Some((Arc::clone(&pixels), texture));
        }
        let Some((_, texture)) = &self.texture else {
            return;
        };

        let natural = contain_size(pixels.size, egui::vec2(MAX_DISPLAY_WIDTH, MAX_DISPLAY_HEIGHT));
        let size = egui::vec2(
            overrides
                .get(&StyleProperty::Width)
                .and_then(|v| parse_px(v))
                .unwrap_or(natural.x),
            overrides
                .get(&StyleProperty::Height)
                .and_then(|v| parse_px(v))
                .unwrap_or(natural.y),
        );

        ui.vertical_centered(|ui| {
            ui.add(
                egui::Image::new(texture)
                    .fit_to_exact_size(size)
                    .corner_radius(egui::CornerRadius::same(CORNER_RADIUS)),
            );
            if let Some(caption) = caption {
                ui.label(egui::RichText::new(caption).small().weak());
            }
        });

        let layout = laid_out_style(size);
        lock(&self.frame).layout = layout;
    }
}

/// Computed style of a surface painted at `size`.
pub fn laid_out_style(size: egui::Vec2) -> BTreeMap<StyleProperty, String> {
    BTreeMap::from([
        (StyleProperty::Width, format!("{:.1}px", size.x)),
        (StyleProperty::Height, format!("{:.1}px", size.y)),
        (StyleProperty::MaxWidth, format!("{MAX_DISPLAY_WIDTH:.0}px")),
        (StyleProperty::MaxHeight, format!("{MAX_DISPLAY_HEIGHT:.0}px")),
        (StyleProperty::ObjectFit, "contain".to_string()),
        (StyleProperty::BorderRadius, format!("{CORNER_RADIUS}px")),
        (StyleProperty::BoxShadow, "none".to_string()),
        (StyleProperty::Position, "relative".to_string()),
        (StyleProperty::Transform, "none".to_string()),
        (StyleProperty::Top, "0px".to_string()),
        (StyleProperty::Left, "0px".to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_core::{PresentationSynchronizer, SYNCED_PROPERTIES};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        image::RgbaImage::new(width, height)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("encode png");
        bytes
    }

    fn surface(runtime: &tokio::runtime::Runtime) -> (EguiSurface, SharedFrame) {
        let frame = shared_frame();
        let client = VisionClient::new(url::Url::parse("http://127.0.0.1:9").expect("url"));
        (
            EguiSurface::new(Arc::clone(&frame), client, runtime.handle().clone()),
            frame,
        )
    }

    #[test]
    fn px_values_parse() {
        assert_eq!(parse_px("480px"), Some(480.0));
        assert_eq!(parse_px(" 212.5px "), Some(212.5));
        assert_eq!(parse_px("100%"), None);
        assert_eq!(parse_px("auto"), None);
    }

    #[test]
    fn contain_size_scales_down_only() {
        let max = egui::vec2(MAX_DISPLAY_WIDTH, MAX_DISPLAY_HEIGHT);
        assert_eq!(contain_size([960, 400], max), egui::vec2(480.0, 200.0));
        assert_eq!(contain_size([300, 800], max), egui::vec2(150.0, 400.0));
        assert_eq!(contain_size([64, 32], max), egui::vec2(64.0, 32.0));
        assert_eq!(contain_size([0, 10], max), egui::Vec2::ZERO);
    }

    #[test]
    fn inline_load_decodes_pixels() {
        let runtime = tokio::runtime::Runtime::new().expect("runtime");
        let (mut surface, frame) = surface(&runtime);

        let load = surface.load(SurfaceSource::Inline {
            bytes: png_bytes(6, 4).into(),
            mime_type: "image/png".into(),
        });
        let result = runtime.block_on(load).expect("load signal");

        assert_eq!(result, Ok(()));
        let pixels = lock(&frame).pixels.clone().expect("pixels");
        assert_eq!(pixels.size, [6, 4]);
    }

    #[test]
    fn undecodable_bytes_fail_the_load() {
        let runtime = tokio::runtime::Runtime::new().expect("runtime");
        let (mut surface, frame) = surface(&runtime);

        let load = surface.load(SurfaceSource::Inline {
            bytes: vec![0u8; 16].into(),
            mime_type: "image/png".into(),
        });
        let result = runtime.block_on(load).expect("load signal");

        assert!(result.is_err());
        assert!(lock(&frame).pixels.is_none());
    }

    #[test]
    fn synchronizer_copies_recorded_layout() {
        let runtime = tokio::runtime::Runtime::new().expect("runtime");
        let (mut original, original_frame) = surface(&runtime);
        let (mut processed, _) = surface(&runtime);
        original.set_visible(true);
        lock(&original_frame).layout = laid_out_style(egui::vec2(480.0, 320.0));
        processed.set_style_override(StyleProperty::Transform, Some("scale(3)".into()));

        let copied = PresentationSynchronizer::default().synchronize(&original, &mut processed);

        assert_eq!(copied, SYNCED_PROPERTIES.len());
        assert_eq!(
            processed.style_override(StyleProperty::Width).as_deref(),
            Some("480.0px")
        );
        assert_eq!(
            processed.style_override(StyleProperty::Transform).as_deref(),
            Some("none")
        );
    }

    #[test]
    fn clear_drops_everything_but_layout() {
        let runtime = tokio::runtime::Runtime::new().expect("runtime");
        let (mut surface, frame) = surface(&runtime);
        surface.set_visible(true);
        surface.set_caption(Some("Filter: blur".into()));
        surface.set_style_override(StyleProperty::Height, Some("10px".into()));

        surface.clear();

        assert!(!surface.is_visible());
        assert_eq!(surface.caption(), None);
        assert_eq!(surface.style_override(StyleProperty::Height), None);
        assert_eq!(lock(&frame).load_id, 1);
    }
}
