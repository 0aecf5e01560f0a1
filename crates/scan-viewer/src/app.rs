use crate::{
    config::Config,
    input::PointerInput,
    renderer::{GpuRendererFactory, OverlayPainter, OverlayTarget},
    session::ViewerSession,
    ui::{self, HudStats, PanelState, ThumbnailStrip, UiActions, THUMBNAIL_SIDE},
};
use anyhow::{Context, Result};
use photoscan::{
    intake::mime_for_extension, PhotoSet, PixelSampler, RasterFormat, ScanError, ScanSettings,
    ScanWorker, SettingsController, SourceImage, Thumbnail,
};
use rayon::prelude::*;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};
use walkdir::WalkDir;
use winit::{
    event::{ElementState, WindowEvent},
    window::Window,
};

/// Expands directories into the raster files inside them (sorted by name);
/// plain file paths are kept as given.
pub fn discover_photos(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for root in paths {
        if !root.is_dir() {
            found.push(root.clone());
            continue;
        }
        let before = found.len();
        found.extend(
            WalkDir::new(root)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| match e {
                    Ok(e) => Some(e),
                    Err(err) => {
                        log::warn!("Skipping unreadable entry under {}: {}", root.display(), err);
                        None
                    }
                })
                .filter(|e| e.file_type().is_file())
                .filter(|e| {
                    e.path()
                        .extension()
                        .and_then(|s| s.to_str())
                        .and_then(RasterFormat::from_extension)
                        .is_some()
                })
                .map(|e| e.into_path()),
        );
        if found.len() == before {
            log::warn!("No JPEG or PNG files found in '{}'", root.display());
        }
    }
    found
}

/// Reads one photo from disk, declaring its MIME type from the extension.
/// Files that are not JPEG/PNG are rejected before their bytes are read.
pub fn read_photo(path: &Path) -> Result<SourceImage> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    let mime = mime_for_extension(ext);

    if RasterFormat::from_mime(mime).is_none() {
        return Err(ScanError::UnsupportedMedia {
            name,
            mime: mime.to_string(),
        }
        .into());
    }

    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(SourceImage::new(name, mime, bytes))
}

/// Decodes previews for `photos` in parallel. A photo that fails to decode
/// gets `None` and is still listed.
pub fn decode_thumbnails(photos: &[Arc<SourceImage>]) -> Vec<Option<Thumbnail>> {
    photos
        .par_iter()
        .map(|photo| match PixelSampler.thumbnail(photo, THUMBNAIL_SIDE) {
            Ok(thumb) => Some(thumb),
            Err(e) => {
                log::warn!("No preview for {}: {}", photo.name(), e);
                None
            }
        })
        .collect()
}

/// egui output for the current frame, painted over the scene.
#[derive(Default)]
pub struct UiPainter {
    renderer: Option<egui_wgpu::Renderer>,
    shapes: Vec<egui::ClippedPrimitive>,
    textures: egui::TexturesDelta,
    pixels_per_point: f32,
}

impl UiPainter {
    /// Stages a tessellated frame. Texture updates accumulate until painted,
    /// so none are lost while the viewer is unmounted.
    pub fn set_frame(
        &mut self,
        shapes: Vec<egui::ClippedPrimitive>,
        textures: egui::TexturesDelta,
        pixels_per_point: f32,
    ) {
        self.shapes = shapes;
        self.textures.append(textures);
        self.pixels_per_point = pixels_per_point;
    }
}

impl OverlayPainter for UiPainter {
    fn paint(&mut self, target: &OverlayTarget<'_>, encoder: &mut wgpu::CommandEncoder) {
        let renderer = self
            .renderer
            .get_or_insert_with(|| egui_wgpu::Renderer::new(target.device, target.format, None, 1));

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: target.size_px,
            pixels_per_point: self.pixels_per_point,
        };

        let textures = std::mem::take(&mut self.textures);
        for (id, delta) in &textures.set {
            renderer.update_texture(target.device, target.queue, *id, delta);
        }

        renderer.update_buffers(
            target.device,
            target.queue,
            encoder,
            &self.shapes,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("EGUI Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            renderer.render(&mut render_pass, &self.shapes, &screen_descriptor);
        }

        for id in &textures.free {
            renderer.free_texture(id);
        }
    }
}

pub struct App {
    window: Arc<Window>,
    pub session: ViewerSession<GpuRendererFactory, Arc<Window>>,
    controller: SettingsController,
    photos: PhotoSet,
    thumbs: ThumbnailStrip,
    worker: ScanWorker,
    pointer: PointerInput,
    panel: PanelState,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    ui_painter: UiPainter,
    hud: HudStats,
}

impl App {
    pub fn new(window: Arc<Window>, config: &Config) -> Result<Self> {
        let settings = config.scan_settings();

        let mut session = ViewerSession::new(GpuRendererFactory::new(), settings.background);
        if !session.mount(window.clone()) {
            log::warn!("Viewer not mounted yet; will retry on the next resize");
        }

        let worker = ScanWorker::spawn().context("starting scan worker")?;

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui_ctx.viewport_id(),
            &*window,
            None,
            None,
        );

        let mut app = Self {
            window,
            session,
            controller: SettingsController::new(settings, config.debounce()),
            photos: PhotoSet::new(),
            thumbs: ThumbnailStrip::default(),
            worker,
            pointer: PointerInput::new(),
            panel: PanelState::new(settings),
            egui_ctx,
            egui_state,
            ui_painter: UiPainter::default(),
            hud: HudStats::default(),
        };

        app.add_photo_paths(&config.photos);
        if config.generate {
            app.generate();
        }
        Ok(app)
    }

    /// Adds photos from files and directories. Returns how many were accepted.
    pub fn add_photo_paths(&mut self, paths: &[PathBuf]) -> usize {
        let images = discover_photos(paths)
            .into_iter()
            .filter_map(|path| match read_photo(&path) {
                Ok(img) => Some(img),
                Err(e) => {
                    log::warn!("Ignoring {}: {:#}", path.display(), e);
                    None
                }
            });
        let before = self.photos.len();
        let accepted = self.photos.extend(images);

        let snapshot = self.photos.snapshot();
        let fresh = &snapshot[before..];
        for (photo, thumb) in fresh.iter().zip(decode_thumbnails(fresh)) {
            self.thumbs.push(&self.egui_ctx, photo.name(), thumb.as_ref());
        }

        if accepted > 0 {
            log::info!("Added {} photo(s); {} total", accepted, self.photos.len());
        }
        self.hud.photos = self.photos.len();
        accepted
    }

    /// Returns true if the event was fully handled here.
    pub fn handle_event(&mut self, event: &WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(&self.window, event);
        if response.consumed {
            // A drag that ends over a panel must still end.
            if let WindowEvent::MouseInput {
                button,
                state: ElementState::Released,
                ..
            } = event
            {
                self.pointer.button(*button, ElementState::Released);
            }
            return true;
        }

        match event {
            WindowEvent::DroppedFile(path) => {
                self.add_photo_paths(std::slice::from_ref(path));
                true
            }
            WindowEvent::Resized(size) => {
                if self.session.is_mounted() {
                    self.session.handle_resize(size.width, size.height);
                } else {
                    self.session.mount(self.window.clone());
                }
                true
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                self.session.refresh_viewport();
                true
            }
            _ => {
                if let Some(input) = self.pointer.handle_event(event) {
                    self.session.orbit(input);
                }
                false
            }
        }
    }

    /// Polls the debounce timer and the scan worker.
    pub fn tick(&mut self, now: Instant) {
        if let Some(settings) = self.controller.poll(now) {
            log::debug!("Settings settled; resampling");
            self.submit(settings);
        }

        if let Some(out) = self.worker.try_latest() {
            log::info!(
                "Scan {} ready: {} points from {} photo(s) in {:?}",
                out.generation,
                out.geometry.len(),
                out.source_count,
                out.elapsed
            );
            self.hud.scanning = false;
            self.hud.last_scan_ms = Some(out.elapsed.as_millis());
            self.session.replace_geometry(out.geometry, out.point_size);
            self.hud.points = self.session.point_count();
        }
    }

    /// Immediate (not debounced) generation with the current settings.
    pub fn generate(&mut self) {
        self.controller.cancel_pending();
        let settings = *self.controller.settings();
        self.submit(settings);
    }

    fn submit(&mut self, settings: ScanSettings) {
        match self.worker.submit(self.photos.snapshot(), settings) {
            Ok(Some(generation)) => {
                log::debug!("Submitted scan {}", generation);
                self.hud.scanning = true;
            }
            Ok(None) => {}
            Err(e) => log::error!("Cannot start scan: {}", e),
        }
    }

    fn apply(&mut self, actions: UiActions, now: Instant) {
        if let Some(settings) = actions.settings {
            let change = self.controller.update(settings, now);
            if let Some(bg) = change.background {
                self.session.set_background(bg);
            }
            // Keep the widgets showing the clamped values.
            self.panel.draft = *self.controller.settings();
        }
        if let Some(index) = actions.remove_photo {
            if let Some(photo) = self.photos.remove(index) {
                self.thumbs.remove(index);
                log::info!("Removed photo {}", photo.name());
            }
        }
        if actions.clear_photos {
            self.photos.clear();
            self.thumbs.clear();
        }
        self.hud.photos = self.photos.len();
        if actions.generate {
            self.generate();
        }
    }

    /// Builds the UI for this frame, applies what it asked for and draws.
    pub fn redraw(&mut self) {
        let raw_input = self.egui_state.take_egui_input(&self.window);
        let mut actions = UiActions::default();
        let output = self.egui_ctx.run(raw_input, |ctx| {
            actions = ui::draw(ctx, &mut self.panel, &self.photos, &self.thumbs, self.hud);
        });
        self.egui_state
            .handle_platform_output(&self.window, output.platform_output);

        let shapes = self
            .egui_ctx
            .tessellate(output.shapes, output.pixels_per_point);
        self.ui_painter
            .set_frame(shapes, output.textures_delta, output.pixels_per_point);

        if !actions.is_empty() {
            self.apply(actions, Instant::now());
        }

        self.session.frame(&mut self.ui_painter);
    }

    pub fn is_looping(&self) -> bool {
        self.session.is_looping()
    }

    /// Stops pending work and releases all GPU resources.
    pub fn shutdown(&mut self) {
        self.controller.cancel_pending();
        self.session.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("scan_viewer_{}_{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn directories_expand_to_sorted_raster_files() {
        let dir = scratch_dir("discover");
        for name in ["b.png", "a.JPG", "notes.txt", "c.jpeg"] {
            fs::write(dir.join(name), b"x").unwrap();
        }
        fs::create_dir(dir.join("nested")).unwrap();
        fs::write(dir.join("nested").join("d.png"), b"x").unwrap();

        let found: Vec<String> = discover_photos(&[dir.clone()])
            .iter()
            .map(|p| p.strip_prefix(&dir).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(found, ["a.JPG", "b.png", "c.jpeg", "nested/d.png"]);

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn explicit_files_are_kept_even_if_not_raster() {
        let paths = [PathBuf::from("/nowhere/clip.mp4")];
        assert_eq!(discover_photos(&paths), paths);
    }

    #[test]
    fn read_photo_declares_mime_from_extension() {
        let dir = scratch_dir("read");
        let path = dir.join("shot.PNG");
        fs::write(&path, [1u8, 2, 3]).unwrap();

        let img = read_photo(&path).unwrap();
        assert_eq!(img.name(), "shot.PNG");
        assert_eq!(img.mime(), "image/png");
        assert_eq!(img.bytes(), &[1, 2, 3]);

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn read_photo_rejects_non_raster_without_reading() {
        let err = read_photo(Path::new("/does/not/exist/clip.mp4")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScanError>(),
            Some(ScanError::UnsupportedMedia { .. })
        ));
    }

    #[test]
    fn undecodable_photos_keep_an_empty_preview_slot() {
        let photos = vec![
            Arc::new(SourceImage::new("a.png", "image/png", vec![0, 1, 2])),
            Arc::new(SourceImage::new("b.jpg", "image/jpeg", Vec::new())),
        ];
        assert_eq!(decode_thumbnails(&photos), vec![None, None]);
    }

    #[test]
    fn missing_raster_file_is_an_io_error() {
        let err = read_photo(Path::new("/does/not/exist/a.jpg")).unwrap_err();
        assert!(err.downcast_ref::<ScanError>().is_none());
    }
}
