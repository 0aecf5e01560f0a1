//! egui overlay: settings panel, photo list, HUD.

use photoscan::settings::{
    COLOR_INTENSITY_RANGE, DEPTH_EFFECT_RANGE, POINT_DENSITY_RANGE, POINT_SIZE_RANGE,
};
use photoscan::{PhotoSet, ScanSettings, Thumbnail};

/// Longest side of a photo preview, in pixels.
pub const THUMBNAIL_SIDE: u32 = 96;
const THUMBNAIL_POINTS: f32 = 72.0;

/// Numbers shown in the corner HUD.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HudStats {
    pub points: usize,
    pub photos: usize,
    /// A scan has been submitted and not yet installed.
    pub scanning: bool,
    /// Wall time of the last finished scan, in milliseconds.
    pub last_scan_ms: Option<u128>,
}

/// What the user asked for during one UI frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiActions {
    /// Slider or color edits; carries the full edited settings.
    pub settings: Option<ScanSettings>,
    pub generate: bool,
    pub remove_photo: Option<usize>,
    pub clear_photos: bool,
}

impl UiActions {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Panel state that persists across frames.
#[derive(Debug, Clone)]
pub struct PanelState {
    pub show_settings: bool,
    /// Values the widgets edit; pushed out via [`UiActions::settings`].
    pub draft: ScanSettings,
}

impl PanelState {
    pub fn new(settings: ScanSettings) -> Self {
        Self {
            show_settings: true,
            draft: settings,
        }
    }
}

/// Preview textures, one slot per photo in the same order as the
/// [`PhotoSet`]. A slot is empty when the photo could not be decoded.
#[derive(Default)]
pub struct ThumbnailStrip {
    slots: Vec<Option<egui::TextureHandle>>,
}

impl ThumbnailStrip {
    pub fn push(&mut self, ctx: &egui::Context, name: &str, thumb: Option<&Thumbnail>) {
        let texture = thumb.map(|t| {
            let image = egui::ColorImage::from_rgb([t.width as usize, t.height as usize], &t.rgb);
            ctx.load_texture(format!("thumb:{name}"), image, egui::TextureOptions::LINEAR)
        });
        self.slots.push(texture);
    }

    /// Mirrors [`PhotoSet::remove`]; dropping the handle frees the texture.
    pub fn remove(&mut self, index: usize) {
        if index < self.slots.len() {
            self.slots.remove(index);
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn get(&self, index: usize) -> Option<&egui::TextureHandle> {
        self.slots.get(index).and_then(Option::as_ref)
    }
}

pub fn draw(
    ctx: &egui::Context,
    state: &mut PanelState,
    photos: &PhotoSet,
    thumbs: &ThumbnailStrip,
    hud: HudStats,
) -> UiActions {
    let mut actions = UiActions::default();

    draw_hud(ctx, hud);

    egui::Area::new(egui::Id::new("settings_toggle"))
        .anchor(egui::Align2::RIGHT_TOP, [-10.0, 10.0])
        .show(ctx, |ui| {
            let label = if state.show_settings {
                "Hide Settings"
            } else {
                "Show Settings"
            };
            if ui.button(label).clicked() {
                state.show_settings = !state.show_settings;
            }
        });

    if state.show_settings {
        egui::SidePanel::right("scan_settings")
            .resizable(false)
            .default_width(260.0)
            .show(ctx, |ui| {
                ui.add_space(32.0);
                if settings_section(ui, &mut state.draft) {
                    actions.settings = Some(state.draft);
                }
                ui.separator();
                photos_section(ui, photos, thumbs, &mut actions);
            });
    }

    actions
}

/// Returns true if any value was edited.
fn settings_section(ui: &mut egui::Ui, draft: &mut ScanSettings) -> bool {
    ui.heading("Point Cloud Settings");
    let mut changed = false;

    let mut slider = |ui: &mut egui::Ui,
                      value: &mut f32,
                      range: std::ops::RangeInclusive<f32>,
                      step: f64,
                      label: &str,
                      help: &str| {
        let r = ui.add(
            egui::Slider::new(value, range)
                .step_by(step)
                .fixed_decimals(2)
                .text(label),
        );
        ui.weak(help);
        ui.add_space(4.0);
        changed |= r.changed();
    };

    slider(
        ui,
        &mut draft.point_size,
        POINT_SIZE_RANGE,
        0.01,
        "Point Size",
        "Size of each point. Bigger points are easier to see.",
    );
    slider(
        ui,
        &mut draft.point_density,
        POINT_DENSITY_RANGE,
        0.01,
        "Point Density",
        "Share of pixels kept. More points means more detail and slower frames.",
    );
    slider(
        ui,
        &mut draft.color_intensity,
        COLOR_INTENSITY_RANGE,
        0.1,
        "Color Intensity",
        "Multiplies point colors. Higher looks more vivid.",
    );
    slider(
        ui,
        &mut draft.depth_effect,
        DEPTH_EFFECT_RANGE,
        0.1,
        "Depth Effect",
        "How far bright pixels stand out from dark ones.",
    );

    ui.horizontal(|ui| {
        let bg = &mut draft.background;
        let mut rgb = [bg.r, bg.g, bg.b];
        if ui.color_edit_button_srgb(&mut rgb).changed() {
            *bg = photoscan::Rgb::new(rgb[0], rgb[1], rgb[2]);
            changed = true;
        }
        ui.label(format!("Background {}", bg));
    });
    ui.weak("Pick a color that contrasts with the cloud.");

    changed
}

fn photos_section(
    ui: &mut egui::Ui,
    photos: &PhotoSet,
    thumbs: &ThumbnailStrip,
    actions: &mut UiActions,
) {
    ui.heading(format!("Photos ({})", photos.len()));
    if photos.is_empty() {
        ui.label("Drop JPEG or PNG files onto the window.");
    }

    let tile = egui::vec2(THUMBNAIL_POINTS, THUMBNAIL_POINTS);
    egui::ScrollArea::vertical()
        .max_height(240.0)
        .show(ui, |ui| {
            ui.horizontal_wrapped(|ui| {
                for (i, photo) in photos.iter().enumerate() {
                    ui.vertical(|ui| {
                        ui.set_width(THUMBNAIL_POINTS);
                        match thumbs.get(i) {
                            Some(tex) => {
                                ui.add(
                                    egui::Image::from_texture(egui::load::SizedTexture::from_handle(
                                        tex,
                                    ))
                                    .max_size(tile),
                                )
                                .on_hover_text(format!(
                                    "{} ({} KiB)",
                                    photo.name(),
                                    photo.bytes().len() / 1024
                                ));
                            }
                            None => {
                                ui.add_sized(tile, egui::Label::new(photo.name()).truncate());
                            }
                        }
                        if ui.small_button("✕ Remove").clicked() {
                            actions.remove_photo = Some(i);
                        }
                    });
                }
            });
        });

    ui.add_space(8.0);
    ui.horizontal(|ui| {
        let enabled = !photos.is_empty();
        if ui
            .add_enabled(enabled, egui::Button::new("Generate Point Cloud"))
            .clicked()
        {
            actions.generate = true;
        }
        if ui.add_enabled(enabled, egui::Button::new("Clear")).clicked() {
            actions.clear_photos = true;
        }
    });
}

fn draw_hud(ctx: &egui::Context, hud: HudStats) {
    egui::Area::new(egui::Id::new("hud"))
        .anchor(egui::Align2::LEFT_TOP, [10.0, 10.0])
        .interactable(false)
        .show(ctx, |ui| {
            ui.label(format!("Points: {}", hud.points));
            ui.label(format!("Photos: {}", hud.photos));
            if hud.scanning {
                ui.label("Generating...");
            } else if let Some(ms) = hud.last_scan_ms {
                ui.label(format!("Last scan: {} ms", ms));
            }
        });
}
