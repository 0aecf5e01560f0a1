//! Viewer session: one surface, one renderer, one point cloud.
//!
//! The session owns everything with a GPU-side lifetime and is the only place
//! that creates or releases it. Lifecycle:
//!
//! ```text
//!   Unmounted --mount--> Mounted (looping) --unmount--> Unmounted
//!                           |      ^
//!                           +------+  set_background (rebuild)
//! ```
//!
//! Rendering backends plug in through [`RendererFactory`] and
//! [`SceneRenderer`]; the wgpu implementation lives in [`crate::renderer`].

use crate::camera::{Camera, OrbitConfig, OrbitControls};
use crate::scene::{SceneLights, SceneSetup, Viewport};
use glam::Vec3;
use photoscan::{RenderGeometry, Rgb};
use thiserror::Error;

/// A rectangular drawing region whose size can be queried at any time.
pub trait DisplaySurface {
    /// Current size, or `None` if the surface is gone or zero-sized.
    fn viewport(&self) -> Option<Viewport>;
}

/// A renderer bound to one surface with a fixed background and lights.
pub trait SceneRenderer {
    /// GPU-side handle for one uploaded point cloud.
    type Points;
    /// Extra per-frame drawing (UI) composited over the scene.
    type Overlay: ?Sized;

    fn resize(&mut self, viewport: Viewport);

    fn upload_points(
        &mut self,
        geometry: &RenderGeometry,
        point_size: f32,
    ) -> anyhow::Result<Self::Points>;

    fn release_points(&mut self, points: Self::Points) -> anyhow::Result<()>;

    fn render(
        &mut self,
        camera: &Camera,
        points: Option<&Self::Points>,
        overlay: &mut Self::Overlay,
    ) -> anyhow::Result<()>;

    /// Releases every renderer-wide resource and clears the surface.
    fn dispose(self);
}

/// Builds renderers for surfaces of type `S`.
pub trait RendererFactory<S: DisplaySurface> {
    type Renderer: SceneRenderer;

    fn create(&mut self, surface: &S, setup: &SceneSetup) -> anyhow::Result<Self::Renderer>;
}

/// Why a session operation did nothing.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("display surface unavailable")]
    SurfaceUnavailable,

    #[error("viewer is not mounted")]
    NotMounted,

    #[error("renderer failed: {0:#}")]
    Renderer(#[from] anyhow::Error),
}

/// Pointer-driven camera motion, in pixels / wheel steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrbitInput {
    Rotate { dx: f32, dy: f32 },
    Pan { dx: f32, dy: f32 },
    Zoom { steps: f32 },
}

struct Mounted<R: SceneRenderer> {
    renderer: R,
    camera: Camera,
    controls: OrbitControls,
    viewport: Viewport,
    points: Option<R::Points>,
    frames: u64,
}

/// Installed geometry, kept so a rebuild can restore it.
struct InstalledCloud {
    geometry: RenderGeometry,
    point_size: f32,
}

pub struct ViewerSession<F, S>
where
    F: RendererFactory<S>,
    S: DisplaySurface,
{
    factory: F,
    surface: Option<S>,
    background: Rgb,
    lights: SceneLights,
    orbit: OrbitConfig,
    mounted: Option<Mounted<F::Renderer>>,
    cloud: Option<InstalledCloud>,
}

impl<F, S> ViewerSession<F, S>
where
    F: RendererFactory<S>,
    S: DisplaySurface,
{
    /// An unmounted session. Nothing is allocated until [`mount`](Self::mount).
    pub fn new(factory: F, background: Rgb) -> Self {
        Self {
            factory,
            surface: None,
            background,
            lights: SceneLights::default(),
            orbit: OrbitConfig::default(),
            mounted: None,
            cloud: None,
        }
    }

    /// Binds the session to `surface`: camera, renderer, controls and lights
    /// are created and the render loop starts. Mounting an already mounted
    /// session tears the old one down first.
    ///
    /// Returns false (and stays unmounted) if the surface has no usable size
    /// or the renderer could not be created.
    pub fn mount(&mut self, surface: S) -> bool {
        if self.mounted.is_some() {
            log::debug!("Re-mounting viewer session");
            self.teardown();
        }
        self.surface = Some(surface);

        match self.try_mount() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Viewer mount skipped: {}", e);
                false
            }
        }
    }

    fn try_mount(&mut self) -> Result<(), SessionError> {
        let surface = self.surface.as_ref().ok_or(SessionError::SurfaceUnavailable)?;
        let viewport = surface.viewport().ok_or(SessionError::SurfaceUnavailable)?;

        let setup = SceneSetup {
            viewport,
            background: self.background,
            lights: self.lights,
        };
        let renderer = self.factory.create(surface, &setup)?;

        let camera = Camera::new(viewport.aspect());
        let mut controls = OrbitControls::new(self.orbit.clone());
        controls.reset(camera.target);

        self.mounted = Some(Mounted {
            renderer,
            camera,
            controls,
            viewport,
            points: None,
            frames: 0,
        });

        log::info!(
            "Viewer mounted ({}x{}, background {})",
            viewport.width,
            viewport.height,
            self.background
        );

        // A cloud that outlived its renderer (rebuild or remount) comes back.
        if let Some(cloud) = self.cloud.take() {
            if let Err(e) = self.install(&cloud.geometry, cloud.point_size) {
                log::warn!("Could not restore point cloud after mount: {}", e);
            }
            self.cloud = Some(cloud);
        }
        Ok(())
    }

    /// Swaps in a new point cloud drawn with sprites of `point_size` world
    /// units, and reframes the camera at the default pose.
    ///
    /// If the upload fails the previous cloud stays on screen. If releasing
    /// the previous cloud fails, that failure is logged and the new cloud is
    /// installed anyway. No-op (false) when not mounted.
    pub fn replace_geometry(&mut self, geometry: RenderGeometry, point_size: f32) -> bool {
        match self.install(&geometry, point_size) {
            Ok(()) => {
                self.cloud = Some(InstalledCloud {
                    geometry,
                    point_size,
                });
                true
            }
            Err(e) => {
                log::warn!("Point cloud not replaced: {}", e);
                false
            }
        }
    }

    fn install(&mut self, geometry: &RenderGeometry, point_size: f32) -> Result<(), SessionError> {
        let m = self.mounted.as_mut().ok_or(SessionError::NotMounted)?;

        let fresh = m.renderer.upload_points(geometry, point_size)?;

        if let Some(old) = m.points.take() {
            if let Err(e) = m.renderer.release_points(old) {
                log::error!("Failed to release previous point cloud, continuing: {:#}", e);
            }
        }
        m.points = Some(fresh);

        m.camera.reset();
        m.controls.reset(Vec3::ZERO);

        log::debug!("Installed point cloud: {} points, size {}", geometry.len(), point_size);
        Ok(())
    }

    /// Changes the clear color. The background is fixed per scene, so a
    /// mounted session is rebuilt and the current cloud re-installed.
    /// Returns true if the color changed.
    pub fn set_background(&mut self, color: Rgb) -> bool {
        if color == self.background {
            return false;
        }
        self.background = color;

        if self.mounted.is_some() {
            log::info!("Background changed to {}; rebuilding viewer", color);
            self.teardown();

            // The installed cloud is kept either way; a later mount restores
            // it if this one fails.
            if let Err(e) = self.try_mount() {
                log::warn!("Viewer rebuild failed: {}", e);
            }
        }
        true
    }

    /// Follows a surface size change. Zero sizes and repeated sizes are
    /// ignored. Returns true if anything changed.
    pub fn handle_resize(&mut self, width: u32, height: u32) -> bool {
        let (Some(viewport), Some(m)) = (Viewport::new(width, height), self.mounted.as_mut())
        else {
            return false;
        };
        if viewport == m.viewport {
            return false;
        }

        m.camera.set_aspect(viewport.aspect());
        m.renderer.resize(viewport);
        m.viewport = viewport;
        true
    }

    /// Re-reads the surface size (e.g. after the surface was lost).
    pub fn refresh_viewport(&mut self) -> bool {
        match self.surface.as_ref().and_then(DisplaySurface::viewport) {
            Some(v) => self.handle_resize(v.width, v.height),
            None => false,
        }
    }

    /// Feeds pointer motion into the orbit controls.
    pub fn orbit(&mut self, input: OrbitInput) {
        let Some(m) = self.mounted.as_mut() else {
            return;
        };
        let h = m.viewport.height as f32;
        match input {
            OrbitInput::Rotate { dx, dy } => m.controls.rotate_pixels(dx, dy, h),
            OrbitInput::Pan { dx, dy } => m.controls.pan_pixels(dx, dy, &m.camera, h),
            OrbitInput::Zoom { steps } => m.controls.zoom(steps),
        }
    }

    /// One tick of the render loop: advance control damping, draw. Render
    /// errors are logged and never stop the loop. Returns false when the
    /// loop is not running.
    pub fn frame(&mut self, overlay: &mut <F::Renderer as SceneRenderer>::Overlay) -> bool {
        let Some(m) = self.mounted.as_mut() else {
            return false;
        };

        m.controls.update(&mut m.camera);
        if let Err(e) = m.renderer.render(&m.camera, m.points.as_ref(), overlay) {
            log::warn!("Frame {} failed: {:#}", m.frames, e);
        }
        m.frames += 1;
        true
    }

    /// Stops the loop and releases controls, point cloud, renderer and
    /// surface. Safe to call any number of times, before or after `mount`.
    pub fn unmount(&mut self) {
        if self.mounted.is_some() {
            log::info!("Viewer unmounted");
        }
        self.teardown();
        self.surface = None;
        self.cloud = None;
    }

    fn teardown(&mut self) {
        let Some(m) = self.mounted.take() else {
            return;
        };
        let Mounted {
            mut renderer,
            controls,
            points,
            ..
        } = m;

        controls.dispose();
        if let Some(points) = points {
            if let Err(e) = renderer.release_points(points) {
                log::error!("Failed to release point cloud on teardown: {:#}", e);
            }
        }
        renderer.dispose();
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    /// The loop runs exactly while mounted.
    pub fn is_looping(&self) -> bool {
        self.is_mounted()
    }

    pub fn has_drawable(&self) -> bool {
        self.mounted.as_ref().is_some_and(|m| m.points.is_some())
    }

    pub fn background(&self) -> Rgb {
        self.background
    }

    pub fn camera(&self) -> Option<&Camera> {
        self.mounted.as_ref().map(|m| &m.camera)
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.mounted.as_ref().map(|m| m.viewport)
    }

    pub fn frame_count(&self) -> u64 {
        self.mounted.as_ref().map_or(0, |m| m.frames)
    }

    /// Points in the cloud currently on screen (0 if none).
    pub fn point_count(&self) -> usize {
        if !self.has_drawable() {
            return 0;
        }
        self.cloud.as_ref().map_or(0, |c| c.geometry.len())
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }
}

impl<F, S> Drop for ViewerSession<F, S>
where
    F: RendererFactory<S>,
    S: DisplaySurface,
{
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Create { background: Rgb, viewport: Viewport },
        Resize(Viewport),
        Upload { id: u32, points: usize },
        Release(u32),
        Render(Option<u32>),
        Dispose,
    }

    #[derive(Default)]
    struct Log {
        calls: RefCell<Vec<Call>>,
        fail_upload: Cell<bool>,
        fail_release: Cell<bool>,
        fail_create: Cell<bool>,
        next_id: Cell<u32>,
    }

    impl Log {
        fn push(&self, c: Call) {
            self.calls.borrow_mut().push(c);
        }

        fn take(&self) -> Vec<Call> {
            self.calls.take()
        }

        fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
            self.calls.borrow().iter().filter(|c| pred(c)).count()
        }
    }

    struct FakeSurface(Cell<(u32, u32)>);

    impl DisplaySurface for Rc<FakeSurface> {
        fn viewport(&self) -> Option<Viewport> {
            let (w, h) = self.0.get();
            Viewport::new(w, h)
        }
    }

    struct FakeFactory(Rc<Log>);

    struct FakeRenderer(Rc<Log>);

    impl SceneRenderer for FakeRenderer {
        type Points = u32;
        type Overlay = ();

        fn resize(&mut self, viewport: Viewport) {
            self.0.push(Call::Resize(viewport));
        }

        fn upload_points(&mut self, g: &RenderGeometry, _size: f32) -> anyhow::Result<u32> {
            if self.0.fail_upload.get() {
                bail!("out of GPU memory");
            }
            let id = self.0.next_id.get();
            self.0.next_id.set(id + 1);
            self.0.push(Call::Upload { id, points: g.len() });
            Ok(id)
        }

        fn release_points(&mut self, id: u32) -> anyhow::Result<()> {
            self.0.push(Call::Release(id));
            if self.0.fail_release.get() {
                bail!("device lost");
            }
            Ok(())
        }

        fn render(&mut self, _: &Camera, points: Option<&u32>, _: &mut ()) -> anyhow::Result<()> {
            self.0.push(Call::Render(points.copied()));
            Ok(())
        }

        fn dispose(self) {
            self.0.push(Call::Dispose);
        }
    }

    impl RendererFactory<Rc<FakeSurface>> for FakeFactory {
        type Renderer = FakeRenderer;

        fn create(&mut self, _: &Rc<FakeSurface>, setup: &SceneSetup) -> anyhow::Result<FakeRenderer> {
            if self.0.fail_create.get() {
                bail!("no adapter");
            }
            self.0.push(Call::Create {
                background: setup.background,
                viewport: setup.viewport,
            });
            Ok(FakeRenderer(self.0.clone()))
        }
    }

    type Session = ViewerSession<FakeFactory, Rc<FakeSurface>>;

    fn session() -> (Session, Rc<Log>, Rc<FakeSurface>) {
        let log = Rc::new(Log::default());
        let surface = Rc::new(FakeSurface(Cell::new((800, 600))));
        (
            ViewerSession::new(FakeFactory(log.clone()), Rgb::WHITE),
            log,
            surface,
        )
    }

    fn cloud(points: usize) -> RenderGeometry {
        RenderGeometry::from_parts(vec![0.0; points * 3], vec![1.0; points * 3]).unwrap()
    }

    #[test]
    fn mount_creates_renderer_and_starts_loop() {
        let (mut s, log, surface) = session();
        assert!(!s.frame(&mut ()));

        assert!(s.mount(surface));
        assert!(s.is_looping());
        assert!(s.frame(&mut ()));
        assert!(s.frame(&mut ()));

        let cam = s.camera().unwrap();
        assert!((cam.aspect - 800.0 / 600.0).abs() < 1e-6);
        assert!(cam.position.distance(Vec3::new(0.0, 0.0, 5.0)) < 1e-4);
        assert_eq!(s.frame_count(), 2);
        assert_eq!(
            log.take(),
            vec![
                Call::Create {
                    background: Rgb::WHITE,
                    viewport: Viewport::new(800, 600).unwrap()
                },
                Call::Render(None),
                Call::Render(None),
            ]
        );
    }

    #[test]
    fn zero_sized_surface_is_a_guarded_no_op() {
        let (mut s, log, surface) = session();
        surface.0.set((0, 0));

        assert!(!s.mount(surface));
        assert!(!s.is_mounted());
        assert!(!s.replace_geometry(cloud(3), 0.02));
        assert!(!s.handle_resize(640, 480));
        assert!(log.take().is_empty());
    }

    #[test]
    fn failed_renderer_creation_leaves_session_unmounted() {
        let (mut s, log, surface) = session();
        log.fail_create.set(true);

        assert!(!s.mount(surface));
        assert!(!s.is_looping());
        s.unmount();
        s.unmount();
        assert!(log.take().is_empty());
    }

    #[test]
    fn unmount_is_idempotent_and_safe_before_mount() {
        let (mut s, log, surface) = session();
        s.unmount();

        s.mount(surface);
        s.replace_geometry(cloud(2), 0.02);
        log.take();

        s.unmount();
        s.unmount();
        assert!(!s.is_mounted());
        assert!(!s.frame(&mut ()));
        assert_eq!(log.take(), vec![Call::Release(0), Call::Dispose]);
    }

    #[test]
    fn replace_releases_previous_cloud_and_reframes_camera() {
        let (mut s, log, surface) = session();
        s.mount(surface);
        log.take();
        assert!(s.replace_geometry(cloud(4), 0.02));

        s.orbit(OrbitInput::Rotate { dx: 120.0, dy: 40.0 });
        s.orbit(OrbitInput::Zoom { steps: 5.0 });
        for _ in 0..10 {
            s.frame(&mut ());
        }
        assert_ne!(s.camera().unwrap().position, Vec3::new(0.0, 0.0, 5.0));

        assert!(s.replace_geometry(cloud(9), 0.05));
        assert_eq!(s.camera().unwrap().position, Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(s.camera().unwrap().target, Vec3::ZERO);
        assert_eq!(s.point_count(), 9);

        let calls: Vec<Call> = log
            .take()
            .into_iter()
            .filter(|c| !matches!(c, Call::Render(_)))
            .collect();
        assert_eq!(
            calls,
            vec![
                Call::Upload { id: 0, points: 4 },
                Call::Upload { id: 1, points: 9 },
                Call::Release(0),
            ]
        );

        s.frame(&mut ());
        assert_eq!(log.take(), vec![Call::Render(Some(1))]);
    }

    #[test]
    fn failed_upload_keeps_previous_cloud() {
        let (mut s, log, surface) = session();
        s.mount(surface);
        s.replace_geometry(cloud(4), 0.02);

        log.fail_upload.set(true);
        assert!(!s.replace_geometry(cloud(7), 0.02));
        assert!(s.has_drawable());
        assert_eq!(s.point_count(), 4);

        log.take();
        s.frame(&mut ());
        assert_eq!(log.take(), vec![Call::Render(Some(0))]);
    }

    #[test]
    fn failed_release_is_logged_and_new_cloud_installed() {
        let (mut s, log, surface) = session();
        s.mount(surface);
        s.replace_geometry(cloud(1), 0.02);

        log.fail_release.set(true);
        assert!(s.replace_geometry(cloud(2), 0.02));
        assert!(s.is_looping());

        log.take();
        s.frame(&mut ());
        assert_eq!(log.take(), vec![Call::Render(Some(1))]);
    }

    #[test]
    fn empty_geometry_is_still_a_valid_cloud() {
        let (mut s, _log, surface) = session();
        s.mount(surface);
        assert!(s.replace_geometry(RenderGeometry::empty(), 0.02));
        assert!(s.has_drawable());
        assert_eq!(s.point_count(), 0);
    }

    #[test]
    fn resize_with_same_size_twice_changes_nothing_more() {
        let (mut s, log, surface) = session();
        s.mount(surface);
        log.take();

        assert!(s.handle_resize(1024, 512));
        let after_first = (s.camera().cloned(), s.viewport());
        assert!(!s.handle_resize(1024, 512));

        assert_eq!((s.camera().cloned(), s.viewport()), after_first);
        assert_eq!(log.count(|c| matches!(c, Call::Resize(_))), 1);
        assert!((s.camera().unwrap().aspect - 2.0).abs() < 1e-6);
    }

    #[test]
    fn resize_to_zero_is_ignored() {
        let (mut s, log, surface) = session();
        s.mount(surface);
        log.take();
        assert!(!s.handle_resize(0, 300));
        assert!(log.take().is_empty());
    }

    #[test]
    fn refresh_viewport_reads_surface_size() {
        let (mut s, _log, surface) = session();
        s.mount(surface.clone());
        surface.0.set((300, 300));
        assert!(s.refresh_viewport());
        assert_eq!(s.viewport(), Viewport::new(300, 300));
    }

    #[test]
    fn background_change_rebuilds_and_restores_cloud() {
        let (mut s, log, surface) = session();
        s.mount(surface);
        s.replace_geometry(cloud(5), 0.03);
        log.take();

        assert!(s.set_background(Rgb::BLACK));
        assert!(s.is_looping());
        assert!(s.has_drawable());
        assert_eq!(s.background(), Rgb::BLACK);
        assert_eq!(
            log.take(),
            vec![
                Call::Release(0),
                Call::Dispose,
                Call::Create {
                    background: Rgb::BLACK,
                    viewport: Viewport::new(800, 600).unwrap()
                },
                Call::Upload { id: 1, points: 5 },
            ]
        );
    }

    #[test]
    fn same_background_does_not_rebuild() {
        let (mut s, log, surface) = session();
        s.mount(surface);
        log.take();
        assert!(!s.set_background(Rgb::WHITE));
        assert!(log.take().is_empty());
    }

    #[test]
    fn background_before_mount_is_used_at_mount() {
        let (mut s, log, surface) = session();
        assert!(s.set_background(Rgb::new(1, 2, 3)));
        s.mount(surface);
        assert_eq!(
            log.take(),
            vec![Call::Create {
                background: Rgb::new(1, 2, 3),
                viewport: Viewport::new(800, 600).unwrap()
            }]
        );
    }

    #[test]
    fn remount_tears_down_previous_renderer_first() {
        let (mut s, log, surface) = session();
        s.mount(surface.clone());
        s.replace_geometry(cloud(1), 0.02);
        log.take();

        s.mount(surface);
        let calls = log.take();
        assert_eq!(calls[..2], [Call::Release(0), Call::Dispose]);
        assert!(matches!(calls[2], Call::Create { .. }));
        assert_eq!(calls[3], Call::Upload { id: 1, points: 1 });
        assert!(s.has_drawable());
        assert_eq!(s.point_count(), 1);
    }

    #[test]
    fn failed_rebuild_restores_cloud_on_next_mount() {
        let (mut s, log, surface) = session();
        s.mount(surface.clone());
        assert!(s.replace_geometry(cloud(3), 0.02));

        surface.0.set((0, 0));
        assert!(s.set_background(Rgb::BLACK));
        assert!(!s.is_mounted());
        assert!(!s.has_drawable());
        assert_eq!(s.point_count(), 0);
        log.take();

        surface.0.set((800, 600));
        assert!(s.mount(surface));
        assert!(s.has_drawable());
        assert_eq!(s.point_count(), 3);
        assert!(log
            .take()
            .iter()
            .any(|c| matches!(c, Call::Upload { points: 3, .. })));
    }

    #[test]
    fn unmount_forgets_the_cloud() {
        let (mut s, log, surface) = session();
        s.mount(surface.clone());
        s.replace_geometry(cloud(2), 0.02);
        s.unmount();
        log.take();

        assert!(s.mount(surface));
        assert!(!s.has_drawable());
        assert!(!log.take().iter().any(|c| matches!(c, Call::Upload { .. })));
    }

    #[test]
    fn dropping_a_mounted_session_releases_everything() {
        let (mut s, log, surface) = session();
        s.mount(surface);
        s.replace_geometry(cloud(3), 0.02);
        log.take();

        drop(s);
        assert_eq!(log.take(), vec![Call::Release(0), Call::Dispose]);
    }
}
