use std::{
    path::PathBuf,
    sync::{
        atomic::AtomicBool,
        mpsc::Sender,
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use crate::{
    data_loaders::settings::Settings,
    desktop::DesktopIntegration,
    errors::EngineError,
    info,
    remote_fetch::{fetch_daily_image, HttpDownloader},
    snapshot::{default_asset_path, SnapshotStore},
    sources::{
        images_in_folder, source_from_settings, validate_image, AssetDescriptor, ContentSource,
        DailyProvider,
    },
    surface::RenderSurface,
    utility::today_stamp,
    warn,
    web::{self, BingCatalog, ChromecastCatalog, ImageCatalog},
};

/* =========================
   NETWORK JOBS
   ========================= */

/// Work handed to a background worker. Every job carries the generation
/// it was dispatched under; outcomes from an older generation are
/// discarded on arrival.
#[derive(Debug)]
pub enum NetJob {
    DailyImage {
        generation: u64,
        provider: DailyProvider,
        dest: PathBuf,
    },
    PageProbe {
        generation: u64,
        url: String,
    },
}

#[derive(Debug)]
pub enum NetOutcome {
    DailyImage {
        generation: u64,
        provider: DailyProvider,
        result: Result<PathBuf, EngineError>,
    },
    PageProbe {
        generation: u64,
        url: String,
        reachable: bool,
    },
}

impl NetOutcome {
    fn generation(&self) -> u64 {
        match self {
            NetOutcome::DailyImage { generation, .. } => *generation,
            NetOutcome::PageProbe { generation, .. } => *generation,
        }
    }
}

pub trait NetworkRunner {
    fn submit(&mut self, job: NetJob);

    /// Asks in-flight jobs to stop early. Their late outcomes are still
    /// discarded by generation either way.
    fn cancel_inflight(&mut self) {}
}

/// Production runner: one worker thread per job, outcomes delivered over
/// the channel the main loop drains.
pub struct ThreadedRunner {
    outcome_tx: Sender<NetOutcome>,
    cancel: Arc<AtomicBool>,
}

impl ThreadedRunner {
    pub fn new(outcome_tx: Sender<NetOutcome>) -> Self {
        Self {
            outcome_tx,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl NetworkRunner for ThreadedRunner {
    fn submit(&mut self, job: NetJob) {
        let tx = self.outcome_tx.clone();
        match job {
            NetJob::DailyImage {
                generation,
                provider,
                dest,
            } => {
                let cancel = self.cancel.clone();
                thread::spawn(move || {
                    let catalog: Box<dyn ImageCatalog> = match provider {
                        DailyProvider::Bing => Box::new(BingCatalog),
                        DailyProvider::Chromecast => Box::new(ChromecastCatalog),
                    };
                    let result = fetch_daily_image(catalog.as_ref(), &HttpDownloader, &dest, &cancel);
                    let _ = tx.send(NetOutcome::DailyImage {
                        generation,
                        provider,
                        result,
                    });
                });
            }
            NetJob::PageProbe { generation, url } => {
                thread::spawn(move || {
                    let reachable = web::ping(&url);
                    let _ = tx.send(NetOutcome::PageProbe {
                        generation,
                        url,
                        reachable,
                    });
                });
            }
        }
    }

    fn cancel_inflight(&mut self) {
        self.cancel.store(true, std::sync::atomic::Ordering::Relaxed);
        self.cancel = Arc::new(AtomicBool::new(false));
    }
}

/* =========================
   SCHEDULER
   ========================= */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    FixedImage,
    ImageCarousel,
    LocalVideo,
    StreamedVideo,
    RenderedPage,
    RemoteDailyImage,
    Fallback,
}

/// Owns what is on screen and when it changes. Single-threaded by
/// construction: network results and async surface errors are fed in by
/// the main loop, never by the workers themselves.
pub struct ContentScheduler {
    state: SchedulerState,
    generation: u64,
    carousel_members: Vec<PathBuf>,
    carousel_index: usize,
    carousel_period: Duration,
    carousel_deadline: Option<Instant>,
    snapshot: SnapshotStore,
    settings_path: PathBuf,
    pending_notice: Option<&'static str>,
    config_notice_shown: bool,
}

impl ContentScheduler {
    pub fn new(snapshot: SnapshotStore, settings_path: PathBuf) -> Self {
        Self {
            state: SchedulerState::Idle,
            generation: 0,
            carousel_members: Vec::new(),
            carousel_index: 0,
            carousel_period: Duration::from_secs(30),
            carousel_deadline: None,
            snapshot,
            settings_path,
            pending_notice: None,
            config_notice_shown: false,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// The notice to show the user, at most once per occurrence.
    pub fn take_notice(&mut self) -> Option<&'static str> {
        self.pending_notice.take()
    }

    /// Settings were unreadable and defaults are in use. Shown once per
    /// process, not once per reload poll.
    pub fn notify_config_error(&mut self, err: &EngineError) {
        if !self.config_notice_shown {
            self.config_notice_shown = true;
            self.pending_notice = Some(err.user_notice());
        }
        warn!("{err}");
    }

    /// Applies a settings snapshot: bumps the generation, cancels pending
    /// work and transitions to whatever the snapshot selects.
    pub fn load_or_reload(
        &mut self,
        settings: &Settings,
        surface: &mut dyn RenderSurface,
        runner: &mut dyn NetworkRunner,
    ) {
        self.generation += 1;
        self.carousel_deadline = None;
        self.carousel_members.clear();
        self.carousel_index = 0;
        runner.cancel_inflight();

        self.apply_source(source_from_settings(settings), surface, runner);
    }

    fn apply_source(
        &mut self,
        source: ContentSource,
        surface: &mut dyn RenderSurface,
        runner: &mut dyn NetworkRunner,
    ) {
        match source {
            ContentSource::FixedImage { path } => {
                if let Err(e) = validate_image(&path) {
                    self.fail(e, surface);
                    return;
                }
                self.present_or_fail(&AssetDescriptor::Image(path), SchedulerState::FixedImage, surface);
            }
            ContentSource::ImageCarousel {
                folder,
                period_secs,
            } => match images_in_folder(&folder) {
                Ok(members) => {
                    let first = members[0].clone();
                    self.carousel_members = members;
                    self.carousel_period = Duration::from_secs(period_secs);
                    if self.present_or_fail(
                        &AssetDescriptor::Image(first),
                        SchedulerState::ImageCarousel,
                        surface,
                    ) {
                        self.carousel_deadline = Some(Instant::now() + self.carousel_period);
                    }
                }
                Err(e) => self.fail(e, surface),
            },
            ContentSource::LocalVideo { path } => {
                if !path.is_file() {
                    self.fail(
                        EngineError::Asset(format!("{} not found", path.display())),
                        surface,
                    );
                    return;
                }
                self.present_or_fail(&AssetDescriptor::Video(path), SchedulerState::LocalVideo, surface);
            }
            ContentSource::StreamedVideo { embed_url } => {
                self.present_or_fail(
                    &AssetDescriptor::Page(embed_url),
                    SchedulerState::StreamedVideo,
                    surface,
                );
            }
            ContentSource::RenderedPage { url } => {
                if url.is_empty() {
                    self.fail(EngineError::Config("no url configured".to_string()), surface);
                    return;
                }
                // Keep the screen covered while the probe runs.
                if self.state == SchedulerState::Idle {
                    self.show_fallback(surface);
                }
                runner.submit(NetJob::PageProbe {
                    generation: self.generation,
                    url,
                });
            }
            ContentSource::RemoteDailyImage { provider, cache } => {
                if cache.is_fresh(&today_stamp()) {
                    info!("daily image cache is fresh; no fetch needed");
                    self.present_or_fail(
                        &AssetDescriptor::Image(cache.local_path),
                        SchedulerState::RemoteDailyImage,
                        surface,
                    );
                    return;
                }
                if self.state == SchedulerState::Idle {
                    self.show_fallback(surface);
                }
                runner.submit(NetJob::DailyImage {
                    generation: self.generation,
                    provider,
                    dest: cache.local_path,
                });
            }
        }
    }

    /// Folds one background result in. Results from a superseded
    /// generation are logged and dropped.
    pub fn handle_outcome(&mut self, outcome: NetOutcome, surface: &mut dyn RenderSurface) {
        if outcome.generation() != self.generation {
            info!(
                "discarding stale outcome from generation {} (current {})",
                outcome.generation(),
                self.generation
            );
            return;
        }

        match outcome {
            NetOutcome::DailyImage {
                provider, result, ..
            } => match result {
                Ok(path) => {
                    let stamp = today_stamp();
                    if let Err(e) =
                        Settings::store_fetch_stamp(&self.settings_path, provider.web_mode(), &stamp)
                    {
                        warn!("could not persist the fetch stamp: {e}");
                    }
                    if let Err(e) = validate_image(&path) {
                        self.fail(e, surface);
                        return;
                    }
                    self.present_or_fail(
                        &AssetDescriptor::Image(path),
                        SchedulerState::RemoteDailyImage,
                        surface,
                    );
                }
                Err(e) => self.fail(e, surface),
            },
            NetOutcome::PageProbe { url, reachable, .. } => {
                if reachable {
                    self.present_or_fail(
                        &AssetDescriptor::Page(url),
                        SchedulerState::RenderedPage,
                        surface,
                    );
                } else {
                    self.fail(EngineError::Network(format!("{url} unreachable")), surface);
                }
            }
        }
    }

    /// Advances timed content. Only the carousel arms a deadline.
    pub fn tick(&mut self, now: Instant, surface: &mut dyn RenderSurface) {
        let Some(deadline) = self.carousel_deadline else {
            return;
        };
        if now < deadline || self.carousel_members.is_empty() {
            return;
        }

        self.carousel_index = (self.carousel_index + 1) % self.carousel_members.len();
        let next = self.carousel_members[self.carousel_index].clone();
        if self.present_or_fail(
            &AssetDescriptor::Image(next),
            SchedulerState::ImageCarousel,
            surface,
        ) {
            self.carousel_deadline = Some(now + self.carousel_period);
        }
    }

    /// Surfaces errors that materialized after a successful present.
    pub fn pump_surface(&mut self, surface: &mut dyn RenderSurface) {
        if let Some(e) = surface.take_async_error() {
            self.fail(e, surface);
        }
    }

    /// Clears the surface and puts the startup wallpaper back. The last
    /// transition before exit.
    pub fn shutdown(&mut self, surface: &mut dyn RenderSurface, desktop: &dyn DesktopIntegration) {
        self.generation += 1;
        self.carousel_deadline = None;
        self.state = SchedulerState::Idle;
        surface.clear();
        self.snapshot.restore(desktop);
        desktop.request_desktop_refresh();
    }

    fn present_or_fail(
        &mut self,
        asset: &AssetDescriptor,
        state: SchedulerState,
        surface: &mut dyn RenderSurface,
    ) -> bool {
        match surface.present(asset) {
            Ok(()) => {
                self.state = state;
                true
            }
            Err(e) => {
                self.fail(e, surface);
                false
            }
        }
    }

    /// Active content failed: record the notice, show the fallback and
    /// park until the next reload. The screen is never left empty.
    fn fail(&mut self, err: EngineError, surface: &mut dyn RenderSurface) {
        warn!("{err}");
        self.pending_notice = Some(err.user_notice());
        self.state = SchedulerState::Fallback;
        self.carousel_deadline = None;
        self.show_fallback(surface);
    }

    fn show_fallback(&mut self, surface: &mut dyn RenderSurface) {
        let fallback = self.snapshot.fallback_asset();
        if surface.present(&AssetDescriptor::Image(fallback)).is_err() {
            let _ = surface.present(&AssetDescriptor::Image(default_asset_path()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loaders::settings::{ImageMode, WallpaperMode, WebMode};
    use crate::desktop::{WindowHandle, WindowPredicate};
    use std::{cell::RefCell, fs};

    struct RecordingSurface {
        presented: Vec<AssetDescriptor>,
        fail_images: bool,
        async_errors: Vec<EngineError>,
        cleared: bool,
    }

    impl RecordingSurface {
        fn new() -> Self {
            Self {
                presented: Vec::new(),
                fail_images: false,
                async_errors: Vec::new(),
                cleared: false,
            }
        }

        fn last(&self) -> &AssetDescriptor {
            self.presented.last().expect("something presented")
        }
    }

    impl RenderSurface for RecordingSurface {
        fn present(&mut self, asset: &AssetDescriptor) -> Result<(), EngineError> {
            if self.fail_images && matches!(asset, AssetDescriptor::Image(_)) {
                return Err(EngineError::Asset("forced failure".to_string()));
            }
            self.presented.push(asset.clone());
            Ok(())
        }

        fn take_async_error(&mut self) -> Option<EngineError> {
            self.async_errors.pop()
        }

        fn clear(&mut self) {
            self.cleared = true;
        }
    }

    struct CapturingRunner {
        jobs: Vec<NetJob>,
        cancellations: usize,
    }

    impl CapturingRunner {
        fn new() -> Self {
            Self {
                jobs: Vec::new(),
                cancellations: 0,
            }
        }
    }

    impl NetworkRunner for CapturingRunner {
        fn submit(&mut self, job: NetJob) {
            self.jobs.push(job);
        }

        fn cancel_inflight(&mut self) {
            self.cancellations += 1;
        }
    }

    struct FakeDesktop {
        wallpaper: RefCell<Option<String>>,
        refreshes: RefCell<usize>,
    }

    impl FakeDesktop {
        fn with_wallpaper(value: &str) -> Self {
            Self {
                wallpaper: RefCell::new(Some(value.to_string())),
                refreshes: RefCell::new(0),
            }
        }
    }

    impl DesktopIntegration for FakeDesktop {
        fn find_windows(
            &self,
            _predicate: &WindowPredicate,
            _parent: Option<WindowHandle>,
        ) -> Vec<WindowHandle> {
            Vec::new()
        }

        fn insert_render_surface(&self, _title: &str) -> Result<(), EngineError> {
            Ok(())
        }

        fn request_desktop_refresh(&self) {
            *self.refreshes.borrow_mut() += 1;
        }

        fn toggle_icon_visibility(&self) {}

        fn current_wallpaper(&self) -> Option<String> {
            self.wallpaper.borrow().clone()
        }

        fn set_wallpaper(&self, value: &str) -> Result<(), EngineError> {
            *self.wallpaper.borrow_mut() = Some(value.to_string());
            Ok(())
        }
    }

    fn png_at(dir: &std::path::Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let canvas = image::RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30]));
        canvas.save(&path).unwrap();
        path
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        scheduler: ContentScheduler,
        settings_path: PathBuf,
        snapshot_file: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let snapshot_file = png_at(dir.path(), "startup.png");
        let desktop = FakeDesktop::with_wallpaper(&snapshot_file.to_string_lossy());
        let snapshot = SnapshotStore::capture(&desktop);

        let settings_path = dir.path().join("settings.json");
        fs::write(&settings_path, Settings::default_file_contents()).unwrap();

        Fixture {
            scheduler: ContentScheduler::new(snapshot, settings_path.clone()),
            settings_path,
            snapshot_file,
            _dir: dir,
        }
    }

    #[test]
    fn missing_fixed_image_falls_back_to_the_snapshot_with_a_notice() {
        let mut fx = fixture();
        let mut surface = RecordingSurface::new();
        let mut runner = CapturingRunner::new();

        let mut settings = Settings::default();
        settings.img = "/no/such/image.png".to_string();
        fx.scheduler
            .load_or_reload(&settings, &mut surface, &mut runner);

        assert_eq!(fx.scheduler.state(), SchedulerState::Fallback);
        assert_eq!(
            *surface.last(),
            AssetDescriptor::Image(fx.snapshot_file.clone())
        );
        assert!(fx.scheduler.take_notice().is_some());
        assert!(fx.scheduler.take_notice().is_none());
    }

    #[test]
    fn empty_carousel_folder_reports_and_never_arms_a_timer() {
        let mut fx = fixture();
        let mut surface = RecordingSurface::new();
        let mut runner = CapturingRunner::new();
        let empty = tempfile::tempdir().unwrap();

        let mut settings = Settings::default();
        settings.img_mode = ImageMode::Carousel;
        settings.folder = empty.path().to_string_lossy().to_string();
        fx.scheduler
            .load_or_reload(&settings, &mut surface, &mut runner);

        assert_eq!(fx.scheduler.state(), SchedulerState::Fallback);
        assert!(fx.scheduler.carousel_deadline.is_none());

        // Ticks do nothing without a deadline.
        let presented_before = surface.presented.len();
        fx.scheduler
            .tick(Instant::now() + Duration::from_secs(3600), &mut surface);
        assert_eq!(surface.presented.len(), presented_before);
    }

    #[test]
    fn carousel_advances_cyclically_on_each_elapsed_period() {
        let mut fx = fixture();
        let mut surface = RecordingSurface::new();
        let mut runner = CapturingRunner::new();
        let folder = tempfile::tempdir().unwrap();
        let a = png_at(folder.path(), "a.png");
        let b = png_at(folder.path(), "b.png");
        let c = png_at(folder.path(), "c.png");

        let mut settings = Settings::default();
        settings.img_mode = ImageMode::Carousel;
        settings.folder = folder.path().to_string_lossy().to_string();
        settings.img_period = 1;
        fx.scheduler
            .load_or_reload(&settings, &mut surface, &mut runner);

        assert_eq!(fx.scheduler.state(), SchedulerState::ImageCarousel);
        assert_eq!(*surface.last(), AssetDescriptor::Image(a.clone()));

        let mut now = Instant::now();
        let expected = [b.clone(), c.clone(), a.clone(), b.clone()];
        for want in expected {
            now += Duration::from_secs(2);
            fx.scheduler.tick(now, &mut surface);
            assert_eq!(*surface.last(), AssetDescriptor::Image(want));
        }
    }

    #[test]
    fn tick_before_the_deadline_changes_nothing() {
        let mut fx = fixture();
        let mut surface = RecordingSurface::new();
        let mut runner = CapturingRunner::new();
        let folder = tempfile::tempdir().unwrap();
        png_at(folder.path(), "a.png");
        png_at(folder.path(), "b.png");

        let mut settings = Settings::default();
        settings.img_mode = ImageMode::Carousel;
        settings.folder = folder.path().to_string_lossy().to_string();
        settings.img_period = 3600;
        fx.scheduler
            .load_or_reload(&settings, &mut surface, &mut runner);

        let count = surface.presented.len();
        fx.scheduler.tick(Instant::now(), &mut surface);
        assert_eq!(surface.presented.len(), count);
    }

    #[test]
    fn fresh_daily_cache_presents_without_a_network_job() {
        let mut fx = fixture();
        let mut surface = RecordingSurface::new();
        let mut runner = CapturingRunner::new();

        let cached = png_at(fx.settings_path.parent().unwrap(), "bing_daily.jpg");
        let source = ContentSource::RemoteDailyImage {
            provider: DailyProvider::Bing,
            cache: crate::remote_fetch::RemoteCacheEntry {
                local_path: cached.clone(),
                last_fetch_date: today_stamp(),
            },
        };
        fx.scheduler.apply_source(source, &mut surface, &mut runner);

        assert!(runner.jobs.is_empty());
        assert_eq!(fx.scheduler.state(), SchedulerState::RemoteDailyImage);
        assert_eq!(*surface.last(), AssetDescriptor::Image(cached));
    }

    #[test]
    fn stale_daily_stamp_submits_a_fetch_job() {
        let mut fx = fixture();
        let mut surface = RecordingSurface::new();
        let mut runner = CapturingRunner::new();

        let cached = png_at(fx.settings_path.parent().unwrap(), "bing_daily.jpg");
        let source = ContentSource::RemoteDailyImage {
            provider: DailyProvider::Bing,
            cache: crate::remote_fetch::RemoteCacheEntry {
                local_path: cached,
                last_fetch_date: "20200101".to_string(),
            },
        };
        fx.scheduler.apply_source(source, &mut surface, &mut runner);

        assert_eq!(runner.jobs.len(), 1);
        assert!(matches!(runner.jobs[0], NetJob::DailyImage { .. }));
    }

    #[test]
    fn daily_fetch_success_presents_and_stamps() {
        let mut fx = fixture();
        let mut surface = RecordingSurface::new();
        let mut runner = CapturingRunner::new();

        let mut settings = Settings::default();
        settings.mode = WallpaperMode::Web;
        settings.web_mode = WebMode::Bing;
        fx.scheduler
            .load_or_reload(&settings, &mut surface, &mut runner);
        assert_eq!(runner.jobs.len(), 1);

        let fetched = png_at(fx.settings_path.parent().unwrap(), "fetched.jpg");
        fx.scheduler.handle_outcome(
            NetOutcome::DailyImage {
                generation: fx.scheduler.generation,
                provider: DailyProvider::Bing,
                result: Ok(fetched.clone()),
            },
            &mut surface,
        );

        assert_eq!(fx.scheduler.state(), SchedulerState::RemoteDailyImage);
        assert_eq!(*surface.last(), AssetDescriptor::Image(fetched));

        let reloaded = Settings::load(&fx.settings_path).unwrap();
        assert_eq!(reloaded.bing_last_fetch, today_stamp());
    }

    #[test]
    fn stale_outcomes_are_discarded_after_a_reload() {
        let mut fx = fixture();
        let mut surface = RecordingSurface::new();
        let mut runner = CapturingRunner::new();

        let mut settings = Settings::default();
        settings.mode = WallpaperMode::Web;
        settings.web_mode = WebMode::Bing;
        fx.scheduler
            .load_or_reload(&settings, &mut surface, &mut runner);
        let old_generation = fx.scheduler.generation;

        // A second reload supersedes the first fetch.
        let image = png_at(fx.settings_path.parent().unwrap(), "fixed.png");
        let mut settings = Settings::default();
        settings.img = image.to_string_lossy().to_string();
        fx.scheduler
            .load_or_reload(&settings, &mut surface, &mut runner);
        assert_eq!(runner.cancellations, 2);
        assert_eq!(fx.scheduler.state(), SchedulerState::FixedImage);

        let fetched = png_at(fx.settings_path.parent().unwrap(), "late.jpg");
        fx.scheduler.handle_outcome(
            NetOutcome::DailyImage {
                generation: old_generation,
                provider: DailyProvider::Bing,
                result: Ok(fetched),
            },
            &mut surface,
        );

        // The late result changed nothing.
        assert_eq!(fx.scheduler.state(), SchedulerState::FixedImage);
        assert_eq!(*surface.last(), AssetDescriptor::Image(image));
        let reloaded = Settings::load(&fx.settings_path).unwrap();
        assert_eq!(reloaded.bing_last_fetch, "");
    }

    #[test]
    fn page_probe_success_presents_the_page() {
        let mut fx = fixture();
        let mut surface = RecordingSurface::new();
        let mut runner = CapturingRunner::new();

        let mut settings = Settings::default();
        settings.mode = WallpaperMode::Web;
        settings.web_mode = WebMode::Url;
        settings.url = "https://example.com".to_string();
        fx.scheduler
            .load_or_reload(&settings, &mut surface, &mut runner);

        // The screen is covered while the probe runs.
        assert!(matches!(surface.last(), AssetDescriptor::Image(_)));

        fx.scheduler.handle_outcome(
            NetOutcome::PageProbe {
                generation: fx.scheduler.generation,
                url: "https://example.com".to_string(),
                reachable: true,
            },
            &mut surface,
        );
        assert_eq!(fx.scheduler.state(), SchedulerState::RenderedPage);
        assert_eq!(
            *surface.last(),
            AssetDescriptor::Page("https://example.com".to_string())
        );
    }

    #[test]
    fn unreachable_page_falls_back_with_a_network_notice() {
        let mut fx = fixture();
        let mut surface = RecordingSurface::new();
        let mut runner = CapturingRunner::new();

        let mut settings = Settings::default();
        settings.mode = WallpaperMode::Web;
        settings.web_mode = WebMode::Url;
        settings.url = "https://down.example".to_string();
        fx.scheduler
            .load_or_reload(&settings, &mut surface, &mut runner);

        fx.scheduler.handle_outcome(
            NetOutcome::PageProbe {
                generation: fx.scheduler.generation,
                url: "https://down.example".to_string(),
                reachable: false,
            },
            &mut surface,
        );
        assert_eq!(fx.scheduler.state(), SchedulerState::Fallback);
        assert_eq!(
            fx.scheduler.take_notice(),
            Some(EngineError::Network(String::new()).user_notice())
        );
    }

    #[test]
    fn async_surface_errors_trigger_the_fallback() {
        let mut fx = fixture();
        let mut surface = RecordingSurface::new();
        let mut runner = CapturingRunner::new();

        let image = png_at(fx.settings_path.parent().unwrap(), "fixed.png");
        let mut settings = Settings::default();
        settings.img = image.to_string_lossy().to_string();
        fx.scheduler
            .load_or_reload(&settings, &mut surface, &mut runner);
        assert_eq!(fx.scheduler.state(), SchedulerState::FixedImage);

        surface
            .async_errors
            .push(EngineError::Asset("decode blew up".to_string()));
        fx.scheduler.pump_surface(&mut surface);

        assert_eq!(fx.scheduler.state(), SchedulerState::Fallback);
        assert_eq!(
            *surface.last(),
            AssetDescriptor::Image(fx.snapshot_file.clone())
        );
    }

    #[test]
    fn the_surface_always_shows_something_after_any_failure() {
        let mut fx = fixture();
        let mut surface = RecordingSurface::new();
        let mut runner = CapturingRunner::new();

        let mut settings = Settings::default();
        settings.img = "/gone.png".to_string();
        fx.scheduler
            .load_or_reload(&settings, &mut surface, &mut runner);
        assert!(!surface.presented.is_empty());

        settings.mode = WallpaperMode::Video;
        settings.video = "/gone.mp4".to_string();
        fx.scheduler
            .load_or_reload(&settings, &mut surface, &mut runner);
        assert!(matches!(surface.last(), AssetDescriptor::Image(_)));
    }

    #[test]
    fn shutdown_restores_the_startup_wallpaper_and_stops_timers() {
        let mut fx = fixture();
        let mut surface = RecordingSurface::new();
        let mut runner = CapturingRunner::new();
        let desktop = FakeDesktop::with_wallpaper(&fx.snapshot_file.to_string_lossy());

        let folder = tempfile::tempdir().unwrap();
        png_at(folder.path(), "a.png");
        png_at(folder.path(), "b.png");
        let mut settings = Settings::default();
        settings.img_mode = ImageMode::Carousel;
        settings.folder = folder.path().to_string_lossy().to_string();
        fx.scheduler
            .load_or_reload(&settings, &mut surface, &mut runner);
        assert!(fx.scheduler.carousel_deadline.is_some());

        desktop.set_wallpaper("/something/else.png").unwrap();
        fx.scheduler.shutdown(&mut surface, &desktop);

        assert!(surface.cleared);
        assert!(fx.scheduler.carousel_deadline.is_none());
        assert_eq!(
            desktop.current_wallpaper().as_deref(),
            Some(fx.snapshot_file.to_string_lossy().as_ref())
        );
        assert_eq!(*desktop.refreshes.borrow(), 1);
    }
}
