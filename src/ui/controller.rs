// Controller - the single consumer context
//
// This module contains the Controller which coordinates between:
// - NotificationChannel (engine -> consumer)
// - NotificationRouter (envelope handling)
// - ImportCoordinator (file and link imports)
// - ViewStore (the projection renderers follow)
//
// Every mutation of view state happens inside this type through `&mut self`,
// so it can never be entered by two call paths at once.

use crate::metrics::Metrics;
use crate::models::{ErrorReport, LoaderConfig, ViewState};
use crate::services::archive::Downloader;
use crate::services::engine::{Engine, EngineError};
use crate::services::import::{ImportCoordinator, ImportProgress, ImportSubmitter};
use crate::state::{ViewChange, ViewStore};
use crate::ui::bridge::{NotificationReceiver, UiEvent, UiEventSender, ui_event_channel};
use crate::ui::router::{NotificationRouter, RouterState};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;

/// Owns the consumer loop and every piece of state it mutates
///
/// # Example
/// ```ignore
/// let (notify_tx, notify_rx) = notification_channel();
/// let (host, engine) = EngineHost::spawn(backend, notify_tx)?;
///
/// let mut controller = Controller::new(config, Arc::new(engine), notify_rx, downloader, metrics);
/// controller.startup();
/// controller.run(tokio::signal::ctrl_c()).await;  // Runs until shutdown resolves
/// ```
pub struct Controller {
    config: LoaderConfig,
    store: ViewStore,
    router: NotificationRouter,
    notifications: NotificationReceiver,
    engine: Arc<dyn Engine>,
    imports: Arc<ImportCoordinator>,
    ui_tx: UiEventSender,
    ui_rx: mpsc::UnboundedReceiver<UiEvent>,
    metrics: Arc<Metrics>,
}

impl Controller {
    pub fn new(
        config: LoaderConfig,
        engine: Arc<dyn Engine>,
        notifications: NotificationReceiver,
        downloader: Box<dyn Downloader>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (ui_tx, ui_rx) = ui_event_channel();

        let imports = Arc::new(ImportCoordinator::new(
            config.clone(),
            downloader,
            Arc::clone(&engine),
            Arc::new(ui_tx.clone()),
            Arc::clone(&metrics),
        ));

        Self {
            config,
            store: ViewStore::new(),
            router: NotificationRouter::new(Arc::clone(&engine), Arc::clone(&metrics)),
            notifications,
            engine,
            imports,
            ui_tx,
            ui_rx,
            metrics,
        }
    }

    /// Handle for producers; usable before the loop is running
    pub fn submitter(&self) -> ImportSubmitter {
        self.imports.submitter()
    }

    /// Subscribe to view change events
    pub fn subscribe(&self) -> broadcast::Receiver<ViewChange> {
        self.store.subscribe()
    }

    pub fn view(&self) -> &ViewState {
        self.store.state()
    }

    pub fn router_state(&self) -> &RouterState {
        self.router.state()
    }

    /// Connect the import queues to this consumer.
    ///
    /// Until this runs, producer wakes keep retrying in the background.
    pub fn attach_imports(&self) {
        self.imports.register_wakes(
            self.ui_tx.waker(UiEvent::WakeFiles),
            self.ui_tx.waker(UiEvent::WakeLinks),
        );
        tracing::debug!("Import queues attached to consumer");
    }

    /// Initial command sequence sent to the engine after it started
    pub fn startup(&mut self) {
        tracing::info!("Starting loader with mods directory {}", self.config.mods_path);
        self.send("set mods path", |engine| {
            engine.set_mods_path(self.config.mods_path.as_str())
        });
        self.reload_mods();

        let label = format!("{}: {}", crate::APP_NAME, crate::VERSION);
        self.send("install base mod", |engine| engine.install_base_mod(&label));
    }

    // User intents

    pub fn reload_mods(&mut self) {
        self.store.show_loading("Loading mods...");
        self.send("reload", |engine| engine.reload_mods());
        self.send("get mods data", |engine| engine.get_mods_data());
    }

    pub fn request_install(&mut self, mod_hash: &str) {
        tracing::info!("Install requested for {}", mod_hash);
        self.send("conflict check", |engine| engine.get_mod_conflict(mod_hash));
    }

    pub fn request_uninstall(&mut self, mod_hash: &str) {
        tracing::info!("Uninstall requested for {}", mod_hash);
        self.send("uninstall", |engine| engine.uninstall_mod(mod_hash));
    }

    pub fn request_reinstall(&mut self, mod_hash: &str) {
        tracing::info!("Reinstall requested for {}", mod_hash);
        self.send("uninstall", |engine| engine.uninstall_mod(mod_hash));
        self.send("conflict check", |engine| engine.get_mod_conflict(mod_hash));
    }

    /// Delete a mod file. Installed mods must be uninstalled first.
    pub fn request_delete(&mut self, mod_hash: &str) {
        if self.store.state().is_installed(mod_hash) {
            let title = format!("Delete mod '{}'", self.store.state().mod_name(mod_hash));
            self.report(ErrorReport::new(title, "To delete mod, you need to uninstall it"));
            return;
        }

        tracing::info!("Deleting mod {}", mod_hash);
        self.store.update(|state| {
            if let Some(entry) = state.mods.get_mut(mod_hash) {
                entry.mod_file_exist = false;
            }
        });
        self.send("delete", |engine| engine.delete_mod(mod_hash));
        self.reload_mods();
    }

    pub fn accept_conflict(&mut self) {
        self.router.accept_conflict(&mut self.store);
    }

    pub fn cancel_conflict(&mut self) {
        self.router.cancel_conflict(&mut self.store);
    }

    /// Close the error dialog. Returns true when the dialog asked for the
    /// process to terminate.
    pub fn dismiss_error(&mut self) -> bool {
        let terminate = self
            .store
            .state()
            .error_report
            .as_ref()
            .is_some_and(|report| report.terminate);
        self.store.dismiss_error();
        terminate
    }

    /// Show an error dialog on top of everything else
    pub fn report(&mut self, report: ErrorReport) {
        self.metrics.record_error_report();
        self.store.show_error(report);
    }

    // Consumer loop

    /// Route every pending envelope. Returns how many were routed.
    pub fn poll_notifications(&mut self) -> usize {
        let mut routed = 0;
        while let Some(envelope) = self.notifications.poll() {
            self.router.route(envelope, &mut self.store);
            routed += 1;
        }
        routed
    }

    /// One synchronous consumer iteration: pending UI events first, with
    /// imports drained inline, then pending notifications.
    ///
    /// Used to drive the controller without a runtime.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::WakeFiles => {
                    self.imports.drain_files();
                }
                UiEvent::WakeLinks => {
                    self.imports.drain_links();
                }
                other => self.apply_event(other),
            }
            handled += 1;
        }
        handled + self.poll_notifications()
    }

    /// Run the consumer loop until `shutdown` resolves.
    ///
    /// Notifications are polled on the configured interval. Import drains run
    /// on the blocking pool so a slow download never stalls routing.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        self.attach_imports();

        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        tracing::info!("Consumer loop started");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    self.poll_notifications();
                }
                Some(event) = self.ui_rx.recv() => {
                    self.dispatch(event);
                }
            }
        }

        self.imports.close();
        tracing::info!("Consumer loop stopped");
    }

    fn dispatch(&mut self, event: UiEvent) {
        match event {
            UiEvent::WakeFiles => {
                let imports = Arc::clone(&self.imports);
                tokio::task::spawn_blocking(move || {
                    let taken = imports.drain_files();
                    tracing::debug!("File import drain finished, {} items", taken);
                });
            }
            UiEvent::WakeLinks => {
                let imports = Arc::clone(&self.imports);
                tokio::task::spawn_blocking(move || {
                    let taken = imports.drain_links();
                    tracing::debug!("Link import drain finished, {} items", taken);
                });
            }
            other => self.apply_event(other),
        }
    }

    fn apply_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::ImportProgress(progress) => self.show_import_progress(progress),
            UiEvent::ImportFailed(report) => self.report(report),
            UiEvent::WakeFiles | UiEvent::WakeLinks => {}
        }
    }

    fn show_import_progress(&mut self, progress: ImportProgress) {
        self.store.update(|state| match progress {
            ImportProgress::DownloadStarted { .. } => {
                state.progress.maximum = 100;
                state.progress.value = 0;
                state.progress.show("Download mod", "");
            }
            ImportProgress::Downloading { percent } => {
                state.progress.value = u32::from(percent);
            }
            ImportProgress::Extracting { entry } => {
                state.progress.content = format!("Extract: '{entry}'");
            }
            ImportProgress::Finished => state.progress.hide(),
        });
    }

    fn send<F>(&self, what: &str, command: F)
    where
        F: FnOnce(&dyn Engine) -> Result<(), EngineError>,
    {
        if let Err(e) = command(self.engine.as_ref()) {
            tracing::error!("Failed to send {} command: {}", what, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Envelope, ModData, Screen};
    use crate::services::archive::ArchiveError;
    use crate::services::engine::MockEngine;
    use crate::services::import::ImportObserver;
    use crate::ui::bridge::notification_channel;
    use camino::Utf8Path;
    use mockall::Sequence;
    use mockall::predicate::eq;

    struct NoDownloads;

    impl Downloader for NoDownloads {
        fn download(
            &self,
            url: &str,
            _dest: &Utf8Path,
            _progress: &mut dyn FnMut(u8),
        ) -> Result<(), ArchiveError> {
            Err(ArchiveError::Download {
                url: url.to_string(),
                message: "offline".into(),
            })
        }
    }

    fn controller(engine: MockEngine) -> (Controller, crate::ui::bridge::NotificationSender) {
        let (tx, rx) = notification_channel();
        let controller = Controller::new(
            LoaderConfig::default(),
            Arc::new(engine),
            rx,
            Box::new(NoDownloads),
            Arc::new(Metrics::new()),
        );
        (controller, tx)
    }

    #[test]
    fn test_startup_sequence() {
        let mut engine = MockEngine::new();
        let mut seq = Sequence::new();
        engine
            .expect_set_mods_path()
            .with(eq("Mods"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        engine
            .expect_reload_mods()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        engine
            .expect_get_mods_data()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        engine
            .expect_install_base_mod()
            .withf(|label| label.starts_with("bmodloader: "))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let (mut controller, _tx) = controller(engine);
        controller.startup();

        assert_eq!(controller.view().screen, Screen::Loading);
    }

    #[test]
    fn test_delete_installed_mod_is_refused() {
        let mut engine = MockEngine::new();
        engine.expect_delete_mod().times(0);
        let (mut controller, tx) = controller(engine);

        let mut installed = ModData::new("h1", "First");
        installed.installed = true;
        tx.push(Envelope::ModsData(vec![installed])).unwrap();
        controller.pump();

        controller.request_delete("h1");

        let report = controller.view().error_report.clone().unwrap();
        assert_eq!(report.title, "Delete mod 'First'");
        assert_eq!(report.content, "To delete mod, you need to uninstall it");
    }

    #[test]
    fn test_delete_uninstalled_mod_reloads() {
        let mut engine = MockEngine::new();
        engine
            .expect_delete_mod()
            .with(eq("h1"))
            .times(1)
            .returning(|_| Ok(()));
        engine.expect_reload_mods().times(1).returning(|| Ok(()));
        engine.expect_get_mods_data().times(1).returning(|| Ok(()));
        let (mut controller, tx) = controller(engine);

        tx.push(Envelope::ModsData(vec![ModData::new("h1", "First")])).unwrap();
        controller.pump();
        controller.request_delete("h1");

        assert!(!controller.view().mods["h1"].mod_file_exist);
        assert!(controller.view().error_report.is_none());
    }

    #[test]
    fn test_reinstall_uninstalls_then_checks_conflicts() {
        let mut engine = MockEngine::new();
        let mut seq = Sequence::new();
        engine
            .expect_uninstall_mod()
            .with(eq("h1"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        engine
            .expect_get_mod_conflict()
            .with(eq("h1"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let (mut controller, _tx) = controller(engine);
        controller.request_reinstall("h1");
    }

    #[test]
    fn test_import_progress_drives_dialog() {
        let (mut controller, _tx) = controller(MockEngine::new());
        let observer = controller.ui_tx.clone();

        observer.progress(ImportProgress::DownloadStarted { url: "u".into() });
        observer.progress(ImportProgress::Downloading { percent: 55 });
        observer.progress(ImportProgress::Extracting { entry: "a.bmod".into() });
        controller.pump();

        let progress = &controller.view().progress;
        assert!(progress.visible);
        assert_eq!(progress.title, "Download mod");
        assert_eq!(progress.value, 55);
        assert_eq!(progress.content, "Extract: 'a.bmod'");
    }

    #[test]
    fn test_failed_link_import_shows_unpack_error() {
        let (mut controller, _tx) = controller(MockEngine::new());
        let submitter = controller.submitter();
        controller.attach_imports();

        submitter.submit_url("bmodloader://mod,1,2");
        // Wake arrives from the retry thread
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while controller.view().error_report.is_none() && std::time::Instant::now() < deadline {
            controller.pump();
            std::thread::sleep(std::time::Duration::from_millis(5));
        }

        let report = controller.view().error_report.clone().unwrap();
        assert_eq!(report.title, "Unpack error:");
        controller.imports.close();
    }

    #[tokio::test]
    async fn test_run_routes_until_shutdown() {
        let (controller, tx) = controller(MockEngine::new());
        let mut changes = controller.subscribe();

        tokio_test::assert_ok!(tx.push(Envelope::ModsData(vec![ModData::new("h1", "First")])));
        controller
            .run(tokio::time::sleep(std::time::Duration::from_millis(50)))
            .await;

        let mut saw_mods_screen = false;
        while let Ok(change) = changes.try_recv() {
            if change == (ViewChange::ScreenChanged { screen: Screen::Mods }) {
                saw_mods_screen = true;
            }
        }
        assert!(saw_mods_screen);
    }

    #[test]
    fn test_fatal_report_requests_termination() {
        let (mut controller, _tx) = controller(MockEngine::new());
        controller.report(ErrorReport::fatal("Fatal Error:", "Java not found!"));
        assert!(!controller.view().progress.visible);

        assert!(controller.dismiss_error());
        assert!(controller.view().error_report.is_none());
    }
}
