pub mod alert;
pub mod app;
pub mod audio;
pub mod capture;
pub mod classifier;
pub mod context;
pub mod detection;
pub mod embedding;
pub mod labels;
pub mod settings;
pub mod training;
mod utils;

use std::sync::Arc;

use alert::{AlertSink, DesktopNotifier, LogNotifier, Notifier};
use app::{
    bootstrap::bootstrap,
    commands::{
        get_app_status, get_preview_frame, get_settings, start_detection, stop_detection,
        test_sound, train_label, update_settings,
    },
    AppController, EventSink,
};
use audio::AlertAudioHandle;
use settings::SettingsStore;
use tauri::{Manager, RunEvent};

pub(crate) struct AppState {
    pub(crate) controller: AppController,
    pub(crate) audio: Arc<AlertAudioHandle>,
    pub(crate) settings: SettingsStore,
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let debug_mode = std::env::var("HANDSOFF_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let default_level = if debug_mode { "debug" } else { "info" };

    // RUST_LOG wins over the default level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    log::info!("Hands Off starting up...");

    let app = tauri::Builder::default()
        .plugin(tauri_plugin_notification::init())
        .setup(|app| {
            let result = (|| -> anyhow::Result<()> {
                let app_data_dir = app
                    .path()
                    .app_data_dir()
                    .map_err(|err| anyhow::anyhow!(err))?;
                std::fs::create_dir_all(&app_data_dir)?;

                let settings_store = SettingsStore::new(app_data_dir.join("settings.json"))?;
                let settings = settings_store.get();

                let audio = Arc::new(AlertAudioHandle::new(
                    settings.alert.sound_path.clone(),
                    settings.alert.volume,
                ));
                let notifier: Arc<dyn Notifier> = if settings.alert.desktop_notifications {
                    Arc::new(DesktopNotifier::new(app.handle().clone()))
                } else {
                    Arc::new(LogNotifier)
                };
                let alerts = Arc::new(AlertSink::new(audio.clone(), notifier, &settings.alert));
                let events: Arc<dyn EventSink> = Arc::new(app.handle().clone());

                let controller = AppController::new(&settings, alerts, events);

                // Camera and model come up in the background; the UI shows Initializing meanwhile.
                let init_controller = controller.clone();
                tauri::async_runtime::spawn(async move {
                    let _ = init_controller.initialize(bootstrap(settings)).await;
                });

                app.manage(AppState {
                    controller,
                    audio,
                    settings: settings_store,
                });

                Ok(())
            })();

            result.map_err(|err| err.into())
        })
        .invoke_handler(tauri::generate_handler![
            get_app_status,
            train_label,
            start_detection,
            stop_detection,
            test_sound,
            get_preview_frame,
            get_settings,
            update_settings,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    app.run(|app_handle, event| {
        if let RunEvent::Exit = event {
            if let Some(state) = app_handle.try_state::<AppState>() {
                tauri::async_runtime::block_on(state.controller.shutdown());
            }
        }
    });
}
