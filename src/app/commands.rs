use tauri::State;

use crate::{
    labels::Label,
    settings::Settings,
    training::TrainingSummary,
    AppState,
};

use super::AppStatus;

const PREVIEW_JPEG_QUALITY: u8 = 70;

#[tauri::command]
pub fn get_app_status(state: State<'_, AppState>) -> AppStatus {
    state.controller.status()
}

#[tauri::command]
pub async fn train_label(state: State<'_, AppState>, label: Label) -> Result<TrainingSummary, String> {
    state
        .controller
        .train(label)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn start_detection(state: State<'_, AppState>) -> Result<(), String> {
    state
        .controller
        .start_detection()
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn stop_detection(state: State<'_, AppState>) -> Result<(), String> {
    state
        .controller
        .stop_detection()
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn test_sound(state: State<'_, AppState>) -> bool {
    state.controller.test_sound()
}

#[tauri::command]
pub fn get_preview_frame(state: State<'_, AppState>) -> Result<String, String> {
    let frame = state.controller.preview_frame().map_err(|e| e.to_string())?;
    frame
        .to_jpeg_data_url(PREVIEW_JPEG_QUALITY)
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn get_settings(state: State<'_, AppState>) -> Settings {
    state.settings.get()
}

#[tauri::command]
pub fn update_settings(state: State<'_, AppState>, settings: Settings) -> Result<Settings, String> {
    let previous = state.settings.get();
    state
        .settings
        .update(settings.clone())
        .map_err(|e| e.to_string())?;

    state.controller.apply_settings(&settings);
    if previous.alert.volume != settings.alert.volume {
        state.audio.set_volume(settings.alert.volume)?;
    }
    let pending = previous.restart_required_changes(&settings);
    if !pending.is_empty() {
        log::info!("Changed settings apply after restart: {}", pending.join(", "));
    }
    Ok(settings)
}
