use anyhow::{anyhow, bail, Result};
use tauri::{plugin::PermissionState, AppHandle, Runtime};
use tauri_plugin_notification::NotificationExt;

use super::Notifier;

/// OS notifications through the Tauri notification plugin.
pub struct DesktopNotifier<R: Runtime> {
    app_handle: AppHandle<R>,
}

impl<R: Runtime> DesktopNotifier<R> {
    pub fn new(app_handle: AppHandle<R>) -> Self {
        Self { app_handle }
    }
}

impl<R: Runtime> Notifier for DesktopNotifier<R> {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        let notification = self.app_handle.notification();
        if let Ok(PermissionState::Denied) = notification.permission_state() {
            bail!("notification permission denied");
        }

        notification
            .builder()
            .title(title)
            .body(body)
            .show()
            .map_err(|err| anyhow!("failed to show notification: {err}"))
    }
}

/// Fallback that only records the notification in the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        log::warn!("[alert] {title}: {body}");
        Ok(())
    }
}
