use crate::infrastructure::error::DispatchError;
use log::debug;

pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str) -> Result<(), DispatchError>;
}

/// Desktop notifications through the platform notification service.
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    app_name: String,
}

impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<(), DispatchError> {
        debug!("notifying: {title}: {message}");
        notify_rust::Notification::new()
            .appname(&self.app_name)
            .summary(title)
            .body(message)
            .show()
            .map(|_| ())
            .map_err(|error| DispatchError::Notification(error.to_string()))
    }
}
