use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// User preferences from the settings panel. Toggles take effect immediately
/// for listeners holding a [`SharedPreferences`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_true")]
    pub notifications: bool,
    #[serde(default = "default_true")]
    pub sound_enabled: bool,
    #[serde(default)]
    pub desktop_notifications: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            notifications: true,
            sound_enabled: true,
            desktop_notifications: false,
        }
    }
}

impl Preferences {
    /// Whether an incoming message should raise a notification
    pub fn should_notify(&self) -> bool {
        self.notifications
    }

    /// Whether the notification should play a sound
    pub fn should_play_sound(&self) -> bool {
        self.notifications && self.sound_enabled
    }

    /// Whether the notification should also be shown on the desktop
    pub fn should_show_desktop(&self) -> bool {
        self.notifications && self.desktop_notifications
    }
}

pub type SharedPreferences = Arc<RwLock<Preferences>>;

pub fn new_shared_preferences(preferences: Preferences) -> SharedPreferences {
    Arc::new(RwLock::new(preferences))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let prefs = Preferences::default();
        assert!(prefs.should_notify());
        assert!(prefs.should_play_sound());
        assert!(!prefs.desktop_notifications);
    }

    #[test]
    fn test_sound_requires_notifications() {
        let prefs = Preferences {
            notifications: false,
            sound_enabled: true,
            desktop_notifications: false,
        };
        assert!(!prefs.should_notify());
        assert!(!prefs.should_play_sound());
    }

    #[test]
    fn test_desktop_requires_opt_in() {
        let mut prefs = Preferences::default();
        assert!(!prefs.should_show_desktop());

        prefs.desktop_notifications = true;
        assert!(prefs.should_show_desktop());

        prefs.notifications = false;
        assert!(!prefs.should_show_desktop());
    }

    #[test]
    fn test_shared_toggle_visible_to_readers() {
        let shared = new_shared_preferences(Preferences::default());
        let reader = Arc::clone(&shared);

        shared.write().unwrap().sound_enabled = false;
        assert!(!reader.read().unwrap().should_play_sound());
    }
}
