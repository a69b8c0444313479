//! Client-integrity signals and the fire-once monitor that turns them into a
//! forced submission.
//!
//! This only shortens the window for cheating. Nothing on the server trusts it
//! for scoring.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The fixed catalogue of violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Copy, cut or paste attempted.
    Clipboard,
    /// Right-click menu opened.
    ContextMenu,
    DoubleClick,
    /// Devtools, save, select-all or print shortcut.
    RestrictedKey,
    /// Tab switched or window minimized.
    VisibilityLost,
    /// Window lost focus.
    FocusLost,
    FullscreenExited,
}

impl ViolationKind {
    pub const ALL: [ViolationKind; 7] = [
        ViolationKind::Clipboard,
        ViolationKind::ContextMenu,
        ViolationKind::DoubleClick,
        ViolationKind::RestrictedKey,
        ViolationKind::VisibilityLost,
        ViolationKind::FocusLost,
        ViolationKind::FullscreenExited,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::Clipboard => "clipboard",
            ViolationKind::ContextMenu => "context_menu",
            ViolationKind::DoubleClick => "double_click",
            ViolationKind::RestrictedKey => "restricted_key",
            ViolationKind::VisibilityLost => "visibility_lost",
            ViolationKind::FocusLost => "focus_lost",
            ViolationKind::FullscreenExited => "fullscreen_exited",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViolationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ViolationKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown violation kind '{}'", s))
    }
}

/// A key press with its modifier state, as reported by the browser.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct KeyCombo {
    /// `KeyboardEvent.key`, e.g. "F12" or "i".
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
    /// Cmd on macOS.
    #[serde(default)]
    pub meta: bool,
}

impl KeyCombo {
    /// Devtools, view-source, save, select-all and print shortcuts.
    pub fn is_restricted(&self) -> bool {
        let key = self.key.to_ascii_lowercase();
        if key == "f12" {
            return true;
        }
        let command = self.ctrl || self.meta;
        if !command {
            return false;
        }
        match key.as_str() {
            "i" | "j" | "c" if self.shift => true,
            "i" if self.meta && self.alt => true,
            "u" | "s" | "a" | "p" => true,
            _ => false,
        }
    }
}

/// Raw client-side event as observed by the quiz page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    Copy,
    Cut,
    Paste,
    ContextMenu,
    DoubleClick,
    KeyDown { combo: KeyCombo },
    VisibilityChange { hidden: bool },
    WindowBlur,
    FullscreenChange { active: bool },
}

/// Maps an event to the violation it represents, if any.
pub fn classify(event: &ClientEvent) -> Option<ViolationKind> {
    match event {
        ClientEvent::Copy | ClientEvent::Cut | ClientEvent::Paste => Some(ViolationKind::Clipboard),
        ClientEvent::ContextMenu => Some(ViolationKind::ContextMenu),
        ClientEvent::DoubleClick => Some(ViolationKind::DoubleClick),
        ClientEvent::KeyDown { combo } if combo.is_restricted() => Some(ViolationKind::RestrictedKey),
        ClientEvent::KeyDown { .. } => None,
        ClientEvent::VisibilityChange { hidden: true } => Some(ViolationKind::VisibilityLost),
        ClientEvent::VisibilityChange { hidden: false } => None,
        ClientEvent::WindowBlur => Some(ViolationKind::FocusLost),
        ClientEvent::FullscreenChange { active: false } => Some(ViolationKind::FullscreenExited),
        ClientEvent::FullscreenChange { active: true } => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Observers not installed yet.
    Detached,
    /// Listening; the next violation trips the monitor.
    Armed,
    /// A violation was reported; later signals are ignored.
    Tripped(ViolationKind),
    /// Observers removed after the attempt reached its terminal state.
    Disarmed,
}

/// Scoped observer over the violation catalogue.
///
/// Install it before the first question renders and tear it down only once the
/// attempt is completed. Between the two it reports at most one violation.
#[derive(Debug)]
pub struct IntegrityMonitor {
    state: MonitorState,
    suppressed: u32,
}

impl Default for IntegrityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl IntegrityMonitor {
    pub fn new() -> Self {
        IntegrityMonitor {
            state: MonitorState::Detached,
            suppressed: 0,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Whether observers are currently registered.
    pub fn is_listening(&self) -> bool {
        matches!(self.state, MonitorState::Armed | MonitorState::Tripped(_))
    }

    /// Violations seen after the monitor tripped.
    pub fn suppressed(&self) -> u32 {
        self.suppressed
    }

    pub fn install(&mut self) {
        if self.state == MonitorState::Detached {
            tracing::debug!("integrity observers installed");
            self.state = MonitorState::Armed;
        }
    }

    /// Feeds one event. Returns the violation the first time one is seen.
    pub fn observe(&mut self, event: &ClientEvent) -> Option<ViolationKind> {
        let kind = classify(event)?;
        match self.state {
            MonitorState::Armed => {
                tracing::info!(violation = %kind, "integrity violation detected");
                self.state = MonitorState::Tripped(kind);
                Some(kind)
            }
            MonitorState::Tripped(_) => {
                self.suppressed += 1;
                None
            }
            MonitorState::Detached | MonitorState::Disarmed => None,
        }
    }

    /// Removes the observers. Call once the session is completed.
    pub fn teardown(&mut self) {
        if self.is_listening() {
            tracing::debug!(suppressed = self.suppressed, "integrity observers removed");
        }
        self.state = MonitorState::Disarmed;
    }
}

impl Drop for IntegrityMonitor {
    fn drop(&mut self) {
        if self.state == MonitorState::Armed {
            tracing::warn!("integrity monitor dropped while still armed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(key: &str, ctrl: bool, shift: bool) -> ClientEvent {
        ClientEvent::KeyDown {
            combo: KeyCombo {
                key: key.to_string(),
                ctrl,
                shift,
                ..KeyCombo::default()
            },
        }
    }

    #[test]
    fn test_catalogue_classification() {
        assert_eq!(classify(&ClientEvent::Paste), Some(ViolationKind::Clipboard));
        assert_eq!(classify(&ClientEvent::ContextMenu), Some(ViolationKind::ContextMenu));
        assert_eq!(classify(&ClientEvent::DoubleClick), Some(ViolationKind::DoubleClick));
        assert_eq!(
            classify(&ClientEvent::VisibilityChange { hidden: true }),
            Some(ViolationKind::VisibilityLost)
        );
        assert_eq!(classify(&ClientEvent::VisibilityChange { hidden: false }), None);
        assert_eq!(classify(&ClientEvent::WindowBlur), Some(ViolationKind::FocusLost));
        assert_eq!(
            classify(&ClientEvent::FullscreenChange { active: false }),
            Some(ViolationKind::FullscreenExited)
        );
        assert_eq!(classify(&ClientEvent::FullscreenChange { active: true }), None);
    }

    #[test]
    fn test_restricted_keys() {
        assert_eq!(classify(&key("F12", false, false)), Some(ViolationKind::RestrictedKey));
        assert_eq!(classify(&key("I", true, true)), Some(ViolationKind::RestrictedKey));
        assert_eq!(classify(&key("s", true, false)), Some(ViolationKind::RestrictedKey));
        assert_eq!(classify(&key("p", true, false)), Some(ViolationKind::RestrictedKey));
        assert_eq!(classify(&key("a", false, false)), None);
        assert_eq!(classify(&key("i", true, false)), None);
        assert_eq!(classify(&key("Enter", true, false)), None);

        let mac_devtools = ClientEvent::KeyDown {
            combo: KeyCombo {
                key: "i".to_string(),
                meta: true,
                alt: true,
                ..KeyCombo::default()
            },
        };
        assert_eq!(classify(&mac_devtools), Some(ViolationKind::RestrictedKey));
    }

    #[test]
    fn test_monitor_fires_once() {
        let mut monitor = IntegrityMonitor::new();
        monitor.install();
        let hidden = ClientEvent::VisibilityChange { hidden: true };

        assert_eq!(monitor.observe(&hidden), Some(ViolationKind::VisibilityLost));
        assert_eq!(monitor.observe(&hidden), None);
        assert_eq!(monitor.observe(&ClientEvent::Copy), None);
        assert_eq!(monitor.state(), MonitorState::Tripped(ViolationKind::VisibilityLost));
        assert_eq!(monitor.suppressed(), 2);

        monitor.teardown();
        assert!(!monitor.is_listening());
    }

    #[test]
    fn test_monitor_silent_outside_lifecycle() {
        let mut monitor = IntegrityMonitor::new();
        assert_eq!(monitor.observe(&ClientEvent::WindowBlur), None);
        monitor.install();
        assert_eq!(monitor.observe(&key("x", false, false)), None);
        assert_eq!(monitor.state(), MonitorState::Armed);
        monitor.teardown();
        assert_eq!(monitor.observe(&ClientEvent::WindowBlur), None);
        monitor.install();
        assert_eq!(monitor.state(), MonitorState::Disarmed);
    }

    #[test]
    fn test_kind_string_roundtrip_and_wire_format() {
        for kind in ViolationKind::ALL {
            assert_eq!(kind.as_str().parse::<ViolationKind>(), Ok(kind));
        }
        let event: ClientEvent =
            serde_json::from_str(r#"{"type": "key_down", "combo": {"key": "u", "ctrl": true}}"#).unwrap();
        assert_eq!(classify(&event), Some(ViolationKind::RestrictedKey));
    }
}
