//! Pure SOS alert logic with no platform dependencies.
//! Every operation takes the current time in milliseconds from the caller,
//! so the whole lifecycle is testable on host without real timers.

mod hold;
mod machine;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use hold::HoldDetector;
pub use machine::{AlertMachine, CloseReason, Effect};

pub const DEFAULT_COUNTDOWN_SECS: u32 = 5;
pub const DEFAULT_TICK_MS: u64 = 1000;
pub const DEFAULT_CONFIRMATION_MS: u64 = 5000;
pub const DEFAULT_LOCATION_POLL_MS: u64 = 30_000;
pub const DEFAULT_LONG_PRESS_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlertError {
    #[error("No emergency contacts found! Please add contacts first.")]
    NoEmergencyContacts,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AlertState {
    Idle,
    Arming,
    Dispatching,
    Cooldown,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Best known location of a session. `Unavailable` is a real value,
/// never a stand-in coordinate.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Location {
    Known(Position),
    Unavailable,
}

impl Location {
    pub fn position(&self) -> Option<Position> {
        match self {
            Location::Known(p) => Some(*p),
            Location::Unavailable => None,
        }
    }

    /// Link suitable for a text message, or the unavailable marker.
    pub fn map_link(&self) -> String {
        match self {
            Location::Known(p) => map_link(p),
            Location::Unavailable => UNAVAILABLE_MARKER.to_string(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Known(p) => f.write_str(&format_coordinates(p)),
            Location::Unavailable => f.write_str(UNAVAILABLE_MARKER),
        }
    }
}

pub const UNAVAILABLE_MARKER: &str = "Unable to determine location";

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    #[serde(alias = "phone_number")]
    pub phone: String,
}

/// Read-only snapshot of the signed-in user, supplied fresh by the caller
/// on every operation that needs it.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub emergency_contacts: Vec<EmergencyContact>,
}

impl User {
    pub fn name_or_default(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => "User",
        }
    }

    pub fn has_contacts(&self) -> bool {
        !self.emergency_contacts.is_empty()
    }
}

/// Transient record of one emergency trigger.
#[derive(Clone, PartialEq, Debug)]
pub struct AlertSession {
    pub id: SessionId,
    pub countdown_remaining: u32,
    pub started_at_ms: u64,
    pub last_known: Location,
    pub state: AlertState,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Timings {
    pub countdown_secs: u32,
    pub tick_ms: u64,
    pub confirmation_ms: u64,
    pub location_poll_ms: u64,
    pub long_press_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            countdown_secs: DEFAULT_COUNTDOWN_SECS,
            tick_ms: DEFAULT_TICK_MS,
            confirmation_ms: DEFAULT_CONFIRMATION_MS,
            location_poll_ms: DEFAULT_LOCATION_POLL_MS,
            long_press_ms: DEFAULT_LONG_PRESS_MS,
        }
    }
}

/// Format a position as "lat, lng" with 6 decimals
pub fn format_coordinates(p: &Position) -> String {
    format!("{:.6}, {:.6}", p.latitude, p.longitude)
}

/// Map link with 6-decimal coordinates
pub fn map_link(p: &Position) -> String {
    format!("https://maps.google.com/?q={:.6},{:.6}", p.latitude, p.longitude)
}

/// Format remaining countdown seconds as "Ns"
pub fn format_countdown(secs: u32) -> String {
    format!("{}s", secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_coordinates() {
        let p = Position::new(37.7749, -122.4194);
        assert_eq!(format_coordinates(&p), "37.774900, -122.419400");
    }

    #[test]
    fn test_map_link() {
        let p = Position::new(37.7749, -122.4194);
        assert_eq!(map_link(&p), "https://maps.google.com/?q=37.774900,-122.419400");
    }

    #[test]
    fn test_unavailable_is_distinct() {
        let loc = Location::Unavailable;
        assert_eq!(loc.position(), None);
        assert_eq!(loc.to_string(), UNAVAILABLE_MARKER);
        assert_eq!(loc.map_link(), UNAVAILABLE_MARKER);
        assert!(!loc.map_link().contains("0.000000"));
    }

    #[test]
    fn test_user_name_fallback() {
        let mut user = User::default();
        assert_eq!(user.name_or_default(), "User");
        user.display_name = Some("  ".into());
        assert_eq!(user.name_or_default(), "User");
        user.display_name = Some("Asha".into());
        assert_eq!(user.name_or_default(), "Asha");
    }

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(5), "5s");
        assert_eq!(format_countdown(0), "0s");
    }
}
