//! Audio device pickers.
//!
//! Builds the option lists shown in device pickers and turns a picked value
//! back into a typed selection for the facade.

use crate::config::ParticipantRole;
use std::fmt;

/// Disabled entry between real devices and the additional options.
pub const SEPARATOR_TEXT: &str = "──────────";

/// Placeholder shown when a picker has nothing to offer.
pub const UNAVAILABLE_TEXT: &str = "Device selection unavailable";

/// Picker value for "no microphone".
pub const NONE_OPTION: &str = "None";

/// Frequency of the synthesized test tone offered for microphones.
pub const TEST_TONE_HZ: u32 = 440;

/// A device reported by the facade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDevice {
    pub device_id: String,
    /// Empty until the user grants device permissions.
    pub label: String,
}

impl MediaDevice {
    pub fn new(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            label: label.into(),
        }
    }
}

/// Device class a picker lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    AudioInput,
    AudioOutput,
}

impl DeviceKind {
    /// Name used for devices without a label (`"<generic> <n>"`).
    #[must_use]
    pub fn generic_name(self) -> &'static str {
        match self {
            DeviceKind::AudioInput => "Microphone",
            DeviceKind::AudioOutput => "Speaker",
        }
    }

    /// Options listed after the real devices.
    #[must_use]
    pub fn additional_options(self) -> Vec<String> {
        match self {
            DeviceKind::AudioInput => vec![NONE_OPTION.to_string(), tone_label(TEST_TONE_HZ)],
            DeviceKind::AudioOutput => Vec::new(),
        }
    }
}

fn tone_label(hz: u32) -> String {
    format!("{hz} Hz")
}

/// One picker entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceOption {
    pub text: String,
    /// Value handed back on selection; `None` for entries that cannot be
    /// picked.
    pub value: Option<String>,
}

impl DeviceOption {
    fn selectable(text: String, value: String) -> Self {
        Self {
            text,
            value: Some(value),
        }
    }

    fn disabled(text: &str) -> Self {
        Self {
            text: text.to_string(),
            value: None,
        }
    }

    #[must_use]
    pub fn is_selectable(&self) -> bool {
        self.value.is_some()
    }
}

/// Build the option list for a picker.
#[must_use]
pub fn build_device_options(kind: DeviceKind, devices: &[MediaDevice]) -> Vec<DeviceOption> {
    let mut options: Vec<DeviceOption> = devices
        .iter()
        .enumerate()
        .map(|(i, device)| {
            let text = if device.label.is_empty() {
                format!("{} {}", kind.generic_name(), i + 1)
            } else {
                device.label.clone()
            };
            DeviceOption::selectable(text, device.device_id.clone())
        })
        .collect();

    let additional = kind.additional_options();
    if !additional.is_empty() {
        options.push(DeviceOption::disabled(SEPARATOR_TEXT));
        options.extend(
            additional
                .into_iter()
                .map(|option| DeviceOption::selectable(option.clone(), option)),
        );
    }

    if options.is_empty() {
        options.push(DeviceOption::disabled(UNAVAILABLE_TEXT));
    }
    options
}

/// Picker contents published to the rendering shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLists {
    pub audio_inputs: Vec<DeviceOption>,
    pub audio_outputs: Vec<DeviceOption>,
}

impl Default for DeviceLists {
    fn default() -> Self {
        Self::build(&[], &[])
    }
}

impl DeviceLists {
    #[must_use]
    pub fn build(inputs: &[MediaDevice], outputs: &[MediaDevice]) -> Self {
        Self {
            audio_inputs: build_device_options(DeviceKind::AudioInput, inputs),
            audio_outputs: build_device_options(DeviceKind::AudioOutput, outputs),
        }
    }
}

/// Microphone to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioInputSelection {
    /// The platform default device.
    Default,
    /// No microphone.
    None,
    /// A generated sine tone at the given frequency.
    SynthesizedTone(u32),
    Named(String),
}

impl AudioInputSelection {
    /// Interpret a picker value. Recorder and broadcaster never capture.
    #[must_use]
    pub fn from_picker(value: &str, role: ParticipantRole) -> Self {
        if !role.captures_audio() {
            return AudioInputSelection::None;
        }
        if value.is_empty() {
            return AudioInputSelection::Default;
        }
        if value == NONE_OPTION {
            return AudioInputSelection::None;
        }
        if let Some(hz) = value
            .strip_suffix(" Hz")
            .and_then(|n| n.trim().parse::<u32>().ok())
        {
            return AudioInputSelection::SynthesizedTone(hz);
        }
        AudioInputSelection::Named(value.to_string())
    }
}

impl fmt::Display for AudioInputSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioInputSelection::Default => f.write_str("default"),
            AudioInputSelection::None => f.write_str("none"),
            AudioInputSelection::SynthesizedTone(hz) => write!(f, "{hz} Hz tone"),
            AudioInputSelection::Named(id) => f.write_str(id),
        }
    }
}

/// Speaker to play the meeting audio through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioOutputSelection {
    Default,
    Named(String),
}

impl AudioOutputSelection {
    #[must_use]
    pub fn from_picker(value: &str) -> Self {
        if value.is_empty() {
            AudioOutputSelection::Default
        } else {
            AudioOutputSelection::Named(value.to_string())
        }
    }
}

impl fmt::Display for AudioOutputSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioOutputSelection::Default => f.write_str("default"),
            AudioOutputSelection::Named(id) => f.write_str(id),
        }
    }
}
