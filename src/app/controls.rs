//! User controls and the line commands that change them at runtime.
//!
//! Commands arrive one per line (from stdin in the binary):
//! `mode 2d|3d`, `debug on|off`, `scale <factor>`.

use std::str::FromStr;

use crate::config::{AvatarConfig, RenderMode};
use crate::error::ConfigError;

/// User controls, read fresh every tick
#[derive(Debug, Clone, PartialEq)]
pub struct Controls {
    pub mode: RenderMode,
    pub show_debug: bool,
    pub scale: f32,
}

impl Controls {
    pub fn from_config(config: &AvatarConfig) -> Self {
        Self {
            mode: config.mode,
            show_debug: config.show_debug,
            scale: config.scale,
        }
    }
}

impl Default for Controls {
    fn default() -> Self {
        Self::from_config(&AvatarConfig::default())
    }
}

/// A single runtime change to [`Controls`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlCommand {
    Mode(RenderMode),
    Debug(bool),
    Scale(f32),
}

impl FromStr for ControlCommand {
    type Err = ConfigError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let (Some(name), Some(value), None) = (words.next(), words.next(), words.next()) else {
            return Err(invalid("command", &format!("Expected '<control> <value>', got '{}'", line.trim())));
        };

        match name.to_lowercase().as_str() {
            "mode" => Ok(Self::Mode(value.parse()?)),
            "debug" => match value.to_lowercase().as_str() {
                "on" | "true" | "1" => Ok(Self::Debug(true)),
                "off" | "false" | "0" => Ok(Self::Debug(false)),
                _ => Err(invalid("debug", "Expected on or off")),
            },
            "scale" => match value.parse::<f32>() {
                Ok(scale) if scale.is_finite() && scale > 0.0 => Ok(Self::Scale(scale)),
                _ => Err(invalid("scale", "Scale must be a positive number")),
            },
            other => Err(invalid("command", &format!("Unknown control '{}'", other))),
        }
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}
