// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Engine configuration.
//!
//! # Example
//!
//! ```
//! use stay_booking_rs::EngineConfig;
//!
//! let config = EngineConfig::from_toml_str("cancellation_cutoff_days = 1").unwrap();
//! assert_eq!(config.cancellation_cutoff_days, Some(1));
//! assert!(config.reject_past_check_in);
//! ```

use crate::base::UserId;
use crate::error::ConfigError;
use crate::event::EventQueue;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Refuse bookings whose check-in is before today.
    pub reject_past_check_in: bool,
    /// When set to N, cancelling requires check-in to be more than N days ahead.
    pub cancellation_cutoff_days: Option<u32>,
    /// Largest capacity a listing may declare.
    pub max_guests_limit: u32,
    /// Actors allowed to end any confirmed stay before checkout.
    pub operators: Vec<UserId>,
    /// Events kept until drained; the oldest are dropped beyond this.
    pub event_capacity: usize,
}

impl EngineConfig {
    pub const DEFAULT_MAX_GUESTS: u32 = 50;

    pub fn is_operator(&self, actor: UserId) -> bool {
        self.operators.contains(&actor)
    }

    /// Parses a TOML document; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML or unknown value types.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if its contents are invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reject_past_check_in: true,
            cancellation_cutoff_days: None,
            max_guests_limit: Self::DEFAULT_MAX_GUESTS,
            operators: Vec::new(),
            event_capacity: EventQueue::DEFAULT_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn overrides_individual_keys() {
        let config = EngineConfig::from_toml_str(
            "reject_past_check_in = false\nmax_guests_limit = 12\n",
        )
        .unwrap();
        assert!(!config.reject_past_check_in);
        assert_eq!(config.max_guests_limit, 12);
        assert_eq!(config.cancellation_cutoff_days, None);
    }

    #[test]
    fn operators_are_listed_by_id() {
        let config = EngineConfig::from_toml_str("operators = [9, 12]\nevent_capacity = 64\n").unwrap();
        assert!(config.is_operator(UserId(9)));
        assert!(config.is_operator(UserId(12)));
        assert!(!config.is_operator(UserId(1)));
        assert_eq!(config.event_capacity, 64);
    }

    #[test]
    fn wrong_value_type_is_a_parse_error() {
        let result = EngineConfig::from_toml_str("max_guests_limit = \"many\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = EngineConfig::load("/nonexistent/stay-booking.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
