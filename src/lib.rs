// BagCrab - GPL-3.0-or-later
// This file is part of BagCrab.
//
// Copyright (C) 2026 Daniel Freiermuth
//
// BagCrab is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// BagCrab is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with BagCrab.  If not, see <https://www.gnu.org/licenses/>.

//! Reconstructs per-bag journeys from the logs of an airport baggage
//! screening line.
//!
//! Scanner, OMS and conveyor (PLC) logs are normalized into a shared event
//! record, grouped per bag or tray, cut into journeys at long pauses and
//! paired across systems. Each journey gets an outcome derived from its
//! events by a fixed precedence (see [`journey::outcome`]).

pub mod config;
pub mod core;
pub mod export;
pub mod journey;
pub mod parser;

pub use config::AnalysisConfig;
pub use core::{LoadError, LoadReport, LogFileLoader};
pub use journey::{consolidate, Consolidation, Journey, JourneyKey, SegmentationConfig};
pub use parser::{Identifier, LogFormat, NormalizedEvent, Source};
