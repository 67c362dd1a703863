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

//! Ordered pattern tables used by the dialect normalizers.
//!
//! Each dialect describes its vocabulary as a list of `(matcher, constructor)`
//! pairs. The first matcher that fires decides the outcome for a line, even if
//! its constructor then declines to build an event.

use super::event::Identifier;
use fancy_regex::{Captures, Regex};

/// The semantic part of a line, before timestamp and source are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub bag_id: Identifier,
    pub tray_id: Identifier,
    pub free_text: String,
}

impl Classified {
    pub const fn new(bag_id: Identifier, tray_id: Identifier, free_text: String) -> Self {
        Self {
            bag_id,
            tray_id,
            free_text,
        }
    }
}

pub type Constructor<T> = fn(&Captures<'_>) -> Option<T>;

pub struct Rule<T = Classified> {
    matcher: Regex,
    build: Constructor<T>,
}

impl<T> Rule<T> {
    /// Compile a rule. Patterns are string literals owned by the dialect modules.
    pub fn new(pattern: &str, build: Constructor<T>) -> Self {
        Self {
            matcher: Regex::new(pattern).expect("valid regex literal"),
            build,
        }
    }
}

pub struct RuleTable<T = Classified> {
    rules: Vec<Rule<T>>,
}

impl<T> RuleTable<T> {
    pub const fn new(rules: Vec<Rule<T>>) -> Self {
        Self { rules }
    }

    /// Classify a message body. `None` means the line is not part of any journey.
    pub fn classify(&self, text: &str) -> Option<T> {
        for rule in &self.rules {
            match rule.matcher.captures(text) {
                Ok(Some(caps)) => return (rule.build)(&caps),
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!("Rule evaluation failed on {text:?}: {e}");
                }
            }
        }
        None
    }

    /// Whether any rule fires, regardless of what its constructor decides.
    pub fn recognizes(&self, text: &str) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.matcher.is_match(text).unwrap_or(false))
    }
}

/// Text of a named group, or an empty string if the group did not participate.
pub fn group<'t>(caps: &Captures<'t>, name: &str) -> &'t str {
    caps.name(name).map_or("", |m| m.as_str())
}

/// The complete text matched by the rule.
pub fn whole<'t>(caps: &Captures<'t>) -> &'t str {
    caps.get(0).map_or("", |m| m.as_str())
}

/// Named group interpreted as an identifier token.
pub fn identifier(caps: &Captures<'_>, name: &str) -> Identifier {
    Identifier::parse(group(caps, name))
}
