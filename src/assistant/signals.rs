// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Advisory keyword signals for plain-text replies.

use once_cell::sync::Lazy;
use regex::Regex;

static BOOKING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(book|booking|booked|reserve|reservation|appointment|schedule a)\b").unwrap()
});

static PRICING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(price|prices|pricing|cost|costs|fare|fares|how much|rates?)\b").unwrap()
});

const BOOKING_SUGGESTIONS: &[&str] = &["Book now", "Check availability", "See other options"];
const PRICING_SUGGESTIONS: &[&str] = &["Compare prices", "Show cheapest option", "Find deals nearby"];
const DEFAULT_SUGGESTIONS: &[&str] = &["Find businesses nearby", "Show my whistles", "Create a whistle"];

/// Keyword signals found in a reply or the user's message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signals {
    pub booking: bool,
    pub pricing: bool,
}

impl Signals {
    /// Detect signals in either text.
    pub fn detect(reply: &str, user_message: &str) -> Self {
        let either = |re: &Regex| re.is_match(reply) || re.is_match(user_message);
        Self {
            booking: either(&BOOKING),
            pricing: either(&PRICING),
        }
    }

    /// Follow-up suggestions. Booking takes priority over pricing.
    pub fn suggestions(&self) -> Vec<String> {
        let set = if self.booking {
            BOOKING_SUGGESTIONS
        } else if self.pricing {
            PRICING_SUGGESTIONS
        } else {
            DEFAULT_SUGGESTIONS
        };
        set.iter().map(|s| s.to_string()).collect()
    }
}
