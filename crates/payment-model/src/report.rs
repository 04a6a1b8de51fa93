use std::fmt;

use crate::classify::Classifier;
use crate::payment::Payment;

pub const REPORT_TITLE: &str = "💸 💸 💸 Payment Report 💸 💸 💸";
pub const NOTHING_TO_REPORT: &str = "🕶  Nothing to report";
pub const NOTHING_FOR_TODAY: &str = "😎 Nothing for today";
pub const NOTHING_COMING_UP: &str = "😌 Nothing coming up";
pub const DEFAULT_WINDOW_DAYS: u32 = 2;

/// A sheet left out of the report. `reason` names the sheet itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetFailure {
    pub sheet: String,
    pub reason: String,
}

/// The assembled report: one line per section, in a fixed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    sections: Vec<String>,
}

impl Report {
    pub fn assemble(
        payments: &[Payment],
        classifier: &Classifier,
        window: u32,
        failures: &[SheetFailure],
    ) -> Self {
        let sections = [
            summarize_delayed(payments, classifier),
            Some(summarize_today(payments, classifier)),
            Some(summarize_coming_up(payments, classifier, window)),
            summarize_pending(payments, classifier, window),
            summarize_recurring(payments, classifier),
            summarize_failures(failures),
        ];
        Self::from_sections(sections.into_iter().flatten().collect())
    }

    pub fn from_sections(sections: Vec<String>) -> Self {
        Self { sections }
    }

    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn render(&self) -> String {
        if self.sections.is_empty() {
            NOTHING_TO_REPORT.to_string()
        } else {
            self.sections.join("\n")
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

pub fn summarize_delayed(payments: &[Payment], classifier: &Classifier) -> Option<String> {
    let delayed = classifier.find_until(payments, -1);
    if delayed.is_empty() {
        return None;
    }
    Some(format!("⚠ Delayed: {}", join_descriptions(&delayed)))
}

pub fn summarize_today(payments: &[Payment], classifier: &Classifier) -> String {
    let today = classifier.find_at(payments, 0);
    if today.is_empty() {
        return NOTHING_FOR_TODAY.to_string();
    }
    format!("💸 Today: {}", join_descriptions(&today))
}

pub fn summarize_coming_up(payments: &[Payment], classifier: &Classifier, window: u32) -> String {
    let coming_up = classifier.find_coming_up(payments, window);
    if coming_up.is_empty() {
        return NOTHING_COMING_UP.to_string();
    }
    let entries: Vec<String> = coming_up
        .iter()
        .filter_map(|p| {
            classifier
                .day_delta(p)
                .map(|days| format!("{} ({days}d)", p.description()))
        })
        .collect();
    format!("⏳ Coming Up: {}", entries.join(", "))
}

pub fn summarize_pending(payments: &[Payment], classifier: &Classifier, window: u32) -> Option<String> {
    match classifier.count_pending_within(payments, window) {
        0 => None,
        count => Some(format!("📌 Pending (≤{window}d): {count}")),
    }
}

pub fn summarize_recurring(payments: &[Payment], classifier: &Classifier) -> Option<String> {
    match classifier.count_undated(payments) {
        0 => None,
        count => Some(format!("🗓  Monthly: {count} pending")),
    }
}

pub fn summarize_failures(failures: &[SheetFailure]) -> Option<String> {
    if failures.is_empty() {
        return None;
    }
    let reasons: Vec<&str> = failures.iter().map(|f| f.reason.as_str()).collect();
    Some(format!("❌ Unreadable: {}", reasons.join("; ")))
}

fn join_descriptions(payments: &[&Payment]) -> String {
    payments
        .iter()
        .map(|p| p.description())
        .collect::<Vec<_>>()
        .join(", ")
}
