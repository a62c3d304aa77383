//! Run event logging for the generator pipeline.
//!
//! Every pass appends to the [`EventLog`] owned by the
//! [`AppContext`](crate::AppContext): injected members, recovered and
//! translated bodies, fallbacks to the ABI bridge, synthesized helpers and
//! the plain info/warning/error diagnostics. Statistics are derived from the
//! log rather than tracked separately.
//!
//! # Example
//!
//! ```rust,ignore
//! use il2cpp_bridge::compiler::{EventLog, EventKind};
//!
//! let log = EventLog::new();
//! log.record(EventKind::TranslationFallback)
//!     .method(method)
//!     .message("ldftn is not supported");
//! println!("{}", log.summary());
//! ```

use std::{collections::HashMap, fmt};

use crate::model::MethodId;

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A synthetic type was injected.
    TypeInjected,
    /// A synthetic method was injected.
    MethodInjected,
    /// A synthetic field was injected.
    FieldInjected,
    /// A synthetic property was injected.
    PropertyInjected,
    /// A field was removed from its declaring type.
    FieldRemoved,
    /// An original method body was recovered into the instruction model.
    BodyRecovered,
    /// A recovered body was translated instruction by instruction.
    BodyTranslated,
    /// Translation hit an unsupported construct; the bridge takes over.
    TranslationFallback,
    /// An ABI bridge body was synthesized.
    BridgeSynthesized,
    /// A per-arity invoke helper was synthesized.
    HelperSynthesized,
    /// A method handle had to be looked up by signature text.
    TokenlessLookup,

    /// A pass started.
    PassStarted,
    /// A pass completed.
    PassCompleted,

    /// Informational message.
    Info,
    /// Warning (something unexpected but recoverable).
    Warning,
    /// Error (something failed).
    Error,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::TypeInjected => "type injected",
            Self::MethodInjected => "method injected",
            Self::FieldInjected => "field injected",
            Self::PropertyInjected => "property injected",
            Self::FieldRemoved => "field removed",
            Self::BodyRecovered => "body recovered",
            Self::BodyTranslated => "body translated",
            Self::TranslationFallback => "translation fallback",
            Self::BridgeSynthesized => "bridge synthesized",
            Self::HelperSynthesized => "helper synthesized",
            Self::TokenlessLookup => "tokenless lookup",
            Self::PassStarted => "pass started",
            Self::PassCompleted => "pass completed",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Returns true if this event changed the arena.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(
            self,
            Self::TypeInjected
                | Self::MethodInjected
                | Self::FieldInjected
                | Self::PropertyInjected
                | Self::FieldRemoved
                | Self::BodyRecovered
                | Self::BodyTranslated
                | Self::BridgeSynthesized
                | Self::HelperSynthesized
        )
    }

    /// Returns true if this is a diagnostic event (info/warning/error).
    #[must_use]
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Self::Info | Self::Warning | Self::Error)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single logged event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// The method the event concerns (if applicable).
    pub method: Option<MethodId>,
    /// Human-readable description.
    pub message: String,
    /// Associated pass name (if from a pass).
    pub pass: Option<String>,
}

impl Event {
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            method: None,
            message: message.into(),
            pass: None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is added to the log when the
/// builder is dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    method: Option<MethodId>,
    message: Option<String>,
    pass: Option<String>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            method: None,
            message: None,
            pass: None,
        }
    }

    /// Sets the method the event concerns.
    pub fn method(mut self, method: MethodId) -> Self {
        self.method = Some(method);
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Associates this event with a specific pass.
    pub fn pass(mut self, pass_name: impl Into<String>) -> Self {
        self.pass = Some(pass_name.into());
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        self.log.events.push(Event {
            kind: self.kind,
            method: self.method.take(),
            message,
            pass: self.pass.take(),
        });
    }
}

/// Append-only collection of run events.
///
/// Events can be appended through shared references, so passes that only
/// read the arena can still report.
#[derive(Debug)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        let new_log = Self::new();
        for (_, event) in &self.events {
            new_log.events.push(event.clone());
        }
        new_log
    }
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }

    /// Returns true if no events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Returns the total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts building a new event of the given kind.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Records an informational message.
    pub fn info(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Info, message));
    }

    /// Records a warning message.
    pub fn warn(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Warning, message));
    }

    /// Records an error message.
    pub fn error(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Error, message));
    }

    /// Returns true if any event of the given kind exists.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.events.iter().any(|(_, e)| e.kind == kind)
    }

    /// Counts events of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|(_, e)| e.kind == kind).count()
    }

    /// Returns an iterator over all events.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Returns an iterator over events of a specific kind.
    pub fn filter_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> + '_ {
        self.events
            .iter()
            .filter_map(move |(_, e)| if e.kind == kind { Some(e) } else { None })
    }

    /// Returns an iterator over events for a specific method.
    pub fn filter_method(&self, method: MethodId) -> impl Iterator<Item = &Event> + '_ {
        self.events.iter().filter_map(move |(_, e)| {
            if e.method == Some(method) {
                Some(e)
            } else {
                None
            }
        })
    }

    /// Returns an iterator over warning events.
    pub fn warnings(&self) -> impl Iterator<Item = &Event> + '_ {
        self.filter_kind(EventKind::Warning)
    }

    /// Returns an iterator over error events.
    pub fn errors(&self) -> impl Iterator<Item = &Event> + '_ {
        self.filter_kind(EventKind::Error)
    }

    /// Counts events grouped by kind.
    #[must_use]
    pub fn count_by_kind(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::new();
        for (_, event) in &self.events {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Generates a human-readable summary of all transformation events.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let mut parts: Vec<String> = self
            .count_by_kind()
            .iter()
            .filter(|(k, _)| k.is_transformation())
            .map(|(kind, count)| format!("{} {}", count, kind.description()))
            .collect();

        if parts.is_empty() {
            return format!("{} events", self.len());
        }

        parts.sort();
        parts.join(", ")
    }
}

/// Statistics derived from an [`EventLog`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedStats {
    /// Bodies translated instruction by instruction.
    pub translations: usize,
    /// Translation attempts that fell back to the bridge.
    pub fallbacks: usize,
    /// Bridge bodies synthesized.
    pub bridge_bodies: usize,
    /// Per-arity invoke helpers synthesized.
    pub helpers_created: usize,
    /// Method handles looked up by signature text.
    pub tokenless_lookups: usize,
    /// Types, methods, fields and properties injected.
    pub injected_members: usize,
    /// Number of warnings.
    pub warnings: usize,
    /// Number of errors.
    pub errors: usize,
}

impl DerivedStats {
    /// Computes statistics from an event log.
    #[must_use]
    pub fn from_log(log: &EventLog) -> Self {
        let counts = log.count_by_kind();
        let get = |kind: EventKind| counts.get(&kind).copied().unwrap_or(0);

        Self {
            translations: get(EventKind::BodyTranslated),
            fallbacks: get(EventKind::TranslationFallback),
            bridge_bodies: get(EventKind::BridgeSynthesized),
            helpers_created: get(EventKind::HelperSynthesized),
            tokenless_lookups: get(EventKind::TokenlessLookup),
            injected_members: get(EventKind::TypeInjected)
                + get(EventKind::MethodInjected)
                + get(EventKind::FieldInjected)
                + get(EventKind::PropertyInjected),
            warnings: get(EventKind::Warning),
            errors: get(EventKind::Error),
        }
    }

    /// Generates a human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if self.translations > 0 || self.fallbacks > 0 {
            parts.push(format!(
                "{}/{} translated",
                self.translations,
                self.translations + self.fallbacks
            ));
        }
        if self.bridge_bodies > 0 {
            parts.push(format!("{} bridged", self.bridge_bodies));
        }
        if self.helpers_created > 0 {
            parts.push(format!("{} helpers", self.helpers_created));
        }
        if self.tokenless_lookups > 0 {
            parts.push(format!("{} tokenless", self.tokenless_lookups));
        }
        if self.injected_members > 0 {
            parts.push(format!("{} injected", self.injected_members));
        }
        if self.errors > 0 {
            parts.push(format!("{} errors", self.errors));
        }
        if self.warnings > 0 {
            parts.push(format!("{} warnings", self.warnings));
        }

        if parts.is_empty() {
            "no transformations".to_string()
        } else {
            parts.join(", ")
        }
    }
}

impl fmt::Display for DerivedStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_log() {
        let log = EventLog::new();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
        assert_eq!(log.summary(), "no events");
    }

    #[test]
    fn test_record_event() {
        let log = EventLog::new();
        let method = MethodId::from_index(3);

        log.record(EventKind::TranslationFallback)
            .method(method)
            .pass("method_body_translation")
            .message("ldftn is not supported");

        assert_eq!(log.len(), 1);
        let event = log.iter().next().unwrap();
        assert_eq!(event.method, Some(method));
        assert_eq!(event.pass.as_deref(), Some("method_body_translation"));
        assert_eq!(event.message, "ldftn is not supported");
        assert_eq!(log.filter_method(method).count(), 1);
        assert_eq!(log.filter_method(MethodId::from_index(4)).count(), 0);
    }

    #[test]
    fn test_default_message_is_description() {
        let log = EventLog::new();
        log.record(EventKind::HelperSynthesized);
        assert_eq!(log.iter().next().unwrap().message, "helper synthesized");
    }

    #[test]
    fn test_info_warn_error() {
        let log = EventLog::new();
        log.info("informational message");
        log.warn("warning message");
        log.error("error message");

        assert_eq!(log.count_kind(EventKind::Info), 1);
        assert_eq!(log.warnings().count(), 1);
        assert_eq!(log.errors().count(), 1);
        assert_eq!(log.summary(), "3 events");
    }

    #[test]
    fn test_derived_stats() {
        let log = EventLog::new();
        log.record(EventKind::BodyTranslated);
        log.record(EventKind::BodyTranslated);
        log.record(EventKind::TranslationFallback);
        log.record(EventKind::BridgeSynthesized);
        log.record(EventKind::TypeInjected);
        log.record(EventKind::MethodInjected);
        log.warn("no companion assemblies");

        let stats = DerivedStats::from_log(&log);
        assert_eq!(stats.translations, 2);
        assert_eq!(stats.fallbacks, 1);
        assert_eq!(stats.bridge_bodies, 1);
        assert_eq!(stats.injected_members, 2);
        assert_eq!(stats.warnings, 1);
        assert_eq!(
            stats.to_string(),
            "2/3 translated, 1 bridged, 2 injected, 1 warnings"
        );
    }

    #[test]
    fn test_clone_preserves_events() {
        let log = EventLog::new();
        log.record(EventKind::TokenlessLookup).message("Foo::Bar");
        let copy = log.clone();
        assert_eq!(copy.len(), 1);
        assert!(copy.has(EventKind::TokenlessLookup));
    }
}
