//! Matchable events for `expect` and FSM event lists.

use std::fmt;

use regex::bytes::Regex;

/// One item a session can wait for.
#[derive(Debug, Clone)]
pub enum Event {
    /// A regular expression searched in the incoming stream.
    Pattern(Regex),
    /// Nothing matched before the timeout expired.
    Timeout,
    /// The stream was closed.
    Eof,
}

impl Event {
    /// Compile a regular expression event.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Event::Pattern)
    }

    /// An event matching `text` literally.
    pub fn literal(text: &str) -> Result<Self, regex::Error> {
        Self::regex(&regex::escape(text))
    }

    /// An event that can never match.
    ///
    /// Used as the first entry of the previous-prompts list so the list is
    /// never empty.
    pub fn never() -> Result<Self, regex::Error> {
        Self::regex(r"(?-u:\b\B)")
    }

    /// The compiled pattern, if this is a pattern event.
    pub fn as_regex(&self) -> Option<&Regex> {
        match self {
            Event::Pattern(re) => Some(re),
            _ => None,
        }
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Event::Pattern(a), Event::Pattern(b)) => a.as_str() == b.as_str(),
            (Event::Timeout, Event::Timeout) | (Event::Eof, Event::Eof) => true,
            _ => false,
        }
    }
}

impl Eq for Event {}

impl From<Regex> for Event {
    fn from(re: Regex) -> Self {
        Event::Pattern(re)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Pattern(re) => write!(f, "{}", re.as_str()),
            Event::Timeout => write!(f, "TIMEOUT"),
            Event::Eof => write!(f, "EOF"),
        }
    }
}

/// Ordered list of distinct events.
///
/// The position of an event is the index reported by `expect` and used as
/// part of the FSM transition key.
#[derive(Debug, Clone, Default)]
pub struct EventList {
    events: Vec<Event>,
}

impl EventList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, returning its index. An event already present is
    /// not added twice.
    pub fn push(&mut self, event: Event) -> usize {
        match self.position(&event) {
            Some(index) => index,
            None => {
                self.events.push(event);
                self.events.len() - 1
            }
        }
    }

    /// Index of an event in the list.
    pub fn position(&self, event: &Event) -> Option<usize> {
        self.events.iter().position(|e| e == event)
    }

    /// Event at an index.
    pub fn get(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    /// Events as a slice, in order.
    pub fn as_slice(&self) -> &[Event] {
        &self.events
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl FromIterator<Event> for EventList {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        let mut list = EventList::new();
        list.extend(iter);
        list
    }
}

impl Extend<Event> for EventList {
    fn extend<I: IntoIterator<Item = Event>>(&mut self, iter: I) {
        for event in iter {
            self.push(event);
        }
    }
}
