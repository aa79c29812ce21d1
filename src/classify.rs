//! Heuristic security tagging of captured requests
//!
//! Each rule inspects one part of a finalized record and may add one tag:
//!
//! | Tag        | Looks at                                   |
//! |------------|--------------------------------------------|
//! | Framework  | stack: framework and bundler names         |
//! | ThirdParty | stack: HTTP client libraries, ajax header  |
//! | State      | stack: state-management libraries          |
//! | Auth       | URL text: login, token, session, oauth ... |
//! | Input      | query keys, body `key=`, unsafe DOM sinks  |
//! | Error      | status >= 500, debug/trace flags in URL    |
//! | Transform  | URL text: export, report, data formats     |
//! | Events     | stack: event wiring, cross-window messages |
//! | Async      | race window verdict                        |
//! | Memory     | response size against threshold            |
//!
//! Rules are independent and only add. Findings are emitted afterwards in
//! [`Tag::ALL`] order, one fixed advisory per tag, so the advisory list is a
//! function of the tag set alone. Everything here is keyword matching: a
//! tag is a prompt for review, not a verdict.

use crate::config::CaptureConfig;
use crate::race::RaceCorrelator;
use crate::record::{CapturedRequest, SessionWindowEntry, Tag, TagSet};

const FRAMEWORK_KEYWORDS: &[&str] = &[
    "react", "angular", "vue", "svelte", "preact", "ember", "_next/", "nuxt", "webpack", "vite",
    "zone.js", "parcel", "rollup", "turbopack",
];

const HTTP_CLIENT_KEYWORDS: &[&str] = &[
    "axios", "jquery", "superagent", "ky/", "ofetch", "apollo", "graphql-request", "urql",
    "wretch", "reqwest", "hyper",
];

const STATE_KEYWORDS: &[&str] = &[
    "redux", "mobx", "vuex", "pinia", "zustand", "recoil", "ngrx", "jotai", "xstate",
    "react-query", "tanstack",
];

const AUTH_KEYWORDS: &[&str] = &[
    "login", "logout", "signin", "signup", "auth", "token", "session", "oauth", "sso", "password",
    "jwt", "saml", "2fa", "mfa", "credential",
];

/// Query/body keys that commonly carry attacker-controlled input
const DANGEROUS_KEYS: &[&str] = &[
    "redirect", "redirect_uri", "redirect_url", "return", "returnurl", "return_to", "next", "url",
    "uri", "callback", "cb", "continue", "dest", "destination", "target", "file", "path",
    "template", "html", "cmd", "exec", "jsonp", "q", "query", "search",
];

const UNSAFE_SINKS: &[&str] = &[
    "innerhtml", "outerhtml", "document.write", "insertadjacenthtml", "eval", "new function",
    "dangerouslysetinnerhtml", "v-html", "srcdoc",
];

const DEBUG_KEYS: &[&str] = &["debug", "trace", "verbose", "stacktrace", "dev", "test_mode"];

const DEBUG_URL_KEYWORDS: &[&str] = &["debug", "stacktrace", "__trace", "/trace/"];

const TRANSFORM_KEYWORDS: &[&str] = &[
    "export", "report", "download", "csv", "xlsx", "pdf", "xml", "json", "yaml", "format=",
    "convert", "render", "print",
];

const EVENT_KEYWORDS: &[&str] = &[
    "addeventlistener", "dispatchevent", "postmessage", "onmessage", "eventemitter", "emit",
    "handleevent", "onclick", "onsubmit", "onload",
];

/// Request header that marks ajax-style requests
const AJAX_HEADER: &str = "x-requested-with";

/// Advisory text contributed by a tag
pub fn finding(tag: Tag) -> &'static str {
    match tag {
        Tag::Framework => {
            "Framework: issued from framework/bundler code; check client-side routing and hydration endpoints"
        }
        Tag::ThirdParty => {
            "ThirdParty: issued through an HTTP client library; review its interceptors, defaults and credential handling"
        }
        Tag::State => {
            "State: driven by a state-management store; check for state injection and stale-state replay"
        }
        Tag::Auth => {
            "Auth: authentication/session endpoint; review token handling, CSRF protection and session fixation"
        }
        Tag::Input => {
            "Input: user-controllable parameter or unsafe sink; review for open redirect, SSRF and XSS"
        }
        Tag::Error => {
            "Error: server error or debug flag; look for stack traces and verbose error disclosure"
        }
        Tag::Transform => {
            "Transform: export/report/format endpoint; test for injection in generated files and IDOR on exports"
        }
        Tag::Events => {
            "Events: triggered from event wiring or cross-window messaging; verify postMessage origin checks"
        }
        Tag::Async => {
            "Async: identical request repeated within the race window; test for race conditions and double submission"
        }
        Tag::Memory => {
            "Memory: large response; check for over-fetching and missing pagination limits"
        }
    }
}

/// Race verdict handed to the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceSignal {
    /// An identical request completed within the window
    Repeated,
    Unique,
}

impl From<bool> for RaceSignal {
    fn from(repeated: bool) -> Self {
        if repeated {
            RaceSignal::Repeated
        } else {
            RaceSignal::Unique
        }
    }
}

/// Parts of the URL the rules look at
struct UrlView {
    /// Lower-cased raw URL text
    text: String,
    /// Decoded, lower-cased query parameter keys
    query_keys: Vec<String>,
}

impl UrlView {
    fn new(raw: &str) -> Self {
        let query_keys = match url::Url::parse(raw) {
            Ok(parsed) => parsed
                .query_pairs()
                .map(|(key, _)| key.to_lowercase())
                .collect(),
            Err(_) => raw
                .split_once('?')
                .map(|(_, query)| {
                    url::form_urlencoded::parse(query.as_bytes())
                        .map(|(key, _)| key.to_lowercase())
                        .collect::<Vec<String>>()
                })
                .unwrap_or_default(),
        };

        Self {
            text: raw.to_lowercase(),
            query_keys,
        }
    }

    fn has_key(&self, keys: &[&str]) -> bool {
        self.query_keys.iter().any(|key| keys.contains(&key.as_str()))
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// True when `body` has `key=` at the start or after a non-identifier char
fn body_has_key(body: &str, key: &str) -> bool {
    let needle = format!("{}=", key);
    body.match_indices(&needle).any(|(at, _)| {
        body[..at]
            .chars()
            .next_back()
            .map_or(true, |c| !(c.is_ascii_alphanumeric() || c == '_'))
    })
}

/// Stateless rule evaluator, parameterized by the thresholds it needs
#[derive(Debug, Clone)]
pub struct Classifier {
    large_response_kb: u64,
}

impl Classifier {
    pub fn new(large_response_kb: u64) -> Self {
        Self { large_response_kb }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(config.large_response_kb)
    }

    /// Tags a record would get, in rule order
    pub fn evaluate(&self, record: &CapturedRequest, race: RaceSignal) -> TagSet {
        let mut tags = TagSet::new();
        let stack = record
            .stack_trace
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        let url = UrlView::new(&record.url);
        let body = record.request_body_preview.to_lowercase();

        if contains_any(&stack, FRAMEWORK_KEYWORDS) {
            tags.insert(Tag::Framework);
        }

        let ajax = record
            .request_headers
            .iter()
            .any(|(name, value)| {
                name.eq_ignore_ascii_case(AJAX_HEADER)
                    && value.eq_ignore_ascii_case("xmlhttprequest")
            });
        if ajax || contains_any(&stack, HTTP_CLIENT_KEYWORDS) {
            tags.insert(Tag::ThirdParty);
        }

        if contains_any(&stack, STATE_KEYWORDS) {
            tags.insert(Tag::State);
        }

        if contains_any(&url.text, AUTH_KEYWORDS) {
            tags.insert(Tag::Auth);
        }

        if url.has_key(DANGEROUS_KEYS)
            || DANGEROUS_KEYS.iter().any(|key| body_has_key(&body, key))
            || contains_any(&stack, UNSAFE_SINKS)
        {
            tags.insert(Tag::Input);
        }

        if record.status >= 500
            || url.has_key(DEBUG_KEYS)
            || contains_any(&url.text, DEBUG_URL_KEYWORDS)
        {
            tags.insert(Tag::Error);
        }

        if contains_any(&url.text, TRANSFORM_KEYWORDS) {
            tags.insert(Tag::Transform);
        }

        if contains_any(&stack, EVENT_KEYWORDS) {
            tags.insert(Tag::Events);
        }

        if race == RaceSignal::Repeated {
            tags.insert(Tag::Async);
        }

        if record.response_kb() >= self.large_response_kb as f64 {
            tags.insert(Tag::Memory);
        }

        tags
    }

    /// Replace the record's tags and findings with a fresh evaluation
    pub fn classify(&self, record: &mut CapturedRequest, race: RaceSignal) {
        let tags = self.evaluate(record, race);
        record.findings = Tag::ALL
            .into_iter()
            .filter(|tag| tags.contains(*tag))
            .map(|tag| finding(tag).to_string())
            .collect();
        record.tags = tags;
    }

    /// Classify against a race window, then record the request in it
    ///
    /// The record's completion instant is both the eviction reference and
    /// the time the new window entry is stamped with.
    pub fn classify_with_window(&self, record: &mut CapturedRequest, window: &mut RaceCorrelator) {
        let now = record.completed_at();
        let repeated = window.seen_within_window(now, &record.url, &record.method);
        self.classify(record, repeated.into());
        window.observe(SessionWindowEntry::from_record(record, now));
    }
}

/// Re-classify an imported log from scratch, in log order
///
/// Message entries keep their event tagging and stay out of the window.
pub fn replay(records: &mut [CapturedRequest], config: &CaptureConfig) {
    let classifier = Classifier::from_config(config);
    let mut window = RaceCorrelator::new(config.race_window_ms);

    for record in records.iter_mut().filter(|r| !r.is_message()) {
        record.reset_classification();
        classifier.classify_with_window(record, &mut window);
    }
}
