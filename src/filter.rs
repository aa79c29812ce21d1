//! Record filtering for -e expressions
//!
//! Supports:
//! - Tags: -e tag=Auth,Input
//! - URL regex: -e url=/api\/v[0-9]/
//! - Transport kinds: -e kind=request,stream
//! - Methods: -e method=GET,POST
//!
//! Terms are separated by `;` and must all match.

use crate::error::{Result, SondaError};
use crate::record::{CapturedRequest, Tag, TransportKind};
use regex::Regex;
use std::collections::HashSet;

#[derive(Debug, Clone)]
enum Term {
    Tags(Vec<Tag>),
    Url(Regex),
    Kinds(HashSet<TransportKind>),
    Methods(HashSet<String>),
}

impl Term {
    fn matches(&self, record: &CapturedRequest) -> bool {
        match self {
            Term::Tags(tags) => tags.iter().any(|tag| record.tags.contains(*tag)),
            Term::Url(re) => re.is_match(&record.url),
            Term::Kinds(kinds) => kinds.contains(&record.transport_kind),
            Term::Methods(methods) => methods.contains(&record.method),
        }
    }
}

/// Filter that determines which records to show
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    /// Every term must match; empty matches everything
    terms: Vec<Term>,
}

impl RecordFilter {
    /// Create a filter that matches every record
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse an expression like "tag=Auth,Input;method=POST"
    pub fn from_expr(expr: &str) -> Result<Self> {
        let mut filter = Self::all();
        for part in expr.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            filter.terms.push(parse_term(part)?);
        }
        if filter.terms.is_empty() {
            return Err(SondaError::InvalidFilter(format!(
                "{:?}: expected KEY=VALUES",
                expr
            )));
        }
        Ok(filter)
    }

    /// Combine with another filter; both must match
    pub fn and(mut self, other: RecordFilter) -> Self {
        self.terms.extend(other.terms);
        self
    }

    pub fn is_all(&self) -> bool {
        self.terms.is_empty()
    }

    /// Check if a record passes the filter
    pub fn matches(&self, record: &CapturedRequest) -> bool {
        self.terms.iter().all(|term| term.matches(record))
    }
}

fn parse_term(term: &str) -> Result<Term> {
    let Some((key, value)) = term.split_once('=') else {
        return Err(SondaError::InvalidFilter(format!(
            "{}: expected KEY=VALUES",
            term
        )));
    };
    let value = value.trim();

    match key.trim() {
        "tag" => Ok(Term::Tags(parse_list(value, |tag| {
            tag.parse::<Tag>()
                .map_err(|_| SondaError::InvalidFilter(format!("unknown tag: {}", tag)))
        })?)),
        "url" => {
            let pattern = value
                .strip_prefix('/')
                .and_then(|rest| rest.strip_suffix('/'))
                .ok_or_else(|| {
                    SondaError::InvalidFilter(format!(
                        "url pattern must be written /regex/: {}",
                        value
                    ))
                })?;
            Ok(Term::Url(Regex::new(pattern)?))
        }
        "kind" => Ok(Term::Kinds(
            parse_list(value, |kind| {
                kind.parse::<TransportKind>()
                    .map_err(|_| SondaError::InvalidFilter(format!("unknown kind: {}", kind)))
            })?
            .into_iter()
            .collect(),
        )),
        "method" => Ok(Term::Methods(
            parse_list(value, |method| Ok(method.to_ascii_uppercase()))?
                .into_iter()
                .collect(),
        )),
        other => Err(SondaError::InvalidFilter(format!(
            "unknown filter key: {}",
            other
        ))),
    }
}

fn parse_list<T>(value: &str, parse: impl Fn(&str) -> Result<T>) -> Result<Vec<T>> {
    let items = value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(parse)
        .collect::<Result<Vec<T>>>()?;
    if items.is_empty() {
        return Err(SondaError::InvalidFilter(format!(
            "empty value list: {:?}",
            value
        )));
    }
    Ok(items)
}
