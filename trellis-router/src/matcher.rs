// Structural matching of requests against the route table

use crate::pattern::{split_path, PathVariables, INLINE_SEGMENT_COUNT};
use crate::request::RequestHead;
use crate::route::{RouteEntry, RouteTable};
use crate::HttpMethod;
use smallvec::SmallVec;

/// A route whose method and pattern match a request.
#[derive(Debug)]
pub struct MatchResult<'t, T> {
    pub entry: &'t RouteEntry<T>,
    pub path_variables: PathVariables,
    /// Literal segments in the matched pattern.
    pub specificity: usize,
}

impl<T> Clone for MatchResult<'_, T> {
    fn clone(&self) -> Self {
        Self {
            entry: self.entry,
            path_variables: self.path_variables.clone(),
            specificity: self.specificity,
        }
    }
}

/// Matches requests against a route table.
///
/// Matching never mutates the table; the same inputs always produce the
/// same candidates, in registration order.
#[derive(Debug)]
pub struct RouteMatcher<'t, T> {
    table: &'t RouteTable<T>,
}

impl<T> Clone for RouteMatcher<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for RouteMatcher<'_, T> {}

impl<'t, T> RouteMatcher<'t, T> {
    pub fn new(table: &'t RouteTable<T>) -> Self {
        Self { table }
    }

    /// Candidates for a method and path.
    pub fn matches<'p>(&self, method: HttpMethod, path: &'p str) -> Matches<'t, 'p, T> {
        Matches {
            entries: self.table.iter(),
            method,
            segments: split_path(path),
        }
    }

    /// Candidates for a request.
    pub fn match_request<'p>(&self, request: &'p RequestHead) -> Matches<'t, 'p, T> {
        self.matches(request.method, &request.path)
    }

    /// Distinct methods of routes whose pattern matches `path`, in
    /// registration order.
    pub fn allowed_methods(&self, path: &str) -> Vec<HttpMethod> {
        let segments = split_path(path);
        let mut methods = Vec::new();
        for entry in self.table {
            if !methods.contains(&entry.http_method())
                && entry.template().is_structural_match(&segments)
            {
                methods.push(entry.http_method());
            }
        }
        methods
    }
}

/// Lazy iterator over the candidates of one request.
#[derive(Debug)]
pub struct Matches<'t, 'p, T> {
    entries: std::slice::Iter<'t, RouteEntry<T>>,
    method: HttpMethod,
    segments: SmallVec<[&'p str; INLINE_SEGMENT_COUNT]>,
}

impl<'t, T> Iterator for Matches<'t, '_, T> {
    type Item = MatchResult<'t, T>;

    fn next(&mut self) -> Option<Self::Item> {
        for entry in self.entries.by_ref() {
            if entry.http_method() != self.method {
                continue;
            }
            if let Some(path_variables) = entry.template().match_segments(&self.segments) {
                return Some(MatchResult {
                    entry,
                    path_variables,
                    specificity: entry.specificity(),
                });
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.entries.len()))
    }
}
