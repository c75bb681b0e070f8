//! Choosing one route among several candidates
//!
//! Tie-break rules, applied in order until one candidate remains:
//!
//! 1. most literal segments
//! 2. most specific `consumes` match for the request `Content-Type`
//! 3. best `produces` match for the request `Accept` header, by quality
//!    then by specificity
//!
//! Candidates still tied after the last rule are reported as ambiguous.
//! Neither registration order nor a declared version constraint breaks a
//! tie.

use crate::error::RouteError;
use crate::matcher::MatchResult;
use crate::media::{match_rank, Accept, MediaType, Quality};
use crate::request::RequestHead;
use tracing::{debug, trace};

/// Picks the best candidate for a request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteSelector;

impl RouteSelector {
    pub fn new() -> Self {
        Self
    }

    /// Select exactly one candidate.
    ///
    /// Returns `NotFound` for an empty pool and `Ambiguous` when the rules
    /// leave more than one candidate.
    pub fn select<'t, T>(
        &self,
        candidates: Vec<MatchResult<'t, T>>,
        request: &RequestHead,
    ) -> Result<MatchResult<'t, T>, RouteError> {
        if candidates.is_empty() {
            return Err(RouteError::NotFound(request.path.clone()));
        }

        let mut pool = retain_max_by_key(candidates, |c| c.specificity);
        trace!(remaining = pool.len(), "After specificity");

        if pool.len() > 1
            && let Some(content_type) = request.content_type()
        {
            pool = retain_max_by_key(pool, |c| consumes_score(c.entry.consumes_types(), &content_type));
            trace!(remaining = pool.len(), "After consumes negotiation");
        }

        if pool.len() > 1 {
            let accept = request.accept();
            pool = retain_max_by_key(pool, |c| produces_score(c.entry.produces_types(), &accept));
            trace!(remaining = pool.len(), "After produces negotiation");
        }

        if pool.len() > 1 {
            let candidates: Vec<String> = pool.iter().map(|c| c.entry.to_string()).collect();
            debug!(path = %request.path, ?candidates, "Ambiguous route");
            return Err(RouteError::Ambiguous {
                path: request.path.clone(),
                candidates,
            });
        }

        pool.pop()
            .ok_or_else(|| RouteError::NotFound(request.path.clone()))
    }
}

/// Keep every item sharing the maximum key, in their original order.
fn retain_max_by_key<I, K, F>(items: Vec<I>, key: F) -> Vec<I>
where
    K: Ord + Copy,
    F: Fn(&I) -> K,
{
    let Some(best) = items.iter().map(&key).max() else {
        return items;
    };
    items.into_iter().filter(|item| key(item) == best).collect()
}

/// Rank of the route's consumed types against the request content type.
/// Routes that declare none take anything, at the lowest rank.
fn consumes_score(declared: &[MediaType], content_type: &MediaType) -> u8 {
    if declared.is_empty() {
        return 1;
    }
    declared
        .iter()
        .map(|d| match_rank(d, content_type))
        .max()
        .unwrap_or(0)
}

/// (accept quality, declared specificity) of the best produced type.
/// Routes that declare none produce `*/*`.
fn produces_score(declared: &[MediaType], accept: &Accept) -> (Quality, u8) {
    if declared.is_empty() {
        return (accept.quality(&MediaType::any()), 1);
    }
    declared
        .iter()
        .map(|d| {
            let quality = accept.quality(d);
            (quality, if quality > 0 { d.specificity() } else { 0 })
        })
        .max()
        .unwrap_or((0, 0))
}
