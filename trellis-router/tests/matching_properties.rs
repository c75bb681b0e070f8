//! Property tests for template matching and selection.

use proptest::prelude::*;
use trellis_router::prelude::*;
use trellis_router::{Segment, UriTemplate};

fn literal() -> impl Strategy<Value = String> {
    "[a-z]{1,6}"
}

/// A template segment: literal text or a variable.
fn template_segment() -> impl Strategy<Value = (bool, String)> {
    (any::<bool>(), literal())
}

proptest! {
    /// Every literal segment of a matching template equals the path segment
    /// at the same position, and every variable captured a non-empty value.
    #[test]
    fn prop_match_respects_literals(
        segments in prop::collection::vec(template_segment(), 0..6),
        values in prop::collection::vec(literal(), 6),
    ) {
        let mut pattern = String::new();
        let mut path = String::new();
        for (i, (is_literal, text)) in segments.iter().enumerate() {
            if *is_literal {
                pattern.push_str(&format!("/{}", text));
                path.push_str(&format!("/{}", text));
            } else {
                pattern.push_str(&format!("/{{v{}}}", i));
                path.push_str(&format!("/{}", values[i]));
            }
        }

        let template = UriTemplate::parse(&pattern).unwrap();
        let vars = template.match_path(&path).expect("constructed path must match");
        let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        for (segment, value) in template.segments().iter().zip(&path_segments) {
            match segment {
                Segment::Literal(text) => {
                    prop_assert_eq!(text.as_str(), *value);
                }
                Segment::Variable(name) => {
                    let captured = vars.get(name).unwrap();
                    prop_assert!(!captured.is_empty());
                    prop_assert_eq!(captured, *value);
                }
                Segment::Wildcard(_) => unreachable!(),
            }
        }
        prop_assert_eq!(vars.len(), segments.iter().filter(|(l, _)| !*l).count());
    }

    /// A pattern with strictly more literal segments wins, all else equal.
    #[test]
    fn prop_more_literals_win(
        prefix in prop::collection::vec(literal(), 1..4),
        last in literal(),
    ) {
        let base = format!("/{}", prefix.join("/"));
        let table = RouteTable::builder()
            .route(RouteEntry::get(format!("{}/{{x}}", base), "variable"))
            .route(RouteEntry::get(format!("{}/{}", base, last), "literal"))
            .build()
            .unwrap();
        let router = Router::new(table, VersionResolver::default());
        let request = RequestHead::get(&format!("{}/{}", base, last));

        prop_assert_eq!(*router.route(&request).unwrap().target(), "literal");
        // Same answer every time
        prop_assert_eq!(*router.route(&request).unwrap().target(), "literal");
    }

    /// Version filtering never drops an unconstrained candidate.
    #[test]
    fn prop_unconstrained_survives_filter(version in proptest::option::of("[0-9]{1,2}(\\.[0-9])?")) {
        let table = RouteTable::builder()
            .route(RouteEntry::get("/r", "plain"))
            .route(RouteEntry::get("/r", "pinned").version("99"))
            .build()
            .unwrap();
        let resolver = VersionResolver::default();
        let request = match &version {
            Some(v) => RequestHead::get("/r").header("X-API-VERSION", v.clone()),
            None => RequestHead::get("/r"),
        };

        let candidates = trellis_router::RouteMatcher::new(&table).match_request(&request).collect();
        let requested = resolver.resolve(&request);
        let kept = resolver.filter(candidates, &requested);

        prop_assert!(kept.iter().any(|c| *c.entry.target() == "plain"));
    }
}
