use std::sync::Arc;
use std::thread;
use trellis_router::prelude::*;
use trellis_router::{MediaType, RouteMatcher};

fn api_table() -> RouteTable<&'static str> {
    RouteTable::builder()
        .route(RouteEntry::get("/users", "users.list").produces("application/json"))
        .route(RouteEntry::post("/users", "users.create").consumes("application/json"))
        .route(RouteEntry::get("/users/{id}", "users.show").produces("application/json"))
        .route(
            RouteEntry::get("/users/{id}", "users.show_v2")
                .produces("application/json")
                .version(">=2"),
        )
        .route(RouteEntry::get("/users/{id}", "users.page").produces("text/html"))
        .route(RouteEntry::get("/users/me", "users.me"))
        .route(RouteEntry::get("/assets/{*path}", "assets"))
        .build()
        .unwrap()
}

#[test]
fn test_path_parameter() {
    let router = Router::new(api_table(), VersionResolver::default());

    let matched = router
        .route(&RequestHead::get("/users/42").header("Accept", "application/json"))
        .unwrap();

    assert_eq!(*matched.target(), "users.show");
    assert_eq!(matched.path_variable("id"), Some("42"));
    assert_eq!(matched.entry.specificity(), 1);
}

#[test]
fn test_literal_route_preferred() {
    let router = Router::new(api_table(), VersionResolver::default());

    let matched = router.route(&RequestHead::get("/users/me")).unwrap();
    assert_eq!(*matched.target(), "users.me");
    assert!(matched.path_variables.is_empty());
}

#[test]
fn test_accept_header_picks_representation() {
    let router = Router::new(api_table(), VersionResolver::default());

    let html = router
        .route(&RequestHead::get("/users/7").header("Accept", "text/html, */*;q=0.1"))
        .unwrap();
    assert_eq!(*html.target(), "users.page");

    // No Accept header leaves json and html equally acceptable
    let err = router.route(&RequestHead::get("/users/7")).unwrap_err();
    assert!(matches!(err, RouteError::Ambiguous { ref candidates, .. } if candidates.len() == 2));
    assert_eq!(err.status_code(), 500);
}

#[test]
fn test_version_range_route() {
    let table = RouteTable::builder()
        .route(RouteEntry::get("/users/{id}", "users.show_v1").version("<=1"))
        .route(RouteEntry::get("/users/{id}", "users.show_v2").version(">=2"))
        .build()
        .unwrap();
    let router = Router::new(table, VersionResolver::default());

    for version in ["2", "2.1", "v3"] {
        let request = RequestHead::get("/users/7").header("X-API-VERSION", version);
        let matched = router.route(&request).unwrap();
        assert_eq!(*matched.target(), "users.show_v2", "version {version}");
        assert_eq!(matched.version, VersionRequest::of(version));
    }

    let request = RequestHead::get("/users/7?api-version=1");
    assert_eq!(*router.route(&request).unwrap().target(), "users.show_v1");
}

#[test]
fn test_unconstrained_and_accepting_route_are_ambiguous() {
    let table = RouteTable::builder()
        .route(RouteEntry::get("/users/{id}", "plain"))
        .route(RouteEntry::get("/users/{id}", "v2").version("2"))
        .build()
        .unwrap();
    let router = Router::new(table, VersionResolver::default());

    let request = RequestHead::get("/users/7").header("X-API-VERSION", "2");
    let err = router.route(&request).unwrap_err();
    assert!(matches!(err, RouteError::Ambiguous { ref candidates, .. } if candidates.len() == 2));
}

#[test]
fn test_unconstrained_route_when_version_absent() {
    let table = RouteTable::builder()
        .route(RouteEntry::get("/orders", "orders.v2").version("2"))
        .route(RouteEntry::get("/orders", "orders"))
        .build()
        .unwrap();
    let router = Router::new(table, VersionResolver::default());

    assert_eq!(*router.route(&RequestHead::get("/orders")).unwrap().target(), "orders");
}

#[test]
fn test_method_not_allowed_vs_not_found() {
    let router = Router::new(api_table(), VersionResolver::default());

    let err = router
        .route(&RequestHead::new(HttpMethod::PUT, "/users/1"))
        .unwrap_err();
    assert!(matches!(
        err,
        RouteError::MethodNotAllowed { ref allowed, .. } if allowed == &[HttpMethod::GET]
    ));

    let err = router.route(&RequestHead::get("/teams")).unwrap_err();
    assert_eq!(err.status_code(), 404);
    assert!(err.is_client_error());
}

#[test]
fn test_wildcard_route() {
    let router = Router::new(api_table(), VersionResolver::default());

    let matched = router.route(&RequestHead::get("/assets/css/site%20main.css")).unwrap();
    assert_eq!(matched.path_variable("path"), Some("css/site main.css"));

    let matched = router.route(&RequestHead::get("/assets")).unwrap();
    assert_eq!(matched.path_variable("path"), Some(""));
}

#[test]
fn test_consumes_negotiation() {
    let table = RouteTable::builder()
        .route(RouteEntry::post("/import", "import.json").consumes("application/json"))
        .route(RouteEntry::post("/import", "import.form").consumes("application/x-www-form-urlencoded"))
        .build()
        .unwrap();
    let router = Router::new(table, VersionResolver::default());

    let request = RequestHead::post("/import").header("Content-Type", MediaType::form_urlencoded().to_string());
    assert_eq!(*router.route(&request).unwrap().target(), "import.form");
}

#[test]
fn test_matching_is_idempotent() {
    let table = api_table();
    let matcher = RouteMatcher::new(&table);

    let collect = || -> Vec<_> {
        matcher
            .matches(HttpMethod::GET, "/users/5")
            .map(|m| (*m.entry.target(), m.path_variables))
            .collect()
    };
    assert_eq!(collect(), collect());
}

#[test]
fn test_router_shared_across_threads() {
    let router = Arc::new(Router::new(api_table(), VersionResolver::default()));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let router = Arc::clone(&router);
            thread::spawn(move || {
                let path = format!("/users/{}", i);
                let request = RequestHead::get(&path).header("Accept", "application/json");
                router.route(&request).map(|m| m.path_variable("id").map(str::to_string))
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), Ok(Some(i.to_string())));
    }
}

#[test]
fn test_describe_routes_as_json() {
    let router = Router::new(api_table(), VersionResolver::default());
    let routes = serde_json::to_value(router.describe()).unwrap();

    assert_eq!(routes.as_array().map(Vec::len), Some(7));
    assert_eq!(routes[3]["version"], ">=2");
    assert_eq!(routes[3]["data"]["method"], "users.show_v2");
    assert_eq!(routes[1]["consumes"][0], "application/json");
}
