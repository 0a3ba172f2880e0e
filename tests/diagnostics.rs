use facet::Facet;
use indoc::indoc;

// ============================================================================
// Aggregated error reporting
// ============================================================================

/// The error message names the failing value, the field, and its type.
#[test]
fn conversion_error_message() {
    #[derive(Facet, Debug, PartialEq)]
    struct Params {
        count: i32,
    }

    let err = facet_uri::from_str::<Params>("?count=abc").unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("abc"), "missing value in: {msg}");
    assert!(msg.contains("count"), "missing field name in: {msg}");
    assert!(msg.contains("i32"), "missing type in: {msg}");
}

/// Every failing field is reported, one line each, in declaration order.
#[test]
fn multiple_failures_are_aggregated() {
    #[derive(Facet, Debug, PartialEq)]
    struct Params {
        first: i32,
        second: f64,
    }

    let err = facet_uri::from_str::<Params>("?first=x&second=y").unwrap_err();
    let msg = err.to_string();
    assert_eq!(msg.lines().count(), 2);
    assert_eq!(
        msg,
        indoc! {r#"
            cannot assign "x" to first (i32)
            cannot assign "y" to second (f64)"#}
    );
}

/// Identical messages are deduplicated and counted.
#[test]
fn duplicate_failures_are_counted() {
    #[derive(Facet, Debug, PartialEq)]
    struct Params {
        #[facet(rename = "x")]
        first: i32,
        #[facet(rename = "x")]
        second: i32,
    }

    let err = facet_uri::from_str::<Params>("?x=abc").unwrap_err();
    let msg = err.to_string();
    assert_eq!(msg, r#"[2] cannot assign "abc" to x (i32)"#);
}

/// The structured aggregate is reachable through the error kind.
#[test]
fn field_errors_are_inspectable() {
    #[derive(Facet, Debug, PartialEq)]
    struct Params {
        first: i32,
        second: i32,
    }

    let err = facet_uri::from_str::<Params>("?first=x&second=y").unwrap_err();
    match err.kind() {
        facet_uri::UriErrorKind::Fields(fields) => {
            assert_eq!(fields.len(), 2);
            assert!(!fields.is_empty());
            let counts: Vec<usize> = fields.iter().map(|(_, count)| count).collect();
            assert_eq!(counts, vec![1, 1]);
        }
        other => panic!("expected Fields, got {other:?}"),
    }
}

/// A successful record produces no error at all.
#[test]
fn no_failures_no_error() {
    #[derive(Facet, Debug, PartialEq)]
    struct Params {
        count: i32,
    }

    let params: Params = facet_uri::from_str("?count=10").unwrap();
    assert_eq!(params.count, 10);
}

/// Unsupported field shapes are reported distinctly and do not abort the
/// walk.
#[test]
fn unsupported_shape_is_reported() {
    #[derive(Facet, Debug, PartialEq, Default)]
    struct Nested {
        value: i32,
    }

    #[derive(Facet, Debug, PartialEq)]
    struct Params {
        nested: Nested,
        name: String,
    }

    let err = facet_uri::from_str::<Params>("?nested=oops&name=ok").unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("unsupported"), "got: {msg}");
    assert!(msg.contains("nested"), "got: {msg}");
}

#[test]
fn parse_failure_is_fatal() {
    #[derive(Facet, Debug, PartialEq)]
    struct Params {
        name: String,
    }

    let err = facet_uri::from_str::<Params>("://").unwrap_err();
    assert!(matches!(err.kind(), facet_uri::UriErrorKind::Parse(_)));
}

#[test]
fn invalid_target_message() {
    let err = facet_uri::from_str::<u8>("?x=1").unwrap_err();
    assert!(err.to_string().contains("needed a struct"));
}
