use facet::Facet;

// ============================================================================
// Round-trip properties
// ============================================================================

/// A record of primitives with every field away from its fallback survives
/// a full round trip, and the emitted query is canonical (sorted keys).
#[test]
fn primitives_round_trip() {
    #[derive(Facet, Debug, PartialEq)]
    struct Params {
        name: String,
        count: i32,
        ratio: f64,
        flag: bool,
    }

    let params = Params {
        name: "hello".to_string(),
        count: 10,
        ratio: 2.5,
        flag: true,
    };

    let uri = facet_uri::to_string(&params);
    assert_eq!(uri, "?count=10&flag=true&name=hello&ratio=2.5");

    let parsed: Params = facet_uri::from_str(&uri).unwrap();
    assert_eq!(parsed, params);
}

/// Serializing is idempotent: parse(emit(x)) emits the same string again.
#[test]
fn emission_is_stable() {
    #[derive(Facet, Debug, PartialEq)]
    struct Params {
        b: String,
        a: String,
    }

    let params = Params {
        b: "2".to_string(),
        a: "1".to_string(),
    };

    let uri = facet_uri::to_string(&params);
    let parsed: Params = facet_uri::from_str(&uri).unwrap();
    assert_eq!(facet_uri::to_string(&parsed), uri);
}

/// Lists emitted as repeated keys parse back to the same contents.
#[test]
fn list_round_trip() {
    #[derive(Facet, Debug, PartialEq)]
    struct Params {
        ints: Vec<i32>,
        tags: Vec<String>,
    }

    let params = Params {
        ints: vec![3, 1, 2],
        tags: vec!["b".to_string(), "a".to_string()],
    };

    let uri = facet_uri::to_string(&params);
    let parsed: Params = facet_uri::from_str(&uri).unwrap();
    assert_eq!(parsed, params);
}

/// A field at its declared default vanishes from the output and is restored
/// on the way back in.
#[test]
fn declared_default_round_trip() {
    #[derive(Facet, Debug, PartialEq)]
    struct Params {
        name: String,
        #[facet(default = 3)]
        retries: i32,
    }

    let params = Params {
        name: "x".to_string(),
        retries: 3,
    };

    let uri = facet_uri::to_string(&params);
    assert_eq!(uri, "?name=x");

    let parsed: Params = facet_uri::from_str(&uri).unwrap();
    assert_eq!(parsed, params);
}

/// A record full of zero values emits nothing and parses back from nothing.
#[test]
fn zero_record_round_trip() {
    #[derive(Facet, Debug, PartialEq)]
    struct Params {
        name: String,
        count: i32,
        tags: Vec<String>,
        maybe: Option<i32>,
    }

    let params = Params {
        name: String::new(),
        count: 0,
        tags: Vec::new(),
        maybe: None,
    };

    let uri = facet_uri::to_string(&params);
    assert_eq!(uri, "");

    let parsed: Params = facet_uri::from_str(&uri).unwrap();
    assert_eq!(parsed, params);
}

/// Positional components and query parameters round-trip together.
#[test]
fn full_uri_round_trip() {
    #[derive(Facet, Debug, PartialEq)]
    struct Params {
        #[facet(scheme)]
        scheme: String,
        #[facet(host)]
        host: String,
        #[facet(path)]
        path: String,
        topic: String,
        ports: Vec<u16>,
    }

    let params = Params {
        scheme: "https".to_string(),
        host: "localhost:8080".to_string(),
        path: "/api/v1".to_string(),
        topic: "logs".to_string(),
        ports: vec![80, 443],
    };

    let uri = facet_uri::to_string(&params);
    assert_eq!(uri, "https://localhost:8080/api/v1?ports=80&ports=443&topic=logs");

    let parsed: Params = facet_uri::from_str(&uri).unwrap();
    assert_eq!(parsed, params);
}

/// Values that need percent-encoding survive the trip.
#[test]
fn encoded_values_round_trip() {
    #[derive(Facet, Debug, PartialEq)]
    struct Params {
        message: String,
    }

    let params = Params {
        message: "hello world & more=less".to_string(),
    };

    let uri = facet_uri::to_string(&params);
    let parsed: Params = facet_uri::from_str(&uri).unwrap();
    assert_eq!(parsed, params);
}

/// A text-codec scalar round-trips through its FromStr/Display pair.
#[test]
fn text_codec_round_trip() {
    use std::net::IpAddr;

    #[derive(Facet, Debug, PartialEq)]
    struct Params {
        addr: IpAddr,
        name: String,
    }

    let params = Params {
        addr: "192.168.1.1".parse().unwrap(),
        name: "gateway".to_string(),
    };

    let uri = facet_uri::to_string(&params);
    let parsed: Params = facet_uri::from_str(&uri).unwrap();
    assert_eq!(parsed, params);
}
