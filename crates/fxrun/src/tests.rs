use std::collections::BTreeSet;

use serde_json::Value;
use serde_json::json;
use wasmtime::Engine;
use wasmtime::component::Component;
use wasmtime::component::Type;
use wasmtime::component::Val;
use wasmtime::component::types::ComponentItem;

use crate::bridge::Bridge;
use crate::bridge::Capability;
use crate::bridge::SdkVersion;
use crate::bridge::host;
use crate::codec;
use crate::codec::Codec;
use crate::codec::FieldNaming;
use crate::codec::JsonCodec;
use crate::codec::JsonLibrary;
use crate::config::RuntimeConfig;
use crate::discovery::canonical_name;
use crate::discovery::is_data;
use crate::environment::interface_matches;
use crate::trace;
use crate::trace::StackFrame;

const SAMPLE: &str = r#"
(component
  (type $person' (record (field "first-name" string) (field "age" u8) (field "nickname" (option string))))
  (import "person" (type $person (eq $person')))
  (type $shape' (variant (case "circle" f64) (case "empty")))
  (import "shape" (type $shape (eq $shape')))
  (type $color' (enum "red" "green" "blue"))
  (import "color" (type $color (eq $color')))
  (type $perms' (flags "read" "write"))
  (import "perms" (type $perms (eq $perms')))
  (import "sample" (func
    (param "person" $person)
    (param "shape" $shape)
    (param "color" $color)
    (param "perms" $perms)
    (param "pair" (tuple char s64))
    (param "outcome" (result u32 (error string)))
    (param "items" (list s16))
    (param "flag" bool)))
)
"#;

/// Parameter types of the `sample` import, in declaration order.
struct Sample {
    person: Type,
    shape: Type,
    color: Type,
    perms: Type,
    pair: Type,
    outcome: Type,
    items: Type,
    flag: Type,
}

fn sample() -> Sample {
    let engine = Engine::default();
    let component = Component::new(&engine, SAMPLE).unwrap();
    let func = component
        .component_type()
        .imports(&engine)
        .find_map(|(name, item)| match item {
            ComponentItem::ComponentFunc(func) if name == "sample" => Some(func),
            _ => None,
        })
        .unwrap();
    let mut params = func.params().map(|(_, ty)| ty);
    let mut next = || params.next().unwrap();
    Sample {
        person: next(),
        shape: next(),
        color: next(),
        perms: next(),
        pair: next(),
        outcome: next(),
        items: next(),
        flag: next(),
    }
}

fn codec(naming: FieldNaming) -> JsonCodec {
    JsonCodec::new(JsonLibrary::new("test", "test.Marker", naming))
}

fn person(nickname: Option<&str>) -> Val {
    Val::Record(vec![
        ("first-name".into(), Val::String("Ada".into())),
        ("age".into(), Val::U8(30)),
        (
            "nickname".into(),
            Val::Option(nickname.map(|n| Box::new(Val::String(n.into())))),
        ),
    ])
}

#[test]
fn test_canonical_name() {
    assert_eq!(canonical_name("acme.Greeter"), "greeter");
    assert_eq!(canonical_name("Greeter"), "greeter");
    assert_eq!(canonical_name("acme.URLShortener"), "URLShortener");
    assert_eq!(canonical_name("a.b.helloWorld"), "helloWorld");
    assert_eq!(canonical_name("X"), "x");
}

#[test]
fn test_field_naming() {
    assert_eq!(FieldNaming::CamelCase.apply("first-name"), "firstName");
    assert_eq!(FieldNaming::CamelCase.apply("org-domain-url"), "orgDomainUrl");
    assert_eq!(FieldNaming::SnakeCase.apply("first-name"), "first_name");
    assert_eq!(FieldNaming::KebabCase.apply("first-name"), "first-name");
    assert_eq!(FieldNaming::CamelCase.apply("age"), "age");
}

#[test]
fn test_record_keys_follow_naming() {
    let sample = sample();
    for (naming, key) in [
        (FieldNaming::CamelCase, "firstName"),
        (FieldNaming::SnakeCase, "first_name"),
        (FieldNaming::KebabCase, "first-name"),
    ] {
        let codec = codec(naming);
        let payload = json!({ key: "Ada", "age": 30, "nickname": "Countess" });

        let val = codec.from_json(&payload, &sample.person).unwrap();
        assert_eq!(val, person(Some("Countess")));
        assert_eq!(codec.to_json(&val).unwrap(), payload);
    }
}

#[test]
fn test_missing_option_field_is_none() {
    let sample = sample();
    let codec = codec(FieldNaming::CamelCase);

    let val = codec.from_json(&json!({ "firstName": "Ada", "age": 30 }), &sample.person).unwrap();
    assert_eq!(val, person(None));
    assert_eq!(
        codec.to_json(&val).unwrap(),
        json!({ "firstName": "Ada", "age": 30, "nickname": null })
    );
}

#[test]
fn test_unknown_keys_are_ignored() {
    let sample = sample();
    let codec = codec(FieldNaming::CamelCase);
    let val = codec
        .from_json(&json!({ "firstName": "Ada", "age": 30, "extra": [1, 2] }), &sample.person)
        .unwrap();
    assert_eq!(val, person(None));
}

#[test]
fn test_missing_required_field() {
    let sample = sample();
    let err = codec(FieldNaming::SnakeCase)
        .from_json(&json!({ "age": 30 }), &sample.person)
        .unwrap_err();
    assert_eq!(
        err,
        codec::Error::MissingField {
            path: "$".into(),
            field: "first_name".into()
        }
    );
}

#[test]
fn test_integer_range_is_checked() {
    let sample = sample();
    let codec = codec(FieldNaming::CamelCase);

    let err = codec
        .from_json(&json!({ "firstName": "Ada", "age": 300 }), &sample.person)
        .unwrap_err();
    assert!(matches!(err, codec::Error::OutOfRange { ref path, expected: "u8" } if path == "$.age"));

    let err = codec
        .from_json(&json!({ "firstName": "Ada", "age": -1 }), &sample.person)
        .unwrap_err();
    assert!(matches!(err, codec::Error::OutOfRange { .. }));

    let err = codec
        .from_json(&json!({ "firstName": "Ada", "age": "thirty" }), &sample.person)
        .unwrap_err();
    assert!(matches!(err, codec::Error::Mismatch { found: "string", .. }));
}

#[test]
fn test_float_range_is_checked() {
    let codec = codec(FieldNaming::CamelCase);

    let err = codec.deserialize(b"1e39", &Type::Float32).unwrap_err();
    assert!(matches!(err, codec::Error::OutOfRange { ref path, expected: "f32" } if path == "$"));

    let err = codec.deserialize(b"-1e39", &Type::Float32).unwrap_err();
    assert!(matches!(err, codec::Error::OutOfRange { .. }));

    assert_eq!(codec.deserialize(b"1.5", &Type::Float32).unwrap(), Val::Float32(1.5));
    assert_eq!(codec.deserialize(b"1e39", &Type::Float64).unwrap(), Val::Float64(1e39));
}

#[test]
fn test_variant_enum_flags() {
    let sample = sample();
    let codec = codec(FieldNaming::CamelCase);

    let circle = codec.from_json(&json!({ "circle": 1.5 }), &sample.shape).unwrap();
    assert_eq!(circle, Val::Variant("circle".into(), Some(Box::new(Val::Float64(1.5)))));
    assert_eq!(codec.to_json(&circle).unwrap(), json!({ "circle": 1.5 }));

    let empty = codec.from_json(&json!("empty"), &sample.shape).unwrap();
    assert_eq!(empty, Val::Variant("empty".into(), None));
    assert_eq!(codec.to_json(&empty).unwrap(), json!("empty"));

    assert!(matches!(
        codec.from_json(&json!("square"), &sample.shape),
        Err(codec::Error::UnknownCase { .. })
    ));

    assert_eq!(codec.from_json(&json!("green"), &sample.color).unwrap(), Val::Enum("green".into()));
    assert!(matches!(
        codec.from_json(&json!("purple"), &sample.color),
        Err(codec::Error::UnknownCase { .. })
    ));

    let perms = codec.from_json(&json!(["read"]), &sample.perms).unwrap();
    assert_eq!(perms, Val::Flags(vec!["read".into()]));
    assert_eq!(codec.to_json(&perms).unwrap(), json!(["read"]));
    assert!(codec.from_json(&json!(["execute"]), &sample.perms).is_err());
}

#[test]
fn test_tuple_result_list_bool() {
    let sample = sample();
    let codec = codec(FieldNaming::KebabCase);

    let pair = codec.from_json(&json!(["x", -5]), &sample.pair).unwrap();
    assert_eq!(pair, Val::Tuple(vec![Val::Char('x'), Val::S64(-5)]));
    assert!(codec.from_json(&json!(["xy", -5]), &sample.pair).is_err());
    assert!(codec.from_json(&json!(["x"]), &sample.pair).is_err());

    let ok = codec.from_json(&json!({ "ok": 3 }), &sample.outcome).unwrap();
    assert_eq!(ok, Val::Result(Ok(Some(Box::new(Val::U32(3))))));
    let err = codec.from_json(&json!({ "err": "bad" }), &sample.outcome).unwrap();
    assert_eq!(codec.to_json(&err).unwrap(), json!({ "err": "bad" }));
    assert!(codec.from_json(&json!({ "ok": 1, "err": "x" }), &sample.outcome).is_err());

    let items = codec.from_json(&json!([1, 2]), &sample.items).unwrap();
    assert_eq!(items, Val::List(vec![Val::S16(1), Val::S16(2)]));
    let err = codec.from_json(&json!([1, "two"]), &sample.items).unwrap_err();
    assert!(matches!(err, codec::Error::Mismatch { ref path, .. } if path == "$[1]"));

    assert_eq!(codec.from_json(&json!(true), &sample.flag).unwrap(), Val::Bool(true));
}

#[test]
fn test_codec_bytes() {
    let sample = sample();
    let codec = codec(FieldNaming::CamelCase);

    let val = codec.deserialize(br#"{"firstName":"Ada","age":30}"#, &sample.person).unwrap();
    assert_eq!(val, person(None));

    assert!(matches!(
        codec.deserialize(b"{not json", &sample.person),
        Err(codec::Error::Malformed(_))
    ));

    // An empty payload is null.
    assert!(matches!(
        codec.deserialize(b"  ", &sample.flag),
        Err(codec::Error::Mismatch { found: "null", .. })
    ));

    let bytes = codec.serialize(&Val::String("Hello".into())).unwrap();
    assert_eq!(bytes, br#""Hello""#);
}

#[test]
fn test_codec_limits() {
    let codec = codec(FieldNaming::CamelCase);

    let mut nested = Val::U8(1);
    for _ in 0..100 {
        nested = Val::List(vec![nested]);
    }
    assert_eq!(codec.to_json(&nested), Err(codec::Error::RecursionLimitExceeded));

    assert!(matches!(
        codec.serialize(&Val::Float64(f64::NAN)),
        Err(codec::Error::Unsupported(_))
    ));
}

#[test]
fn test_shapes_are_data() {
    let sample = sample();
    for ty in [&sample.person, &sample.shape, &sample.outcome, &sample.items] {
        assert!(is_data(ty));
    }
    assert_eq!(codec::describe(&sample.pair), "tuple<char, s64>");
    assert_eq!(codec::describe(&sample.outcome), "result<u32, string>");
}

#[test]
fn test_default_libraries() {
    let libraries = JsonLibrary::defaults();
    let naming: Vec<FieldNaming> = libraries.iter().map(|l| l.naming).collect();
    assert_eq!(naming, [FieldNaming::CamelCase, FieldNaming::SnakeCase, FieldNaming::KebabCase]);
    assert_eq!(libraries[0].marker, "sf.functions.json.CamelCase");
}

fn declared(version: SdkVersion) -> BTreeSet<String> {
    version.markers().into_iter().map(str::to_string).collect()
}

#[test]
fn test_version_markers_grow() {
    for pair in SdkVersion::ALL.windows(2) {
        let (older, newer) = (pair[0].markers(), pair[1].markers());
        assert!(newer.is_superset(&older));
        assert!(newer.len() > older.len());
    }
}

#[test]
fn test_version_select() {
    for version in SdkVersion::ALL {
        assert_eq!(SdkVersion::select(&declared(version)), Some(version));
    }

    // A partial 1.1.0 contract still runs as 1.0.0.
    let mut partial = declared(SdkVersion::V1_0_0);
    partial.insert("query-more".into());
    assert_eq!(SdkVersion::select(&partial), Some(SdkVersion::V1_0_0));

    let mut broken = declared(SdkVersion::V1_0_0);
    broken.remove("org-id");
    assert_eq!(SdkVersion::select(&broken), None);
    assert_eq!(SdkVersion::select(&BTreeSet::new()), None);
}

#[test]
fn test_bridge_capabilities() {
    let bridge = Bridge::new(SdkVersion::V1_1_0);
    assert!(bridge.supports(Capability::QueryMore));
    assert!(bridge.require(Capability::UpdateRecord).is_ok());

    let err = bridge.require(Capability::RecordField).unwrap_err();
    assert_eq!(err.capability, Capability::RecordField);
    assert_eq!(err.to_string(), "`record-field` requires SDK 1.1.1 but the project uses SDK 1.1.0");

    assert_eq!(Bridge::new(SdkVersion::V1_0_0).capabilities().len(), 7);
    assert_eq!(Bridge::new(SdkVersion::V1_1_1).capabilities().len(), Capability::ALL.len());
}

#[test]
fn test_interface_matches() {
    assert!(interface_matches("sf:functions/context", "sf:functions/context"));
    assert!(interface_matches("sf:functions/context@1.1.0", "sf:functions/context"));
    assert!(!interface_matches("sf:functions/contexts", "sf:functions/context"));
    assert!(!interface_matches("wasi:cli/stdout@0.2.0", "sf:functions/context"));
}

#[test]
fn test_host_record_field() {
    let record = r#"{"attributes":{"type":"Account"},"Name":"Acme","NumberOfEmployees":12,"Parent":null}"#;
    assert_eq!(host::record_field(record, "name").as_deref(), Some("Acme"));
    assert_eq!(host::record_field(record, "NumberOfEmployees").as_deref(), Some("12"));
    assert_eq!(host::record_field(record, "Parent"), None);
    assert_eq!(host::record_field(record, "Missing"), None);
    assert_eq!(host::record_field("[1]", "Name"), None);
}

#[test]
fn test_host_coerce_fields() {
    let fields = host::coerce_fields(vec![
        ("Name".into(), "\"Acme\"".into()),
        ("Plain".into(), "Acme".into()),
        ("Count".into(), "3".into()),
    ]);
    assert_eq!(fields["Name"], json!("Acme"));
    assert_eq!(fields["Plain"], json!("Acme"));
    assert_eq!(fields["Count"], json!(3));
}

#[test]
fn test_rebase_drops_outer_glue() {
    let user = StackFrame::new("handle", "greeter", Some(0x2a));
    let glue = StackFrame::new("wasm-function[3]", "wit-component:shim", None);

    assert_eq!(user.to_string(), "handle (greeter+0x2a)");
    assert_eq!(glue.to_string(), "wasm-function[3] (wit-component:shim)");

    let rebased = trace::rebase(vec![user.clone(), glue.clone(), glue.clone()]);
    assert_eq!(rebased, vec![user.clone()]);

    // Only the outermost run goes.
    let rebased = trace::rebase(vec![glue.clone(), user.clone(), glue.clone()]);
    assert_eq!(rebased, vec![glue.clone(), user.clone()]);

    let only_glue = vec![glue.clone(), glue.clone()];
    assert_eq!(trace::rebase(only_glue.clone()), only_glue);
}

#[test]
fn test_error_message_and_causes() {
    let error = wasmtime::Error::msg("connection refused").context("query failed");
    assert_eq!(trace::message(&error), "connection refused");
    assert_eq!(trace::causes(&error), vec!["query failed".to_string()]);
    assert!(trace::capture(&error).is_empty());
}

#[test]
fn test_config_defaults() {
    let config = RuntimeConfig::from_toml_str("").unwrap();
    assert_eq!(config, RuntimeConfig::default());
    assert_eq!(config.api_version().unwrap(), fxapi::ApiVersion::V55);
    assert_eq!(config.json_libraries, JsonLibrary::defaults());
    assert!(config.project.is_none());
}

#[test]
fn test_config_parse() {
    let config = RuntimeConfig::from_toml_str(
        r#"
        api-version = "53.0"
        inherit-stdio = true

        [[json-libraries]]
        name = "snake"
        marker = "acme.json.Snake"
        naming = "snake-case"

        [[entry-points]]
        type = "acme.Greeter"
        name = "greet"

        [project]
        classpath = ["functions", "sdk"]
        "#,
    )
    .unwrap();

    assert_eq!(config.api_version().unwrap(), fxapi::ApiVersion::V53);
    assert!(config.inherit_stdio);
    assert_eq!(config.json_libraries[0].naming, FieldNaming::SnakeCase);
    assert_eq!(config.entry_points[0].type_name, "acme.Greeter");
    assert_eq!(config.entry_points[0].name.as_deref(), Some("greet"));

    let project = config.project.unwrap();
    assert_eq!(project.provenance, "Function Bundle");
    assert_eq!(project.classpath.len(), 2);
}

#[test]
fn test_config_errors() {
    let config = RuntimeConfig::from_toml_str(r#"api-version = "52.0""#).unwrap();
    let err = config.api_version().unwrap_err();
    assert_eq!(err.kind(), "ConfigError");

    let err = RuntimeConfig::from_toml_str("api-verison = \"55.0\"").unwrap_err();
    assert_eq!(err.kind(), "ConfigError");

    let err = RuntimeConfig::from_file("/nonexistent/fxrun.toml").unwrap_err();
    assert_eq!(err.kind(), "ConfigError");
}

#[test]
fn test_failure_body_shape() {
    let failure = fxproto::Failure::new(fxproto::FailureKind::FunctionThrew, "Oh no!")
        .with_stack_trace(trace::render(&[StackFrame::new("handle", "thrower", Some(16))]));
    let body: Value = failure.to_json();
    assert_eq!(body["kind"], "FunctionThrewException");
    assert_eq!(body["message"], "Oh no!");
    assert_eq!(body["stackTrace"], json!(["handle (thrower+0x10)"]));
}
