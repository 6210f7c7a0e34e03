//! Shared fixtures: classpath builders, WAT components and a scripted Data API.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use fxapi::HttpClient;
use fxapi::HttpRequest;
use fxapi::HttpResponse;
use fxproto::FunctionContext;
use fxproto::InvocationEnvelope;
use fxproto::OrgContext;
use fxproto::UserContext;
use fxproto::extension::FUNCTION_CONTEXT;
use fxproto::extension::ORG_CONTEXT;
use fxproto::extension::encode_extension;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use tempfile::TempDir;

use fxrun::config::RuntimeConfig;
use fxrun::runtime::Runtime;

pub const CONTRACT_PATH: &str = "sf/functions/Context.wat";
pub const CAMEL_CASE_PATH: &str = "sf/functions/json/CamelCase.wat";
pub const SNAKE_CASE_PATH: &str = "sf/functions/json/SnakeCase.wat";

/// A marker type: a component with nothing in it.
pub const MARKER: &str = "(component)";

/// Contract functions present since 1.0.0, minus `query-records`.
const CONTRACT_BASE: &str = r#"
    (export "org-id" (func (result string)))
    (export "user-id" (func (result string)))
    (export "username" (func (result string)))
    (export "api-version" (func (result string)))
    (export "org-domain-url" (func (result string)))
    (export "create-record" (func
      (param "object-type" string)
      (param "fields" (list (tuple string string)))
      (result (result string (error string)))))
"#;

const CONTRACT_1_0_0: &str = r#"
    (export "query-records" (func
      (param "soql" string)
      (result (result (list string) (error string)))))
"#;

const CONTRACT_1_1_0: &str = r#"
    (export "query-records" (func
      (param "soql" string)
      (result (result (tuple bool (option string) (list string)) (error string)))))
    (export "query-more" (func
      (param "next-records-url" string)
      (result (result (tuple bool (option string) (list string)) (error string)))))
    (export "update-record" (func
      (param "object-type" string)
      (param "id" string)
      (param "fields" (list (tuple string string)))
      (result (result string (error string)))))
    (export "event-id" (func (result string)))
    (export "event-type" (func (result string)))
"#;

const CONTRACT_1_1_1: &str = r#"
    (export "record-field" (func
      (param "record" string)
      (param "field" string)
      (result (option string))))
"#;

/// The SDK contract type as shipped with one SDK version.
pub fn contract(version: &str) -> String {
    let functions = match version {
        "1.0.0" => format!("{}{}", CONTRACT_BASE, CONTRACT_1_0_0),
        "1.1.0" => format!("{}{}", CONTRACT_BASE, CONTRACT_1_1_0),
        "1.1.1" => format!("{}{}{}", CONTRACT_BASE, CONTRACT_1_1_0, CONTRACT_1_1_1),
        other => panic!("unknown SDK version {}", other),
    };
    format!(r#"(component (import "sf:functions/context" (instance {})))"#, functions)
}

/// Bump allocator shared by the fixtures that need guest memory.
const REALLOC: &str = r#"
    (global $heap (mut i32) (i32.const 1024))
    (func $realloc (export "realloc") (param i32 i32 i32 i32) (result i32)
      (local $ptr i32)
      (global.set $heap
        (i32.and
          (i32.add (global.get $heap) (i32.sub (local.get 2) (i32.const 1)))
          (i32.xor (i32.sub (local.get 2) (i32.const 1)) (i32.const -1))))
      (local.set $ptr (global.get $heap))
      (global.set $heap (i32.add (global.get $heap) (local.get 3)))
      (local.get $ptr))
"#;

/// `handle(person { name, age }) -> result<string, string>` greeting the person.
pub fn greeter() -> String {
    format!(
        r#"
(component
  (type $person' (record (field "name" string) (field "age" s32)))
  (export $person "person" (type $person'))
  (core module $m
    (memory (export "memory") 1)
    (data (i32.const 0) "Hello ")
    (data (i32.const 16) ", you are ")
    (data (i32.const 32) " years old!")
    {realloc}
    (func (export "handle") (param $name i32) (param $len i32) (param $age i32) (result i32)
      (local $out i32) (local $cur i32) (local $digits i32) (local $n i32) (local $i i32)
      (local.set $out (global.get $heap))
      (local.set $cur (local.get $out))
      (memory.copy (local.get $cur) (i32.const 0) (i32.const 6))
      (local.set $cur (i32.add (local.get $cur) (i32.const 6)))
      (memory.copy (local.get $cur) (local.get $name) (local.get $len))
      (local.set $cur (i32.add (local.get $cur) (local.get $len)))
      (memory.copy (local.get $cur) (i32.const 16) (i32.const 10))
      (local.set $cur (i32.add (local.get $cur) (i32.const 10)))
      (local.set $n (local.get $age))
      (local.set $digits (i32.const 1))
      (block $counted
        (loop $count
          (br_if $counted (i32.lt_u (local.get $n) (i32.const 10)))
          (local.set $n (i32.div_u (local.get $n) (i32.const 10)))
          (local.set $digits (i32.add (local.get $digits) (i32.const 1)))
          (br $count)))
      (local.set $n (local.get $age))
      (local.set $i (local.get $digits))
      (loop $write
        (local.set $i (i32.sub (local.get $i) (i32.const 1)))
        (i32.store8
          (i32.add (local.get $cur) (local.get $i))
          (i32.add (i32.const 48) (i32.rem_u (local.get $n) (i32.const 10))))
        (local.set $n (i32.div_u (local.get $n) (i32.const 10)))
        (br_if $write (local.get $i)))
      (local.set $cur (i32.add (local.get $cur) (local.get $digits)))
      (memory.copy (local.get $cur) (i32.const 32) (i32.const 11))
      (local.set $cur (i32.add (local.get $cur) (i32.const 11)))
      (global.set $heap (local.get $cur))
      (i32.store8 (i32.const 128) (i32.const 0))
      (i32.store (i32.const 132) (local.get $out))
      (i32.store (i32.const 136) (i32.sub (local.get $cur) (local.get $out)))
      (i32.const 128)))
  (core instance $i (instantiate $m))
  (func (export "handle") (param "person" $person) (result (result string (error string)))
    (canon lift (core func $i "handle") (memory (core memory $i "memory")) (realloc (core func $i "realloc"))))
)
"#,
        realloc = REALLOC
    )
}

/// `handle(string) -> result<string, string>` that always fails with "Oh no!".
pub fn thrower() -> String {
    format!(
        r#"
(component
  (core module $m
    (memory (export "memory") 1)
    (data (i32.const 0) "Oh no!")
    {realloc}
    (func (export "handle") (param i32 i32) (result i32)
      (i32.store8 (i32.const 128) (i32.const 1))
      (i32.store (i32.const 132) (i32.const 0))
      (i32.store (i32.const 136) (i32.const 6))
      (i32.const 128)))
  (core instance $i (instantiate $m))
  (func (export "handle") (param "input" string) (result (result string (error string)))
    (canon lift (core func $i "handle") (memory (core memory $i "memory")) (realloc (core func $i "realloc"))))
)
"#,
        realloc = REALLOC
    )
}

/// `handle(s32) -> s32` that traps.
pub const TRAPPER: &str = r#"
(component
  (core module $m
    (func $explode (param i32) (result i32)
      unreachable)
    (func (export "handle") (param i32) (result i32)
      (call $explode (local.get 0))))
  (core instance $i (instantiate $m))
  (func (export "handle") (param "input" s32) (result s32)
    (canon lift (core func $i "handle")))
)
"#;

/// `handle(string) -> string` returning its input.
pub fn echo() -> String {
    format!(
        r#"
(component
  (core module $m
    (memory (export "memory") 1)
    {realloc}
    (func (export "handle") (param $ptr i32) (param $len i32) (result i32)
      (i32.store (i32.const 128) (local.get $ptr))
      (i32.store (i32.const 132) (local.get $len))
      (i32.const 128)))
  (core instance $i (instantiate $m))
  (func (export "handle") (param "input" string) (result string)
    (canon lift (core func $i "handle") (memory (core memory $i "memory")) (realloc (core func $i "realloc"))))
)
"#,
        realloc = REALLOC
    )
}

/// Core module providing memory and `realloc` to fixtures that lower contract calls.
fn libc() -> String {
    format!(
        r#"
  (core module $libc
    (memory (export "memory") 1)
    {realloc})
  (core instance $libc (instantiate $libc))
"#,
        realloc = REALLOC
    )
}

/// `handle(s32) -> string` returning the contract's `org-id`.
pub fn org_id_reader(import: &str) -> String {
    format!(
        r#"
(component
  (import "{import}" (instance $ctx
    (export "org-id" (func (result string)))))
  {libc}
  (core func $org-id (canon lower (func $ctx "org-id") (memory (core memory $libc "memory")) (realloc (core func $libc "realloc"))))
  (core module $m
    (import "libc" "memory" (memory 1))
    (import "ctx" "org-id" (func $org-id (param i32)))
    (func (export "handle") (param i32) (result i32)
      (call $org-id (i32.const 128))
      (i32.const 128)))
  (core instance $i (instantiate $m
    (with "libc" (instance $libc))
    (with "ctx" (instance (export "org-id" (func $org-id))))))
  (func (export "handle") (param "input" s32) (result string)
    (canon lift (core func $i "handle") (memory (core memory $libc "memory")) (realloc (core func $libc "realloc"))))
)
"#,
        import = import,
        libc = libc()
    )
}

/// `handle(s32) -> result<string, string>` creating an Account named Acme.
pub fn account_creator() -> String {
    format!(
        r#"
(component
  (import "sf:functions/context" (instance $ctx
    (export "create-record" (func
      (param "object-type" string)
      (param "fields" (list (tuple string string)))
      (result (result string (error string)))))))
  {libc}
  (core func $create-record (canon lower (func $ctx "create-record") (memory (core memory $libc "memory")) (realloc (core func $libc "realloc"))))
  (core module $m
    (import "libc" "memory" (memory 1))
    (import "ctx" "create-record" (func $create-record (param i32 i32 i32 i32 i32)))
    (data (i32.const 100) "Account")
    (data (i32.const 120) "Name")
    (data (i32.const 130) "\"Acme\"")
    (func (export "handle") (param i32) (result i32)
      (i32.store (i32.const 200) (i32.const 120))
      (i32.store (i32.const 204) (i32.const 4))
      (i32.store (i32.const 208) (i32.const 130))
      (i32.store (i32.const 212) (i32.const 6))
      (call $create-record (i32.const 100) (i32.const 7) (i32.const 200) (i32.const 1) (i32.const 300))
      (i32.const 300)))
  (core instance $i (instantiate $m
    (with "libc" (instance $libc))
    (with "ctx" (instance (export "create-record" (func $create-record))))))
  (func (export "handle") (param "input" s32) (result (result string (error string)))
    (canon lift (core func $i "handle") (memory (core memory $libc "memory")) (realloc (core func $libc "realloc"))))
)
"#,
        libc = libc()
    )
}

/// `handle(string) -> option<string>` reading field `name` of the given record
/// through the 1.1.1 accessor.
pub fn field_reader() -> String {
    format!(
        r#"
(component
  (import "sf:functions/context" (instance $ctx
    (export "record-field" (func
      (param "record" string)
      (param "field" string)
      (result (option string))))))
  {libc}
  (core func $record-field (canon lower (func $ctx "record-field") (memory (core memory $libc "memory")) (realloc (core func $libc "realloc"))))
  (core module $m
    (import "libc" "memory" (memory 1))
    (import "ctx" "record-field" (func $record-field (param i32 i32 i32 i32 i32)))
    (data (i32.const 100) "name")
    (func (export "handle") (param $ptr i32) (param $len i32) (result i32)
      (call $record-field (local.get $ptr) (local.get $len) (i32.const 100) (i32.const 4) (i32.const 300))
      (i32.const 300)))
  (core instance $i (instantiate $m
    (with "libc" (instance $libc))
    (with "ctx" (instance (export "record-field" (func $record-field))))))
  (func (export "handle") (param "record" string) (result (option string))
    (canon lift (core func $i "handle") (memory (core memory $libc "memory")) (realloc (core func $libc "realloc"))))
)
"#,
        libc = libc()
    )
}

/// A type exporting `value() -> u32`, used to tell definitions apart.
pub fn valued(value: u32) -> String {
    format!(
        r#"
(component
  (core module $m
    (func (export "value") (result i32)
      (i32.const {value})))
  (core instance $i (instantiate $m))
  (func (export "value") (result u32)
    (canon lift (core func $i "value")))
)
"#,
        value = value
    )
}

/// `handle` taking two values.
pub const TWO_PARAMS: &str = r#"
(component
  (core module $m
    (func (export "handle") (param i32 i32) (result i32)
      (i32.add (local.get 0) (local.get 1))))
  (core instance $i (instantiate $m))
  (func (export "handle") (param "a" s32) (param "b" s32) (result s32)
    (canon lift (core func $i "handle")))
)
"#;

/// `handle` taking a resource.
pub const RESOURCE_PARAM: &str = r#"
(component
  (type $r' (resource (rep i32)))
  (export $r "thing" (type $r'))
  (core module $m
    (func (export "handle") (param i32) (result i32)
      (local.get 0)))
  (core instance $i (instantiate $m))
  (func (export "handle") (param "input" (own $r)) (result u32)
    (canon lift (core func $i "handle")))
)
"#;

/// A temporary directory holding classpath entries.
pub struct Classpath {
    dir: TempDir,
}

impl Classpath {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Writes `wat` to `relative` inside entry `entry` and returns the entry path.
    pub fn write(&self, entry: &str, relative: &str, wat: &str) -> PathBuf {
        let root = self.entry(entry);
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, wat).unwrap();
        root
    }

    pub fn entry(&self, entry: &str) -> PathBuf {
        let root = self.dir.path().join(entry);
        std::fs::create_dir_all(&root).unwrap();
        root
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// An `sdk` entry with the contract of `version` and the camel-case JSON marker.
    pub fn sdk(&self, version: &str) -> PathBuf {
        self.write("sdk", CONTRACT_PATH, &contract(version));
        self.write("sdk", CAMEL_CASE_PATH, MARKER)
    }
}

/// Replays canned responses in order and records every request it sees.
#[derive(Default)]
pub struct ScriptedClient {
    responses: Mutex<VecDeque<(StatusCode, String)>>,
    pub requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedClient {
    pub fn with(responses: &[(StatusCode, &str)]) -> Arc<Self> {
        let queue = responses.iter().map(|(s, b)| (*s, b.to_string())).collect();
        Arc::new(Self {
            responses: Mutex::new(queue),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn empty() -> Arc<Self> {
        Self::with(&[])
    }
}

#[async_trait]
impl HttpClient for ScriptedClient {
    async fn execute(&self, request: HttpRequest) -> fxapi::Result<HttpResponse> {
        self.requests.lock().unwrap().push(request);
        let (status, body) = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| fxapi::Error::Transport("no scripted response left".into()))?;
        Ok(HttpResponse {
            status,
            headers: HeaderMap::new(),
            body: body.into_bytes(),
        })
    }
}

pub fn runtime(http: Arc<ScriptedClient>) -> Runtime {
    Runtime::with_http_client(RuntimeConfig::default(), http).unwrap()
}

pub fn org_context() -> OrgContext {
    OrgContext {
        api_version: "55.0".into(),
        payload_version: "0.1".into(),
        user_context: UserContext {
            org_id: "00Dxx0000006IYJ".into(),
            user_id: "005xx000001X8Uz".into(),
            on_behalf_of_user_id: None,
            username: "admin@example.com".into(),
            salesforce_base_url: "https://example.my.salesforce.com".into(),
            org_domain_url: "https://example.my.salesforce.com".into(),
        },
    }
}

pub fn function_context(function_name: &str) -> FunctionContext {
    FunctionContext {
        access_token: "token-123".into(),
        request_id: "req-1".into(),
        function_name: function_name.into(),
        resource: "https://example.my.salesforce.com".into(),
        ..Default::default()
    }
}

/// An event carrying both contexts.
pub fn envelope(id: &str, data: &str, function_name: &str) -> InvocationEnvelope {
    InvocationEnvelope::new(id, data.as_bytes().to_vec())
        .with_extension(ORG_CONTEXT, encode_extension(&org_context()).unwrap())
        .with_extension(FUNCTION_CONTEXT, encode_extension(&function_context(function_name)).unwrap())
}
