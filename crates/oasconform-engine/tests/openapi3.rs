//! End-to-end checks against an OpenAPI 3 document loaded from YAML

use std::path::Path;

use oasconform_core::{Category, Finding, ResponseSnapshot};
use oasconform_engine::loader::{dereference, parse_document};
use oasconform_engine::{CheckOptions, ConformanceEngine, SpecDocument, SpecVersion, normalize};
use serde_json::json;

const SPEC: &str = r##"
openapi: 3.0.3
info:
  title: Inventory
  version: "1.0"
servers:
  - url: https://inventory.example.com/api/{version}
    variables:
      version:
        default: v1
  - url: /
paths:
  /items/{id}:
    get:
      responses:
        "200":
          description: one item
          content:
            application/json:
              schema:
                type: object
                required: [name]
                properties:
                  name:
                    type: string
        "404":
          $ref: "#/components/responses/NotFound"
  /items:
    get:
      responses:
        "200":
          description: all items
          content:
            application/json:
              schema:
                type: array
                items:
                  $ref: "#/components/schemas/Item"
        4XX:
          description: client error
          content:
            application/json:
              schema:
                $ref: "#/components/schemas/Error"
        default:
          description: anything else
          content:
            text/*:
              schema:
                type: string
  /pets/{petId}:
    get:
      responses:
        "200":
          description: a pet
          content:
            application/json:
              schema:
                $ref: "#/components/schemas/Pet"
  /status:
    get:
      responses:
        "200":
          description: maybe a status
          content:
            application/json:
              schema:
                type: string
                nullable: true
components:
  responses:
    NotFound:
      description: not found
      content:
        application/json:
          schema:
            $ref: "#/components/schemas/Error"
  schemas:
    Item:
      type: object
      required: [id, name]
      properties:
        id:
          type: integer
          format: int64
        name:
          type: string
          minLength: 1
        tags:
          type: array
          items:
            type: string
          uniqueItems: true
    Error:
      type: object
      required: [code, message]
      properties:
        code:
          type: integer
        message:
          type: string
    Pet:
      oneOf:
        - $ref: "#/components/schemas/Cat"
        - $ref: "#/components/schemas/Dog"
    Cat:
      type: object
      required: [kind, lives]
      properties:
        kind:
          type: string
          enum: [cat]
        lives:
          type: integer
          maximum: 9
    Dog:
      type: object
      required: [kind, good]
      properties:
        kind:
          type: string
          enum: [dog]
        good:
          type: boolean
"##;

fn spec() -> SpecDocument {
    let raw = parse_document(Path::new("inventory.yaml"), SPEC).unwrap();
    normalize(&dereference(&raw)).unwrap()
}

fn json_response(status: u16, body: serde_json::Value) -> ResponseSnapshot {
    ResponseSnapshot::new(status)
        .with_header("Content-Type", "application/json; charset=utf-8")
        .with_body(body)
}

#[test]
fn normalizes_servers_and_paths() {
    let spec = spec();
    assert_eq!(spec.version, SpecVersion::OpenApi30);
    assert_eq!(spec.base_paths, vec!["/api/v1", ""]);
    assert_eq!(
        spec.templates(),
        vec!["/items/{id}", "/items", "/pets/{petId}", "/status"]
    );
}

#[test]
fn item_scenario() {
    let spec = spec();
    let engine = ConformanceEngine::new(&spec);

    let verdict = engine.check("GET", "/items/1", &json_response(200, json!({"name": "a"})));
    assert!(verdict.passed(), "{}", verdict.message());

    let verdict = engine.check("GET", "/items/1", &json_response(200, json!({})));
    assert!(!verdict.passed());
    assert_eq!(
        verdict.finding.violations()[0].message,
        "missing required property: name"
    );
    assert!(verdict.message().contains("missing required property: name"));

    // 404 is documented through a shared response component
    let verdict = engine.check("GET", "/items/1", &ResponseSnapshot::new(418));
    assert!(!verdict.passed());
    assert!(
        verdict
            .message()
            .contains("no response documented for status 418")
    );
}

#[test]
fn undocumented_status_message() {
    let spec = spec();
    let engine = ConformanceEngine::new(&spec);
    let verdict = engine.check("GET", "/status", &ResponseSnapshot::new(404));
    assert_eq!(verdict.category(), Category::Resolution);
    assert!(
        verdict
            .message()
            .starts_with("no response documented for status 404 on GET /status")
    );
}

#[test]
fn shared_response_component_is_inlined() {
    let spec = spec();
    let engine = ConformanceEngine::new(&spec);
    let ok = json_response(404, json!({"code": 404, "message": "gone"}));
    assert!(engine.check("GET", "/items/9", &ok).passed());

    let bad = json_response(404, json!({"code": "404"}));
    let verdict = engine.check("GET", "/items/9", &bad);
    let messages: Vec<_> = verdict
        .finding
        .violations()
        .iter()
        .map(|v| v.message.as_str())
        .collect();
    assert_eq!(
        messages,
        vec![
            "missing required property: message",
            "expected integer but got string"
        ]
    );
}

#[test]
fn server_prefix_is_accepted() {
    let spec = spec();
    let engine = ConformanceEngine::new(&spec);
    let response = json_response(200, json!({"name": "a"}));
    assert!(engine.check("GET", "/api/v1/items/1", &response).passed());
    assert!(
        engine
            .check("get", "https://inventory.example.com/api/v1/items/1?expand=true", &response)
            .passed()
    );
}

#[test]
fn range_and_default_responses() {
    let spec = spec();
    let engine = ConformanceEngine::new(&spec);

    let client_error = json_response(422, json!({"code": 422, "message": "bad"}));
    assert!(engine.check("GET", "/items", &client_error).passed());

    let server_error = ResponseSnapshot::new(503)
        .with_header("Content-Type", "text/html")
        .with_text("<h1>down</h1>");
    assert!(engine.check("GET", "/items", &server_error).passed());

    let wrong_type = json_response(503, json!({"code": 503}));
    let verdict = engine.check("GET", "/items", &wrong_type);
    match verdict.finding {
        Finding::UnsupportedMediaType {
            content_type,
            documented,
            ..
        } => {
            assert_eq!(content_type, "application/json");
            assert_eq!(documented, vec!["text/*"]);
        }
        other => panic!("unexpected finding: {other:?}"),
    }
}

#[test]
fn array_items_through_named_schema() {
    let spec = spec();
    let engine = ConformanceEngine::new(&spec);

    let ok = json_response(200, json!([{"id": 1, "name": "a", "tags": ["x", "y"]}]));
    assert!(engine.check("GET", "/items", &ok).passed());

    let bad = json_response(200, json!([{"id": 1, "name": "a"}, {"id": 2.5, "name": "", "tags": ["x", "x"]}]));
    let verdict = engine.check("GET", "/items", &bad);
    let locations: Vec<_> = verdict
        .finding
        .violations()
        .iter()
        .map(|v| v.location.as_str())
        .collect();
    assert_eq!(locations, vec!["body/1/id", "body/1/name", "body/1/tags"]);
}

#[test]
fn one_of_diagnoses_closest_branch() {
    let spec = spec();
    let engine = ConformanceEngine::new(&spec);

    assert!(
        engine
            .check("GET", "/pets/1", &json_response(200, json!({"kind": "cat", "lives": 9})))
            .passed()
    );
    assert!(
        engine
            .check("GET", "/pets/1", &json_response(200, json!({"kind": "dog", "good": true})))
            .passed()
    );

    let verdict = engine.check("GET", "/pets/1", &json_response(200, json!({"kind": "cat", "lives": 12})));
    let violations = verdict.finding.violations();
    assert_eq!(
        violations[0].message,
        "matches none of the 2 oneOf branches; closest is branch 0"
    );
    assert_eq!(violations[1].location, "body/lives");
    assert_eq!(violations[1].message, "must be less than or equal to 9");
    assert_eq!(violations.len(), 2);
}

#[test]
fn nullable_body() {
    let spec = spec();
    let engine = ConformanceEngine::new(&spec);
    assert!(engine.check("GET", "/status", &json_response(200, json!(null))).passed());
    assert!(engine.check("GET", "/status", &json_response(200, json!("ok"))).passed());
    assert!(!engine.check("GET", "/status", &json_response(200, json!(1))).passed());
}

#[test]
fn body_decoded_from_raw_text() {
    let spec = spec();
    let engine = ConformanceEngine::new(&spec);
    let headers = [("content-type".to_string(), "application/json".to_string())]
        .into_iter()
        .collect();
    let response = ResponseSnapshot::from_text(200, headers, r#"{"name": "from text"}"#);
    assert!(engine.check("GET", "/items/1", &response).passed());
}

#[test]
fn formats_follow_options() {
    let raw = json!({
        "openapi": "3.1.0",
        "info": {"title": "t", "version": "1"},
        "paths": {"/when": {"get": {"responses": {"200": {
            "description": "",
            "content": {"application/json": {"schema": {"type": "string", "format": "date-time"}}}
        }}}}}
    });
    let spec = normalize(&raw).unwrap();
    let response = json_response(200, json!("tomorrow"));

    assert!(!ConformanceEngine::new(&spec).check("GET", "/when", &response).passed());
    let lax = ConformanceEngine::new(&spec).with_options(CheckOptions {
        validate_formats: false,
        ..CheckOptions::default()
    });
    assert!(lax.check("GET", "/when", &response).passed());
}

#[test]
fn engine_is_shareable_across_threads() {
    fn assert_sync<T: Send + Sync>() {}
    assert_sync::<SpecDocument>();
    assert_sync::<ConformanceEngine<'static>>();

    let spec = spec();
    let engine = ConformanceEngine::new(&spec);
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = &engine;
                scope.spawn(move || {
                    let body = if i % 2 == 0 { json!({"name": "a"}) } else { json!({}) };
                    engine
                        .check("GET", &format!("/items/{i}"), &json_response(200, body))
                        .passed()
                })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), i % 2 == 0);
        }
    });
}
