//! End-to-end scenarios over the full pipeline: parse, compile, load data,
//! validate.

use std::sync::{Arc, Mutex};

use yangkit_core::data::{parse_json, parse_xml, print_json, validate};
use yangkit_core::mount::{ExtDataProvider, MountSchemaInfo};
use yangkit_core::schema::SchemaFormat;
use yangkit_core::{Context, ContextOptions, Error, ValidationCode};

fn context_with(modules: &[&str]) -> Context {
    let mut ctx = Context::new(ContextOptions::default());
    for module in modules {
        ctx.parse_module(module, SchemaFormat::Yang)
            .expect("module parses");
    }
    ctx.compile().expect("modules compile");
    ctx
}

// ============================================================================
// S1: basic type derivation
// ============================================================================

const MODULE_A: &str = r#"module a {
  namespace "urn:example:a";
  prefix a;

  typedef small-int {
    type int8 { range "0..10"; }
  }

  leaf x { type small-int; }
}"#;

#[test]
fn test_s1_typedef_range_accepts() {
    let ctx = context_with(&[MODULE_A]);
    let mut tree = parse_json(&ctx, r#"{"a:x": 5}"#).unwrap();
    validate(&ctx, &mut tree).unwrap();
}

#[test]
fn test_s1_typedef_range_rejects_below() {
    let ctx = context_with(&[MODULE_A]);
    let err = parse_json(&ctx, r#"{"a:x": -1}"#).unwrap_err();
    assert_eq!(err, Error::Validation(ValidationCode::Data));
    assert_eq!(ctx.last_validation_code(), Some(ValidationCode::Data));
}

#[test]
fn test_s1_typedef_rejects_wrong_type() {
    let ctx = context_with(&[MODULE_A]);
    let err = parse_json(&ctx, r#"{"a:x": "five"}"#).unwrap_err();
    assert_eq!(err, Error::Validation(ValidationCode::Data));
}

// ============================================================================
// S2: leafref integrity
// ============================================================================

const MODULE_B: &str = r#"module b {
  namespace "urn:example:b";
  prefix b;

  leaf name { type string; }
  leaf ref {
    type leafref { path "../name"; }
  }
}"#;

#[test]
fn test_s2_leafref_target_exists() {
    let ctx = context_with(&[MODULE_B]);
    let mut tree = parse_json(&ctx, r#"{"b:name": "foo", "b:ref": "foo"}"#).unwrap();
    validate(&ctx, &mut tree).unwrap();
}

#[test]
fn test_s2_leafref_missing_target() {
    let ctx = context_with(&[MODULE_B]);
    let mut tree = parse_json(&ctx, r#"{"b:name": "foo", "b:ref": "bar"}"#).unwrap();
    let err = validate(&ctx, &mut tree).unwrap_err();
    assert_eq!(err, Error::Validation(ValidationCode::Data));
    let message = ctx.last_error_message().unwrap();
    assert!(message.contains("no existing target"), "message: {message}");
    assert!(message.contains("../name"), "message: {message}");
}

// ============================================================================
// S3: when pruning vs must
// ============================================================================

const MODULE_W: &str = r#"module w {
  namespace "urn:example:w";
  prefix w;

  leaf a { type string; }
  leaf b {
    when "../a = 'yes'";
    type int32;
    must ". != 0";
  }
}"#;

#[test]
fn test_s3_when_false_prunes_must() {
    let ctx = context_with(&[MODULE_W]);
    let mut tree = parse_json(&ctx, r#"{"w:a": "no", "w:b": 0}"#).unwrap();
    // b's when is false: the leaf is pruned before must evaluates.
    validate(&ctx, &mut tree).unwrap();
    let printed = print_json(&ctx, &tree);
    assert!(!printed.contains("\"w:b\""), "pruned leaf still printed: {printed}");
}

#[test]
fn test_s3_when_true_must_fails() {
    let ctx = context_with(&[MODULE_W]);
    let mut tree = parse_json(&ctx, r#"{"w:a": "yes", "w:b": 0}"#).unwrap();
    let err = validate(&ctx, &mut tree).unwrap_err();
    assert_eq!(err, Error::Validation(ValidationCode::Data));
    assert!(ctx
        .last_error_message()
        .unwrap()
        .contains("must condition"));
}

#[test]
fn test_s3_when_true_must_holds() {
    let ctx = context_with(&[MODULE_W]);
    let mut tree = parse_json(&ctx, r#"{"w:a": "yes", "w:b": 7}"#).unwrap();
    validate(&ctx, &mut tree).unwrap();
}

// ============================================================================
// S4: augment across import
// ============================================================================

const MODULE_ROOT: &str = r#"module base-mod {
  namespace "urn:example:base";
  prefix base;

  container root {
    leaf existing { type string; }
  }
}"#;

const MODULE_C: &str = r#"module c {
  namespace "urn:example:c";
  prefix c;

  import base-mod { prefix base; }

  augment "/base:root" {
    leaf added { type string; mandatory true; }
  }
}"#;

#[test]
fn test_s4_augment_mandatory_missing() {
    let ctx = context_with(&[MODULE_ROOT, MODULE_C]);
    let mut tree =
        parse_json(&ctx, r#"{"base-mod:root": {"existing": "v"}}"#).unwrap();
    let err = validate(&ctx, &mut tree).unwrap_err();
    assert_eq!(err, Error::Validation(ValidationCode::Data));
    assert!(ctx.last_error_message().unwrap().contains("mandatory"));
}

#[test]
fn test_s4_augment_mandatory_present() {
    let ctx = context_with(&[MODULE_ROOT, MODULE_C]);
    let mut tree = parse_json(
        &ctx,
        r#"{"base-mod:root": {"existing": "v", "c:added": "w"}}"#,
    )
    .unwrap();
    validate(&ctx, &mut tree).unwrap();
}

#[test]
fn test_s4_augmented_by_recorded() {
    let ctx = context_with(&[MODULE_ROOT, MODULE_C]);
    let base = ctx.get_module("base-mod", None).unwrap();
    let c = ctx.get_module("c", None).unwrap();
    assert!(base.augmented_by.contains(&c.id));
}

// ============================================================================
// S5: identity derivation
// ============================================================================

const MODULE_IDENT: &str = r#"module zoo {
  namespace "urn:example:zoo";
  prefix zoo;

  identity animal;
  identity mammal { base animal; }
  identity dog { base mammal; }
  identity plant;

  leaf pet {
    type identityref { base animal; }
  }
}"#;

#[test]
fn test_s5_identityref_accepts_transitive() {
    let ctx = context_with(&[MODULE_IDENT]);
    let mut tree = parse_json(&ctx, r#"{"zoo:pet": "dog"}"#).unwrap();
    validate(&ctx, &mut tree).unwrap();
}

#[test]
fn test_s5_identityref_rejects_unrelated() {
    let ctx = context_with(&[MODULE_IDENT]);
    let err = parse_json(&ctx, r#"{"zoo:pet": "plant"}"#).unwrap_err();
    assert_eq!(err, Error::Validation(ValidationCode::Data));
}

#[test]
fn test_s5_identityref_rejects_base_itself() {
    let ctx = context_with(&[MODULE_IDENT]);
    assert!(parse_json(&ctx, r#"{"zoo:pet": "animal"}"#).is_err());
}

// ============================================================================
// S6: mount-point shared caching
// ============================================================================

const MOUNT_EXT_MODULE: &str = r#"module ietf-yang-schema-mount {
  yang-version 1.1;
  namespace "urn:ietf:params:xml:ns:yang:ietf-yang-schema-mount";
  prefix yangmnt;

  extension mount-point {
    argument label;
  }
}"#;

const MOUNT_HOST_MODULE: &str = r#"module host {
  yang-version 1.1;
  namespace "urn:example:host";
  prefix host;

  import ietf-yang-schema-mount { prefix yangmnt; }

  list device {
    key "name";
    leaf name { type string; }
    container mounted {
      yangmnt:mount-point "mnt1";
    }
  }
}"#;

const MOUNTED_MODULE: &str = r#"module gadget {
  namespace "urn:example:gadget";
  prefix gadget;

  container state {
    leaf serial { type string; }
  }
}"#;

#[derive(Debug)]
struct TestProvider {
    content_id: Mutex<String>,
}

impl ExtDataProvider for TestProvider {
    fn ext_data(&self, _mount_point: &str) -> Result<MountSchemaInfo, Error> {
        Ok(MountSchemaInfo {
            content_id: self.content_id.lock().unwrap().clone(),
            shared: true,
            modules: vec![("gadget".to_owned(), MOUNTED_MODULE.to_owned())],
            parent_refs: Vec::new(),
        })
    }
}

#[test]
fn test_s6_shared_mount_cached_and_content_id_checked() {
    let provider = Arc::new(TestProvider {
        content_id: Mutex::new("cid-1".to_owned()),
    });
    let mut ctx = Context::new(ContextOptions::default());
    ctx.parse_module(MOUNT_EXT_MODULE, SchemaFormat::Yang).unwrap();
    ctx.parse_module(MOUNT_HOST_MODULE, SchemaFormat::Yang).unwrap();
    ctx.compile().unwrap();
    ctx.set_ext_data_provider(provider.clone());

    // Two entries with the same label and content-id share one inner
    // context.
    let tree = parse_json(
        &ctx,
        r#"{"host:device": [
             {"name": "d1", "mounted": {"gadget:state": {"serial": "s1"}}},
             {"name": "d2", "mounted": {"gadget:state": {"serial": "s2"}}}
           ]}"#,
    )
    .unwrap();

    let mounted_roots: Vec<_> = tree
        .walk()
        .into_iter()
        .filter(|&id| tree.mount_context(id).is_some())
        .collect();
    assert_eq!(mounted_roots.len(), 2);
    let first = tree.mount_context(mounted_roots[0]).unwrap();
    let second = tree.mount_context(mounted_roots[1]).unwrap();
    assert!(Arc::ptr_eq(first, second), "shared mount must reuse the context");

    // A changed content-id for the same label is rejected.
    *provider.content_id.lock().unwrap() = "cid-2".to_owned();
    let err = parse_json(
        &ctx,
        r#"{"host:device": [
             {"name": "d3", "mounted": {"gadget:state": {"serial": "s3"}}}
           ]}"#,
    )
    .unwrap_err();
    assert_eq!(err, Error::Validation(ValidationCode::Data));
    let message = ctx.last_error_message().unwrap();
    assert!(
        message.contains("differs from") && message.contains("used previously"),
        "message: {message}"
    );
}

#[test]
fn test_s6_mounted_data_validates() {
    let provider = Arc::new(TestProvider {
        content_id: Mutex::new("cid-1".to_owned()),
    });
    let mut ctx = Context::new(ContextOptions::default());
    ctx.parse_module(MOUNT_EXT_MODULE, SchemaFormat::Yang).unwrap();
    ctx.parse_module(MOUNT_HOST_MODULE, SchemaFormat::Yang).unwrap();
    ctx.compile().unwrap();
    ctx.set_ext_data_provider(provider);

    let mut tree = parse_json(
        &ctx,
        r#"{"host:device": [
             {"name": "d1", "mounted": {"gadget:state": {"serial": "s1"}}}
           ]}"#,
    )
    .unwrap();
    validate(&ctx, &mut tree).unwrap();
}

// ============================================================================
// Grouping expansion, defaults, unique, min/max
// ============================================================================

const MODULE_GROUPING: &str = r#"module grp {
  namespace "urn:example:grp";
  prefix grp;

  grouping endpoint {
    leaf host { type string; }
    leaf port { type uint16; default 8080; }
  }

  container server {
    uses endpoint { refine "port" { default "9090"; } }
  }
  container client {
    uses endpoint;
  }
}"#;

#[test]
fn test_grouping_expansion_with_refine_and_defaults() {
    let ctx = context_with(&[MODULE_GROUPING]);
    let mut tree = parse_json(
        &ctx,
        r#"{"grp:server": {"host": "a"}, "grp:client": {"host": "b"}}"#,
    )
    .unwrap();
    validate(&ctx, &mut tree).unwrap();

    let printed = print_json(&ctx, &tree);
    // The refined copy gets 9090, the untouched one the grouping's 8080.
    assert!(printed.contains("9090"), "printed: {printed}");
    assert!(printed.contains("8080"), "printed: {printed}");
}

const MODULE_LIST: &str = r#"module inv {
  namespace "urn:example:inv";
  prefix inv;

  list item {
    key "id";
    unique "serial";
    min-elements 1;
    max-elements 3;
    leaf id { type string; }
    leaf serial { type string; }
  }
}"#;

#[test]
fn test_list_key_uniqueness() {
    let ctx = context_with(&[MODULE_LIST]);
    let mut tree = parse_json(
        &ctx,
        r#"{"inv:item": [{"id": "a", "serial": "1"}, {"id": "a", "serial": "2"}]}"#,
    )
    .unwrap();
    let err = validate(&ctx, &mut tree).unwrap_err();
    assert_eq!(err, Error::Validation(ValidationCode::Data));
    assert!(ctx.last_error_message().unwrap().contains("duplicate"));
}

#[test]
fn test_unique_group_violation() {
    let ctx = context_with(&[MODULE_LIST]);
    let mut tree = parse_json(
        &ctx,
        r#"{"inv:item": [{"id": "a", "serial": "1"}, {"id": "b", "serial": "1"}]}"#,
    )
    .unwrap();
    let err = validate(&ctx, &mut tree).unwrap_err();
    assert_eq!(err, Error::Validation(ValidationCode::Data));
    assert!(ctx.last_error_message().unwrap().contains("unique"));
}

#[test]
fn test_unique_absent_value_not_participating() {
    let ctx = context_with(&[MODULE_LIST]);
    let mut tree = parse_json(
        &ctx,
        r#"{"inv:item": [{"id": "a"}, {"id": "b"}]}"#,
    )
    .unwrap();
    validate(&ctx, &mut tree).unwrap();
}

#[test]
fn test_max_elements_enforced() {
    let ctx = context_with(&[MODULE_LIST]);
    let mut tree = parse_json(
        &ctx,
        r#"{"inv:item": [
             {"id": "a"}, {"id": "b"}, {"id": "c"}, {"id": "d"}
           ]}"#,
    )
    .unwrap();
    let err = validate(&ctx, &mut tree).unwrap_err();
    assert_eq!(err, Error::Validation(ValidationCode::Data));
    assert!(ctx.last_error_message().unwrap().contains("too many"));
}

// ============================================================================
// Deviations
// ============================================================================

const MODULE_DEV: &str = r#"module dev {
  namespace "urn:example:dev";
  prefix dev;

  import base-mod { prefix base; }

  deviation "/base:root/base:existing" {
    deviate not-supported;
  }
}"#;

#[test]
fn test_deviation_not_supported_removes_node() {
    let ctx = context_with(&[MODULE_ROOT, MODULE_DEV]);
    // The deviated leaf no longer exists in the compiled tree.
    let err = parse_json(&ctx, r#"{"base-mod:root": {"existing": "v"}}"#).unwrap_err();
    assert_eq!(err, Error::Validation(ValidationCode::SyntaxJson));

    let base = ctx.get_module("base-mod", None).unwrap();
    let dev = ctx.get_module("dev", None).unwrap();
    assert!(base.deviated_by.contains(&dev.id));
}

// ============================================================================
// XML round trip
// ============================================================================

#[test]
fn test_xml_parse_and_print() {
    let ctx = context_with(&[MODULE_A]);
    let mut tree = parse_xml(&ctx, r#"<x xmlns="urn:example:a">7</x>"#).unwrap();
    validate(&ctx, &mut tree).unwrap();
    let printed = yangkit_core::data::print_xml(&ctx, &tree);
    assert!(printed.contains(">7</x>"), "printed: {printed}");
}

#[test]
fn test_xml_rejects_out_of_range() {
    let ctx = context_with(&[MODULE_A]);
    let err = parse_xml(&ctx, r#"<x xmlns="urn:example:a">99</x>"#).unwrap_err();
    assert_eq!(err, Error::Validation(ValidationCode::Data));
}

// ============================================================================
// Invariant 6: semantic idempotency of recompilation
// ============================================================================

fn schema_shape(ctx: &Context) -> Vec<String> {
    let mut shape = Vec::new();
    for module in ctx.modules() {
        for &child in &module.children {
            collect_shape(ctx, child, &mut shape);
        }
    }
    shape.sort();
    shape
}

fn collect_shape(ctx: &Context, node: yangkit_core::schema::NodeId, out: &mut Vec<String>) {
    let n = ctx.node(node);
    out.push(format!(
        "{} kind={}",
        ctx.schema_path(node),
        match &n.kind {
            yangkit_core::schema::SchemaNodeKind::Container { .. } => "container",
            yangkit_core::schema::SchemaNodeKind::Leaf { .. } => "leaf",
            yangkit_core::schema::SchemaNodeKind::LeafList { .. } => "leaf-list",
            yangkit_core::schema::SchemaNodeKind::List { .. } => "list",
            yangkit_core::schema::SchemaNodeKind::Choice { .. } => "choice",
            yangkit_core::schema::SchemaNodeKind::Case { .. } => "case",
            _ => "other",
        }
    ));
    for &child in n.children() {
        collect_shape(ctx, child, out);
    }
}

#[test]
fn test_recompile_is_semantically_idempotent() {
    let first = context_with(&[MODULE_ROOT, MODULE_C, MODULE_GROUPING]);
    let second = context_with(&[MODULE_ROOT, MODULE_C, MODULE_GROUPING]);
    assert_eq!(schema_shape(&first), schema_shape(&second));
}

// ============================================================================
// Module lookups
// ============================================================================

#[test]
fn test_module_lookup_by_namespace() {
    let ctx = context_with(&[MODULE_A]);
    let module = ctx.get_module_by_namespace("urn:example:a").unwrap();
    assert_eq!(ctx.str(module.name), "a");
    assert!(ctx.get_module_by_namespace("urn:example:nope").is_none());
}

#[test]
fn test_import_requires_loaded_module() {
    let mut ctx = Context::new(ContextOptions::default());
    ctx.parse_module(MODULE_C, SchemaFormat::Yang).unwrap();
    let err = ctx.compile().unwrap_err();
    assert_eq!(err, Error::NotFound);
}
