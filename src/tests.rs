use crate::config::{Dialect, DslConfig};
use crate::error::{ConfigError, PropertyError};
use crate::json::{errors_to_json, snapshot, to_json, validation_errors_to_json, JsonStyle};
use crate::model::{BlockRef, BuildModel};
use crate::value::{Codec, ParsedValue, PropertyValue, Segment};
use crate::{ListPropertyCore, ModelDescriptor, PropertyCore};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

// ── Shared fixture runners ──────────────────────────────────────────

/// Embed fixture files at compile time.
const RESOLVE_FIXTURES: &str = include_str!("../test-data/fixtures/resolve.json");
const PARSE_ERROR_FIXTURES: &str = include_str!("../test-data/fixtures/parse-errors.json");

fn check_resolved(model: &BuildModel, fixture: &serde_json::Value, name: &str, phase: &str) {
    if let Some(expected) = fixture.get("resolved").and_then(|v| v.as_object()) {
        for (path, value) in expected {
            let actual = model
                .find_property(path)
                .scalar(Codec::TEXT)
                .resolved_value()
                .unwrap();
            assert_eq!(
                actual.as_deref(),
                value.as_str(),
                "Fixture '{}' ({}): resolved value of {}",
                name,
                phase,
                path
            );
        }
    }
    if let Some(expected) = fixture.get("lists").and_then(|v| v.as_object()) {
        for (path, items) in expected {
            let expected: Vec<Option<String>> = items
                .as_array()
                .unwrap()
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect();
            let list = model.find_property(path).list(Codec::TEXT);
            assert_eq!(
                list.resolved_value().unwrap(),
                expected,
                "Fixture '{}' ({}): resolved list {}",
                name,
                phase,
                path
            );
            assert_eq!(
                resolved_items(&list),
                expected,
                "Fixture '{}' ({}): editable values of {}",
                name,
                phase,
                path
            );
        }
    }
}

#[test]
fn test_fixture_resolve() {
    let fixtures: Vec<serde_json::Value> = serde_json::from_str(RESOLVE_FIXTURES).unwrap();

    for fixture in &fixtures {
        let name = fixture["name"].as_str().unwrap();
        let input = fixture["input"].as_str().unwrap();
        let model = BuildModel::parse(input)
            .unwrap_or_else(|err| panic!("Fixture '{}': unexpected parse error: {}", name, err));

        check_resolved(&model, fixture, name, "parsed");
        model.apply_and_reparse().unwrap_or_else(|err| {
            panic!(
                "Fixture '{}': printed text does not parse: {}\n{}",
                name,
                err,
                model.text()
            )
        });
        check_resolved(&model, fixture, name, "reparsed");
    }
}

#[test]
fn test_fixture_parse_errors() {
    let fixtures: Vec<serde_json::Value> = serde_json::from_str(PARSE_ERROR_FIXTURES).unwrap();

    for fixture in &fixtures {
        let name = fixture["name"].as_str().unwrap();
        let input = fixture["input"].as_str().unwrap();
        let result = BuildModel::parse(input);
        assert!(
            result.is_err(),
            "Fixture '{}': expected a syntax error but parsing succeeded",
            name
        );
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

const ANDROID_EXT: &str = r#"ext {
  propB = "2"
  propC = "3"
  propRef = propB
  propInterpolated = "${propB}nd"
  propList = ["1", propB, propC, propRef, propInterpolated]
  propListRef = propList
}
"#;

fn resolved_items<T>(list: &ListPropertyCore<T>) -> Vec<Option<T>> {
    list.editable_values()
        .unwrap()
        .iter()
        .map(|item| item.resolved_value().unwrap())
        .collect()
}

fn strings(values: &[&str]) -> Vec<Option<String>> {
    values.iter().map(|v| Some(v.to_string())).collect()
}

fn prop_list(model: &BuildModel) -> ListPropertyCore<String> {
    model.ext().find_property("propList").list(Codec::STRING)
}

fn ext_string(model: &BuildModel, name: &str) -> PropertyCore<String> {
    model.ext().find_property(name).scalar(Codec::STRING)
}

// ── List scenarios ──────────────────────────────────────────────────

#[test]
fn test_property_values() {
    let model = BuildModel::parse(ANDROID_EXT).unwrap();
    let expected = strings(&["1", "2", "3", "2", "2nd"]);

    assert_eq!(resolved_items(&prop_list(&model)), expected);

    let alias = model.ext().find_property("propListRef").list(Codec::STRING);
    assert_eq!(resolved_items(&alias), expected);
    assert_eq!(alias.alias_of().unwrap(), Some("propList".to_string()));

    // Elements keep their own parsed form.
    let parsed: Vec<_> = prop_list(&model)
        .editable_values()
        .unwrap()
        .iter()
        .map(|item| item.parsed_value().unwrap())
        .collect();
    assert_eq!(
        parsed,
        vec![
            ParsedValue::Literal("1".to_string(), "\"1\"".to_string()),
            ParsedValue::Reference("propB".to_string()),
            ParsedValue::Reference("propC".to_string()),
            ParsedValue::Reference("propRef".to_string()),
            ParsedValue::Reference("propInterpolated".to_string()),
        ]
    );
}

#[test]
fn test_write_property_values() {
    let model = BuildModel::parse(ANDROID_EXT).unwrap();
    let values = prop_list(&model).editable_values().unwrap();

    values[0].set_literal("A".to_string()).unwrap();
    values[1].set_reference("propC").unwrap();
    values[2].set_interpolated_str("${propC}rd").unwrap();
    values[3].set_literal("D".to_string()).unwrap();
    values[4].set_literal("E".to_string()).unwrap();

    let expected = strings(&["A", "3", "3rd", "D", "E"]);
    assert_eq!(resolved_items(&prop_list(&model)), expected);
    assert!(model.is_modified());

    model.apply_and_reparse().unwrap();
    assert!(!model.is_modified());
    assert_eq!(resolved_items(&prop_list(&model)), expected);
    assert_eq!(
        model.text(),
        r#"ext {
  propB = "2"
  propC = "3"
  propRef = propB
  propInterpolated = "${propB}nd"
  propList = ['A', propC, "${propC}rd", 'D', 'E']
  propListRef = propList
}
"#
    );
}

#[test]
fn test_add_remove_values() {
    let model = BuildModel::parse(ANDROID_EXT).unwrap();
    let list = prop_list(&model);

    list.delete_item(0).unwrap();
    let values = list.editable_values().unwrap();
    values[0].set_reference("propC").unwrap();
    values[1].set_interpolated_str("${propC}rd").unwrap();
    values[2].set_literal("D".to_string()).unwrap();
    values[3].set_literal("E".to_string()).unwrap();

    list.add_item(4)
        .unwrap()
        .set_literal("ZZ".to_string())
        .unwrap();

    let expected = strings(&["3", "3rd", "D", "E", "ZZ"]);
    assert_eq!(resolved_items(&prop_list(&model)), expected);
    model.apply_and_reparse().unwrap();
    assert_eq!(resolved_items(&prop_list(&model)), expected);
}

#[test]
fn test_insert_remove_values() {
    let model = BuildModel::parse(ANDROID_EXT).unwrap();
    let list = prop_list(&model);

    list.delete_item(2).unwrap();
    let values = list.editable_values().unwrap();
    values[0].set_reference("propC").unwrap();
    values[1].set_interpolated_str("${propC}rd").unwrap();
    values[2].set_literal("D".to_string()).unwrap();
    values[3].set_literal("E".to_string()).unwrap();

    list.add_item(0)
        .unwrap()
        .set_literal("ZZ".to_string())
        .unwrap();

    let expected = strings(&["ZZ", "3", "3rd", "D", "E"]);
    assert_eq!(resolved_items(&prop_list(&model)), expected);
    model.apply_and_reparse().unwrap();
    assert_eq!(resolved_items(&prop_list(&model)), expected);
}

#[test]
fn test_delete_then_insert_keeps_parsed_forms() {
    let model = BuildModel::parse(ANDROID_EXT).unwrap();
    let list = prop_list(&model);

    list.delete_item(1).unwrap();
    let parsed: Vec<_> = list
        .editable_values()
        .unwrap()
        .iter()
        .map(|item| item.parsed_value().unwrap())
        .collect();
    assert_eq!(parsed.len(), 4);
    assert_eq!(parsed[1], ParsedValue::Reference("propC".to_string()));
    assert_eq!(parsed[3], ParsedValue::Reference("propInterpolated".to_string()));

    let added = list.add_item(2).unwrap();
    assert_eq!(added.parsed_value().unwrap(), ParsedValue::NotSet);
    assert_eq!(list.len().unwrap(), 5);
    added.set_reference("propB").unwrap();
    assert_eq!(
        resolved_items(&list),
        strings(&["1", "3", "2", "2", "2nd"])
    );
}

#[test]
fn test_add_item_creates_missing_list() {
    let model = BuildModel::parse("ext {\n}\n").unwrap();
    let list = model.ext().find_property("abis").list(Codec::STRING);
    assert!(list.is_empty().unwrap());

    list.add_item(0).unwrap().set_literal("x86".to_string()).unwrap();
    list.add_item(1).unwrap().set_literal("arm64".to_string()).unwrap();
    model.apply_and_reparse().unwrap();

    assert_eq!(model.text(), "ext {\n  abis = ['x86', 'arm64']\n}\n");
    let list = model.ext().find_property("abis").list(Codec::STRING);
    assert_eq!(resolved_items(&list), strings(&["x86", "arm64"]));
}

#[test]
fn test_unset_list_slots_are_not_written() {
    let model = BuildModel::parse("xs = ['a', 'b', 'c']\n").unwrap();
    let list = model.find_property("xs").list(Codec::STRING);
    list.add_item(1).unwrap();
    list.editable_values().unwrap()[3].delete().unwrap();

    let values = list.editable_values().unwrap();
    assert_eq!(values.len(), 4);
    assert_eq!(values[1].parsed_value().unwrap(), ParsedValue::NotSet);
    assert_eq!(values[3].parsed_value().unwrap(), ParsedValue::NotSet);

    model.apply_and_reparse().unwrap();
    assert_eq!(model.text(), "xs = ['a', 'b']\n");
}

#[test]
fn test_indexed_reference_skips_unset_slots() {
    let model = BuildModel::parse("xs = ['a', 'b', 'c']\ny = xs[1]\n").unwrap();
    let y = model.find_property("y").scalar(Codec::STRING);
    assert_eq!(y.resolved_value().unwrap(), Some("b".to_string()));

    let list = model.find_property("xs").list(Codec::STRING);
    list.add_item(0).unwrap();
    assert_eq!(y.resolved_value().unwrap(), Some("b".to_string()));

    // Slots are now [unset, 'a', 'b', 'c']; dropping 'b' moves 'c' to xs[1].
    list.editable_values().unwrap()[2].delete().unwrap();
    assert_eq!(y.resolved_value().unwrap(), Some("c".to_string()));
    assert!(model.validate_references().is_empty());

    model.apply_and_reparse().unwrap();
    assert_eq!(model.text(), "xs = ['a', 'c']\ny = xs[1]\n");
    let y = model.find_property("y").scalar(Codec::STRING);
    assert_eq!(y.resolved_value().unwrap(), Some("c".to_string()));
}

#[test]
fn test_unresolvable_alias_is_not_overwritten() {
    let model = BuildModel::parse("ext {\n  dangling = missing\n  a = b\n  b = a\n}\n").unwrap();
    for name in ["dangling", "a"] {
        let list = model.ext().find_property(name).list(Codec::STRING);
        assert!(list.is_empty().unwrap());
        assert!(matches!(list.add_item(0), Err(PropertyError::ReadOnlyAlias { .. })));
        assert!(matches!(list.delete_item(0), Err(PropertyError::ReadOnlyAlias { .. })));
    }
    let dangling = model.ext().find_property("dangling").list(Codec::STRING);
    assert_eq!(dangling.alias_of().unwrap(), Some("missing".to_string()));
    assert!(!model.is_modified());
}

// ── Scalar semantics ────────────────────────────────────────────────

#[test]
fn test_reference_transparency() {
    let model = BuildModel::parse(ANDROID_EXT).unwrap();
    let prop_ref = ext_string(&model, "propRef");
    assert_eq!(
        prop_ref.value().unwrap(),
        PropertyValue {
            parsed: ParsedValue::Reference("propB".to_string()),
            resolved: Some("2".to_string()),
            external: None,
        }
    );
}

#[test]
fn test_interpolation_composition() {
    let model = BuildModel::parse(ANDROID_EXT).unwrap();
    let prop = ext_string(&model, "propInterpolated");
    assert_eq!(
        prop.parsed_value().unwrap(),
        ParsedValue::InterpolatedString(vec![
            Segment::reference("propB"),
            Segment::text("nd"),
        ])
    );
    assert_eq!(prop.resolved_value().unwrap(), Some("2nd".to_string()));

    // Changing the referenced value changes the composition.
    ext_string(&model, "propB").set_literal("4".to_string()).unwrap();
    assert_eq!(prop.resolved_value().unwrap(), Some("4nd".to_string()));
}

#[test]
fn test_set_interpolated_segments() {
    let model = BuildModel::parse(ANDROID_EXT).unwrap();
    let prop = ext_string(&model, "propNew");
    prop.set_interpolated(&[
        Segment::text("v"),
        Segment::reference("propC"),
        Segment::text("."),
        Segment::reference("propB"),
    ])
    .unwrap();
    assert_eq!(prop.resolved_value().unwrap(), Some("v3.2".to_string()));

    // Without references the result is a plain literal.
    prop.set_interpolated(&[Segment::text("plain")]).unwrap();
    assert_eq!(
        prop.parsed_value().unwrap(),
        ParsedValue::Literal("plain".to_string(), "'plain'".to_string())
    );
}

#[test]
fn test_literal_is_not_equal_to_reference() {
    let literal: ParsedValue<String> = ParsedValue::Literal("2".to_string(), "'2'".to_string());
    let reference: ParsedValue<String> = ParsedValue::Reference("propB".to_string());
    assert_ne!(literal, reference);
}

#[test]
fn test_set_literal_reports_canonical_text() {
    let model = BuildModel::parse("ext {\n  count = 3\n  name = 'x'\n}\n").unwrap();
    let count = model.ext().find_property("count").scalar(Codec::INTEGER);
    assert_eq!(
        count.parsed_value().unwrap(),
        ParsedValue::Literal(3, "3".to_string())
    );

    let name = model.ext().find_property("name").scalar(Codec::INTEGER);
    assert_eq!(name.parsed_value().unwrap(), ParsedValue::Unknown("'x'".to_string()));
    assert_eq!(name.resolved_value().unwrap(), None);

    name.set_literal(5).unwrap();
    assert_eq!(name.parsed_value().unwrap(), ParsedValue::Literal(5, "5".to_string()));
    assert_eq!(name.parsed_value().unwrap().literal(), Some(&5));
}

#[test]
fn test_literal_text_is_the_source_text() {
    let model = BuildModel::parse(ANDROID_EXT).unwrap();
    let written = ParsedValue::Literal("2".to_string(), "\"2\"".to_string());
    assert_eq!(ext_string(&model, "propB").parsed_value().unwrap(), written);

    model.apply_and_reparse().unwrap();
    assert_eq!(model.text(), ANDROID_EXT);
    assert_eq!(ext_string(&model, "propB").parsed_value().unwrap(), written);

    // Rewriting the same value switches to the canonical form.
    let prop_b = ext_string(&model, "propB");
    prop_b.set_literal("2".to_string()).unwrap();
    assert_eq!(
        prop_b.parsed_value().unwrap(),
        ParsedValue::Literal("2".to_string(), "'2'".to_string())
    );
}

#[test]
fn test_non_finite_decimal_is_rejected() {
    let model = BuildModel::parse("x = 1.5\n").unwrap();
    let x = model.find_property("x").scalar(Codec::DECIMAL);
    for value in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
        assert!(matches!(
            x.set_literal(value),
            Err(PropertyError::InvalidLiteral { .. })
        ));
    }
    assert!(!model.is_modified());

    x.set_literal(2.25).unwrap();
    model.apply_and_reparse().unwrap();
    assert_eq!(model.text(), "x = 2.25\n");
    let x = model.find_property("x").scalar(Codec::DECIMAL);
    assert_eq!(
        x.parsed_value().unwrap(),
        ParsedValue::Literal(2.25, "2.25".to_string())
    );
}

#[test]
fn test_unknown_text_must_read_back() {
    let model = BuildModel::parse("x = 1\n").unwrap();
    let x = model.find_property("x").scalar(Codec::INTEGER);
    for raw in ["}", "1\ny = 2", ""] {
        assert!(matches!(
            x.set_parsed_value(ParsedValue::Unknown(raw.to_string())),
            Err(PropertyError::InvalidLiteral { .. })
        ));
    }
    assert!(!model.is_modified());

    x.set_parsed_value(ParsedValue::Unknown("file('a')".to_string()))
        .unwrap();
    model.apply_and_reparse().unwrap();
    assert_eq!(model.text(), "x = file('a')\n");
}

#[test]
fn test_reparse_discards_unapplied_changes() {
    let model = BuildModel::parse(ANDROID_EXT).unwrap();
    ext_string(&model, "propB").set_literal("9".to_string()).unwrap();
    assert!(model.is_modified());

    model.reparse().unwrap();
    assert!(!model.is_modified());
    assert_eq!(
        ext_string(&model, "propB").resolved_value().unwrap(),
        Some("2".to_string())
    );
}

#[test]
fn test_unknown_survives_round_trip() {
    let text = "apply plugin: 'java'\next {\n  f = file('a.txt')\n  n = 10L\n}\n";
    let model = BuildModel::parse(text).unwrap();
    let before = ext_string(&model, "f").parsed_value().unwrap();
    assert_eq!(before, ParsedValue::Unknown("file('a.txt')".to_string()));

    model.apply_and_reparse().unwrap();
    assert_eq!(ext_string(&model, "f").parsed_value().unwrap(), before);
    assert_eq!(
        ext_string(&model, "n").parsed_value().unwrap(),
        ParsedValue::Unknown("10L".to_string())
    );
    assert_eq!(model.text(), text);
}

#[test]
fn test_delete_makes_property_not_set() {
    let model = BuildModel::parse(ANDROID_EXT).unwrap();
    let prop_b = ext_string(&model, "propB");
    prop_b.delete().unwrap();

    assert!(!prop_b.parsed_value().unwrap().is_set());
    assert_eq!(ext_string(&model, "propRef").resolved_value().unwrap(), None);
    assert!(!model.ext().find_property("propB").exists());

    model.apply_and_reparse().unwrap();
    assert!(!model.text().contains("propB ="));
}

#[test]
fn test_dangling_reference_is_legal() {
    let model = BuildModel::parse(ANDROID_EXT).unwrap();
    let prop = ext_string(&model, "propC");
    prop.set_reference("nowhere").unwrap();
    assert_eq!(
        prop.parsed_value().unwrap(),
        ParsedValue::Reference("nowhere".to_string())
    );
    assert_eq!(prop.resolved_value().unwrap(), None);
}

#[test]
fn test_invalid_reference_is_rejected() {
    let model = BuildModel::parse(ANDROID_EXT).unwrap();
    let prop = ext_string(&model, "propC");
    for name in ["1abc", "a b", "", "a..b", "${x}"] {
        assert_eq!(
            prop.set_reference(name),
            Err(PropertyError::InvalidReference {
                reference: name.to_string()
            })
        );
    }
    assert!(matches!(
        prop.set_interpolated_str("${a + b}"),
        Err(PropertyError::InvalidReference { .. })
    ));
    assert!(!model.is_modified());
    assert_eq!(prop.resolved_value().unwrap(), Some("3".to_string()));
}

#[test]
fn test_cyclic_references_terminate() {
    let model = BuildModel::parse("ext {\n  a = b\n  b = \"x${a}\"\n  c = a\n}\n").unwrap();
    for name in ["a", "b", "c"] {
        assert_eq!(ext_string(&model, name).resolved_value().unwrap(), None);
    }
}

// ── Handle lifetime ─────────────────────────────────────────────────

#[test]
fn test_handles_go_stale_after_reparse() {
    let model = BuildModel::parse(ANDROID_EXT).unwrap();
    let prop = ext_string(&model, "propB");
    let element = prop_list(&model).editable_values().unwrap().remove(0);

    model.apply_and_reparse().unwrap();
    assert_eq!(model.generation(), 1);

    let stale: Result<ParsedValue<String>, PropertyError> = Err(PropertyError::StaleHandle {
        property: "ext.propB".to_string(),
    });
    assert_eq!(prop.parsed_value(), stale);
    assert!(matches!(
        element.set_literal("x".to_string()),
        Err(PropertyError::StaleHandle { .. })
    ));
    assert!(!model.is_modified());
}

#[test]
fn test_list_mutation_invalidates_later_handles() {
    let model = BuildModel::parse(ANDROID_EXT).unwrap();
    let list = prop_list(&model);
    let values = list.editable_values().unwrap();

    list.delete_item(1).unwrap();

    assert_eq!(values[0].resolved_value().unwrap(), Some("1".to_string()));
    for value in &values[1..] {
        assert!(matches!(
            value.resolved_value(),
            Err(PropertyError::StaleHandle { .. })
        ));
    }
}

#[test]
fn test_handles_go_stale_when_session_is_dropped() {
    let model = BuildModel::parse(ANDROID_EXT).unwrap();
    let prop = ext_string(&model, "propB");
    drop(model);
    assert!(matches!(
        prop.resolved_value(),
        Err(PropertyError::StaleHandle { .. })
    ));
}

#[test]
fn test_index_out_of_range_leaves_tree_untouched() {
    let model = BuildModel::parse(ANDROID_EXT).unwrap();
    let list = prop_list(&model);

    assert_eq!(
        list.delete_item(5),
        Err(PropertyError::IndexOutOfRange {
            property: "ext.propList".to_string(),
            index: 5,
            len: 5,
        })
    );
    assert!(matches!(
        list.add_item(6),
        Err(PropertyError::IndexOutOfRange { index: 6, len: 5, .. })
    ));
    assert!(!model.is_modified());
    assert_eq!(list.len().unwrap(), 5);
}

#[test]
fn test_alias_writes_are_rejected() {
    let model = BuildModel::parse(ANDROID_EXT).unwrap();
    let alias = model.ext().find_property("propListRef").list(Codec::STRING);

    assert!(matches!(
        alias.add_item(0),
        Err(PropertyError::ReadOnlyAlias { .. })
    ));
    assert!(matches!(
        alias.delete_item(0),
        Err(PropertyError::ReadOnlyAlias { .. })
    ));
    let first = alias.editable_values().unwrap().remove(0);
    assert_eq!(
        first.set_literal("x".to_string()),
        Err(PropertyError::ReadOnlyAlias {
            property: "ext.propListRef[0]".to_string(),
            target: "propList".to_string(),
        })
    );
    assert!(!model.is_modified());

    // Rebinding the alias itself is allowed.
    alias.set_reference("propB").unwrap();
    assert!(matches!(
        alias.editable_values(),
        Err(PropertyError::NotAList { .. })
    ));
}

// ── Descriptors ─────────────────────────────────────────────────────

#[derive(Clone)]
struct AndroidModel {
    build: BuildModel,
    defaults: Rc<HashMap<String, String>>,
    modified: Rc<Cell<usize>>,
}

fn android_model(text: &str) -> AndroidModel {
    let mut defaults = HashMap::new();
    defaults.insert("propB".to_string(), "default-b".to_string());
    AndroidModel {
        build: BuildModel::parse(text).unwrap(),
        defaults: Rc::new(defaults),
        modified: Rc::new(Cell::new(0)),
    }
}

fn android_descriptor() -> ModelDescriptor<AndroidModel, Rc<HashMap<String, String>>, BlockRef> {
    ModelDescriptor::new(
        |model: &AndroidModel| Some(model.defaults.clone()),
        |model: &AndroidModel| Some(model.build.ext()),
        |model: &AndroidModel| model.modified.set(model.modified.get() + 1),
    )
}

#[test]
fn test_descriptor_marks_model_modified() {
    let model = android_model(ANDROID_EXT);
    let descriptor = android_descriptor();
    let prop_b = descriptor.property(
        "propB",
        |defaults: &Rc<HashMap<String, String>>| defaults.get("propB").cloned(),
        |ext: &BlockRef| Some(ext.find_property("propB")),
        Codec::STRING,
    );
    let prop_list = descriptor.list_property(
        "propList",
        |_: &Rc<HashMap<String, String>>| None,
        |ext: &BlockRef| Some(ext.find_property("propList")),
        Codec::STRING,
    );

    let bound = prop_b.bind(&model).unwrap();
    assert_eq!(bound.external_value(), Some("default-b".to_string()));
    assert_eq!(bound.resolved_value().unwrap(), Some("2".to_string()));

    bound.set_literal("7".to_string()).unwrap();
    bound.set_literal("7".to_string()).unwrap();
    assert_eq!(model.modified.get(), 2);

    let list = prop_list.bind(&model).unwrap();
    list.delete_item(0).unwrap();
    list.editable_values().unwrap()[0]
        .set_reference("propC")
        .unwrap();
    assert_eq!(model.modified.get(), 4);

    // Failed mutations do not mark.
    assert!(list.delete_item(10).is_err());
    assert_eq!(model.modified.get(), 4);
    assert_eq!(list.external_value(), None);

    model.build.apply_and_reparse().unwrap();
    let list = prop_list.bind(&model).unwrap();
    assert_eq!(resolved_items(&list), strings(&["3", "3", "7", "7nd"]));
}

#[test]
fn test_descriptor_without_node_is_not_bound() {
    let model = android_model(ANDROID_EXT);
    let prop = android_descriptor().property(
        "missing",
        |_: &Rc<HashMap<String, String>>| None,
        |_: &BlockRef| None,
        Codec::STRING,
    );
    assert!(matches!(
        prop.bind(&model),
        Err(PropertyError::NotBound { description }) if description == "missing"
    ));
}

// ── Dialects & configuration ────────────────────────────────────────

#[test]
fn test_kotlin_dialect_printing() {
    let config = DslConfig {
        dialect: Dialect::Kotlin,
        indent_width: 4,
    };
    let model = BuildModel::with_config("android {\n  compileSdkVersion(30)\n}\n", config).unwrap();
    let sdk = model
        .block("android")
        .find_property("compileSdkVersion")
        .scalar(Codec::INTEGER);
    sdk.set_literal(31).unwrap();

    let abis = model.block("android").find_property("abis").list(Codec::STRING);
    abis.add_item(0).unwrap().set_literal("x86".to_string()).unwrap();

    model.apply_and_reparse().unwrap();
    assert_eq!(
        model.text(),
        "android {\n    compileSdkVersion(31)\n    abis = listOf(\"x86\")\n}\n"
    );
}

#[test]
fn test_config_from_toml() {
    let config = DslConfig::from_toml_str("dialect = \"kotlin\"\nindent_width = 4\n").unwrap();
    assert_eq!(
        config,
        DslConfig {
            dialect: Dialect::Kotlin,
            indent_width: 4,
        }
    );
    assert_eq!(DslConfig::from_toml_str("").unwrap(), DslConfig::default());
    assert!(matches!(
        DslConfig::from_toml_str("dialect = \"cobol\""),
        Err(ConfigError::Toml(_))
    ));
    assert_eq!(
        Dialect::from_path(std::path::Path::new("app/build.gradle.kts")),
        Dialect::Kotlin
    );
}

// ── Reference validation & JSON ─────────────────────────────────────

#[test]
fn test_validate_references() {
    let model = BuildModel::parse(
        "ext {\n  a = missing\n  b = c\n  c = b\n  d = [\"${nope}\", a]\n  ok = a\n}\n",
    )
    .unwrap();
    let errors: Vec<_> = model
        .validate_references()
        .into_iter()
        .map(|err| (err.path.join("."), err.code))
        .collect();
    assert_eq!(
        errors,
        vec![
            ("ext.a".to_string(), "unresolved-reference"),
            ("ext.b".to_string(), "cyclic-reference"),
            ("ext.c".to_string(), "cyclic-reference"),
            ("ext.d.[0]".to_string(), "unresolved-reference"),
        ]
    );

    let json: serde_json::Value =
        serde_json::from_str(&validation_errors_to_json(&model.validate_references()).unwrap())
            .unwrap();
    assert_eq!(json[0]["path"], serde_json::json!(["ext", "a"]));
    assert_eq!(json[0]["code"], "unresolved-reference");
}

#[test]
fn test_syntax_errors_to_json() {
    let err = BuildModel::parse("ext {\n  a = 'x'\n").err().unwrap();
    let json: serde_json::Value = serde_json::from_str(&errors_to_json(&[err.clone()]).unwrap()).unwrap();
    assert_eq!(json[0]["code"], "dsl-syntax-error");
    assert_eq!(json[0]["message"], err.message.as_str());
    assert_eq!(json[0]["begin"]["line"], err.span.begin.line);
}

#[test]
fn test_parsed_value_json_shape() {
    let value: ParsedValue<String> = ParsedValue::Reference("propB".to_string());
    assert_eq!(
        serde_json::to_value(&value).unwrap(),
        serde_json::json!({"kind": "reference", "value": "propB"})
    );
    let value: ParsedValue<i64> = ParsedValue::Literal(3, "3".to_string());
    assert_eq!(
        serde_json::to_value(&value).unwrap(),
        serde_json::json!({"kind": "literal", "value": [3, "3"]})
    );
    assert_eq!(
        serde_json::to_value(ParsedValue::<i64>::NotSet).unwrap(),
        serde_json::json!({"kind": "not_set"})
    );
}

#[test]
fn test_snapshot() {
    let model = BuildModel::parse(ANDROID_EXT).unwrap();
    let props = snapshot(&model).unwrap();
    let paths: Vec<_> = props.iter().map(|p| p.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "ext.propB",
            "ext.propC",
            "ext.propRef",
            "ext.propInterpolated",
            "ext.propList",
            "ext.propListRef",
        ]
    );
    assert_eq!(props[2].resolved.as_deref(), Some("2"));
    assert!(props[2].items.is_none());
    let alias_items = props[5].items.as_ref().unwrap();
    assert_eq!(alias_items.len(), 5);
    assert_eq!(alias_items[4].resolved.as_deref(), Some("2nd"));

    let json = to_json(&props, JsonStyle::Compact).unwrap();
    assert!(json.contains(r#""path":"ext.propListRef""#));
}

// ── Model check ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum ItemText {
    Literal(String),
    Reference(&'static str),
    Interpolated(&'static str, String),
}

impl ItemText {
    fn write(&self, item: &PropertyCore<String>) -> Result<(), PropertyError> {
        match self {
            ItemText::Literal(s) => item.set_literal(s.clone()),
            ItemText::Reference(name) => item.set_reference(name),
            ItemText::Interpolated(name, s) => {
                item.set_interpolated(&[Segment::reference(*name), Segment::text(s.clone())])
            }
        }
    }

    fn resolved(&self) -> String {
        let lookup = |name: &str| if name == "r1" { "x" } else { "y" };
        match self {
            ItemText::Literal(s) => s.clone(),
            ItemText::Reference(name) => lookup(name).to_string(),
            ItemText::Interpolated(name, s) => format!("{}{}", lookup(name), s),
        }
    }
}

#[derive(Debug, Clone)]
enum ListOp {
    Insert(usize, ItemText),
    /// `add_item` without assigning the new slot.
    InsertUnset(usize),
    Delete(usize),
}

fn arb_ref_name() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("r1"), Just("r2")]
}

fn arb_item_text() -> impl Strategy<Value = ItemText> {
    prop_oneof![
        "[a-z]{1,3}".prop_map(ItemText::Literal),
        arb_ref_name().prop_map(ItemText::Reference),
        (arb_ref_name(), "[a-z]{1,3}").prop_map(|(name, s)| ItemText::Interpolated(name, s)),
    ]
}

fn arb_list_op() -> impl Strategy<Value = ListOp> {
    prop_oneof![
        (0usize..8, arb_item_text()).prop_map(|(i, item)| ListOp::Insert(i, item)),
        (0usize..8).prop_map(ListOp::InsertUnset),
        (0usize..8).prop_map(ListOp::Delete),
    ]
}

const MODEL_CHECK_FILE: &str = "ext {\n  r1 = 'x'\n  r2 = 'y'\n  xs = ['a', r1]\n  pick = xs[1]\n}\n";

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Inserting and deleting through the list binding behaves like a
    /// `Vec` of slots, and an indexed reference into the list follows the
    /// written items, before and after a round trip through text.
    #[test]
    fn prop_list_edits_match_vec(ops in prop::collection::vec(arb_list_op(), 0..12)) {
        let model = BuildModel::parse(MODEL_CHECK_FILE).unwrap();
        let mut slots: Vec<Option<String>> = vec![Some("a".to_string()), Some("x".to_string())];

        for op in &ops {
            let list = model.ext().find_property("xs").list(Codec::STRING);
            match op {
                ListOp::Insert(i, item) => {
                    let index = i % (slots.len() + 1);
                    item.write(&list.add_item(index).unwrap()).unwrap();
                    slots.insert(index, Some(item.resolved()));
                }
                ListOp::InsertUnset(i) => {
                    let index = i % (slots.len() + 1);
                    list.add_item(index).unwrap();
                    slots.insert(index, None);
                }
                ListOp::Delete(i) => {
                    if slots.is_empty() {
                        prop_assert!(list.delete_item(0).is_err());
                        continue;
                    }
                    let index = i % slots.len();
                    list.delete_item(index).unwrap();
                    slots.remove(index);
                }
            }
        }

        let written: Vec<Option<String>> = slots.iter().flatten().cloned().map(Some).collect();
        let pick = || model.ext().find_property("pick").scalar(Codec::STRING);
        let list = model.ext().find_property("xs").list(Codec::STRING);
        prop_assert_eq!(resolved_items(&list), slots.clone());
        prop_assert_eq!(list.resolved_value().unwrap(), written.clone());
        prop_assert_eq!(pick().resolved_value().unwrap(), written.get(1).cloned().flatten());

        model.apply_and_reparse().unwrap();
        let list = model.ext().find_property("xs").list(Codec::STRING);
        prop_assert_eq!(resolved_items(&list), written.clone());
        prop_assert_eq!(pick().resolved_value().unwrap(), written.get(1).cloned().flatten());
    }
}
