//! Tests for partition module

use super::*;
use crate::config::ParentConfig;
use crate::error::Error;
use serde_json::json;

fn record(value: serde_json::Value) -> crate::types::Record {
    value.as_object().cloned().unwrap()
}

#[test]
fn test_slice_for_string_key() {
    let router = ParentRouter::new("sale_invoice", "sale", "SaleID");
    let slice = router
        .slice_for(record(json!({"SaleID": "a1", "Customer": "Bob"})))
        .unwrap();

    assert_eq!(slice.key, "a1");
    assert_eq!(slice.parent["Customer"], "Bob");
    assert!(slice.sub_parent.is_none());
    assert_eq!(slice.template_value()["SaleID"], "a1");
}

#[test]
fn test_slice_for_numeric_key() {
    let router = ParentRouter::new("sale_invoice", "sale", "SaleID");
    let slice = router.slice_for(record(json!({"SaleID": 2}))).unwrap();
    assert_eq!(slice.key, "2");
}

#[test]
fn test_slice_for_nested_key() {
    let router = ParentRouter::new("child", "parent", "Link.ID");
    let slice = router
        .slice_for(record(json!({"Link": {"ID": "x"}})))
        .unwrap();
    assert_eq!(slice.key, "x");
}

#[test]
fn test_slice_for_missing_key() {
    let router = ParentRouter::new("sale_invoice", "sale", "SaleID");

    for parent in [json!({"ID": "1"}), json!({"SaleID": null}), json!({"SaleID": ""})] {
        match router.slice_for(record(parent)) {
            Err(Error::Partition { stream, message }) => {
                assert_eq!(stream, "sale_invoice");
                assert!(message.contains("SaleID"));
            }
            other => panic!("Expected Partition error, got {other:?}"),
        }
    }
}

#[test]
fn test_from_config() {
    let parent = ParentConfig {
        stream: "sale".to_string(),
        key: "SaleID".to_string(),
    };
    let router = ParentRouter::from_config("sale_invoice", &parent);
    assert_eq!(router.parent_stream(), "sale");
    assert_eq!(router.parent_key(), "SaleID");
}
