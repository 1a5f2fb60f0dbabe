use std::path::PathBuf;

use serde_json::json;

use json_kobj::{Context, Declarations, Error, ItemKind, TypeKey, Value};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn shop() -> (Context, TypeKey) {
    let ctx = Context::new();
    let decls = Declarations::load(fixture("shop.json"), &ctx).unwrap();
    decls.declare_into(&ctx);
    let order = ctx.key("Order").unwrap();
    (ctx, order)
}

fn order_json() -> serde_json::Value {
    json!({
        "id": "5A1D2B36-3C1E-4E0F-9B53-8C51E6F3A001",
        "placed_at": "2024-03-01T10:15:00",
        "status": "paid",
        "items": [
            {"sku": "A-1", "quantity": 2, "unit_price": "9.99"},
            {"sku": "B-7", "quantity": 1, "unit_price": "120"}
        ],
        "tags": ["gift", "gift", "express"],
        "dimensions": [10, 20.5, 3],
        "notes": {"door": "leave at back"}
    })
}

#[test]
fn decodes_and_reencodes_an_order() {
    let (ctx, order) = shop();
    let v = ctx.from_json(&serde_json::to_vec(&order_json()).unwrap(), &order).unwrap();

    assert_eq!(v.get("priority"), Some(&Value::Null));
    assert_eq!(v.get("tags"), Some(&Value::set([Value::from("gift"), Value::from("express")])));

    let out = ctx.to_json_value(&v, true).unwrap();
    assert_eq!(
        out,
        json!({
            "id": "5a1d2b36-3c1e-4e0f-9b53-8c51e6f3a001",
            "placed_at": "2024-03-01T10:15:00",
            "status": "paid",
            "items": [
                {"sku": "A-1", "quantity": 2, "unit_price": "9.99"},
                {"sku": "B-7", "quantity": 1, "unit_price": "120"}
            ],
            "tags": ["gift", "express"],
            "dimensions": [10.0, 20.5, 3.0],
            "notes": {"door": "leave at back"}
        })
    );

    let again = ctx.from_json(&ctx.to_json(&v, false).unwrap(), &order).unwrap();
    assert_eq!(again, v);
}

#[test]
fn reports_every_bad_field() {
    let (ctx, order) = shop();
    let mut doc = order_json();
    doc["status"] = json!("lost");
    doc["items"][1]["quantity"] = json!("one");
    doc["dimensions"] = json!([1, 2]);
    let err = ctx.from_json(&serde_json::to_vec(&doc).unwrap(), &order).unwrap_err();

    // The nested line item fails first, before the order itself is built.
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(err.items()[0].field, "quantity");

    doc["items"][1]["quantity"] = json!(1);
    let err = ctx.from_json(&serde_json::to_vec(&doc).unwrap(), &order).unwrap_err();
    let kinds = err.items().iter().map(|i| (i.field.as_str(), i.kind)).collect::<Vec<_>>();
    assert_eq!(kinds, [("status", ItemKind::TypeMismatch), ("dimensions", ItemKind::UnionMismatch)]);

    ctx.set_lazy_type_check(true);
    let err = ctx.from_json(&serde_json::to_vec(&doc).unwrap(), &order).unwrap_err();
    assert_eq!(err.items().len(), 1);
}

#[test]
fn schema_for_an_order() {
    let (ctx, order) = shop();
    let schema = ctx.json_schema(&order).unwrap();

    assert_eq!(schema["title"], "A customer order.");
    assert_eq!(schema["description"], "Everything needed to ship it.");
    assert_eq!(schema["required"], json!(["id", "placed_at", "items"]));
    assert_eq!(schema["properties"]["id"], json!({"type": "string", "format": "uuid", "description": "Order identifier."}));
    assert_eq!(schema["properties"]["placed_at"], json!({"type": "string", "format": "date-time"}));
    assert_eq!(
        schema["properties"]["status"],
        json!({"type": "string", "enum": ["draft", "paid", "shipped"]})
    );
    assert_eq!(
        schema["properties"]["priority"],
        json!({"anyOf": [{"type": "integer", "enum": [0, 1]}, {"type": "null"}], "default": null})
    );
    assert_eq!(schema["properties"]["items"]["items"], json!({"$ref": "#/$defs/LineItem"}));
    assert_eq!(schema["properties"]["parent"]["anyOf"][0], json!({"$ref": "#"}));
    assert_eq!(schema["$defs"].as_object().unwrap().len(), 1);
    assert_eq!(schema["examples"][0]["items"], json!([]));
}
