use geoanchor_core::{
    DeviceIdentity, GeoCoordinate, ObjectId, ObjectKind, PlacedObject, PlacementRequest,
};
use serde_json::json;

#[test]
fn placed_object_uses_backend_field_names() {
    let object = PlacedObject {
        id: ObjectId::new("4f1c"),
        coordinate: GeoCoordinate::new(12.972, 77.595),
        kind: ObjectKind::Video,
        asset: Some("/uploads/clip.mp4".to_string()),
        owner: DeviceIdentity::parse("device-a").unwrap(),
        created_at: 1_700_000_000,
    };

    let value = serde_json::to_value(&object).unwrap();
    assert_eq!(
        value,
        json!({
            "id": "4f1c",
            "latitude": 12.972,
            "longitude": 77.595,
            "type": "video",
            "asset": "/uploads/clip.mp4",
            "owner": "device-a",
            "created_at": 1_700_000_000,
        })
    );
}

#[test]
fn backend_rows_without_asset_parse_as_cubes() {
    let raw = r#"{
        "id": "a1",
        "latitude": 12.9716,
        "longitude": 77.5946,
        "type": "cube",
        "owner": "device-b",
        "created_at": 1
    }"#;

    let object: PlacedObject = serde_json::from_str(raw).unwrap();
    assert_eq!(object.kind, ObjectKind::Cube);
    assert_eq!(object.asset, None);
    assert!(object.validate().is_ok());
}

#[test]
fn unknown_type_is_rejected() {
    let raw = r#"{"id":"a1","latitude":0,"longitude":0,"type":"sphere","owner":"x","created_at":1}"#;
    assert!(serde_json::from_str::<PlacedObject>(raw).is_err());
}

#[test]
fn placement_request_carries_owner_and_type() {
    let request = PlacementRequest {
        coordinate: GeoCoordinate::new(1.5, -2.5),
        kind: ObjectKind::Cube,
        asset: None,
        owner: DeviceIdentity::parse("device-a").unwrap(),
    };

    let value = serde_json::to_value(&request).unwrap();
    assert_eq!(value["latitude"], json!(1.5));
    assert_eq!(value["longitude"], json!(-2.5));
    assert_eq!(value["type"], json!("cube"));
    assert_eq!(value["owner"], json!("device-a"));
    assert!(value["asset"].is_null());
}
