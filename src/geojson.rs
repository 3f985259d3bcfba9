//! GeoJSON conversion for zones.
//!
//! A zone is a `Feature` with a `Polygon` geometry and the properties
//! `id`, `name`, `level` and `parent_id` (null or absent for a root). The
//! feature's own `id` is used when the `id` property is missing.

use crate::error::{GisError, Result};
use geo::{Coord, LineString, Polygon};
use geojson::feature::Id;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, JsonValue, Value};
use std::str::FromStr;
use zonemap_types::zone::{Zone, ZoneId, ZoneLevel};

fn ring_from_positions(positions: &[Vec<f64>]) -> Result<LineString> {
    let coords = positions
        .iter()
        .map(|position| {
            if position.len() < 2 {
                return Err(GisError::InvalidInput(
                    "Coordinate must have at least 2 values".to_string(),
                ));
            }
            Ok(Coord {
                x: position[0],
                y: position[1],
            })
        })
        .collect::<Result<Vec<Coord>>>()?;
    Ok(LineString::from(coords))
}

fn ring_to_positions(ring: &LineString) -> Vec<Vec<f64>> {
    ring.coords().map(|c| vec![c.x, c.y]).collect()
}

fn polygon_from_value(value: &Value) -> Result<Polygon> {
    let Value::Polygon(rings) = value else {
        return Err(GisError::InvalidInput(
            "Zone geometry must be a Polygon".to_string(),
        ));
    };
    let Some((exterior, holes)) = rings.split_first() else {
        return Err(GisError::InvalidInput(
            "Polygon must have at least one ring".to_string(),
        ));
    };

    let interiors = holes
        .iter()
        .map(|ring| ring_from_positions(ring))
        .collect::<Result<Vec<LineString>>>()?;
    Ok(Polygon::new(ring_from_positions(exterior)?, interiors))
}

fn polygon_to_value(polygon: &Polygon) -> Value {
    let mut rings = vec![ring_to_positions(polygon.exterior())];
    rings.extend(polygon.interiors().iter().map(ring_to_positions));
    Value::Polygon(rings)
}

fn property_u64(feature: &Feature, key: &str) -> Option<u64> {
    feature.property(key).and_then(JsonValue::as_u64)
}

/// Parse one zone feature.
pub fn zone_from_geojson_feature(feature: &Feature) -> Result<Zone> {
    let id = property_u64(feature, "id")
        .or_else(|| match &feature.id {
            Some(Id::Number(n)) => n.as_u64(),
            Some(Id::String(s)) => s.parse().ok(),
            None => None,
        })
        .ok_or_else(|| GisError::InvalidInput("Zone feature has no numeric id".to_string()))?;

    let name = feature
        .property("name")
        .and_then(JsonValue::as_str)
        .unwrap_or_default()
        .to_string();

    let level = property_u64(feature, "level")
        .and_then(|l| u8::try_from(l).ok())
        .ok_or_else(|| GisError::InvalidInput(format!("Zone {} has no valid level", id)))?;

    let parent_id = match feature.property("parent_id") {
        None | Some(JsonValue::Null) => None,
        Some(value) => Some(value.as_u64().ok_or_else(|| {
            GisError::InvalidInput(format!("Zone {} has a non-numeric parent_id", id))
        })?),
    };

    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| GisError::InvalidInput(format!("Zone {} has no geometry", id)))?;

    Ok(Zone::new(
        ZoneId(id),
        name,
        ZoneLevel(level),
        polygon_from_value(&geometry.value)?,
        parent_id.map(ZoneId),
    ))
}

pub fn zone_to_geojson_feature(zone: &Zone) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("id".to_string(), JsonValue::from(zone.id.0));
    properties.insert("name".to_string(), JsonValue::from(zone.name.clone()));
    properties.insert("level".to_string(), JsonValue::from(zone.level.0));
    properties.insert(
        "parent_id".to_string(),
        zone.parent_id
            .map_or(JsonValue::Null, |p| JsonValue::from(p.0)),
    );

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(polygon_to_value(zone.polygon()))),
        id: Some(Id::Number(zone.id.0.into())),
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Parse every feature of a `FeatureCollection` as a zone.
pub fn zones_from_feature_collection(json: &str) -> Result<Vec<Zone>> {
    let parsed = GeoJson::from_str(json)
        .map_err(|e| GisError::InvalidInput(format!("Failed to parse GeoJSON: {}", e)))?;
    let GeoJson::FeatureCollection(collection) = parsed else {
        return Err(GisError::InvalidInput(
            "Expected a GeoJSON FeatureCollection".to_string(),
        ));
    };
    collection
        .features
        .iter()
        .map(zone_from_geojson_feature)
        .collect()
}

pub fn zones_to_feature_collection<'a>(
    zones: impl IntoIterator<Item = &'a Zone>,
) -> Result<String> {
    let collection = FeatureCollection {
        bbox: None,
        features: zones.into_iter().map(zone_to_geojson_feature).collect(),
        foreign_members: None,
    };
    Ok(serde_json::to_string(&collection)?)
}
