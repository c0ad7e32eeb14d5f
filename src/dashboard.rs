//! Property → Crop → Station tree shown by the dashboard navigation.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::{Crop, Property, Station, StationPosition};
use crate::weather::Location;

// ---

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationNode {
    pub id: i32,
    pub name: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CropNode {
    pub id: i32,
    pub name: String,
    pub stations: Vec<StationNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyNode {
    pub id: i32,
    pub name: String,
    pub crops: Vec<CropNode>,
}

/// Assemble the navigation tree.
///
/// A station hangs under the crop named by its position, provided the crop
/// belongs to the station's own property. Properties left without crops are
/// dropped; crops without stations are kept.
pub fn build_tree(
    properties: &[Property],
    crops: &[Crop],
    stations: &[Station],
    positions: &[StationPosition],
) -> Vec<PropertyNode> {
    // ---
    let mut tree: Vec<PropertyNode> = properties
        .iter()
        .map(|p| PropertyNode {
            id: p.id,
            name: p.name.clone(),
            crops: Vec::new(),
        })
        .collect();
    let property_index: HashMap<i32, usize> =
        tree.iter().enumerate().map(|(i, p)| (p.id, i)).collect();

    for crop in crops {
        if let Some(&pi) = property_index.get(&crop.property_id) {
            tree[pi].crops.push(CropNode {
                id: crop.id,
                name: crop.name.clone(),
                stations: Vec::new(),
            });
        }
    }

    let stations_by_id: HashMap<i32, &Station> = stations.iter().map(|s| (s.id, s)).collect();

    for pos in positions {
        let Some(station) = stations_by_id.get(&pos.station_id) else {
            continue;
        };
        let Some(&pi) = property_index.get(&station.property_id) else {
            continue;
        };
        if let Some(crop) = tree[pi].crops.iter_mut().find(|c| c.id == pos.crop_id) {
            crop.stations.push(StationNode {
                id: station.id,
                name: station.name.clone(),
                location: Location {
                    lat: pos.latitude,
                    lon: pos.longitude,
                },
            });
        }
    }

    tree.retain(|p| !p.crops.is_empty());
    tree
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn property(id: i32, name: &str) -> Property {
        Property {
            id,
            name: name.to_string(),
        }
    }

    fn crop(id: i32, name: &str, property_id: i32) -> Crop {
        Crop {
            id,
            name: name.to_string(),
            property_id,
        }
    }

    fn station(id: i32, name: &str, property_id: i32) -> Station {
        Station {
            id,
            property_id,
            name: name.to_string(),
            description: None,
        }
    }

    fn position(station_id: i32, crop_id: i32) -> StationPosition {
        StationPosition {
            id: station_id * 10,
            station_id,
            crop_id,
            latitude: -15.6,
            longitude: -47.7,
            registered_at: None,
        }
    }

    #[test]
    fn test_tree_nests_stations_under_their_crop() {
        // ---
        let tree = build_tree(
            &[property(1, "Fazenda Boa Vista"), property(2, "Sítio Novo")],
            &[crop(10, "Soja", 1), crop(11, "Milho", 1), crop(20, "Café", 2)],
            &[station(100, "Estação Norte", 1), station(200, "Estação Sul", 2)],
            &[position(100, 11), position(200, 20)],
        );

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].name, "Fazenda Boa Vista");
        assert_eq!(tree[0].crops.len(), 2);
        assert!(tree[0].crops[0].stations.is_empty());
        assert_eq!(tree[0].crops[1].stations[0].id, 100);
        assert_eq!(tree[0].crops[1].stations[0].location.lat, -15.6);
        assert_eq!(tree[1].crops[0].stations[0].name, "Estação Sul");
    }

    #[test]
    fn test_properties_without_crops_are_dropped() {
        // ---
        let tree = build_tree(
            &[property(1, "A"), property(2, "B")],
            &[crop(10, "Soja", 2)],
            &[],
            &[],
        );
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id, 2);
    }

    #[test]
    fn test_position_pointing_at_foreign_crop_is_ignored() {
        // ---
        // Station 100 belongs to property 1 but its position names a crop of property 2
        let tree = build_tree(
            &[property(1, "A"), property(2, "B")],
            &[crop(10, "Soja", 1), crop(20, "Café", 2)],
            &[station(100, "Norte", 1)],
            &[position(100, 20), position(999, 10)],
        );
        assert!(tree.iter().all(|p| p.crops.iter().all(|c| c.stations.is_empty())));
    }
}
