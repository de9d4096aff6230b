//! Loading of the static zone reference layers and point lookups against them.

use crate::types::zone::{coerce_zone_id, ZoneLayerKind};
use crate::zones::error::ZoneError;
use async_compression::tokio::bufread::GzipDecoder;
use geo::{BoundingRect, Coord, Intersects, LineString, MultiPolygon, Point, Polygon};
use geojson::{Feature, GeoJson, PolygonType, Value};
use log::{debug, info};
use rstar::{Envelope, PointDistance, RTree, RTreeObject, AABB};
use std::path::Path;
use tokio::io::{AsyncReadExt, BufReader};

/// A zone polygon as held in the layer's spatial index.
#[derive(Debug, Clone)]
struct ZoneShape {
    /// Position of the source feature in the layer, used to break ties between
    /// overlapping polygons.
    position: usize,
    zone_id: Option<i64>,
    shape: MultiPolygon<f64>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for ZoneShape {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

// Distances are to the bounding box; the exact test happens in `ZoneLayer::locate`.
impl PointDistance for ZoneShape {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        self.envelope.distance_2(point)
    }

    fn contains_point(&self, point: &[f64; 2]) -> bool {
        self.envelope.contains_point(point)
    }
}

/// The polygon a point was matched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneMatch {
    pub position: usize,
    pub zone_id: Option<i64>,
}

/// One immutable polygon layer (neighbourhoods, arrondissements or communes).
///
/// The source GeoJSON features are kept untouched for the output projection.
/// Polygon and MultiPolygon features are additionally indexed by bounding box;
/// candidates from the index are confirmed with an exact point-in-polygon test.
#[derive(Debug, Clone)]
pub struct ZoneLayer {
    kind: ZoneLayerKind,
    id_property: String,
    features: Vec<Feature>,
    index: RTree<ZoneShape>,
}

impl ZoneLayer {
    /// Reads a GeoJSON FeatureCollection from `path`. Files ending in `.gz` are
    /// decompressed on the fly.
    pub async fn load(
        kind: ZoneLayerKind,
        path: &Path,
        id_property: &str,
    ) -> Result<Self, ZoneError> {
        let bytes = read_reference_bytes(kind, path).await?;
        let path_owned = path.to_path_buf();
        let id_property = id_property.to_string();

        let parse_start = std::time::Instant::now();
        let layer = tokio::task::spawn_blocking(move || {
            Self::parse(kind, &path_owned, &bytes, id_property)
        })
        .await??;
        info!(
            "Loaded {} {} features ({} indexed polygons) from {} in {:?}",
            layer.features.len(),
            kind,
            layer.index.size(),
            path.display(),
            parse_start.elapsed()
        );
        Ok(layer)
    }

    fn parse(
        kind: ZoneLayerKind,
        path: &Path,
        bytes: &[u8],
        id_property: String,
    ) -> Result<Self, ZoneError> {
        let text = std::str::from_utf8(bytes).map_err(|e| ZoneError::ReferenceEncoding {
            kind,
            path: path.to_path_buf(),
            source: e,
        })?;
        let geojson = text.parse::<GeoJson>().map_err(|e| ZoneError::ReferenceParse {
            kind,
            path: path.to_path_buf(),
            source: e,
        })?;
        match geojson {
            GeoJson::FeatureCollection(collection) => {
                Ok(Self::from_features(kind, id_property, collection.features))
            }
            _ => Err(ZoneError::NotFeatureCollection {
                kind,
                path: path.to_path_buf(),
            }),
        }
    }

    pub fn from_features(
        kind: ZoneLayerKind,
        id_property: impl Into<String>,
        features: Vec<Feature>,
    ) -> Self {
        let id_property = id_property.into();
        let mut shapes = Vec::with_capacity(features.len());

        for (position, feature) in features.iter().enumerate() {
            let Some(shape) = feature
                .geometry
                .as_ref()
                .and_then(|geometry| to_multi_polygon(&geometry.value))
            else {
                debug!("{kind} feature {position} has no polygon geometry, not indexed");
                continue;
            };
            let Some(rect) = shape.bounding_rect() else {
                debug!("{kind} feature {position} has an empty polygon, not indexed");
                continue;
            };
            shapes.push(ZoneShape {
                position,
                zone_id: feature.property(&id_property).and_then(coerce_zone_id),
                shape,
                envelope: AABB::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                ),
            });
        }

        Self {
            kind,
            id_property,
            features,
            index: RTree::bulk_load(shapes),
        }
    }

    /// Finds the polygon covering `(lon, lat)`. When polygons overlap, the one
    /// appearing first in the layer wins.
    pub fn locate(&self, lon: f64, lat: f64) -> Option<ZoneMatch> {
        let point = Point::new(lon, lat);
        self.index
            .locate_all_at_point(&[lon, lat])
            .filter(|candidate| candidate.shape.intersects(&point))
            .min_by_key(|candidate| candidate.position)
            .map(|candidate| ZoneMatch {
                position: candidate.position,
                zone_id: candidate.zone_id,
            })
    }

    /// Zone id at `(lon, lat)`; `None` when no polygon matches or the matching
    /// polygon carries no usable id.
    pub fn zone_id_at(&self, lon: f64, lat: f64) -> Option<i64> {
        self.locate(lon, lat).and_then(|m| m.zone_id)
    }

    pub fn kind(&self) -> ZoneLayerKind {
        self.kind
    }

    pub fn id_property(&self) -> &str {
        &self.id_property
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

async fn read_reference_bytes(kind: ZoneLayerKind, path: &Path) -> Result<Vec<u8>, ZoneError> {
    let read_error = |source| ZoneError::ReferenceRead {
        kind,
        path: path.to_path_buf(),
        source,
    };
    let file = tokio::fs::File::open(path).await.map_err(read_error)?;
    let mut bytes = Vec::new();
    if path.extension().is_some_and(|ext| ext == "gz") {
        let mut decoder = GzipDecoder::new(BufReader::new(file));
        decoder.read_to_end(&mut bytes).await.map_err(read_error)?;
    } else {
        let mut reader = BufReader::new(file);
        reader.read_to_end(&mut bytes).await.map_err(read_error)?;
    }
    Ok(bytes)
}

fn to_multi_polygon(value: &Value) -> Option<MultiPolygon<f64>> {
    match value {
        Value::Polygon(rings) => to_polygon(rings).map(|p| MultiPolygon::new(vec![p])),
        Value::MultiPolygon(polygons) => polygons
            .iter()
            .map(to_polygon)
            .collect::<Option<Vec<_>>>()
            .map(MultiPolygon::new),
        _ => None,
    }
}

// GeoJSON positions are [lon, lat, (alt)].
fn to_polygon(rings: &PolygonType) -> Option<Polygon<f64>> {
    let mut rings = rings.iter().map(|ring| {
        ring.iter()
            .map(|position| match position.as_slice() {
                [x, y, ..] => Some(Coord { x: *x, y: *y }),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .map(LineString::from)
    });
    let exterior = rings.next()??;
    let interiors = rings.collect::<Option<Vec<_>>>()?;
    Some(Polygon::new(exterior, interiors))
}
