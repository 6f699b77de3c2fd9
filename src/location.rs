//! Probable-location estimation from map review and photo coordinates.

use crate::errors::AppError;
use crate::geocoding::haversine_km;
use crate::lookup_models::{MapsActivity, Position};
use crate::services::{Geocoder, LocationEstimator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Upper bound on geocoding calls per cluster.
const MAX_GEOCODED_POINTS: usize = 15;

/// Address fields recovered by reverse geocoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoAddress {
    pub postcode: Option<String>,
    pub town: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    #[serde(rename = "Very low")]
    VeryLow,
    Low,
    Medium,
    High,
    #[serde(rename = "Very high")]
    VeryHigh,
}

impl ConfidenceLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Self::VeryHigh
        } else if score >= 0.7 {
            Self::High
        } else if score >= 0.5 {
            Self::Medium
        } else if score >= 0.3 {
            Self::Low
        } else {
            Self::VeryLow
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    /// Share of all points that fall in the best cluster, in [0, 1].
    pub score: f64,
    pub level: ConfidenceLevel,
}

impl Confidence {
    pub fn from_score(score: f64) -> Self {
        let score = score.clamp(0.0, 1.0);
        Self {
            score,
            level: ConfidenceLevel::from_score(score),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbableLocation {
    /// Most common address fields among the cluster's points.
    pub avg: GeoAddress,
    /// Distinct towns seen in the cluster.
    pub cities: Vec<String>,
    pub centroid: Position,
    pub points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationEstimate {
    pub confidence: Confidence,
    pub locations: Vec<ProbableLocation>,
}

/// Groups points lying within `radius_km` of each other.
///
/// Returns the largest neighbourhoods (all of equal size), deduplicated by member set,
/// as index lists into `points`.
pub fn densest_clusters(points: &[Position], radius_km: f64) -> Vec<Vec<usize>> {
    let mut best: Vec<BTreeSet<usize>> = Vec::new();
    let mut best_len = 0;

    for (i, center) in points.iter().enumerate() {
        let members: BTreeSet<usize> = points
            .iter()
            .enumerate()
            .filter(|(j, p)| *j == i || haversine_km(*center, **p) <= radius_km)
            .map(|(j, _)| j)
            .collect();

        // Contains `i` even when a distance is NaN, so never empty
        if members.len() > best_len {
            best_len = members.len();
            best = vec![members];
        } else if members.len() == best_len && !best.contains(&members) {
            best.push(members);
        }
    }

    best.into_iter().map(|m| m.into_iter().collect()).collect()
}

fn centroid(points: &[Position]) -> Position {
    let n = points.len().max(1) as f64;
    Position {
        latitude: points.iter().map(|p| p.latitude).sum::<f64>() / n,
        longitude: points.iter().map(|p| p.longitude).sum::<f64>() / n,
    }
}

/// Most frequent non-empty value; ties go to the value seen first.
fn most_common<'a>(values: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (order, value) in values.filter(|v| !v.trim().is_empty()).enumerate() {
        counts.entry(value).or_insert((0, order)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (ca, oa)), (_, (cb, ob))| ca.cmp(cb).then(ob.cmp(oa)))
        .map(|(value, _)| value.to_string())
}

fn summarize(addresses: &[GeoAddress]) -> (GeoAddress, Vec<String>) {
    let avg = GeoAddress {
        postcode: most_common(addresses.iter().filter_map(|a| a.postcode.as_deref())),
        town: most_common(addresses.iter().filter_map(|a| a.town.as_deref())),
        country: most_common(addresses.iter().filter_map(|a| a.country.as_deref())),
    };

    let mut cities: Vec<String> = Vec::new();
    for town in addresses.iter().filter_map(|a| a.town.as_ref()) {
        if !cities.contains(town) {
            cities.push(town.clone());
        }
    }

    (avg, cities)
}

/// Default estimator: densest radius cluster, majority-vote address per cluster.
pub struct RadiusClusterEstimator {
    geocoder: Arc<dyn Geocoder>,
}

impl RadiusClusterEstimator {
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        Self { geocoder }
    }

    async fn geocode_cluster(&self, members: &[Position], center: Position) -> Vec<GeoAddress> {
        let mut nearest: Vec<Position> = members.to_vec();
        nearest.sort_by(|a, b| haversine_km(center, *a).total_cmp(&haversine_km(center, *b)));
        nearest.truncate(MAX_GEOCODED_POINTS);

        let mut addresses = Vec::with_capacity(nearest.len());
        for position in nearest {
            match self.geocoder.reverse(position).await {
                Ok(Some(address)) => addresses.push(address),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        "Skipping point {},{} after geocoding error: {}",
                        position.latitude,
                        position.longitude,
                        e
                    );
                }
            }
        }
        addresses
    }
}

#[async_trait]
impl LocationEstimator for RadiusClusterEstimator {
    async fn estimate(
        &self,
        maps: &MapsActivity,
        radius_km: f64,
    ) -> Result<LocationEstimate, AppError> {
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(AppError::BadRequest(format!(
                "Clustering radius must be positive, got {}",
                radius_km
            )));
        }

        let points = maps.positions();
        if points.is_empty() {
            return Ok(LocationEstimate {
                confidence: Confidence::from_score(0.0),
                locations: Vec::new(),
            });
        }

        let clusters = densest_clusters(&points, radius_km);
        let best_len = clusters.first().map(Vec::len).unwrap_or(0);
        let confidence = Confidence::from_score(best_len as f64 / points.len() as f64);
        tracing::debug!(
            "{} cluster(s) of {} point(s) out of {} within {} km",
            clusters.len(),
            best_len,
            points.len(),
            radius_km
        );

        let mut locations = Vec::with_capacity(clusters.len());
        for cluster in clusters {
            let members: Vec<Position> = cluster.iter().map(|&i| points[i]).collect();
            let center = centroid(&members);
            let addresses = self.geocode_cluster(&members, center).await;
            if addresses.is_empty() {
                tracing::debug!("Cluster around {},{} could not be geocoded", center.latitude, center.longitude);
                continue;
            }
            let (avg, cities) = summarize(&addresses);
            locations.push(ProbableLocation {
                avg,
                cities,
                centroid: center,
                points: members.len(),
            });
        }

        Ok(LocationEstimate {
            confidence,
            locations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup_models::{MapsLocation, MapsReview};
    use tokio::sync::Mutex;

    fn pos(latitude: f64, longitude: f64) -> Position {
        Position {
            latitude,
            longitude,
        }
    }

    fn review(id: &str, p: Position) -> MapsReview {
        MapsReview {
            id: id.to_string(),
            comment: None,
            rating: Some(5),
            date: None,
            location: Some(MapsLocation {
                position: Some(p),
                ..MapsLocation::default()
            }),
        }
    }

    /// Paris for anything north of 47°, Lyon otherwise.
    struct SplitGeocoder {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl Geocoder for SplitGeocoder {
        async fn reverse(&self, position: Position) -> Result<Option<GeoAddress>, AppError> {
            *self.calls.lock().await += 1;
            let (town, postcode) = if position.latitude > 47.0 {
                ("Paris", "75001")
            } else {
                ("Lyon", "69001")
            };
            Ok(Some(GeoAddress {
                postcode: Some(postcode.into()),
                town: Some(town.into()),
                country: Some("France".into()),
            }))
        }
    }

    #[test]
    fn test_densest_clusters_picks_biggest_group() {
        let points = vec![
            pos(48.85, 2.35),
            pos(48.86, 2.34),
            pos(48.87, 2.36),
            pos(45.76, 4.83),
        ];
        let clusters = densest_clusters(&points, 30.0);
        assert_eq!(clusters, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_densest_clusters_never_yields_empty_cluster() {
        let points = vec![pos(f64::NAN, 2.35), pos(f64::INFINITY, 0.0)];
        let clusters = densest_clusters(&points, 30.0);
        assert!(!clusters.is_empty());
        assert!(clusters.iter().all(|c| !c.is_empty()));
    }

    #[test]
    fn test_positions_skip_out_of_range_coordinates() {
        let maps = MapsActivity {
            reviews: vec![
                review("ok", pos(48.85, 2.35)),
                review("lat", pos(123.0, 2.35)),
                review("lon", pos(48.85, 1e308)),
                review("nan", pos(f64::NAN, 2.35)),
            ],
            ..MapsActivity::default()
        };
        assert_eq!(maps.positions(), vec![pos(48.85, 2.35)]);
    }

    #[test]
    fn test_densest_clusters_keeps_ties() {
        let points = vec![pos(48.85, 2.35), pos(45.76, 4.83)];
        let clusters = densest_clusters(&points, 30.0);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn test_confidence_levels() {
        assert_eq!(Confidence::from_score(1.0).level, ConfidenceLevel::VeryHigh);
        assert_eq!(Confidence::from_score(0.75).level, ConfidenceLevel::High);
        assert_eq!(Confidence::from_score(0.5).level, ConfidenceLevel::Medium);
        assert_eq!(Confidence::from_score(0.3).level, ConfidenceLevel::Low);
        assert_eq!(Confidence::from_score(0.1).level, ConfidenceLevel::VeryLow);
        assert_eq!(Confidence::from_score(3.0).score, 1.0);
    }

    #[test]
    fn test_most_common_prefers_first_on_tie() {
        let values = ["Lyon", "Paris", "", "Paris", "Lyon"];
        assert_eq!(most_common(values.into_iter()), Some("Lyon".to_string()));
        assert_eq!(most_common(["", " "].into_iter()), None);
    }

    #[tokio::test]
    async fn test_estimate_ranks_paris() {
        let geocoder = Arc::new(SplitGeocoder {
            calls: Mutex::new(0),
        });
        let estimator = RadiusClusterEstimator::new(geocoder.clone());
        let maps = MapsActivity {
            reviews: vec![
                review("1", pos(48.85, 2.35)),
                review("2", pos(48.86, 2.34)),
                review("3", pos(48.87, 2.36)),
                review("4", pos(45.76, 4.83)),
            ],
            ..MapsActivity::default()
        };

        let estimate = estimator.estimate(&maps, 30.0).await.unwrap();
        assert_eq!(estimate.locations.len(), 1);
        assert_eq!(estimate.locations[0].avg.town.as_deref(), Some("Paris"));
        assert_eq!(estimate.locations[0].avg.postcode.as_deref(), Some("75001"));
        assert_eq!(estimate.locations[0].cities, vec!["Paris".to_string()]);
        assert!((estimate.confidence.score - 0.75).abs() < 1e-9);
        assert_eq!(*geocoder.calls.lock().await, 3);
    }

    #[tokio::test]
    async fn test_estimate_rejects_bad_radius() {
        let estimator = RadiusClusterEstimator::new(Arc::new(SplitGeocoder {
            calls: Mutex::new(0),
        }));
        let err = estimator
            .estimate(&MapsActivity::default(), 0.0)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
