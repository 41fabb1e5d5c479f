use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RestaurantId(pub String);

/// Search-index hit: just enough to drive the details lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: RestaurantId,
    pub category: String,
}

/// Display-ready attributes from the details store. `location` is the ordered
/// address lines as ingested.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestaurantDetail {
    pub id: RestaurantId,
    pub name: String,
    pub location: Vec<String>,
}

/// Most recent completed search for a delivery address, overwritten per
/// completed request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastSearch {
    pub lookup_key: String,
    pub area: String,
    pub category: String,
    pub delivery_address: String,
    pub searched_at: DateTime<Utc>,
}
