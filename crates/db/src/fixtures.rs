use dinely_core::domain::restaurant::{Candidate, RestaurantDetail, RestaurantId};

use crate::repositories::{DetailsStore, RepositoryError, SearchIndex};

struct SeedRestaurant {
    external_id: &'static str,
    name: &'static str,
    category: &'static str,
    address: &'static [&'static str],
}

/// Small, deterministic slice of the ingested corpus for local development and
/// integration tests. Every seed appears in both the search projection and the
/// details store.
const SEED_RESTAURANTS: &[SeedRestaurant] = &[
    SeedRestaurant {
        external_id: "seed-jp-001",
        name: "Sushi Yasaka",
        category: "japanese",
        address: &["251 W 72nd St", "New York, NY 10023"],
    },
    SeedRestaurant {
        external_id: "seed-jp-002",
        name: "Raku",
        category: "japanese",
        address: &["342 E 6th St", "New York, NY 10003"],
    },
    SeedRestaurant {
        external_id: "seed-jp-003",
        name: "Udon Lab",
        category: "japanese",
        address: &["248 E 52nd St", "New York, NY 10022"],
    },
    SeedRestaurant {
        external_id: "seed-th-001",
        name: "Somtum Der",
        category: "thai",
        address: &["85 Avenue A", "New York, NY 10009"],
    },
    SeedRestaurant {
        external_id: "seed-th-002",
        name: "Fish Cheeks",
        category: "thai",
        address: &["55 Bond St", "New York, NY 10012"],
    },
    SeedRestaurant {
        external_id: "seed-it-001",
        name: "L'Artusi",
        category: "italian",
        address: &["228 W 10th St", "New York, NY 10014"],
    },
    SeedRestaurant {
        external_id: "seed-mx-001",
        name: "Los Tacos No. 1",
        category: "mexican",
        address: &["75 9th Ave", "New York, NY 10011"],
    },
];

pub async fn seed_sample_restaurants(
    index: &dyn SearchIndex,
    details: &dyn DetailsStore,
) -> Result<usize, RepositoryError> {
    for seed in SEED_RESTAURANTS {
        let id = RestaurantId(seed.external_id.to_string());
        index.save(Candidate { id: id.clone(), category: seed.category.to_string() }).await?;
        details
            .save(RestaurantDetail {
                id,
                name: seed.name.to_string(),
                location: seed.address.iter().map(|line| (*line).to_string()).collect(),
            })
            .await?;
    }

    Ok(SEED_RESTAURANTS.len())
}
