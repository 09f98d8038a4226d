// Shared reference data for the integration tests.
#![allow(dead_code)]

use serde_json::{json, Value};
use swarfarm_backend::db::fixture::Fixture;
use swarfarm_backend::db::Database;

pub const MEGAN: i64 = 12090887474;
pub const BELLADEON: i64 = 12086635496;
pub const VEROMOS: i64 = 12180164163;
pub const MIKENE: i64 = 12348142219;
pub const SIGMARUS: i64 = 12536563997;

pub const DRAGONS_LAIR_10: i64 = 10;

/// Bestiary, dungeons and a roster of five monsters owned by `owner`.
pub async fn seed(db: &Database, owner: &str) {
    let fixture: Fixture = serde_json::from_value(json!({
        "leader_skills": [
            {"id": 1, "attribute": 4, "amount": 24, "area": 2, "element": null}
        ],
        "monsters": [
            {"id": 13103, "name": "Megan", "element": "water"},
            {"id": 14312, "name": "Belladeon", "element": "light"},
            {"id": 13913, "name": "Veromos", "element": "dark"},
            {"id": 17713, "name": "Mikene", "element": "water"},
            {"id": 15105, "name": "Sigmarus", "element": "water", "leader_skill": 1}
        ],
        "dungeons": [
            {"id": 1, "name": "Dragon's Lair", "slug": "dragons-lair", "category": 1},
            {"id": 2, "name": "Faimon Volcano", "slug": "faimon-volcano", "category": 0}
        ],
        "levels": [
            {"id": DRAGONS_LAIR_10, "dungeon": 1, "floor": 10, "max_slots": 5},
            {"id": 11, "dungeon": 2, "floor": 1, "max_slots": 5}
        ],
        "roster": [
            {"com2us_id": MEGAN, "owner": owner, "monster": 13103, "stars": 5, "level": 35},
            {"com2us_id": BELLADEON, "owner": owner, "monster": 14312, "stars": 6, "level": 40},
            {"com2us_id": VEROMOS, "owner": owner, "monster": 13913, "stars": 6, "level": 40},
            {"com2us_id": MIKENE, "owner": owner, "monster": 17713, "stars": 5, "level": 35},
            {"com2us_id": SIGMARUS, "owner": owner, "monster": 15105, "stars": 6, "level": 40}
        ]
    }))
    .unwrap();
    db.load_fixture(&fixture).await.unwrap();
}

fn roster(com2us_id: i64, name: &str, stars: i64, level: i64) -> Value {
    json!({"com2us_id": com2us_id, "name": name, "stars": stars, "level": level, "notes": null})
}

fn after(monster: i64) -> Value {
    json!([{"slower_than": {"monster": monster}, "type": 0, "amount": null}])
}

/// Write document of the five monster Dragon's Lair team: Megan first,
/// Belladeon after her, everyone else after Belladeon.
pub fn dragons_lair_team(name: &str) -> Value {
    json!({
        "name": name,
        "dungeon": {"id": DRAGONS_LAIR_10},
        "monsters": [
            {
                "monster": roster(MEGAN, "Megan", 5, 35),
                "leader": false,
                "min_hp": 17000, "min_def": 700, "min_acc": 55,
                "slower_than_by": []
            },
            {
                "monster": roster(BELLADEON, "Belladeon", 6, 40),
                "leader": false,
                "min_spd": 190, "min_hp": 19000, "min_def": 850, "min_acc": 55,
                "slower_than_by": after(MEGAN)
            },
            {
                "monster": roster(VEROMOS, "Veromos", 6, 40),
                "leader": false,
                "min_hp": 19000, "min_def": 800, "min_acc": 55,
                "slower_than_by": after(BELLADEON)
            },
            {
                "monster": roster(MIKENE, "Mikene", 5, 35),
                "leader": false,
                "min_hp": 19000, "min_def": 800,
                "slower_than_by": after(BELLADEON)
            },
            {
                "monster": roster(SIGMARUS, "Sigmarus", 6, 40),
                "leader": true,
                "min_spd": 110, "min_hp": 15000, "min_def": 700,
                "slower_than_by": after(BELLADEON)
            }
        ]
    })
}
