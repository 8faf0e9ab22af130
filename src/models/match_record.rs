//! Raw match documents as stored by the match extractor.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Numeric civilization ("major god") id.
pub type CivId = u32;

/// Game mode tag the stats rollups are restricted to by default.
pub const DEFAULT_GAME_MODE: &str = "1V1_SUPREMACY";

/// Map descriptor attached to a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapData {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_water: Option<bool>,
}

/// One rating/civ-choice event from a player's match history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub civilization_id: CivId,

    /// 1 for a win, anything else is a loss
    pub outcome: i32,

    /// Rating after the match
    #[serde(default)]
    pub newrating: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oldrating: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teamid: Option<i64>,
}

impl HistoryEntry {
    pub fn is_win(&self) -> bool {
        self.outcome == 1
    }
}

/// A completed match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_id: Option<u64>,

    pub game_mode: String,

    /// Start time, milliseconds since the Unix epoch
    pub match_date: i64,

    /// Duration in seconds
    pub match_duration: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_data: Option<MapData>,

    /// Player id -> history entries for this match
    #[serde(default)]
    pub match_history_map: BTreeMap<String, Vec<HistoryEntry>>,
}

/// Borrowed view of one player slot of a match.
#[derive(Debug, Clone, Copy)]
pub struct PlayerSlot<'a> {
    pub player_key: &'a str,
    pub entries: &'a [HistoryEntry],
}

impl<'a> PlayerSlot<'a> {
    /// The slot's civilization comes from its first history entry.
    pub fn civ_id(&self) -> Option<CivId> {
        self.entries.first().map(|e| e.civilization_id)
    }

    pub fn won(&self) -> Option<bool> {
        self.entries.first().map(HistoryEntry::is_win)
    }

    /// All rating snapshots recorded for this slot.
    pub fn ratings(&self) -> impl Iterator<Item = f64> + 'a {
        self.entries.iter().filter_map(|e| e.newrating)
    }
}

impl MatchRecord {
    /// Player slots in stable key order.
    pub fn slots(&self) -> Vec<PlayerSlot<'_>> {
        self.match_history_map
            .iter()
            .map(|(player_key, entries)| PlayerSlot {
                player_key: player_key.as_str(),
                entries: entries.as_slice(),
            })
            .collect()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.match_date)
    }

    /// UTC calendar day the match started on.
    pub fn match_day(&self) -> Option<NaiveDate> {
        self.started_at().map(|t| t.date_naive())
    }

    pub fn map_name(&self) -> Option<&str> {
        self.map_data.as_ref().map(|m| m.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "gameMode": "1V1_SUPREMACY",
        "matchType": "Ranked",
        "matchId": 42,
        "mapData": {"name": "Acropolis", "imagePath": "/maps/acropolis.png", "isWater": false},
        "matchDate": 1726531200000,
        "matchDuration": 1260,
        "teams": [],
        "matchHistoryMap": {
            "1001": [{"civilization_id": 3, "outcome": 1, "oldrating": 990, "newrating": 1006, "wins": 4}],
            "2002": [{"civilization_id": 7, "outcome": 0, "oldrating": 1012, "newrating": 996}]
        }
    }"#;

    #[test]
    fn test_match_record_deserializes_extractor_shape() {
        let record: MatchRecord = serde_json::from_str(SAMPLE).unwrap();

        assert_eq!(record.match_id, Some(42));
        assert_eq!(record.game_mode, "1V1_SUPREMACY");
        assert_eq!(record.match_duration, 1260.0);
        assert_eq!(record.map_name(), Some("Acropolis"));
        assert_eq!(record.match_history_map.len(), 2);
    }

    #[test]
    fn test_slots_expose_civ_outcome_and_ratings() {
        let record: MatchRecord = serde_json::from_str(SAMPLE).unwrap();
        let slots = record.slots();

        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].player_key, "1001");
        assert_eq!(slots[0].civ_id(), Some(3));
        assert_eq!(slots[0].won(), Some(true));
        assert_eq!(slots[1].won(), Some(false));
        assert_eq!(slots[1].ratings().collect::<Vec<_>>(), vec![996.0]);
    }

    #[test]
    fn test_match_day_is_utc() {
        let record: MatchRecord = serde_json::from_str(SAMPLE).unwrap();
        // 1726531200000 = 2024-09-17T00:00:00Z
        assert_eq!(
            record.match_day(),
            Some(NaiveDate::from_ymd_opt(2024, 9, 17).unwrap())
        );
    }

    #[test]
    fn test_empty_slot_has_no_civ() {
        let slot = PlayerSlot {
            player_key: "x",
            entries: &[],
        };
        assert_eq!(slot.civ_id(), None);
        assert_eq!(slot.won(), None);
    }

    #[test]
    fn test_missing_map_is_none() {
        let json = r#"{"gameMode":"1V1_SUPREMACY","matchDate":0,"matchDuration":60}"#;
        let record: MatchRecord = serde_json::from_str(json).unwrap();
        assert!(record.map_name().is_none());
        assert!(record.match_history_map.is_empty());
    }
}
