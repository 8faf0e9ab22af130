//! Rolled-up statistics records written to the stats collections.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{CivId, RecordId};

/// Identity of an aggregate record (`metaField` on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatsIdentity {
    pub civ_id: CivId,
    pub god_name: String,
    pub elo_bin: String,
    pub lower_elo: i64,
    pub upper_elo: i64,

    #[serde(
        rename = "buildNumber",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub build_number: Option<u64>,
}

/// Key a patch record is upserted under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UpsertKey {
    pub civ_id: CivId,
    pub elo_bin: String,
    pub build_number: Option<u64>,
}

/// Games and wins for one embedded breakdown entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeCounts {
    pub total_results: u32,
    pub total_wins: u32,
}

/// Games and wins against one opponent civilization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchupStat {
    #[serde(rename = "opp_civ_id")]
    pub opp_civ_id: CivId,
    pub total_results: u32,
    pub total_wins: u32,
}

/// One rolled-up row per (civilization, Elo bracket, day or build).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRecord {
    /// Deterministic id derived from the identity and time bucket
    pub id: RecordId,

    #[serde(rename = "metaField")]
    pub meta: StatsIdentity,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_day: Option<NaiveDate>,

    pub total_results: u32,
    pub total_wins: u32,

    /// Percentage, 0 when there are no games
    pub win_rate: f64,

    pub avg_duration_mins: f64,

    /// Share of the civ's games in this bracket, synthetic-bracket runs only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub play_rate: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maps: Option<BTreeMap<String, OutcomeCounts>>,

    /// Keyed by opponent name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matchups: Option<BTreeMap<String, MatchupStat>>,
}

impl AggregateRecord {
    /// Derive the record id from the fields that identify a row.
    pub fn derive_id(
        civ_id: CivId,
        elo_bin: &str,
        match_day: Option<NaiveDate>,
        build_number: Option<u64>,
    ) -> RecordId {
        let civ = civ_id.to_string();
        let day = match_day.map(|d| d.to_string()).unwrap_or_default();
        let build = build_number.map(|b| b.to_string()).unwrap_or_default();
        RecordId::from_identity(&[&civ, elo_bin, &day, &build])
    }

    pub fn upsert_key(&self) -> UpsertKey {
        UpsertKey {
            civ_id: self.meta.civ_id,
            elo_bin: self.meta.elo_bin.clone(),
            build_number: self.meta.build_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(build_number: Option<u64>, match_day: Option<NaiveDate>) -> AggregateRecord {
        AggregateRecord {
            id: AggregateRecord::derive_id(3, "1001-1250", match_day, build_number),
            meta: StatsIdentity {
                civ_id: 3,
                god_name: "Poseidon".to_string(),
                elo_bin: "1001-1250".to_string(),
                lower_elo: 1001,
                upper_elo: 1250,
                build_number,
            },
            match_day,
            total_results: 4,
            total_wins: 3,
            win_rate: 75.0,
            avg_duration_mins: 21.5,
            play_rate: None,
            maps: None,
            matchups: None,
        }
    }

    #[test]
    fn test_patch_record_wire_format() {
        let mut rec = record(Some(11243), None);
        rec.maps = Some(BTreeMap::from([(
            "Mirage".to_string(),
            OutcomeCounts {
                total_results: 4,
                total_wins: 3,
            },
        )]));
        rec.matchups = Some(BTreeMap::from([(
            "Zeus".to_string(),
            MatchupStat {
                opp_civ_id: 1,
                total_results: 4,
                total_wins: 3,
            },
        )]));

        let value = serde_json::to_value(&rec).unwrap();

        assert_eq!(value["metaField"]["civ_id"], 3);
        assert_eq!(value["metaField"]["buildNumber"], 11243);
        assert_eq!(value["metaField"]["elo_bin"], "1001-1250");
        assert_eq!(value["totalResults"], 4);
        assert_eq!(value["avgDurationMins"], 21.5);
        assert_eq!(value["maps"]["Mirage"]["totalWins"], 3);
        assert_eq!(value["matchups"]["Zeus"]["opp_civ_id"], 1);
        assert!(value.get("matchDay").is_none());
        assert!(value.get("playRate").is_none());
    }

    #[test]
    fn test_daily_record_round_trips() {
        let day = NaiveDate::from_ymd_opt(2024, 9, 17);
        let rec = record(None, day);

        let json = serde_json::to_string(&rec).unwrap();
        assert!(json.contains(r#""matchDay":"2024-09-17""#));
        assert!(!json.contains("buildNumber"));

        let back: AggregateRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn test_derive_id_depends_on_time_bucket() {
        let day1 = NaiveDate::from_ymd_opt(2024, 9, 17);
        let day2 = NaiveDate::from_ymd_opt(2024, 9, 18);

        assert_eq!(
            AggregateRecord::derive_id(3, "0-750", day1, None),
            AggregateRecord::derive_id(3, "0-750", day1, None)
        );
        assert_ne!(
            AggregateRecord::derive_id(3, "0-750", day1, None),
            AggregateRecord::derive_id(3, "0-750", day2, None)
        );
        assert_ne!(
            AggregateRecord::derive_id(3, "0-750", None, Some(1)),
            AggregateRecord::derive_id(3, "0-750", None, Some(2))
        );
    }

    #[test]
    fn test_upsert_key_ignores_measures() {
        let a = record(Some(7), None);
        let mut b = record(Some(7), None);
        b.total_results = 99;
        b.meta.god_name = "Renamed".to_string();

        assert_eq!(a.upsert_key(), b.upsert_key());
        assert_ne!(a.upsert_key(), record(Some(8), None).upsert_key());
    }
}
