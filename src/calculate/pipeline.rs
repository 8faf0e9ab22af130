//! Raw matches in, aggregate records out.

use std::collections::BTreeMap;

use tracing::{debug, info};

use super::{
    calculate_play_rate, normalize_matches, seconds_to_minutes, EnrichReport, FacetOptions,
    FacetSet, FacetTotals, GroupKey, NormalizeReport, ReferenceEnricher,
};
use crate::models::{
    AggregateRecord, CivilizationTable, EloBrackets, MatchRecord, MatchupStat, StatsIdentity,
};

/// What a run's records are bucketed by in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBucket {
    /// One group per UTC calendar day inside the window
    Daily,
    /// The whole window belongs to one build
    Patch { build_number: u64 },
}

/// Per-run switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineOptions {
    /// Embed map and matchup breakdowns
    pub breakdowns: bool,
    /// Add the synthetic `all` bracket and play rates
    pub all_elo: bool,
}

/// Records plus the counters gathered while producing them.
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    pub records: Vec<AggregateRecord>,
    pub normalize: NormalizeReport,
    pub enrich: EnrichReport,
}

/// Normalize, group, join and enrich one window's matches.
pub struct StatsPipeline<'a> {
    brackets: &'a EloBrackets,
    civs: &'a CivilizationTable,
    options: PipelineOptions,
}

impl<'a> StatsPipeline<'a> {
    pub fn new(
        brackets: &'a EloBrackets,
        civs: &'a CivilizationTable,
        options: PipelineOptions,
    ) -> Self {
        Self {
            brackets,
            civs,
            options,
        }
    }

    pub fn run(&self, matches: &[MatchRecord], bucket: TimeBucket) -> PipelineOutput {
        let (entries, normalize) = normalize_matches(matches, self.brackets);
        debug!(
            "Normalized {} matches into {} entries ({} skipped, {} same-civ entries dropped)",
            normalize.matches_seen,
            normalize.entries,
            normalize.matches_skipped,
            normalize.same_civ_dropped
        );

        let enricher = ReferenceEnricher::new(self.civs);
        let mut enrich = EnrichReport::default();
        let resolved = enricher.resolve_opponents(entries, &mut enrich);

        let facets = FacetSet::build(
            &resolved,
            FacetOptions {
                group_by_day: matches!(bucket, TimeBucket::Daily),
                all_elo: self.options.all_elo,
                breakdowns: self.options.breakdowns,
            },
        );

        let build_number = match bucket {
            TimeBucket::Daily => None,
            TimeBucket::Patch { build_number } => Some(build_number),
        };

        let mut records = Vec::with_capacity(facets.by_civ.len());
        for (key, totals) in &facets.by_civ {
            let Some(god_name) = enricher.resolve_civ(key.civ_id, &mut enrich) else {
                continue;
            };
            records.push(self.build_record(&facets, key, totals, god_name, build_number));
        }

        enrich.log();
        info!("Produced {} aggregate records", records.len());

        PipelineOutput {
            records,
            normalize,
            enrich,
        }
    }

    fn build_record(
        &self,
        facets: &FacetSet,
        key: &GroupKey,
        totals: &FacetTotals,
        god_name: &str,
        build_number: Option<u64>,
    ) -> AggregateRecord {
        let bracket = self.brackets.get(key.bracket);

        let play_rate = self.options.all_elo.then(|| {
            calculate_play_rate(totals.games, facets.civ_games(key.day, key.civ_id))
        });

        let (maps, matchups) = if self.options.breakdowns {
            let maps: BTreeMap<_, _> = facets
                .maps_for(key)
                .map(|(name, t)| (name.to_string(), t.counts()))
                .collect();
            let matchups: BTreeMap<_, _> = facets
                .matchups_for(key)
                .map(|(name, m)| {
                    (
                        name.to_string(),
                        MatchupStat {
                            opp_civ_id: m.opp_civ_id,
                            total_results: m.totals.games,
                            total_wins: m.totals.wins,
                        },
                    )
                })
                .collect();
            (Some(maps), Some(matchups))
        } else {
            (None, None)
        };

        AggregateRecord {
            id: AggregateRecord::derive_id(key.civ_id, &bracket.label, key.day, build_number),
            meta: StatsIdentity {
                civ_id: key.civ_id,
                god_name: god_name.to_string(),
                elo_bin: bracket.label.clone(),
                lower_elo: bracket.lower,
                upper_elo: bracket.upper,
                build_number,
            },
            match_day: key.day,
            total_results: totals.games,
            total_wins: totals.wins,
            win_rate: totals.win_rate(),
            avg_duration_mins: seconds_to_minutes(totals.avg_duration_secs()),
            play_rate,
            maps,
            matchups,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Civilization, CivId, EloCutoff, HistoryEntry, MapData};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    // 2024-09-17T10:00:00Z and 2024-09-18T10:00:00Z
    const SEPT_17: i64 = 1_726_567_200_000;
    const SEPT_18: i64 = 1_726_653_600_000;

    fn brackets() -> EloBrackets {
        EloBrackets::new(&[
            EloCutoff::new(0, 799),
            EloCutoff::new(800, 999),
            EloCutoff::new(1000, 1199),
            EloCutoff::new(1200, 1399),
        ])
        .unwrap()
    }

    fn civs() -> CivilizationTable {
        CivilizationTable::new(
            [(1, "Zeus"), (2, "Hades"), (3, "Poseidon")]
                .into_iter()
                .map(|(id, name)| Civilization {
                    id,
                    name: name.to_string(),
                }),
        )
    }

    fn game(winner: CivId, loser: CivId, elo: f64, date: i64, map: Option<&str>) -> MatchRecord {
        let side = |civ, outcome| HistoryEntry {
            civilization_id: civ,
            outcome,
            newrating: Some(elo),
            oldrating: None,
            profile_id: None,
            teamid: None,
        };
        MatchRecord {
            match_id: None,
            game_mode: "1V1_SUPREMACY".to_string(),
            match_date: date,
            match_duration: 1800.0,
            map_data: map.map(|name| MapData {
                name: name.to_string(),
                image_path: None,
                is_water: None,
            }),
            match_history_map: BTreeMap::from([
                ("a".to_string(), vec![side(winner, 1)]),
                ("b".to_string(), vec![side(loser, 0)]),
            ]),
        }
    }

    fn find<'r>(records: &'r [AggregateRecord], civ: CivId, bin: &str) -> &'r AggregateRecord {
        records
            .iter()
            .find(|r| r.meta.civ_id == civ && r.meta.elo_bin == bin)
            .unwrap()
    }

    #[test]
    fn test_daily_rollup_by_civ() {
        let matches = vec![
            game(1, 2, 900.0, SEPT_17, None),
            game(1, 2, 900.0, SEPT_17, None),
            game(2, 1, 1100.0, SEPT_17, None),
        ];
        let brackets = brackets();
        let civs = civs();
        let pipeline = StatsPipeline::new(&brackets, &civs, PipelineOptions::default());

        let output = pipeline.run(&matches, TimeBucket::Daily);

        let low = find(&output.records, 1, "800-999");
        assert_eq!((low.total_results, low.total_wins, low.win_rate), (2, 2, 100.0));
        assert_eq!(low.meta.god_name, "Zeus");
        assert_eq!((low.meta.lower_elo, low.meta.upper_elo), (800, 999));
        assert_eq!(low.avg_duration_mins, 30.0);
        assert_eq!(low.match_day, NaiveDate::from_ymd_opt(2024, 9, 17));
        assert!(low.maps.is_none());

        let high = find(&output.records, 1, "1000-1199");
        assert_eq!((high.total_results, high.total_wins, high.win_rate), (1, 0, 0.0));
        assert_eq!(output.records.len(), 4);
    }

    #[test]
    fn test_daily_rollup_splits_days() {
        let matches = vec![
            game(1, 2, 900.0, SEPT_17, None),
            game(1, 2, 900.0, SEPT_18, None),
        ];
        let brackets = brackets();
        let civs = civs();
        let output = StatsPipeline::new(&brackets, &civs, PipelineOptions::default())
            .run(&matches, TimeBucket::Daily);

        let zeus_days: Vec<_> = output
            .records
            .iter()
            .filter(|r| r.meta.civ_id == 1)
            .map(|r| r.match_day)
            .collect();
        assert_eq!(
            zeus_days,
            vec![
                NaiveDate::from_ymd_opt(2024, 9, 17),
                NaiveDate::from_ymd_opt(2024, 9, 18)
            ]
        );
        // Sorted by day first, then civ
        assert_eq!(output.records[0].meta.civ_id, 1);
        assert_eq!(output.records[1].meta.civ_id, 2);
    }

    #[test]
    fn test_patch_rollup_embeds_breakdowns() {
        let matches = vec![
            game(1, 2, 900.0, SEPT_17, Some("Mirage")),
            game(1, 3, 900.0, SEPT_18, Some("Oasis")),
            game(2, 1, 900.0, SEPT_18, None),
        ];
        let brackets = brackets();
        let civs = civs();
        let pipeline = StatsPipeline::new(
            &brackets,
            &civs,
            PipelineOptions {
                breakdowns: true,
                all_elo: false,
            },
        );

        let output = pipeline.run(&matches, TimeBucket::Patch { build_number: 42 });
        let zeus = find(&output.records, 1, "800-999");

        assert_eq!(zeus.meta.build_number, Some(42));
        assert_eq!(zeus.match_day, None);
        assert_eq!((zeus.total_results, zeus.total_wins), (3, 2));

        let maps = zeus.maps.as_ref().unwrap();
        assert_eq!(maps.len(), 2);
        assert_eq!(maps["Mirage"].total_wins, 1);

        let matchups = zeus.matchups.as_ref().unwrap();
        assert_eq!(matchups["Hades"].opp_civ_id, 2);
        assert_eq!(matchups["Hades"].total_results, 2);
        assert_eq!(matchups["Hades"].total_wins, 1);
        assert_eq!(matchups["Poseidon"].total_wins, 1);
    }

    #[test]
    fn test_unknown_civ_is_dropped_everywhere() {
        let matches = vec![
            game(1, 99, 900.0, SEPT_17, None),
            game(99, 2, 900.0, SEPT_17, None),
            game(1, 2, 900.0, SEPT_17, None),
        ];
        let brackets = brackets();
        let civs = civs();
        let output = StatsPipeline::new(
            &brackets,
            &civs,
            PipelineOptions {
                breakdowns: true,
                all_elo: false,
            },
        )
        .run(&matches, TimeBucket::Daily);

        assert!(output.records.iter().all(|r| r.meta.civ_id != 99));
        assert!(output
            .records
            .iter()
            .all(|r| r.matchups.as_ref().unwrap().values().all(|m| m.opp_civ_id != 99)));
        assert_eq!(find(&output.records, 1, "800-999").total_results, 1);
        assert_eq!(find(&output.records, 2, "800-999").total_results, 1);
        assert_eq!(output.enrich.entries_dropped, 2);
    }

    #[test]
    fn test_all_elo_play_rates() {
        let matches = vec![
            game(1, 2, 900.0, SEPT_17, None),
            game(1, 2, 900.0, SEPT_17, None),
            game(1, 2, 900.0, SEPT_17, None),
            game(1, 2, 1100.0, SEPT_17, None),
        ];
        let brackets = brackets();
        let civs = civs();
        let output = StatsPipeline::new(
            &brackets,
            &civs,
            PipelineOptions {
                breakdowns: false,
                all_elo: true,
            },
        )
        .run(&matches, TimeBucket::Daily);

        let all = find(&output.records, 1, "all");
        assert_eq!(all.total_results, 4);
        assert_eq!(all.play_rate, Some(100.0));
        assert_eq!((all.meta.lower_elo, all.meta.upper_elo), (0, 1399));

        assert_eq!(find(&output.records, 1, "800-999").play_rate, Some(75.0));
        assert_eq!(find(&output.records, 1, "1000-1199").play_rate, Some(25.0));
    }

    #[test]
    fn test_empty_window() {
        let brackets = brackets();
        let civs = civs();
        let output = StatsPipeline::new(&brackets, &civs, PipelineOptions::default())
            .run(&[], TimeBucket::Patch { build_number: 1 });

        assert!(output.records.is_empty());
        assert_eq!(output.normalize, NormalizeReport::default());
    }
}
