//! The three groupings computed over one window's entries, and the prefix
//! join that recombines them.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::{calculate_win_rate, ResolvedEntry};
use crate::models::{BracketSlot, CivId, OutcomeCounts};

/// Shared grouping prefix: (day, civ, bracket).
///
/// `day` is `None` when a run groups over the whole window. Ordering is
/// day, then civ, then bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub day: Option<NaiveDate>,
    pub civ_id: CivId,
    pub bracket: BracketSlot,
}

/// Count, win count and summed duration of a group.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FacetTotals {
    pub games: u32,
    pub wins: u32,
    pub duration_secs_sum: f64,
}

impl FacetTotals {
    fn record(&mut self, won: bool, duration_secs: f64) {
        self.games += 1;
        if won {
            self.wins += 1;
        }
        self.duration_secs_sum += duration_secs;
    }

    pub fn avg_duration_secs(&self) -> f64 {
        if self.games == 0 {
            0.0
        } else {
            self.duration_secs_sum / self.games as f64
        }
    }

    pub fn win_rate(&self) -> f64 {
        calculate_win_rate(self.wins, self.games)
    }

    pub fn counts(&self) -> OutcomeCounts {
        OutcomeCounts {
            total_results: self.games,
            total_wins: self.wins,
        }
    }
}

/// Totals against one named opponent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MatchupTotals {
    pub opp_civ_id: CivId,
    pub totals: FacetTotals,
}

/// Grouping switches for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacetOptions {
    pub group_by_day: bool,
    pub all_elo: bool,
    pub breakdowns: bool,
}

/// By-civ, by-matchup and by-map groupings over the same entries.
#[derive(Debug, Clone, Default)]
pub struct FacetSet {
    pub by_civ: BTreeMap<GroupKey, FacetTotals>,
    pub by_matchup: BTreeMap<(GroupKey, String), MatchupTotals>,
    pub by_map: BTreeMap<(GroupKey, String), FacetTotals>,
}

impl FacetSet {
    pub fn build(entries: &[ResolvedEntry], options: FacetOptions) -> Self {
        let mut facets = Self::default();

        for resolved in entries {
            let entry = &resolved.entry;
            let day = options.group_by_day.then_some(entry.day);

            let mut slots = vec![entry.bracket];
            if options.all_elo {
                slots.push(BracketSlot::AllElo);
            }

            for bracket in slots {
                let key = GroupKey {
                    day,
                    civ_id: entry.civ_id,
                    bracket,
                };

                facets
                    .by_civ
                    .entry(key)
                    .or_default()
                    .record(entry.won, entry.duration_secs);

                if !options.breakdowns {
                    continue;
                }

                let matchup = facets
                    .by_matchup
                    .entry((key, resolved.opp_name.clone()))
                    .or_insert_with(|| MatchupTotals {
                        opp_civ_id: entry.opp_civ_id,
                        totals: FacetTotals::default(),
                    });
                matchup.totals.record(entry.won, entry.duration_secs);

                if let Some(map) = &entry.map_name {
                    facets
                        .by_map
                        .entry((key, map.clone()))
                        .or_default()
                        .record(entry.won, entry.duration_secs);
                }
            }
        }

        facets
    }

    /// Matchup groups sharing `key` as their prefix.
    pub fn matchups_for<'a>(
        &'a self,
        key: &'a GroupKey,
    ) -> impl Iterator<Item = (&'a str, &'a MatchupTotals)> + 'a {
        self.by_matchup
            .range((*key, String::new())..)
            .take_while(move |((k, _), _)| k == key)
            .map(|((_, name), totals)| (name.as_str(), totals))
    }

    /// Map groups sharing `key` as their prefix.
    pub fn maps_for<'a>(
        &'a self,
        key: &'a GroupKey,
    ) -> impl Iterator<Item = (&'a str, &'a FacetTotals)> + 'a {
        self.by_map
            .range((*key, String::new())..)
            .take_while(move |((k, _), _)| k == key)
            .map(|((_, name), totals)| (name.as_str(), totals))
    }

    /// Games a civilization played across the real brackets of one time bucket.
    pub fn civ_games(&self, day: Option<NaiveDate>, civ_id: CivId) -> u32 {
        let start = GroupKey {
            day,
            civ_id,
            bracket: BracketSlot::Table(0),
        };
        self.by_civ
            .range(start..)
            .take_while(|(k, _)| k.day == day && k.civ_id == civ_id)
            .filter(|(k, _)| !k.bracket.is_synthetic())
            .map(|(_, totals)| totals.games)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculate::PlayerMatchEntry;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, d).unwrap()
    }

    fn resolved(
        civ_id: CivId,
        opp_civ_id: CivId,
        won: bool,
        bracket: usize,
        d: u32,
        map: Option<&str>,
    ) -> ResolvedEntry {
        ResolvedEntry {
            entry: PlayerMatchEntry {
                civ_id,
                opp_civ_id,
                won,
                avg_elo: 1000.0,
                bracket: BracketSlot::Table(bracket),
                day: day(d),
                map_name: map.map(str::to_string),
                duration_secs: 600.0 * (1 + bracket) as f64,
            },
            opp_name: format!("civ-{}", opp_civ_id),
        }
    }

    fn options(all_elo: bool) -> FacetOptions {
        FacetOptions {
            group_by_day: true,
            all_elo,
            breakdowns: true,
        }
    }

    fn key(d: u32, civ_id: CivId, bracket: BracketSlot) -> GroupKey {
        GroupKey {
            day: Some(day(d)),
            civ_id,
            bracket,
        }
    }

    #[test]
    fn test_by_civ_totals() {
        let entries = vec![
            resolved(1, 2, true, 0, 17, Some("Mirage")),
            resolved(1, 2, false, 0, 17, Some("Mirage")),
            resolved(1, 3, true, 1, 17, None),
        ];
        let facets = FacetSet::build(&entries, options(false));

        let low = facets.by_civ[&key(17, 1, BracketSlot::Table(0))];
        assert_eq!((low.games, low.wins), (2, 1));
        assert_eq!(low.win_rate(), 50.0);
        assert_eq!(low.avg_duration_secs(), 600.0);
        assert_eq!(facets.by_civ.len(), 2);
    }

    #[test]
    fn test_prefix_join_only_returns_matching_groups() {
        let entries = vec![
            resolved(1, 2, true, 0, 17, Some("Mirage")),
            resolved(1, 3, true, 0, 17, Some("Oasis")),
            resolved(1, 2, false, 1, 17, Some("Mirage")),
            resolved(1, 2, false, 0, 18, Some("Mirage")),
            resolved(2, 1, false, 0, 17, Some("Mirage")),
        ];
        let facets = FacetSet::build(&entries, options(false));
        let k = key(17, 1, BracketSlot::Table(0));

        let matchups: Vec<_> = facets
            .matchups_for(&k)
            .map(|(name, m)| (name.to_string(), m.opp_civ_id, m.totals.games))
            .collect();
        assert_eq!(
            matchups,
            vec![("civ-2".to_string(), 2, 1), ("civ-3".to_string(), 3, 1)]
        );

        let maps: Vec<_> = facets.maps_for(&k).map(|(name, _)| name.to_string()).collect();
        assert_eq!(maps, vec!["Mirage", "Oasis"]);
    }

    #[test]
    fn test_missing_map_only_leaves_map_facet() {
        let entries = vec![resolved(1, 2, true, 0, 17, None)];
        let facets = FacetSet::build(&entries, options(false));
        let k = key(17, 1, BracketSlot::Table(0));

        assert_eq!(facets.by_civ[&k].games, 1);
        assert_eq!(facets.matchups_for(&k).count(), 1);
        assert_eq!(facets.maps_for(&k).count(), 0);
    }

    #[test]
    fn test_all_elo_sums_real_brackets() {
        let entries = vec![
            resolved(1, 2, true, 0, 17, None),
            resolved(1, 2, true, 1, 17, None),
            resolved(1, 2, false, 2, 17, None),
            resolved(1, 2, false, 2, 18, None),
            resolved(2, 1, true, 2, 17, None),
        ];
        let facets = FacetSet::build(&entries, options(true));

        for (d, civ) in [(17, 1), (18, 1), (17, 2)] {
            let all = facets.by_civ[&key(d, civ, BracketSlot::AllElo)].games;
            assert_eq!(all, facets.civ_games(Some(day(d)), civ));
        }
        assert_eq!(facets.civ_games(Some(day(17)), 1), 3);
    }

    #[test]
    fn test_breakdowns_disabled() {
        let entries = vec![resolved(1, 2, true, 0, 17, Some("Mirage"))];
        let facets = FacetSet::build(
            &entries,
            FacetOptions {
                group_by_day: false,
                all_elo: false,
                breakdowns: false,
            },
        );

        assert!(facets.by_matchup.is_empty());
        assert!(facets.by_map.is_empty());
        let k = GroupKey {
            day: None,
            civ_id: 1,
            bracket: BracketSlot::Table(0),
        };
        assert_eq!(facets.by_civ[&k].games, 1);
    }
}
