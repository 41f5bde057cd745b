//! Ranking and snapshot diffing.

use crate::models::{ChangeRecord, GangSnapshot, RawGang};
use std::collections::HashMap;

/// Sort a raw sample by XP (descending, stable) and assign 1-based ranks.
///
/// Ranks are always derived here; whatever position the source reports is
/// carried as the level instead.
pub fn rank_sample(sample: Vec<RawGang>) -> Vec<GangSnapshot> {
    let mut sample = sample;
    // `sort_by` is stable, so equal XP keeps source order.
    sample.sort_by(|a, b| b.xp.cmp(&a.xp));

    sample
        .into_iter()
        .enumerate()
        .map(|(index, gang)| GangSnapshot {
            name: gang.gang_name,
            xp: gang.xp,
            level: gang.level,
            rank: index + 1,
        })
        .collect()
}

/// Signed XP change, saturating at the `i64` range.
fn xp_delta(after: u64, before: u64) -> i64 {
    let delta = i128::from(after) - i128::from(before);
    i64::try_from(delta).unwrap_or(if delta < 0 { i64::MIN } else { i64::MAX })
}

/// Compute per-gang changes between two ranked snapshots.
///
/// An empty `old` snapshot is a baseline and yields no changes, so a first
/// observation never credits a gang's whole history as a single gain.
pub fn diff(new: &[GangSnapshot], old: &[GangSnapshot]) -> Vec<ChangeRecord> {
    if old.is_empty() {
        return Vec::new();
    }

    let mut previous: HashMap<&str, &GangSnapshot> = HashMap::with_capacity(old.len());
    for gang in old {
        previous.entry(gang.name.as_str()).or_insert(gang);
    }

    let mut changes = Vec::new();

    for gang in new {
        match previous.get(gang.name.as_str()) {
            Some(before) => {
                let xp_delta = xp_delta(gang.xp, before.xp);
                let level_delta = gang.level.saturating_sub(before.level);
                let rank_delta = gang.rank as i64 - before.rank as i64;

                if xp_delta == 0 && level_delta == 0 && rank_delta == 0 {
                    continue;
                }

                changes.push(ChangeRecord {
                    name: gang.name.clone(),
                    xp_before: before.xp,
                    xp_after: gang.xp,
                    xp_delta,
                    level_before: before.level,
                    level_after: gang.level,
                    level_delta,
                    rank_before: before.rank,
                    rank_after: gang.rank,
                    rank_delta,
                    is_new: false,
                });
            }
            None => changes.push(ChangeRecord {
                name: gang.name.clone(),
                xp_before: 0,
                xp_after: gang.xp,
                xp_delta: xp_delta(gang.xp, 0),
                level_before: 0,
                level_after: gang.level,
                level_delta: gang.level,
                rank_before: 0,
                rank_after: gang.rank,
                rank_delta: 0,
                is_new: true,
            }),
        }
    }

    changes
}
