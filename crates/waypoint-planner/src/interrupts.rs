use serde::{Deserialize, Serialize};
use waypoint_core::{OutOfBandMigration, Version};

/// A point in a multi-version plan where schema migrations pause until the
/// listed out-of-band migrations finish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interrupt {
    pub version: Version,
    pub migration_ids: Vec<i32>,
}

impl Interrupt {
    pub fn new(version: Version, migration_ids: Vec<i32>) -> Self {
        Self {
            version,
            migration_ids,
        }
    }
}

/// Work out where a move from `from` to `to` has to stop for out-of-band
/// migrations. The result is ordered in the direction of travel.
///
/// Upgrading, a migration deprecated in `(from, to]` must finish while its
/// code still runs, so it is due at the last known version before its
/// deprecation. Migrations that already exist at an earlier interrupt are
/// finished there instead of adding another stop.
///
/// Downgrading, a migration introduced in `(to, from]` must be reversed at its
/// introduction version, before the instance drops below it. Migrations that
/// still exist at an earlier (newer) interrupt are reversed there.
pub fn schedule_interrupts(
    migrations: &[OutOfBandMigration],
    from: Version,
    to: Version,
    known_versions: &[Version],
) -> Vec<Interrupt> {
    if from < to {
        schedule_upgrade(migrations, from, to, known_versions)
    } else if from > to {
        schedule_downgrade(migrations, from, to)
    } else {
        Vec::new()
    }
}

fn schedule_upgrade(
    migrations: &[OutOfBandMigration],
    from: Version,
    to: Version,
    known_versions: &[Version],
) -> Vec<Interrupt> {
    let mut due: Vec<(Version, &OutOfBandMigration)> = migrations
        .iter()
        .filter_map(|m| m.deprecated.map(|d| (d, m)))
        .filter(|(deprecated, _)| from < *deprecated && *deprecated <= to)
        .collect();
    due.sort_by_key(|(deprecated, m)| (*deprecated, m.id));

    let mut interrupts: Vec<Interrupt> = Vec::new();
    for (deprecated, migration) in due {
        let version = known_versions
            .iter()
            .copied()
            .filter(|v| *v < deprecated)
            .max()
            .map_or(from, |v| v.max(from));

        if let Some(last) = interrupts.last_mut()
            && (migration.introduced <= last.version || version <= last.version)
        {
            last.migration_ids.push(migration.id);
            continue;
        }
        interrupts.push(Interrupt::new(version, vec![migration.id]));
    }
    interrupts
}

fn schedule_downgrade(
    migrations: &[OutOfBandMigration],
    from: Version,
    to: Version,
) -> Vec<Interrupt> {
    let mut due: Vec<&OutOfBandMigration> = migrations
        .iter()
        .filter(|m| to < m.introduced && m.introduced <= from)
        .collect();
    due.sort_by(|a, b| b.introduced.cmp(&a.introduced).then(a.id.cmp(&b.id)));

    let mut interrupts: Vec<Interrupt> = Vec::new();
    for migration in due {
        if let Some(last) = interrupts.last_mut()
            && (migration.exists_at(last.version) || migration.introduced >= last.version)
        {
            last.migration_ids.push(migration.id);
            continue;
        }
        interrupts.push(Interrupt::new(migration.introduced, vec![migration.id]));
    }
    interrupts
}
