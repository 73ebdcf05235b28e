use tracing::{Level, event};

use crate::core::{EntityKind, EntitySnapshot, Result};
use crate::transaction::{PropertyEntry, TransactionData};

/// Builds the commit-time state of every entity of `kind` whose indexed
/// properties the transaction touched.
///
/// Removals are read before assignments. An entity seen in a removal but
/// deleted later in the transaction is skipped; an entity assigned several
/// times ends up with a single entry holding its final values.
pub fn build_entity_snapshot(
    data: &dyn TransactionData,
    kind: EntityKind,
    indexed_keys: &[String],
) -> Result<EntitySnapshot> {
    let mut snapshot = EntitySnapshot::new();
    if indexed_keys.is_empty() {
        return Ok(snapshot);
    }

    for entry in relevant(data.removed_properties(kind), indexed_keys) {
        match data.properties(kind, entry.entity, indexed_keys) {
            Ok(properties) => {
                snapshot.insert(entry.entity, properties);
            }
            Err(err) if err.is_entity_not_found() => {
                event!(Level::TRACE, %kind, entity = %entry.entity, "entity deleted in transaction, skipped");
            }
            Err(err) => return Err(err),
        }
    }

    for entry in relevant(data.assigned_properties(kind), indexed_keys) {
        let properties = data.properties(kind, entry.entity, indexed_keys)?;
        snapshot.insert(entry.entity, properties);
    }

    Ok(snapshot)
}

fn relevant<'a>(
    entries: &'a [PropertyEntry],
    indexed_keys: &'a [String],
) -> impl Iterator<Item = &'a PropertyEntry> + 'a {
    entries
        .iter()
        .filter(move |entry| indexed_keys.contains(&entry.key))
}
