use crate::domains::backup::types::{
    ConflictResolution, ConflictStrategy, ConflictSummary, MergeChange, IMPORTED_COPY_MARKER,
};
use crate::domains::wardrobe::types::ClothingItem;
use std::collections::HashSet;

/// Merge `imported` into `existing` under `strategy`.
///
/// Conflicts are detected by id only; items with a blank id never conflict.
/// An imported id seen earlier in the same archive conflicts with that earlier entry.
/// No I/O: [`ConflictResolution::changes`] lists what the caller must persist.
pub fn resolve_conflicts(
    existing: &[ClothingItem],
    imported: &[ClothingItem],
    strategy: ConflictStrategy,
) -> ConflictResolution {
    let mut known_ids: HashSet<&str> = existing
        .iter()
        .filter(|item| item.record.has_id())
        .map(|item| item.record.id.as_str())
        .collect();

    let mut items = existing.to_vec();
    let mut changes = Vec::new();
    let mut summary = ConflictSummary { total: imported.len(), ..Default::default() };

    for item in imported {
        let id = item.record.id.as_str();
        if !item.record.has_id() || known_ids.insert(id) {
            items.push(item.clone());
            changes.push(MergeChange::Add(item.clone()));
            summary.added += 1;
            continue;
        }

        match strategy {
            ConflictStrategy::Replace => {
                if let Some(slot) = items.iter_mut().find(|current| current.record.id == id) {
                    *slot = item.clone();
                    changes.push(MergeChange::Replace(item.clone()));
                    summary.replaced += 1;
                }
            }
            ConflictStrategy::Skip => summary.skipped += 1,
            ConflictStrategy::Duplicate => {
                let copy = imported_copy(item);
                items.push(copy.clone());
                changes.push(MergeChange::Add(copy));
                summary.added += 1;
            }
        }
    }

    ConflictResolution { items, summary, changes }
}

fn imported_copy(item: &ClothingItem) -> ClothingItem {
    let mut copy = item.clone();
    copy.record.id.clear();
    let notes = copy.record.notes.take().unwrap_or_default();
    copy.record.notes = Some(format!("{} {}", notes, IMPORTED_COPY_MARKER).trim().to_string());
    if let Some(image) = copy.image.as_mut() {
        image.id.clear();
    }
    copy
}
