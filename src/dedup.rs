//! Collapses own-post and quoted-post records to one record per id.

use crate::model::StoredRecord;
use std::collections::HashMap;

/// Merge own records then quoted records, keeping the last record per id.
///
/// A quoted record sharing an id with an own record therefore replaces it.
/// Output order is the order in which each id was first seen.
#[must_use]
pub fn merge_records(own: Vec<StoredRecord>, quoted: Vec<StoredRecord>) -> Vec<StoredRecord> {
    let mut merged: Vec<StoredRecord> = Vec::with_capacity(own.len() + quoted.len());
    let mut position: HashMap<String, usize> = HashMap::with_capacity(merged.capacity());

    for record in own.into_iter().chain(quoted) {
        if let Some(&idx) = position.get(&record.tweet_id) {
            merged[idx] = record;
        } else {
            position.insert(record.tweet_id.clone(), merged.len());
            merged.push(record);
        }
    }

    merged
}
