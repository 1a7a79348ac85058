use std::collections::HashMap;

use semstore_core::{ChunkHit, FileId, FileMatch};

/// Groups ranked chunk hits into one match per file.
///
/// Files come out in the order their first hit appears; inside a match the
/// chunks keep hit order, so `distances[i]` is the distance of `chunks[i]`.
pub fn aggregate_hits(hits: impl IntoIterator<Item = ChunkHit>) -> Vec<FileMatch> {
    let mut position: HashMap<FileId, usize> = HashMap::new();
    let mut matches: Vec<FileMatch> = Vec::new();
    for hit in hits {
        let idx = *position.entry(hit.file_id.clone()).or_insert_with(|| {
            matches.push(FileMatch {
                file_id: hit.file_id.clone(),
                source: hit.source.clone(),
                chunks: Vec::new(),
                distances: Vec::new(),
            });
            matches.len() - 1
        });
        let entry = &mut matches[idx];
        entry.chunks.push(hit.payload);
        entry.distances.push(hit.distance);
    }
    matches
}
