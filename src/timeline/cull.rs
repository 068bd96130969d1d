//! Suppresses rendering of notes stacked on top of each other.

use std::collections::HashMap;

use crate::model::Note;

/// Marks notes that would overlap an already placed note as not displayed.
///
/// Notes are visited in ascending height. Each unit's heights are cut into
/// buckets `bucket_height` wide; a note is hidden when its own bucket or the
/// one below already holds a note less than `distance` away horizontally.
/// Hidden notes are still judged. Returns how many notes were hidden.
pub fn cull_dense_notes(notes: &mut [Note], bucket_height: f32, distance: f32) -> usize {
    if bucket_height <= 0.0 {
        return 0;
    }
    let mut order: Vec<usize> = (0..notes.len()).collect();
    order.sort_by(|&a, &b| notes[a].note_height.total_cmp(&notes[b].note_height));

    let mut placed: HashMap<(u32, i64), Vec<f32>> = HashMap::new();
    let mut hidden = 0;
    for index in order {
        let note = &mut notes[index];
        let bucket = (note.note_height / bucket_height).floor() as i64;
        let crowded = [bucket, bucket - 1].iter().any(|&bucket| {
            placed
                .get(&(note.unit_id, bucket))
                .is_some_and(|xs| xs.iter().any(|x| (x - note.x_position).abs() < distance))
        });
        if crowded && note.will_display {
            note.will_display = false;
            hidden += 1;
        }
        placed
            .entry((note.unit_id, bucket))
            .or_default()
            .push(note.x_position);
    }
    hidden
}
