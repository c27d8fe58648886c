//! Track model - the TrackList with its overlap-free placement algorithm.
//!
//! **Why**: Every line must stay sorted by start and free of overlaps. Enforcing this
//! at insertion (instead of validating lazily) lets the compositor and the player
//! assume at most one candidate per line and frame.
//!
//! **Used by**: `Editor` (UI actions), `Compositor` (active items), `Player` (frame bound)
//!
//! # Placement
//!
//! `add_track()` tries the existing lines of the same kind in list order. The first line
//! whose scan finds no overlap gets the item spliced at the scan's insert index.
//! If every line overlaps (or none exists), a new line is opened: appended for audio,
//! prepended for every other kind so video-like lanes draw on top.
//!
//! # Selection
//!
//! The last placed item becomes the selection. `select_track_by_id()` looks an item up
//! by id and yields `Selection::NONE` (`{-1, -1}`) when it is absent.

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::track::{Track, TrackKind, TrackLine};

/// Position of an item inside the TrackList. `{-1, -1}` means nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub line: i32,
    pub index: i32,
}

impl Selection {
    pub const NONE: Selection = Selection { line: -1, index: -1 };

    pub fn new(line: usize, index: usize) -> Self {
        Self { line: line as i32, index: index as i32 }
    }

    pub fn is_none(&self) -> bool {
        self.line < 0 || self.index < 0
    }

    /// (line, index) as usize pair, None for the sentinel
    pub fn get(&self) -> Option<(usize, usize)> {
        if self.is_none() {
            None
        } else {
            Some((self.line as usize, self.index as usize))
        }
    }
}

impl Default for Selection {
    fn default() -> Self {
        Selection::NONE
    }
}

/// Ordered lines of tracks plus the current selection.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrackModel {
    lines: Vec<TrackLine>,
    selection: Selection,
}

impl TrackModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Model starting with an empty main line (reserved primary lane)
    pub fn with_main_line(kind: TrackKind) -> Self {
        Self { lines: vec![TrackLine::main(kind)], selection: Selection::NONE }
    }

    pub fn lines(&self) -> &[TrackLine] {
        &self.lines
    }

    pub fn line(&self, line: usize) -> Option<&TrackLine> {
        self.lines.get(line)
    }

    pub fn track(&self, line: usize, index: usize) -> Option<&Track> {
        self.lines.get(line).and_then(|l| l.list.get(index))
    }

    pub fn track_mut(&mut self, line: usize, index: usize) -> Option<&mut Track> {
        self.lines.get_mut(line).and_then(|l| l.list.get_mut(index))
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.is_empty())
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Currently selected track, if the selection still points at one
    pub fn selected(&self) -> Option<&Track> {
        let (line, index) = self.selection.get()?;
        self.track(line, index)
    }

    /// Timeline length: max `end` over all tracks, 0 when empty
    pub fn frame_count(&self) -> i32 {
        self.lines.iter().map(TrackLine::max_end).max().unwrap_or(0)
    }

    /// Place a track without overlapping anything in its line. Never fails.
    ///
    /// Returns the new selection (where the track landed).
    pub fn add_track(&mut self, item: Track) -> Selection {
        debug_assert!(item.start < item.end, "caller must reject empty intervals");
        let kind = item.kind();

        for (line_idx, line) in self.lines.iter_mut().enumerate() {
            if line.kind != kind {
                continue;
            }
            let scan = line.scan(item.start, item.end, None);
            if !scan.has_overlap {
                trace!(
                    "add_track {} [{}, {}) -> line {} index {}",
                    item.name, item.start, item.end, line_idx, scan.insert_index
                );
                line.list.insert(scan.insert_index, item);
                self.selection = Selection::new(line_idx, scan.insert_index);
                return self.selection;
            }
        }

        let mut line = TrackLine::new(kind);
        debug!("add_track {} [{}, {}): opening new {:?} line", item.name, item.start, item.end, kind);
        line.list.push(item);
        if kind.appends_line() {
            self.lines.push(line);
            self.selection = Selection::new(self.lines.len() - 1, 0);
        } else {
            self.lines.insert(0, line);
            self.selection = Selection::new(0, 0);
        }
        self.selection
    }

    /// Remove one track. Empty non-main lines are dropped; a list left with one empty
    /// line collapses to nothing. Returns the removed track, None when out of range.
    pub fn remove_track(&mut self, line_index: usize, item_index: usize) -> Option<Track> {
        if self.track(line_index, item_index).is_none() {
            return None;
        }
        let selected_id = self.selected().map(|t| t.id);
        let line = &mut self.lines[line_index];
        let removed = line.list.remove(item_index);

        if line.list.is_empty() && !line.main {
            self.lines.remove(line_index);
        }
        if self.lines.len() == 1 && self.lines[0].list.is_empty() {
            self.lines.clear();
        }
        // Lines and items below the splice shift; follow the selected track by id
        self.selection = selected_id
            .filter(|id| *id != removed.id)
            .and_then(|id| self.find(id))
            .unwrap_or(Selection::NONE);

        debug!("remove_track {} from line {} index {}", removed.name, line_index, item_index);
        Some(removed)
    }

    /// Linear scan for a track id; sets and returns the selection (NONE if absent).
    pub fn select_track_by_id(&mut self, id: Uuid) -> Selection {
        self.selection = self.find(id).unwrap_or(Selection::NONE);
        self.selection
    }

    /// Position of a track id without touching the selection
    pub fn find(&self, id: Uuid) -> Option<Selection> {
        self.lines.iter().enumerate().find_map(|(line_idx, line)| {
            line.list
                .iter()
                .position(|t| t.id == id)
                .map(|index| Selection::new(line_idx, index))
        })
    }

    /// Drag-move a track to `new_start` (clamped at frame 0), keeping its length.
    ///
    /// Stays in its own line when the new interval fits there (the item itself is
    /// excluded from the overlap scan); otherwise it is re-placed through `add_track`.
    pub fn move_track(&mut self, line_index: usize, item_index: usize, new_start: i32) -> Option<Selection> {
        let line = self.lines.get(line_index)?;
        let item = line.list.get(item_index)?;
        let new_start = new_start.max(0);
        let new_end = new_start + item.len();
        let scan = line.scan(new_start, new_end, Some(item_index));

        if !scan.has_overlap {
            let line = &mut self.lines[line_index];
            let mut item = line.list.remove(item_index);
            item.start = new_start;
            item.end = new_end;
            line.list.insert(scan.insert_index, item);
            self.selection = Selection::new(line_index, scan.insert_index);
            return Some(self.selection);
        }

        let mut item = self.remove_track(line_index, item_index)?;
        item.start = new_start;
        item.end = new_end;
        Some(self.add_track(item))
    }

    /// Change the visible interval without rescaling the source.
    ///
    /// Trimmed frames go into `offset_l`/`offset_r`; the interval is clamped so neither
    /// offset becomes negative. Returns false (and changes nothing) if the result would
    /// be empty or overlap a neighbour.
    pub fn trim_track(&mut self, line_index: usize, item_index: usize, new_start: i32, new_end: i32) -> bool {
        let Some(line) = self.lines.get(line_index) else {
            return false;
        };
        let Some(item) = line.list.get(item_index) else {
            return false;
        };

        // Source extent on the timeline for the current placement
        let source_start = item.start - item.offset_l;
        let source_end = item.end + item.offset_r;
        let start = new_start.max(source_start);
        let end = new_end.min(source_end);
        if start >= end || line.scan(start, end, Some(item_index)).has_overlap {
            return false;
        }

        let item = &mut self.lines[line_index].list[item_index];
        item.offset_l = start - source_start;
        item.offset_r = source_end - end;
        item.start = start;
        item.end = end;
        true
    }

    /// Per line, the first item containing `frame` that passes `filter`, as (line, index).
    pub fn active_items(&self, frame: i32, filter: impl Fn(&Track) -> bool) -> Vec<(usize, usize)> {
        self.lines
            .iter()
            .enumerate()
            .filter_map(|(line_idx, line)| line.active_at(frame, &filter).map(|i| (line_idx, i)))
            .collect()
    }

    /// Apply `f` to every active playable item at `frame`.
    pub fn for_each_active_playable(&mut self, frame: i32, mut f: impl FnMut(&mut Track)) {
        for (line, index) in self.active_items(frame, Track::is_playable) {
            if let Some(track) = self.track_mut(line, index) {
                f(track);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::track::TrackContent;

    fn video(start: i32, end: i32) -> Track {
        Track::new("v", start, end, TrackContent::video())
    }

    fn audio(start: i32, end: i32) -> Track {
        Track::new("a", start, end, TrackContent::audio())
    }

    fn assert_lines_valid(model: &TrackModel) {
        for line in model.lines() {
            for pair in line.list.windows(2) {
                assert!(pair[0].start <= pair[1].start, "line not sorted");
            }
            for (i, a) in line.list.iter().enumerate() {
                assert_eq!(a.kind(), line.kind);
                for b in line.list.iter().skip(i + 1) {
                    assert!(
                        !crate::entities::track::overlaps((a.start, a.end), (b.start, b.end)),
                        "overlap in line: [{}, {}) vs [{}, {})",
                        a.start, a.end, b.start, b.end
                    );
                }
            }
        }
    }

    #[test]
    fn test_scenario_a_overlap_prepends_line() {
        let mut model = TrackModel::new();
        model.add_track(video(0, 100));
        let sel = model.add_track(video(50, 80));

        assert_eq!(model.lines().len(), 2);
        assert_eq!(model.lines()[0].list[0].start, 50);
        assert_eq!(sel, Selection::new(0, 0));
    }

    #[test]
    fn test_scenario_b_same_line() {
        let mut model = TrackModel::new();
        model.add_track(audio(0, 50));
        let sel = model.add_track(audio(60, 90));

        assert_eq!(model.lines().len(), 1);
        assert_eq!(sel, Selection::new(0, 1));
        assert_eq!(model.lines()[0].list[1].start, 60);
    }

    #[test]
    fn test_audio_overlap_appends_line() {
        let mut model = TrackModel::new();
        model.add_track(video(0, 100));
        model.add_track(audio(0, 100));
        let sel = model.add_track(audio(10, 20));

        assert_eq!(model.lines().len(), 3);
        assert_eq!(model.lines()[2].kind, TrackKind::Audio);
        assert_eq!(model.lines()[2].list[0].start, 10);
        assert_eq!(sel, Selection::new(2, 0));
    }

    #[test]
    fn test_insert_index_sorted() {
        let mut model = TrackModel::new();
        model.add_track(video(100, 110));
        model.add_track(video(0, 10));
        let sel = model.add_track(video(50, 60));

        let line = &model.lines()[0];
        assert_eq!(line.list.iter().map(|t| t.start).collect::<Vec<_>>(), vec![0, 50, 100]);

        let (l, i) = sel.get().unwrap();
        let placed = &model.lines()[l].list[i];
        for before in &line.list[..i] {
            assert!(before.end <= placed.start);
        }
        if let Some(after) = line.list.get(i + 1) {
            assert!(after.start >= placed.end);
        }
    }

    #[test]
    fn test_invariants_hold_for_many_inserts() {
        let mut model = TrackModel::new();
        // Deterministic pseudo-random intervals
        let mut seed: u32 = 7;
        for _ in 0..200 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let start = (seed >> 8) as i32 % 500;
            let len = 1 + (seed >> 20) as i32 % 60;
            let track = if seed % 3 == 0 { audio(start, start + len) } else { video(start, start + len) };
            model.add_track(track);
        }
        assert_lines_valid(&model);
    }

    #[test]
    fn test_first_fitting_line_wins() {
        let mut model = TrackModel::new();
        model.add_track(video(0, 100)); // line A
        model.add_track(video(0, 10)); // overlaps A -> new line B at front
        // [20, 30) overlaps A but fits in B, which is now first
        let sel = model.add_track(video(20, 30));
        assert_eq!(sel, Selection::new(0, 1));
        assert_eq!(model.lines().len(), 2);
    }

    #[test]
    fn test_remove_deletes_empty_line() {
        let mut model = TrackModel::new();
        model.add_track(video(0, 10));
        model.add_track(video(5, 15)); // second line
        assert_eq!(model.lines().len(), 2);

        let removed = model.remove_track(0, 0).unwrap();
        assert_eq!(removed.start, 5);
        assert_eq!(model.lines().len(), 1);
    }

    #[test]
    fn test_remove_keeps_main_line() {
        let mut model = TrackModel::with_main_line(TrackKind::Video);
        model.add_track(audio(0, 10));
        model.add_track(video(0, 10));
        assert_eq!(model.lines().len(), 2);

        // video landed in the main line (index 0)
        assert!(model.lines()[0].main);
        model.remove_track(0, 0);
        assert_eq!(model.lines().len(), 2);
        assert!(model.lines()[0].is_empty());
    }

    #[test]
    fn test_remove_collapses_single_empty_line() {
        let mut model = TrackModel::with_main_line(TrackKind::Video);
        model.add_track(video(0, 10));
        model.remove_track(0, 0);
        assert!(model.lines().is_empty());
        assert_eq!(model.frame_count(), 0);
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut model = TrackModel::new();
        assert!(model.remove_track(0, 0).is_none());
        model.add_track(video(0, 10));
        assert!(model.remove_track(0, 5).is_none());
        assert_eq!(model.lines().len(), 1);
    }

    #[test]
    fn test_remove_line_keeps_selection_on_same_track() {
        let mut model = TrackModel::new();
        // Overlapping videos stack as lines [c], [b], [a]
        let a = video(0, 10);
        let b = video(0, 10);
        let c = video(0, 10);
        let (a_id, b_id) = (a.id, b.id);
        model.add_track(a);
        model.add_track(b);
        model.add_track(c);
        assert_eq!(model.lines().len(), 3);

        assert_eq!(model.select_track_by_id(b_id), Selection::new(1, 0));
        model.remove_track(0, 0);

        assert_eq!(model.lines().len(), 2);
        assert_eq!(model.selection(), Selection::new(0, 0));
        assert_eq!(model.selected().map(|t| t.id), Some(b_id));

        // Removing the selected track clears the selection
        model.remove_track(0, 0);
        assert_eq!(model.selection(), Selection::NONE);
        assert_eq!(model.track(0, 0).map(|t| t.id), Some(a_id));
    }

    #[test]
    fn test_remove_earlier_item_shifts_selection_index() {
        let mut model = TrackModel::new();
        model.add_track(video(0, 10));
        let second = video(20, 30);
        let second_id = second.id;
        model.add_track(second);

        model.remove_track(0, 0);
        assert_eq!(model.selection(), Selection::new(0, 0));
        assert_eq!(model.selected().map(|t| t.id), Some(second_id));
    }

    #[test]
    fn test_move_clamps_at_frame_zero() {
        let mut model = TrackModel::new();
        model.add_track(video(10, 20));
        let sel = model.move_track(0, 0, -15).unwrap();
        let t = model.track(sel.line as usize, sel.index as usize).unwrap();
        assert_eq!((t.start, t.end), (0, 10));
    }

    #[test]
    fn test_select_by_id() {
        let mut model = TrackModel::new();
        let a = video(0, 10);
        let b = audio(0, 10);
        let b_id = b.id;
        model.add_track(a);
        model.add_track(b);

        assert_eq!(model.select_track_by_id(b_id), Selection::new(1, 0));
        assert_eq!(model.selected().map(|t| t.id), Some(b_id));
        assert_eq!(model.select_track_by_id(Uuid::new_v4()), Selection::NONE);
        assert!(model.selected().is_none());
    }

    #[test]
    fn test_frame_count_is_max_end() {
        let mut model = TrackModel::new();
        assert_eq!(model.frame_count(), 0);
        model.add_track(video(0, 40));
        model.add_track(audio(10, 75));
        model.add_track(video(50, 60));
        assert_eq!(model.frame_count(), 75);
    }

    #[test]
    fn test_move_within_line() {
        let mut model = TrackModel::new();
        model.add_track(video(0, 10));
        model.add_track(video(20, 30));

        // Moving [0,10) to [40,50) keeps it in line 0, now last
        let sel = model.move_track(0, 0, 40).unwrap();
        assert_eq!(sel, Selection::new(0, 1));
        assert_eq!(model.lines().len(), 1);
        assert_eq!(model.lines()[0].list[1].start, 40);
        assert_eq!(model.lines()[0].list[1].end, 50);

        // Small shift overlapping only its own old position stays in place
        let sel = model.move_track(0, 0, 22).unwrap();
        assert_eq!(sel, Selection::new(0, 0));
        assert_eq!(model.lines()[0].list[0].start, 22);
    }

    #[test]
    fn test_move_onto_neighbour_opens_line() {
        let mut model = TrackModel::new();
        model.add_track(video(0, 10));
        model.add_track(video(20, 30));

        let sel = model.move_track(0, 0, 25).unwrap();
        assert_eq!(model.lines().len(), 2);
        assert_eq!(sel, Selection::new(0, 0));
        assert_eq!(model.lines()[0].list[0].start, 25);
    }

    #[test]
    fn test_trim_updates_offsets() {
        let mut model = TrackModel::new();
        model.add_track(video(0, 100));

        assert!(model.trim_track(0, 0, 10, 90));
        let t = model.track(0, 0).unwrap();
        assert_eq!((t.start, t.end, t.offset_l, t.offset_r), (10, 90, 10, 10));

        // Cannot grow past the source extent
        assert!(model.trim_track(0, 0, -20, 120));
        let t = model.track(0, 0).unwrap();
        assert_eq!((t.start, t.end, t.offset_l, t.offset_r), (0, 100, 0, 0));

        assert!(!model.trim_track(0, 0, 50, 50));
    }

    #[test]
    fn test_trim_rejects_overlap() {
        let mut model = TrackModel::new();
        model.add_track(video(0, 50));
        model.add_track(video(60, 100));
        assert!(model.trim_track(0, 1, 70, 100));
        // Widening the first item into the second is refused
        model.track_mut(0, 0).unwrap().offset_r = 30;
        assert!(!model.trim_track(0, 0, 0, 75));
    }

    #[test]
    fn test_active_items_per_line() {
        let mut model = TrackModel::new();
        model.add_track(video(0, 50));
        model.add_track(video(10, 20)); // new front line
        model.add_track(audio(0, 100));

        let drawable = model.active_items(15, Track::is_drawable);
        assert_eq!(drawable, vec![(0, 0), (1, 0)]);

        let playable = model.active_items(60, Track::is_playable);
        assert_eq!(playable, vec![(2, 0)]);
    }
}
