//! Look-ahead contamination tests for feature extraction.
//!
//! Invariant: training rows built from a window may only depend on records
//! inside that window. With next-draw targets the last record of a window is
//! never paired with anything, so appending later history must not change
//! a window's rows.

use lotolab_core::data::SyntheticDataSource;
use lotolab_core::domain::{DrawRecord, GameSpec};
use lotolab_core::features::{FeatureExtractor, FrequencyTable, TargetMode};

const G: GameSpec = GameSpec::LOTO7;

fn history(n: u32) -> Vec<DrawRecord> {
    SyntheticDataSource::new(G, n, 99).generate()
}

fn extract(window: &[DrawRecord], mode: TargetMode) -> (Vec<Vec<f64>>, Vec<u8>) {
    let mut freq = FrequencyTable::new(&G);
    let set = FeatureExtractor::new(G, mode, 1).extract(window, &mut freq).unwrap();
    (set.rows(), set.targets)
}

#[test]
fn next_draw_rows_ignore_records_after_the_window() {
    let full = history(60);
    for end in [10, 25, 40] {
        let (rows, targets) = extract(&full[..end], TargetMode::NextDraw);
        let (rows_long, targets_long) = extract(&full[..end + 5], TargetMode::NextDraw);
        // The window's rows are a prefix of the longer history's rows.
        assert_eq!(rows[..], rows_long[..rows.len()]);
        assert_eq!(targets[..], targets_long[..targets.len()]);
        // (end - 1) pairs of 7 rows each.
        assert_eq!(targets.len(), (end - 1) * 7);
    }
}

#[test]
fn next_draw_targets_come_from_the_following_record() {
    let window = history(5);
    let (_, targets) = extract(&window, TargetMode::NextDraw);
    let expected: Vec<u8> = window[1..]
        .iter()
        .flat_map(|r| r.numbers.iter().map(|&n| n as u8))
        .collect();
    assert_eq!(targets, expected);
}

#[test]
fn an_invalid_successor_drops_the_pair() {
    let mut window = history(4);
    window[2].numbers[0] = 99;
    let (_, targets) = extract(&window, TargetMode::NextDraw);
    // Pairs (0,1) only: (1,2) has an invalid target, (2,3) an invalid source.
    assert_eq!(targets.len(), 7);
}
