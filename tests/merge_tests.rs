// Integration tests for speaker turn merging and upload result joining

use loqa_asr::recognition::{merge_stream_results, SentenceFragment};
use loqa_asr::ResultMerger;

fn fragment(start_ms: i64, end_ms: i64, speaker_id: u32, text: &str) -> SentenceFragment {
    SentenceFragment {
        start_ms,
        end_ms,
        speaker_id,
        text: text.to_string(),
    }
}

#[test]
fn test_same_speaker_sentences_fold_into_one_turn() {
    let merger = ResultMerger::default();
    let turns = merger.merge(&[
        fragment(0, 1000, 0, "hi"),
        fragment(1000, 1800, 0, "there"),
        fragment(3000, 4000, 1, "hey"),
    ]);

    assert_eq!(turns.len(), 2);

    assert_eq!(turns[0].speaker, "Speaker 0");
    assert_eq!(turns[0].text, "hithere");
    assert_eq!(turns[0].start_time, 0.0);
    assert_eq!(turns[0].end_time, 1.8);
    assert_eq!(turns[0].time_range, "0:00.0-0:01.8");

    assert_eq!(turns[1].speaker, "Speaker 1");
    assert_eq!(turns[1].text, "hey");
    assert_eq!(turns[1].start_time, 3.0);
    assert_eq!(turns[1].end_time, 4.0);
}

#[test]
fn test_gap_beyond_threshold_starts_new_turn() {
    let merger = ResultMerger::default();
    let turns = merger.merge(&[fragment(0, 1000, 0, "one"), fragment(2500, 3000, 0, "two")]);

    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].speaker_id, turns[1].speaker_id);
}

#[test]
fn test_turns_keep_input_order() {
    let merger = ResultMerger::new(500, "Spk");
    let turns = merger.merge(&[
        fragment(0, 400, 1, "a"),
        fragment(500, 900, 0, "b"),
        fragment(1000, 1400, 1, "c"),
        fragment(1500, 1900, 1, "d"),
    ]);

    let summary: Vec<(&str, &str)> = turns.iter().map(|t| (t.speaker.as_str(), t.text.as_str())).collect();
    assert_eq!(summary, vec![("Spk1", "a"), ("Spk0", "b"), ("Spk1", "cd")]);

    for pair in turns.windows(2) {
        assert!(pair[0].start_time <= pair[1].start_time);
    }
}

#[test]
fn test_merging_merged_turns_changes_nothing() {
    let merger = ResultMerger::default();
    let once = merger.merge(&[
        fragment(0, 1000, 0, "hi"),
        fragment(1000, 1800, 0, "there"),
        fragment(3000, 4000, 1, "hey"),
    ]);

    let fragments: Vec<SentenceFragment> = once.iter().map(|t| t.as_fragment()).collect();
    let twice = merger.merge(&fragments);

    assert_eq!(once, twice);
}

#[test]
fn test_empty_input_yields_no_turns() {
    assert!(ResultMerger::default().merge(&[]).is_empty());
}

#[test]
fn test_stream_results_are_trimmed_and_concatenated() {
    let results = vec![" 你".to_string(), "好 ".to_string(), "   ".to_string(), "呀".to_string()];
    assert_eq!(merge_stream_results(&results), Some("你好呀".to_string()));
}

#[test]
fn test_blank_stream_results_merge_to_nothing() {
    assert_eq!(merge_stream_results(&[]), None);
    assert_eq!(merge_stream_results(&[" ".to_string(), String::new()]), None);
}
