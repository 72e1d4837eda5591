use crate::{
    source::{feed, FeedSource, Feeder, FileOpener},
    store::{JsonFileBackend, MemoryBackend, PositionStore},
    CursorState, IngestMode, ProducerState, ReaderError, ReaderOptions, ReaderSession, Teardown,
};

const SCENARIO: [&str; 2] = ["hello world this is a test", "second line"];

fn fed(lines: &[&str], finish: bool) -> (Feeder, FeedSource) {
    let (feeder, source) = feed();
    for line in lines {
        feeder.push_line(*line).unwrap();
    }
    if finish {
        feeder.finish().unwrap();
    }
    (feeder, source)
}

fn memory_store() -> PositionStore {
    PositionStore::load(MemoryBackend::default()).unwrap()
}

fn open(lines: &[&str], options: ReaderOptions) -> ReaderSession {
    let (_, source) = fed(lines, true);
    ReaderSession::open("test", source, memory_store(), options).unwrap()
}

mod navigation {
    use super::*;

    fn walkthrough(mode: IngestMode) {
        let mut session = open(&SCENARIO, ReaderOptions::default().ingest_mode(mode));
        assert_eq!(session.current_status().state, CursorState::Start);

        let status = session.next(false).unwrap();
        assert_eq!(status.window, "hello world this is ");
        assert_eq!(status.state, CursorState::Reading);
        assert_eq!(status.line_index, 0);

        let status = session.next(false).unwrap();
        assert_eq!(status.window, "a test");
        assert_eq!(status.line_index, 0);

        let status = session.next(false).unwrap();
        assert_eq!(status.window, "second line");
        assert_eq!(status.line_index, 1);

        let status = session.next(false).unwrap();
        assert_eq!(status.state, CursorState::End);
        assert_eq!(status.total_lines, Some(2));
        assert_eq!(status.display(), crate::session::END_MARKER);
    }

    #[test]
    fn streaming_walkthrough() {
        walkthrough(IngestMode::Streaming);
    }

    #[test]
    fn full_walkthrough() {
        walkthrough(IngestMode::Full);
    }

    #[test]
    fn boundaries_absorb() {
        let mut session = open(&SCENARIO, ReaderOptions::default());
        let start = session.prev(false).unwrap();
        assert_eq!(start.state, CursorState::Start);
        assert_eq!(start.display(), crate::session::START_MARKER);

        session.goto_line(2, None).unwrap();
        let end = session.next(true).unwrap();
        assert_eq!(end.state, CursorState::End);
        assert_eq!(session.next(false).unwrap(), end);

        let back = session.prev(false).unwrap();
        assert_eq!(back.state, CursorState::Reading);
        assert_eq!(back.display(), "second line");
    }

    #[test]
    fn prev_by_line_walks_back_one_line_at_a_time() {
        let mut session = open(&SCENARIO, ReaderOptions::default().window_width(4));
        session.goto_line(2, Some(4)).unwrap();

        let status = session.prev(true).unwrap();
        assert_eq!((status.line_index, status.column_offset), (1, 0));
        let status = session.prev(true).unwrap();
        assert_eq!((status.line_index, status.column_offset), (0, 0));
        assert_eq!(status.state, CursorState::Reading);
        assert_eq!(session.prev(true).unwrap().state, CursorState::Start);
    }

    #[test]
    fn current_status_does_not_move() {
        let mut session = open(&SCENARIO, ReaderOptions::default());
        let moved = session.next(false).unwrap();
        assert_eq!(session.current_status(), moved);
        assert_eq!(session.current_status(), moved);
    }
}

mod ingestion {
    use super::*;
    use std::{thread, time::Duration};

    #[test]
    fn opening_reads_a_single_line() {
        let lines: Vec<String> = (0..10).map(|i| format!("line {i}")).collect();
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        let (_feeder, source) = fed(&lines, true);
        let session =
            ReaderSession::open("t", source, memory_store(), ReaderOptions::default()).unwrap();
        assert_eq!(session.buffer().len(), 1);
        assert_eq!(session.producer_state(), ProducerState::Paused);
    }

    #[test]
    fn next_resumes_producer_near_frontier() {
        let (_feeder, source) = fed(&["only line so far"], false);
        let mut session =
            ReaderSession::open("t", source, memory_store(), ReaderOptions::default()).unwrap();
        assert_eq!(session.producer_state(), ProducerState::Paused);

        session.next(false).unwrap();
        assert_eq!(session.producer_state(), ProducerState::Active);
    }

    #[test]
    fn streaming_stays_close_to_the_cursor() {
        let lines: Vec<String> = (0..30).map(|i| format!("line {i}")).collect();
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        let (_feeder, source) = fed(&lines, true);
        let mut session =
            ReaderSession::open("t", source, memory_store(), ReaderOptions::default()).unwrap();

        let mut seen = Vec::new();
        loop {
            let status = session.next(true).unwrap();
            if status.state == CursorState::End {
                break;
            }
            assert!(session.buffer().len() <= status.line_index + 4);
            seen.push(status.window);
        }
        assert_eq!(seen, lines);
    }

    #[test]
    fn full_mode_knows_total_on_open() {
        let session = open(
            &["a", "b", "c"],
            ReaderOptions::default().ingest_mode(IngestMode::Full),
        );
        let status = session.current_status();
        assert_eq!(status.total_lines, Some(3));
        assert_eq!(status.lines_loaded, 3);
        assert_eq!(session.producer_state(), ProducerState::Closed);
    }

    #[test]
    fn reading_while_lines_trickle_in() {
        let (feeder, source) = feed();
        let writer = thread::spawn(move || {
            for i in 0..20 {
                feeder.push_line(format!("line {i}")).unwrap();
                thread::sleep(Duration::from_millis(2));
            }
            feeder.finish().unwrap();
        });

        let mut session =
            ReaderSession::open("t", source, memory_store(), ReaderOptions::default()).unwrap();
        let mut seen = Vec::new();
        loop {
            let status = session.next(true).unwrap();
            if status.state == CursorState::End {
                break;
            }
            seen.push(status.window);
        }
        writer.join().unwrap();

        let expected: Vec<String> = (0..20).map(|i| format!("line {i}")).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn empty_source() {
        let mut session = open(&[], ReaderOptions::default());
        assert_eq!(session.current_status().total_lines, Some(0));
        assert_eq!(session.next(false).unwrap().state, CursorState::End);
        assert_eq!(session.prev(false).unwrap().state, CursorState::Start);
    }

    #[test]
    fn unavailable_source() {
        let dir = tempfile::tempdir().unwrap();
        let opener = FileOpener::new(dir.path());
        let err = ReaderSession::open("nope.txt", &opener, memory_store(), ReaderOptions::default())
            .unwrap_err();
        assert!(matches!(err, ReaderError::SourceUnavailable { .. }));
    }
}

mod goto {
    use super::*;

    fn numbered(n: usize) -> (Feeder, FeedSource) {
        let (feeder, source) = feed();
        for i in 1..=n {
            feeder.push_line(format!("line {i}")).unwrap();
        }
        feeder.finish().unwrap();
        (feeder, source)
    }

    #[test]
    fn waits_for_lines_not_yet_ingested() {
        let (_feeder, source) = numbered(50);
        let mut session =
            ReaderSession::open("t", source, memory_store(), ReaderOptions::default()).unwrap();
        let status = session.goto_line(40, None).unwrap();
        assert_eq!(status.window, "line 40");
        assert_eq!(status.line_index, 39);
        assert!(status.lines_loaded >= 40);
    }

    #[test]
    fn past_the_end_is_out_of_range() {
        let (_feeder, source) = numbered(50);
        let mut session =
            ReaderSession::open("t", source, memory_store(), ReaderOptions::default()).unwrap();
        session.goto_line(10, None).unwrap();
        let before = session.current_status();

        let err = session.goto_line(60, None).unwrap_err();
        assert!(matches!(
            err,
            ReaderError::OutOfRange {
                requested: 60,
                available: 50
            }
        ));
        let after = session.current_status();
        assert_eq!(after.window, before.window);
        assert_eq!(after.line_index, before.line_index);
        assert_eq!(after.total_lines, Some(50));
    }

    #[test]
    fn zero_is_out_of_range() {
        let mut session = open(&SCENARIO, ReaderOptions::default());
        assert!(matches!(
            session.goto_line(0, None),
            Err(ReaderError::OutOfRange { requested: 0, .. })
        ));
        assert_eq!(session.current_status().state, CursorState::Start);
    }

    #[test]
    fn idempotent() {
        let mut session = open(&SCENARIO, ReaderOptions::default());
        let first = session.goto_line(1, Some(6)).unwrap();
        let second = session.goto_line(1, Some(6)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.window, "world this is a test");
    }
}

mod persistence {
    use super::*;

    #[test]
    fn first_visit_creates_record() {
        let store = memory_store();
        let (_, source) = fed(&SCENARIO, true);
        let _session =
            ReaderSession::open("new.txt", source, store.clone(), ReaderOptions::default())
                .unwrap();
        let record = store.lookup(&"new.txt".into()).unwrap();
        assert_eq!((record.line_index, record.column_offset), (0, 0));
    }

    #[test]
    fn every_move_is_saved() {
        let store = memory_store();
        let (_, source) = fed(&SCENARIO, true);
        let mut session =
            ReaderSession::open("s", source, store.clone(), ReaderOptions::default()).unwrap();
        let saved = |store: &PositionStore| {
            let r = store.lookup(&"s".into()).unwrap();
            (r.line_index, r.column_offset)
        };

        session.next(false).unwrap();
        session.next(false).unwrap();
        assert_eq!(saved(&store), (0, 20));
        session.next(false).unwrap();
        assert_eq!(saved(&store), (1, 0));
        session.prev(false).unwrap();
        assert_eq!(saved(&store), (0, 6));
    }

    #[test]
    fn position_restored_after_restart() {
        let backend = MemoryBackend::default();

        let store = PositionStore::load(backend.clone()).unwrap();
        let (_, source) = fed(&SCENARIO, true);
        let mut session =
            ReaderSession::open("book", source, store, ReaderOptions::default()).unwrap();
        session.next(false).unwrap();
        let left_at = session.next(false).unwrap();
        session.close().unwrap();

        let store = PositionStore::load(backend).unwrap();
        let (_, source) = fed(&SCENARIO, true);
        let session = ReaderSession::open("book", source, store, ReaderOptions::default()).unwrap();
        assert_eq!(session.current_status().window, left_at.window);
        assert_eq!(session.current_status().line_index, left_at.line_index);
        assert_eq!(session.current_status().column_offset, left_at.column_offset);
        assert_eq!(session.current_status().state, CursorState::Reading);
    }

    #[test]
    fn restore_waits_for_saved_line() {
        let store = memory_store();
        store.record_position(&"long".into(), 25, 2).unwrap();
        let lines: Vec<String> = (0..40).map(|i| format!("line {i}")).collect();
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        let (_feeder, source) = fed(&lines, true);

        let session = ReaderSession::open("long", source, store, ReaderOptions::default()).unwrap();
        let status = session.current_status();
        assert_eq!((status.line_index, status.column_offset), (25, 2));
        assert_eq!(status.window, "ne 25");
    }

    #[test]
    fn saved_position_past_end_starts_over() {
        let store = memory_store();
        store.record_position(&"shrunk".into(), 10, 0).unwrap();
        let (_, source) = fed(&SCENARIO, true);
        let session =
            ReaderSession::open("shrunk", source, store, ReaderOptions::default()).unwrap();
        assert_eq!(session.current_status().state, CursorState::Start);
    }

    #[test]
    fn stale_record_replaced_once_reading() {
        let store = memory_store();
        store.record_position(&"shrunk".into(), 10, 0).unwrap();
        let (_, source) = fed(&SCENARIO, true);
        let mut session =
            ReaderSession::open("shrunk", source, store.clone(), ReaderOptions::default())
                .unwrap();

        let status = session.next(false).unwrap();
        assert_eq!((status.line_index, status.column_offset), (0, 0));
        let record = store.lookup(&"shrunk".into()).unwrap();
        assert_eq!((record.line_index, record.column_offset), (0, 0));
    }

    #[test]
    fn close_writes_position_being_read() {
        let backend = MemoryBackend::default();
        let store = PositionStore::load(backend.clone()).unwrap();
        store.record_position(&"shrunk".into(), 10, 0).unwrap();
        let (_, source) = fed(&SCENARIO, true);
        let mut session =
            ReaderSession::open("shrunk", source, store.clone(), ReaderOptions::default())
                .unwrap();
        session.next(false).unwrap();
        // Put the stale record back behind the session's back
        store.record_position(&"shrunk".into(), 10, 0).unwrap();
        session.close().unwrap();

        let reloaded = PositionStore::load(backend).unwrap();
        let record = reloaded.lookup(&"shrunk".into()).unwrap();
        assert_eq!((record.line_index, record.column_offset), (0, 0));
    }

    #[test]
    fn clamped_column_saved_on_restore() {
        let store = memory_store();
        store.record_position(&"edited".into(), 1, 50).unwrap();
        let (_, source) = fed(&SCENARIO, true);
        let session =
            ReaderSession::open("edited", source, store.clone(), ReaderOptions::default())
                .unwrap();

        let status = session.current_status();
        assert_eq!((status.line_index, status.column_offset), (1, 11));
        let record = store.lookup(&"edited".into()).unwrap();
        assert_eq!((record.line_index, record.column_offset), (1, 11));
    }

    #[test]
    fn unwritable_store_does_not_block_reading() {
        let dir = tempfile::tempdir().unwrap();
        let store_dir = dir.path().join("state");
        let path = store_dir.join("positions.json");
        let store = PositionStore::load(JsonFileBackend::new(&path)).unwrap();

        let (_, source) = fed(&SCENARIO, true);
        let mut session =
            ReaderSession::open("book", source, store, ReaderOptions::default()).unwrap();
        assert!(session.take_persistence_error().is_some());

        session.next(false).unwrap();
        let status = session.next(false).unwrap();
        assert_eq!(status.window, "a test");
        assert!(session.take_persistence_error().is_some());
        assert!(session.take_persistence_error().is_none());

        std::fs::create_dir(&store_dir).unwrap();
        session.close().unwrap();

        let reloaded = PositionStore::load(JsonFileBackend::new(&path)).unwrap();
        let record = reloaded.lookup(&"book".into()).unwrap();
        assert_eq!((record.line_index, record.column_offset), (0, 20));
    }

    #[test]
    fn close_reports_persistent_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("positions.json");
        let store = PositionStore::load(JsonFileBackend::new(&path)).unwrap();
        let (_, source) = fed(&SCENARIO, true);
        let mut session =
            ReaderSession::open("book", source, store, ReaderOptions::default()).unwrap();
        session.next(false).unwrap();
        assert!(matches!(
            session.close(),
            Err(ReaderError::Persistence(_))
        ));
    }

    #[test]
    fn file_backed_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("book.txt"),
            "hello world this is a test\r\nsecond line\n",
        )
        .unwrap();
        let opener = FileOpener::new(dir.path());
        let positions = dir.path().join("positions.json");

        let store = PositionStore::load(JsonFileBackend::new(&positions)).unwrap();
        let mut session =
            ReaderSession::open("book.txt", &opener, store, ReaderOptions::default()).unwrap();
        session.next(false).unwrap();
        session.next(false).unwrap();
        assert_eq!(session.next(false).unwrap().window, "second line");
        session.close().unwrap();

        let store = PositionStore::load(JsonFileBackend::new(&positions)).unwrap();
        let session =
            ReaderSession::open("book.txt", &opener, store, ReaderOptions::default()).unwrap();
        assert_eq!(session.current_status().window, "second line");
    }
}

mod teardown {
    use super::*;
    use std::{thread, time::Duration};

    #[test]
    fn abandons_opening_a_silent_source() {
        let (feeder, source) = feed();
        let teardown = Teardown::new();
        let handle = teardown.clone();
        let firing = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            handle.fire();
        });

        let opened = ReaderSession::open_with_teardown(
            "silent",
            source,
            memory_store(),
            ReaderOptions::default(),
            teardown,
        );
        assert!(matches!(opened, Err(ReaderError::Cancelled)));
        firing.join().unwrap();
        drop(feeder);
    }

    #[test]
    fn abandons_waiting_for_restored_line() {
        let store = memory_store();
        store.record_position(&"slow".into(), 30, 0).unwrap();
        let (feeder, source) = fed(&["first", "second"], false);
        let teardown = Teardown::new();
        let handle = teardown.clone();
        let firing = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            handle.fire();
        });

        let opened = ReaderSession::open_with_teardown(
            "slow",
            source,
            store,
            ReaderOptions::default(),
            teardown,
        );
        assert!(matches!(opened, Err(ReaderError::Cancelled)));
        firing.join().unwrap();
        drop(feeder);
    }

    #[test]
    fn handed_in_handle_tears_down_after_opening() {
        let teardown = Teardown::new();
        let (_, source) = fed(&SCENARIO, true);
        let mut session = ReaderSession::open_with_teardown(
            "t",
            source,
            memory_store(),
            ReaderOptions::default(),
            teardown.clone(),
        )
        .unwrap();
        assert_eq!(session.next(false).unwrap().window, "hello world this is ");

        teardown.fire();
        assert!(matches!(session.next(false), Err(ReaderError::Cancelled)));
    }

    #[test]
    fn abandons_pending_wait() {
        let (feeder, source) = fed(&["first"], false);
        let mut session =
            ReaderSession::open("t", source, memory_store(), ReaderOptions::default()).unwrap();

        let handle = session.teardown_handle();
        let firing = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            handle.fire();
        });

        // Line 5 never arrives while the feeder is alive and silent
        assert!(matches!(
            session.goto_line(5, None),
            Err(ReaderError::Cancelled)
        ));
        firing.join().unwrap();

        assert!(matches!(session.next(false), Err(ReaderError::Cancelled)));
        assert_eq!(session.producer_state(), ProducerState::Closed);
        drop(feeder);
    }

    #[test]
    fn fired_before_navigation() {
        let mut session = open(&SCENARIO, ReaderOptions::default());
        session.teardown_handle().fire();
        session.teardown_handle().fire();
        assert!(matches!(session.prev(false), Err(ReaderError::Cancelled)));
    }
}
