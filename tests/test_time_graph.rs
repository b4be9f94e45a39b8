use std::collections::HashMap;
use std::sync::Arc;

use tracelens::capture::data::CaptureData;
use tracelens::capture::ProcessData;
use tracelens::domain::{CallstackId, Tid, TimelineHash};
use tracelens::events::{Callstack, CallstackEvent, EventBuffer};
use tracelens::strings::StringManager;
use tracelens::timeline::{JumpDirection, JumpScope, TimeGraph, Timer, TimerType, TrackKind};

fn new_graph() -> (Arc<TimeGraph>, Arc<StringManager>, Arc<EventBuffer>) {
    let strings = Arc::new(StringManager::new());
    let events = Arc::new(EventBuffer::new());
    let graph = Arc::new(TimeGraph::new(Arc::clone(&strings), Arc::clone(&events)));
    (graph, strings, events)
}

fn thread_timer(tid: i32, start: u64, end: u64, address: u64) -> Timer {
    Timer {
        start_tick: start,
        end_tick: end,
        tid: Tid(tid),
        processor: 0,
        depth: 0,
        function_address: address,
        timer_type: TimerType::Other,
        user_data: [0, 0],
    }
}

#[test]
fn test_window_clamps_by_shifting_not_shrinking() {
    let (graph, _, _) = new_graph();
    // 10,000 us of capture: ticks are nanoseconds.
    graph.process_timer(&thread_timer(1, 1_000_000, 11_000_000, 0));
    assert!((graph.capture_time_span_us() - 10_000.0).abs() < 1e-9);

    // Requests below zero shift up, keeping the requested width.
    graph.set_min_max(-500.0, 400.0);
    assert!((graph.min_time_us() - 0.0).abs() < 1e-9);
    assert!((graph.max_time_us() - 900.0).abs() < 1e-9);

    // Requests past the span shift down, keeping the requested width.
    graph.set_min_max(9_800.0, 10_900.0);
    assert!((graph.min_time_us() - 8_900.0).abs() < 1e-9);
    assert!((graph.max_time_us() - 10_000.0).abs() < 1e-9);

    // A width larger than the capture clamps to the full span.
    graph.set_min_max(-1_000.0, 20_000.0);
    assert!((graph.min_time_us() - 0.0).abs() < 1e-9);
    assert!((graph.max_time_us() - 10_000.0).abs() < 1e-9);
}

#[test]
fn test_zoom_time_keeps_cursor_fixed() {
    let (graph, _, _) = new_graph();
    graph.process_timer(&thread_timer(1, 1_000_000, 11_000_000, 0));
    graph.set_min_max(0.0, 1_000.0);

    // Zoom in around 30% of the window: distances to both edges shrink
    // by 10%, the time under the cursor stays put.
    graph.zoom_time(-1.0, 0.3);
    assert!((graph.min_time_us() - 30.0).abs() < 1e-9);
    assert!((graph.max_time_us() - 930.0).abs() < 1e-9);

    // Zoom back out around the same point.
    graph.zoom_time(1.0, 0.3);
    assert!(graph.min_time_us() < 30.0);
    assert!(graph.max_time_us() > 930.0);
}

#[test]
fn test_zoom_below_minimum_window_is_a_no_op() {
    let (graph, _, _) = new_graph();
    graph.process_timer(&thread_timer(1, 1_000, 1_002_000, 0));
    graph.set_min_max(0.0, 0.0011);
    let min = graph.min_time_us();
    let max = graph.max_time_us();

    // Zooming in would fall below the 1 ns floor.
    graph.zoom_time(-1.0, 0.5);
    assert!((graph.min_time_us() - min).abs() < 1e-12);
    assert!((graph.max_time_us() - max).abs() < 1e-12);
}

#[test]
fn test_sort_order_is_deterministic() {
    let (graph, strings, events) = new_graph();

    // Scheduler slice on core 2.
    graph.process_timer(&Timer {
        start_tick: 100,
        end_tick: 200,
        tid: Tid(0),
        processor: 2,
        depth: 0,
        function_address: 0,
        timer_type: TimerType::CoreActivity,
        user_data: [0, 0],
    });
    // One GPU track.
    strings.add_if_not_present(77, "gfx_queue".to_string());
    graph.process_timer(&Timer {
        start_tick: 100,
        end_tick: 300,
        tid: Tid(0),
        processor: 0,
        depth: 0,
        function_address: 0,
        timer_type: TimerType::GpuActivity,
        user_data: [0, 77],
    });
    // Thread 6 arrives first but has fewer instrumented calls than 5.
    graph.process_timer(&thread_timer(6, 100, 150, 0xa));
    for start in [200, 300, 400] {
        graph.process_timer(&thread_timer(5, start, start + 50, 0xa));
    }
    // Thread 7 has no instrumented calls, only samples and a raw timer.
    graph.process_timer(&thread_timer(7, 100, 120, 0));
    events.add_event(CallstackEvent { time_tick: 110, tid: Tid(7), callstack_id: CallstackId(1) });

    graph.sort_tracks();
    let order: Vec<TrackKind> = graph.sorted_tracks().iter().map(|t| t.kind()).collect();
    assert_eq!(
        order,
        vec![
            TrackKind::Scheduler,
            TrackKind::Gpu(TimelineHash(77)),
            TrackKind::Thread(Tid(5)),
            TrackKind::Thread(Tid(6)),
            TrackKind::Thread(Tid(7)),
        ]
    );
    // The empty process track is dropped from the view.
    assert!(!order.contains(&TrackKind::Process));
    assert_eq!(graph.num_cores(), 1);
}

#[test]
fn test_concurrent_track_creation_yields_one_instance() {
    let (graph, _, _) = new_graph();
    let tracks: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let graph = Arc::clone(&graph);
                scope.spawn(move || graph.get_or_create_thread_track(Tid(42)))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    // Every caller observed the same instance.
    for track in &tracks[1..] {
        assert!(Arc::ptr_eq(&tracks[0], track));
    }
    let registered = graph
        .all_tracks()
        .into_iter()
        .filter(|t| t.kind() == TrackKind::Thread(Tid(42)))
        .count();
    assert_eq!(registered, 1);
}

#[test]
fn test_thread_filter_tokens_are_or_combined() {
    let (graph, _, _) = new_graph();
    graph.process_timer(&thread_timer(1, 100, 200, 0xa));
    graph.process_timer(&thread_timer(2, 100, 200, 0xa));
    graph.process_timer(&thread_timer(3, 100, 200, 0xa));
    graph.thread_track(Tid(1)).unwrap().set_name("render");
    graph.thread_track(Tid(2)).unwrap().set_name("audio");
    graph.thread_track(Tid(3)).unwrap().set_name("io");

    graph.set_thread_filter("render io");
    graph.sort_tracks();
    let order: Vec<TrackKind> = graph.sorted_tracks().iter().map(|t| t.kind()).collect();
    assert!(order.contains(&TrackKind::Thread(Tid(1))));
    assert!(!order.contains(&TrackKind::Thread(Tid(2))));
    assert!(order.contains(&TrackKind::Thread(Tid(3))));
}

#[test]
fn test_select_events_ignores_drag_direction() {
    let (graph, _, events) = new_graph();
    graph.process_timer(&thread_timer(1, 1_000, 2_000, 0));
    events.add_event(CallstackEvent { time_tick: 1_500, tid: Tid(1), callstack_id: CallstackId(1) });
    events.add_event(CallstackEvent { time_tick: 1_600, tid: Tid(2), callstack_id: CallstackId(1) });

    let mut capture_data =
        CaptureData::new(ProcessData::default(), HashMap::new(), HashMap::new(), HashMap::new());
    capture_data.add_unique_callstack(CallstackId(1), Callstack { addresses: vec![0xa, 0xb] });

    graph.set_min_max(0.0, 1.0);
    graph.set_world(0.0, 1_000.0);

    let forward = graph.select_events(0.0, 1_000.0, Tid::ALL, &capture_data);
    assert_eq!(forward.len(), 2);
    let backward = graph.select_events(1_000.0, 0.0, Tid::ALL, &capture_data);
    assert_eq!(forward, backward);

    // Per-thread buckets plus the all-threads bucket.
    assert_eq!(graph.selected_callstack_events(Tid(1)).len(), 1);
    assert_eq!(graph.selected_callstack_events(Tid(2)).len(), 1);
    assert_eq!(graph.selected_callstack_events(Tid::ALL).len(), 2);

    // All-threads selection produces a summary.
    let report = graph.selection_report().expect("selection has samples");
    assert!(report.summary.is_some());
    assert_eq!(report.num_samples(), 2);

    // A single-thread selection does not, and it leaves the all-threads
    // bucket empty rather than posing as a whole-process selection.
    let single = graph.select_events(0.0, 1_000.0, Tid(1), &capture_data);
    assert_eq!(single.len(), 1);
    assert_eq!(graph.selected_callstack_events(Tid(1)).len(), 1);
    assert!(graph.selected_callstack_events(Tid::ALL).is_empty());
    let report = graph.selection_report().expect("selection has samples");
    assert!(report.summary.is_none());
}

#[test]
fn test_same_function_jump_picks_closest_end_across_threads() {
    let (graph, _, _) = new_graph();
    let origin = thread_timer(1, 100, 200, 0xa);
    graph.process_timer(&origin);
    graph.process_timer(&thread_timer(2, 150, 250, 0xa));
    graph.process_timer(&thread_timer(1, 400, 500, 0xa));
    graph.process_timer(&thread_timer(2, 600, 700, 0xa));
    // Same thread, different function: never a SameFunction candidate.
    graph.process_timer(&thread_timer(1, 210, 220, 0xb));

    let next = graph.jump_to_neighbor(&origin, JumpDirection::Next, JumpScope::SameFunction);
    assert_eq!(next.unwrap().end_tick, 250);

    let from_last = thread_timer(2, 600, 700, 0xa);
    let previous =
        graph.jump_to_neighbor(&from_last, JumpDirection::Previous, JumpScope::SameFunction);
    assert_eq!(previous.unwrap().end_tick, 500);

    // No further call of this function: end of the line.
    assert!(graph
        .jump_to_neighbor(&from_last, JumpDirection::Next, JumpScope::SameFunction)
        .is_none());
}

#[test]
fn test_same_thread_jump_walks_the_track() {
    let (graph, _, _) = new_graph();
    let first = thread_timer(1, 100, 200, 0xa);
    let second = thread_timer(1, 300, 400, 0xb);
    graph.process_timer(&first);
    graph.process_timer(&second);
    // Nested child under the second timer.
    let child = Timer { depth: 1, ..thread_timer(1, 320, 380, 0xc) };
    graph.process_timer(&child);

    let next = graph.jump_to_neighbor(&first, JumpDirection::Next, JumpScope::SameThread);
    assert_eq!(next.unwrap().function_address, 0xb);
    let previous = graph.jump_to_neighbor(&second, JumpDirection::Previous, JumpScope::SameThread);
    assert_eq!(previous.unwrap().function_address, 0xa);

    let down = graph.jump_to_neighbor(&second, JumpDirection::Down, JumpScope::SameThread);
    assert_eq!(down.unwrap().function_address, 0xc);
    let up = graph.jump_to_neighbor(&child, JumpDirection::Top, JumpScope::SameThread);
    assert_eq!(up.unwrap().function_address, 0xb);
}

#[test]
fn test_move_into_view_centers_offscreen_timer() {
    let (graph, _, _) = new_graph();
    graph.process_timer(&thread_timer(1, 1_000, 10_001_000, 0));
    graph.set_min_max(0.0, 100.0);

    // Timer at 5,000-5,010 us, far to the right of the window.
    let far = thread_timer(1, 5_001_000, 5_011_000, 0);
    assert!(!graph.is_visible(&far));
    graph.horizontally_move_into_view(&far, 0.5);
    assert!(graph.is_visible(&far));
    let mid = (graph.min_time_us() + graph.max_time_us()) / 2.0;
    assert!((mid - 5_005.0).abs() < 1.0);

    // Already visible: nothing moves.
    let min = graph.min_time_us();
    graph.horizontally_move_into_view(&far, 0.5);
    assert!((graph.min_time_us() - min).abs() < 1e-9);
}
