//! End-to-end bridge scenarios: a real worker thread on one side, a
//! blocking caller on the other.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use sync_bridge::{
    Bridge, BridgeConfig, BridgeError, CallMessage, OpError, SharedBuffer, ThreadWorker, Value,
    WorkerSource, WorkerTransport,
};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn add_one_after_delay(args: Vec<Value>) -> Result<Value, OpError> {
    thread::sleep(Duration::from_millis(50));
    let n = args[0].as_i64().ok_or_else(|| OpError::new("expected an integer"))?;
    Ok(Value::Int(n + 1))
}

#[test]
fn call_returns_worker_result() {
    init_logs();
    let bridge = Bridge::new(WorkerSource::operation(add_one_after_delay));

    assert_eq!(bridge.call(vec![Value::Int(1)]).unwrap(), Value::Int(2));
    bridge.dispose();
}

#[test]
fn call_blocks_until_worker_replies() {
    let bridge = Bridge::new(WorkerSource::operation(add_one_after_delay));

    let start = Instant::now();
    let result = bridge.call(vec![Value::Int(7)]).unwrap();
    let elapsed = start.elapsed();

    assert_eq!(result, Value::Int(8));
    assert!(
        elapsed >= Duration::from_millis(50),
        "returned after {elapsed:?}, before the worker could have replied"
    );
}

#[test]
fn worker_failure_is_reraised_with_same_message() {
    let bridge = Bridge::new(WorkerSource::operation(|args: Vec<Value>| {
        if args[0].as_str() == Some("test") {
            return Err(OpError::new("boom"));
        }
        Ok(Value::Null)
    }));

    let err = bridge.call(vec![Value::text("test")]).unwrap_err();
    match err {
        BridgeError::Operation(op) => {
            assert_eq!(op.name, "Error");
            assert!(op.message.contains("boom"));
        }
        other => panic!("expected operation failure, got {other}"),
    }
}

#[test]
fn failure_trace_survives_the_wire() {
    let bridge = Bridge::new(WorkerSource::operation(|_args| {
        Err(OpError {
            name: "RangeError".to_string(),
            message: "out of range".to_string(),
            trace: Some("at compute (worker:12)".to_string()),
        })
    }));

    match bridge.call(vec![]).unwrap_err() {
        BridgeError::Operation(op) => {
            assert_eq!(op.name, "RangeError");
            assert_eq!(op.trace.as_deref(), Some("at compute (worker:12)"));
        }
        other => panic!("expected operation failure, got {other}"),
    }
}

#[test]
fn complex_nested_data_round_trips_through_a_call() {
    init_logs();
    // Doubles every number, uppercases nested.value, adds processed:true
    let bridge = Bridge::new(WorkerSource::operation(|args: Vec<Value>| {
        let input = args[0]
            .as_map()
            .ok_or_else(|| OpError::new("expected a map"))?;

        let numbers: Vec<Value> = input
            .get("numbers")
            .and_then(Value::as_list)
            .unwrap_or(&[])
            .iter()
            .map(|v| Value::Int(v.as_i64().unwrap_or(0) * 2))
            .collect();

        let nested_value = input
            .get("nested")
            .and_then(Value::as_map)
            .and_then(|m| m.get("value"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_uppercase();

        let mut nested = BTreeMap::new();
        nested.insert("value".to_string(), Value::text(nested_value));

        let mut out = BTreeMap::new();
        out.insert("numbers".to_string(), Value::List(numbers));
        out.insert("nested".to_string(), Value::Map(nested));
        out.insert("processed".to_string(), Value::Bool(true));
        Ok(Value::Map(out))
    }));

    let mut nested = BTreeMap::new();
    nested.insert("value".to_string(), Value::text("test"));
    let mut input = BTreeMap::new();
    input.insert(
        "numbers".to_string(),
        Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
    );
    input.insert("nested".to_string(), Value::Map(nested));

    let result = bridge.call(vec![Value::Map(input)]).unwrap();
    let out = result.as_map().unwrap();

    assert_eq!(
        out.get("numbers").unwrap().as_list().unwrap(),
        &[Value::Int(2), Value::Int(4), Value::Int(6)]
    );
    assert_eq!(
        out.get("nested").unwrap().as_map().unwrap().get("value"),
        Some(&Value::text("TEST"))
    );
    assert_eq!(out.get("processed"), Some(&Value::Bool(true)));
}

#[test]
fn oversized_reply_fails_with_overflow() {
    let source = WorkerSource::operation(|_args| Ok(Value::text("x".repeat(1000))));
    let bridge = Bridge::with_config(
        source,
        BridgeConfig {
            buffer_size: 16,
            call_timeout: None,
        },
    )
    .unwrap();

    match bridge.call(vec![]).unwrap_err() {
        BridgeError::Overflow { needed, capacity } => {
            assert_eq!(capacity, 16);
            // 1000 chars plus the surrounding JSON quotes
            assert_eq!(needed, 1002);
        }
        other => panic!("expected overflow, got {other}"),
    }
}

#[test]
fn sequential_calls_do_not_bleed_into_each_other() {
    let bridge = Bridge::new(WorkerSource::operation(|args: Vec<Value>| {
        Ok(Value::Int(args[0].as_i64().unwrap() * 10))
    }));

    assert_eq!(bridge.call(vec![Value::Int(3)]).unwrap(), Value::Int(30));
    assert_eq!(bridge.call(vec![Value::Int(4)]).unwrap(), Value::Int(40));
}

#[test]
fn disposed_bridge_rejects_further_calls() {
    let bridge = Bridge::new(WorkerSource::operation(|_args| Ok(Value::Null)));

    assert_eq!(bridge.call(vec![]).unwrap(), Value::Null);
    bridge.dispose();
    assert!(bridge.is_disposed());

    assert!(matches!(bridge.call(vec![]), Err(BridgeError::Disposed)));
    // Disposal is idempotent
    bridge.dispose();
}

#[test]
fn custom_buffer_size_works() {
    let source = WorkerSource::operation(|args: Vec<Value>| {
        Ok(Value::Int(args[0].as_i64().unwrap() * 2))
    });
    let bridge = Bridge::with_config(
        source,
        BridgeConfig {
            buffer_size: 128 * 1024,
            call_timeout: None,
        },
    )
    .unwrap();

    assert_eq!(bridge.call(vec![Value::Int(7)]).unwrap(), Value::Int(14));
}

#[test]
fn bounded_wait_times_out_on_a_stalled_worker() {
    let source = WorkerSource::operation(|_args| {
        thread::sleep(Duration::from_millis(500));
        Ok(Value::Null)
    });
    let bridge = Bridge::with_config(
        source,
        BridgeConfig {
            buffer_size: 1024,
            call_timeout: Some(Duration::from_millis(50)),
        },
    )
    .unwrap();

    let start = Instant::now();
    let err = bridge.call(vec![]).unwrap_err();
    assert!(matches!(err, BridgeError::TimedOut { .. }));
    assert!(start.elapsed() < Duration::from_millis(400));
}

#[test]
fn prebuilt_worker_handle_can_back_a_bridge() {
    let worker = ThreadWorker::spawn(|args: Vec<Value>| {
        Ok(Value::Int(args[0].as_i64().unwrap() + 100))
    });
    let bridge = Bridge::new(WorkerSource::handle(worker));

    assert_eq!(bridge.call(vec![Value::Int(1)]).unwrap(), Value::Int(101));
}

#[test]
fn special_values_cross_the_bridge_intact() {
    let bridge = Bridge::new(WorkerSource::operation(|args: Vec<Value>| {
        // Echo, so the caller can check decode(encode(v)) end to end
        Ok(args.into_iter().next().unwrap_or(Value::Null))
    }));

    let echoed = bridge.call(vec![Value::Undefined]).unwrap();
    assert_eq!(echoed, Value::Undefined);

    let pattern = Value::Pattern {
        source: "a+".to_string(),
        flags: "gi".to_string(),
    };
    assert_eq!(bridge.call(vec![pattern.clone()]).unwrap(), pattern);

    let func = Value::FunctionRef {
        name: "callback".to_string(),
    };
    let placeholder = bridge.call(vec![func]).unwrap();
    let err = placeholder.invoke(vec![]).unwrap_err();
    assert!(err.message.contains("callback"));
}

#[test]
fn independent_bridges_run_in_parallel() {
    let slow = |_: Vec<Value>| {
        thread::sleep(Duration::from_millis(100));
        Ok(Value::Int(1))
    };
    let a = Arc::new(Bridge::new(WorkerSource::operation(slow)));
    let b = Arc::new(Bridge::new(WorkerSource::operation(slow)));

    let start = Instant::now();
    let ta = {
        let a = Arc::clone(&a);
        thread::spawn(move || a.call(vec![]).unwrap())
    };
    let tb = {
        let b = Arc::clone(&b);
        thread::spawn(move || b.call(vec![]).unwrap())
    };
    assert_eq!(ta.join().unwrap(), Value::Int(1));
    assert_eq!(tb.join().unwrap(), Value::Int(1));

    // Two 100ms workers overlapping, not queueing behind one another
    assert!(start.elapsed() < Duration::from_millis(190));
}

/// Transport double that never signals, for exercising the liveness path
/// without a real stalled worker.
struct SilentTransport;

impl WorkerTransport for SilentTransport {
    fn post(&self, _msg: CallMessage) -> Result<(), BridgeError> {
        Ok(())
    }
    fn terminate(&self) {}
}

#[test]
fn silent_worker_trips_the_timeout_not_a_hang() {
    let bridge = Bridge::with_config(
        WorkerSource::handle(SilentTransport),
        BridgeConfig {
            buffer_size: 64,
            call_timeout: Some(Duration::from_millis(30)),
        },
    )
    .unwrap();

    assert!(matches!(
        bridge.call(vec![Value::Int(1)]),
        Err(BridgeError::TimedOut { .. })
    ));
}

#[test]
fn messages_queue_behind_an_executing_call() {
    // Two callers share one worker through separate posts; the responder
    // services them strictly in arrival order.
    let worker = Arc::new(ThreadWorker::spawn(|args: Vec<Value>| {
        thread::sleep(Duration::from_millis(30));
        Ok(args.into_iter().next().unwrap())
    }));

    let first = Arc::new(SharedBuffer::new(64).unwrap());
    let second = Arc::new(SharedBuffer::new(64).unwrap());

    worker
        .post(CallMessage {
            args: vec![Value::Int(1)],
            buffer: Arc::clone(&first),
        })
        .unwrap();
    worker
        .post(CallMessage {
            args: vec![Value::Int(2)],
            buffer: Arc::clone(&second),
        })
        .unwrap();

    // The second completion implies the first already published
    second.wait(None).unwrap();
    assert_ne!(first.status(), sync_bridge::STATUS_PENDING);
}
