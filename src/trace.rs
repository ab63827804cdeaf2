//! Chrome trace output.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Mutex;
use std::time::Instant;

static TRACE: Mutex<Option<Trace>> = Mutex::new(None);

enum EventType {
    Complete(Instant),
    Counter(usize),
}

struct Event<'a> {
    name: &'a str,
    tid: usize,
    timestamp: Instant,
    event_type: EventType,
}

struct Trace {
    start: Instant,
    w: BufWriter<File>,
}

impl Trace {
    fn new(path: &str) -> std::io::Result<Self> {
        let mut w = BufWriter::new(File::create(path)?);
        writeln!(w, "[")?;
        Ok(Trace {
            start: Instant::now(),
            w,
        })
    }

    fn write_event(&mut self, event: Event) -> std::io::Result<()> {
        write!(
            self.w,
            "{{ \"pid\": 0, \"tid\": {}, \"name\": {:?}, \"ts\": {}, ",
            event.tid,
            event.name,
            event.timestamp.duration_since(self.start).as_micros(),
        )?;
        match event.event_type {
            EventType::Complete(end) => write!(
                self.w,
                "\"ph\": \"X\", \"dur\": {} }}",
                end.duration_since(event.timestamp).as_micros()
            ),
            EventType::Counter(value) => write!(
                self.w,
                "\"ph\": \"C\", \"args\": {{ \"len\": {} }} }}",
                value
            ),
        }
    }

    fn write(&mut self, event: Event) -> std::io::Result<()> {
        self.write_event(event)?;
        writeln!(self.w, ",")
    }

    fn close(&mut self) -> std::io::Result<()> {
        self.write_event(Event {
            name: "main",
            tid: 0,
            timestamp: self.start,
            event_type: EventType::Complete(Instant::now()),
        })?;
        writeln!(self.w, "]")?;
        self.w.flush()
    }
}

fn with_trace(f: impl FnOnce(&mut Trace) -> std::io::Result<()>) {
    let mut guard = match TRACE.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(t) = guard.as_mut() {
        // A trace is a debugging aid; losing events shouldn't fail the build.
        let _ = f(t);
    }
}

fn enabled() -> bool {
    with_lock(|t| t.is_some())
}

fn with_lock<T>(f: impl FnOnce(&Option<Trace>) -> T) -> T {
    match TRACE.lock() {
        Ok(guard) => f(&*guard),
        Err(poisoned) => f(&*poisoned.into_inner()),
    }
}

pub fn open(path: &str) -> std::io::Result<()> {
    let trace = Trace::new(path)?;
    match TRACE.lock() {
        Ok(mut guard) => *guard = Some(trace),
        Err(poisoned) => *poisoned.into_inner() = Some(trace),
    }
    Ok(())
}

/// Time `f` as a named span on the main track.
#[inline]
pub fn scope<T>(name: &'static str, f: impl FnOnce() -> T) -> T {
    if !enabled() {
        return f();
    }
    let start = Instant::now();
    let result = f();
    let end = Instant::now();
    with_trace(|t| {
        t.write(Event {
            name,
            tid: 0,
            timestamp: start,
            event_type: EventType::Complete(end),
        })
    });
    result
}

/// Record a finished job on its own track.
pub fn task(name: &str, tid: usize, span: (Instant, Instant)) {
    with_trace(|t| {
        t.write(Event {
            name,
            tid: tid + 1,
            timestamp: span.0,
            event_type: EventType::Complete(span.1),
        })
    });
}

/// Sample a length, e.g. of the fringe.
pub fn counter(name: &'static str, value: usize) {
    with_trace(|t| {
        t.write(Event {
            name,
            tid: 0,
            timestamp: Instant::now(),
            event_type: EventType::Counter(value),
        })
    });
}

pub fn close() -> std::io::Result<()> {
    let mut result = Ok(());
    with_trace(|t| {
        result = t.close();
        Ok(())
    });
    result
}
