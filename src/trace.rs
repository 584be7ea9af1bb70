//! Chrome trace output, enabled with `-d trace`.  Open the resulting
//! trace.json in chrome://tracing or https://ui.perfetto.dev.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Mutex;
use std::time::Instant;

static TRACE: Mutex<Option<Trace>> = Mutex::new(None);

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

    fn write_complete(
        &mut self,
        name: &str,
        tid: usize,
        start: Instant,
        end: Instant,
    ) -> std::io::Result<()> {
        writeln!(
            self.w,
            "{{\"pid\": 0, \"tid\": {}, \"name\": {:?}, \"ts\": {}, \"ph\": \"X\", \"dur\": {}}},",
            tid,
            name,
            start.duration_since(self.start).as_micros(),
            end.duration_since(start).as_micros(),
        )
    }

    fn close(&mut self) -> std::io::Result<()> {
        // The final event carries no trailing comma, keeping the array valid.
        write!(
            self.w,
            "{{\"pid\": 0, \"tid\": 0, \"name\": \"main\", \"ts\": 0, \"ph\": \"X\", \"dur\": {}}}\n]\n",
            Instant::now().duration_since(self.start).as_micros()
        )?;
        self.w.flush()
    }
}

fn with_trace(f: impl FnOnce(&mut Trace) -> std::io::Result<()>) {
    let mut guard = match TRACE.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(trace) = guard.as_mut() {
        if let Err(err) = f(trace) {
            tracing::warn!(%err, "writing trace failed");
        }
    }
}

pub fn open(path: &str) -> std::io::Result<()> {
    let trace = Trace::new(path)?;
    let mut guard = match TRACE.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    *guard = Some(trace);
    Ok(())
}

fn is_open() -> bool {
    match TRACE.lock() {
        Ok(guard) => guard.is_some(),
        Err(poisoned) => poisoned.into_inner().is_some(),
    }
}

/// Run f, recording its duration as a named event if tracing is enabled.
#[inline]
pub fn scope<T>(name: &'static str, f: impl FnOnce() -> T) -> T {
    if !is_open() {
        return f();
    }
    let start = Instant::now();
    let result = f();
    let end = Instant::now();
    with_trace(|t| t.write_complete(name, 0, start, end));
    result
}

/// Record an event that already happened, e.g. one action's run, on the
/// given fake thread track.
pub fn write_complete(name: &str, tid: usize, start: Instant, end: Instant) {
    // Track 0 is the control thread; action slots start at 1.
    with_trace(|t| t.write_complete(name, tid + 1, start, end));
}

pub fn close() {
    with_trace(|t| t.close());
    let mut guard = match TRACE.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    *guard = None;
}
