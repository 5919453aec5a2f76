// tests/tracing_sink.rs

use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry::Registry;

use sysmaint::exec::{OutputSink, OutputStream, TracingSink};

#[derive(Debug, Clone, PartialEq, Eq)]
struct CapturedEvent {
    level: Level,
    target: String,
    fields: Vec<String>,
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<CapturedEvent>>>);

struct FieldVisitor<'a>(&'a mut Vec<String>);

impl Visit for FieldVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.push(format!("{}={value:?}", field.name()));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.push(format!("{}={value}", field.name()));
    }
}

impl<S: Subscriber> Layer<S> for Captured {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = Vec::new();
        event.record(&mut FieldVisitor(&mut fields));
        fields.sort();
        let meta = event.metadata();
        self.0.lock().unwrap().push(CapturedEvent {
            level: *meta.level(),
            target: meta.target().to_string(),
            fields,
        });
    }
}

fn capture(f: impl FnOnce()) -> Vec<CapturedEvent> {
    let captured = Captured::default();
    let subscriber = Registry::default().with(captured.clone());
    tracing::subscriber::with_default(subscriber, f);
    captured.0.lock().unwrap().clone()
}

#[test]
fn stdout_logs_at_info_and_stderr_at_warn() {
    let events = capture(|| {
        let sink = TracingSink;
        sink.emit(OutputStream::Stdout, "Update Snap packages", "All snaps up to date.");
        sink.emit(OutputStream::Stderr, "Update Snap packages", "error: cannot refresh");
    });

    let levels: Vec<Level> = events.iter().map(|e| e.level).collect();
    assert_eq!(levels, vec![Level::INFO, Level::WARN]);
    assert!(events.iter().all(|e| e.target == "sysmaint::output"));
}

#[test]
fn every_line_names_the_command_that_produced_it() {
    let events = capture(|| {
        TracingSink.emit(OutputStream::Stdout, "Update Snap packages", "ok");
        TracingSink.emit(OutputStream::Stderr, "Clean Flatpak unused data", "nothing to do");
    });

    assert_eq!(
        events[0].fields,
        vec![
            "command=Update Snap packages".to_string(),
            "message=ok".to_string()
        ]
    );
    assert_eq!(
        events[1].fields,
        vec![
            "command=Clean Flatpak unused data".to_string(),
            "message=nothing to do".to_string()
        ]
    );
}
