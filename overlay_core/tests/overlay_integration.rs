//! End-to-end scenarios against real renderer processes.

#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use markup_overlay_core::{Document, Position, RenderConfig, RenderState, Validator};

const SETTLE: Duration = Duration::from_secs(10);

/// A renderer that "renders" by copying the expression to the image file.
fn copy_renderer() -> RenderConfig {
    renderer("cp #input #output")
}

fn renderer(command: &str) -> RenderConfig {
    RenderConfig {
        command: command.to_string(),
        document: "#expression".to_string(),
        poll_interval_ms: 10,
        ..RenderConfig::default()
    }
}

fn validators(render: RenderConfig) -> Vec<Validator> {
    vec![
        Validator::emphasis().unwrap(),
        Validator::math(render).unwrap(),
    ]
}

/// Opens a document with the cursor parked at the end, outside every region.
fn open(text: &str, render: RenderConfig) -> Document {
    let mut doc = Document::from_str(text, validators(render));
    let end = doc.buffer().char_to_position(doc.buffer().len_chars());
    doc.set_cursor(end);
    doc
}

fn process_alive(pid: &str) -> bool {
    Command::new("kill")
        .args(["-0", pid])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn wait_for_file(path: &Path) -> String {
    let deadline = Instant::now() + SETTLE;
    while Instant::now() < deadline {
        if let Ok(content) = fs::read_to_string(path) {
            if !content.trim().is_empty() {
                return content.trim().to_string();
            }
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("{} never appeared", path.display());
}

#[test]
fn test_math_region_renders_and_reveals_on_enter() {
    let mut doc = open("a\nb\nc\n$x^2$\n", copy_renderer());
    assert!(doc.settle(SETTLE));

    let snapshot = doc.snapshot();
    let region = &snapshot[0];
    assert_eq!(region.line, 3);
    assert_eq!((region.start, region.end), (Position::new(3, 0), Position::new(3, 5)));
    assert_eq!(region.render, RenderState::Succeeded);
    assert!(region.image_shown);

    let images = doc.buffer().images();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].0, Position::new(3, 0));
    assert_eq!(images[0].1.bytes(), b"x^2");
    assert_eq!(doc.buffer().visible_line(3).unwrap(), "");

    // Entering reveals the raw text and drops the image
    doc.set_cursor(Position::new(3, 2));
    doc.pump();
    assert!(doc.buffer().images().is_empty());
    assert_eq!(doc.buffer().visible_line(3).unwrap(), "$x^2$");
    assert!(doc.snapshot()[0].active);

    // Leaving renders again
    doc.set_cursor(Position::new(0, 0));
    doc.pump();
    assert_eq!(doc.snapshot()[0].render, RenderState::Running);
    assert!(doc.settle(SETTLE));
    assert_eq!(doc.buffer().images().len(), 1);
    assert_eq!(doc.validation().stats().renders.succeeded, 2);
}

#[test]
fn test_editing_math_renders_new_expression() {
    let mut doc = open("$x$ and '''y'''\n", copy_renderer());
    assert!(doc.settle(SETTLE));

    // Typed while the cursor is elsewhere
    doc.insert(2, "+1");
    assert!(doc.settle(SETTLE));

    let snapshot = doc.snapshot();
    let math = snapshot.iter().find(|r| r.validator == "math").unwrap();
    assert_eq!(math.text, "$x+1$");
    assert_eq!(doc.buffer().images()[0].1.bytes(), b"x+1");
    assert_eq!(doc.buffer().visible_line(0).unwrap(), " and y");
}

#[test]
fn test_failed_render_leaves_text_hidden() {
    let mut doc = open("$x$\n", renderer("exit 2"));
    assert!(doc.settle(SETTLE));

    let snapshot = doc.snapshot();
    let region = &snapshot[0];
    assert_eq!(region.render, RenderState::Failed);
    assert!(doc.buffer().images().is_empty());
    assert_eq!(doc.buffer().visible_line(0).unwrap(), "");

    // Still editable by entering it
    doc.set_cursor(Position::new(0, 1));
    doc.pump();
    assert_eq!(doc.buffer().visible_line(0).unwrap(), "$x$");
}

#[test]
fn test_entering_kills_pending_render() {
    let mut doc = open("$x$\n", renderer("sleep 30"));
    doc.pump();
    assert_eq!(doc.validation().running_renders(), 1);

    doc.set_cursor(Position::new(0, 1));
    doc.pump();
    assert_eq!(doc.validation().running_renders(), 0);
    assert_eq!(doc.snapshot()[0].render, RenderState::Idle);
    assert!(doc.validation().next_deadline().is_none());
}

#[test]
fn test_breaking_match_kills_render() {
    let mut doc = open("$x$\n", renderer("sleep 30"));
    doc.pump();
    assert_eq!(doc.validation().running_renders(), 1);

    doc.delete(2, 3);
    assert!(doc.settle(SETTLE));
    assert!(doc.snapshot().is_empty());
    assert_eq!(doc.validation().running_renders(), 0);
    assert_eq!(doc.validation().stats().renders.killed, 1);
}

#[test]
fn test_save_is_pure() {
    let dir = tempfile::tempdir().unwrap();
    let text = "intro $e^{i\\pi}$ '''done'''\n";

    let mut rendered = open(text, copy_renderer());
    assert!(rendered.settle(SETTLE));
    assert_eq!(rendered.buffer().images().len(), 1);

    let plain_config = RenderConfig {
        enabled: false,
        ..copy_renderer()
    };
    let mut plain = open(text, plain_config);
    assert!(plain.settle(SETTLE));
    assert!(plain.buffer().images().is_empty());

    let rendered_path = dir.path().join("rendered.txt");
    let plain_path = dir.path().join("plain.txt");
    rendered.save_as(&rendered_path).unwrap();
    plain.save_as(&plain_path).unwrap();

    let saved = fs::read(&rendered_path).unwrap();
    assert_eq!(saved, fs::read(&plain_path).unwrap());
    assert_eq!(saved, text.as_bytes());

    // The image is back exactly as before
    let images = rendered.buffer().images();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].1.bytes(), b"e^{i\\pi}");
    assert!(rendered.snapshot().iter().all(|r| r.validator != "math" || r.image_shown));
}

#[test]
fn test_dropping_document_kills_renderers() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let command = format!("echo $$ > '{}'; sleep 30", pid_file.display());

    let mut doc = open("$x$\n", renderer(&command));
    doc.pump();
    let pid = wait_for_file(&pid_file);
    assert!(process_alive(&pid));

    drop(doc);
    assert!(!process_alive(&pid));
}

#[test]
fn test_restart_replaces_running_render() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let command = format!("echo $$ >> '{}'; sleep 30", pid_file.display());

    let mut doc = open("$x$\n", renderer(&command));
    doc.pump();
    let first = wait_for_file(&pid_file);

    // Enter and leave: the first job dies before the second starts
    doc.set_cursor(Position::new(0, 1));
    doc.pump();
    doc.set_cursor(Position::new(0, 3));
    doc.pump();

    assert!(!process_alive(&first));
    assert_eq!(doc.validation().running_renders(), 1);
    let stats = doc.validation().stats().renders;
    assert_eq!(stats.started, 2);
    assert_eq!(stats.killed, 1);
}

#[test]
fn test_config_driven_document() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join(".markup-overlay.toml");
    fs::write(
        &config_path,
        r##"
[validators]
meta = false
emphasis = false
strong = false

[[validators.custom]]
name = "code"
pattern = "`([^`]+)`"
visible_groups = [1]

[render]
command = "cp #input #output"
document = "#expression"
poll_interval_ms = 10
"##,
    )
    .unwrap();

    let config = markup_overlay_core::load_config(&config_path).unwrap();
    let mut doc = Document::from_str("`code` $m$\n", config.build_validators().unwrap());
    doc.set_cursor(Position::new(1, 0));
    assert!(doc.settle(SETTLE));

    let names: Vec<String> = doc.snapshot().into_iter().map(|r| r.validator).collect();
    assert_eq!(names, vec!["code", "math"]);
    assert_eq!(doc.buffer().visible_line(0).unwrap(), "code ");
}
