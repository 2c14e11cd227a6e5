use crate::support::{builder, inputs, workspace, write, DEBOUNCE};
use kiln_build::{InputElement, Options};
use kiln_watch::{ManualFileWatcher, WatchEvent, WatchSession};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn backend_errors_do_not_end_the_session() {
    let ws = workspace();
    let (builder, compiles) = builder();
    let backend = ManualFileWatcher::new();
    let handle = backend.handle();
    let src = ws.path().join("src");

    let watcher = WatchSession::new(
        builder,
        inputs(ws.path(), vec![InputElement::Directory(src.clone())]),
        Options::default(),
    )
    .debounce(DEBOUNCE)
    .start(backend, |_| {})
    .unwrap();
    compiles.next();

    handle
        .push_error(io::Error::other("inotify watch limit reached"))
        .unwrap();
    compiles.assert_quiet();

    handle.push(WatchEvent::changed(src.join("Main.scala"))).unwrap();
    compiles.next();
    watcher.dispose();
}

#[test]
fn panicking_result_handler_does_not_end_the_session() {
    let ws = workspace();
    let (builder, compiles) = builder();
    let backend = ManualFileWatcher::new();
    let handle = backend.handle();
    let src = ws.path().join("src");
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);

    let watcher = WatchSession::new(
        builder,
        inputs(ws.path(), vec![InputElement::Directory(src.clone())]),
        Options::default(),
    )
    .debounce(DEBOUNCE)
    .start(backend, move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
        panic!("result handler blew up");
    })
    .unwrap();
    compiles.next();

    handle.push(WatchEvent::changed(src.join("Main.scala"))).unwrap();
    compiles.next();
    handle.push(WatchEvent::changed(src.join("Main.scala"))).unwrap();
    compiles.next();
    watcher.dispose();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn build_errors_are_logged_and_watching_continues() {
    let ws = workspace();
    let (builder, compiles) = builder();
    let backend = ManualFileWatcher::new();
    let handle = backend.handle();
    let src = ws.path().join("src");
    let iterations = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&iterations);
    let (iter_tx, iter_rx) = crossbeam_channel::unbounded();

    // A malformed directive fails the build before anything is compiled.
    write(&src.join("broken.sc"), "//> using dep nonsense\n");

    let watcher = WatchSession::new(
        builder,
        inputs(ws.path(), vec![InputElement::Directory(src.clone())]),
        Options::default(),
    )
    .debounce(DEBOUNCE)
    .on_iteration(move || {
        seen.fetch_add(1, Ordering::SeqCst);
        let _ = iter_tx.send(());
    })
    .start(backend, |_| {})
    .unwrap();
    assert_eq!(iterations.load(Ordering::SeqCst), 1);
    compiles.assert_quiet();

    std::fs::remove_file(src.join("broken.sc")).unwrap();
    handle.push(WatchEvent::changed(src.join("broken.sc"))).unwrap();
    compiles.next();
    iter_rx.recv_timeout(crate::support::TIMEOUT).unwrap();
    iter_rx.recv_timeout(crate::support::TIMEOUT).unwrap();
    watcher.dispose();
}
