//! Listen on a private command pipe and print every event that reaches the bus.
//!
//! Run with: cargo run --example bus_monitor -- /tmp/bus-monitor.pipe
//!
//! Then, from another terminal:
//! `echo touchpad_toggle > /tmp/bus-monitor.pipe`

use palm_reject::{CommandReceiver, EventBus};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/tmp/bus-monitor.pipe".to_string());

    println!("palm-reject bus monitor");
    println!("Write commands to {path}");
    println!("Press Ctrl+C to exit\n");

    let bus = EventBus::new();
    let events = bus.subscribe().expect("bus is open");

    let receiver = CommandReceiver::new(&path, bus.clone());
    if let Err(e) = receiver.start() {
        eprintln!("Error: {e}");
        return;
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");

    let mut count = 0u64;
    while running.load(Ordering::SeqCst) {
        match events.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                count += 1;
                println!("[{count}] {event}");
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    if let Err(e) = receiver.stop() {
        eprintln!("Error: {e}");
    }
    bus.close();
    println!("\nReceived {count} event(s)");
}
