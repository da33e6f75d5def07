//! Worker threads hammer their own per-thread pools while a separate
//! "processor" thread releases objects it was handed across thread
//! boundaries, exercising the cross-thread return path.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use threadpool_alloc::{acquire_typed, register_type, release, set_per_object_count, stats};

struct Packet {
    id: u64,
    payload: [u8; 64],
}

struct Event {
    kind: u32,
}

fn worker(id: usize, handoff: mpsc::Sender<usize>) {
    set_per_object_count(256);
    register_type::<Packet>();
    register_type::<Event>();

    for i in 0..2_000u64 {
        let packet = acquire_typed::<Packet>().expect("packet slab exhausted");
        unsafe {
            packet.as_ptr().write(Packet { id: i, payload: [0; 64] });
        }

        let event = acquire_typed::<Event>().expect("event slab exhausted");
        unsafe {
            event.as_ptr().write(Event { kind: (i % 4) as u32 });
        }

        if i % 3 == 0 {
            // Hand the packet off to the processor thread instead of
            // releasing it locally, forcing a cross-thread return.
            let _ = handoff.send(packet.as_ptr() as usize);
            release(event.cast());
        } else {
            release(packet.cast());
            release(event.cast());
        }

        if i % 500 == 0 {
            tracing::info!(worker = id, "{}", stats(false));
        }
    }

    tracing::info!(worker = id, "done: {}", stats(true));
}

fn main() {
    tracing_subscriber::fmt::init();

    let (tx, rx) = mpsc::channel::<usize>();

    let processor = thread::spawn(move || {
        let mut handled = 0usize;
        while let Ok(addr) = rx.recv_timeout(Duration::from_secs(2)) {
            let ptr = std::ptr::NonNull::new(addr as *mut u8).expect("handed off pointer is never null");
            release(ptr);
            handled += 1;
        }
        tracing::info!(handled, "processor done releasing cross-thread pointers");
    });

    let workers: Vec<_> = (0..4)
        .map(|id| {
            let tx = tx.clone();
            thread::spawn(move || worker(id, tx))
        })
        .collect();

    drop(tx);
    for w in workers {
        w.join().expect("worker panicked");
    }
    processor.join().expect("processor panicked");
}
