//! Drive a session against an in-process server.
//!
//! Run with:
//!   cargo run --example scripted-session
//!
//! The server answers the setup query with one extension and acknowledges
//! every command with a `NOTIF` frame.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use lurk::session::connect;

const LISTING: &str = "GameDescription:The Sunken Crypt\n\
                       Extension: WAVE\nNiceName: wave\nType: ACTON\nDescription: Wave at someone\n";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();

    let server = thread::spawn(move || -> std::io::Result<()> {
        let (mut stream, _) = listener.accept()?;
        let mut buf = [0u8; 1024];
        loop {
            let n = stream.read(&mut buf)?;
            if n == 0 {
                return Ok(());
            }
            let text = String::from_utf8_lossy(&buf[..n]).into_owned();
            eprintln!("server got {text:?}");
            if text.starts_with("QUERY") {
                write!(stream, "INFOM {}{}", LISTING.len(), LISTING)?;
            } else if text.starts_with("LEAVE") {
                return Ok(());
            } else {
                write!(stream, "NOTIF ok: {text}")?;
            }
        }
    });

    let session = connect("127.0.0.1", port)?;
    let handle = session.handle();
    for line in ["login ada", "start 1", "wave everyone", "dance", "cmds", "logout"] {
        handle.submit_input(line);
    }

    let runner = thread::spawn(move || session.run());
    let mut lines: Vec<String> = Vec::new();
    while !runner.is_finished() {
        handle.pump_output(&mut lines);
        thread::sleep(Duration::from_millis(20));
    }
    let result = runner.join().map_err(|_| "session thread panicked")?;
    handle.pump_output(&mut lines);

    for line in &lines {
        println!("{line}");
    }
    println!("stats: {:?}", handle.stats());

    server.join().map_err(|_| "server thread panicked")??;
    result?;
    Ok(())
}
