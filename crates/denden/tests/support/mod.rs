use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use denden_protocol::{RequestFrame, ResponseFrame};

/// Minimal orchestrator stand-in: accepts one connection, reads one frame,
/// answers with whatever `reply` builds and hands the request back.
pub struct FakeOrchestrator {
    pub addr: SocketAddr,
    seen: mpsc::Receiver<RequestFrame>,
    handle: JoinHandle<()>,
}

impl FakeOrchestrator {
    pub fn start<F>(reply: F) -> Self
    where
        F: FnOnce(&RequestFrame) -> Option<ResponseFrame> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, seen) = mpsc::channel();

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let request: RequestFrame = serde_json::from_str(line.trim_end()).unwrap();

            match reply(&request) {
                Some(response) => {
                    let mut writer = stream;
                    let mut out = serde_json::to_vec(&response).unwrap();
                    out.push(b'\n');
                    writer.write_all(&out).unwrap();
                    writer.flush().unwrap();
                }
                // Hold the connection open without answering.
                None => thread::sleep(Duration::from_secs(2)),
            }
            let _ = tx.send(request);
        });

        Self { addr, seen, handle }
    }

    /// The frame the client sent. Blocks until the server thread is done.
    pub fn request(self) -> RequestFrame {
        let request = self.seen.recv_timeout(Duration::from_secs(10)).unwrap();
        self.handle.join().unwrap();
        request
    }
}

/// An address nothing is listening on.
pub fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}
