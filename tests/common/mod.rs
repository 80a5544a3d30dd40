//! A fake camera speaking just enough of the OSC live preview protocol.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

pub const BOUNDARY: &str = "---osclivepreview---";
pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 32;

#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Keep sending frames until the client goes away.
    Endless,
    /// Send this many frames, then close the connection.
    Finite(usize),
    /// Answer 400 with an OSC error document.
    RejectSession,
    /// Read the request and never answer.
    Silent,
}

/// A request as received by the fake camera.
#[derive(Debug)]
pub struct Request {
    pub head: String,
    pub body: serde_json::Value,
}

pub struct FakeCamera {
    pub addr: SocketAddr,
    pub requests: Receiver<Request>,
    /// Signalled each time the camera stops serving a connection.
    pub disconnects: Receiver<()>,
}

impl FakeCamera {
    pub fn spawn(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, requests) = mpsc::channel();
        let (closed_tx, disconnects) = mpsc::channel();
        thread::spawn(move || {
            for conn in listener.incoming() {
                let Ok(conn) = conn else { break };
                let tx = tx.clone();
                let closed_tx = closed_tx.clone();
                thread::spawn(move || {
                    serve(conn, behavior, tx);
                    let _ = closed_tx.send(());
                });
            }
        });
        FakeCamera {
            addr,
            requests,
            disconnects,
        }
    }

    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    pub fn next_request(&self) -> Request {
        self.requests
            .recv_timeout(Duration::from_secs(5))
            .expect("camera received no request")
    }

    /// Wait for a client to go away.
    pub fn disconnected(&self) -> bool {
        self.disconnects.recv_timeout(Duration::from_secs(5)).is_ok()
    }
}

/// An address nothing listens on.
pub fn closed_host() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().to_string()
}

pub fn jpeg(shade: u8) -> Vec<u8> {
    let img = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([shade, 128, 255 - shade]));
    let mut out = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Jpeg)
        .unwrap();
    out.into_inner()
}

fn read_request(conn: &TcpStream) -> std::io::Result<Request> {
    let mut reader = BufReader::new(conn);
    let mut head = String::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        if line == "\r\n" {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
        head.push_str(&line);
    }
    let mut body = vec![0; content_length];
    reader.read_exact(&mut body)?;
    Ok(Request {
        head,
        body: serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
    })
}

fn write_part(conn: &mut TcpStream, shade: u8) -> std::io::Result<()> {
    let jpeg = jpeg(shade);
    write!(
        conn,
        "{BOUNDARY}\r\nContent-type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        jpeg.len()
    )?;
    conn.write_all(&jpeg)?;
    conn.write_all(b"\r\n")?;
    conn.flush()
}

fn serve(mut conn: TcpStream, behavior: Behavior, tx: Sender<Request>) {
    let Ok(request) = read_request(&conn) else { return };
    let _ = tx.send(request);

    let result = match behavior {
        Behavior::Endless | Behavior::Finite(_) => (|| -> std::io::Result<()> {
            write!(
                conn,
                "HTTP/1.1 200 OK\r\nContent-Type: multipart/x-mixed-replace; boundary=\"{BOUNDARY}\"\r\nConnection: close\r\n\r\n"
            )?;
            let limit = match behavior {
                Behavior::Finite(n) => n,
                _ => usize::MAX,
            };
            for i in 0..limit {
                write_part(&mut conn, (i % 256) as u8)?;
                thread::sleep(Duration::from_millis(10));
            }
            Ok(())
        })(),
        Behavior::RejectSession => {
            let body = r#"{"name":"camera._getLivePreview","state":"error","error":{"code":"invalidSessionId","message":"Session ID is invalid"}}"#;
            write!(
                conn,
                "HTTP/1.1 400 Bad Request\r\nContent-Type: application/json;charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
        }
        Behavior::Silent => {
            thread::sleep(Duration::from_secs(10));
            Ok(())
        }
    };
    // The client hanging up mid-stream is expected.
    let _ = result;
}

/// Poll `cond` until it holds or five seconds pass.
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}
