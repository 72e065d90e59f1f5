// frame transport over datagrams: a mode header, row payload chunks
// and a frame-done marker, plus the vsync packet display sinks send
// back upstream. Receiving assembles rows into a back buffer and
// publishes complete frames under a mutex + condvar.

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::Error;
use crate::frame::{FrameData, FrameOwned};
use crate::timing;

#[cfg(test)]
#[path = "./net_test.rs"]
mod net_test;

/// keeps row chunks under the usual path MTU
pub const MAX_PAYLOAD: usize = 1400;

const RECV_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct ModeHeader {
    pub width: i32,
    pub height: i32,
    pub bpp: i32,
    pub pitch: i32,
    pub aspect_ratio: f32,
}

impl ModeHeader {
    pub fn of(frame: &FrameData) -> Self {
        ModeHeader {
            width: frame.width,
            height: frame.height,
            bpp: frame.bpp,
            pitch: frame.pitch,
            aspect_ratio: frame.aspect_ratio,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub enum Packet {
    Mode(ModeHeader),
    Rows { y: i32, data: Vec<u8> },
    FrameDone,
    Vsync,
}

/// state published to consumers of the receiver
pub struct FrontBuffer {
    pub frame: FrameOwned,
    /// bumped once per completed frame
    pub frame_count: u64,
    /// bumped once per mode change
    pub mode_count: u64,
    pub last_sender: Option<SocketAddr>,
}

struct Shared {
    state: Mutex<FrontBuffer>,
    frame_ready: Condvar,
    stop: AtomicBool,
}

pub struct FrameReceiver {
    socket: Arc<UdpSocket>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl FrameReceiver {
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let socket = UdpSocket::bind(addr)?;
        Ok(Self::from_socket(socket))
    }

    pub fn from_socket(socket: UdpSocket) -> Self {
        FrameReceiver {
            socket: Arc::new(socket),
            shared: Arc::new(Shared {
                state: Mutex::new(FrontBuffer {
                    frame: FrameOwned::new(),
                    frame_count: 0,
                    mode_count: 0,
                    last_sender: None,
                }),
                frame_ready: Condvar::new(),
                stop: AtomicBool::new(false),
            }),
            worker: None,
        }
    }

    pub fn socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.socket.local_addr()?)
    }

    /// spawn the receive loop; an elevated priority is attempted and
    /// only logged when refused
    pub fn start(&mut self, priority: Option<i32>) {
        let socket = Arc::clone(&self.socket);
        let shared = Arc::clone(&self.shared);

        let _ = socket.set_read_timeout(Some(RECV_POLL_INTERVAL));

        self.worker = Some(thread::spawn(move || {
            if let Some(priority) = priority {
                if let Err(err) = timing::init_rt(Some(priority)) {
                    log::warn!("frame receiver: {}", err);
                }
            }

            receive_loop(&socket, &shared);
        }));
    }

    /// block until a frame newer than `seen` is published; returns
    /// the new count
    pub fn wait_for_frame(&self, seen: u64) -> u64 {
        let mut state = self.shared.state.lock().unwrap();
        while state.frame_count <= seen {
            state = self.shared.frame_ready.wait(state).unwrap();
        }
        state.frame_count
    }

    /// like wait_for_frame but gives up after `timeout`
    pub fn wait_for_frame_timeout(&self, seen: u64, timeout: Duration) -> Option<u64> {
        let mut state = self.shared.state.lock().unwrap();
        while state.frame_count <= seen {
            let (next, result) = self
                .shared
                .frame_ready
                .wait_timeout(state, timeout)
                .unwrap();
            state = next;
            if result.timed_out() && state.frame_count <= seen {
                return None;
            }
        }
        Some(state.frame_count)
    }

    /// lock the most recently completed frame
    pub fn lock_front(&self) -> MutexGuard<'_, FrontBuffer> {
        self.shared.state.lock().unwrap()
    }
}

impl Drop for FrameReceiver {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn receive_loop(socket: &UdpSocket, shared: &Shared) {
    let mut buf = vec![0u8; 64 * 1024];
    let mut back = FrameOwned::new();
    let mut mode: Option<ModeHeader> = None;

    while !shared.stop.load(Ordering::Relaxed) {
        let (len, remote) = match socket.recv_from(&mut buf) {
            Ok(r) => r,
            Err(_) => continue, // poll timeout or transient failure
        };

        let packet: Packet = match bincode::deserialize(&buf[..len]) {
            Ok(p) => p,
            Err(err) => {
                log::warn!("dropping malformed packet from {}: {}", remote, err);
                continue;
            }
        };

        match packet {
            Packet::Mode(header) => {
                if mode != Some(header) {
                    mode = Some(header);
                    back.resize_with_pitch(header.width, header.height, header.pitch, header.bpp);
                    back.aspect_ratio = header.aspect_ratio;

                    let mut state = shared.state.lock().unwrap();
                    state.mode_count += 1;
                }
            }
            Packet::Rows { y, data } => {
                let header = match mode {
                    Some(h) => h,
                    None => continue, // rows before any mode header
                };

                let pitch = header.pitch as usize;
                let rows = if pitch > 0 { data.len() / pitch } else { 0 };
                let end = y as usize + rows;

                if pitch == 0 || data.len() % pitch != 0 || y < 0 || end > header.height as usize {
                    log::warn!("dropping out-of-shape row chunk at y={}", y);
                    continue;
                }

                let dst = &mut back.as_mut_slice()[y as usize * pitch..end * pitch];
                dst.copy_from_slice(&data);
            }
            Packet::FrameDone => {
                if mode.is_none() {
                    continue;
                }

                let mut state = shared.state.lock().unwrap();
                state.frame.copy_from(&back);
                state.frame_count += 1;
                state.last_sender = Some(remote);
                shared.frame_ready.notify_all();
            }
            Packet::Vsync => {
                // vsync packets matter to the sending side only
            }
        }
    }
}

/// serializes frames into mode + row chunks + done, with optional
/// pacing between datagrams to keep cheap receivers from dropping
pub struct FrameSender {
    socket: Arc<UdpSocket>,
    remote: Option<SocketAddr>,
    pub pacing: Option<Duration>,
}

impl FrameSender {
    pub fn new(socket: Arc<UdpSocket>) -> Self {
        FrameSender {
            socket,
            remote: None,
            pacing: None,
        }
    }

    pub fn set_remote(&mut self, addr: &str) -> Result<(), Error> {
        let resolved = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::InvalidArgument(format!("cannot resolve {:?}", addr)))?;
        self.remote = Some(resolved);
        Ok(())
    }

    pub fn set_remote_endpoint(&mut self, addr: SocketAddr) {
        self.remote = Some(addr);
    }

    pub fn remote(&self) -> Option<SocketAddr> {
        self.remote
    }

    fn send_packet(&self, packet: &Packet, to: SocketAddr) -> Result<(), Error> {
        let bytes = bincode::serialize(packet)
            .map_err(|e| Error::InvalidArgument(format!("encode: {}", e)))?;
        self.socket.send_to(&bytes, to)?;

        if let Some(pacing) = self.pacing {
            thread::sleep(pacing);
        }

        Ok(())
    }

    pub fn send_frame(&self, frame: &FrameData) -> Result<(), Error> {
        let to = self
            .remote
            .ok_or_else(|| Error::InvalidArgument("no remote endpoint".to_string()))?;

        self.send_packet(&Packet::Mode(ModeHeader::of(frame)), to)?;

        let pitch = frame.pitch as usize;
        let rows_per_chunk = (MAX_PAYLOAD / pitch.max(1)).max(1);
        let data = frame.as_slice();

        let mut y = 0usize;
        while y < frame.height as usize {
            let rows = rows_per_chunk.min(frame.height as usize - y);
            self.send_packet(
                &Packet::Rows {
                    y: y as i32,
                    data: data[y * pitch..(y + rows) * pitch].to_vec(),
                },
                to,
            )?;
            y += rows;
        }

        self.send_packet(&Packet::FrameDone, to)
    }

    /// vsync notification back to wherever the frames came from
    pub fn send_vsync_to(&self, to: SocketAddr) -> Result<(), Error> {
        self.send_packet(&Packet::Vsync, to)
    }
}
