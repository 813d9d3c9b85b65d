use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::gopher::{self, FetchResult, Timeouts};

#[derive(Debug, Clone)]
pub struct Config {
    pub timeouts: Timeouts,
    pub queue_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeouts: Timeouts::default(),
            queue_depth: 10,
        }
    }
}

/// Anything that can turn an address into a [`FetchResult`] delivered later
/// on the returned channel.
pub trait Fetcher {
    fn request(&self, address: &str) -> Receiver<FetchResult>;
}

impl<T: Fetcher + ?Sized> Fetcher for &T {
    fn request(&self, address: &str) -> Receiver<FetchResult> {
        (**self).request(address)
    }
}

enum Command {
    Request {
        address: String,
        reply: Sender<FetchResult>,
    },
    Stop,
}

/// Background thread that performs fetches one at a time, in the order they
/// were requested. A request always runs to completion once started.
pub struct Worker {
    cfg: Config,
    commands: Sender<Command>,
    queue: Receiver<Command>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Worker {
    pub fn new(cfg: Config) -> Self {
        let mut cfg = cfg;
        if cfg.queue_depth == 0 {
            cfg.queue_depth = 1;
        }
        let (commands, queue) = bounded(cfg.queue_depth);
        Self {
            cfg,
            commands,
            queue,
            handle: None,
        }
    }

    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }
        let queue = self.queue.clone();
        let timeouts = self.cfg.timeouts;
        info!(queue_depth = self.cfg.queue_depth, "starting fetch worker");
        self.handle = Some(thread::spawn(move || run(queue, timeouts)));
    }

    /// Lets queued requests finish, then joins the worker thread.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.commands.send(Command::Stop);
        if handle.join().is_err() {
            warn!("fetch worker panicked");
        }
        info!("fetch worker stopped");
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Fetcher for Worker {
    fn request(&self, address: &str) -> Receiver<FetchResult> {
        let (reply, rx) = bounded(1);
        if !self.is_running() {
            let _ = reply.send(FetchResult::error("network worker is not running"));
            return rx;
        }
        let command = Command::Request {
            address: address.to_string(),
            reply,
        };
        if let Err(err) = self.commands.send(command) {
            if let Command::Request { reply, .. } = err.into_inner() {
                let _ = reply.send(FetchResult::error("network worker is not running"));
            }
        }
        rx
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(queue: Receiver<Command>, timeouts: Timeouts) {
    while let Ok(command) = queue.recv() {
        match command {
            Command::Stop => break,
            Command::Request { address, reply } => {
                let result = process(&address, timeouts);
                // The requester may have moved on; nobody left to tell.
                let _ = reply.send(result);
            }
        }
    }
}

fn process(address: &str, timeouts: Timeouts) -> FetchResult {
    debug!(%address, "fetching");
    match gopher::fetch(address, timeouts) {
        Ok(result) => {
            match &result {
                FetchResult::Menu { lines, .. } => {
                    debug!(%address, lines = lines.len(), "menu received")
                }
                FetchResult::Html { body, .. } => {
                    debug!(%address, bytes = body.len(), "html received")
                }
                FetchResult::Error { .. } => {}
            }
            result
        }
        Err(err) => {
            warn!(%address, error = %err, "fetch failed");
            err.into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_before_start_fails_fast() {
        let worker = Worker::new(Config::default());
        let rx = worker.request("gopher://example.org");
        assert_eq!(
            rx.recv().unwrap(),
            FetchResult::error("network worker is not running")
        );
    }

    #[test]
    fn request_after_stop_fails_fast() {
        let mut worker = Worker::new(Config::default());
        worker.start();
        worker.stop();
        assert!(!worker.is_running());
        let rx = worker.request("gopher://example.org");
        assert!(matches!(rx.recv().unwrap(), FetchResult::Error { .. }));
    }

    #[test]
    fn invalid_addresses_become_error_results() {
        let mut worker = Worker::new(Config::default());
        worker.start();
        let rx = worker.request("ftp://example.org");
        match rx.recv().unwrap() {
            FetchResult::Error { message } => assert!(message.starts_with("invalid scheme")),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn zero_queue_depth_is_clamped() {
        let worker = Worker::new(Config {
            queue_depth: 0,
            ..Config::default()
        });
        assert_eq!(worker.cfg.queue_depth, 1);
    }
}
