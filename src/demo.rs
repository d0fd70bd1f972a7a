//! Producer/consumer demonstration driven by environment variables.
//!
//! | variable              | default | meaning                             |
//! |-----------------------|---------|-------------------------------------|
//! | `QUEUE_CAPACITY`      | 2       | queue capacity                      |
//! | `PRODUCERS`           | 1       | producer threads                    |
//! | `CONSUMERS`           | 1       | consumer threads                    |
//! | `PRODUCE_INTERVAL_MS` | 3000    | pause after each produced value     |
//! | `CONSUME_DELAY_MS`    | 1000    | simulated work per consumed value   |
//! | `RUN_FOR_MS`          | unset   | interrupt all workers after this    |

use std::env;
use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::{BlockingQueue, Interrupt};

const ENV_CAPACITY: &str = "QUEUE_CAPACITY";
const ENV_PRODUCERS: &str = "PRODUCERS";
const ENV_CONSUMERS: &str = "CONSUMERS";
const ENV_PRODUCE_INTERVAL: &str = "PRODUCE_INTERVAL_MS";
const ENV_CONSUME_DELAY: &str = "CONSUME_DELAY_MS";
const ENV_RUN_FOR: &str = "RUN_FOR_MS";

const DEFAULT_CAPACITY: u64 = 2;
const DEFAULT_WORKERS: u64 = 1;
const DEFAULT_PRODUCE_INTERVAL: u64 = 3000;
const DEFAULT_CONSUME_DELAY: u64 = 1000;

const MAX_CAPACITY: u64 = 1 << 20;
const MAX_WORKERS: u64 = 1000;
const MAX_MILLIS: u64 = 24 * 60 * 60 * 1000;

/// Produced values are drawn from `0..VALUE_BOUND`.
const VALUE_BOUND: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{name}={value:?} is not a number")]
    Invalid { name: &'static str, value: String },
    #[error("{name}={value} is outside {min}..={max}")]
    OutOfRange {
        name: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoConfig {
    pub capacity: usize,
    pub producers: usize,
    pub consumers: usize,
    pub produce_interval: Duration,
    pub consume_delay: Duration,
    /// `None` runs until the process is killed.
    pub run_for: Option<Duration>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY as usize,
            producers: DEFAULT_WORKERS as usize,
            consumers: DEFAULT_WORKERS as usize,
            produce_interval: Duration::from_millis(DEFAULT_PRODUCE_INTERVAL),
            consume_delay: Duration::from_millis(DEFAULT_CONSUME_DELAY),
            run_for: None,
        }
    }
}

impl DemoConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a config from `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &'static str, default: u64, min: u64, max: u64| match lookup(name) {
            Some(raw) => parse(name, &raw, min, max),
            None => Ok(default),
        };

        let run_for = match lookup(ENV_RUN_FOR) {
            Some(raw) => Some(Duration::from_millis(parse(ENV_RUN_FOR, &raw, 0, MAX_MILLIS)?)),
            None => None,
        };

        Ok(Self {
            capacity: get(ENV_CAPACITY, DEFAULT_CAPACITY, 1, MAX_CAPACITY)? as usize,
            producers: get(ENV_PRODUCERS, DEFAULT_WORKERS, 1, MAX_WORKERS)? as usize,
            consumers: get(ENV_CONSUMERS, DEFAULT_WORKERS, 1, MAX_WORKERS)? as usize,
            produce_interval: Duration::from_millis(get(
                ENV_PRODUCE_INTERVAL,
                DEFAULT_PRODUCE_INTERVAL,
                0,
                MAX_MILLIS,
            )?),
            consume_delay: Duration::from_millis(get(
                ENV_CONSUME_DELAY,
                DEFAULT_CONSUME_DELAY,
                0,
                MAX_MILLIS,
            )?),
            run_for,
        })
    }
}

fn parse(name: &'static str, raw: &str, min: u64, max: u64) -> Result<u64, ConfigError> {
    let value: u64 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.to_owned(),
    })?;

    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

/// Totals of a finished [`run`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub produced: usize,
    pub consumed: usize,
    /// Values still queued when the workers stopped.
    pub left: usize,
}

#[derive(Clone, Copy)]
enum Role {
    Producer,
    Consumer,
}

/// Runs the demo until `config.run_for` elapses, or forever if it is `None`.
pub fn run(config: &DemoConfig) -> io::Result<Report> {
    let queue = BlockingQueue::new(config.capacity);
    let stop = Interrupt::new();

    info!(
        capacity = config.capacity,
        producers = config.producers,
        consumers = config.consumers,
        "starting demo"
    );

    let roles = (1..=config.producers)
        .map(|id| (Role::Producer, id))
        .chain((1..=config.consumers).map(|id| (Role::Consumer, id)));

    let mut workers = Vec::with_capacity(config.producers + config.consumers);
    for (role, id) in roles {
        match spawn(role, id, &queue, &stop, config) {
            Ok(handle) => workers.push(handle),
            Err(err) => {
                error!(%err, "failed to spawn worker");
                stop.interrupt();
                join(workers);
                return Err(err);
            }
        }
    }

    if let Some(run_for) = config.run_for {
        thread::sleep(run_for);
        info!("stopping workers");
        stop.interrupt();
    }

    let mut report = join(workers);
    report.left = queue.len();

    info!(
        produced = report.produced,
        consumed = report.consumed,
        left = report.left,
        "demo finished"
    );
    Ok(report)
}

fn spawn(
    role: Role,
    id: usize,
    queue: &BlockingQueue<u32>,
    stop: &Interrupt,
    config: &DemoConfig,
) -> io::Result<(Role, JoinHandle<usize>)> {
    let queue = queue.clone();
    let stop = stop.clone();

    let handle = match role {
        Role::Producer => {
            let interval = config.produce_interval;
            thread::Builder::new()
                .name(format!("producer-{}", id))
                .spawn(move || produce(&queue, &stop, interval))?
        }
        Role::Consumer => {
            let delay = config.consume_delay;
            thread::Builder::new()
                .name(format!("consumer-{}", id))
                .spawn(move || consume(&queue, &stop, delay))?
        }
    };
    Ok((role, handle))
}

fn join(workers: Vec<(Role, JoinHandle<usize>)>) -> Report {
    let mut report = Report::default();

    for (role, handle) in workers {
        let count = match handle.join() {
            Ok(count) => count,
            Err(_) => {
                error!("worker panicked");
                continue;
            }
        };
        match role {
            Role::Producer => report.produced += count,
            Role::Consumer => report.consumed += count,
        }
    }
    report
}

fn produce(queue: &BlockingQueue<u32>, stop: &Interrupt, interval: Duration) -> usize {
    let name = thread::current().name().unwrap_or("producer").to_owned();
    let mut produced = 0;

    loop {
        let value = fastrand::u32(..VALUE_BOUND);
        if let Err(err) = queue.put_interruptible(value, stop) {
            warn!(thread = %name, %err, "producer interrupted");
            return produced;
        }
        produced += 1;
        info!(thread = %name, value, "produced");

        if stop.sleep(interval).is_err() {
            warn!(thread = %name, "producer interrupted");
            return produced;
        }
    }
}

fn consume(queue: &BlockingQueue<u32>, stop: &Interrupt, delay: Duration) -> usize {
    let name = thread::current().name().unwrap_or("consumer").to_owned();
    let mut consumed = 0;

    loop {
        let value = match queue.take_interruptible(stop) {
            Ok(value) => value,
            Err(err) => {
                warn!(thread = %name, %err, "consumer interrupted");
                return consumed;
            }
        };
        consumed += 1;
        info!(thread = %name, value, "consumed");

        if stop.sleep(delay).is_err() {
            warn!(thread = %name, "consumer interrupted");
            return consumed;
        }
    }
}
