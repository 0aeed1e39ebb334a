//! Minimal streaming graph: every block runs on its own thread and talks to
//! its neighbours over bounded channels.

use crossbeam_channel::{Receiver, bounded};
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

use crate::utils::error::{DabError, Result};

/// A processing stage. `work` may emit any number of outputs per input,
/// `finish` runs once after the input stream closed.
pub trait Block: Send + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    fn name(&self) -> &str;

    fn work(&mut self, input: Self::Input) -> Result<Vec<Self::Output>>;

    fn finish(&mut self) -> Result<Vec<Self::Output>> {
        Ok(Vec::new())
    }
}

struct Stage {
    name: String,
    handle: JoinHandle<Result<()>>,
}

/// Owns the stage threads of one graph.
pub struct TopBlock {
    capacity: usize,
    stages: Vec<Stage>,
}

impl TopBlock {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            stages: Vec::new(),
        }
    }

    fn spawn<F>(&mut self, name: &str, body: F) -> Result<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(body)
            .map_err(|e| DabError::flowgraph(name, format!("cannot spawn thread: {}", e)))?;
        self.stages.push(Stage {
            name: name.to_string(),
            handle,
        });
        Ok(())
    }

    /// Feed the items of an iterator into the graph
    pub fn source<T, I>(&mut self, name: &str, items: I) -> Result<Receiver<T>>
    where
        T: Send + 'static,
        I: Iterator<Item = Result<T>> + Send + 'static,
    {
        let (tx, rx) = bounded(self.capacity);
        let stage = name.to_string();
        self.spawn(name, move || {
            let mut sent = 0usize;
            for item in items {
                if tx.send(item?).is_err() {
                    debug!("{}: downstream closed after {} items", stage, sent);
                    break;
                }
                sent += 1;
            }
            debug!("{}: {} items", stage, sent);
            Ok(())
        })?;
        Ok(rx)
    }

    pub fn connect<B: Block>(&mut self, mut block: B, input: Receiver<B::Input>) -> Result<Receiver<B::Output>> {
        let (tx, rx) = bounded(self.capacity);
        let name = block.name().to_string();
        self.spawn(&name, move || {
            for item in input.iter() {
                for out in block.work(item)? {
                    if tx.send(out).is_err() {
                        return Ok(());
                    }
                }
            }
            for out in block.finish()? {
                if tx.send(out).is_err() {
                    break;
                }
            }
            Ok(())
        })?;
        Ok(rx)
    }

    /// Terminal stage, outputs are dropped
    pub fn sink<B: Block>(&mut self, mut block: B, input: Receiver<B::Input>) -> Result<()> {
        let name = block.name().to_string();
        self.spawn(&name, move || {
            for item in input.iter() {
                block.work(item)?;
            }
            block.finish()?;
            Ok(())
        })
    }

    /// Wait for every stage to drain. Returns the first error in stage order.
    pub fn run(self) -> Result<()> {
        let mut first_error = None;
        for stage in self.stages {
            let outcome = match stage.handle.join() {
                Ok(result) => result,
                Err(_) => Err(DabError::flowgraph(&stage.name, "thread panicked")),
            };
            if let Err(e) = outcome {
                error!("Stage '{}' failed: {}", stage.name, e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
