//! Polling loop
//!
//! [`Runner`] wires the resolver, process handle, and sink together:
//! resolve the target, open the sink, sample until the process is gone or
//! extraction fails, then close the sink. A mid-loop extraction failure is
//! the ordinary end-of-life race for the observed process and drains to a
//! clean shutdown; only resolution- and construction-time errors fail the
//! run.

use crate::attach::AttachResolver;
use crate::config::RunnerConfig;
use crate::error::Result;
use crate::metrics::Sample;
use crate::sink::{Sink, SinkConfig};

use std::sync::atomic::Ordering;
use std::thread;

pub struct Runner {
    config: RunnerConfig,
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Run one full monitoring session.
    pub fn run(&mut self) -> Result<()> {
        self.config.validate()?;

        let resolver = AttachResolver::new()
            .with_retry_policy(self.config.retry)
            .with_handoff_delay(self.config.handoff_delay);
        let mut handle = resolver.resolve(self.config.target.clone())?;
        log::info!("monitoring process {}", handle.pid());

        let field_names: Vec<&str> = match &self.config.fields {
            Some(names) => names.iter().map(String::as_str).collect(),
            None => Sample::FIELDS.to_vec(),
        };
        let indices = field_indices(&field_names)?;

        let sink_config = SinkConfig::new(&self.config.outfile)
            .with_fields(field_names)
            .with_static_fields(self.config.static_fields.clone())
            .with_format(self.config.format)
            .with_write_header(self.config.write_header);
        let mut sink = Sink::open(sink_config)?;

        let mut samples = 0u64;
        while self.should_continue() && handle.is_running() {
            match handle.snapshot() {
                Ok(sample) => {
                    let values = sample.values();
                    let row: Vec<_> = indices.iter().map(|&i| values[i].clone()).collect();
                    if let Err(err) = sink.write(&row) {
                        log::error!("stopping: failed to write sample: {}", err);
                        break;
                    }
                    samples += 1;
                }
                Err(err) => {
                    // Expected when the process exits between the liveness
                    // check and the read; end the run cleanly.
                    log::error!("stopping: {}", err);
                    break;
                }
            }
            thread::sleep(self.config.interval);
        }

        sink.close()?;
        log::info!(
            "wrote {} sample(s) to {}",
            samples,
            self.config.outfile.display()
        );
        Ok(())
    }

    fn should_continue(&self) -> bool {
        self.config
            .stop_flag
            .as_ref()
            .map_or(true, |flag| flag.load(Ordering::SeqCst))
    }
}

/// Positions of the selected columns within [`Sample::FIELDS`].
fn field_indices(names: &[&str]) -> Result<Vec<usize>> {
    names
        .iter()
        .map(|name| {
            Sample::FIELDS
                .iter()
                .position(|field| field == name)
                .ok_or_else(|| {
                    crate::error::Error::InvalidConfiguration(format!(
                        "unknown metric field '{}'",
                        name
                    ))
                })
        })
        .collect()
}
