/// Per-invocation switches handed to every component instead of
/// process-wide flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunContext {
    pub debug: bool,
    pub verbose: bool,
}

impl RunContext {
    pub fn new(debug: bool, verbose: bool) -> Self {
        Self { debug, verbose }
    }

    /// Default `tracing` filter directive for these switches.
    pub fn log_directive(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.verbose {
            "info"
        } else {
            "warn"
        }
    }
}
