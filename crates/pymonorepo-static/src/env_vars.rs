/// Declares all environment variable used throughout `pymonorepo` and its crates.
pub struct EnvVars;

impl EnvVars {
    /// Fixes the timestamps of all archive entries to the given Unix timestamp, for reproducible
    /// builds.
    ///
    /// The value must be an integer number of seconds since the Unix epoch. Values that fail to
    /// parse are ignored.
    ///
    /// See <https://reproducible-builds.org/specs/source-date-epoch/>.
    pub const SOURCE_DATE_EPOCH: &'static str = "SOURCE_DATE_EPOCH";

    /// The log filter for the `pymonorepo` command line, in `tracing_subscriber::EnvFilter`
    /// syntax.
    ///
    /// For example:
    ///
    /// * `PYMONOREPO_LOG=pymonorepo_workspace=debug` shows how workspace members are resolved.
    /// * `PYMONOREPO_LOG=trace` enables trace-level logging everywhere.
    pub const PYMONOREPO_LOG: &'static str = "PYMONOREPO_LOG";
}
