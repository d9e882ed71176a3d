// src/constants.rs

/// The maximum number of bytes of a stage's stdout handed to the next stage.
/// Anything past this point is silently dropped.
pub const MAX_PIPE_INPUT_BYTES: usize = 10 * 1024 * 1024;

/// The line ending appended by `Connection::send`.
pub const DEFAULT_LINE_ENDING: &str = "\n";

/// The name of the directory holding conduit configuration (inside the system config dir).
pub const CONFIG_DIR_NAME: &str = "conduit";

/// The name of the configuration file (inside the conduit config dir).
pub const CONFIG_FILENAME: &str = "config.toml";

/// Environment variable that overrides the configuration file location.
pub const CONFIG_PATH_ENV: &str = "CONDUIT_CONFIG";

/// Size of the chunks read from a child's stdout/stderr.
pub const READ_CHUNK_SIZE: usize = 8 * 1024;
