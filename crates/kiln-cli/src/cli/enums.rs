use clap::ValueEnum;
use kiln_config::Mode;

/// Build mode as accepted on the command line
#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
pub enum ModeArg {
    /// Readable output, no compression
    #[value(name = "development")]
    Development,

    /// Compressed output
    #[value(name = "production")]
    Production,

    /// No mode-specific defaults
    #[value(name = "none")]
    None,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Development => Mode::Development,
            ModeArg::Production => Mode::Production,
            ModeArg::None => Mode::None,
        }
    }
}
