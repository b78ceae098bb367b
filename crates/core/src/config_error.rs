use miette::Diagnostic;
use starbase_styles::{Style, Stylize};
use starbase_utils::toml::TomlError;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum SwapConfigError {
    #[diagnostic(transparent)]
    #[error(transparent)]
    Toml(#[from] Box<TomlError>),

    #[diagnostic(code(binswap::config::invalid_setting))]
    #[error("Invalid setting {}: {reason}.", .setting.style(Style::Property))]
    InvalidSetting { setting: String, reason: String },
}

impl From<TomlError> for SwapConfigError {
    fn from(e: TomlError) -> SwapConfigError {
        SwapConfigError::Toml(Box::new(e))
    }
}
