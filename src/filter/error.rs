use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FilterError {
    #[error("invalid value for {param}: {message}")]
    InvalidValue { param: String, message: String },

    #[error("Invalid page.")]
    InvalidPage,
}

impl FilterError {
    pub fn invalid_value(param: impl Into<String>, message: impl Into<String>) -> Self {
        FilterError::InvalidValue {
            param: param.into(),
            message: message.into(),
        }
    }
}
